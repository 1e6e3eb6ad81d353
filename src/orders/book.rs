//! Order book: every open tab plus the one the cashier is working on

use super::{LineItem, NewItem, OrderError, Tab, TabId, Totals};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct OrderBook {
    tabs: Vec<Tab>,
    active: TabId,
    next_id: TabId,
    tax_rate: f64,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self {
            tabs: vec![Tab::new(0)],
            active: 0,
            next_id: 1,
            tax_rate: 0.0,
        }
    }
}

impl OrderBook {
    /// A book with one empty tab 0
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tax_rate(tax_rate: f64) -> Result<Self, OrderError> {
        if !(0.0..=1.0).contains(&tax_rate) {
            return Err(OrderError::InvalidTaxRate(tax_rate.to_string()));
        }
        Ok(Self {
            tax_rate,
            ..Self::default()
        })
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab(&self, id: TabId) -> Result<&Tab, OrderError> {
        self.tabs
            .iter()
            .find(|t| t.id == id)
            .ok_or(OrderError::TabNotFound(id))
    }

    fn tab_mut(&mut self, id: TabId) -> Result<&mut Tab, OrderError> {
        self.tabs
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(OrderError::TabNotFound(id))
    }

    pub fn active_tab(&self) -> TabId {
        self.active
    }

    pub fn set_active_tab(&mut self, id: TabId) -> Result<(), OrderError> {
        self.tab(id)?;
        self.active = id;
        Ok(())
    }

    /// Open an empty tab and make it active
    pub fn open_tab(&mut self) -> TabId {
        let id = self.next_id;
        self.next_id += 1;
        self.tabs.push(Tab::new(id));
        self.active = id;
        id
    }

    /// Add one unit of a product. Without a tab a new tab is opened for it.
    /// Returns the tab the item landed on.
    pub fn add_item(&mut self, tab: Option<TabId>, item: NewItem) -> Result<TabId, OrderError> {
        let id = match tab {
            Some(id) => id,
            None => self.open_tab(),
        };
        let tab = self.tab_mut(id)?;

        match tab.items.iter_mut().find(|line| line.same_variant(&item)) {
            Some(line) => line.qty = line.qty.saturating_add(1),
            None => tab.items.push(LineItem {
                product_id: item.product_id,
                name: item.name,
                description: item.description,
                qty: 1,
                price: item.price,
            }),
        }

        debug!(tab = id, lines = tab.items.len(), "Item added to tab");
        Ok(id)
    }

    /// Adjust every line of `product_id` by `delta`; lines that reach zero go away
    pub fn change_quantity(
        &mut self,
        tab: TabId,
        product_id: &str,
        delta: i64,
    ) -> Result<(), OrderError> {
        let tab_ref = self.tab_mut(tab)?;
        if !tab_ref.items.iter().any(|l| l.product_id == product_id) {
            return Err(OrderError::ItemNotFound {
                tab,
                product_id: product_id.to_string(),
            });
        }

        tab_ref.items.retain_mut(|line| {
            if line.product_id != product_id {
                return true;
            }
            let qty = i64::from(line.qty).saturating_add(delta);
            if qty <= 0 {
                false
            } else {
                line.qty = u32::try_from(qty).unwrap_or(u32::MAX);
                true
            }
        });
        Ok(())
    }

    pub fn remove_item(&mut self, tab: TabId, product_id: &str) -> Result<(), OrderError> {
        let tab_ref = self.tab_mut(tab)?;
        let before = tab_ref.items.len();
        tab_ref.items.retain(|line| line.product_id != product_id);
        if tab_ref.items.len() == before {
            return Err(OrderError::ItemNotFound {
                tab,
                product_id: product_id.to_string(),
            });
        }
        Ok(())
    }

    /// Drop a tab. The book never ends up empty: closing the last tab opens
    /// a fresh one.
    pub fn close_tab(&mut self, id: TabId) -> Result<Tab, OrderError> {
        let index = self
            .tabs
            .iter()
            .position(|t| t.id == id)
            .ok_or(OrderError::TabNotFound(id))?;
        let closed = self.tabs.remove(index);

        if self.tabs.is_empty() {
            self.open_tab();
        } else if self.active == id {
            self.active = self.tabs[index.saturating_sub(1).min(self.tabs.len() - 1)].id;
        }
        Ok(closed)
    }

    pub fn totals(&self, id: TabId) -> Result<Totals, OrderError> {
        Ok(Totals::compute(self.tab(id)?.subtotal(), self.tax_rate))
    }

    pub fn tax_rate(&self) -> f64 {
        self.tax_rate
    }
}
