//! Receipt label translations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Receipt language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Hy,
    En,
    Ru,
}

impl Language {
    pub fn labels(self) -> &'static Labels {
        match self {
            Language::Hy => &HY,
            Language::En => &EN,
            Language::Ru => &RU,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::Hy => "hy",
            Language::En => "en",
            Language::Ru => "ru",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hy" => Ok(Language::Hy),
            "en" => Ok(Language::En),
            "ru" => Ok(Language::Ru),
            other => Err(format!("Unsupported receipt language '{other}'")),
        }
    }
}

/// Every string printed on a receipt besides the data itself
#[derive(Debug)]
pub struct Labels {
    pub products: &'static str,
    pub tax_id: &'static str,
    pub address: &'static str,
    pub phone: &'static str,
    pub company_name: &'static str,
    pub cashier_name: &'static str,
    pub cashier_id: &'static str,
    pub customer_name: &'static str,
    pub customer_id: &'static str,
    pub receipt_number: &'static str,
    pub receipt_date: &'static str,
    pub discount: &'static str,
    pub delivery: &'static str,
    pub card_amount: &'static str,
    pub cash_amount: &'static str,
    pub sub_total: &'static str,
    pub total: &'static str,
    pub payment_status: &'static str,
    pub status_paid: &'static str,
    pub status_pending: &'static str,
}

static HY: Labels = Labels {
    products: "Ապրանքներ",
    tax_id: "ՀՎՀՀ",
    address: "Հասցե",
    phone: "Հեռ",
    company_name: "Անվանում",
    cashier_name: "Աշխատակից",
    cashier_id: "ID",
    customer_name: "Հաճախորդ",
    customer_id: "ID",
    receipt_number: "Կտրոն",
    receipt_date: "Ամսաթիվ",
    discount: "Զեղչ",
    delivery: "Առաքում",
    card_amount: "անկանխիկ",
    cash_amount: "կանխիկ",
    sub_total: "Մինչև զեղչը",
    total: "Ընդամենը",
    payment_status: "Կարգավիճակ",
    status_paid: "Վճարված",
    status_pending: "Սպասվում է",
};

static EN: Labels = Labels {
    products: "Products",
    tax_id: "TIN",
    address: "Address",
    phone: "Phone",
    company_name: "Company",
    cashier_name: "Cashier",
    cashier_id: "ID",
    customer_name: "Customer",
    customer_id: "ID",
    receipt_number: "Receipt",
    receipt_date: "Date",
    discount: "Discount",
    delivery: "Delivery",
    card_amount: "card",
    cash_amount: "cash",
    sub_total: "Subtotal",
    total: "Total",
    payment_status: "Status",
    status_paid: "Paid",
    status_pending: "Pending",
};

static RU: Labels = Labels {
    products: "Товары",
    tax_id: "ИНН",
    address: "Адрес",
    phone: "Тел",
    company_name: "Название",
    cashier_name: "Кассир",
    cashier_id: "ID",
    customer_name: "Клиент",
    customer_id: "ID",
    receipt_number: "Чек",
    receipt_date: "Дата",
    discount: "Скидка",
    delivery: "Доставка",
    card_amount: "безналичные",
    cash_amount: "наличные",
    sub_total: "До скидки",
    total: "Итого",
    payment_status: "Статус",
    status_paid: "Оплачено",
    status_pending: "Ожидает оплаты",
};
