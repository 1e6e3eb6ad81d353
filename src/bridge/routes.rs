//! Bridge routes
//!
//! Every `/api` response is an [`Envelope`]. Device failures stay inside the
//! envelope's `errors` with a 200; malformed bodies get a 400 and unknown
//! tabs a 404.

use super::BridgeState;
use crate::bridge_span;
use crate::checkout::{CheckoutRequest, Envelope, PaymentMethod};
use crate::error::PosError;
use crate::observability::metrics;
use crate::orders::{NewItem, OrderBook, OrderError, Tab, TabId, Totals};
use crate::protocol::ReceiptRequest;
use crate::transport::Connector;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::Instrument;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// `POST /api/tabs/items` body: the product plus the tab to put it on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    /// Absent: open a new tab for the item
    #[serde(default)]
    pub tab: Option<TabId>,
    #[serde(flatten)]
    pub item: NewItem,
}

/// `POST /api/tabs/{id}/quantity` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityRequest {
    pub product_id: String,
    pub delta: i64,
}

/// `POST /api/tabs/{id}/checkout` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabCheckoutRequest {
    pub method: PaymentMethod,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TabView {
    #[serde(flatten)]
    tab: Tab,
    totals: Totals,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BookView {
    active: TabId,
    tax_rate: f64,
    tabs: Vec<TabView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    terminal_id: String,
    hdm_endpoint: String,
    printer_endpoint: String,
    /// `None` while a device call holds the client
    hdm_logged_in: Option<bool>,
    open_tabs: usize,
    uptime_seconds: u64,
    timestamp: u64,
}

/// All bridge routes with CORS open to any origin
pub fn routes<H, P>(
    state: BridgeState<H, P>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone
where
    H: Connector + 'static,
    P: Connector + 'static,
{
    // POST /api/hdm - fiscal receipt, empty body means an empty receipt
    let hdm = warp::path!("api" / "hdm")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::body::bytes())
        .and_then(handle_hdm::<H, P>);

    // POST /api/print - checkout payload from the storefront
    let print = warp::path!("api" / "print")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::body::bytes())
        .and_then(handle_print::<H, P>);

    let list_tabs = warp::path!("api" / "tabs")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_list_tabs::<H, P>);

    let add_item = warp::path!("api" / "tabs" / "items")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::body::bytes())
        .and_then(handle_add_item::<H, P>);

    let quantity = warp::path!("api" / "tabs" / TabId / "quantity")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::body::bytes())
        .and_then(handle_quantity::<H, P>);

    let close_tab = warp::path!("api" / "tabs" / TabId)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and_then(handle_close_tab::<H, P>);

    let checkout = warp::path!("api" / "tabs" / TabId / "checkout")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::body::bytes())
        .and_then(handle_tab_checkout::<H, P>);

    let health = warp::path!("health")
        .and(warp::get())
        .and(with_state(state))
        .and_then(handle_health::<H, P>);

    let metrics_route = warp::path!("metrics").and(warp::get()).map(|| {
        let snapshot = metrics().get_metrics();
        warp::reply::json(&snapshot)
    });

    hdm.or(print)
        .or(list_tabs)
        .or(add_item)
        .or(quantity)
        .or(close_tab)
        .or(checkout)
        .or(health)
        .or(metrics_route)
        .with(
            warp::cors()
                .allow_any_origin()
                .allow_methods(vec!["GET", "POST", "DELETE"])
                .allow_headers(vec!["content-type"]),
        )
}

fn with_state<H, P>(
    state: BridgeState<H, P>,
) -> impl Filter<Extract = (BridgeState<H, P>,), Error = Infallible> + Clone
where
    H: Connector + 'static,
    P: Connector + 'static,
{
    warp::any().map(move || state.clone())
}

fn envelope_reply(envelope: &Envelope, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(envelope), status).into_response()
}

fn error_reply(request: Value, error: PosError) -> Response {
    let status = match &error {
        PosError::Order(OrderError::TabNotFound(_))
        | PosError::Order(OrderError::ItemNotFound { .. }) => StatusCode::NOT_FOUND,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let mut envelope = Envelope::new(request);
    envelope.push_error(error);
    envelope_reply(&envelope, status)
}

/// Parse a JSON body, keeping the raw value for the envelope
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<(Value, T), Response> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        error_reply(
            Value::Null,
            PosError::invalid_input(format!("Malformed JSON body: {e}")),
        )
    })?;
    let parsed = serde_json::from_value(value.clone()).map_err(|e| {
        error_reply(
            value.clone(),
            PosError::invalid_input(format!("Unexpected request shape: {e}")),
        )
    })?;
    Ok((value, parsed))
}

fn book_view(book: &OrderBook) -> Value {
    let tabs = book
        .tabs()
        .iter()
        .map(|tab| TabView {
            tab: tab.clone(),
            totals: Totals::compute(tab.subtotal(), book.tax_rate()),
        })
        .collect();
    let view = BookView {
        active: book.active_tab(),
        tax_rate: book.tax_rate(),
        tabs,
    };
    serde_json::to_value(view).unwrap_or(Value::Null)
}

async fn handle_hdm<H, P>(state: BridgeState<H, P>, body: Bytes) -> Result<Response, Infallible>
where
    H: Connector + 'static,
    P: Connector + 'static,
{
    metrics().bridge_request();
    let span = bridge_span!(route = "hdm");

    let request = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match parse_body::<Value>(&body) {
            Ok((Value::Null, _)) => None,
            Ok((value, _)) => match serde_json::from_value::<ReceiptRequest>(value.clone()) {
                Ok(request) => Some(request),
                Err(e) => {
                    return Ok(error_reply(
                        value,
                        PosError::invalid_input(format!("Unexpected receipt request: {e}")),
                    ))
                }
            },
            Err(reply) => return Ok(reply),
        }
    };

    let envelope = state.checkout.hdm_envelope(request).instrument(span).await;
    Ok(envelope_reply(&envelope, StatusCode::OK))
}

async fn handle_print<H, P>(state: BridgeState<H, P>, body: Bytes) -> Result<Response, Infallible>
where
    H: Connector + 'static,
    P: Connector + 'static,
{
    metrics().bridge_request();
    let span = bridge_span!(route = "print");

    let request = match parse_body::<CheckoutRequest>(&body) {
        Ok((_, request)) => request,
        Err(reply) => return Ok(reply),
    };

    let envelope = state.checkout.print_receipt(request).instrument(span).await;
    Ok(envelope_reply(&envelope, StatusCode::OK))
}

async fn handle_list_tabs<H, P>(state: BridgeState<H, P>) -> Result<Response, Infallible>
where
    H: Connector + 'static,
    P: Connector + 'static,
{
    metrics().bridge_request();
    let book = state.orders.lock().await;
    let mut envelope = Envelope::new(Value::Null);
    envelope.result = book_view(&book);
    Ok(envelope_reply(&envelope, StatusCode::OK))
}

async fn handle_add_item<H, P>(state: BridgeState<H, P>, body: Bytes) -> Result<Response, Infallible>
where
    H: Connector + 'static,
    P: Connector + 'static,
{
    metrics().bridge_request();

    let (raw, request) = match parse_body::<AddItemRequest>(&body) {
        Ok(parsed) => parsed,
        Err(reply) => return Ok(reply),
    };

    let mut book = state.orders.lock().await;
    match book.add_item(request.tab, request.item) {
        Ok(tab) => {
            let mut envelope = Envelope::new(raw);
            envelope.result = json!({ "tab": tab, "book": book_view(&book) });
            Ok(envelope_reply(&envelope, StatusCode::OK))
        }
        Err(e) => Ok(error_reply(raw, e.into())),
    }
}

async fn handle_quantity<H, P>(
    id: TabId,
    state: BridgeState<H, P>,
    body: Bytes,
) -> Result<Response, Infallible>
where
    H: Connector + 'static,
    P: Connector + 'static,
{
    metrics().bridge_request();

    let (raw, request) = match parse_body::<QuantityRequest>(&body) {
        Ok(parsed) => parsed,
        Err(reply) => return Ok(reply),
    };

    let mut book = state.orders.lock().await;
    match book.change_quantity(id, &request.product_id, request.delta) {
        Ok(()) => {
            let mut envelope = Envelope::new(raw);
            envelope.result = book_view(&book);
            Ok(envelope_reply(&envelope, StatusCode::OK))
        }
        Err(e) => Ok(error_reply(raw, e.into())),
    }
}

async fn handle_close_tab<H, P>(id: TabId, state: BridgeState<H, P>) -> Result<Response, Infallible>
where
    H: Connector + 'static,
    P: Connector + 'static,
{
    metrics().bridge_request();

    let mut book = state.orders.lock().await;
    match book.close_tab(id) {
        Ok(closed) => {
            let mut envelope = Envelope::new(json!({ "tab": id }));
            envelope.result = json!({ "closed": closed, "book": book_view(&book) });
            Ok(envelope_reply(&envelope, StatusCode::OK))
        }
        Err(e) => Ok(error_reply(json!({ "tab": id }), e.into())),
    }
}

async fn handle_tab_checkout<H, P>(
    id: TabId,
    state: BridgeState<H, P>,
    body: Bytes,
) -> Result<Response, Infallible>
where
    H: Connector + 'static,
    P: Connector + 'static,
{
    metrics().bridge_request();
    let span = bridge_span!(route = "tab_checkout", tab = id);

    let (raw, request) = match parse_body::<TabCheckoutRequest>(&body) {
        Ok(parsed) => parsed,
        Err(reply) => return Ok(reply),
    };

    // Snapshot the tab so the book is not locked while devices are busy
    let snapshot = {
        let book = state.orders.lock().await;
        book.tab(id)
            .cloned()
            .and_then(|tab| Ok((tab, book.totals(id)?)))
    };
    let (tab, totals) = match snapshot {
        Ok(snapshot) => snapshot,
        Err(e) => return Ok(error_reply(raw, e.into())),
    };

    let envelope = state
        .checkout
        .checkout(&tab, totals.total, request.method)
        .instrument(span)
        .await;
    Ok(envelope_reply(&envelope, StatusCode::OK))
}

async fn handle_health<H, P>(state: BridgeState<H, P>) -> Result<Response, Infallible>
where
    H: Connector + 'static,
    P: Connector + 'static,
{
    let hdm_logged_in = state
        .checkout
        .hdm()
        .try_lock()
        .ok()
        .map(|client| client.is_logged_in());
    let open_tabs = state.orders.lock().await.tabs().len();
    let snapshot = metrics().get_metrics();

    let response = HealthResponse {
        status: "healthy",
        terminal_id: state.terminal_id.clone(),
        hdm_endpoint: state.hdm_endpoint.clone(),
        printer_endpoint: state.checkout.printer().endpoint(),
        hdm_logged_in,
        open_tabs,
        uptime_seconds: snapshot.uptime_seconds,
        timestamp: snapshot.timestamp,
    };
    Ok(warp::reply::json(&response).into_response())
}
