//! Fake HDM terminal on a local TCP port
//!
//! Speaks the real wire format: decrypts requests with the password key
//! (operator list, login) or the session key it issued, records them, and
//! answers with scripted bodies. Individual functions can be made to fail
//! with a device code or to never answer.

use super::mocks::encode_response;
use crate::hdm::CashierCredentials;
use crate::protocol::frame::REQUEST_HEADER_LEN;
use crate::protocol::{FunctionCode, SessionKey};
use crate::transport::TcpConnector;
use base64::Engine;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Success code the fake uses for login
pub const LOGIN_OK: u8 = 0x01;
/// Success code for every other command
pub const COMMAND_OK: u8 = 0x10;
/// Device code for rejected credentials
pub const BAD_CREDENTIALS: u8 = 0x9b;

/// One decoded request as the terminal saw it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub function: u8,
    pub body: Value,
}

impl RecordedRequest {
    pub fn seq(&self) -> Option<u64> {
        self.body.get("seq").and_then(Value::as_u64)
    }
}

#[derive(Debug)]
struct TerminalState {
    password_key: SessionKey,
    session_raw: [u8; 24],
    cashiers: Vec<CashierCredentials>,
    failures: HashMap<u8, (u8, String)>,
    silent: HashSet<u8>,
    requests: Vec<RecordedRequest>,
    connections: usize,
    rseq: u64,
}

impl TerminalState {
    fn session_key(&self) -> Option<SessionKey> {
        SessionKey::from_slice(&self.session_raw).ok()
    }

    /// Reply frame for a request, `None` to stay silent
    fn handle(&mut self, function: u8, body: &[u8]) -> Option<Vec<u8>> {
        let uses_password = function == FunctionCode::OperatorList.as_u8()
            || function == FunctionCode::Login.as_u8();
        let key = if uses_password {
            self.password_key.clone()
        } else {
            self.session_key()?
        };

        let request = key
            .decrypt(body)
            .ok()
            .and_then(|plain| serde_json::from_slice::<Value>(&plain).ok())
            .unwrap_or(Value::Null);
        self.requests.push(RecordedRequest {
            function,
            body: request.clone(),
        });

        if self.silent.contains(&function) {
            return None;
        }
        if let Some((code, message)) = self.failures.get(&function) {
            return Some(encode_response(*code, &json!({ "message": message }), &key));
        }

        let (code, reply) = match function {
            0x01 => (
                COMMAND_OK,
                json!({
                    "c": self.cashiers.iter().map(|c| json!({
                        "id": c.cashier,
                        "name": format!("Cashier {}", c.cashier),
                        "deps": [1]
                    })).collect::<Vec<_>>()
                }),
            ),
            0x02 => self.login(&request),
            0x04 => {
                self.rseq += 1;
                (
                    COMMAND_OK,
                    json!({
                        "rseq": self.rseq,
                        "crn": "63211234",
                        "sn": "V98745506068",
                        "tin": "08290572",
                        "fiscal": format!("{:08}", 40_000_000 + self.rseq),
                        "total": request.get("paidAmount").and_then(Value::as_f64).unwrap_or(0.0)
                            + request.get("paidAmountCard").and_then(Value::as_f64).unwrap_or(0.0),
                        "qr": format!("63211234-{}", self.rseq),
                    }),
                )
            }
            0x0c => (COMMAND_OK, json!({ "time": 1_792_300_000_000u64 })),
            _ => (COMMAND_OK, json!({})),
        };
        Some(encode_response(code, &reply, &key))
    }

    fn login(&self, request: &Value) -> (u8, Value) {
        let cashier = request.get("cashier").and_then(Value::as_u64);
        let pin = request.get("pin").and_then(Value::as_u64);
        let accepted = self
            .cashiers
            .iter()
            .any(|c| Some(u64::from(c.cashier)) == cashier && Some(u64::from(c.pin)) == pin);

        if accepted {
            let key = base64::engine::general_purpose::STANDARD.encode(self.session_raw);
            (LOGIN_OK, json!({ "key": key }))
        } else {
            (BAD_CREDENTIALS, json!({ "message": "Wrong cashier or pin" }))
        }
    }
}

pub struct FakeHdmBuilder {
    password: String,
    cashiers: Vec<CashierCredentials>,
    failures: HashMap<u8, (u8, String)>,
    silent: HashSet<u8>,
}

impl FakeHdmBuilder {
    /// Only these credentials log in (default: cashier 3 / pin 3)
    pub fn accept_cashiers(mut self, cashiers: Vec<CashierCredentials>) -> Self {
        self.cashiers = cashiers;
        self
    }

    /// Answer `function` with a device error
    pub fn fail(mut self, function: FunctionCode, code: u8, message: impl Into<String>) -> Self {
        self.failures
            .insert(function.as_u8(), (code, message.into()));
        self
    }

    /// Read requests for `function` but never answer them
    pub fn silent(mut self, function: FunctionCode) -> Self {
        self.silent.insert(function.as_u8());
        self
    }

    pub async fn spawn(self) -> io::Result<FakeHdmTerminal> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let mut session_raw = [0u8; 24];
        for (i, byte) in session_raw.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(37).wrapping_add(11);
        }

        let state = Arc::new(Mutex::new(TerminalState {
            password_key: SessionKey::from_password(&self.password),
            session_raw,
            cashiers: self.cashiers,
            failures: self.failures,
            silent: self.silent,
            requests: Vec::new(),
            connections: 0,
            rseq: 0,
        }));

        let handle = tokio::spawn(serve(listener, Arc::clone(&state)));
        Ok(FakeHdmTerminal {
            addr,
            state,
            handle,
        })
    }
}

pub struct FakeHdmTerminal {
    addr: SocketAddr,
    state: Arc<Mutex<TerminalState>>,
    handle: JoinHandle<()>,
}

impl FakeHdmTerminal {
    pub fn builder(password: impl Into<String>) -> FakeHdmBuilder {
        FakeHdmBuilder {
            password: password.into(),
            cashiers: vec![CashierCredentials::new(3, 3)],
            failures: HashMap::new(),
            silent: HashSet::new(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn connector(&self) -> TcpConnector {
        TcpConnector::new("127.0.0.1", self.port(), Duration::from_secs(2))
    }

    /// Key handed out on a successful login
    pub async fn session_key(&self) -> Option<SessionKey> {
        self.state.lock().await.session_key()
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().await.requests.clone()
    }

    pub async fn functions(&self) -> Vec<u8> {
        self.requests().await.iter().map(|r| r.function).collect()
    }

    pub async fn connections(&self) -> usize {
        self.state.lock().await.connections
    }
}

impl Drop for FakeHdmTerminal {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(listener: TcpListener, state: Arc<Mutex<TerminalState>>) {
    while let Ok((socket, _)) = listener.accept().await {
        state.lock().await.connections += 1;
        tokio::spawn(handle_connection(socket, Arc::clone(&state)));
    }
}

async fn handle_connection(mut socket: TcpStream, state: Arc<Mutex<TerminalState>>) {
    loop {
        let mut header = [0u8; REQUEST_HEADER_LEN];
        if socket.read_exact(&mut header).await.is_err() {
            return;
        }
        let len = u16::from_be_bytes([header[10], header[11]]) as usize;
        let mut body = vec![0u8; len];
        if socket.read_exact(&mut body).await.is_err() {
            return;
        }

        let reply = state.lock().await.handle(header[8], &body);
        if let Some(frame) = reply {
            if socket.write_all(&frame).await.is_err() {
                return;
            }
        }
    }
}
