//! HDM session client
//!
//! One client owns one terminal connection. Calls are strictly sequential:
//! every method takes `&mut self`, so sharing a client means wrapping it in
//! an async mutex (see [`SharedHdmClient`]).
//!
//! The connection is opened lazily and reopened on the next call after any
//! I/O fault. The session key and sequence counter survive reconnects; only
//! [`HdmClient::close`] and a successful logout forget them.
//!
//! A call dropped after its request went out (a cancelled bridge request,
//! an outer timeout) leaves the reply unread on the socket. The next call
//! sees the exchange was never finished and reconnects before sending.

use super::HdmError;
use crate::config::HdmSection;
use crate::hdm_span;
use crate::observability::metrics;
use crate::protocol::frame::{self, ResponseCode, ResponseHeader, RESPONSE_HEADER_LEN};
use crate::protocol::{
    device_message, CashInOutRequest, EmptyPayload, FunctionCode, HeaderFooterRequest,
    LoginRequest, LoginResponse, LogoRequest, OperatorList, OperatorListRequest,
    ReceiptInfoRequest, ReceiptRequest, ReceiptResponse, ReportRequest, ReturnRequest,
    SessionEnvelope, SessionKey, TemplateRequest,
};
use crate::transport::{Connector, TcpConnector};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Port the terminal listens on out of the box
pub const DEFAULT_HDM_PORT: u16 = 1025;

/// Upper bound for every exact read from the terminal
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

/// Client shared between the bridge and checkout
pub type SharedHdmClient<C = TcpConnector> = Arc<tokio::sync::Mutex<HdmClient<C>>>;

/// Cashier number and PIN registered on the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashierCredentials {
    pub cashier: u32,
    pub pin: u32,
}

impl CashierCredentials {
    pub fn new(cashier: u32, pin: u32) -> Self {
        Self { cashier, pin }
    }
}

pub struct HdmClient<C: Connector = TcpConnector> {
    connector: C,
    password: String,
    password_key: SessionKey,
    session_key: Option<SessionKey>,
    seq: u32,
    stream: Option<C::Stream>,
    stash: BytesMut,
    // set once a request is written, cleared when its reply is fully read
    in_flight: bool,
    response_timeout: Duration,
}

impl HdmClient<TcpConnector> {
    /// Build a TCP client from the `[hdm]` config section
    pub fn from_config(config: &HdmSection, password: impl Into<String>) -> Self {
        let connector = TcpConnector::new(
            config.host.clone(),
            config.port,
            Duration::from_secs(config.connect_timeout_secs),
        );
        HdmClient::new(connector, password)
            .with_response_timeout(Duration::from_secs(config.response_timeout_secs))
    }
}

impl<C: Connector> HdmClient<C> {
    pub fn new(connector: C, password: impl Into<String>) -> Self {
        let password = password.into();
        Self {
            connector,
            password_key: SessionKey::from_password(&password),
            password,
            session_key: None,
            seq: 1,
            stream: None,
            stash: BytesMut::new(),
            in_flight: false,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> String {
        self.connector.endpoint()
    }

    pub fn is_logged_in(&self) -> bool {
        self.session_key.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Sequence number the next session call will carry
    pub fn next_seq(&self) -> u32 {
        self.seq
    }

    // ---- unauthenticated commands ----

    /// Function 0x01: operators and departments registered on the terminal
    pub async fn get_operator_list(&mut self) -> Result<OperatorList, HdmError> {
        let body = serde_json::to_vec(&OperatorListRequest {
            password: &self.password,
        })?;
        let value = self.transact(FunctionCode::OperatorList, body, false).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Function 0x02: open a session and install the session key
    pub async fn login(&mut self, credentials: CashierCredentials) -> Result<(), HdmError> {
        let body = serde_json::to_vec(&LoginRequest {
            password: &self.password,
            cashier: credentials.cashier,
            pin: credentials.pin,
        })?;

        let outcome = async {
            let value = self.transact(FunctionCode::Login, body, false).await?;
            let response: LoginResponse = serde_json::from_value(value)?;
            Ok::<_, HdmError>(SessionKey::from_base64(&response.key)?)
        }
        .await;

        metrics().hdm_login(outcome.is_ok());
        let key = outcome?;
        info!(
            cashier = credentials.cashier,
            key = %key.fingerprint(),
            "HDM session opened"
        );
        self.session_key = Some(key);
        Ok(())
    }

    /// Try each credential in order; the first accepted one wins
    pub async fn login_with_fallback(
        &mut self,
        candidates: &[CashierCredentials],
    ) -> Result<CashierCredentials, HdmError> {
        let mut last_error = HdmError::NoCredentials;

        for credentials in candidates {
            match self.login(*credentials).await {
                Ok(()) => return Ok(*credentials),
                Err(e) => {
                    warn!(
                        cashier = credentials.cashier,
                        error = %e,
                        "HDM login failed, trying next cashier"
                    );
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    // ---- session commands ----

    /// Function 0x03: end the session
    pub async fn logout(&mut self) -> Result<Value, HdmError> {
        let value = self
            .session_call(FunctionCode::Logout, &EmptyPayload::default())
            .await?;
        self.session_key = None;
        self.seq = 1;
        Ok(value)
    }

    /// Function 0x04: register a fiscal receipt
    pub async fn print_receipt(
        &mut self,
        request: &ReceiptRequest,
    ) -> Result<ReceiptResponse, HdmError> {
        let value = self.session_call(FunctionCode::PrintReceipt, request).await?;
        metrics().fiscal_receipt_registered();
        Ok(serde_json::from_value(value)?)
    }

    /// Function 0x05
    pub async fn print_last_copy(&mut self) -> Result<Value, HdmError> {
        self.session_call(FunctionCode::PrintLastCopy, &EmptyPayload::default())
            .await
    }

    /// Function 0x06
    pub async fn print_return(&mut self, request: &ReturnRequest) -> Result<Value, HdmError> {
        self.session_call(FunctionCode::PrintReturn, request).await
    }

    /// Function 0x07
    pub async fn set_header_footer(
        &mut self,
        request: &HeaderFooterRequest,
    ) -> Result<Value, HdmError> {
        self.session_call(FunctionCode::SetHeaderFooter, request)
            .await
    }

    /// Function 0x08
    pub async fn set_logo(&mut self, request: &LogoRequest) -> Result<Value, HdmError> {
        self.session_call(FunctionCode::SetLogo, request).await
    }

    /// Function 0x09
    pub async fn print_report(&mut self, request: &ReportRequest) -> Result<Value, HdmError> {
        self.session_call(FunctionCode::PrintReport, request).await
    }

    /// Function 0x0a: look up an earlier receipt
    pub async fn get_receipt_info(&mut self, receipt_id: u64) -> Result<Value, HdmError> {
        self.session_call(FunctionCode::ReceiptInfo, &ReceiptInfoRequest { receipt_id })
            .await
    }

    /// Function 0x0b
    pub async fn cash_in_out(&mut self, request: &CashInOutRequest) -> Result<Value, HdmError> {
        self.session_call(FunctionCode::CashInOut, request).await
    }

    /// Function 0x0c
    pub async fn get_date_time(&mut self) -> Result<Value, HdmError> {
        self.session_call(FunctionCode::DateTime, &EmptyPayload::default())
            .await
    }

    /// Function 0x0d
    pub async fn print_template(&mut self, request: &TemplateRequest) -> Result<Value, HdmError> {
        self.session_call(FunctionCode::PrintTemplate, request)
            .await
    }

    /// Function 0x0e. The payload must serialize to a JSON object.
    pub async fn sync_device<P: Serialize + Sync>(&mut self, payload: &P) -> Result<Value, HdmError> {
        self.session_call(FunctionCode::SyncDevice, payload).await
    }

    /// Function 0x0f
    pub async fn get_pay_systems(&mut self) -> Result<Value, HdmError> {
        self.session_call(FunctionCode::PaySystems, &EmptyPayload::default())
            .await
    }

    /// Drop the connection and forget the session
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("HDM shutdown error ignored: {}", e);
            }
            metrics().hdm_connection_dropped();
        }
        self.stash.clear();
        self.in_flight = false;
        self.session_key = None;
        self.seq = 1;
    }

    // ---- plumbing ----

    async fn session_call<P: Serialize + Sync>(
        &mut self,
        function: FunctionCode,
        payload: &P,
    ) -> Result<Value, HdmError> {
        if self.session_key.is_none() {
            return Err(HdmError::NotLoggedIn);
        }

        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);

        debug!(command = function.name(), seq, "HDM session call");
        let body = serde_json::to_vec(&SessionEnvelope { seq, payload })?;
        self.transact(function, body, true).await
    }

    /// One request/response exchange. `body` is the plaintext JSON.
    async fn transact(
        &mut self,
        function: FunctionCode,
        body: Vec<u8>,
        use_session_key: bool,
    ) -> Result<Value, HdmError> {
        let key = if use_session_key {
            self.session_key.clone().ok_or(HdmError::NotLoggedIn)?
        } else {
            self.password_key.clone()
        };

        let request = frame::encode_request(function.as_u8(), &key.encrypt(&body))?;
        let span = hdm_span!(
            command = function.name(),
            code = function.as_u8(),
            key = %key.fingerprint()
        );

        async {
            debug!(request_len = request.len(), "Sending HDM request");
            let started = std::time::Instant::now();

            let result = self.exchange(&request, &key).await;
            if let Err(e) = &result {
                if e.is_connection_fault() {
                    if matches!(e, HdmError::Timeout { .. } | HdmError::WriteTimeout) {
                        metrics().hdm_timeout();
                    }
                    warn!(error = %e, "HDM connection fault, dropping socket");
                    self.drop_connection();
                }
            }

            let outcome = result.and_then(|(code, value)| {
                if ResponseCode::is_success(code) {
                    debug!(response_code = code, "HDM request succeeded");
                    Ok(value)
                } else {
                    Err(HdmError::Device {
                        code,
                        message: device_message(&value),
                    })
                }
            });

            metrics().hdm_request(function.name(), started.elapsed(), outcome.is_ok());
            outcome
        }
        .instrument(span)
        .await
    }

    async fn exchange(
        &mut self,
        request: &[u8],
        key: &SessionKey,
    ) -> Result<(u8, Value), HdmError> {
        self.ensure_connected().await?;
        let stream = self.stream.as_mut().ok_or(HdmError::ConnectionClosed)?;
        self.in_flight = true;

        let deadline = Instant::now() + self.response_timeout;
        tokio::time::timeout_at(deadline, async {
            stream.write_all(request).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| HdmError::WriteTimeout)??;

        let raw_header = self.read_exact(RESPONSE_HEADER_LEN).await?;
        let header = ResponseHeader::parse(&raw_header)?;
        debug!(
            response_code = header.code,
            body_len = header.body_len,
            "HDM response header"
        );

        if header.body_len == 0 {
            self.in_flight = false;
            return Ok((header.code, Value::Object(Default::default())));
        }

        let encrypted = self.read_exact(header.body_len).await?;
        self.in_flight = false;
        let plain = key.decrypt(&encrypted)?;
        let value = if plain.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_slice(&plain)?
        };
        Ok((header.code, value))
    }

    async fn ensure_connected(&mut self) -> Result<(), HdmError> {
        if self.in_flight {
            warn!("Previous HDM exchange was abandoned, reconnecting");
            self.drop_connection();
        }
        if self.stream.is_some() {
            return Ok(());
        }

        let endpoint = self.connector.endpoint();
        match self.connector.connect().await {
            Ok(stream) => {
                info!(endpoint = %endpoint, "Connected to HDM");
                metrics().hdm_connection_opened();
                self.stash.clear();
                self.stream = Some(stream);
                Ok(())
            }
            Err(source) => {
                metrics().hdm_connection_failed();
                Err(HdmError::Connect { endpoint, source })
            }
        }
    }

    /// Read exactly `len` bytes, keeping any surplus for the next read
    async fn read_exact(&mut self, len: usize) -> Result<Bytes, HdmError> {
        let deadline = Instant::now() + self.response_timeout;

        while self.stash.len() < len {
            let stream = self.stream.as_mut().ok_or(HdmError::ConnectionClosed)?;
            self.stash.reserve(len - self.stash.len());
            let read = tokio::time::timeout_at(deadline, stream.read_buf(&mut self.stash))
                .await
                .map_err(|_| HdmError::Timeout { expected: len })??;
            if read == 0 {
                return Err(HdmError::ConnectionClosed);
            }
        }

        Ok(self.stash.split_to(len).freeze())
    }

    fn drop_connection(&mut self) {
        if self.stream.take().is_some() {
            metrics().hdm_connection_dropped();
        }
        self.stash.clear();
        self.in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::encode_response;
    use async_trait::async_trait;
    use serde_json::json;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::io::DuplexStream;

    /// Hands out pre-built duplex streams, one per connect
    struct DuplexConnector {
        streams: Mutex<Vec<DuplexStream>>,
        connects: AtomicUsize,
    }

    impl DuplexConnector {
        fn new(streams: Vec<DuplexStream>) -> Self {
            Self {
                streams: Mutex::new(streams),
                connects: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Connector for DuplexConnector {
        type Stream = DuplexStream;

        async fn connect(&self) -> io::Result<DuplexStream> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let mut streams = self.streams.lock().unwrap();
            if streams.is_empty() {
                Err(io::Error::from(io::ErrorKind::ConnectionRefused))
            } else {
                Ok(streams.remove(0))
            }
        }

        fn endpoint(&self) -> String {
            "duplex".to_string()
        }
    }

    async fn read_request(server: &mut DuplexStream, key: &SessionKey) -> (u8, Value) {
        let mut header = [0u8; frame::REQUEST_HEADER_LEN];
        server.read_exact(&mut header).await.unwrap();
        let len = u16::from_be_bytes([header[10], header[11]]) as usize;
        let mut body = vec![0u8; len];
        server.read_exact(&mut body).await.unwrap();
        let plain = key.decrypt(&body).unwrap();
        (header[8], serde_json::from_slice(&plain).unwrap())
    }

    fn session_key() -> (String, SessionKey) {
        let raw = [7u8; 24];
        let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, raw);
        (encoded, SessionKey::from_slice(&raw).unwrap())
    }

    #[tokio::test]
    async fn test_session_call_requires_login_without_io() {
        let connector = DuplexConnector::new(Vec::new());
        let mut client = HdmClient::new(connector, "secret");

        let result = client.get_date_time().await;
        assert!(matches!(result, Err(HdmError::NotLoggedIn)));
        assert_eq!(client.connector.connects.load(Ordering::SeqCst), 0);
        assert_eq!(client.next_seq(), 1);
    }

    #[tokio::test]
    async fn test_login_then_session_call_uses_session_key() {
        let (client_io, mut server) = tokio::io::duplex(4096);
        let mut client = HdmClient::new(DuplexConnector::new(vec![client_io]), "JcYZf4Th");
        let password_key = SessionKey::from_password("JcYZf4Th");
        let (encoded, key_b) = session_key();

        let server_task = tokio::spawn(async move {
            let (code, body) = read_request(&mut server, &password_key).await;
            assert_eq!(code, 0x02);
            assert_eq!(body, json!({"password": "JcYZf4Th", "cashier": 3, "pin": 3}));
            server
                .write_all(&encode_response(0x01, &json!({"key": encoded}), &password_key))
                .await
                .unwrap();

            let (code, body) = read_request(&mut server, &key_b).await;
            assert_eq!(code, 0x0c);
            assert_eq!(body, json!({"seq": 1}));
            server
                .write_all(&encode_response(0x02, &json!({"time": 1700000000}), &key_b))
                .await
                .unwrap();
        });

        client.login(CashierCredentials::new(3, 3)).await.unwrap();
        assert!(client.is_logged_in());

        let time = client.get_date_time().await.unwrap();
        assert_eq!(time["time"], 1700000000);
        assert_eq!(client.next_seq(), 2);

        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_split_reads_keep_surplus_in_stash() {
        let (client_io, mut server) = tokio::io::duplex(4096);
        let mut client = HdmClient::new(DuplexConnector::new(vec![client_io]), "pw");
        let key = SessionKey::from_password("pw");

        let first = encode_response(0x02, &json!({"c": [{"id": 3}]}), &key);
        let second = encode_response(0x02, &json!({"c": [{"id": 2}]}), &key);

        let server_task = tokio::spawn(async move {
            read_request(&mut server, &key).await;
            // header split across writes, second frame glued to the first
            server.write_all(&first[..5]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            let mut rest = first[5..].to_vec();
            rest.extend_from_slice(&second);
            server.write_all(&rest).await.unwrap();
            read_request(&mut server, &key).await;
        });

        let first = client.get_operator_list().await.unwrap();
        assert_eq!(first.operators[0].id, 3);
        let second = client.get_operator_list().await.unwrap();
        assert_eq!(second.operators[0].id, 2);

        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_device_error_carries_message() {
        let (client_io, mut server) = tokio::io::duplex(4096);
        let mut client = HdmClient::new(DuplexConnector::new(vec![client_io]), "pw");
        let key = SessionKey::from_password("pw");

        tokio::spawn(async move {
            read_request(&mut server, &key).await;
            server
                .write_all(&encode_response(0x9c, &json!({"message": "Wrong cashier"}), &key))
                .await
                .unwrap();
            read_request(&mut server, &key).await;
            server
                .write_all(&encode_response(0xc8, &json!({}), &key))
                .await
                .unwrap();
        });

        let err = client.login(CashierCredentials::new(9, 9)).await.unwrap_err();
        assert!(matches!(err, HdmError::Device { code: 0x9c, ref message } if message == "Wrong cashier"));
        assert!(client.is_connected());

        let err = client.login(CashierCredentials::new(9, 9)).await.unwrap_err();
        assert_eq!(err.to_string(), "device error 0xc8: Unknown error");
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_timeout_drops_connection_but_keeps_session() {
        let (client_io, mut server) = tokio::io::duplex(4096);
        let (second_io, mut second_server) = tokio::io::duplex(4096);
        let mut client = HdmClient::new(DuplexConnector::new(vec![client_io, second_io]), "pw")
            .with_response_timeout(Duration::from_millis(50));
        let password_key = SessionKey::from_password("pw");
        let (encoded, key_b) = session_key();

        let server_task = tokio::spawn(async move {
            read_request(&mut server, &password_key).await;
            server
                .write_all(&encode_response(0x01, &json!({"key": encoded}), &password_key))
                .await
                .unwrap();
            // swallow the next request and never answer
            read_request(&mut server, &key_b).await;

            let (_, body) = read_request(&mut second_server, &key_b).await;
            assert_eq!(body["seq"], 2);
            second_server
                .write_all(&encode_response(0x02, &json!({}), &key_b))
                .await
                .unwrap();
            server
        });

        client.login(CashierCredentials::new(3, 3)).await.unwrap();

        let err = client.get_pay_systems().await.unwrap_err();
        assert!(matches!(err, HdmError::Timeout { expected: 11 }));
        assert!(!client.is_connected());
        assert!(client.is_logged_in());
        assert_eq!(client.next_seq(), 2);

        client.get_pay_systems().await.unwrap();
        assert_eq!(client.connector.connects.load(Ordering::SeqCst), 2);

        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_login_with_fallback_tries_next_cashier() {
        let (client_io, mut server) = tokio::io::duplex(4096);
        let mut client = HdmClient::new(DuplexConnector::new(vec![client_io]), "pw");
        let password_key = SessionKey::from_password("pw");
        let (encoded, _) = session_key();

        tokio::spawn(async move {
            let (_, body) = read_request(&mut server, &password_key).await;
            assert_eq!(body["cashier"], 3);
            server
                .write_all(&encode_response(0xa1, &json!({"message": "No such cashier"}), &password_key))
                .await
                .unwrap();
            let (_, body) = read_request(&mut server, &password_key).await;
            assert_eq!(body["cashier"], 2);
            server
                .write_all(&encode_response(0x01, &json!({"key": encoded}), &password_key))
                .await
                .unwrap();
        });

        let chosen = client
            .login_with_fallback(&[CashierCredentials::new(3, 3), CashierCredentials::new(2, 2)])
            .await
            .unwrap();
        assert_eq!(chosen, CashierCredentials::new(2, 2));
        assert!(client.is_logged_in());
    }

    #[tokio::test]
    async fn test_login_with_no_candidates() {
        let mut client = HdmClient::new(DuplexConnector::new(Vec::new()), "pw");
        let err = client.login_with_fallback(&[]).await.unwrap_err();
        assert!(matches!(err, HdmError::NoCredentials));
    }

    #[tokio::test]
    async fn test_short_session_key_rejected() {
        let (client_io, mut server) = tokio::io::duplex(4096);
        let mut client = HdmClient::new(DuplexConnector::new(vec![client_io]), "pw");
        let key = SessionKey::from_password("pw");

        tokio::spawn(async move {
            read_request(&mut server, &key).await;
            server
                .write_all(&encode_response(0x01, &json!({"key": "AAAA"}), &key))
                .await
                .unwrap();
        });

        let err = client.login(CashierCredentials::new(3, 3)).await.unwrap_err();
        assert!(matches!(
            err,
            HdmError::Cipher(crate::protocol::CipherError::InvalidKeyLength(3))
        ));
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_close_resets_session() {
        let (client_io, mut server) = tokio::io::duplex(4096);
        let mut client = HdmClient::new(DuplexConnector::new(vec![client_io]), "pw");
        let password_key = SessionKey::from_password("pw");
        let (encoded, _) = session_key();

        tokio::spawn(async move {
            read_request(&mut server, &password_key).await;
            server
                .write_all(&encode_response(0x01, &json!({"key": encoded}), &password_key))
                .await
                .unwrap();
        });

        client.login(CashierCredentials::new(3, 3)).await.unwrap();
        client.close().await;

        assert!(!client.is_logged_in());
        assert!(!client.is_connected());
        assert_eq!(client.next_seq(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_call_never_leaks_its_reply() {
        let (client_io, mut server) = tokio::io::duplex(4096);
        let (second_io, mut second_server) = tokio::io::duplex(4096);
        let mut client = HdmClient::new(DuplexConnector::new(vec![client_io, second_io]), "pw");
        let key = SessionKey::from_password("pw");

        let server_task = tokio::spawn(async move {
            read_request(&mut server, &key).await;
            // answer only after the caller gave up
            tokio::time::sleep(Duration::from_millis(60)).await;
            let _ = server
                .write_all(&encode_response(0x02, &json!({"c": [{"id": 111}]}), &key))
                .await;

            read_request(&mut second_server, &key).await;
            second_server
                .write_all(&encode_response(0x02, &json!({"c": [{"id": 222}]}), &key))
                .await
                .unwrap();
        });

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), client.get_operator_list()).await;
        assert!(cancelled.is_err());
        tokio::time::sleep(Duration::from_millis(80)).await;

        let operators = client.get_operator_list().await.unwrap();
        assert_eq!(operators.operators[0].id, 222);
        assert_eq!(client.connector.connects.load(Ordering::SeqCst), 2);

        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_stalled_write_times_out_and_drops_socket() {
        // the peer never reads, so the request cannot fit in the pipe
        let (client_io, _server) = tokio::io::duplex(8);
        let mut client = HdmClient::new(DuplexConnector::new(vec![client_io]), "pw")
            .with_response_timeout(Duration::from_millis(50));

        let err = client.get_operator_list().await.unwrap_err();
        assert!(matches!(err, HdmError::WriteTimeout));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let mut client = HdmClient::new(DuplexConnector::new(Vec::new()), "pw");
        let err = client.get_operator_list().await.unwrap_err();
        assert!(matches!(err, HdmError::Connect { ref endpoint, .. } if endpoint == "duplex"));
    }
}
