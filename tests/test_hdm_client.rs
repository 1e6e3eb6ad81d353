//! HDM client against a fake terminal over real TCP
//!
//! Covers the session lifecycle end to end: password-key commands, login
//! and the session key, sequence numbering, reconnects after faults and
//! device errors.


use pos_terminal::hdm::{CashierCredentials, HdmClient, HdmError};
use pos_terminal::protocol::{
    CashInOutRequest, FunctionCode, HeaderFooterLine, HeaderFooterRequest, LogoRequest,
    ReceiptItem, ReceiptMode, ReceiptRequest, ReportRequest, ReportType, ReturnItem,
    ReturnRequest, TemplateRequest,
};
use serde_json::json;
use pos_terminal::testing::fake_hdm::BAD_CREDENTIALS;
use pos_terminal::testing::FakeHdmTerminal;
use std::time::Duration;
use test_helpers::{client_for, TEST_PASSWORD};

fn latte_receipt() -> ReceiptRequest {
    ReceiptRequest {
        items: vec![ReceiptItem {
            product_code: "0".to_string(),
            product_name: "Latte(oat)".to_string(),
            price: 1400.0,
            qty: 2.0,
            dep: 1,
            discount: None,
            discount_type: None,
            additional_discount: None,
            adg_code: "1905".to_string(),
            unit: "Հատ".to_string(),
        }],
        mode: ReceiptMode::ItemsList,
        paid_amount: 2800.0,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_operator_list_uses_password_key() {
    let terminal = FakeHdmTerminal::builder(TEST_PASSWORD)
        .accept_cashiers(vec![CashierCredentials::new(3, 3), CashierCredentials::new(2, 2)])
        .spawn()
        .await
        .unwrap();
    let mut client = client_for(&terminal);

    let operators = client.get_operator_list().await.unwrap();
    assert_eq!(operators.operators.len(), 2);
    assert_eq!(operators.operators[0].id, 3);

    let requests = terminal.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].function, FunctionCode::OperatorList.as_u8());
    assert_eq!(requests[0].body["password"], TEST_PASSWORD);
    assert!(!client.is_logged_in());
}

#[tokio::test]
async fn test_login_then_receipt_numbers_session_calls() {
    let terminal = FakeHdmTerminal::builder(TEST_PASSWORD).spawn().await.unwrap();
    let mut client = client_for(&terminal);

    client.login(CashierCredentials::new(3, 3)).await.unwrap();
    assert!(client.is_logged_in());
    assert_eq!(client.next_seq(), 1);

    let response = client.print_receipt(&latte_receipt()).await.unwrap();
    assert_eq!(response.rseq, Some(1));
    assert_eq!(response.qr.as_deref(), Some("63211234-1"));
    assert_eq!(response.total, Some(2800.0));

    client.get_date_time().await.unwrap();
    assert_eq!(client.next_seq(), 3);

    let requests = terminal.requests().await;
    assert_eq!(
        requests.iter().map(|r| r.function).collect::<Vec<_>>(),
        vec![0x02, 0x04, 0x0c]
    );
    assert_eq!(requests[0].body["cashier"], 3);
    assert_eq!(requests[0].body["pin"], 3);
    assert_eq!(requests[1].seq(), Some(1));
    assert_eq!(requests[1].body["items"][0]["productName"], "Latte(oat)");
    assert_eq!(requests[1].body["mode"], 2);
    assert_eq!(requests[2].seq(), Some(2));

    // one connection for the whole session
    assert_eq!(terminal.connections().await, 1);
}

#[tokio::test]
async fn test_login_falls_back_to_next_cashier() {
    let terminal = FakeHdmTerminal::builder(TEST_PASSWORD)
        .accept_cashiers(vec![CashierCredentials::new(2, 2)])
        .spawn()
        .await
        .unwrap();
    let mut client = client_for(&terminal);

    let accepted = client
        .login_with_fallback(&[CashierCredentials::new(3, 3), CashierCredentials::new(2, 2)])
        .await
        .unwrap();

    assert_eq!(accepted, CashierCredentials::new(2, 2));
    assert!(client.is_logged_in());
    assert_eq!(terminal.functions().await, vec![0x02, 0x02]);
}

#[tokio::test]
async fn test_all_cashiers_rejected() {
    let terminal = FakeHdmTerminal::builder(TEST_PASSWORD)
        .accept_cashiers(Vec::new())
        .spawn()
        .await
        .unwrap();
    let mut client = client_for(&terminal);

    let err = client
        .login_with_fallback(&[CashierCredentials::new(3, 3), CashierCredentials::new(2, 2)])
        .await
        .unwrap_err();

    assert_eq!(err.device_code(), Some(BAD_CREDENTIALS));
    assert!(err.to_string().contains("Wrong cashier or pin"));
    assert!(!client.is_logged_in());
    // a device error is an answer, the socket stays usable
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_session_call_without_login_never_connects() {
    let terminal = FakeHdmTerminal::builder(TEST_PASSWORD).spawn().await.unwrap();
    let mut client = client_for(&terminal);

    let err = client.print_receipt(&latte_receipt()).await.unwrap_err();
    assert!(matches!(err, HdmError::NotLoggedIn));
    assert_eq!(client.next_seq(), 1);
    assert_eq!(terminal.connections().await, 0);
}

#[tokio::test]
async fn test_timeout_drops_socket_and_reconnects_with_same_session() {
    let terminal = FakeHdmTerminal::builder(TEST_PASSWORD)
        .silent(FunctionCode::PrintReceipt)
        .spawn()
        .await
        .unwrap();
    let mut client = HdmClient::new(terminal.connector(), TEST_PASSWORD)
        .with_response_timeout(Duration::from_millis(200));

    client.login(CashierCredentials::new(3, 3)).await.unwrap();
    let err = client.print_receipt(&latte_receipt()).await.unwrap_err();

    assert!(matches!(err, HdmError::Timeout { .. }));
    assert!(!client.is_connected());
    assert!(client.is_logged_in());
    assert_eq!(client.next_seq(), 2);

    client.get_date_time().await.unwrap();
    assert_eq!(terminal.connections().await, 2);

    let requests = terminal.requests().await;
    let last = requests.last().unwrap();
    assert_eq!(last.function, FunctionCode::DateTime.as_u8());
    assert_eq!(last.seq(), Some(2));
}

#[tokio::test]
async fn test_device_error_keeps_connection_and_session() {
    let terminal = FakeHdmTerminal::builder(TEST_PASSWORD)
        .fail(FunctionCode::PrintReceipt, 0xa2, "Not enough paper")
        .spawn()
        .await
        .unwrap();
    let mut client = client_for(&terminal);

    client.login(CashierCredentials::new(3, 3)).await.unwrap();
    let err = client.print_receipt(&latte_receipt()).await.unwrap_err();

    assert!(matches!(
        &err,
        HdmError::Device { code: 0xa2, message } if message == "Not enough paper"
    ));
    assert!(!err.is_connection_fault());
    assert!(client.is_connected());
    assert!(client.is_logged_in());

    client.get_date_time().await.unwrap();
    assert_eq!(terminal.connections().await, 1);
}

#[tokio::test]
async fn test_logout_resets_sequence() {
    let terminal = FakeHdmTerminal::builder(TEST_PASSWORD).spawn().await.unwrap();
    let mut client = client_for(&terminal);

    client.login(CashierCredentials::new(3, 3)).await.unwrap();
    client.get_date_time().await.unwrap();
    client.logout().await.unwrap();

    assert!(!client.is_logged_in());
    assert_eq!(client.next_seq(), 1);
    assert!(matches!(
        client.get_date_time().await,
        Err(HdmError::NotLoggedIn)
    ));

    client.login(CashierCredentials::new(3, 3)).await.unwrap();
    client.get_date_time().await.unwrap();
    let requests = terminal.requests().await;
    assert_eq!(requests.last().unwrap().seq(), Some(1));
}

#[tokio::test]
async fn test_receipt_info_sends_receipt_id() {
    let terminal = FakeHdmTerminal::builder(TEST_PASSWORD).spawn().await.unwrap();
    let mut client = client_for(&terminal);

    client.login(CashierCredentials::new(3, 3)).await.unwrap();
    client.get_receipt_info(42).await.unwrap();

    let requests = terminal.requests().await;
    let last = requests.last().unwrap();
    assert_eq!(last.function, FunctionCode::ReceiptInfo.as_u8());
    assert_eq!(last.body["receiptId"], 42);
    assert_eq!(last.seq(), Some(1));
}

#[tokio::test]
async fn test_wrong_password_cannot_read_replies() {
    let terminal = FakeHdmTerminal::builder(TEST_PASSWORD).spawn().await.unwrap();
    let mut client = HdmClient::new(terminal.connector(), "not-the-password")
        .with_response_timeout(Duration::from_millis(500));

    let err = client.get_operator_list().await.unwrap_err();
    assert!(
        matches!(err, HdmError::Cipher(_) | HdmError::Json(_)),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_close_forgets_session_and_socket() {
    let terminal = FakeHdmTerminal::builder(TEST_PASSWORD).spawn().await.unwrap();
    let mut client = client_for(&terminal);

    client.login(CashierCredentials::new(3, 3)).await.unwrap();
    client.get_date_time().await.unwrap();
    client.close().await;

    assert!(!client.is_connected());
    assert!(!client.is_logged_in());
    assert_eq!(client.next_seq(), 1);
}

#[tokio::test]
async fn test_session_commands_send_their_function_and_payload() {
    let terminal = FakeHdmTerminal::builder(TEST_PASSWORD).spawn().await.unwrap();
    let mut client = client_for(&terminal);
    client.login(CashierCredentials::new(3, 3)).await.unwrap();

    client.print_last_copy().await.unwrap();
    client
        .print_return(&ReturnRequest {
            crn: Some("63211234".to_string()),
            receipt_id: 17,
            return_item_list: Some(vec![ReturnItem {
                rpid: 0,
                quantity: 1.0,
            }]),
            cash_amount_for_return: Some(1400.0),
            card_amount_for_return: None,
        })
        .await
        .unwrap();
    client
        .set_header_footer(&HeaderFooterRequest {
            headers: vec![HeaderFooterLine {
                text: "Piccola".to_string(),
                align: Some(1),
                bold: Some(true),
                font_size: None,
            }],
            footers: Vec::new(),
        })
        .await
        .unwrap();
    client
        .set_logo(&LogoRequest {
            logo: "iVBORw0KGgo=".to_string(),
        })
        .await
        .unwrap();
    client
        .print_report(&ReportRequest {
            report_type: ReportType::Z,
            start_date: None,
            end_date: None,
            dept_id: Some(1),
        })
        .await
        .unwrap();
    client
        .cash_in_out(&CashInOutRequest {
            amount: 5000.0,
            is_cash_in: true,
            description: Some("float".to_string()),
        })
        .await
        .unwrap();
    let mut fields = serde_json::Map::new();
    fields.insert("amount".to_string(), json!(300));
    client
        .print_template(&TemplateRequest {
            template_type: 2,
            fields,
        })
        .await
        .unwrap();
    client
        .sync_device(&json!({ "deviceId": "bar-2" }))
        .await
        .unwrap();

    let expected = [
        (FunctionCode::PrintLastCopy, json!({ "seq": 1 })),
        (
            FunctionCode::PrintReturn,
            json!({
                "seq": 2,
                "crn": "63211234",
                "receiptId": 17,
                "returnItemList": [{ "rpid": 0, "quantity": 1.0 }],
                "cashAmountForReturn": 1400.0
            }),
        ),
        (
            FunctionCode::SetHeaderFooter,
            json!({
                "seq": 3,
                "headers": [{ "text": "Piccola", "align": 1, "bold": true }],
                "footers": []
            }),
        ),
        (
            FunctionCode::SetLogo,
            json!({ "seq": 4, "logo": "iVBORw0KGgo=" }),
        ),
        (
            FunctionCode::PrintReport,
            json!({ "seq": 5, "reportType": 2, "deptId": 1 }),
        ),
        (
            FunctionCode::CashInOut,
            json!({ "seq": 6, "amount": 5000.0, "isCashIn": true, "description": "float" }),
        ),
        (
            FunctionCode::PrintTemplate,
            json!({ "seq": 7, "templateType": 2, "amount": 300 }),
        ),
        (
            FunctionCode::SyncDevice,
            json!({ "seq": 8, "deviceId": "bar-2" }),
        ),
    ];

    let requests = terminal.requests().await;
    // first request is the login
    assert_eq!(requests.len(), expected.len() + 1);
    for (request, (function, body)) in requests[1..].iter().zip(expected) {
        assert_eq!(request.function, function.as_u8(), "{function:?}");
        assert_eq!(request.body, body, "{function:?}");
    }
    assert_eq!(client.next_seq(), 9);
}
