//! Receipt pipeline: draft -> layout -> raster -> ESC/POS -> device
//!
//! Layout and encoding run everywhere; anything that paints glyphs needs a
//! TrueType font and skips without one (set POS_TEST_FONT).

use image::{GrayImage, Luma};
use pos_terminal::testing::{load_test_fonts, sample_draft, RecordingConnector};
use pos_terminal::thermal::escpos::{encode_receipt, ESC, FEED_BEFORE_CUT, GS};
use pos_terminal::thermal::layout::{default_barcode_payload, DrawOp};
use pos_terminal::thermal::{
    compose, to_monochrome, BarcodeSource, Language, PaperWidth, PrinterSettings, ReceiptDraft,
    ThermalError, ThermalPrinter,
};

const PRINT_TIME: i64 = 1_792_300_000;

fn has_matrix(ops: &[DrawOp]) -> bool {
    ops.iter().any(|op| matches!(op, DrawOp::Matrix { .. }))
}

#[test]
fn test_layout_carries_every_section() {
    let layout = compose(&sample_draft(), PaperWidth::Mm72, Language::Hy, PRINT_TIME).unwrap();
    let texts: Vec<&str> = layout.texts().map(|t| t.text.as_str()).collect();

    for expected in [
        "Piccola",
        "08290572",
        "Մեգի ՍՊԸ",
        "Անահիտ Ա.",
        "Անուն Ազգանուն",
        "18/10/2026, 14:05",
        "1. Թխվածքաբլիթ",
        "կարագով",
        "2. Latte",
        "1200",
        "2600",
        "Վճարված",
    ] {
        assert!(texts.contains(&expected), "missing {expected:?} in {texts:?}");
    }

    let caption = default_barcode_payload(PRINT_TIME, Some("17"));
    assert!(texts.contains(&caption.as_str()));
    assert!(has_matrix(&layout.ops));
}

#[test]
fn test_fiscal_payload_replaces_generated_code() {
    let mut draft = sample_draft();
    draft.set_barcode(BarcodeSource::Payload("63211234-1".to_string()));

    let layout = compose(&draft, PaperWidth::Mm80, Language::En, PRINT_TIME).unwrap();
    assert!(layout.texts().any(|t| t.text == "63211234-1"));
    assert!(!layout.texts().any(|t| t.text.starts_with("Y-")));
    assert!(has_matrix(&layout.ops));
}

#[test]
fn test_layout_labels_follow_language() {
    let layout = compose(&sample_draft(), PaperWidth::Mm58, Language::En, PRINT_TIME).unwrap();
    assert!(layout.texts().any(|t| t.text == "Total"));
    assert!(layout.texts().any(|t| t.text == "Cashier"));
    assert_eq!(layout.width, PaperWidth::Mm58.dots());
}

#[test]
fn test_incomplete_draft_is_rejected_before_layout() {
    let mut draft = ReceiptDraft::new();
    let err = compose(&draft, PaperWidth::Mm72, Language::Hy, PRINT_TIME).unwrap_err();
    assert!(err.is_incomplete_draft());

    // every section has to be there, not just the company
    draft.set_company(sample_draft().company().cloned().unwrap());
    assert!(matches!(
        compose(&draft, PaperWidth::Mm72, Language::Hy, PRINT_TIME),
        Err(ThermalError::CashierNotSet)
    ));
}

#[test]
fn test_escpos_job_for_monochrome_image() {
    let mut image = GrayImage::from_pixel(16, 2, Luma([255]));
    image.put_pixel(0, 0, Luma([0]));
    image.put_pixel(15, 1, Luma([40]));
    // just above the threshold stays white
    image.put_pixel(8, 0, Luma([200]));

    let bitmap = to_monochrome(&image, 128);
    let job = encode_receipt(&bitmap);

    assert_eq!(&job[..2], &[ESC, b'@']);
    assert_eq!(&job[2..10], &[GS, b'v', b'0', 0, 2, 0, 2, 0]);
    assert_eq!(&job[10..14], &[0x80, 0x00, 0x00, 0x01]);
    assert_eq!(&job[14..], &[ESC, b'd', FEED_BEFORE_CUT, GS, b'V', 0]);
}

#[test]
fn test_rendered_png_has_paper_width() {
    let Some(fonts) = load_test_fonts() else {
        eprintln!("no test font available, skipping");
        return;
    };
    let printer = ThermalPrinter::new(RecordingConnector::new(), fonts, PrinterSettings::default());

    let image = printer.render(&sample_draft()).unwrap();
    assert_eq!(image.width(), PaperWidth::Mm72.dots());
    assert!(image.pixels().any(|p| p.0[0] < 128));

    let png = printer.render_png(&sample_draft()).unwrap();
    assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
}

#[tokio::test]
async fn test_pre_bill_is_printed_without_code() {
    let Some(fonts) = load_test_fonts() else {
        return;
    };
    let connector = RecordingConnector::new();
    let printer = ThermalPrinter::new(
        connector.clone(),
        fonts,
        PrinterSettings {
            language: Language::En,
            ..Default::default()
        },
    );

    let bill = printer.pre_bill(&sample_draft());
    let layout = compose(&bill, PaperWidth::Mm72, Language::En, PRINT_TIME).unwrap();
    assert!(!has_matrix(&layout.ops));
    assert!(layout.texts().any(|t| t.text == "Pending"));

    let mut draft = sample_draft();
    printer.pre_print(&mut draft).await.unwrap();
    assert_eq!(connector.jobs().await.len(), 1);
    assert!(draft.products().is_empty());
    assert!(draft.company().is_some());
}

#[tokio::test]
async fn test_receipt_print_resets_order_sections() {
    let Some(fonts) = load_test_fonts() else {
        return;
    };
    let connector = RecordingConnector::new();
    let printer = ThermalPrinter::new(connector.clone(), fonts, PrinterSettings::default());

    let mut draft = sample_draft();
    let sent = printer.print(&mut draft).await.unwrap();

    let jobs = connector.jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].len(), sent);
    assert_eq!(&jobs[0][sent - 6..], &[ESC, b'd', FEED_BEFORE_CUT, GS, b'V', 0]);

    assert!(draft.products().is_empty());
    assert!(draft.receipt().is_none());
    assert!(draft.company().is_some());
    assert!(draft.cashier().is_some());
}
