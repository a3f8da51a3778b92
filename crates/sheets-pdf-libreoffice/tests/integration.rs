//! Integration tests against a real LibreOffice.
//!
//! These tests require a running LibreOffice instance with a URP socket listener:
//!
//!    soffice --headless --accept="socket,host=127.0.0.1,port=8100;urp;StarOffice.ComponentContext"
//!
//! If LibreOffice is not reachable on localhost:8100, all tests are skipped.

use std::sync::Arc;

use sheets_pdf::{ConversionBackend, ConvertConfiguration, ExportError, Workbook};
use sheets_pdf_libreoffice::{pdf_exporter, LibreOfficeBackend, LibreOfficeConfig};
use tokio::sync::Mutex;

const PORT: u16 = 8100;

/// Check if a LibreOffice URP listener is available on localhost:8100.
fn urp_available() -> bool {
    std::net::TcpStream::connect_timeout(
        &std::net::SocketAddr::from(([127, 0, 0, 1], PORT)),
        std::time::Duration::from_secs(2),
    )
    .is_ok()
}

/// Skip this test if URP is not available.
macro_rules! skip_if_no_urp {
    () => {
        if !urp_available() {
            eprintln!(
                "SKIP: LibreOffice URP not available on localhost:8100.\n\
                 Start LibreOffice with:\n  \
                 soffice --headless --accept=\"socket,host=127.0.0.1,port=8100;urp;StarOffice.ComponentContext\""
            );
            return;
        }
    };
}

fn one_sheet() -> Workbook {
    let mut wb = Workbook::new();
    let idx = wb.add_worksheet("Sheet1").unwrap();
    let sheet = wb.worksheet_mut(idx).unwrap();
    sheet.set_cell(0, 0, "Region").unwrap();
    sheet.set_cell(0, 1, "Sales").unwrap();
    sheet.set_cell(1, 0, "North").unwrap();
    sheet.set_cell(1, 1, 1250.0).unwrap();
    sheet.set_cell(2, 0, "South").unwrap();
    sheet.set_cell(2, 1, 980.5).unwrap();
    wb
}

async fn attached() -> Arc<Mutex<LibreOfficeBackend>> {
    let backend = LibreOfficeBackend::connect("127.0.0.1", PORT)
        .await
        .expect("connect and bootstrap");
    Arc::new(Mutex::new(backend))
}

#[tokio::test]
async fn test_connect_and_bootstrap() {
    skip_if_no_urp!();

    let mut backend = LibreOfficeBackend::connect("127.0.0.1", PORT)
        .await
        .expect("connect");
    assert!(backend.is_running());
    backend.stop().await.expect("disconnect");
    assert!(!backend.is_running());
}

#[tokio::test]
async fn test_export_scenario() {
    skip_if_no_urp!();

    let dir = tempfile::tempdir().unwrap();
    let handle = attached().await;
    let exporter = pdf_exporter(LibreOfficeConfig::default()).with_backend(Arc::clone(&handle));
    let wb = one_sheet();

    // no options
    let plain = dir.path().join("plain.pdf");
    exporter
        .export(&wb, &ConvertConfiguration::new("PDF"), &plain)
        .await
        .expect("plain export");
    let bytes = std::fs::read(&plain).unwrap();
    assert!(bytes.starts_with(b"%PDF"), "not a PDF");

    // permission options
    let protected = dir.path().join("protected.pdf");
    let options = ConvertConfiguration::new("PDF")
        .with_option("PermissionPassword", "pass")
        .with_option("RestrictPermissions", true)
        .with_option("Printing", 0)
        .with_option("Changes", 4);
    exporter
        .export(&wb, &options, &protected)
        .await
        .expect("protected export");
    let bytes = std::fs::read(&protected).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    // restricted permissions are only possible with an encryption dictionary
    assert!(
        bytes.windows(b"/Encrypt".len()).any(|w| w == b"/Encrypt"),
        "expected an encrypted PDF"
    );

    // unwritable target: its parent is a regular file
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();
    let unwritable = blocker.join("third.pdf");
    let err = exporter
        .export(&wb, &ConvertConfiguration::new("PDF"), &unwritable)
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Conversion(_)), "{err}");

    // the caller's backend is still usable
    assert!(handle.lock().await.is_running());
    handle.lock().await.stop().await.unwrap();
}

