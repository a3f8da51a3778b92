//! LibreOffice conversion backend for sheets-pdf.
//!
//! Drives a headless LibreOffice over the UNO Remote Protocol (URP): the
//! document is loaded hidden and read-only, stored through the export filter
//! the registry names, then closed.
//!
//! # Architecture
//!
//! ```text
//! PdfExporter (sheets-pdf)
//!     └── LibreOfficeBackend (this crate)
//!           └── UrpConnection (libreoffice-urp crate)
//!                 └── TCP socket to soffice
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use sheets_pdf::{ConvertConfiguration, Workbook};
//! use sheets_pdf_libreoffice::{pdf_exporter, LibreOfficeConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut workbook = Workbook::new();
//! let idx = workbook.add_worksheet("Sheet1")?;
//! if let Some(sheet) = workbook.worksheet_mut(idx) {
//!     sheet.set_cell(0, 0, "Hello")?;
//! }
//!
//! // starts soffice on port 8100 for the export and stops it afterwards
//! let exporter = pdf_exporter(LibreOfficeConfig::default());
//! let options = ConvertConfiguration::new("PDF")
//!     .with_option("PermissionPassword", "pass")
//!     .with_option("RestrictPermissions", true);
//! exporter.export(&workbook, &options, "report.pdf").await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod properties;

pub use backend::{LibreOfficeBackend, LibreOfficeFactory};
pub use config::LibreOfficeConfig;
pub use error::{BackendError, Result};

use sheets_pdf::{ExporterConfig, PdfExporter, XlsxSerializer};

/// A PDF exporter that serializes to XLSX and converts with LibreOffice.
pub type LibreOfficePdfExporter = PdfExporter<LibreOfficeFactory, XlsxSerializer>;

/// Exporter whose owned backends use `config`, bound to `config.port`.
pub fn pdf_exporter(config: LibreOfficeConfig) -> LibreOfficePdfExporter {
    let exporter_config = ExporterConfig {
        port: config.port,
        ..ExporterConfig::default()
    };
    PdfExporter::with_config(LibreOfficeFactory::new(config), XlsxSerializer, exporter_config)
}
