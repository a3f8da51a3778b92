//! Spreadsheet to PDF export through an external conversion backend.
//!
//! A [`PdfExporter`] writes a workbook to a temporary file, hands that file to
//! a [`ConversionBackend`] together with a [`FormatRegistry`] carrying the
//! caller's PDF options, and cleans up afterwards: the temporary file is
//! always deleted and a backend the exporter started is always stopped.
//!
//! # Example
//!
//! ```rust,ignore
//! use sheets_pdf::{ConvertConfiguration, PdfExporter, Workbook, XlsxSerializer};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.add_worksheet("Sheet1")?;
//! workbook.worksheet_mut(sheet).unwrap().set_cell(0, 0, "Hello")?;
//!
//! let exporter = PdfExporter::new(factory, XlsxSerializer);
//! let options = ConvertConfiguration::new("PDF").with_option("Printing", 0);
//! exporter.export(&workbook, &options, "report.pdf").await?;
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod exporter;
pub mod registry;
pub mod serializer;
pub mod session;
pub mod temp;
pub mod workbook;
pub mod xlsx;

pub use backend::{BackendFactory, ConversionBackend};
pub use config::{ConvertConfiguration, ExporterConfig, OptionMap, OptionValue, DEFAULT_PORT};
pub use error::{BoxError, ExportError, RegistryError, SerializeError, WorkbookError};
pub use exporter::{PdfExporter, EXTENSION, FORMAT_TYPE};
pub use registry::{
    build_registry, default_registry, DocumentFamily, DocumentFormat, FormatRegistry, PropertyMap,
};
pub use serializer::SpreadsheetSerializer;
pub use session::BackendSession;
pub use temp::TempArtifact;
pub use workbook::{CellValue, Workbook, Worksheet};
pub use xlsx::XlsxSerializer;
