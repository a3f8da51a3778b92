//! Error types for sheets-pdf

use thiserror::Error;

/// Boxed error raised by a conversion backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors building or editing the in-memory workbook
#[derive(Debug, Error)]
pub enum WorkbookError {
    /// Invalid sheet name
    #[error("Invalid sheet name: {0}")]
    InvalidSheetName(String),

    /// Duplicate sheet name
    #[error("Sheet name already exists: {0}")]
    DuplicateSheetName(String),

    /// Row index out of bounds
    #[error("Row index {0} out of bounds (max: {1})")]
    RowOutOfBounds(u32, u32),

    /// Column index out of bounds
    #[error("Column index {0} out of bounds (max: {1})")]
    ColumnOutOfBounds(u16, u16),
}

/// Errors writing the intermediate spreadsheet file
#[derive(Debug, Error)]
pub enum SerializeError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The workbook cannot be represented in the target format
    #[error("Unsupported workbook: {0}")]
    Unsupported(String),
}

/// Errors deriving a format registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No descriptor registered for the extension
    #[error("no document format registered for extension '{0}'")]
    UnknownFormat(String),
}

/// Failure of one export call.
///
/// Exactly one of these is reported per call. A backend that fails to stop
/// after an earlier failure carries that failure in `prior`.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The owned backend could not be started
    #[error("failed to start conversion backend: {0}")]
    BackendStart(#[source] BoxError),

    /// No temporary file could be allocated
    #[error("failed to create temporary file: {0}")]
    TempCreate(#[source] std::io::Error),

    /// The workbook could not be written to the temporary file
    #[error("failed to serialize workbook: {0}")]
    Serialization(#[source] SerializeError),

    /// The backend rejected or failed the conversion
    #[error("conversion failed: {0}")]
    Conversion(#[source] BoxError),

    /// The owned backend could not be stopped
    #[error("failed to stop conversion backend: {source}{}", prior_suffix(.prior))]
    BackendStop {
        #[source]
        source: BoxError,
        prior: Option<Box<ExportError>>,
    },

    /// `export_blocking` could not build its runtime
    #[error("failed to build async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

fn prior_suffix(prior: &Option<Box<ExportError>>) -> String {
    match prior {
        Some(e) => format!(" (after: {e})"),
        None => String::new(),
    }
}
