//! Writing a workbook to the intermediate file a backend converts from.

use std::path::Path;

use crate::error::SerializeError;

/// Serializes a workbook of type `W` to a file the backend can load.
pub trait SpreadsheetSerializer<W: ?Sized>: Send + Sync {
    /// Extension (without the dot) of the files this serializer writes.
    ///
    /// The backend picks its import filter from it, so the intermediate
    /// file is always named with this suffix.
    fn file_extension(&self) -> &str;

    /// Write `workbook` to `path`, replacing any existing file.
    fn serialize(&self, workbook: &W, path: &Path) -> Result<(), SerializeError>;
}
