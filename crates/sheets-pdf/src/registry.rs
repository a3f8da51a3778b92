//! Document formats a backend can load and store, and the per-call
//! overlay that carries PDF export options.
//!
//! The default registry is built once and shared behind an `Arc`. Calls
//! that bring options never touch it: they get a copy-on-write registry in
//! which only the PDF descriptor is replaced.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::config::{ConvertConfiguration, OptionMap, OptionValue};
use crate::error::RegistryError;

/// Store-property key that carries the caller's export options.
pub const FILTER_DATA: &str = "FilterData";

/// Store/load-property key naming the backend filter.
pub const FILTER_NAME: &str = "FilterName";

/// Extension of the format every export writes.
pub const PDF_EXTENSION: &str = "pdf";

/// Named properties handed to the backend for one load or store.
pub type PropertyMap = OptionMap;

/// Kind of document a format holds; selects which store properties apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFamily {
    Text,
    Spreadsheet,
    Presentation,
    Drawing,
}

impl fmt::Display for DocumentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentFamily::Text => "text",
            DocumentFamily::Spreadsheet => "spreadsheet",
            DocumentFamily::Presentation => "presentation",
            DocumentFamily::Drawing => "drawing",
        };
        f.write_str(name)
    }
}

/// One file format and how the backend loads and stores it.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFormat {
    pub name: String,
    pub extension: String,
    pub media_type: String,
    /// Family of documents loaded from this format, if it can be loaded.
    pub input_family: Option<DocumentFamily>,
    pub load_properties: PropertyMap,
    /// Properties for storing a document of the given family in this format.
    pub store_properties: HashMap<DocumentFamily, PropertyMap>,
}

impl DocumentFormat {
    pub fn new(name: &str, extension: &str, media_type: &str) -> Self {
        Self {
            name: name.to_string(),
            extension: extension.to_ascii_lowercase(),
            media_type: media_type.to_string(),
            input_family: None,
            load_properties: PropertyMap::new(),
            store_properties: HashMap::new(),
        }
    }

    /// Mark the format as loadable into `family`.
    pub fn input(mut self, family: DocumentFamily) -> Self {
        self.input_family = Some(family);
        self
    }

    pub fn load_property(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.load_properties.insert(name.to_string(), value.into());
        self
    }

    /// Store documents of `family` through `filter`.
    pub fn store_filter(mut self, family: DocumentFamily, filter: &str) -> Self {
        self.store_properties
            .entry(family)
            .or_default()
            .insert(FILTER_NAME.to_string(), filter.into());
        self
    }

    pub fn store_properties(&self, family: DocumentFamily) -> Option<&PropertyMap> {
        self.store_properties.get(&family)
    }
}

/// Formats indexed by lower-case extension.
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    formats: IndexMap<String, Arc<DocumentFormat>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the descriptor for `format.extension`.
    pub fn insert(&mut self, format: DocumentFormat) {
        self.formats
            .insert(format.extension.clone(), Arc::new(format));
    }

    pub fn with(mut self, format: DocumentFormat) -> Self {
        self.insert(format);
        self
    }

    /// Look a format up by extension, with or without the leading dot.
    pub fn by_extension(&self, extension: &str) -> Option<&DocumentFormat> {
        let key = extension.trim_start_matches('.').to_ascii_lowercase();
        self.formats.get(&key).map(Arc::as_ref)
    }

    /// Store properties of `extension` for documents of `family`.
    pub fn store_properties(
        &self,
        extension: &str,
        family: DocumentFamily,
    ) -> Option<&PropertyMap> {
        self.by_extension(extension)?.store_properties(family)
    }

    pub fn formats(&self) -> impl Iterator<Item = &DocumentFormat> {
        self.formats.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// A registry identical to this one except for the store properties of
    /// `extension` for `family`. Every other descriptor is shared.
    pub fn with_store_properties(
        &self,
        extension: &str,
        family: DocumentFamily,
        properties: PropertyMap,
    ) -> Result<FormatRegistry, RegistryError> {
        let key = extension.trim_start_matches('.').to_ascii_lowercase();
        let current = self
            .formats
            .get(&key)
            .ok_or_else(|| RegistryError::UnknownFormat(key.clone()))?;

        let mut format = DocumentFormat::clone(current);
        format.store_properties.insert(family, properties);

        let mut formats = self.formats.clone();
        formats.insert(key, Arc::new(format));
        Ok(FormatRegistry { formats })
    }

    /// Whether two registries hold the very same descriptor for `extension`.
    pub fn shares_format(&self, other: &FormatRegistry, extension: &str) -> bool {
        match (self.formats.get(extension), other.formats.get(extension)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

static DEFAULT_REGISTRY: Lazy<Arc<FormatRegistry>> = Lazy::new(|| Arc::new(standard_formats()));

/// The process-wide default registry.
pub fn default_registry() -> Arc<FormatRegistry> {
    Arc::clone(&DEFAULT_REGISTRY)
}

/// Formats a LibreOffice backend understands out of the box.
pub fn standard_formats() -> FormatRegistry {
    use DocumentFamily::*;

    FormatRegistry::new()
        .with(
            DocumentFormat::new("Portable Document Format", "pdf", "application/pdf")
                .store_filter(Text, "writer_pdf_Export")
                .store_filter(Spreadsheet, "calc_pdf_Export")
                .store_filter(Presentation, "impress_pdf_Export")
                .store_filter(Drawing, "draw_pdf_Export"),
        )
        .with(
            DocumentFormat::new(
                "Excel 2007-365",
                "xlsx",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            )
            .input(Spreadsheet)
            .store_filter(Spreadsheet, "Calc MS Excel 2007 XML"),
        )
        .with(
            DocumentFormat::new("Excel 97-2003", "xls", "application/vnd.ms-excel")
                .input(Spreadsheet)
                .store_filter(Spreadsheet, "MS Excel 97"),
        )
        .with(
            DocumentFormat::new(
                "OpenDocument Spreadsheet",
                "ods",
                "application/vnd.oasis.opendocument.spreadsheet",
            )
            .input(Spreadsheet)
            .store_filter(Spreadsheet, "calc8"),
        )
        .with(
            DocumentFormat::new("Comma Separated Values", "csv", "text/csv")
                .input(Spreadsheet)
                .load_property(FILTER_NAME, "Text - txt - csv (StarCalc)")
                // comma separated, double-quoted, system charset
                .load_property("FilterOptions", "44,34,0")
                .store_filter(Spreadsheet, "Text - txt - csv (StarCalc)"),
        )
        .with(
            DocumentFormat::new(
                "OpenDocument Text",
                "odt",
                "application/vnd.oasis.opendocument.text",
            )
            .input(Text)
            .store_filter(Text, "writer8"),
        )
        .with(
            DocumentFormat::new(
                "Word 2007-365",
                "docx",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            )
            .input(Text)
            .store_filter(Text, "MS Word 2007 XML"),
        )
        .with(
            DocumentFormat::new("Word 97-2003", "doc", "application/msword")
                .input(Text)
                .store_filter(Text, "MS Word 97"),
        )
        .with(
            DocumentFormat::new(
                "OpenDocument Presentation",
                "odp",
                "application/vnd.oasis.opendocument.presentation",
            )
            .input(Presentation)
            .store_filter(Presentation, "impress8"),
        )
        .with(
            DocumentFormat::new(
                "PowerPoint 2007-365",
                "pptx",
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            )
            .input(Presentation)
            .store_filter(Presentation, "Impress MS PowerPoint 2007 XML"),
        )
        .with(
            DocumentFormat::new(
                "OpenDocument Drawing",
                "odg",
                "application/vnd.oasis.opendocument.graphics",
            )
            .input(Drawing)
            .store_filter(Drawing, "draw8"),
        )
}

/// Registry to convert with for one export.
///
/// Without options this is `default` itself. Otherwise the spreadsheet store
/// properties of the PDF format are copied, the whole option map is put
/// under [`FILTER_DATA`] and a new registry is returned. Option names and
/// values are not checked here.
pub fn build_registry(
    default: &Arc<FormatRegistry>,
    configuration: &ConvertConfiguration,
) -> Result<Arc<FormatRegistry>, RegistryError> {
    if !configuration.has_options() {
        return Ok(Arc::clone(default));
    }

    let pdf = default
        .by_extension(PDF_EXTENSION)
        .ok_or_else(|| RegistryError::UnknownFormat(PDF_EXTENSION.to_string()))?;
    let mut properties = pdf
        .store_properties(DocumentFamily::Spreadsheet)
        .cloned()
        .unwrap_or_default();
    properties.insert(
        FILTER_DATA.to_string(),
        OptionValue::Map(configuration.options().clone()),
    );
    tracing::debug!(
        "Export options: {} entries under {FILTER_DATA}",
        configuration.options().len()
    );

    let registry =
        default.with_store_properties(PDF_EXTENSION, DocumentFamily::Spreadsheet, properties)?;
    Ok(Arc::new(registry))
}
