//! Caller-facing configuration: export options and exporter settings.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Port a conversion backend listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 8100;

/// Prefix of the intermediate files an exporter allocates.
pub const DEFAULT_TEMP_PREFIX: &str = "SheetsPdfExporter";

/// Ordered option name -> value mapping.
pub type OptionMap = IndexMap<String, OptionValue>;

/// A single export option value.
///
/// Values are passed to the backend verbatim; nothing here knows which
/// names the backend understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i32),
    Double(f64),
    String(String),
    Map(OptionMap),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&OptionMap> {
        match self {
            OptionValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(v)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Double(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::String(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::String(v)
    }
}

impl From<OptionMap> for OptionValue {
    fn from(v: OptionMap) -> Self {
        OptionValue::Map(v)
    }
}

/// What a caller asks of one export: the target format and its options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertConfiguration {
    format_type: String,
    #[serde(default)]
    options: OptionMap,
}

impl ConvertConfiguration {
    pub fn new(format_type: impl Into<String>) -> Self {
        Self {
            format_type: format_type.into(),
            options: OptionMap::new(),
        }
    }

    /// Builder-style [`set_option`](Self::set_option).
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.set_option(name, value);
        self
    }

    /// Insert or replace an option. Insertion order is kept.
    pub fn set_option(&mut self, name: impl Into<String>, value: impl Into<OptionValue>) {
        self.options.insert(name.into(), value.into());
    }

    pub fn format_type(&self) -> &str {
        &self.format_type
    }

    pub fn options(&self) -> &OptionMap {
        &self.options
    }

    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }
}

/// Settings of a [`PdfExporter`](crate::PdfExporter).
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Port an owned backend is bound to. Default: 8100.
    pub port: u16,
    /// Directory for intermediate files. If None, the platform temp dir.
    pub temp_dir: Option<PathBuf>,
    /// File name prefix of intermediate files.
    pub temp_prefix: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            temp_dir: None,
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
        }
    }
}
