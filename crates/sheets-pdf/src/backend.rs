//! The conversion service an exporter delegates rendering to.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::registry::{self, FormatRegistry};

/// A stateful document-conversion service.
///
/// `start` and `stop` bring the service up and down; `convert` renders
/// `source` into `destination`, choosing load and store properties from
/// `registry` by file extension.
#[async_trait]
pub trait ConversionBackend: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn start(&mut self) -> Result<(), Self::Error>;

    async fn stop(&mut self) -> Result<(), Self::Error>;

    fn is_running(&self) -> bool;

    async fn convert(
        &mut self,
        source: &Path,
        destination: &Path,
        registry: &FormatRegistry,
    ) -> Result<(), Self::Error>;

    /// Registry used when an export brings no options of its own.
    fn default_registry(&self) -> Arc<FormatRegistry> {
        registry::default_registry()
    }
}

/// Builds unstarted backends bound to a port.
pub trait BackendFactory: Send + Sync {
    type Backend: ConversionBackend;

    fn bind(&self, port: u16) -> Self::Backend;
}
