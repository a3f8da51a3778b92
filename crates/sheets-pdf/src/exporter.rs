//! PDF export of a workbook through a conversion backend.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::backend::{BackendFactory, ConversionBackend};
use crate::config::{ConvertConfiguration, ExporterConfig};
use crate::error::ExportError;
use crate::registry::build_registry;
use crate::serializer::SpreadsheetSerializer;
use crate::session::BackendSession;
use crate::temp::TempArtifact;

/// Format identifier of everything a [`PdfExporter`] writes.
pub const FORMAT_TYPE: &str = "PDF";

/// Extension of the files a [`PdfExporter`] writes, with the dot.
pub const EXTENSION: &str = ".pdf";

/// Exports workbooks to PDF.
///
/// The workbook is serialized to a temporary file with `S`, and that file is
/// converted by a backend from `F`. Without an external handle every export
/// starts its own backend on [`port`](Self::port) and stops it afterwards;
/// such exports run one at a time. With [`with_backend`](Self::with_backend)
/// the caller's backend is used as-is and never started or stopped.
pub struct PdfExporter<F: BackendFactory, S> {
    config: ExporterConfig,
    factory: F,
    serializer: S,
    external: Option<Arc<Mutex<F::Backend>>>,
    owned_lock: Mutex<()>,
}

impl<F: BackendFactory, S> PdfExporter<F, S> {
    pub fn new(factory: F, serializer: S) -> Self {
        Self::with_config(factory, serializer, ExporterConfig::default())
    }

    pub fn with_config(factory: F, serializer: S, config: ExporterConfig) -> Self {
        Self {
            config,
            factory,
            serializer,
            external: None,
            owned_lock: Mutex::new(()),
        }
    }

    /// Port owned backends are bound to.
    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Convert through an already-running backend owned by the caller.
    pub fn with_backend(mut self, backend: Arc<Mutex<F::Backend>>) -> Self {
        self.external = Some(backend);
        self
    }

    pub fn format_type(&self) -> &'static str {
        FORMAT_TYPE
    }

    pub fn extension(&self) -> &'static str {
        EXTENSION
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    /// The caller-supplied backend, if any.
    pub fn backend(&self) -> Option<&Arc<Mutex<F::Backend>>> {
        self.external.as_ref()
    }

    /// Write `workbook` to `target` as PDF.
    ///
    /// The temporary file is deleted and an owned backend is stopped on
    /// every path out of this call. A target written before a failure is
    /// left in place.
    pub async fn export<W>(
        &self,
        workbook: &W,
        configuration: &ConvertConfiguration,
        target: impl AsRef<Path>,
    ) -> Result<(), ExportError>
    where
        W: ?Sized + Sync,
        S: SpreadsheetSerializer<W>,
    {
        let target = target.as_ref();
        tracing::info!("Exporting workbook to {}", target.display());

        let _one_at_a_time = match self.external {
            Some(_) => None,
            None => Some(self.owned_lock.lock().await),
        };

        let mut session =
            BackendSession::acquire(self.external.as_ref(), &self.factory, self.config.port)
                .await
                .map_err(|e| ExportError::BackendStart(Box::new(e)))?;

        let mut artifact: Option<TempArtifact> = None;
        let outcome: Result<(), ExportError> = async {
            let suffix = format!(".{}", self.serializer.file_extension());
            let temp = artifact.insert(
                TempArtifact::create(
                    self.config.temp_dir.as_deref(),
                    &self.config.temp_prefix,
                    &suffix,
                )
                .map_err(ExportError::TempCreate)?,
            );

            self.serializer
                .serialize(workbook, temp.path())
                .map_err(ExportError::Serialization)?;

            let backend = session.backend();
            let registry = build_registry(&backend.default_registry(), configuration)
                .map_err(|e| ExportError::Conversion(Box::new(e)))?;
            backend
                .convert(temp.path(), target, &registry)
                .await
                .map_err(|e| ExportError::Conversion(Box::new(e)))
        }
        .await;

        if let Some(temp) = artifact {
            temp.destroy();
        }

        match session.release().await {
            Ok(()) => {
                if outcome.is_ok() {
                    tracing::info!("Wrote {}", target.display());
                }
                outcome
            }
            Err(e) => Err(ExportError::BackendStop {
                source: Box::new(e),
                prior: outcome.err().map(Box::new),
            }),
        }
    }

    /// [`export`](Self::export) on a private current-thread runtime.
    ///
    /// Panics if called from inside an async runtime.
    pub fn export_blocking<W>(
        &self,
        workbook: &W,
        configuration: &ConvertConfiguration,
        target: impl AsRef<Path>,
    ) -> Result<(), ExportError>
    where
        W: ?Sized + Sync,
        S: SpreadsheetSerializer<W>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ExportError::Runtime)?;
        runtime.block_on(self.export(workbook, configuration, target))
    }
}

impl<F: BackendFactory, S> std::fmt::Debug for PdfExporter<F, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfExporter")
            .field("config", &self.config)
            .field("external_backend", &self.external.is_some())
            .finish()
    }
}

