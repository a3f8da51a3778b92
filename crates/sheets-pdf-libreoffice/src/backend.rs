//! LibreOffice as a [`ConversionBackend`]: owns the `soffice` process and
//! the URP connection to it.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use libreoffice_urp::types::type_names;
use libreoffice_urp::{interface, proxy, Type, UnoProxy, UnoValue, UrpConnection, UrpError};
use sheets_pdf::{BackendFactory, ConversionBackend, FormatRegistry};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use url::Url;

use crate::config::LibreOfficeConfig;
use crate::error::{BackendError, Result};
use crate::properties;

const CONNECT_RETRY: Duration = Duration::from_millis(500);

/// How `start` reaches an office.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Spawn `soffice`, terminate it on stop.
    Spawn,
    /// Connect to an office someone else runs; stop only disconnects.
    Attach,
}

struct Session {
    conn: UrpConnection,
    desktop: UnoProxy,
    child: Option<Child>,
    /// Dropped (and deleted) after the process is gone.
    _profile: Option<TempDir>,
    /// False once a call was abandoned mid-flight; replies can no longer
    /// be matched to requests.
    in_sync: bool,
}

/// A LibreOffice instance reachable over URP.
pub struct LibreOfficeBackend {
    config: LibreOfficeConfig,
    mode: Mode,
    session: Option<Session>,
}

impl LibreOfficeBackend {
    /// An unstarted backend that spawns its own `soffice` on `config.port`.
    pub fn bind(config: LibreOfficeConfig) -> Self {
        Self {
            config,
            mode: Mode::Spawn,
            session: None,
        }
    }

    /// An unstarted backend for an office already listening on
    /// `config.host:config.port`. It is never spawned or terminated.
    pub fn attach(config: LibreOfficeConfig) -> Self {
        Self {
            config,
            mode: Mode::Attach,
            session: None,
        }
    }

    /// Connect to a running office.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let config = LibreOfficeConfig {
            host: host.to_string(),
            port,
            ..LibreOfficeConfig::default()
        };
        let mut backend = Self::attach(config);
        backend.start().await?;
        Ok(backend)
    }

    pub fn config(&self) -> &LibreOfficeConfig {
        &self.config
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    async fn spawn(&self) -> Result<Session> {
        let (profile, profile_dir) = match &self.config.profile_dir {
            Some(dir) => (None, dir.clone()),
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("sheets-pdf-profile")
                    .tempdir()
                    .map_err(BackendError::Profile)?;
                let path = dir.path().to_path_buf();
                (Some(dir), path)
            }
        };
        let profile_url = Url::from_directory_path(&profile_dir)
            .map_err(|()| BackendError::InvalidPath(profile_dir.clone()))?;

        self.ensure_port_free().await?;

        let soffice = self.config.soffice();
        let mut cmd = Command::new(&soffice);
        cmd.args(self.config.launch_args(profile_url.as_str()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        tracing::info!("Starting LibreOffice: {:?}", cmd);
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BackendError::NotFound(soffice.clone())
            } else {
                BackendError::SpawnFailed(e)
            }
        })?;

        let limit = self.config.startup_timeout;
        let (conn, desktop) = match timeout(limit, self.await_child(&mut child)).await {
            Ok(Ok(ready)) => ready,
            Ok(Err(e)) => {
                let _ = child.kill().await;
                return Err(e);
            }
            Err(_) => {
                let _ = child.kill().await;
                return Err(BackendError::StartupTimeout(limit.as_secs()));
            }
        };

        Ok(Session {
            conn,
            desktop,
            child: Some(child),
            _profile: profile,
            in_sync: true,
        })
    }

    /// Fails with `PortInUse` while anything listens on the configured port.
    async fn ensure_port_free(&self) -> Result<()> {
        let probe = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|source| BackendError::PortInUse {
                port: self.config.port,
                source,
            })?;
        drop(probe);
        Ok(())
    }

    /// Retry the handshake until the child answers or exits.
    async fn await_child(&self, child: &mut Child) -> Result<(UrpConnection, UnoProxy)> {
        loop {
            if let Some(status) = child.try_wait().map_err(BackendError::SpawnFailed)? {
                return Err(BackendError::ProcessExited(status));
            }
            match self.handshake().await {
                Ok(ready) => return Ok(ready),
                Err(e) => {
                    tracing::trace!("LibreOffice not accepting yet: {e}");
                    sleep(CONNECT_RETRY).await;
                }
            }
        }
    }

    /// Connect, negotiate and bootstrap once.
    async fn handshake(&self) -> std::result::Result<(UrpConnection, UnoProxy), UrpError> {
        let mut conn = UrpConnection::connect(&self.config.host, self.config.port).await?;
        let roots = conn.bootstrap().await?;
        Ok((conn, roots.desktop))
    }

    async fn attach_session(&self) -> Result<Session> {
        let limit = self.config.startup_timeout;
        let (conn, desktop) = timeout(limit, self.handshake())
            .await
            .map_err(|_| BackendError::StartupTimeout(limit.as_secs()))??;

        Ok(Session {
            conn,
            desktop,
            child: None,
            _profile: None,
            in_sync: true,
        })
    }
}

/// `file://` URL of `path`, made absolute against the working directory.
pub fn file_url(path: &Path) -> Result<String> {
    let absolute =
        std::path::absolute(path).map_err(|_| BackendError::InvalidPath(path.to_path_buf()))?;
    Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|()| BackendError::InvalidPath(absolute))
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Load and store descriptors for converting `source` into `destination`.
pub fn conversion_descriptors(
    source: &Path,
    destination: &Path,
    registry: &FormatRegistry,
) -> Result<(UnoValue, UnoValue)> {
    let from = extension_of(source);
    let to = extension_of(destination);
    let unsupported = || BackendError::UnsupportedConversion {
        from: from.clone(),
        to: to.clone(),
    };

    let input = registry.by_extension(&from).ok_or_else(unsupported)?;
    let family = input.input_family.ok_or_else(unsupported)?;
    let store = registry
        .store_properties(&to, family)
        .ok_or_else(unsupported)?;
    tracing::debug!("Converting {from} ({family}) to {to}");

    Ok((
        properties::load_descriptor(&input.load_properties),
        properties::store_descriptor(store),
    ))
}

async fn load_store_close(
    session: &mut Session,
    source_url: String,
    destination_url: String,
    load: UnoValue,
    store: UnoValue,
) -> Result<()> {
    let conn = &mut session.conn;
    let loaded = conn
        .call(
            &session.desktop,
            &interface::load_component_from_url(),
            &[
                UnoValue::String(source_url.clone()),
                UnoValue::String("_blank".to_string()),
                UnoValue::Long(0),
                load,
            ],
        )
        .await
        .map_err(|source| BackendError::Remote {
            operation: "loadComponentFromURL",
            source,
        })?;
    let doc_oid = proxy::extract_oid_from_return(&loaded)
        .ok_or_else(|| BackendError::LoadFailed(source_url.clone()))?;
    let doc = UnoProxy::new(doc_oid, Type::interface(type_names::X_COMPONENT));
    tracing::debug!("Loaded {source_url} as {}", doc.oid);

    let stored = async {
        let storable = conn.require_interface(&doc, type_names::X_STORABLE).await?;
        conn.call(
            &storable,
            &interface::store_to_url(),
            &[UnoValue::String(destination_url.clone()), store],
        )
        .await
    }
    .await
    .map_err(|source| BackendError::Remote {
        operation: "storeToURL",
        source,
    });

    close_document(conn, &doc).await;
    stored?;
    tracing::debug!("Stored {destination_url}");
    Ok(())
}

/// Close a loaded document, falling back to `dispose`. Failures only warn.
async fn close_document(conn: &mut UrpConnection, doc: &UnoProxy) {
    let closeable_type = Type::interface(type_names::X_CLOSEABLE);
    if let Ok(Some(closeable)) = conn.query_interface(doc, closeable_type).await {
        match conn
            .call(&closeable, &interface::closeable_close(), &[UnoValue::Bool(true)])
            .await
        {
            Ok(_) => return,
            Err(e) => tracing::warn!("close() on {} failed: {e}", doc.oid),
        }
    }
    if let Err(e) = conn.call(doc, &interface::component_dispose(), &[]).await {
        tracing::warn!("dispose() on {} failed: {e}", doc.oid);
    }
}

#[async_trait]
impl ConversionBackend for LibreOfficeBackend {
    type Error = BackendError;

    async fn start(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        let session = match self.mode {
            Mode::Spawn => self.spawn().await?,
            Mode::Attach => self.attach_session().await?,
        };
        tracing::info!(
            "LibreOffice ready on {}:{}",
            self.config.host,
            self.config.port
        );
        self.session = Some(session);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        let Some(mut child) = session.child.take() else {
            // attached: leave the office running
            let _ = session.conn.close().await;
            return Ok(());
        };

        let grace = self.config.stop_timeout;
        if session.in_sync {
            let desktop = session.desktop.retyped(Type::interface(type_names::X_DESKTOP));
            let method = interface::desktop_terminate();
            match timeout(grace, session.conn.call(&desktop, &method, &[])).await {
                Ok(Ok(_)) | Ok(Err(UrpError::ConnectionClosed)) => {}
                Ok(Err(e)) => tracing::warn!("terminate() failed: {e}"),
                Err(_) => tracing::warn!("terminate() did not answer within {grace:?}"),
            }
        }
        drop(session.conn);

        match timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!("LibreOffice exited ({status})");
                Ok(())
            }
            Ok(Err(e)) => Err(BackendError::StopFailed(e)),
            Err(_) => {
                tracing::warn!("LibreOffice still running after {grace:?}; killing it");
                child.kill().await.map_err(BackendError::StopFailed)
            }
        }
    }

    fn is_running(&self) -> bool {
        self.session.is_some()
    }

    async fn convert(
        &mut self,
        source: &Path,
        destination: &Path,
        registry: &FormatRegistry,
    ) -> Result<()> {
        let (load, store) = conversion_descriptors(source, destination, registry)?;
        let source_url = file_url(source)?;
        let destination_url = file_url(destination)?;
        let limit = self.config.task_timeout;

        let session = self.session.as_mut().ok_or(BackendError::NotRunning)?;
        if !session.in_sync {
            return Err(BackendError::NotRunning);
        }
        match timeout(
            limit,
            load_store_close(session, source_url, destination_url, load, store),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                session.in_sync = false;
                Err(BackendError::TaskTimeout(limit.as_secs()))
            }
        }
    }
}

/// Builds [`LibreOfficeBackend`]s from a shared configuration.
#[derive(Debug, Clone, Default)]
pub struct LibreOfficeFactory {
    config: LibreOfficeConfig,
}

impl LibreOfficeFactory {
    pub fn new(config: LibreOfficeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LibreOfficeConfig {
        &self.config
    }
}

impl BackendFactory for LibreOfficeFactory {
    type Backend = LibreOfficeBackend;

    fn bind(&self, port: u16) -> LibreOfficeBackend {
        LibreOfficeBackend::bind(self.config.clone().with_port(port))
    }
}
