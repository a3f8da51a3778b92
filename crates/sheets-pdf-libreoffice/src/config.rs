//! Settings for starting and talking to LibreOffice.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the LibreOffice backend.
#[derive(Debug, Clone)]
pub struct LibreOfficeConfig {
    /// Path to the `soffice` executable. If None, searches PATH.
    pub soffice_path: Option<PathBuf>,
    /// Host to connect to (or listen on). Default: "127.0.0.1".
    pub host: String,
    /// Port for URP socket communication. Default: 8100.
    pub port: u16,
    /// Timeout for waiting for LibreOffice to start. Default: 30 seconds.
    pub startup_timeout: Duration,
    /// Timeout for one load/store/close round. Default: 120 seconds.
    pub task_timeout: Duration,
    /// Grace period between `terminate()` and killing the process. Default: 10 seconds.
    pub stop_timeout: Duration,
    /// User profile directory. If None, a fresh one is created per process
    /// and deleted on stop.
    pub profile_dir: Option<PathBuf>,
    /// Extra arguments to pass to soffice.
    pub extra_args: Vec<String>,
}

impl Default for LibreOfficeConfig {
    fn default() -> Self {
        Self {
            soffice_path: None,
            host: "127.0.0.1".to_string(),
            port: sheets_pdf::DEFAULT_PORT,
            startup_timeout: Duration::from_secs(30),
            task_timeout: Duration::from_secs(120),
            stop_timeout: Duration::from_secs(10),
            profile_dir: None,
            extra_args: Vec::new(),
        }
    }
}

impl LibreOfficeConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn soffice(&self) -> PathBuf {
        self.soffice_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("soffice"))
    }

    /// `--accept` connection string.
    pub fn accept_string(&self) -> String {
        format!(
            "socket,host={},port={};urp;StarOffice.ComponentContext",
            self.host, self.port
        )
    }

    /// Command-line arguments for a headless instance using the profile at
    /// `profile_url`.
    pub fn launch_args(&self, profile_url: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "--headless",
            "--invisible",
            "--nocrashreport",
            "--nodefault",
            "--nologo",
            "--nofirststartwizard",
            "--norestore",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(format!("--accept={}", self.accept_string()));
        args.push(format!("-env:UserInstallation={profile_url}"));
        args.extend(self.extra_args.iter().cloned());
        args
    }
}
