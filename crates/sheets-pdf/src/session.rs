//! Owned or borrowed access to a backend for the span of one export.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::backend::{BackendFactory, ConversionBackend};

/// A backend held for one export.
///
/// `Owned` backends were started by [`acquire`](Self::acquire) and are
/// stopped by [`release`](Self::release). `Borrowed` backends belong to the
/// caller and are only locked, never started or stopped.
pub enum BackendSession<B> {
    Owned(B),
    Borrowed(OwnedMutexGuard<B>),
}

impl<B: ConversionBackend> BackendSession<B> {
    /// Lock `external` if given; otherwise bind a fresh backend to `port`
    /// and start it.
    pub async fn acquire<F>(
        external: Option<&Arc<Mutex<B>>>,
        factory: &F,
        port: u16,
    ) -> Result<Self, B::Error>
    where
        F: BackendFactory<Backend = B>,
    {
        if let Some(handle) = external {
            let guard = Arc::clone(handle).lock_owned().await;
            tracing::debug!("Using caller-supplied backend");
            return Ok(BackendSession::Borrowed(guard));
        }

        let mut backend = factory.bind(port);
        tracing::info!("Starting conversion backend on port {port}");
        backend.start().await?;
        Ok(BackendSession::Owned(backend))
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, BackendSession::Owned(_))
    }

    pub fn backend(&mut self) -> &mut B {
        match self {
            BackendSession::Owned(b) => b,
            BackendSession::Borrowed(guard) => &mut **guard,
        }
    }

    /// Stop an owned backend; unlock a borrowed one.
    pub async fn release(self) -> Result<(), B::Error> {
        match self {
            BackendSession::Owned(mut backend) => {
                tracing::info!("Stopping conversion backend");
                backend.stop().await
            }
            BackendSession::Borrowed(_) => Ok(()),
        }
    }
}
