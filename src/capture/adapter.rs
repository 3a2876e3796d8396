use thiserror::Error;
use tracing::{debug, warn};

use super::artifact::{Artifact, CaptureKind};

/// Capture adapter errors
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The underlying device or input could not be opened (e.g. microphone denied)
    #[error("capture resource unavailable: {0}")]
    Unavailable(String),

    /// `finalize` was called without a completed capture
    #[error("nothing was captured")]
    NotCaptured,

    /// Encoding or collecting the artifact failed
    #[error("failed to finalize capture: {0}")]
    Finalize(String),
}

/// Capability that produces the submitted artifact
///
/// The session controller calls `acquire` when capture begins, `release`
/// exactly once per acquisition, and `finalize` after releasing to collect
/// the artifact. Adapters must support repeated acquire/release cycles
/// (a retake starts a new one).
#[async_trait::async_trait]
pub trait CaptureAdapter: Send {
    /// Open the underlying resource and start collecting input
    async fn acquire(&mut self) -> Result<(), CaptureError>;

    /// Stop collecting and free the underlying resource
    ///
    /// Synchronous so it can run from `Drop`.
    fn release(&mut self);

    /// Produce the artifact collected since the last `acquire`
    async fn finalize(&mut self) -> Result<Artifact, CaptureError>;

    fn kind(&self) -> CaptureKind;

    /// Adapter name for logging
    fn name(&self) -> &str;
}

/// Exclusive ownership of a capture adapter plus its held/released state
///
/// Release is performed at most once per acquisition regardless of how many
/// exit paths (manual stop, timeout, cancel, drop) reach it.
pub struct CaptureLease {
    adapter: Box<dyn CaptureAdapter>,
    held: bool,
}

impl CaptureLease {
    pub fn new(adapter: Box<dyn CaptureAdapter>) -> Self {
        Self { adapter, held: false }
    }

    pub async fn acquire(&mut self) -> Result<(), CaptureError> {
        if self.held {
            return Ok(());
        }
        self.adapter.acquire().await?;
        self.held = true;
        debug!("Capture lease acquired ({})", self.adapter.name());
        Ok(())
    }

    /// Returns true if this call performed the release
    pub fn release(&mut self) -> bool {
        if !self.held {
            return false;
        }
        self.held = false;
        self.adapter.release();
        debug!("Capture lease released ({})", self.adapter.name());
        true
    }

    pub async fn finalize(&mut self) -> Result<Artifact, CaptureError> {
        self.adapter.finalize().await
    }

    pub fn kind(&self) -> CaptureKind {
        self.adapter.kind()
    }

    pub fn name(&self) -> &str {
        self.adapter.name()
    }
}

impl Drop for CaptureLease {
    fn drop(&mut self) {
        if self.held {
            warn!("Capture lease dropped while held, releasing {}", self.adapter.name());
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingAdapter {
        releases: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl CaptureAdapter for CountingAdapter {
        async fn acquire(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }

        async fn finalize(&mut self) -> Result<Artifact, CaptureError> {
            Ok(Artifact::Text("done".into()))
        }

        fn kind(&self) -> CaptureKind {
            CaptureKind::Writing
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_release_happens_once_per_acquisition() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut lease = CaptureLease::new(Box::new(CountingAdapter {
            releases: releases.clone(),
        }));

        lease.acquire().await.unwrap();
        assert!(lease.release());
        assert!(!lease.release());
        assert_eq!(releases.load(Ordering::SeqCst), 1);

        lease.acquire().await.unwrap();
        assert!(lease.release());
        assert_eq!(releases.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_drop_releases_held_lease() {
        let releases = Arc::new(AtomicUsize::new(0));
        {
            let mut lease = CaptureLease::new(Box::new(CountingAdapter {
                releases: releases.clone(),
            }));
            lease.acquire().await.unwrap();
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_without_acquire_does_not_release() {
        let releases = Arc::new(AtomicUsize::new(0));
        drop(CaptureLease::new(Box::new(CountingAdapter {
            releases: releases.clone(),
        })));
        assert_eq!(releases.load(Ordering::SeqCst), 0);
    }
}
