//! Per-digest single-flight coordination: at most one in-flight fetch per blob digest.

use std::{collections::HashSet, path::Path, time::Duration};

use tokio::sync::Mutex;

/// Interval the coordinator sleeps between checks while waiting for an in-flight digest.
const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(1);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Tracks which blob digests currently have a download in flight, process-wide.
#[derive(Debug, Default)]
pub struct SingleFlight {
    inflight: Mutex<HashSet<String>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SingleFlight {
    /// Creates an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff `digest` currently has a download in flight.
    pub async fn is_downloading(&self, digest: &str) -> bool {
        self.inflight.lock().await.contains(digest)
    }

    /// Marks `digest` as in-flight. Idempotent.
    pub async fn mark_started(&self, digest: &str) {
        self.inflight.lock().await.insert(digest.to_string());
    }

    /// Clears the in-flight mark for `digest`.
    pub async fn mark_complete(&self, digest: &str) {
        self.inflight.lock().await.remove(digest);
    }

    /// Waits until either `digest`'s in-flight mark clears or `expected_path` appears on disk,
    /// polling once per second.
    pub async fn wait_for(&self, digest: &str, expected_path: &Path) {
        loop {
            if !self.is_downloading(digest).await || expected_path.exists() {
                return;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn mark_started_then_complete_round_trips() {
        let sf = SingleFlight::new();
        assert!(!sf.is_downloading("sha256:a").await);

        sf.mark_started("sha256:a").await;
        assert!(sf.is_downloading("sha256:a").await);

        sf.mark_complete("sha256:a").await;
        assert!(!sf.is_downloading("sha256:a").await);
    }

    #[tokio::test]
    async fn wait_for_returns_once_mark_clears() {
        let sf = Arc::new(SingleFlight::new());
        let dir = TempDir::new().unwrap();
        let expected = dir.path().join("missing");

        sf.mark_started("sha256:a").await;

        let waiter = {
            let sf = sf.clone();
            let expected = expected.clone();
            tokio::spawn(async move {
                sf.wait_for("sha256:a", &expected).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        sf.mark_complete("sha256:a").await;

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("wait_for did not return in time")
            .unwrap();
    }

    #[tokio::test]
    async fn wait_for_returns_immediately_if_not_downloading() {
        let sf = SingleFlight::new();
        let dir = TempDir::new().unwrap();
        let expected = dir.path().join("missing");

        tokio::time::timeout(Duration::from_millis(100), sf.wait_for("sha256:a", &expected))
            .await
            .expect("wait_for should return immediately when digest is not in flight");
    }
}
