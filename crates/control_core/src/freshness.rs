//! Time-windowed confidence on the displayed status: a confirmed read is
//! "fresh" for a fixed dwell window, independent of whether the value
//! itself changed, so the display can distinguish a recent read from a
//! possibly-stale one without re-fetching.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::StatusListener;

pub const DEFAULT_FRESHNESS_DWELL: Duration = Duration::from_secs(10);

struct FreshnessState {
    fresh: bool,
    dwell_timer: Option<JoinHandle<()>>,
}

pub struct FreshnessTracker {
    dwell: Duration,
    inner: Arc<Mutex<FreshnessState>>,
}

impl FreshnessTracker {
    pub fn new() -> Self {
        Self::with_dwell(DEFAULT_FRESHNESS_DWELL)
    }

    pub fn with_dwell(dwell: Duration) -> Self {
        Self {
            dwell,
            inner: Arc::new(Mutex::new(FreshnessState {
                fresh: false,
                dwell_timer: None,
            })),
        }
    }

    pub async fn is_fresh(&self) -> bool {
        self.inner.lock().await.fresh
    }
}

impl Default for FreshnessTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusListener for FreshnessTracker {
    async fn on_status_updated(&self) {
        let mut guard = self.inner.lock().await;
        // A new confirmed read supersedes any dwell timer already running.
        if let Some(timer) = guard.dwell_timer.take() {
            timer.abort();
        }
        guard.fresh = true;

        let inner = Arc::clone(&self.inner);
        let dwell = self.dwell;
        guard.dwell_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(dwell).await;
            inner.lock().await.fresh = false;
        }));
    }
}
