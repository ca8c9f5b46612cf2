use std::sync::atomic::{AtomicU64, Ordering};

/// Engine-owned process counters backing `/api/v1/metrics`. The HTTP
/// handler is a thin read of these; nothing here is a metrics-library
/// integration.
#[derive(Default)]
pub struct Metrics {
    pub readings_posted: AtomicU64,
    pub readings_dropped: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_posted(&self) {
        self.readings_posted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.readings_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            readings_posted: self.readings_posted.load(Ordering::Relaxed),
            readings_dropped: self.readings_dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    pub readings_posted: u64,
    pub readings_dropped: u64,
}
