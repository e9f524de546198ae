use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Upper bounds (ms) of the upstream latency buckets; the last bucket is open-ended.
const LATENCY_BOUNDS_MS: [u128; 5] = [500, 1000, 5000, 15000, 60000];

/// In-process counters for the chat endpoint.
pub struct Metrics {
    chat_requests: AtomicU64,
    errors: AtomicU64,
    upstream_calls: AtomicU64,
    image_attachments: AtomicU64,
    upload_bytes: AtomicU64,
    latency_buckets: [AtomicU64; 6],
    total_latency_ms: AtomicU64,
    created_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub chat_requests: u64,
    pub errors: u64,
    pub upstream_calls: u64,
    pub image_attachments: u64,
    pub upload_bytes: u64,
    pub avg_upstream_latency_ms: u64,
    pub upstream_latency_buckets: LatencyBuckets,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyBuckets {
    pub lt_500ms: u64,
    pub lt_1s: u64,
    pub lt_5s: u64,
    pub lt_15s: u64,
    pub lt_60s: u64,
    pub ge_60s: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            chat_requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            upstream_calls: AtomicU64::new(0),
            image_attachments: AtomicU64::new(0),
            upload_bytes: AtomicU64::new(0),
            latency_buckets: Default::default(),
            total_latency_ms: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.chat_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_image(&self, upload_bytes: usize) {
        self.image_attachments.fetch_add(1, Ordering::Relaxed);
        self.upload_bytes
            .fetch_add(upload_bytes as u64, Ordering::Relaxed);
    }

    pub fn record_upstream_latency_ms(&self, ms: u128) {
        let bucket = LATENCY_BOUNDS_MS
            .iter()
            .position(|&bound| ms < bound)
            .unwrap_or(LATENCY_BOUNDS_MS.len());
        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(ms as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let upstream_calls = load(&self.upstream_calls);
        let b = &self.latency_buckets;

        MetricsSnapshot {
            chat_requests: load(&self.chat_requests),
            errors: load(&self.errors),
            upstream_calls,
            image_attachments: load(&self.image_attachments),
            upload_bytes: load(&self.upload_bytes),
            avg_upstream_latency_ms: load(&self.total_latency_ms)
                .checked_div(upstream_calls)
                .unwrap_or(0),
            upstream_latency_buckets: LatencyBuckets {
                lt_500ms: load(&b[0]),
                lt_1s: load(&b[1]),
                lt_5s: load(&b[2]),
                lt_15s: load(&b[3]),
                lt_60s: load(&b[4]),
                ge_60s: load(&b[5]),
            },
            uptime_secs: self.created_at.elapsed().as_secs(),
        }
    }
}
