use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Most recent transform latencies, oldest evicted first
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: Arc<Mutex<VecDeque<Duration>>>,
    limit: usize,
}

impl LatencyWindow {
    pub fn new(limit: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(limit))),
            limit: limit.max(1),
        }
    }

    pub fn record(&self, elapsed: Duration) {
        let mut samples = self.samples.lock();
        if samples.len() == self.limit {
            samples.pop_front();
        }
        samples.push_back(elapsed);
    }

    /// Nearest-rank quantile over the window, `q` in `0.0..=1.0`.
    /// Zero while nothing has been recorded.
    pub fn quantile(&self, q: f64) -> Duration {
        let mut sorted: Vec<Duration> = self.samples.lock().iter().copied().collect();
        if sorted.is_empty() {
            return Duration::ZERO;
        }
        sorted.sort_unstable();
        let rank = (sorted.len() as f64 * q.clamp(0.0, 1.0)).ceil() as usize;
        sorted[rank.saturating_sub(1)]
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }
}

/// Per-operator counters shared by every worker the operator spawns.
///
/// Cloning is cheap; clones observe the same counters.
#[derive(Debug, Clone)]
pub struct StageMetrics {
    /// Values forwarded downstream
    processed: Arc<AtomicU64>,
    /// Values dropped by best-effort outlets
    dropped: Arc<AtomicU64>,
    /// Sends that found their destination full and had to wait
    blocks: Arc<AtomicU64>,
    /// Values thrown away by defensive drains
    drained: Arc<AtomicU64>,
    workers_spawned: Arc<AtomicU64>,
    workers_active: Arc<AtomicU64>,
    latency: LatencyWindow,
    start_time: Instant,
}

impl StageMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            processed: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
            blocks: Arc::new(AtomicU64::new(0)),
            drained: Arc::new(AtomicU64::new(0)),
            workers_spawned: Arc::new(AtomicU64::new(0)),
            workers_active: Arc::new(AtomicU64::new(0)),
            latency: LatencyWindow::new(1024),
            start_time: Instant::now(),
        }
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_block(&self) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drained(&self, count: u64) {
        self.drained.fetch_add(count, Ordering::Relaxed);
    }

    /// Time spent by a user function on one value
    pub fn record_latency(&self, elapsed: Duration) {
        self.latency.record(elapsed);
    }

    /// Register a worker; the returned guard marks it finished when dropped,
    /// including during a panic unwind.
    pub fn worker(&self) -> WorkerGuard {
        self.workers_spawned.fetch_add(1, Ordering::Relaxed);
        self.workers_active.fetch_add(1, Ordering::AcqRel);
        WorkerGuard {
            active: Arc::clone(&self.workers_active),
        }
    }

    pub fn total_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn total_blocks(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }

    pub fn total_drained(&self) -> u64 {
        self.drained.load(Ordering::Relaxed)
    }

    pub fn workers_spawned(&self) -> u64 {
        self.workers_spawned.load(Ordering::Relaxed)
    }

    /// Workers that have been spawned and have not yet returned
    pub fn active_workers(&self) -> u64 {
        self.workers_active.load(Ordering::Acquire)
    }

    /// Values forwarded per second since the operator was built
    pub fn throughput(&self) -> f64 {
        let secs = self.start_time.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.total_processed() as f64 / secs
        } else {
            0.0
        }
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_processed: self.total_processed(),
            total_dropped: self.total_dropped(),
            total_blocks: self.total_blocks(),
            total_drained: self.total_drained(),
            active_workers: self.active_workers(),
            throughput: self.throughput(),
            latency_p50: self.latency.quantile(0.50),
            latency_p99: self.latency.quantile(0.99),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks one worker as active for as long as it lives
#[derive(Debug)]
pub struct WorkerGuard {
    active: Arc<AtomicU64>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Counters read at one instant
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_processed: u64,
    pub total_dropped: u64,
    pub total_blocks: u64,
    pub total_drained: u64,
    pub active_workers: u64,
    pub throughput: f64,
    pub latency_p50: Duration,
    pub latency_p99: Duration,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// One-line summary for logs and demos
    pub fn format(&self) -> String {
        format!(
            "processed={} dropped={} blocks={} drained={} active={} rate={:.0}/s p50={:?} p99={:?} up={:.2}s",
            self.total_processed,
            self.total_dropped,
            self.total_blocks,
            self.total_drained,
            self.active_workers,
            self.throughput,
            self.latency_p50,
            self.latency_p99,
            self.elapsed.as_secs_f64()
        )
    }
}
