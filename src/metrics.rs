use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const LATENCY_WINDOW: usize = 1000;

/// Sliding window of per-line processing times
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: Arc<Mutex<VecDeque<u64>>>,
    window_size: usize,
}

impl LatencyWindow {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(window_size))),
            window_size,
        }
    }

    /// Record one sample in nanoseconds, evicting the oldest when full
    pub fn record(&self, nanos: u64) {
        let mut samples = self.samples.lock();
        if samples.len() >= self.window_size {
            samples.pop_front();
        }
        samples.push_back(nanos);
    }

    /// Percentile `p` in [0, 1] of the current window, in microseconds
    pub fn percentile_us(&self, p: f64) -> f64 {
        let mut sorted: Vec<u64> = self.samples.lock().iter().copied().collect();
        if sorted.is_empty() {
            return 0.0;
        }
        sorted.sort_unstable();

        let idx = ((sorted.len() as f64 * p).ceil() as usize)
            .saturating_sub(1)
            .min(sorted.len() - 1);
        sorted[idx] as f64 / 1000.0
    }

    pub fn count(&self) -> usize {
        self.samples.lock().len()
    }
}

/// Counters for one stage. Cloning shares the underlying counters, so the
/// orchestrator can keep a copy while the stage thread updates its own.
#[derive(Debug, Clone)]
pub struct StageMetrics {
    lines_read: Arc<AtomicU64>,
    lines_written: Arc<AtomicU64>,
    write_failures: Arc<AtomicU64>,
    fragments_discarded: Arc<AtomicU64>,
    latency: LatencyWindow,
    created: Instant,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self {
            lines_read: Arc::new(AtomicU64::new(0)),
            lines_written: Arc::new(AtomicU64::new(0)),
            write_failures: Arc::new(AtomicU64::new(0)),
            fragments_discarded: Arc::new(AtomicU64::new(0)),
            latency: LatencyWindow::new(LATENCY_WINDOW),
            created: Instant::now(),
        }
    }

    pub fn record_line_read(&self) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one line delivered to one output
    pub fn record_line_written(&self) {
        self.lines_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fragment_discarded(&self) {
        self.fragments_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, elapsed: Duration) {
        self.latency.record(elapsed.as_nanos() as u64);
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read.load(Ordering::Relaxed)
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written.load(Ordering::Relaxed)
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    pub fn fragments_discarded(&self) -> u64 {
        self.fragments_discarded.load(Ordering::Relaxed)
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lines_read: self.lines_read(),
            lines_written: self.lines_written(),
            write_failures: self.write_failures(),
            fragments_discarded: self.fragments_discarded(),
            latency_p50_us: self.latency.percentile_us(0.50),
            latency_p95_us: self.latency.percentile_us(0.95),
            latency_p99_us: self.latency.percentile_us(0.99),
            elapsed: self.created.elapsed(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of metrics at a point in time
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub lines_read: u64,
    pub lines_written: u64,
    pub write_failures: u64,
    pub fragments_discarded: u64,
    pub latency_p50_us: f64,
    pub latency_p95_us: f64,
    pub latency_p99_us: f64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Read: {}, Written: {}, Write failures: {}, Discarded: {}, \
             Latency P50: {:.2}µs, P95: {:.2}µs, P99: {:.2}µs, Elapsed: {:.2}s",
            self.lines_read,
            self.lines_written,
            self.write_failures,
            self.fragments_discarded,
            self.latency_p50_us,
            self.latency_p95_us,
            self.latency_p99_us,
            self.elapsed.as_secs_f64()
        )
    }
}
