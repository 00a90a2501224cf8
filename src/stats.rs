//! Reply statistics
//!
//! Counters for physical writes and error replies, partitioned per worker
//! thread. Each thread increments only its own [`ReplyCounters`]; a reporting
//! thread may read or reset any of them through the process-wide
//! [`StatsRegistry`]. Reads are relaxed snapshots, not a consistent cut
//! across fields.

use std::collections::HashMap;
use std::ops::AddAssign;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crossbeam::utils::CachePadded;
use parking_lot::{Mutex, RwLock};

/// Timing of physical sink writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStats {
    /// Number of completed sink writes
    pub count: u64,
    /// Time spent inside the sink, in microseconds
    pub total_duration_us: u64,
}

impl AddAssign for SendStats {
    fn add_assign(&mut self, other: Self) {
        self.count += other.count;
        self.total_duration_us += other.total_duration_us;
    }
}

/// Point-in-time copy of a counter set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyStats {
    pub send_stats: SendStats,
    /// Physical write attempts
    pub io_write_cnt: u64,
    /// Bytes handed to the sink
    pub io_write_bytes: u64,
    /// Error replies by kind tag
    pub err_count: HashMap<String, u64>,
}

impl AddAssign<&ReplyStats> for ReplyStats {
    fn add_assign(&mut self, other: &ReplyStats) {
        self.send_stats += other.send_stats;
        self.io_write_cnt += other.io_write_cnt;
        self.io_write_bytes += other.io_write_bytes;
        for (kind, count) in &other.err_count {
            *self.err_count.entry(kind.clone()).or_insert(0) += count;
        }
    }
}

impl ReplyStats {
    /// Snapshot of the calling thread's counters
    pub fn thread_local() -> ReplyStats {
        thread_counters().snapshot()
    }

    /// Reset the calling thread's counters
    pub fn reset_thread_local() {
        thread_counters().reset();
    }
}

/// Live counters owned by one worker thread
#[derive(Debug, Default)]
pub struct ReplyCounters {
    send_count: CachePadded<AtomicU64>,
    send_duration_us: CachePadded<AtomicU64>,
    io_write_cnt: CachePadded<AtomicU64>,
    io_write_bytes: CachePadded<AtomicU64>,
    err_count: Mutex<HashMap<String, u64>>,
}

impl ReplyCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a write attempt before it is issued
    pub fn record_write(&self, bytes: usize) {
        self.io_write_cnt.fetch_add(1, Ordering::Relaxed);
        self.io_write_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Account for a finished write and the time it took
    pub fn record_send(&self, elapsed: Duration) {
        self.send_count.fetch_add(1, Ordering::Relaxed);
        self.send_duration_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Count one error reply of the given kind
    pub fn record_error(&self, kind: &str) {
        let mut counts = self.err_count.lock();
        match counts.get_mut(kind) {
            Some(count) => *count += 1,
            None => {
                counts.insert(kind.to_string(), 1);
            }
        }
    }

    pub fn snapshot(&self) -> ReplyStats {
        ReplyStats {
            send_stats: SendStats {
                count: self.send_count.load(Ordering::Relaxed),
                total_duration_us: self.send_duration_us.load(Ordering::Relaxed),
            },
            io_write_cnt: self.io_write_cnt.load(Ordering::Relaxed),
            io_write_bytes: self.io_write_bytes.load(Ordering::Relaxed),
            err_count: self.err_count.lock().clone(),
        }
    }

    pub fn reset(&self) {
        self.send_count.store(0, Ordering::Relaxed);
        self.send_duration_us.store(0, Ordering::Relaxed);
        self.io_write_cnt.store(0, Ordering::Relaxed);
        self.io_write_bytes.store(0, Ordering::Relaxed);
        self.err_count.lock().clear();
    }
}

/// Registry of every counter set handed out to worker threads.
///
/// Sets of exited threads are folded into a retired total, so the registry
/// grows with live workers only and aggregates never lose history.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    workers: RwLock<Vec<Arc<ReplyCounters>>>,
    retired: Mutex<ReplyStats>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and track a fresh counter set
    pub fn register(&self) -> Arc<ReplyCounters> {
        let counters = Arc::new(ReplyCounters::new());
        self.workers.write().push(Arc::clone(&counters));
        counters
    }

    /// Stop tracking `counters` and keep its totals in the retired sum.
    /// Counts recorded through other handles afterwards are not aggregated.
    pub fn retire(&self, counters: &Arc<ReplyCounters>) {
        let mut workers = self.workers.write();
        let Some(pos) = workers.iter().position(|w| Arc::ptr_eq(w, counters)) else {
            return;
        };
        let worker = workers.swap_remove(pos);
        *self.retired.lock() += &worker.snapshot();
        tracing::trace!("Retired reply counters, {} workers left", workers.len());
    }

    /// Number of live counter sets
    pub fn worker_count(&self) -> usize {
        self.workers.read().len()
    }

    /// Sum of all live counter sets plus the retired total
    pub fn aggregate(&self) -> ReplyStats {
        let workers = self.workers.read();
        let mut total = self.retired.lock().clone();
        for worker in workers.iter() {
            total += &worker.snapshot();
        }
        total
    }

    pub fn reset_all(&self) {
        let workers = self.workers.read();
        for worker in workers.iter() {
            worker.reset();
        }
        *self.retired.lock() = ReplyStats::default();
    }
}

/// The process-wide registry
pub fn global_registry() -> &'static StatsRegistry {
    static REGISTRY: OnceLock<StatsRegistry> = OnceLock::new();
    REGISTRY.get_or_init(StatsRegistry::new)
}

/// A thread's registered counter set; retired when the thread exits
struct ThreadCounters(Arc<ReplyCounters>);

impl Drop for ThreadCounters {
    fn drop(&mut self) {
        global_registry().retire(&self.0);
    }
}

thread_local! {
    static THREAD_COUNTERS: ThreadCounters = ThreadCounters(global_registry().register());
}

/// The calling thread's counter set, registered on first use
pub fn thread_counters() -> Arc<ReplyCounters> {
    THREAD_COUNTERS.with(|counters| Arc::clone(&counters.0))
}
