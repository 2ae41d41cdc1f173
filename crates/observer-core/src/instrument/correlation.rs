//! Correlation tracker: receiver baton → temporally ordered method-name
//! entries, bridging the gap between a reflective method lookup and the
//! later dynamic invocation.
//!
//! Buckets are replaced wholesale on every mutation (copy, prepend,
//! truncate, store) so concurrent readers always observe a consistent
//! list. Lookups consume the head entry. Size pressure evicts
//! least-recently-used keys; a background task sweeps out entries whose
//! sequence fell too far behind.
//!
//! Survival matrix: the baton survives passing the value by value, storing
//! it in an interface and asserting it back out, `Elem`/`Field`/`Addr`
//! chains over struct fields, and both pointer and value receivers. It
//! does not survive re-wrapping the value in a fresh reflection value or
//! re-closing it through a synthetic function constructor; those paths
//! break direct correlation and show up as lookup misses.

use std::any::Any;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::format::extract_value_ptr;
use super::{
    env_u64, env_usize, DEFAULT_CLEANUP_INTERVAL, DEFAULT_CORRELATION_MAX_AGE,
    DEFAULT_DEBUG_LOG_PATH, DEFAULT_MAX_CORRELATIONS, ENV_CLEANUP_INTERVAL,
    ENV_CORRELATION_MAX_AGE, ENV_DEBUG_CORRELATION, ENV_DEBUG_LOG_PATH, ENV_MAX_CORRELATIONS,
};

/// Entries kept per receiver bucket, newest first.
const BUCKET_CAP: usize = 10;

/// Keys collected per age sweep.
const AGE_SWEEP_LIMIT: usize = 1000;

#[derive(Debug, Clone)]
pub struct CorrelationEntry {
    pub method_name: String,
    pub receiver_ptr: u64,
    pub sequence: u64,
    pub access_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerMetrics {
    pub size: i64,
    pub matches: i64,
    pub misses: i64,
    pub evictions: i64,
}

pub struct Tracker {
    buckets: DashMap<u64, Vec<Arc<CorrelationEntry>>>,
    size: AtomicI64,
    sequence: AtomicU64,
    max_entries: i64,
    max_age: u64,
    cleanup_interval: u64,
    evictions: AtomicI64,
    matches: AtomicI64,
    misses: AtomicI64,
}

impl Tracker {
    pub fn new(max_entries: usize, max_age: u64, cleanup_interval: u64) -> Self {
        Self {
            buckets: DashMap::new(),
            size: AtomicI64::new(0),
            sequence: AtomicU64::new(0),
            max_entries: max_entries as i64,
            max_age,
            cleanup_interval: cleanup_interval.max(1),
            evictions: AtomicI64::new(0),
            matches: AtomicI64::new(0),
            misses: AtomicI64::new(0),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            env_usize(ENV_MAX_CORRELATIONS, DEFAULT_MAX_CORRELATIONS),
            env_u64(ENV_CORRELATION_MAX_AGE, DEFAULT_CORRELATION_MAX_AGE),
            env_u64(ENV_CLEANUP_INTERVAL, DEFAULT_CLEANUP_INTERVAL),
        )
    }

    /// Record a correlation at reflective-lookup time. The method value is
    /// only sanity-checked and logged; the key is the receiver's baton.
    /// Zero batons (extraction failure) are silently ignored.
    pub fn record(self: &Arc<Self>, method_value: &dyn Any, method_name: &str, receiver: &dyn Any) {
        let method_ptr = extract_value_ptr(method_value);
        if method_ptr == 0 {
            debug_write("RECORD: methodValuePtr=0 (extraction failed)");
            return;
        }
        let baton = extract_value_ptr(receiver);
        if baton == 0 {
            debug_write("RECORD: baton=0 (extraction failed)");
            return;
        }
        self.record_ptr(method_name, baton);
    }

    /// Record against an already-extracted baton.
    pub fn record_ptr(self: &Arc<Self>, method_name: &str, baton: u64) {
        if baton == 0 {
            return;
        }

        let seq = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;

        if self.size.load(Ordering::Acquire) >= self.max_entries {
            let evict = ((self.max_entries / 10) as usize).max(1);
            self.evict_lru(evict);
        }

        let entry = Arc::new(CorrelationEntry {
            method_name: method_name.to_string(),
            receiver_ptr: baton,
            sequence: seq,
            access_time: seq,
        });

        let mut entry_count = 1;
        match self.buckets.entry(baton) {
            Entry::Occupied(mut occupied) => {
                let old = occupied.get();
                let mut entries = Vec::with_capacity((old.len() + 1).min(BUCKET_CAP));
                entries.push(entry);
                entries.extend(old.iter().take(BUCKET_CAP - 1).cloned());
                entry_count = entries.len();
                occupied.insert(entries);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(vec![entry]);
                self.size.fetch_add(1, Ordering::AcqRel);
            }
        }

        debug_write(&format!(
            "RECORD: methodName={method_name} baton={baton} seq={seq} entryCount={entry_count}"
        ));

        if seq % self.cleanup_interval == 0 {
            let tracker = Arc::clone(self);
            let _ = thread::Builder::new()
                .name("correlation-age-sweep".into())
                .spawn(move || tracker.cleanup_by_age());
        }
    }

    /// Consume the most recent correlation for a receiver value.
    pub fn lookup(&self, receiver: &dyn Any) -> Option<Arc<CorrelationEntry>> {
        let baton = extract_value_ptr(receiver);
        if baton == 0 {
            debug_write("GET: baton=0 (extraction failed)");
            self.misses.fetch_add(1, Ordering::AcqRel);
            return None;
        }
        self.lookup_by_ptr(baton)
    }

    /// Consume the most recent correlation for a raw baton.
    pub fn lookup_by_ptr(&self, baton: u64) -> Option<Arc<CorrelationEntry>> {
        if baton == 0 {
            debug_write("GET: baton=0 (extraction failed)");
            self.misses.fetch_add(1, Ordering::AcqRel);
            return None;
        }

        match self.buckets.entry(baton) {
            Entry::Occupied(mut occupied) => {
                let entries = occupied.get();
                if entries.is_empty() {
                    self.misses.fetch_add(1, Ordering::AcqRel);
                    debug_write(&format!("GET: baton={baton} MISS (empty bucket)"));
                    return None;
                }

                let head = entries[0].clone();
                if entries.len() > 1 {
                    let tail = entries[1..].to_vec();
                    occupied.insert(tail);
                } else {
                    occupied.remove();
                    self.size.fetch_add(-1, Ordering::AcqRel);
                }

                self.matches.fetch_add(1, Ordering::AcqRel);
                debug_write(&format!(
                    "GET: baton={baton} MATCH methodName={} seq={}",
                    head.method_name, head.sequence
                ));
                Some(head)
            }
            Entry::Vacant(_) => {
                self.misses.fetch_add(1, Ordering::AcqRel);
                debug_write(&format!("GET: baton={baton} MISS"));
                None
            }
        }
    }

    /// Evict up to `count` least-recently-used keys. Scans a bounded
    /// snapshot (2x the requested count), sorts it by head access time,
    /// then deletes; no map locks are held across the sort.
    fn evict_lru(&self, count: usize) {
        let mut snapshot: Vec<(u64, u64)> = Vec::with_capacity(count * 2);
        for item in self.buckets.iter() {
            if let Some(head) = item.value().first() {
                snapshot.push((*item.key(), head.access_time));
            }
            if snapshot.len() >= count * 2 {
                break;
            }
        }

        // Insertion sort, ascending by access time; the snapshot is small.
        for i in 1..snapshot.len() {
            let mut j = i;
            while j > 0 && snapshot[j].1 < snapshot[j - 1].1 {
                snapshot.swap(j, j - 1);
                j -= 1;
            }
        }

        let mut evicted = 0i64;
        for (key, _) in snapshot {
            if evicted >= count as i64 {
                break;
            }
            if self.buckets.remove(&key).is_some() {
                evicted += 1;
            }
        }

        self.size.fetch_add(-evicted, Ordering::AcqRel);
        self.evictions.fetch_add(evicted, Ordering::AcqRel);
    }

    /// Delete buckets whose head entry's sequence fell more than `max_age`
    /// behind the current sequence. Bounded per sweep.
    pub fn cleanup_by_age(&self) {
        let current = self.sequence.load(Ordering::Acquire);
        if current < self.max_age {
            return;
        }
        let cutoff = current - self.max_age;

        let mut stale: Vec<u64> = Vec::with_capacity(100);
        for item in self.buckets.iter() {
            if let Some(head) = item.value().first() {
                if head.sequence < cutoff {
                    stale.push(*item.key());
                }
            }
            if stale.len() >= AGE_SWEEP_LIMIT {
                break;
            }
        }

        let mut deleted = 0i64;
        for key in stale {
            if self.buckets.remove(&key).is_some() {
                deleted += 1;
            }
        }
        if deleted > 0 {
            self.size.fetch_add(-deleted, Ordering::AcqRel);
        }
    }

    pub fn metrics(&self) -> TrackerMetrics {
        TrackerMetrics {
            size: self.size.load(Ordering::Acquire),
            matches: self.matches.load(Ordering::Acquire),
            misses: self.misses.load(Ordering::Acquire),
            evictions: self.evictions.load(Ordering::Acquire),
        }
    }

    /// Current value of the global sequence counter.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Drop all state. Test seam; never called during normal operation.
    pub fn reset(&self) {
        self.buckets.clear();
        self.size.store(0, Ordering::Release);
        self.sequence.store(0, Ordering::Release);
        self.matches.store(0, Ordering::Release);
        self.misses.store(0, Ordering::Release);
        self.evictions.store(0, Ordering::Release);
    }
}

/// The process-global tracker, configured from the environment on first
/// use. Starting it also starts the background cleaner.
pub fn global() -> &'static Arc<Tracker> {
    static TRACKER: OnceLock<Arc<Tracker>> = OnceLock::new();
    TRACKER.get_or_init(|| {
        let tracker = Arc::new(Tracker::from_env());
        spawn_cleaner(Arc::clone(&tracker));
        tracker
    })
}

pub fn record(method_value: &dyn Any, method_name: &str, receiver: &dyn Any) {
    global().record(method_value, method_name, receiver);
}

pub fn lookup(receiver: &dyn Any) -> Option<Arc<CorrelationEntry>> {
    global().lookup(receiver)
}

pub fn lookup_by_ptr(baton: u64) -> Option<Arc<CorrelationEntry>> {
    global().lookup_by_ptr(baton)
}

pub fn metrics() -> TrackerMetrics {
    global().metrics()
}

/// Cooperative background cleaner: wait for the sequence counter to
/// advance by one cleanup interval, sweep, repeat. Yields between polls
/// and never blocks the record/lookup paths.
fn spawn_cleaner(tracker: Arc<Tracker>) {
    let _ = thread::Builder::new()
        .name("correlation-cleaner".into())
        .spawn(move || loop {
            thread::yield_now();

            let current = tracker.sequence.load(Ordering::Acquire);
            let target = current.saturating_add(tracker.cleanup_interval);
            while tracker.sequence.load(Ordering::Acquire) < target {
                thread::yield_now();
            }

            tracker.cleanup_by_age();
        });
}

/// Diagnostic sink, opened once when `INSTRUMENTATION_DEBUG_CORRELATION`
/// is `true`. Write failures are ignored.
pub(crate) fn debug_write(message: &str) {
    static DEBUG_SINK: OnceLock<Option<Mutex<std::fs::File>>> = OnceLock::new();
    let sink = DEBUG_SINK.get_or_init(|| {
        if std::env::var(ENV_DEBUG_CORRELATION).as_deref() != Ok("true") {
            return None;
        }
        let path = std::env::var(ENV_DEBUG_LOG_PATH)
            .unwrap_or_else(|_| DEFAULT_DEBUG_LOG_PATH.to_string());
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
            .map(Mutex::new)
    });

    if let Some(file) = sink {
        let mut guard = file.lock();
        let _ = writeln!(guard, "{message}");
    }
}
