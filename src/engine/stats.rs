//! Engine counters.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Listeners admitted (new plus deduplicated).
    pub enqueued: u64,
    /// Listeners that joined an existing entry.
    pub deduplicated: u64,
    /// Enqueues refused because the engine was stopped.
    pub rejected: u64,
    pub flushes: u64,
    /// Commands handed to the executor by successful flushes.
    pub submitted: u64,
    pub delivered: u64,
    pub abandoned: u64,
    pub bulk_failures: u64,
    pub missing_entries: u64,
}

impl EngineStats {
    /// Fraction of admitted listeners that did not cause a submission of their own.
    pub fn dedup_ratio(&self) -> f64 {
        if self.enqueued == 0 {
            0.0
        } else {
            self.deduplicated as f64 / self.enqueued as f64
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Default)]
pub(crate) struct AtomicStats {
    pub enqueued: AtomicU64,
    pub deduplicated: AtomicU64,
    pub rejected: AtomicU64,
    pub flushes: AtomicU64,
    pub submitted: AtomicU64,
    pub delivered: AtomicU64,
    pub abandoned: AtomicU64,
    pub bulk_failures: AtomicU64,
    pub missing_entries: AtomicU64,
}

impl AtomicStats {
    pub fn bump(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn to_stats(&self) -> EngineStats {
        EngineStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            bulk_failures: self.bulk_failures.load(Ordering::Relaxed),
            missing_entries: self.missing_entries.load(Ordering::Relaxed),
        }
    }
}
