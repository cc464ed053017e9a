//! Pending-operation table.

use super::fingerprint::Fingerprint;
use crate::operation::OperationKind;
use crate::reply::Outcome;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::oneshot;

pub(crate) type Listener = oneshot::Sender<Outcome>;

/// One distinct in-flight command and everyone waiting for it.
pub(crate) struct PendingOperation {
    pub kind: OperationKind,
    pub args: Vec<String>,
    pub listeners: Vec<Listener>,
}

/// Read-only copy of a table entry taken at flush time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub fingerprint: Fingerprint,
    pub kind: OperationKind,
    pub args: Vec<String>,
}

/// How an enqueue landed in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First listener for this fingerprint; the command will be submitted.
    New,
    /// Joined an existing entry; `listeners` counts the entry after joining.
    Joined { listeners: usize },
    /// The table is closed; the listener was dropped.
    Closed,
}

/// Fingerprint → pending operation map plus the active-listener counter.
///
/// The counter is kept outside the lock so the control loop can read it
/// without contending with callers. `closed` only changes under the write
/// lock, so no insert can slip in after [`PendingTable::close`] returns.
pub struct PendingTable {
    entries: RwLock<HashMap<Fingerprint, PendingOperation>>,
    active_listeners: AtomicUsize,
    closed: AtomicBool,
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            active_listeners: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Fingerprint, PendingOperation>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Fingerprint, PendingOperation>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(
        &self,
        fingerprint: Fingerprint,
        kind: OperationKind,
        args: Vec<String>,
        listener: Listener,
    ) -> Admission {
        let mut entries = self.write();
        if self.closed.load(Ordering::Acquire) {
            return Admission::Closed;
        }
        let admission = match entries.get_mut(&fingerprint) {
            Some(op) => {
                op.listeners.push(listener);
                Admission::Joined {
                    listeners: op.listeners.len(),
                }
            }
            None => {
                entries.insert(
                    fingerprint,
                    PendingOperation {
                        kind,
                        args,
                        listeners: vec![listener],
                    },
                );
                Admission::New
            }
        };
        self.active_listeners.fetch_add(1, Ordering::AcqRel);
        admission
    }

    /// Refuse all further inserts. Idempotent.
    pub fn close(&self) {
        let _entries = self.write();
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Remove every remaining entry.
    pub(crate) fn drain(&self) -> Vec<(Fingerprint, PendingOperation)> {
        self.write().drain().collect()
    }

    /// Copy every entry without removing anything.
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        self.read()
            .iter()
            .map(|(fp, op)| SnapshotEntry {
                fingerprint: *fp,
                kind: op.kind,
                args: op.args.clone(),
            })
            .collect()
    }

    pub(crate) fn remove(&self, fingerprint: &Fingerprint) -> Option<PendingOperation> {
        self.write().remove(fingerprint)
    }

    /// Account for `n` listeners that have been served.
    pub(crate) fn release(&self, n: usize) {
        self.active_listeners.fetch_sub(n, Ordering::AcqRel);
    }

    pub fn active_listeners(&self) -> usize {
        self.active_listeners.load(Ordering::Acquire)
    }

    pub fn listeners_of(&self, fingerprint: &Fingerprint) -> usize {
        self.read()
            .get(fingerprint)
            .map(|op| op.listeners.len())
            .unwrap_or(0)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.read().contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.read().capacity()
    }

    /// Give memory back after a burst. Only shrinks an empty map whose
    /// capacity grew past `threshold`; returns whether it shrank.
    pub fn reclaim(&self, threshold: usize) -> bool {
        let mut entries = self.write();
        if entries.is_empty() && entries.capacity() > threshold {
            entries.shrink_to_fit();
            return true;
        }
        false
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}
