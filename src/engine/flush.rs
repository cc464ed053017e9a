//! Flush and dispatch.

use super::{FlushTrigger, Shared};
use crate::batch::{BatchReplies, Fingerprint, Slot};
use crate::engine::stats::AtomicStats;
use crate::operation::OperationKind;
use crate::reply::{CommandError, Outcome};
use crate::telemetry::EngineEvent;
use crate::{Error, ErrorContext, Result};
use std::time::Instant;
use tracing::{debug, error, warn};

/// What one flush did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FlushReport {
    pub trigger: FlushTrigger,
    pub operations: usize,
    pub delivered: usize,
    pub abandoned: usize,
    pub missing: usize,
}

impl FlushReport {
    fn new(trigger: FlushTrigger, operations: usize) -> Self {
        Self {
            trigger,
            operations,
            delivered: 0,
            abandoned: 0,
            missing: 0,
        }
    }

    pub fn listeners(&self) -> usize {
        self.delivered + self.abandoned
    }
}

/// Snapshot the table, run it as one round-trip and deliver the outcomes.
///
/// Only the control loop calls this, so flushes never overlap. On `Err` the
/// table is left exactly as it was.
pub(crate) async fn flush(shared: &Shared, trigger: FlushTrigger) -> Result<FlushReport> {
    let started = Instant::now();
    // read lock only for the copy; released before any I/O
    let snapshot = shared.table.snapshot();
    if snapshot.is_empty() {
        return Ok(FlushReport::new(trigger, 0));
    }

    let mut batch = shared.executor.batch();
    let submitted: Vec<(Fingerprint, OperationKind, Slot)> = snapshot
        .iter()
        .map(|entry| {
            (
                entry.fingerprint,
                entry.kind,
                batch.submit(entry.kind, &entry.args),
            )
        })
        .collect();

    let outcomes = match batch.execute_all().await {
        Ok(outcomes) if outcomes.len() == submitted.len() => outcomes,
        Ok(outcomes) => {
            let err = Error::transport_with_context(
                "executor returned a reply count that does not match the batch",
                ErrorContext::new()
                    .with_details(format!(
                        "expected {}, got {}",
                        submitted.len(),
                        outcomes.len()
                    ))
                    .with_source(shared.executor.name()),
            );
            return Err(bulk_failure(shared, err, submitted.len()));
        }
        Err(err) => return Err(bulk_failure(shared, err, submitted.len())),
    };

    let mut replies = BatchReplies::new(outcomes);
    let mut report = FlushReport::new(trigger, submitted.len());
    for (fingerprint, kind, slot) in submitted {
        let outcome = replies.take(slot).unwrap_or_else(|| {
            Err(CommandError::Backend(format!(
                "no reply for slot {}",
                slot.index()
            )))
        });
        dispatch(shared, fingerprint, kind, outcome, &mut report);
    }

    let stats = &shared.stats;
    AtomicStats::bump(&stats.flushes, 1);
    AtomicStats::bump(&stats.submitted, report.operations as u64);
    AtomicStats::bump(&stats.delivered, report.delivered as u64);
    AtomicStats::bump(&stats.abandoned, report.abandoned as u64);
    AtomicStats::bump(&stats.missing_entries, report.missing as u64);

    let elapsed_us = started.elapsed().as_micros() as u64;
    debug!(
        trigger = %trigger,
        operations = report.operations,
        listeners = report.listeners(),
        elapsed_us,
        "flushed pending operations"
    );
    shared.sink.report(EngineEvent::Flushed {
        trigger,
        operations: report.operations,
        listeners: report.listeners(),
        elapsed_us,
    });

    if shared.table.reclaim(shared.config.shrink_threshold) {
        debug!("reclaimed pending table capacity");
    }
    Ok(report)
}

fn bulk_failure(shared: &Shared, err: Error, operations: usize) -> Error {
    error!(
        operations,
        executor = shared.executor.name(),
        error = %err,
        "batch execution failed, operations stay queued"
    );
    AtomicStats::bump(&shared.stats.bulk_failures, 1);
    shared.sink.report(EngineEvent::BulkFailure {
        operations,
        message: err.to_string(),
    });
    err
}

/// Remove one entry and hand its outcome to every listener, in order.
fn dispatch(
    shared: &Shared,
    fingerprint: Fingerprint,
    kind: OperationKind,
    outcome: Outcome,
    report: &mut FlushReport,
) {
    let Some(op) = shared.table.remove(&fingerprint) else {
        error!(%fingerprint, %kind, "flushed operation missing from pending table");
        shared.sink.report(EngineEvent::MissingEntry {
            fingerprint: fingerprint.to_string(),
        });
        report.missing += 1;
        return;
    };

    for listener in op.listeners {
        if listener.send(outcome.clone()).is_err() {
            warn!(%fingerprint, %kind, "listener abandoned before delivery");
            shared.sink.report(EngineEvent::AbandonedListener {
                fingerprint: fingerprint.to_string(),
                kind,
            });
            report.abandoned += 1;
        } else {
            report.delivered += 1;
        }
        shared.table.release(1);
    }
}

/// Fail everything still queued. Used once the final flush is done.
pub(crate) fn abort_remaining(shared: &Shared, reason: &str) -> usize {
    let mut failed = 0;
    for (fingerprint, op) in shared.table.drain() {
        warn!(%fingerprint, kind = %op.kind, reason, "dropping operation on shutdown");
        for listener in op.listeners {
            if listener
                .send(Err(CommandError::Backend(reason.to_string())))
                .is_err()
            {
                warn!(%fingerprint, kind = %op.kind, "listener abandoned before delivery");
                shared.sink.report(EngineEvent::AbandonedListener {
                    fingerprint: fingerprint.to_string(),
                    kind: op.kind,
                });
                AtomicStats::bump(&shared.stats.abandoned, 1);
            }
            shared.table.release(1);
            failed += 1;
        }
    }
    failed
}
