//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use autopipeline::batch::{Batch, BatchExecutor, Slot};
use autopipeline::{Error, OperationKind, Outcome, Reply};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub type Submitted = (OperationKind, Vec<String>);

/// One `execute_all` call as seen by the executor.
#[derive(Debug, Clone)]
pub struct Round {
    pub at: Instant,
    pub commands: Vec<Submitted>,
    pub failed: bool,
}

#[derive(Default)]
struct Inner {
    rounds: Mutex<Vec<Round>>,
    scripted: Mutex<HashMap<Submitted, Outcome>>,
    fail_next: AtomicUsize,
    latency: Option<Duration>,
}

/// Executor that records every round-trip and answers from a script.
///
/// Unscripted commands reply `Int(1)`.
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    inner: Arc<Inner>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                latency: Some(latency),
                ..Default::default()
            }),
        }
    }

    pub fn script(&self, kind: OperationKind, args: &[&str], outcome: Outcome) {
        let args = args.iter().map(|s| s.to_string()).collect();
        self.inner
            .scripted
            .lock()
            .unwrap()
            .insert((kind, args), outcome);
    }

    /// Fail the next `n` round-trips as a whole.
    pub fn fail_next(&self, n: usize) {
        self.inner.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn rounds(&self) -> Vec<Round> {
        self.inner.rounds.lock().unwrap().clone()
    }

    /// Successful round-trips only.
    pub fn round_trips(&self) -> usize {
        self.rounds().iter().filter(|r| !r.failed).count()
    }

    pub fn attempts(&self) -> usize {
        self.rounds().len()
    }

    /// Commands delivered by successful round-trips.
    pub fn submitted(&self) -> Vec<Submitted> {
        self.rounds()
            .into_iter()
            .filter(|r| !r.failed)
            .flat_map(|r| r.commands)
            .collect()
    }
}

impl BatchExecutor for RecordingExecutor {
    fn batch(&self) -> Box<dyn Batch> {
        Box::new(RecordingBatch {
            inner: Arc::clone(&self.inner),
            commands: Vec::new(),
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

struct RecordingBatch {
    inner: Arc<Inner>,
    commands: Vec<Submitted>,
}

#[async_trait]
impl Batch for RecordingBatch {
    fn submit(&mut self, kind: OperationKind, args: &[String]) -> Slot {
        self.commands.push((kind, args.to_vec()));
        Slot::new(self.commands.len() - 1)
    }

    fn len(&self) -> usize {
        self.commands.len()
    }

    async fn execute_all(&mut self) -> autopipeline::Result<Vec<Outcome>> {
        if let Some(latency) = self.inner.latency {
            tokio::time::sleep(latency).await;
        }
        let failed = self
            .inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        self.inner.rounds.lock().unwrap().push(Round {
            at: Instant::now(),
            commands: self.commands.clone(),
            failed,
        });
        if failed {
            return Err(Error::transport("connection reset"));
        }
        let scripted = self.inner.scripted.lock().unwrap();
        Ok(self
            .commands
            .iter()
            .map(|cmd| scripted.get(cmd).cloned().unwrap_or(Ok(Reply::Int(1))))
            .collect())
    }
}

pub fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}
