//! Batch executor seam.

use crate::operation::OperationKind;
use crate::reply::Outcome;
use crate::Result;
use async_trait::async_trait;

/// Position of a submitted command inside its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(usize);

impl Slot {
    pub fn new(index: usize) -> Self {
        Self(index)
    }
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A batch of commands that will go out in one round-trip.
#[async_trait]
pub trait Batch: Send {
    /// Queue one command. Performs no I/O.
    fn submit(&mut self, kind: OperationKind, args: &[String]) -> Slot;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every queued command in a single round-trip.
    ///
    /// Returns one outcome per submitted command, indexed by [`Slot`]. An `Err`
    /// means the round-trip itself failed and no command has a result.
    async fn execute_all(&mut self) -> Result<Vec<Outcome>>;
}

/// Factory for batches; the engine opens one per flush.
pub trait BatchExecutor: Send + Sync {
    fn batch(&self) -> Box<dyn Batch>;

    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Outcomes of one executed batch, claimed slot by slot.
pub struct BatchReplies {
    outcomes: Vec<Option<Outcome>>,
}

impl BatchReplies {
    pub fn new(outcomes: Vec<Outcome>) -> Self {
        Self {
            outcomes: outcomes.into_iter().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Take the outcome for `slot`; `None` if out of range or already taken.
    pub fn take(&mut self, slot: Slot) -> Option<Outcome> {
        self.outcomes.get_mut(slot.index()).and_then(Option::take)
    }
}
