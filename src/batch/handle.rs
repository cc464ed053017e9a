//! Single-use result handle returned by enqueue.

use super::fingerprint::Fingerprint;
use crate::reply::{Outcome, Reply};
use crate::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

enum State {
    Waiting(oneshot::Receiver<Outcome>),
    Stopped,
    Finished,
}

/// Receives the outcome of exactly one enqueued command.
///
/// The engine resolves it once. Awaiting consumes it; dropping it before the
/// result arrives abandons the request, which the engine tolerates.
#[must_use = "a result handle does nothing unless awaited"]
pub struct ResultHandle {
    fingerprint: Option<Fingerprint>,
    state: State,
}

impl ResultHandle {
    pub(crate) fn new(fingerprint: Fingerprint, rx: oneshot::Receiver<Outcome>) -> Self {
        Self {
            fingerprint: Some(fingerprint),
            state: State::Waiting(rx),
        }
    }

    /// A handle that resolves immediately to [`Error::EngineStopped`].
    pub(crate) fn stopped() -> Self {
        Self {
            fingerprint: None,
            state: State::Stopped,
        }
    }

    /// Fingerprint of the command, `None` if it was never admitted.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.fingerprint
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.state, State::Stopped)
    }

    /// Non-blocking check. `None` while the command is still pending.
    pub fn try_take(&mut self) -> Option<Result<Reply>> {
        let res = match &mut self.state {
            State::Waiting(rx) => match rx.try_recv() {
                Ok(outcome) => Some(flatten(outcome)),
                Err(oneshot::error::TryRecvError::Empty) => return None,
                Err(oneshot::error::TryRecvError::Closed) => Some(Err(Error::ChannelClosed)),
            },
            State::Stopped => Some(Err(Error::EngineStopped)),
            State::Finished => Some(Err(Error::ChannelClosed)),
        };
        self.state = State::Finished;
        res
    }

    /// Block the current thread until the outcome arrives.
    ///
    /// For callers outside an async runtime; panics if called from within one.
    pub fn blocking_wait(self) -> Result<Reply> {
        match self.state {
            State::Waiting(rx) => match rx.blocking_recv() {
                Ok(outcome) => flatten(outcome),
                Err(_) => Err(Error::ChannelClosed),
            },
            State::Stopped => Err(Error::EngineStopped),
            State::Finished => Err(Error::ChannelClosed),
        }
    }
}

fn flatten(outcome: Outcome) -> Result<Reply> {
    outcome.map_err(Error::Command)
}

impl Future for ResultHandle {
    type Output = Result<Reply>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let res = match &mut this.state {
            State::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(outcome)) => flatten(outcome),
                Poll::Ready(Err(_)) => Err(Error::ChannelClosed),
            },
            State::Stopped => Err(Error::EngineStopped),
            State::Finished => Err(Error::ChannelClosed),
        };
        this.state = State::Finished;
        Poll::Ready(res)
    }
}

impl std::fmt::Debug for ResultHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            State::Waiting(_) => "waiting",
            State::Stopped => "stopped",
            State::Finished => "finished",
        };
        f.debug_struct("ResultHandle")
            .field("fingerprint", &self.fingerprint)
            .field("state", &state)
            .finish()
    }
}
