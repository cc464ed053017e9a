//! The control loop: decides when to flush.

use super::flush::{abort_remaining, flush};
use super::Shared;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Upper bound on the pause after a failed round-trip.
const MAX_RETRY_HOLD_OFF: Duration = Duration::from_millis(100);

/// Why a flush ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlushTrigger {
    /// Active listeners exceeded `max_size`.
    Size,
    /// Listeners were pending and `ttl` had passed since the last flush.
    Ttl,
    /// Final drain after cancellation.
    Shutdown,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlushTrigger::Size => "size",
            FlushTrigger::Ttl => "ttl",
            FlushTrigger::Shutdown => "shutdown",
        })
    }
}

/// Pure trigger policy, evaluated once per tick.
///
/// Size wins over time; the size check is strictly greater-than.
pub(crate) fn decide(
    active: usize,
    max_size: usize,
    since_last_flush: Duration,
    ttl: Duration,
) -> Option<FlushTrigger> {
    if active > max_size {
        Some(FlushTrigger::Size)
    } else if active > 0 && since_last_flush >= ttl {
        Some(FlushTrigger::Ttl)
    } else {
        None
    }
}

/// Pause between retries of a failing round-trip.
///
/// Doubles from `poll_interval` per consecutive failure, capped at
/// `min(ttl, MAX_RETRY_HOLD_OFF)` so a large ttl never parks the size trigger.
#[derive(Debug)]
pub(crate) struct RetryHoldOff {
    base: Duration,
    cap: Duration,
    failures: u32,
}

impl RetryHoldOff {
    pub fn new(poll_interval: Duration, ttl: Duration) -> Self {
        Self {
            base: poll_interval,
            cap: ttl.min(MAX_RETRY_HOLD_OFF).max(poll_interval),
            failures: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let factor = 1u32.checked_shl(self.failures).unwrap_or(u32::MAX);
        self.failures = self.failures.saturating_add(1);
        self.base.saturating_mul(factor).min(self.cap)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

/// Start the OS thread that paces the control loop.
///
/// tokio timers tick at millisecond granularity, so the sub-millisecond
/// `poll_interval` is slept on a dedicated thread. Ticks that arrive while
/// the loop is busy are merged. The thread exits on cancellation or once the
/// loop has gone away.
pub(crate) fn spawn_ticker(
    poll_interval: Duration,
    cancel: CancellationToken,
) -> Result<mpsc::Receiver<()>> {
    let (tx, rx) = mpsc::channel(1);
    std::thread::Builder::new()
        .name("autopipeline-ticker".to_string())
        .spawn(move || loop {
            std::thread::sleep(poll_interval);
            if cancel.is_cancelled() {
                return;
            }
            match tx.try_send(()) {
                Ok(()) | Err(TrySendError::Full(())) => {}
                Err(TrySendError::Closed(())) => return,
            }
        })
        .map_err(|e| {
            Error::runtime_with_context(
                "failed to spawn ticker thread",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("engine"),
            )
        })?;
    Ok(rx)
}

pub(crate) async fn run(
    shared: Arc<Shared>,
    cancel: CancellationToken,
    mut ticks: mpsc::Receiver<()>,
) {
    let ttl = shared.config.ttl;
    let mut hold_off = RetryHoldOff::new(shared.config.poll_interval, ttl);

    let mut last_flush = Instant::now();
    let mut retry_at: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            tick = ticks.recv() => {
                if tick.is_none() {
                    break;
                }
            }
        }

        if let Some(at) = retry_at {
            if Instant::now() < at {
                continue;
            }
            retry_at = None;
        }

        let active = shared.table.active_listeners();
        let Some(trigger) = decide(active, shared.config.max_size, last_flush.elapsed(), ttl)
        else {
            continue;
        };

        match flush(&shared, trigger).await {
            Ok(_) => {
                last_flush = Instant::now();
                hold_off.reset();
            }
            Err(_) => retry_at = Some(Instant::now() + hold_off.next_delay()),
        }
    }
    shutdown(&shared).await;
}

async fn shutdown(shared: &Shared) {
    shared.table.close();
    debug!(
        pending = shared.table.active_listeners(),
        "control loop stopping, draining"
    );
    if shared.table.active_listeners() > 0 {
        if let Err(err) = flush(shared, FlushTrigger::Shutdown).await {
            let failed = abort_remaining(shared, &format!("engine stopped: {}", err));
            warn!(failed, "final flush failed, pending operations were failed");
        }
    }
    debug!("control loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_millis(1);

    #[test]
    fn test_size_trigger_is_strictly_greater() {
        assert_eq!(decide(1, 1, Duration::ZERO, TTL), None);
        assert_eq!(decide(2, 1, Duration::ZERO, TTL), Some(FlushTrigger::Size));
    }

    #[test]
    fn test_size_wins_over_ttl() {
        assert_eq!(decide(5, 1, TTL * 3, TTL), Some(FlushTrigger::Size));
    }

    #[test]
    fn test_ttl_needs_pending_listeners() {
        assert_eq!(decide(0, 10, TTL * 3, TTL), None);
        assert_eq!(decide(1, 10, TTL, TTL), Some(FlushTrigger::Ttl));
        assert_eq!(decide(1, 10, TTL / 2, TTL), None);
    }

    #[test]
    fn test_hold_off_doubles_up_to_cap() {
        let poll = Duration::from_micros(50);
        let mut hold_off = RetryHoldOff::new(poll, Duration::from_secs(3600));
        assert_eq!(hold_off.next_delay(), poll);
        assert_eq!(hold_off.next_delay(), poll * 2);
        assert_eq!(hold_off.next_delay(), poll * 4);
        for _ in 0..40 {
            hold_off.next_delay();
        }
        assert_eq!(hold_off.next_delay(), MAX_RETRY_HOLD_OFF);
        hold_off.reset();
        assert_eq!(hold_off.next_delay(), poll);
    }

    #[test]
    fn test_hold_off_cap_follows_small_ttl() {
        let mut hold_off = RetryHoldOff::new(Duration::from_micros(50), Duration::from_millis(1));
        for _ in 0..10 {
            hold_off.next_delay();
        }
        assert_eq!(hold_off.next_delay(), Duration::from_millis(1));

        // ttl below poll_interval
        let mut hold_off = RetryHoldOff::new(Duration::from_millis(2), Duration::from_micros(10));
        assert_eq!(hold_off.next_delay(), Duration::from_millis(2));
    }

    #[tokio::test]
    async fn test_ticker_honours_sub_millisecond_interval() {
        let cancel = CancellationToken::new();
        let mut ticks = spawn_ticker(Duration::from_micros(100), cancel.clone()).unwrap();
        let started = Instant::now();
        for _ in 0..20 {
            ticks.recv().await.unwrap();
        }
        // 20 ticks at tokio's 1 ms timer granularity would need at least 20 ms
        assert!(started.elapsed() < Duration::from_millis(20), "{:?}", started.elapsed());
        cancel.cancel();
        while ticks.recv().await.is_some() {}
    }

    #[test]
    fn test_zero_max_size_flushes_any_listener() {
        assert_eq!(decide(1, 0, Duration::ZERO, TTL), Some(FlushTrigger::Size));
        assert_eq!(decide(0, 0, Duration::ZERO, TTL), None);
    }
}
