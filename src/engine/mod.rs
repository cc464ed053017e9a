//! 自动流水线引擎：合并并发请求，按数量或时间阈值批量执行。
//!
//! # Coalescing Engine
//!
//! [`Engine`] owns the pending-operation table, the background control loop
//! and the flush/dispatch path.
//!
//! ## Lifecycle
//!
//! - [`Engine::builder`] / [`Engine::start`] spawn the control loop on the
//!   current tokio runtime.
//! - [`Engine::enqueue`] admits a command and returns a [`ResultHandle`]
//!   without waiting on the network.
//! - Every `poll_interval` the loop flushes when the active-listener count
//!   exceeds `max_size`, or when listeners are pending and `ttl` has passed
//!   since the last flush.
//! - Cancelling (via [`Engine::shutdown`], [`Engine::stop`], dropping the
//!   engine, or an external [`CancellationToken`]) stops admission, runs one
//!   final flush and ends the loop.
//!
//! ## Example
//!
//! ```rust
//! use autopipeline::backend::MemoryBackend;
//! use autopipeline::{Engine, OperationKind, PipelineConfig};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> autopipeline::Result<()> {
//! let backend = Arc::new(MemoryBackend::new());
//! backend.set("greeting", "hello");
//!
//! let engine = Engine::start(backend, PipelineConfig::default())?;
//! let a = engine.enqueue(OperationKind::Get, vec!["greeting".into()]);
//! let b = engine.enqueue(OperationKind::Get, vec!["greeting".into()]);
//! assert_eq!(a.await?, b.await?);
//! engine.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod control;
mod flush;
mod stats;

pub use control::FlushTrigger;
pub use stats::EngineStats;

use crate::batch::{fingerprint, Admission, BatchExecutor, PendingTable, ResultHandle};
use crate::command::Command;
use crate::config::PipelineConfig;
use crate::operation::OperationKind;
use crate::reply::Reply;
use crate::telemetry::{EngineEvent, EventSink};
use crate::{Error, ErrorContext, Result};
use stats::AtomicStats;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// State shared between callers and the control loop.
pub(crate) struct Shared {
    pub config: PipelineConfig,
    pub table: PendingTable,
    pub executor: Arc<dyn BatchExecutor>,
    pub sink: Arc<dyn EventSink>,
    pub stats: AtomicStats,
}

/// The coalescing engine.
pub struct Engine {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Builder for an [`Engine`].
pub struct EngineBuilder {
    executor: Arc<dyn BatchExecutor>,
    config: PipelineConfig,
    sink: Arc<dyn EventSink>,
    cancel: Option<CancellationToken>,
}

impl EngineBuilder {
    pub fn new(executor: Arc<dyn BatchExecutor>) -> Self {
        Self {
            executor,
            config: PipelineConfig::default(),
            sink: crate::telemetry::get_event_sink(),
            cancel: None,
        }
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Inject an event sink. Default is the process-wide sink (no-op unless set).
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Stop the engine when `token` is cancelled.
    ///
    /// The engine listens on a child token, so [`Engine::shutdown`] never
    /// cancels the caller's token.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Validate the config and spawn the control loop on the current runtime.
    pub fn start(self) -> Result<Engine> {
        self.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::runtime_with_context(
                "engine must be started inside a tokio runtime",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("engine"),
            )
        })?;

        let cancel = match self.cancel {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let shared = Arc::new(Shared {
            config: self.config,
            table: PendingTable::new(),
            executor: self.executor,
            sink: self.sink,
            stats: AtomicStats::default(),
        });
        debug!(
            executor = shared.executor.name(),
            ttl_us = shared.config.ttl.as_micros() as u64,
            max_size = shared.config.max_size,
            poll_interval_us = shared.config.poll_interval.as_micros() as u64,
            "starting autopipeline engine"
        );
        let ticks = control::spawn_ticker(shared.config.poll_interval, cancel.clone())?;
        let task = runtime.spawn(control::run(Arc::clone(&shared), cancel.clone(), ticks));

        Ok(Engine {
            shared,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }
}

impl Engine {
    pub fn builder(executor: Arc<dyn BatchExecutor>) -> EngineBuilder {
        EngineBuilder::new(executor)
    }

    pub fn start(executor: Arc<dyn BatchExecutor>, config: PipelineConfig) -> Result<Self> {
        EngineBuilder::new(executor).config(config).start()
    }

    /// Admit a command. Never waits on the network.
    ///
    /// Identical `(kind, args)` pairs admitted before the next flush share one
    /// submission and all receive its outcome. After shutdown the returned
    /// handle resolves to [`Error::EngineStopped`].
    pub fn enqueue(&self, kind: OperationKind, args: Vec<String>) -> ResultHandle {
        if self.shared.table.is_closed() {
            return self.reject(kind);
        }
        let fp = fingerprint(kind, &args);
        let (tx, rx) = oneshot::channel();
        let stats = &self.shared.stats;
        match self.shared.table.insert(fp, kind, args, tx) {
            Admission::New => AtomicStats::bump(&stats.enqueued, 1),
            Admission::Joined { .. } => {
                AtomicStats::bump(&stats.enqueued, 1);
                AtomicStats::bump(&stats.deduplicated, 1);
            }
            Admission::Closed => return self.reject(kind),
        }
        ResultHandle::new(fp, rx)
    }

    pub fn enqueue_command(&self, command: Command) -> ResultHandle {
        let (kind, args) = command.into_parts();
        self.enqueue(kind, args)
    }

    /// Enqueue and wait for the outcome.
    pub async fn execute(&self, kind: OperationKind, args: Vec<String>) -> Result<Reply> {
        self.enqueue(kind, args).await
    }

    fn reject(&self, kind: OperationKind) -> ResultHandle {
        warn!(%kind, "enqueue rejected: engine is stopped");
        AtomicStats::bump(&self.shared.stats.rejected, 1);
        self.shared.sink.report(EngineEvent::EngineStopped { kind });
        ResultHandle::stopped()
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.table.is_closed()
    }

    /// Active listeners across all pending operations.
    pub fn pending(&self) -> usize {
        self.shared.table.active_listeners()
    }

    /// Distinct pending operations.
    pub fn pending_operations(&self) -> usize {
        self.shared.table.len()
    }

    pub fn stats(&self) -> EngineStats {
        self.shared.stats.to_stats()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.shared.config
    }

    pub fn executor_name(&self) -> &'static str {
        self.shared.executor.name()
    }

    /// Request shutdown without waiting for the final flush.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop admitting commands, wait for the final flush and the loop to end.
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.await.map_err(|e| {
                Error::runtime_with_context(
                    "control loop terminated abnormally",
                    ErrorContext::new()
                        .with_details(e.to_string())
                        .with_source("engine"),
                )
            })?;
        }
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("executor", &self.shared.executor.name())
            .field("config", &self.shared.config)
            .field("pending", &self.pending())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
