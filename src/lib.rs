//! # autopipeline
//!
//! 自动流水线：把并发的键值请求合并为共享的批量往返。
//!
//! An auto-pipelining engine for key-value backends. Concurrent callers enqueue
//! commands and get a handle back immediately; a background control loop
//! coalesces everything pending into one batched round-trip and delivers each
//! reply to every caller that asked for it.
//!
//! ## Core Behavior
//!
//! - **Deduplication**: identical `(kind, args)` commands pending at the same
//!   time are sent once; every caller receives the shared outcome
//! - **Size trigger**: flush as soon as active listeners exceed `max_size`
//! - **Time trigger**: flush when listeners are pending and `ttl` has passed
//!   since the last flush
//! - **Graceful stop**: cancellation stops admission and runs a final flush
//! - **Pluggable backend**: anything implementing [`batch::BatchExecutor`]
//!
//! ## Quick Start
//!
//! ```rust
//! use autopipeline::backend::MemoryBackend;
//! use autopipeline::AutoPipeline;
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> autopipeline::Result<()> {
//!     let backend = Arc::new(MemoryBackend::new());
//!     backend.hset("user:1", "name", "ada");
//!
//!     let client = AutoPipeline::builder().executor(backend.clone()).build()?;
//!     let (a, b) = tokio::join!(client.hget("user:1", "name"), client.hget("user:1", "name"));
//!     assert_eq!(a?, "ada");
//!     assert_eq!(b?, "ada");
//!     assert_eq!(backend.submitted(), 1);
//!
//!     client.shutdown().await
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`engine`] | Coalescing engine, control loop, flush and dispatch |
//! | [`batch`] | Fingerprints, pending table, result handles, executor contract |
//! | [`client`] | Typed `AutoPipeline` client and builder |
//! | [`command`] | Typed commands and their canonical argument lists |
//! | [`operation`] | Supported operation kinds |
//! | [`reply`] | Reply values and per-command errors |
//! | [`backend`] | In-process reference executor |
//! | [`config`] | Engine options and environment overrides |
//! | [`telemetry`] | Engine events and sinks |

pub mod backend;
pub mod batch;
pub mod client;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod operation;
pub mod reply;
pub mod telemetry;

pub use crate::batch::{Fingerprint, ResultHandle};
pub use crate::client::{AutoPipeline, AutoPipelineBuilder, TypedHandle};
pub use crate::command::Command;
pub use crate::config::PipelineConfig;
pub use crate::engine::{Engine, EngineBuilder, EngineStats, FlushTrigger};
pub use crate::error::{Error, ErrorContext};
pub use crate::operation::OperationKind;
pub use crate::reply::{CommandError, FromReply, Outcome, Reply};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
