//! Batch executor implementations.
//!
//! A real network client plugs into the engine by implementing
//! [`BatchExecutor`](crate::batch::BatchExecutor). This module ships the
//! in-process [`MemoryBackend`], used by tests, benches and the load driver.
//!
//! ```rust
//! use autopipeline::backend::MemoryBackend;
//! use autopipeline::batch::BatchExecutor;
//!
//! let backend = MemoryBackend::new();
//! backend.hset("user:1", "name", "ada");
//! assert_eq!(backend.name(), "memory");
//! assert!(backend.exists("user:1"));
//! ```

mod memory;

pub use memory::MemoryBackend;
