//! Typed client over the coalescing engine.
//!
//! Keep the public surface small: one method per command, each with an
//! awaiting form and an `*_async` form that hands back a [`TypedHandle`].
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;
pub mod types;

pub use builder::AutoPipelineBuilder;
pub use core::AutoPipeline;
pub use types::TypedHandle;
