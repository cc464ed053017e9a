//! Batching primitives: fingerprints, the pending-operation table, the executor
//! seam and the result handle.
//!
//! # Request Coalescing Building Blocks
//!
//! The engine in [`crate::engine`] is assembled from the pieces here.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`fingerprint()`] | SHA-256 dedup key over (kind, args) |
//! | [`PendingTable`] | Fingerprint → pending operation map with an active-listener counter |
//! | [`BatchExecutor`] / [`Batch`] | One-round-trip execution seam implemented by backends |
//! | [`ResultHandle`] | Single-use future resolving to one command's reply |
//!
//! ## Example
//!
//! ```rust
//! use autopipeline::batch::fingerprint;
//! use autopipeline::OperationKind;
//!
//! let a = fingerprint(OperationKind::HDel, &["key", "field"]);
//! let b = fingerprint(OperationKind::Del, &["key", "field"]);
//! assert_ne!(a, b);
//! assert_eq!(a.to_string().len(), 64);
//! ```

mod executor;
mod fingerprint;
mod handle;
mod table;

pub use executor::{Batch, BatchExecutor, BatchReplies, Slot};
pub use fingerprint::{fingerprint, Fingerprint};
pub use handle::ResultHandle;
pub use table::{Admission, PendingTable, SnapshotEntry};

pub(crate) use table::Listener;
