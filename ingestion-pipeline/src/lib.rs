#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod chunker;
pub mod consistency;
pub mod extract;
pub mod locks;
pub mod pipeline;

pub use chunker::{ChunkSpan, Chunker};
pub use consistency::{ConsistencyManager, DeleteOutcome, ReconcileReport};
pub use extract::DeclaredType;
pub use locks::DocumentLocks;
pub use pipeline::{IngestOutcome, IngestionPipeline};
