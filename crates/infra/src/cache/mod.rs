//! Local object cache
//!
//! Holds the latest observed state of each object, keyed by
//! [`ObjectKey`](syncloop_domain::ObjectKey). The watch layer writes into it
//! and workers read from it through the core `Indexer` port.

mod memory_indexer;

pub use memory_indexer::MemoryIndexer;
