//! SceneSeeker vector database - pure Rust nearest-neighbor index.
//!
//! Provides an exact Flat (brute-force) index and an approximate HNSW index
//! behind one [`VectorIndex`] trait, with batched append-only insertion and
//! single-file persistence.

pub mod distance;
pub mod index;
pub mod store;
pub mod persist;
pub mod error;

pub use distance::DistanceMetric;
pub use index::{
    FlatIndex, HnswIndex, HnswParams, IndexKind, Payload, Record, SearchHit, VectorIndex,
};
pub use persist::load_index;
pub use store::RecordStore;
pub use error::{VectorDbError, Result};
