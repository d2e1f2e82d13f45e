use std::path::Path;

use crate::distance::DistanceMetric;
use crate::error::Result;
use super::{IndexKind, Payload, Record, SearchHit};

/// Core trait for vector index implementations.
///
/// Implementations guard their state with a single reader/writer lock:
/// insertions are exclusive, searches and saves share the lock.
pub trait VectorIndex<P: Payload>: Send + Sync {
    /// Insert a batch of records carrying caller-chosen ids.
    ///
    /// The whole batch is validated before anything is stored, so a failed
    /// call leaves the index unchanged. Inserting the same content twice
    /// under fresh ids stores it twice.
    fn insert_batch(&self, batch: Vec<Record<P>>) -> Result<()>;

    /// Insert a batch, assigning fresh monotonic ids. Returns the ids in
    /// input order.
    fn add_batch(&self, items: Vec<(Vec<f32>, P)>) -> Result<Vec<u64>>;

    /// Search for the top-k most similar records, best first. Equal scores
    /// are ordered by ascending id.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit<P>>>;

    /// Look up a record by id.
    fn get(&self, id: u64) -> Option<Record<P>>;

    /// Get the number of records in the index.
    fn len(&self) -> usize;

    /// Check if the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embedding dimension, once fixed.
    fn dimension(&self) -> Option<usize>;

    /// Get the distance metric used.
    fn metric(&self) -> DistanceMetric;

    fn kind(&self) -> IndexKind;

    /// Persist the index to a single file, replacing it atomically.
    fn save(&self, path: &Path) -> Result<()>;
}
