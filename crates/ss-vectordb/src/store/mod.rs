//! Record storage shared by every index tier.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use crate::distance::DistanceMetric;
use crate::error::{Result, VectorDbError};
use crate::index::Record;

/// Append-only record store.
///
/// Keeps the records in insertion order next to a contiguous buffer of
/// metric-prepared vectors (`dimension` floats per slot).
#[derive(Debug, Clone)]
pub struct RecordStore<P> {
    dimension: Option<usize>,
    metric: DistanceMetric,
    records: Vec<Record<P>>,
    prepared: Vec<f32>,
    id_to_slot: HashMap<u64, usize>,
    next_id: u64,
}

impl<P> RecordStore<P> {
    pub fn new(dimension: Option<usize>, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            records: Vec::new(),
            prepared: Vec::new(),
            id_to_slot: HashMap::new(),
            next_id: 0,
        }
    }

    /// Rebuild a store from persisted parts.
    ///
    /// Anything inconsistent is reported as corrupt data rather than a
    /// caller error, since the input came from disk.
    pub fn from_parts(
        dimension: Option<usize>,
        metric: DistanceMetric,
        records: Vec<Record<P>>,
        next_id: u64,
    ) -> Result<Self> {
        if !records.is_empty() && dimension.is_none() {
            return Err(VectorDbError::corrupt("records present but dimension is 0"));
        }
        let mut store = Self::new(dimension, metric);
        if let Err(e) = store.validate(&records) {
            return Err(VectorDbError::CorruptData(e.to_string()));
        }
        if let Some(max) = records.iter().map(|r| r.id).max() {
            if next_id <= max {
                return Err(VectorDbError::corrupt(format!(
                    "next id {next_id} does not exceed stored id {max}"
                )));
            }
        }
        store.append(records);
        store.next_id = next_id;
        Ok(store)
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn records(&self) -> &[Record<P>] {
        &self.records
    }

    pub fn record(&self, slot: usize) -> &Record<P> {
        &self.records[slot]
    }

    pub fn slot_of(&self, id: u64) -> Option<usize> {
        self.id_to_slot.get(&id).copied()
    }

    /// Prepared vector at `slot`.
    pub fn vector(&self, slot: usize) -> &[f32] {
        let dim = self.dimension.unwrap_or(0);
        &self.prepared[slot * dim..(slot + 1) * dim]
    }

    /// The next `n` unused ids. Nothing is reserved until the records are
    /// appended.
    pub fn next_ids(&self, n: usize) -> Result<Range<u64>> {
        let end = u64::try_from(n)
            .ok()
            .and_then(|n| self.next_id.checked_add(n))
            .ok_or(VectorDbError::IdOutOfRange(self.next_id))?;
        Ok(self.next_id..end)
    }

    /// Check a batch against the store without modifying it.
    pub fn validate(&self, batch: &[Record<P>]) -> Result<()> {
        let expected = match (self.dimension, batch.first()) {
            (Some(d), _) => d,
            (None, Some(first)) => first.embedding.len(),
            (None, None) => return Ok(()),
        };
        if expected == 0 {
            return Err(VectorDbError::InvalidConfig(
                "embeddings must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(batch.len());
        for record in batch {
            // u64::MAX would leave no room for next_id
            if record.id == u64::MAX {
                return Err(VectorDbError::IdOutOfRange(record.id));
            }
            if record.embedding.len() != expected {
                return Err(VectorDbError::DimensionMismatch {
                    expected,
                    got: record.embedding.len(),
                });
            }
            if self.id_to_slot.contains_key(&record.id) || !seen.insert(record.id) {
                return Err(VectorDbError::DuplicateId(record.id));
            }
        }
        Ok(())
    }

    /// Commit a validated batch. Returns the slots of the new records.
    pub fn append(&mut self, batch: Vec<Record<P>>) -> Range<usize> {
        let start = self.records.len();
        if let (None, Some(first)) = (self.dimension, batch.first()) {
            self.dimension = Some(first.embedding.len());
        }
        let dim = self.dimension.unwrap_or(0);
        self.prepared.reserve(batch.len() * dim);
        self.records.reserve(batch.len());
        for record in batch {
            self.prepared.extend(self.metric.prepare(&record.embedding));
            self.id_to_slot.insert(record.id, self.records.len());
            if record.id >= self.next_id {
                self.next_id = record.id + 1;
            }
            self.records.push(record);
        }
        start..self.records.len()
    }

    /// Check the query length and bring it into scoring form.
    pub fn prepare_query(&self, query: &[f32]) -> Result<Vec<f32>> {
        let expected = self.dimension.unwrap_or(query.len());
        if query.len() != expected {
            return Err(VectorDbError::DimensionMismatch {
                expected,
                got: query.len(),
            });
        }
        Ok(self.metric.prepare(query))
    }

    /// Score the record at `slot` against a prepared query.
    #[inline]
    pub fn score(&self, slot: usize, query: &[f32]) -> f32 {
        self.metric.score_prepared(query, self.vector(slot))
    }

    /// Score two stored records against each other.
    #[inline]
    pub fn score_slots(&self, a: usize, b: usize) -> f32 {
        self.metric.score_prepared(self.vector(a), self.vector(b))
    }
}
