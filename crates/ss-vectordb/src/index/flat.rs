use std::path::Path;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::distance::DistanceMetric;
use crate::error::{Result, VectorDbError};
use crate::persist::{self, Header};
use crate::store::RecordStore;
use super::{select_top_k, IndexKind, Payload, Record, Scored, SearchHit, traits::VectorIndex};

/// Brute-force (flat) vector index.
/// Exact nearest-neighbor search by scanning all vectors.
pub struct FlatIndex<P> {
    inner: RwLock<RecordStore<P>>,
}

impl<P: Payload> FlatIndex<P> {
    /// Empty index; the dimension is taken from the first insert.
    pub fn new(metric: DistanceMetric) -> Self {
        Self { inner: RwLock::new(RecordStore::new(None, metric)) }
    }

    /// Empty index with a fixed dimension.
    pub fn with_dimension(dimension: usize, metric: DistanceMetric) -> Self {
        Self { inner: RwLock::new(RecordStore::new(Some(dimension), metric)) }
    }

    /// Restore an index written by [`VectorIndex::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let (mut r, header) = persist::open(path)?;
        if header.kind != IndexKind::Flat {
            return Err(VectorDbError::corrupt(format!(
                "expected a flat index, found {}",
                header.kind
            )));
        }
        let records = persist::read_records(&mut r, &header)?;
        persist::expect_eof(&mut r)?;
        let store = RecordStore::from_parts(header.dimension, header.metric, records, header.next_id)?;
        info!(path = %path.display(), records = store.len(), "loaded flat index");
        Ok(Self { inner: RwLock::new(store) })
    }
}

impl<P: Payload> VectorIndex<P> for FlatIndex<P> {
    fn insert_batch(&self, batch: Vec<Record<P>>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.write();
        inner.validate(&batch)?;
        let slots = inner.append(batch);
        debug!(inserted = slots.len(), total = inner.len(), "flat batch inserted");
        Ok(())
    }

    fn add_batch(&self, items: Vec<(Vec<f32>, P)>) -> Result<Vec<u64>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let mut inner = self.inner.write();
        let ids = inner.next_ids(items.len())?;
        let batch: Vec<Record<P>> = items
            .into_iter()
            .zip(ids.clone())
            .map(|((embedding, payload), id)| Record::new(id, embedding, payload))
            .collect();
        inner.validate(&batch)?;
        let slots = inner.append(batch);
        debug!(inserted = slots.len(), total = inner.len(), "flat batch inserted");
        Ok(ids.collect())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit<P>>> {
        let inner = self.inner.read();
        if inner.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = inner.prepare_query(query)?;

        let scored = (0..inner.len()).map(|slot| {
            Scored::new(inner.score(slot, &query_vec), inner.record(slot).id, slot)
        });

        Ok(select_top_k(scored, top_k)
            .into_iter()
            .map(|s| SearchHit {
                record: inner.record(s.slot).clone(),
                score: s.score.into_inner(),
            })
            .collect())
    }

    fn get(&self, id: u64) -> Option<Record<P>> {
        let inner = self.inner.read();
        inner.slot_of(id).map(|slot| inner.record(slot).clone())
    }

    fn len(&self) -> usize {
        self.inner.read().len()
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.read().dimension()
    }

    fn metric(&self) -> DistanceMetric {
        self.inner.read().metric()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }

    fn save(&self, path: &Path) -> Result<()> {
        let inner = self.inner.read();
        let header = Header {
            kind: IndexKind::Flat,
            metric: inner.metric(),
            dimension: inner.dimension(),
            count: inner.len() as u64,
            next_id: inner.next_id(),
        };
        persist::write_atomic(path, |w| {
            persist::write_header(w, &header)?;
            persist::write_records(w, inner.records())
        })?;
        info!(path = %path.display(), records = header.count, "saved flat index");
        Ok(())
    }
}
