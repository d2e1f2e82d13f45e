//! Vector index implementations: Flat (brute-force) and HNSW.

mod flat;
mod hnsw;
mod traits;

pub use flat::FlatIndex;
pub use hnsw::{HnswIndex, HnswParams};
pub use traits::VectorIndex;

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;

use ordered_float::OrderedFloat;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Metadata types that can ride along with an embedding.
///
/// Payloads are opaque to the index; they only need to be cloneable for
/// search results and serializable for persistence.
pub trait Payload: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Payload for T where T: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {}

/// A stored entry. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<P> {
    pub id: u64,
    pub embedding: Vec<f32>,
    pub payload: P,
}

impl<P> Record<P> {
    pub fn new(id: u64, embedding: Vec<f32>, payload: P) -> Self {
        Self { id, embedding, payload }
    }
}

/// One search result: the matched record and its similarity score.
#[derive(Debug, Clone)]
pub struct SearchHit<P> {
    pub record: Record<P>,
    pub score: f32,
}

impl<P> SearchHit<P> {
    pub fn id(&self) -> u64 {
        self.record.id
    }
}

/// Which search structure an index uses. Persisted in the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    #[default]
    Flat,
    Hnsw,
}

impl IndexKind {
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "hnsw" | "graph" => Self::Hnsw,
            _ => Self::Flat,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::Flat => 0,
            Self::Hnsw => 1,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Flat),
            1 => Some(Self::Hnsw),
            _ => None,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => write!(f, "flat"),
            Self::Hnsw => write!(f, "hnsw"),
        }
    }
}

/// A scored slot in the record store.
///
/// `Ord` puts the better candidate last: higher score first, then the
/// smaller id wins a tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Scored {
    pub score: OrderedFloat<f32>,
    pub id: u64,
    pub slot: usize,
}

impl Scored {
    pub fn new(score: f32, id: u64, slot: usize) -> Self {
        Self { score: OrderedFloat(score), id, slot }
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Keep the best `k` candidates, returned best first.
pub(crate) fn select_top_k<I>(candidates: I, k: usize) -> Vec<Scored>
where
    I: IntoIterator<Item = Scored>,
{
    if k == 0 {
        return Vec::new();
    }
    // min-heap over the current top k; the root is the weakest survivor
    let mut heap: BinaryHeap<Reverse<Scored>> = BinaryHeap::with_capacity(k + 1);
    for cand in candidates {
        if heap.len() < k {
            heap.push(Reverse(cand));
        } else if let Some(Reverse(worst)) = heap.peek() {
            if cand > *worst {
                heap.pop();
                heap.push(Reverse(cand));
            }
        }
    }
    let mut out: Vec<Scored> = heap.into_iter().map(|Reverse(s)| s).collect();
    out.sort_by(|a, b| b.cmp(a));
    out
}
