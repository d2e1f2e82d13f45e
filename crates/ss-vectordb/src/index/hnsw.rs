use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::io::{Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::distance::DistanceMetric;
use crate::error::{Result, VectorDbError};
use crate::persist::{self, read_err, Header};
use crate::store::RecordStore;
use super::{select_top_k, IndexKind, Payload, Record, Scored, SearchHit, traits::VectorIndex};

/// Levels above this are never drawn.
const MAX_LEVEL: usize = 16;
const NO_ENTRY: u64 = u64::MAX;

/// Tuning knobs for [`HnswIndex`].
///
/// - `m`: connections per node on upper layers; layer 0 allows `2 * m` (default 16)
/// - `ef_construction`: candidate list width while inserting (default 200)
/// - `ef_search`: candidate list width while querying (default 128). Higher
///   values raise recall and cost latency.
/// - `seed`: level assignment seed; equal seeds give identical graphs for
///   identical insert sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswParams {
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub seed: u64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 128,
            seed: 0x5eed_5eed,
        }
    }
}

impl HnswParams {
    fn sanitized(self) -> Self {
        Self {
            m: self.m.max(2),
            ef_construction: self.ef_construction.max(1),
            ef_search: self.ef_search.max(1),
            seed: self.seed,
        }
    }

    fn max_neighbors(&self, level: usize) -> usize {
        if level == 0 { self.m * 2 } else { self.m }
    }

    /// Level for the node stored at `slot`. A pure function of the seed and
    /// slot, so a restored graph keeps growing the same way.
    fn level_for(&self, slot: usize) -> usize {
        let ml = 1.0 / (self.m as f64).ln();
        let mut rng = StdRng::seed_from_u64(
            self.seed ^ (slot as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
        );
        // (0, 1] keeps ln finite
        let r: f64 = 1.0 - rng.gen::<f64>();
        ((-r.ln() * ml).floor() as usize).min(MAX_LEVEL)
    }
}

/// HNSW (Hierarchical Navigable Small World) index.
///
/// Approximate search: each record is a graph node linked to a bounded
/// number of near neighbors per layer. Queries descend greedily from the
/// entry point and finish with a best-first search on layer 0.
pub struct HnswIndex<P> {
    params: HnswParams,
    inner: RwLock<HnswInner<P>>,
}

struct HnswInner<P> {
    store: RecordStore<P>,
    graph: Graph,
}

#[derive(Debug, Default)]
struct Graph {
    /// links[slot][level] = neighbor slots. `links[slot].len() - 1` is the
    /// node's top level.
    links: Vec<Vec<Vec<u32>>>,
    entry_point: Option<usize>,
    max_level: usize,
}

impl<P: Payload> HnswIndex<P> {
    pub fn new(metric: DistanceMetric) -> Self {
        Self::with_params(None, metric, HnswParams::default())
    }

    pub fn with_dimension(dimension: usize, metric: DistanceMetric) -> Self {
        Self::with_params(Some(dimension), metric, HnswParams::default())
    }

    pub fn with_params(dimension: Option<usize>, metric: DistanceMetric, params: HnswParams) -> Self {
        Self {
            params: params.sanitized(),
            inner: RwLock::new(HnswInner {
                store: RecordStore::new(dimension, metric),
                graph: Graph::default(),
            }),
        }
    }

    pub fn params(&self) -> HnswParams {
        self.params
    }

    /// Search with an explicit candidate list width instead of `ef_search`.
    pub fn search_with_ef(&self, query: &[f32], top_k: usize, ef: usize) -> Result<Vec<SearchHit<P>>> {
        let inner = self.inner.read();
        let Some(entry) = inner.graph.entry_point else {
            return Ok(Vec::new());
        };
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let store = &inner.store;
        let query_vec = store.prepare_query(query)?;

        let mut curr = entry;
        for lev in (1..=inner.graph.max_level).rev() {
            curr = inner.graph.greedy_closest(store, lev, curr, &query_vec);
        }
        let mut candidates = inner.graph.search_layer(store, 0, curr, &query_vec, ef.max(top_k));

        // Pruning can strand nodes; never return fewer than min(k, len).
        if candidates.len() < top_k.min(store.len()) {
            debug!(found = candidates.len(), top_k, "hnsw frontier exhausted, scanning");
            let all = (0..store.len())
                .map(|slot| Scored::new(store.score(slot, &query_vec), store.record(slot).id, slot));
            candidates = select_top_k(all, top_k);
        }

        Ok(candidates
            .into_iter()
            .take(top_k)
            .map(|s| SearchHit {
                record: store.record(s.slot).clone(),
                score: s.score.into_inner(),
            })
            .collect())
    }

    /// Restore an index written by [`VectorIndex::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let (mut r, header) = persist::open(path)?;
        if header.kind != IndexKind::Hnsw {
            return Err(VectorDbError::corrupt(format!(
                "expected an hnsw index, found {}",
                header.kind
            )));
        }
        let records = persist::read_records(&mut r, &header)?;
        let (params, graph) = read_graph(&mut r, header.count)?;
        persist::expect_eof(&mut r)?;
        let store = RecordStore::from_parts(header.dimension, header.metric, records, header.next_id)?;
        info!(
            path = %path.display(),
            records = store.len(),
            max_level = graph.max_level,
            "loaded hnsw index"
        );
        Ok(Self {
            params,
            inner: RwLock::new(HnswInner { store, graph }),
        })
    }

    fn commit(&self, inner: &mut HnswInner<P>, batch: Vec<Record<P>>) {
        let HnswInner { store, graph } = inner;
        let slots = store.append(batch);
        let inserted = slots.len();
        for slot in slots {
            graph.insert(store, &self.params, slot);
        }
        debug!(inserted, total = store.len(), max_level = graph.max_level, "hnsw batch inserted");
    }
}

impl<P: Payload> VectorIndex<P> for HnswIndex<P> {
    fn insert_batch(&self, batch: Vec<Record<P>>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.write();
        inner.store.validate(&batch)?;
        self.commit(&mut inner, batch);
        Ok(())
    }

    fn add_batch(&self, items: Vec<(Vec<f32>, P)>) -> Result<Vec<u64>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let mut inner = self.inner.write();
        let ids = inner.store.next_ids(items.len())?;
        let batch: Vec<Record<P>> = items
            .into_iter()
            .zip(ids.clone())
            .map(|((embedding, payload), id)| Record::new(id, embedding, payload))
            .collect();
        inner.store.validate(&batch)?;
        self.commit(&mut inner, batch);
        Ok(ids.collect())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit<P>>> {
        self.search_with_ef(query, top_k, self.params.ef_search)
    }

    fn get(&self, id: u64) -> Option<Record<P>> {
        let inner = self.inner.read();
        inner.store.slot_of(id).map(|slot| inner.store.record(slot).clone())
    }

    fn len(&self) -> usize {
        self.inner.read().store.len()
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.read().store.dimension()
    }

    fn metric(&self) -> DistanceMetric {
        self.inner.read().store.metric()
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Hnsw
    }

    fn save(&self, path: &Path) -> Result<()> {
        let inner = self.inner.read();
        let header = Header {
            kind: IndexKind::Hnsw,
            metric: inner.store.metric(),
            dimension: inner.store.dimension(),
            count: inner.store.len() as u64,
            next_id: inner.store.next_id(),
        };
        persist::write_atomic(path, |w| {
            persist::write_header(w, &header)?;
            persist::write_records(w, inner.store.records())?;
            write_graph(w, &self.params, &inner.graph)
        })?;
        info!(path = %path.display(), records = header.count, "saved hnsw index");
        Ok(())
    }
}

impl Graph {
    fn neighbors(&self, slot: usize, level: usize) -> &[u32] {
        self.links[slot].get(level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Link the record at `slot` into the graph. `slot` must be the next
    /// unlinked slot of `store`.
    fn insert<P>(&mut self, store: &RecordStore<P>, params: &HnswParams, slot: usize) {
        debug_assert_eq!(slot, self.links.len());
        let level = params.level_for(slot);
        self.links.push(vec![Vec::new(); level + 1]);

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(slot);
            self.max_level = level;
            return;
        };

        let query = store.vector(slot);
        let mut curr = entry;

        // Traverse from top level down to level+1 with greedy search
        for lev in (level + 1..=self.max_level).rev() {
            curr = self.greedy_closest(store, lev, curr, query);
        }

        for lev in (0..=level.min(self.max_level)).rev() {
            let candidates = self.search_layer(store, lev, curr, query, params.ef_construction);
            let cap = params.max_neighbors(lev);
            let neighbors: Vec<u32> = candidates
                .iter()
                .filter(|c| c.slot != slot)
                .take(cap)
                .map(|c| c.slot as u32)
                .collect();

            // Bidirectional connections, pruning over-full neighbors
            for &n in &neighbors {
                let n = n as usize;
                self.links[n][lev].push(slot as u32);
                if self.links[n][lev].len() > cap {
                    let scored = self.links[n][lev].iter().map(|&x| {
                        let x = x as usize;
                        Scored::new(store.score_slots(n, x), store.record(x).id, x)
                    });
                    self.links[n][lev] = select_top_k(scored, cap)
                        .into_iter()
                        .map(|s| s.slot as u32)
                        .collect();
                }
            }
            self.links[slot][lev] = neighbors;

            if let Some(best) = candidates.first() {
                curr = best.slot;
            }
        }

        if level > self.max_level {
            self.entry_point = Some(slot);
            self.max_level = level;
        }
    }

    fn greedy_closest<P>(&self, store: &RecordStore<P>, level: usize, start: usize, query: &[f32]) -> usize {
        let mut current = start;
        let mut current_score = store.score(current, query);
        loop {
            let mut changed = false;
            for &neighbor in self.neighbors(current, level) {
                let neighbor = neighbor as usize;
                let score = store.score(neighbor, query);
                if score > current_score {
                    current = neighbor;
                    current_score = score;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        current
    }

    /// Best-first search of one layer. Returns up to `ef` candidates, best first.
    fn search_layer<P>(
        &self,
        store: &RecordStore<P>,
        level: usize,
        entry: usize,
        query: &[f32],
        ef: usize,
    ) -> Vec<Scored> {
        let mut visited = HashSet::new();
        visited.insert(entry);
        let first = Scored::new(store.score(entry, query), store.record(entry).id, entry);

        // Max-heap of frontier, min-heap of results (worst on top)
        let mut candidates: BinaryHeap<Scored> = BinaryHeap::new();
        let mut results: BinaryHeap<Reverse<Scored>> = BinaryHeap::new();
        candidates.push(first);
        results.push(Reverse(first));

        while let Some(cand) = candidates.pop() {
            if results.len() >= ef {
                if let Some(Reverse(worst)) = results.peek() {
                    if cand < *worst {
                        break;
                    }
                }
            }

            for &neighbor in self.neighbors(cand.slot, level) {
                let neighbor = neighbor as usize;
                if !visited.insert(neighbor) {
                    continue;
                }
                let scored = Scored::new(store.score(neighbor, query), store.record(neighbor).id, neighbor);
                let should_add = match results.peek() {
                    Some(Reverse(worst)) if results.len() >= ef => scored > *worst,
                    _ => true,
                };
                if should_add {
                    candidates.push(scored);
                    results.push(Reverse(scored));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut out: Vec<Scored> = results.into_iter().map(|Reverse(s)| s).collect();
        out.sort_by(|a, b| b.cmp(a));
        out
    }
}

fn to_u32(v: usize, what: &str) -> Result<u32> {
    u32::try_from(v).map_err(|_| VectorDbError::InvalidConfig(format!("{what} exceeds u32")))
}

// Trailer: m | ef_construction | ef_search | seed | entry | max_level | node_count | nodes
fn write_graph<W: Write>(w: &mut W, params: &HnswParams, graph: &Graph) -> Result<()> {
    w.write_u32::<LittleEndian>(to_u32(params.m, "m")?)?;
    w.write_u32::<LittleEndian>(to_u32(params.ef_construction, "ef_construction")?)?;
    w.write_u32::<LittleEndian>(to_u32(params.ef_search, "ef_search")?)?;
    w.write_u64::<LittleEndian>(params.seed)?;
    w.write_u64::<LittleEndian>(graph.entry_point.map_or(NO_ENTRY, |e| e as u64))?;
    w.write_u32::<LittleEndian>(graph.max_level as u32)?;
    w.write_u64::<LittleEndian>(graph.links.len() as u64)?;
    for node in &graph.links {
        w.write_u32::<LittleEndian>((node.len() - 1) as u32)?;
        for layer in node {
            w.write_u32::<LittleEndian>(layer.len() as u32)?;
            for &n in layer {
                w.write_u32::<LittleEndian>(n)?;
            }
        }
    }
    Ok(())
}

fn read_graph<R: Read>(r: &mut R, count: u64) -> Result<(HnswParams, Graph)> {
    let params = HnswParams {
        m: r.read_u32::<LittleEndian>().map_err(read_err)? as usize,
        ef_construction: r.read_u32::<LittleEndian>().map_err(read_err)? as usize,
        ef_search: r.read_u32::<LittleEndian>().map_err(read_err)? as usize,
        seed: r.read_u64::<LittleEndian>().map_err(read_err)?,
    };
    if params.m < 2 || params.ef_construction == 0 || params.ef_search == 0 {
        return Err(VectorDbError::corrupt("invalid hnsw parameters"));
    }
    let entry = r.read_u64::<LittleEndian>().map_err(read_err)?;
    let max_level = r.read_u32::<LittleEndian>().map_err(read_err)? as usize;
    let node_count = r.read_u64::<LittleEndian>().map_err(read_err)?;
    if node_count != count {
        return Err(VectorDbError::corrupt(format!(
            "graph has {node_count} nodes but header declares {count} records"
        )));
    }
    if max_level > MAX_LEVEL {
        return Err(VectorDbError::corrupt(format!("max level {max_level} out of range")));
    }

    let mut links = Vec::with_capacity(persist::prealloc(node_count));
    for slot in 0..node_count {
        let level = r.read_u32::<LittleEndian>().map_err(read_err)? as usize;
        if level > max_level {
            return Err(VectorDbError::corrupt(format!(
                "node {slot} has level {level} above max level {max_level}"
            )));
        }
        let mut node = Vec::with_capacity(level + 1);
        for _ in 0..=level {
            let n = r.read_u32::<LittleEndian>().map_err(read_err)? as u64;
            let mut layer = Vec::with_capacity(persist::prealloc(n));
            for _ in 0..n {
                let neighbor = r.read_u32::<LittleEndian>().map_err(read_err)?;
                if neighbor as u64 >= node_count {
                    return Err(VectorDbError::corrupt(format!(
                        "node {slot} links to missing node {neighbor}"
                    )));
                }
                layer.push(neighbor);
            }
            node.push(layer);
        }
        links.push(node);
    }

    let entry_point = match entry {
        NO_ENTRY if node_count == 0 => None,
        NO_ENTRY => return Err(VectorDbError::corrupt("non-empty graph without entry point")),
        e if e >= node_count => {
            return Err(VectorDbError::corrupt(format!("entry point {e} out of range")));
        }
        e => Some(e as usize),
    };
    if let Some(e) = entry_point {
        if links[e].len() - 1 != max_level {
            return Err(VectorDbError::corrupt("entry point is not on the top level"));
        }
    }
    // every linked node must exist on the layer it is linked from
    for (slot, node) in links.iter().enumerate() {
        for (lev, layer) in node.iter().enumerate() {
            if let Some(&bad) = layer.iter().find(|&&n| links[n as usize].len() <= lev) {
                return Err(VectorDbError::corrupt(format!(
                    "node {slot} links to node {bad} on layer {lev} it does not reach"
                )));
            }
        }
    }

    Ok((params, Graph { links, entry_point, max_level }))
}
