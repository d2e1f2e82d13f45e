//! Index behavior: distance metrics, flat and HNSW search semantics.

use ss_vectordb::{
    distance::{self, DistanceMetric},
    error::VectorDbError,
    index::{FlatIndex, HnswIndex, HnswParams, IndexKind, Record, VectorIndex},
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;

fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
        .collect()
}

fn records(vectors: &[Vec<f32>]) -> Vec<Record<String>> {
    vectors
        .iter()
        .enumerate()
        .map(|(i, v)| Record::new(i as u64, v.clone(), format!("scene_{i:04}.jpg")))
        .collect()
}

fn both_kinds(dim: usize, metric: DistanceMetric) -> Vec<Box<dyn VectorIndex<String>>> {
    vec![
        Box::new(FlatIndex::with_dimension(dim, metric)),
        Box::new(HnswIndex::with_dimension(dim, metric)),
    ]
}

// ============================================================
// Distance / Metric Tests
// ============================================================

#[test]
fn test_inner_product() {
    let a = vec![1.0, 2.0, 3.0];
    let b = vec![4.0, 5.0, 6.0];
    assert!((distance::inner_product(&a, &b) - 32.0).abs() < 1e-6);
}

#[test]
fn test_l2_squared() {
    let a = vec![1.0, 0.0, 0.0];
    let b = vec![0.0, 1.0, 0.0];
    assert!((distance::l2_squared(&a, &b) - 2.0).abs() < 1e-6);
}

#[test]
fn test_cosine_similarity_identical() {
    let a = vec![1.0, 2.0, 3.0];
    assert!((distance::cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
}

#[test]
fn test_cosine_similarity_zero_vector() {
    assert_eq!(distance::cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
}

#[test]
fn test_normalize_vector() {
    let mut v = vec![3.0, 4.0];
    distance::normalize_vector(&mut v);
    assert!((v[0] - 0.6).abs() < 1e-6);
    assert!((v[1] - 0.8).abs() < 1e-6);
}

#[test]
fn test_l2_score_is_negative_distance() {
    let s = distance::compute_score(DistanceMetric::L2, &[0.0, 0.0], &[3.0, 4.0]);
    assert!((s + 5.0).abs() < 1e-6);
    let p = DistanceMetric::L2.prepare(&[3.0, 4.0]);
    assert_eq!(p, vec![3.0, 4.0]);
}

#[test]
fn test_prepared_cosine_matches_raw() {
    let a = [0.3, -1.2, 2.0];
    let b = [1.0, 0.5, -0.25];
    let m = DistanceMetric::Cosine;
    let prepared = m.score_prepared(&m.prepare(&a), &m.prepare(&b));
    assert!((prepared - distance::cosine_similarity(&a, &b)).abs() < 1e-6);
}

#[test]
fn test_distance_metric_from_str() {
    assert_eq!(DistanceMetric::from_str_loose("cosine"), DistanceMetric::Cosine);
    assert_eq!(DistanceMetric::from_str_loose("Euclidean"), DistanceMetric::L2);
    assert_eq!(DistanceMetric::from_str_loose("dot"), DistanceMetric::Ip);
    assert_eq!(DistanceMetric::from_str_loose("unknown"), DistanceMetric::Cosine);
}

#[test]
fn test_metric_byte_ids() {
    for m in [DistanceMetric::Cosine, DistanceMetric::L2, DistanceMetric::Ip] {
        assert_eq!(DistanceMetric::from_byte(m.to_byte()), Some(m));
    }
    assert_eq!(DistanceMetric::from_byte(9), None);
}

// ============================================================
// Flat Index Tests
// ============================================================

#[test]
fn test_flat_concrete_scenario() {
    let idx = FlatIndex::<String>::new(DistanceMetric::Cosine);
    idx.insert_batch(vec![
        Record::new(1, vec![1.0, 0.0, 0.0], "first".to_string()),
        Record::new(2, vec![0.0, 1.0, 0.0], "second".to_string()),
        Record::new(3, vec![0.9, 0.1, 0.0], "third".to_string()),
    ])
    .unwrap();
    let hits = idx.search(&[1.0, 0.0, 0.0], 2).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].record.payload, "first");
    assert!((hits[0].score - 1.0).abs() < 1e-6);
    assert_eq!(hits[1].record.payload, "third");
    assert!((hits[1].score - 0.9939).abs() < 1e-3);
}

#[test]
fn test_flat_dimension_inferred_from_first_insert() {
    let idx = FlatIndex::<String>::new(DistanceMetric::Cosine);
    assert_eq!(idx.dimension(), None);
    idx.add_batch(vec![(vec![1.0, 2.0], "a".into())]).unwrap();
    assert_eq!(idx.dimension(), Some(2));
    let err = idx.add_batch(vec![(vec![1.0, 2.0, 3.0], "b".into())]).unwrap_err();
    assert!(matches!(err, VectorDbError::DimensionMismatch { expected: 2, got: 3 }));
}

#[test]
fn test_flat_keeps_original_embedding() {
    let idx = FlatIndex::<String>::new(DistanceMetric::Cosine);
    idx.insert_batch(vec![Record::new(7, vec![3.0, 4.0], "p".into())]).unwrap();
    let hits = idx.search(&[3.0, 4.0], 1).unwrap();
    assert_eq!(hits[0].record.embedding, vec![3.0, 4.0]);
    assert_eq!(idx.get(7).unwrap().payload, "p");
    assert!(idx.get(8).is_none());
}

#[test]
fn test_flat_l2_ordering() {
    let idx = FlatIndex::<u32>::with_dimension(2, DistanceMetric::L2);
    idx.add_batch(vec![
        (vec![10.0, 10.0], 0),
        (vec![1.0, 0.0], 1),
        (vec![0.0, 0.0], 2),
    ])
    .unwrap();
    let hits = idx.search(&[0.0, 0.0], 3).unwrap();
    let payloads: Vec<u32> = hits.iter().map(|h| h.record.payload).collect();
    assert_eq!(payloads, vec![2, 1, 0]);
    assert_eq!(hits[0].score, 0.0);
    assert!((hits[1].score + 1.0).abs() < 1e-6);
}

#[test]
fn test_flat_ip_score() {
    let idx = FlatIndex::<u32>::with_dimension(2, DistanceMetric::Ip);
    idx.add_batch(vec![(vec![1.0, 0.0], 1), (vec![0.5, 0.5], 2)]).unwrap();
    let hits = idx.search(&[2.0, 0.0], 2).unwrap();
    assert_eq!(hits[0].record.payload, 1);
    assert!((hits[0].score - 2.0).abs() < 1e-6);
}

#[test]
fn test_flat_top_k_zero() {
    let idx = FlatIndex::<u32>::with_dimension(2, DistanceMetric::Ip);
    idx.add_batch(vec![(vec![1.0, 0.0], 1)]).unwrap();
    assert!(idx.search(&[1.0, 0.0], 0).unwrap().is_empty());
}

#[test]
fn test_add_batch_assigns_monotonic_ids() {
    let idx = FlatIndex::<u32>::with_dimension(1, DistanceMetric::Ip);
    assert_eq!(idx.add_batch(vec![(vec![1.0], 0), (vec![2.0], 1)]).unwrap(), vec![0, 1]);
    idx.insert_batch(vec![Record::new(10, vec![3.0], 2)]).unwrap();
    assert_eq!(idx.add_batch(vec![(vec![4.0], 3)]).unwrap(), vec![11]);
}

#[test]
fn test_empty_batch_is_noop() {
    for idx in both_kinds(3, DistanceMetric::Cosine) {
        idx.insert_batch(Vec::new()).unwrap();
        assert!(idx.add_batch(Vec::new()).unwrap().is_empty());
        assert!(idx.is_empty());
    }
}

// ============================================================
// Shared Contract Tests (both tiers)
// ============================================================

#[test]
fn test_empty_index_returns_nothing() {
    for idx in both_kinds(4, DistanceMetric::Cosine) {
        assert!(idx.search(&[1.0, 0.0, 0.0, 0.0], 10).unwrap().is_empty());
        assert!(idx.search(&[1.0, 0.0, 0.0, 0.0], 1).unwrap().is_empty());
        // no dimension check before anything is stored
        assert!(idx.search(&[1.0], 3).unwrap().is_empty());
    }
    let inferred = FlatIndex::<String>::new(DistanceMetric::L2);
    assert!(inferred.search(&[], 5).unwrap().is_empty());
}

#[test]
fn test_query_dimension_mismatch() {
    for idx in both_kinds(3, DistanceMetric::Cosine) {
        idx.insert_batch(records(&[vec![1.0, 0.0, 0.0]])).unwrap();
        let err = idx.search(&[1.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, VectorDbError::DimensionMismatch { expected: 3, got: 2 }));
    }
}

#[test]
fn test_insert_dimension_mismatch_is_atomic() {
    let dim = 8;
    for idx in both_kinds(dim, DistanceMetric::Cosine) {
        let good = random_vectors(5, dim, 1);
        idx.insert_batch(records(&good)).unwrap();

        let mut batch: Vec<Record<String>> = random_vectors(4, dim, 2)
            .into_iter()
            .enumerate()
            .map(|(i, v)| Record::new(100 + i as u64, v, String::new()))
            .collect();
        batch[2].embedding.push(0.5); // D + 1
        let err = idx.insert_batch(batch).unwrap_err();
        assert!(matches!(err, VectorDbError::DimensionMismatch { expected: 8, got: 9 }));

        assert_eq!(idx.len(), 5);
        assert!(idx.get(100).is_none());
        let hits = idx.search(&good[0], 10).unwrap();
        assert_eq!(hits.len(), 5);
    }
}

#[test]
fn test_duplicate_id_rejected() {
    for idx in both_kinds(2, DistanceMetric::Ip) {
        idx.insert_batch(vec![Record::new(1, vec![1.0, 0.0], "a".to_string())]).unwrap();

        let err = idx
            .insert_batch(vec![
                Record::new(2, vec![0.0, 1.0], "b".to_string()),
                Record::new(1, vec![1.0, 1.0], "dup".to_string()),
            ])
            .unwrap_err();
        assert!(matches!(err, VectorDbError::DuplicateId(1)));
        assert_eq!(idx.len(), 1);

        // collision inside one batch
        let err = idx
            .insert_batch(vec![
                Record::new(5, vec![0.0, 1.0], "c".to_string()),
                Record::new(5, vec![1.0, 1.0], "d".to_string()),
            ])
            .unwrap_err();
        assert!(matches!(err, VectorDbError::DuplicateId(5)));
        assert_eq!(idx.len(), 1);
    }
}

#[test]
fn test_max_id_rejected() {
    for idx in both_kinds(2, DistanceMetric::Cosine) {
        let err = idx
            .insert_batch(vec![
                Record::new(3, vec![0.0, 1.0], "a".to_string()),
                Record::new(u64::MAX, vec![1.0, 0.0], "b".to_string()),
            ])
            .unwrap_err();
        assert!(matches!(err, VectorDbError::IdOutOfRange(u64::MAX)));
        assert!(idx.is_empty());

        // fresh ids still start at zero
        assert_eq!(idx.add_batch(vec![(vec![1.0, 0.0], "c".to_string())]).unwrap(), vec![0]);
    }
}

#[test]
fn test_add_batch_id_space_exhausted() {
    for idx in both_kinds(2, DistanceMetric::Cosine) {
        let last = u64::MAX - 1;
        idx.insert_batch(vec![Record::new(last, vec![1.0, 0.0], "a".to_string())]).unwrap();

        let err = idx.add_batch(vec![(vec![0.0, 1.0], "b".to_string())]).unwrap_err();
        assert!(matches!(err, VectorDbError::IdOutOfRange(_)));
        assert_eq!(idx.len(), 1);
        assert!(idx.get(last).is_some());
        assert_eq!(idx.search(&[1.0, 0.0], 5).unwrap().len(), 1);
    }
}

#[test]
fn test_reinserting_content_duplicates() {
    for idx in both_kinds(2, DistanceMetric::Cosine) {
        let items = vec![(vec![1.0, 0.0], "a".to_string()), (vec![0.0, 1.0], "b".to_string())];
        idx.add_batch(items.clone()).unwrap();
        idx.add_batch(items).unwrap();
        assert_eq!(idx.len(), 4);
        let hits = idx.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].id(), 0);
        assert_eq!(hits[1].id(), 2);
    }
}

#[test]
fn test_self_search_is_top_hit() {
    let dim = 32;
    let vectors = random_vectors(300, dim, 7);
    for idx in both_kinds(dim, DistanceMetric::Cosine) {
        idx.insert_batch(records(&vectors)).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            let hits = idx.search(v, 1).unwrap();
            assert_eq!(hits[0].id(), i as u64, "{:?} self search", idx.kind());
            assert!((hits[0].score - 1.0).abs() < 1e-5);
        }
    }
}

#[test]
fn test_k_at_least_n_returns_all_once() {
    let dim = 16;
    let vectors = random_vectors(60, dim, 11);
    for idx in both_kinds(dim, DistanceMetric::Cosine) {
        idx.insert_batch(records(&vectors)).unwrap();
        let hits = idx.search(&vectors[3], 100).unwrap();
        assert_eq!(hits.len(), 60, "{:?}", idx.kind());
        let ids: HashSet<u64> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(ids.len(), 60);
        assert!(ids.iter().all(|&id| id < 60));
    }
}

#[test]
fn test_results_ordered_with_id_tiebreak() {
    // ids inserted out of order, many exact ties
    let batch = vec![
        Record::new(9, vec![1.0, 0.0], 0u8),
        Record::new(4, vec![0.0, 1.0], 1),
        Record::new(7, vec![1.0, 0.0], 2),
        Record::new(2, vec![0.0, 1.0], 3),
        Record::new(5, vec![2.0, 0.0], 4),
        Record::new(1, vec![1.0, 1.0], 5),
    ];
    let flat = FlatIndex::new(DistanceMetric::Cosine);
    let hnsw = HnswIndex::new(DistanceMetric::Cosine);
    flat.insert_batch(batch.clone()).unwrap();
    hnsw.insert_batch(batch).unwrap();
    for hits in [flat.search(&[1.0, 0.0], 6).unwrap(), hnsw.search(&[1.0, 0.0], 6).unwrap()] {
        let ids: Vec<u64> = hits.iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec![5, 7, 9, 1, 2, 4]);
        for w in hits.windows(2) {
            assert!(w[0].score >= w[1].score);
            if w[0].score == w[1].score {
                assert!(w[0].id() < w[1].id());
            }
        }
    }
}

#[test]
fn test_random_results_non_increasing() {
    let dim = 24;
    let vectors = random_vectors(500, dim, 21);
    let queries = random_vectors(20, dim, 22);
    for idx in both_kinds(dim, DistanceMetric::L2) {
        idx.insert_batch(records(&vectors)).unwrap();
        for q in &queries {
            let hits = idx.search(q, 25).unwrap();
            assert_eq!(hits.len(), 25);
            for w in hits.windows(2) {
                assert!(w[0].score > w[1].score || (w[0].score == w[1].score && w[0].id() < w[1].id()));
            }
        }
    }
}

#[test]
fn test_concurrent_searches() {
    let dim = 16;
    let vectors = random_vectors(200, dim, 5);
    let idx = Arc::new(FlatIndex::<String>::with_dimension(dim, DistanceMetric::Cosine));
    idx.insert_batch(records(&vectors)).unwrap();
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let idx = Arc::clone(&idx);
            let vectors = vectors.clone();
            std::thread::spawn(move || {
                for i in (t..200).step_by(4) {
                    let hits = idx.search(&vectors[i], 1).unwrap();
                    assert_eq!(hits[0].id(), i as u64);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

// ============================================================
// HNSW Tests
// ============================================================

fn recall_at_k(flat: &FlatIndex<String>, hnsw: &HnswIndex<String>, queries: &[Vec<f32>], k: usize, ef: usize) -> f64 {
    let mut found = 0usize;
    for q in queries {
        let exact: HashSet<u64> = flat.search(q, k).unwrap().iter().map(|h| h.id()).collect();
        let approx = hnsw.search_with_ef(q, k, ef).unwrap();
        found += approx.iter().filter(|h| exact.contains(&h.id())).count();
    }
    found as f64 / (queries.len() * k) as f64
}

#[test]
fn test_hnsw_recall_against_flat() {
    let dim = 24;
    let vectors = random_vectors(1500, dim, 42);
    let queries = random_vectors(50, dim, 43);
    let flat = FlatIndex::with_dimension(dim, DistanceMetric::Cosine);
    let params = HnswParams { ef_construction: 100, ..HnswParams::default() };
    let hnsw = HnswIndex::with_params(Some(dim), DistanceMetric::Cosine, params);
    for chunk in records(&vectors).chunks(500) {
        flat.insert_batch(chunk.to_vec()).unwrap();
        hnsw.insert_batch(chunk.to_vec()).unwrap();
    }
    let recall = recall_at_k(&flat, &hnsw, &queries, 10, 128);
    assert!(recall >= 0.9, "recall@10 = {recall}");
}

#[test]
fn test_hnsw_default_params_recall() {
    let dim = 128;
    let vectors = random_vectors(1500, dim, 7);
    let queries = random_vectors(40, dim, 8);
    let flat = FlatIndex::with_dimension(dim, DistanceMetric::Cosine);
    let hnsw = HnswIndex::with_dimension(dim, DistanceMetric::Cosine);
    assert_eq!(hnsw.params(), HnswParams::default());
    flat.insert_batch(records(&vectors)).unwrap();
    hnsw.insert_batch(records(&vectors)).unwrap();

    let mut found = 0usize;
    for q in &queries {
        let exact: HashSet<u64> = flat.search(q, 10).unwrap().iter().map(|h| h.id()).collect();
        let approx = hnsw.search(q, 10).unwrap();
        assert_eq!(approx.len(), 10);
        found += approx.iter().filter(|h| exact.contains(&h.id())).count();
    }
    let recall = found as f64 / (queries.len() * 10) as f64;
    assert!(recall >= 0.9, "recall@10 = {recall}");
}

#[test]
fn test_hnsw_wider_search_not_worse() {
    let dim = 16;
    let vectors = random_vectors(800, dim, 3);
    let queries = random_vectors(30, dim, 4);
    let flat = FlatIndex::with_dimension(dim, DistanceMetric::L2);
    let params = HnswParams { m: 8, ef_construction: 40, ..HnswParams::default() };
    let hnsw = HnswIndex::with_params(Some(dim), DistanceMetric::L2, params);
    flat.insert_batch(records(&vectors)).unwrap();
    hnsw.insert_batch(records(&vectors)).unwrap();
    // ef >= n degenerates into an exhaustive layer-0 search
    let exhaustive = recall_at_k(&flat, &hnsw, &queries, 10, 800);
    assert!(exhaustive >= 0.98, "recall = {exhaustive}");
}

#[test]
fn test_hnsw_same_seed_same_results() {
    let dim = 12;
    let vectors = random_vectors(300, dim, 9);
    let a = HnswIndex::<String>::with_dimension(dim, DistanceMetric::Cosine);
    let b = HnswIndex::<String>::with_dimension(dim, DistanceMetric::Cosine);
    a.insert_batch(records(&vectors)).unwrap();
    for chunk in records(&vectors).chunks(64) {
        b.insert_batch(chunk.to_vec()).unwrap();
    }
    for q in random_vectors(10, dim, 10) {
        let ra: Vec<u64> = a.search(&q, 5).unwrap().iter().map(|h| h.id()).collect();
        let rb: Vec<u64> = b.search(&q, 5).unwrap().iter().map(|h| h.id()).collect();
        assert_eq!(ra, rb);
    }
}

#[test]
fn test_hnsw_params_sanitized() {
    let idx = HnswIndex::<String>::with_params(
        None,
        DistanceMetric::Cosine,
        HnswParams { m: 0, ef_construction: 0, ef_search: 0, seed: 1 },
    );
    let p = idx.params();
    assert_eq!((p.m, p.ef_construction, p.ef_search), (2, 1, 1));
    idx.insert_batch(records(&random_vectors(20, 4, 1))).unwrap();
    assert!(!idx.search(&[0.1, 0.2, 0.3, 0.4], 3).unwrap().is_empty());
}

#[test]
fn test_index_kind_labels() {
    assert_eq!(FlatIndex::<String>::new(DistanceMetric::Cosine).kind(), IndexKind::Flat);
    assert_eq!(HnswIndex::<String>::new(DistanceMetric::Cosine).kind(), IndexKind::Hnsw);
    assert_eq!(IndexKind::from_str_loose("HNSW"), IndexKind::Hnsw);
    assert_eq!(IndexKind::from_str_loose("flat"), IndexKind::Flat);
    assert_eq!(IndexKind::Hnsw.to_string(), "hnsw");
}
