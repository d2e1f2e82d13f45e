//! Distance metrics for vector similarity search.
//!
//! Every metric is exposed as a similarity score where higher means closer,
//! so both index tiers can rank with a single ordering.

use std::fmt;

/// Supported distance metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity (inner product over normalized vectors).
    #[default]
    Cosine,
    /// Euclidean distance, scored as its negation.
    L2,
    /// Inner product (dot product).
    Ip,
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::L2 => write!(f, "l2"),
            Self::Ip => write!(f, "ip"),
        }
    }
}

impl DistanceMetric {
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "cosine" | "cos" => Self::Cosine,
            "l2" | "euclidean" => Self::L2,
            "ip" | "dot" | "inner_product" => Self::Ip,
            _ => Self::Cosine,
        }
    }

    /// Identifier stored in the persisted index header.
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Cosine => 0,
            Self::L2 => 1,
            Self::Ip => 2,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Cosine),
            1 => Some(Self::L2),
            2 => Some(Self::Ip),
            _ => None,
        }
    }

    /// Turn a raw embedding into the form used for scoring.
    pub fn prepare(self, v: &[f32]) -> Vec<f32> {
        let mut out = v.to_vec();
        if self == Self::Cosine {
            normalize_vector(&mut out);
        }
        out
    }

    /// Score two prepared vectors. Higher = more similar.
    #[inline]
    pub fn score_prepared(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            // cosine inputs are already unit length (or zero)
            Self::Cosine | Self::Ip => inner_product(a, b),
            Self::L2 => -l2_squared(a, b).sqrt(),
        }
    }
}

/// Compute inner product (dot product) of two vectors.
#[inline]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute L2 squared distance.
#[inline]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| {
        let d = x - y;
        d * d
    }).sum()
}

/// Compute cosine similarity (returns value in [-1, 1]).
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = inner_product(a, b);
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Normalize a vector in-place (L2 normalization).
pub fn normalize_vector(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Compute a similarity score on raw (unprepared) vectors.
/// For L2: negative Euclidean distance, so identical vectors score 0.
pub fn compute_score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::L2 => -l2_squared(a, b).sqrt(),
        DistanceMetric::Ip => inner_product(a, b),
        DistanceMetric::Cosine => cosine_similarity(a, b),
    }
}
