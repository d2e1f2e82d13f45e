//! Scene search orchestration: extract, embed, index, query.

use std::path::{Path, PathBuf};

use ss_core::{
    EmbedInput, EmbeddedScene, Embedder, IndexSettings, ResultPresenter, SceneExtractor, SceneInfo,
    SceneMatch, SeekerConfig,
};
use ss_vectordb::{
    load_index, DistanceMetric, FlatIndex, HnswIndex, HnswParams, IndexKind, VectorDbError,
    VectorIndex,
};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

/// File name of the persisted index inside `pipeline.store_path`.
pub const INDEX_FILE: &str = "scenes.ssvi";

/// Create an empty index as described by the settings.
pub fn build_index(settings: &IndexSettings, dimension: usize) -> Box<dyn VectorIndex<SceneInfo>> {
    let metric = DistanceMetric::from_str_loose(&settings.metric);
    match IndexKind::from_str_loose(&settings.kind) {
        IndexKind::Hnsw => {
            let params = HnswParams {
                m: settings.m,
                ef_construction: settings.ef_construction,
                ef_search: settings.ef_search,
                seed: settings.seed,
            };
            Box::new(HnswIndex::with_params(Some(dimension), metric, params))
        }
        IndexKind::Flat => Box::new(FlatIndex::with_dimension(dimension, metric)),
    }
}

/// Video scene search over an injected embedder.
///
/// The embedder is owned by the searcher and released with it.
pub struct SceneSearch<E> {
    embedder: E,
    index: Box<dyn VectorIndex<SceneInfo>>,
    config: SeekerConfig,
}

impl<E: Embedder> SceneSearch<E> {
    /// Searcher with a fresh, empty index sized to the embedder.
    pub fn new(embedder: E, config: SeekerConfig) -> Result<Self> {
        config.validate()?;
        let dimension = embedder.dimension();
        if dimension == 0 {
            return Err(PipelineError::Config("embedder reports dimension 0".into()));
        }
        if dimension != config.index.dimension {
            warn!(
                configured = config.index.dimension,
                embedder = dimension,
                "configured dimension differs from embedder, using embedder"
            );
        }
        let index = build_index(&config.index, dimension);
        Ok(Self { embedder, index, config })
    }

    /// Searcher over an existing index, e.g. one restored from disk.
    pub fn with_index(
        embedder: E,
        index: Box<dyn VectorIndex<SceneInfo>>,
        config: SeekerConfig,
    ) -> Result<Self> {
        config.validate()?;
        if let Some(dim) = index.dimension() {
            if dim != embedder.dimension() {
                return Err(VectorDbError::DimensionMismatch {
                    expected: dim,
                    got: embedder.dimension(),
                }
                .into());
            }
        }
        Ok(Self { embedder, index, config })
    }

    /// Restore a persisted index and wrap it.
    pub fn restore(embedder: E, path: &Path, config: SeekerConfig) -> Result<Self> {
        let index = load_index::<SceneInfo>(path)?;
        info!(path = %path.display(), scenes = index.len(), kind = %index.kind(), "restored scene index");
        Self::with_index(embedder, index, config)
    }

    pub fn config(&self) -> &SeekerConfig {
        &self.config
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn index(&self) -> &dyn VectorIndex<SceneInfo> {
        self.index.as_ref()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Default location of the persisted index.
    pub fn index_path(&self) -> PathBuf {
        self.config.pipeline.store_path.join(INDEX_FILE)
    }

    /// Embed one input, checking the vector length.
    pub fn embed(&self, input: &EmbedInput) -> Result<Vec<f32>> {
        let embedding = self.embedder.embed(input)?;
        let expected = self.embedder.dimension();
        if embedding.len() != expected {
            return Err(VectorDbError::DimensionMismatch {
                expected,
                got: embedding.len(),
            }
            .into());
        }
        Ok(embedding)
    }

    /// Embed each scene thumbnail.
    pub fn embed_scenes(&self, scenes: &[SceneInfo]) -> Result<Vec<EmbeddedScene>> {
        scenes
            .iter()
            .map(|scene| -> Result<EmbeddedScene> {
                let embedding = self.embed(&EmbedInput::image(&scene.scene_path))?;
                Ok(EmbeddedScene { scene: scene.clone(), embedding })
            })
            .collect()
    }

    /// Insert embedded scenes in batches of `pipeline.batch_size`.
    ///
    /// Running this twice over the same rows indexes them twice.
    pub fn index_scenes(&self, rows: Vec<EmbeddedScene>) -> Result<usize> {
        let batch_size = self.config.pipeline.batch_size;
        let mut rows = rows.into_iter().peekable();
        let mut total = 0;
        while rows.peek().is_some() {
            let batch: Vec<(Vec<f32>, SceneInfo)> = rows
                .by_ref()
                .take(batch_size)
                .map(|row| (row.embedding, row.scene))
                .collect();
            let ids = self.index.add_batch(batch)?;
            total += ids.len();
            debug!(batch = ids.len(), indexed = total, "indexed scene batch");
        }
        info!("Indexed {total} scenes in total.");
        Ok(total)
    }

    /// Extract, embed and index every scene of a video.
    pub fn ingest(&self, extractor: &dyn SceneExtractor) -> Result<usize> {
        let scenes = extractor.extract()?;
        info!(scenes = scenes.len(), "extracted scenes");
        let rows = self.embed_scenes(&scenes)?;
        self.index_scenes(rows)
    }

    /// Scenes most similar to a text or image query, best first.
    pub fn search(&self, query: &EmbedInput, limit: usize) -> Result<Vec<SceneMatch>> {
        let embedding = self.embed(query)?;
        let hits = self.index.search(&embedding, limit)?;
        debug!(modality = query.modality(), limit, hits = hits.len(), "scene search");
        Ok(hits
            .into_iter()
            .map(|hit| SceneMatch {
                scene: hit.record.payload,
                score: hit.score,
            })
            .collect())
    }

    /// [`SceneSearch::search`] with `pipeline.default_limit`.
    pub fn search_default(&self, query: &EmbedInput) -> Result<Vec<SceneMatch>> {
        self.search(query, self.config.pipeline.default_limit)
    }

    pub fn present(&self, matches: &[SceneMatch], presenter: &mut dyn ResultPresenter) -> Result<()> {
        presenter.present(matches)?;
        Ok(())
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        self.index.save(path)?;
        Ok(())
    }
}
