//! Collaborator seams: everything the search core needs from the outside.

use crate::error::Result;
use crate::types::{EmbedInput, SceneInfo, SceneMatch};

/// Maps text or an image to a fixed-length vector.
///
/// Implementations own their model and device resources; callers hand an
/// embedder to the pipeline and drop it when done.
pub trait Embedder: Send + Sync {
    /// Length of every vector returned by [`Embedder::embed`].
    fn dimension(&self) -> usize;

    fn embed(&self, input: &EmbedInput) -> Result<Vec<f32>>;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn embed(&self, input: &EmbedInput) -> Result<Vec<f32>> {
        (**self).embed(input)
    }
}

impl<E: Embedder + ?Sized> Embedder for std::sync::Arc<E> {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn embed(&self, input: &EmbedInput) -> Result<Vec<f32>> {
        (**self).embed(input)
    }
}

/// Splits a video into scenes and writes one thumbnail per scene.
pub trait SceneExtractor {
    fn extract(&self) -> Result<Vec<SceneInfo>>;
}

/// Renders ranked matches.
pub trait ResultPresenter {
    fn present(&mut self, matches: &[SceneMatch]) -> Result<()>;
}
