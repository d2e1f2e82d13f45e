use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One detected scene: its thumbnail on disk plus timing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneInfo {
    pub scene_path: PathBuf,
    /// Seconds from the start of the video.
    pub start_time: f64,
    pub end_time: f64,
    pub start_frame: u64,
    pub end_frame: u64,
}

impl SceneInfo {
    pub fn new(
        scene_path: impl Into<PathBuf>,
        start_time: f64,
        end_time: f64,
        start_frame: u64,
        end_frame: u64,
    ) -> Self {
        Self {
            scene_path: scene_path.into(),
            start_time,
            end_time,
            start_frame,
            end_frame,
        }
    }

    /// File name of the thumbnail, e.g. `scene_0003.jpg`.
    pub fn scene_name(&self) -> String {
        self.scene_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }

    pub fn frame_count(&self) -> u64 {
        self.end_frame.saturating_sub(self.start_frame)
    }
}

/// Input to an embedder: free text or an image on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum EmbedInput {
    Text(String),
    Image(PathBuf),
}

impl EmbedInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn image(path: impl AsRef<Path>) -> Self {
        Self::Image(path.as_ref().to_path_buf())
    }

    pub fn modality(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "vision",
        }
    }
}

/// A scene together with its thumbnail embedding. One row of the
/// embedding cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedScene {
    #[serde(flatten)]
    pub scene: SceneInfo,
    pub embedding: Vec<f32>,
}

/// A search result handed to presenters.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMatch {
    pub scene: SceneInfo,
    pub score: f32,
}
