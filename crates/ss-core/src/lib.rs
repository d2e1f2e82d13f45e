//! Shared types, collaborator traits and configuration for SceneSeeker.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{IndexSettings, PipelineSettings, SeekerConfig};
pub use error::{CoreError, Result};
pub use traits::{Embedder, ResultPresenter, SceneExtractor};
pub use types::{EmbedInput, EmbeddedScene, SceneInfo, SceneMatch};
