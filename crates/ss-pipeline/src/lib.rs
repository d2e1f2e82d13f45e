//! End-to-end scene search: embed scene thumbnails, index them, answer
//! text and image queries.

pub mod cache;
pub mod error;
pub mod search;

pub use cache::{export_embeddings, import_embeddings};
pub use error::{PipelineError, Result};
pub use search::{build_index, SceneSearch, INDEX_FILE};
