//! JSON cache of embedded scenes, so an index can be rebuilt without
//! running the embedder again.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ss_core::EmbeddedScene;
use tracing::info;

use crate::error::Result;

/// Write embedded scenes as a JSON array.
pub fn export_embeddings(path: &Path, rows: &[EmbeddedScene]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut w = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer(&mut w, rows)?;
    w.flush()?;
    info!(path = %path.display(), rows = rows.len(), "exported scene embeddings");
    Ok(())
}

pub fn import_embeddings(path: &Path) -> Result<Vec<EmbeddedScene>> {
    let r = BufReader::new(fs::File::open(path)?);
    let rows: Vec<EmbeddedScene> = serde_json::from_reader(r)?;
    info!(path = %path.display(), rows = rows.len(), "imported scene embeddings");
    Ok(rows)
}
