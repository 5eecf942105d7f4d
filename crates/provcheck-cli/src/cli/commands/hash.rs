//! Hash command: compute SHA-256 of a local file.

use anyhow::{Context, Result};
use provcheck_core::config::ProvcheckConfig;
use provcheck_core::{ChunkedHasher, FileSource};
use std::path::Path;

/// Compute and print SHA-256 of the given file as `<digest>  <path>`.
pub async fn run_hash(cfg: &ProvcheckConfig, path: &Path, chunk_size: Option<usize>) -> Result<()> {
    let digest = hash_file(path, chunk_size.unwrap_or(cfg.chunk_size_bytes)).await?;
    println!("{}  {}", digest, path.display());
    Ok(())
}

async fn hash_file(path: &Path, chunk_size: usize) -> Result<String> {
    let source = FileSource::open(path)
        .await
        .with_context(|| format!("open {}", path.display()))?;
    let digest = ChunkedHasher::new(chunk_size)
        .read_all(&source)
        .await
        .with_context(|| format!("hash {}", path.display()))?;
    Ok(digest)
}
