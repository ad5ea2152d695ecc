//! Ingestion pipeline orchestration.
//!
//! Coordinates the full build flow: scan the uploads directory → extract
//! text → chunk into passages → embed → persist the index. The index is
//! rebuilt wholesale on every run; a document that fails extraction is
//! skipped with a warning and never aborts the rest of the batch.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use walkdir::WalkDir;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::extract::extract_file;
use crate::store::IndexStore;

#[derive(Debug)]
pub struct IngestReport {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub passages_indexed: usize,
    pub dims: usize,
}

pub fn run_ingest(config: &Config, embedder: Arc<dyn Embedder>) -> Result<IngestReport> {
    let uploads = &config.storage.uploads_dir;
    if !uploads.exists() {
        bail!("Uploads directory does not exist: {}", uploads.display());
    }

    let files = scan_uploads(config)?;

    let mut passages: Vec<String> = Vec::new();
    let mut files_processed = 0usize;
    let mut files_skipped = 0usize;

    for path in &files {
        match extract_file(path) {
            Ok(text) => {
                let chunks = chunk_text(&text, config.chunking.max_passage_chars);
                println!("  {} → {} passages", path.display(), chunks.len());
                passages.extend(chunks);
                files_processed += 1;
            }
            Err(e) => {
                eprintln!("Warning: skipping {}: {}", path.display(), e);
                files_skipped += 1;
            }
        }
    }

    if passages.is_empty() {
        bail!(
            "no content: no usable passages found under {}",
            uploads.display()
        );
    }

    let store = IndexStore::new(&config.storage.index_dir, embedder);
    let index = store.build(passages)?;

    let report = IngestReport {
        files_processed,
        files_skipped,
        passages_indexed: index.len(),
        dims: index.dims(),
    };

    println!("ingest {}", uploads.display());
    println!("  files processed: {}", report.files_processed);
    println!("  files skipped: {}", report.files_skipped);
    println!("  passages indexed: {}", report.passages_indexed);
    println!("  vector dims: {}", report.dims);
    println!("ok");

    Ok(report)
}

/// Walk the uploads directory, applying include/exclude globs against paths
/// relative to the root. Sorted for deterministic passage ordering.
fn scan_uploads(config: &Config) -> Result<Vec<PathBuf>> {
    let root = &config.storage.uploads_dir;
    let include_set = build_globset(&config.storage.include_globs)?;
    let exclude_set = build_globset(&config.storage.exclude_globs)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
