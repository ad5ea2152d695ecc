//! Passage index construction, persistence, and nearest-neighbor search.
//!
//! The index is a flat brute-force structure: one fixed-dimension vector per
//! passage, scanned with squared Euclidean distance. It is built wholesale
//! from an ordered passage sequence and persisted as two artifacts in the
//! index directory:
//!
//! - `vectors.bin` — header (dims, count, SHA-256 of the passage artifact)
//!   followed by the vectors as little-endian `f32` bytes.
//! - `passages.json` — the ordered passage texts.
//!
//! Position `i` in the vector payload and position `i` in the passage
//! sequence always refer to the same passage; `load` verifies the pairing
//! before returning an index.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::embedding::Embedder;

const VECTORS_FILE: &str = "vectors.bin";
const PASSAGES_FILE: &str = "passages.json";

/// `magic || dims || count || passages-sha256`, all integers little-endian.
const MAGIC: &[u8; 4] = b"DQAI";
const HEADER_LEN: usize = 4 + 4 + 4 + 32;

/// Encode a float vector as little-endian `f32` bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian `f32` bytes back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Brute-force nearest-neighbor structure over fixed-dimension vectors.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dims: usize,
    vectors: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            vectors: Vec::new(),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        if self.dims == 0 {
            0
        } else {
            self.vectors.len() / self.dims
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dims {
            bail!(
                "Vector dimension mismatch: expected {}, got {}",
                self.dims,
                vector.len()
            );
        }
        self.vectors.extend_from_slice(vector);
        Ok(())
    }

    /// Return up to `top_k` `(position, distance)` pairs in ascending
    /// squared-L2 distance, ties broken by insertion order. Asking for more
    /// results than stored returns all of them.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dims {
            bail!(
                "Query dimension mismatch: expected {}, got {}",
                self.dims,
                query.len()
            );
        }

        let mut hits: Vec<(usize, f32)> = (0..self.len())
            .map(|i| {
                let v = &self.vectors[i * self.dims..(i + 1) * self.dims];
                (i, squared_l2(query, v))
            })
            .collect();

        hits.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// A loaded index: vectors paired with their passage texts.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    index: FlatIndex,
    passages: Vec<String>,
}

impl SearchIndex {
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.index.dims()
    }

    /// Nearest passages to `query_vec`: `(text, distance)` in ascending
    /// distance order.
    pub fn search(&self, query_vec: &[f32], top_k: usize) -> Result<Vec<(&str, f32)>> {
        let hits = self.index.search(query_vec, top_k)?;
        Ok(hits
            .into_iter()
            .map(|(i, dist)| (self.passages[i].as_str(), dist))
            .collect())
    }
}

/// Builds, persists, and reloads the passage index.
pub struct IndexStore {
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            dir: dir.into(),
            embedder,
        }
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    pub fn passages_path(&self) -> PathBuf {
        self.dir.join(PASSAGES_FILE)
    }

    /// Both artifacts present on disk.
    pub fn exists(&self) -> bool {
        index_present(&self.dir)
    }

    /// Embed every passage, build the flat structure, and persist both
    /// artifacts, replacing any previous index in full.
    pub fn build(&self, passages: Vec<String>) -> Result<SearchIndex> {
        if passages.is_empty() {
            bail!("no content: there are no passages to index");
        }

        let vectors = self.embedder.embed(&passages)?;
        if vectors.len() != passages.len() {
            bail!(
                "Embedder returned {} vectors for {} passages",
                vectors.len(),
                passages.len()
            );
        }

        let dims = self.embedder.dims();
        let mut index = FlatIndex::new(dims);
        for vector in &vectors {
            index.add(vector)?;
        }

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create index dir: {}", self.dir.display()))?;

        let passages_json = serde_json::to_vec(&passages)?;
        std::fs::write(self.passages_path(), &passages_json)
            .with_context(|| format!("Failed to write {}", self.passages_path().display()))?;

        let mut blob = Vec::with_capacity(HEADER_LEN + index.vectors.len() * 4);
        blob.extend_from_slice(MAGIC);
        blob.extend_from_slice(&(dims as u32).to_le_bytes());
        blob.extend_from_slice(&(passages.len() as u32).to_le_bytes());
        blob.extend_from_slice(&Sha256::digest(&passages_json));
        blob.extend_from_slice(&vec_to_blob(&index.vectors));
        std::fs::write(self.vectors_path(), &blob)
            .with_context(|| format!("Failed to write {}", self.vectors_path().display()))?;

        Ok(SearchIndex { index, passages })
    }

    /// Reconstruct the index from the persisted artifacts.
    pub fn load(&self) -> Result<SearchIndex> {
        load_index(&self.dir)
    }
}

/// Both index artifacts present in `dir`.
pub fn index_present(dir: &Path) -> bool {
    dir.join(VECTORS_FILE).exists() && dir.join(PASSAGES_FILE).exists()
}

/// Reconstruct a [`SearchIndex`] from the artifacts in `dir`. Loading needs
/// no embedder, so status checks and startup probes stay cheap.
pub fn load_index(dir: &Path) -> Result<SearchIndex> {
    let vectors_path = dir.join(VECTORS_FILE);
    let passages_path = dir.join(PASSAGES_FILE);

    if !vectors_path.exists() || !passages_path.exists() {
        bail!(
            "index not found in {}: run `dqa ingest` before asking questions",
            dir.display()
        );
    }

    let passages_json = std::fs::read(&passages_path)
        .with_context(|| format!("Failed to read {}", passages_path.display()))?;
    let passages: Vec<String> =
        serde_json::from_slice(&passages_json).with_context(|| "Failed to parse passage artifact")?;

    let blob = std::fs::read(&vectors_path)
        .with_context(|| format!("Failed to read {}", vectors_path.display()))?;
    if blob.len() < HEADER_LEN || &blob[..4] != MAGIC {
        bail!("Vector artifact is corrupt: bad header");
    }

    let dims = u32::from_le_bytes([blob[4], blob[5], blob[6], blob[7]]) as usize;
    let count = u32::from_le_bytes([blob[8], blob[9], blob[10], blob[11]]) as usize;
    let stored_hash = &blob[12..44];

    if stored_hash != Sha256::digest(&passages_json).as_slice() {
        bail!("Index artifacts do not match: passage sequence changed since build");
    }
    if count != passages.len() {
        bail!(
            "Index artifacts do not match: {} vectors vs {} passages",
            count,
            passages.len()
        );
    }

    let payload = &blob[HEADER_LEN..];
    if payload.len() != count * dims * 4 {
        bail!("Vector artifact is corrupt: truncated payload");
    }

    let index = FlatIndex {
        dims,
        vectors: blob_to_vec(payload),
    };

    Ok(SearchIndex { index, passages })
}

/// Summary of the persisted artifacts, for `dqa status`.
pub struct IndexStatus {
    pub passages: usize,
    pub dims: usize,
    pub built_at: Option<std::time::SystemTime>,
}

/// `Ok(None)` when the index has not been built yet.
pub fn index_status(dir: &Path) -> Result<Option<IndexStatus>> {
    let vectors_path = dir.join(VECTORS_FILE);
    if !index_present(dir) {
        return Ok(None);
    }
    let loaded = load_index(dir)?;
    let built_at = std::fs::metadata(&vectors_path)
        .and_then(|m| m.modified())
        .ok();
    Ok(Some(IndexStatus {
        passages: loaded.len(),
        dims: loaded.dims(),
        built_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    /// Deterministic bag-of-words embedder: each token hashes into one of
    /// `DIMS` buckets, then the vector is L2-normalized. Texts sharing words
    /// land near each other, which is all these tests need.
    struct HashEmbedder;

    const DIMS: usize = 32;

    impl Embedder for HashEmbedder {
        fn model_name(&self) -> &str {
            "hash-test"
        }
        fn dims(&self) -> usize {
            DIMS
        }
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; DIMS];
                    for token in t.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
                        if token.is_empty() {
                            continue;
                        }
                        let mut h = DefaultHasher::new();
                        token.hash(&mut h);
                        v[(h.finish() % DIMS as u64) as usize] += 1.0;
                    }
                    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                    if norm > 0.0 {
                        for x in &mut v {
                            *x /= norm;
                        }
                    }
                    v
                })
                .collect())
        }
    }

    fn store_in(dir: &Path) -> IndexStore {
        IndexStore::new(dir, Arc::new(HashEmbedder))
    }

    #[test]
    fn build_empty_is_no_content() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(tmp.path());
        let err = store.build(Vec::new()).unwrap_err();
        assert!(err.to_string().contains("no content"));
    }

    #[test]
    fn load_without_build_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(tmp.path());
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("index not found"));
        assert!(err.to_string().contains("ingest"));
    }

    #[test]
    fn search_distances_non_decreasing() {
        let mut index = FlatIndex::new(2);
        index.add(&[0.0, 0.0]).unwrap();
        index.add(&[3.0, 4.0]).unwrap();
        index.add(&[1.0, 0.0]).unwrap();

        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
        assert_eq!(hits[0].0, 0);
        assert_eq!(hits[1].0, 2);
        assert_eq!(hits[2].0, 1);
        assert!((hits[2].1 - 25.0).abs() < 1e-6);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut index = FlatIndex::new(1);
        index.add(&[1.0]).unwrap();
        index.add(&[-1.0]).unwrap();
        index.add(&[1.0]).unwrap();

        let hits = index.search(&[0.0], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn top_k_larger_than_stored_returns_all() {
        let mut index = FlatIndex::new(1);
        index.add(&[1.0]).unwrap();
        index.add(&[2.0]).unwrap();

        let hits = index.search(&[0.0], 10).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn query_dimension_mismatch_is_error() {
        let index = FlatIndex::new(3);
        assert!(index.search(&[0.0, 0.0], 1).is_err());
    }

    #[test]
    fn build_then_load_answers_search_identically() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(tmp.path());
        let passages = vec![
            "Claim X is covered.".to_string(),
            "Claim Y is excluded.".to_string(),
            "Premiums are due monthly.".to_string(),
        ];

        let built = store.build(passages).unwrap();
        let loaded = store.load().unwrap();

        let query = HashEmbedder.embed_one("Is claim X covered?").unwrap();
        let from_built: Vec<(String, f32)> = built
            .search(&query, 3)
            .unwrap()
            .into_iter()
            .map(|(t, d)| (t.to_string(), d))
            .collect();
        let from_loaded: Vec<(String, f32)> = loaded
            .search(&query, 3)
            .unwrap()
            .into_iter()
            .map(|(t, d)| (t.to_string(), d))
            .collect();

        assert_eq!(from_built, from_loaded);
        assert_eq!(from_built[0].0, "Claim X is covered.");
    }

    #[test]
    fn rebuild_replaces_previous_index() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(tmp.path());
        store.build(vec!["Old passage.".to_string()]).unwrap();
        store
            .build(vec!["New one.".to_string(), "New two.".to_string()])
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn tampered_passages_detected_on_load() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = store_in(tmp.path());
        store
            .build(vec!["One.".to_string(), "Two.".to_string()])
            .unwrap();

        std::fs::write(store.passages_path(), br#"["One.","Tampered."]"#).unwrap();
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("do not match"));
    }

    #[test]
    fn blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }
}
