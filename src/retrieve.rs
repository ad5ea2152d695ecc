//! Question-to-passage retrieval.
//!
//! Embeds a question with the shared [`Embedder`] and returns the texts of
//! the nearest stored passages. The index is loaded once (at open) and read
//! only afterwards; asking before ingestion has run is an error surfaced to
//! the caller, distinct from a legitimate empty result.

use anyhow::Result;
use std::sync::Arc;

use crate::embedding::Embedder;
use crate::store::{IndexStore, SearchIndex};

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: SearchIndex,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("passages", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl Retriever {
    /// Load the persisted index and bind it to the process-wide embedder.
    ///
    /// Fails with the store's "index not found" error when ingestion has not
    /// been run; callers surface that as the affected question's answer.
    pub fn open(store: &IndexStore, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let index = store.load()?;
        Ok(Self { embedder, index })
    }

    pub fn passage_count(&self) -> usize {
        self.index.len()
    }

    /// The `top_k` passages most similar to the question, closest first,
    /// distances discarded.
    pub fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<String>> {
        let query = self.embedder.embed_one(question)?;
        let hits = self.index.search(&query, top_k)?;
        Ok(hits.into_iter().map(|(text, _)| text.to_string()).collect())
    }
}
