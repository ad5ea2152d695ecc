//! One-shot question answering for `dqa ask`.

use anyhow::Result;
use std::sync::Arc;

use crate::answer::{answer_question, Answerer, HttpChatModel};
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::retrieve::Retriever;
use crate::store::IndexStore;

pub async fn run_ask(
    config: &Config,
    question: &str,
    top_k: Option<usize>,
    general: bool,
    json: bool,
) -> Result<()> {
    let model = HttpChatModel::new(&config.model)?;
    let answerer = Answerer::new(Arc::new(model), config.model.max_attempts);
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let retriever = if general {
        None
    } else {
        let embedder = create_embedder(&config.embedding)?;
        let store = IndexStore::new(&config.storage.index_dir, embedder.clone());
        match Retriever::open(&store, embedder) {
            Ok(r) => Some(r),
            Err(e) => {
                eprintln!("Warning: {}", e);
                None
            }
        }
    };

    let result = answer_question(&answerer, retriever.as_ref(), question, top_k, !general).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("decision: {}", result.decision);
    println!("answer: {}", result.justification.summary);
    if !result.justification.clause_refs.is_empty() {
        println!("clause refs:");
        for clause_ref in &result.justification.clause_refs {
            println!("  - {}", clause_ref);
        }
    }

    Ok(())
}
