//! Answer generation over retrieved passages.
//!
//! The answerer is a two-mode state machine. **Grounded mode** (passages
//! supplied) instructs the model to answer strictly from the retrieved
//! evidence; a reply reporting that the document does not mention the answer
//! transitions once into **fallback mode** (no passages), which asks for a
//! brief general-knowledge answer. Every invocation runs inside a bounded
//! retry loop, and exhaustion produces a terminal error result instead of an
//! escaping error — one question's failure must never affect another's.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ModelConfig;
use crate::retrieve::Retriever;

pub const DECISION_INFORMATIONAL: &str = "informational";
pub const DECISION_ERROR: &str = "error";

/// Reply lines kept as clause references.
const MAX_CLAUSE_REFS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Justification {
    pub summary: String,
    pub clause_refs: Vec<String>,
}

/// The structured answer returned for every question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub decision: String,
    pub amount: Option<String>,
    pub justification: Justification,
}

impl QueryResult {
    fn informational(summary: String, clause_refs: Vec<String>) -> Self {
        Self {
            decision: DECISION_INFORMATIONAL.to_string(),
            amount: None,
            justification: Justification {
                summary,
                clause_refs,
            },
        }
    }

    pub fn error(summary: String) -> Self {
        Self {
            decision: DECISION_ERROR.to_string(),
            amount: None,
            justification: Justification {
                summary,
                clause_refs: Vec::new(),
            },
        }
    }
}

// ============ Model boundary ============

/// Errors from a single model invocation.
#[derive(Debug, Clone)]
pub enum ModelError {
    MissingApiKey { env_var: String },
    Network(String),
    Api { status: u16, message: String },
    Parse(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::MissingApiKey { env_var } => {
                write!(f, "API key not found. Set {} environment variable", env_var)
            }
            ModelError::Network(e) => write!(f, "network error: {}", e),
            ModelError::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            ModelError::Parse(e) => write!(f, "parse error: {}", e),
        }
    }
}

impl std::error::Error for ModelError {}

/// An opaque text-completion service: one prompt in, one reply out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// [`ChatModel`] over an OpenAI-compatible `/chat/completions` endpoint.
///
/// The configured timeout bounds each invocation at the HTTP client; a call
/// that never returns is reported as a network error and becomes a failed
/// attempt for the retry wrapper.
pub struct HttpChatModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl HttpChatModel {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| ModelError::MissingApiKey {
            env_var: config.api_key_env.clone(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.name.clone(),
            api_key,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| {
                ModelError::Parse("choices[0].message.content missing from response".to_string())
            })
    }
}

// ============ The answerer ============

/// Tagged outcome of one grounded invocation, after reply classification.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutcome {
    /// A usable answer.
    Answered(String),
    /// The reply said the document does not mention the answer.
    NotFound,
    /// Transport or service failure, retries exhausted.
    Failed(String),
}

/// Classify a grounded reply. The sole not-found signal is the substring
/// "not mentioned" (any case) — a known-weak heuristic: a legitimate answer
/// quoting the phrase also triggers fallback.
fn classify_grounded_reply(reply: String) -> ModelOutcome {
    if reply.to_lowercase().contains("not mentioned") {
        ModelOutcome::NotFound
    } else {
        ModelOutcome::Answered(reply)
    }
}

/// First reply lines that cite a clause or section, at most
/// [`MAX_CLAUSE_REFS`] of them.
fn extract_clause_refs(reply: &str) -> Vec<String> {
    reply
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains("clause") || lower.contains("section")
        })
        .take(MAX_CLAUSE_REFS)
        .map(|line| line.trim().to_string())
        .collect()
}

fn grounded_prompt(question: &str, clauses: &[String]) -> String {
    let clause_list = clauses
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are an intelligent document assistant.\n\n\
         Only use the retrieved passages below to answer the question. If the answer is \
         not found in them, say 'Not mentioned in the provided document.' Do not assume \
         or guess. Always state exact figures like waiting periods, limits, or \
         percentages when they are mentioned. Never generalize across policies.\n\n\
         User Question:\n\"\"\"{}\"\"\"\n\n\
         Relevant Passages:\n{}\n\n\
         Answer the question in a single sentence using simple and concise language.\n",
        question, clause_list
    )
}

fn fallback_prompt(question: &str) -> String {
    format!(
        "You are a confident, knowledgeable assistant.\n\n\
         Answer the question briefly in one sentence from general knowledge. Keep the \
         language simple and avoid unnecessary detail.\n\n\
         User Question:\n\"\"\"{}\"\"\"\n\n\
         Answer:\n",
        question
    )
}

pub struct Answerer {
    model: Arc<dyn ChatModel>,
    max_attempts: u32,
}

impl Answerer {
    pub fn new(model: Arc<dyn ChatModel>, max_attempts: u32) -> Self {
        Self {
            model,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Answer `question` from `clauses`. With passages, run grounded mode
    /// and fall back once when the reply reports the document does not cover
    /// the question; without passages, run fallback mode directly.
    ///
    /// Never returns an error: retry exhaustion becomes a terminal error
    /// result with an empty clause-reference list.
    pub async fn answer(&self, question: &str, clauses: &[String]) -> QueryResult {
        if clauses.is_empty() {
            return self.answer_fallback(question).await;
        }

        let outcome = self.invoke_grounded(question, clauses).await;
        match outcome {
            ModelOutcome::Answered(reply) => {
                let clause_refs = extract_clause_refs(&reply);
                QueryResult::informational(reply, clause_refs)
            }
            // Single-level re-entry: fallback mode never falls back again.
            ModelOutcome::NotFound => self.answer_fallback(question).await,
            ModelOutcome::Failed(cause) => QueryResult::error(cause),
        }
    }

    async fn answer_fallback(&self, question: &str) -> QueryResult {
        match self.invoke_with_retry(&fallback_prompt(question)).await {
            // No document evidence to cite in fallback mode.
            Ok(reply) => QueryResult::informational(reply, Vec::new()),
            Err(cause) => QueryResult::error(cause),
        }
    }

    async fn invoke_grounded(&self, question: &str, clauses: &[String]) -> ModelOutcome {
        match self
            .invoke_with_retry(&grounded_prompt(question, clauses))
            .await
        {
            Ok(reply) => classify_grounded_reply(reply),
            Err(cause) => ModelOutcome::Failed(cause),
        }
    }

    /// Invoke the model up to `max_attempts` times with unchanged input and
    /// no backoff. Each attempt runs to completion before the count is
    /// checked. On exhaustion the error names the attempt count and the last
    /// failure cause.
    async fn invoke_with_retry(&self, prompt: &str) -> Result<String, String> {
        let mut last_err: Option<ModelError> = None;
        for _attempt in 1..=self.max_attempts {
            match self.model.complete(prompt).await {
                Ok(reply) => return Ok(reply),
                Err(e) => last_err = Some(e),
            }
        }
        let cause = last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt was made".to_string());
        Err(format!(
            "model call failed after {} attempts: {}",
            self.max_attempts, cause
        ))
    }
}

// ============ Per-question boundary ============

/// Answer one question at the service boundary.
///
/// `grounded` selects document mode; without it every question runs on
/// general knowledge. A missing index or a retrieval failure becomes the
/// result itself — nothing propagates past this function.
pub async fn answer_question(
    answerer: &Answerer,
    retriever: Option<&Retriever>,
    question: &str,
    top_k: usize,
    grounded: bool,
) -> QueryResult {
    if !grounded {
        return answerer.answer(question, &[]).await;
    }

    let retriever = match retriever {
        Some(r) => r,
        None => {
            return QueryResult::error(
                "index not found: run `dqa ingest` before asking document questions".to_string(),
            )
        }
    };

    match retriever.retrieve(question, top_k) {
        Ok(clauses) => answerer.answer(question, &clauses).await,
        Err(e) => QueryResult::error(e.to_string()),
    }
}

/// Answer a batch of questions sequentially. Output order matches input
/// order, and each slot is produced independently: one question's failure
/// never displaces another's answer.
pub async fn answer_batch(
    answerer: &Answerer,
    retriever: Option<&Retriever>,
    questions: &[String],
    top_k: usize,
    grounded: bool,
) -> Vec<String> {
    let mut answers = Vec::with_capacity(questions.len());
    for question in questions {
        let result = answer_question(answerer, retriever, question, top_k, grounded).await;
        answers.push(result.justification.summary.trim().to_string());
    }
    answers
}
