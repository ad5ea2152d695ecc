//! # doc-answer
//!
//! Retrieval-augmented question answering over uploaded documents.
//!
//! doc-answer turns a directory of documents (PDF, DOCX, EML) into a
//! searchable passage index and answers natural-language questions against
//! it: relevant passages are retrieved by embedding similarity and handed to
//! an external chat model with instructions to answer only from that
//! evidence, falling back to general knowledge when the document does not
//! cover the question.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────┐   ┌─────────────┐
//! │  uploads  │──▶│     Pipeline      │──▶│ Flat index  │
//! │ pdf/docx/ │   │ Extract → Chunk  │   │ vectors.bin │
//! │    eml    │   │     → Embed      │   │passages.json│
//! └───────────┘   └──────────────────┘   └──────┬──────┘
//!                                               │
//!                    question ──▶ Retriever ────┤
//!                                               ▼
//!                                          ┌──────────┐   ┌───────────┐
//!                                          │ Answerer │──▶│ chat model│
//!                                          └──────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dqa ingest                    # build the index from the uploads dir
//! dqa status                    # inspect the persisted artifacts
//! dqa ask "Is claim X covered?"
//! dqa serve                     # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF/DOCX/EML text extraction |
//! | [`chunk`] | Sentence-boundary passage chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Index build, persistence, nearest-neighbor search |
//! | [`retrieve`] | Question-to-passage retrieval |
//! | [`answer`] | Grounded/fallback answer generation with bounded retry |
//! | [`ingest`] | Ingestion pipeline orchestration |
//! | [`server`] | HTTP question-answering service |

pub mod answer;
pub mod ask;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod retrieve;
pub mod server;
pub mod status;
pub mod store;
