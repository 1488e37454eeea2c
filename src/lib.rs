//! # Personal Assistant
//!
//! A small retrieval-augmented chat service and its terminal client.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  HTTP   ┌──────────────────────────────┐
//! │ Terminal │────────▶│          ChatService          │
//! │    UI    │◀────────│  embed ─▶ query ─▶ complete   │
//! └──────────┘         └───┬──────────┬──────────┬────┘
//!                          ▼          ▼          ▼
//!                    ┌─────────┐ ┌─────────┐ ┌─────────┐
//!                    │Embedder │ │ Vector  │ │  LLM    │
//!                    │fastembed│ │Pinecone │ │  Groq   │
//!                    └─────────┘ └─────────┘ └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GROQ_API_KEY=... PINECONE_API_KEY=...
//! assistant serve                          # HTTP on 0.0.0.0:8000
//! assistant add "The sky is blue."         # store a fact
//! assistant chat                           # talk to it
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Wire and domain types |
//! | [`error`] | Service error taxonomy and HTTP mapping |
//! | [`embedding`] | Embedder trait and backends |
//! | [`store`] | Vector store trait, Pinecone and in-memory backends |
//! | [`completion`] | Completion client trait and the Groq client |
//! | [`service`] | Chat and knowledge-ingestion orchestration |
//! | [`bootstrap`] | Startup: config + environment → service |
//! | [`server`] | Axum HTTP surface |
//! | [`session`] | Client-side chat sessions |
//! | [`client`] | HTTP client for the service |
//! | [`ui`] | Terminal chat loop |
//! | [`logging`] | tracing subscriber setup |

pub mod bootstrap;
pub mod client;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;
pub mod logging;
pub mod models;
pub mod server;
pub mod service;
pub mod session;
pub mod store;
pub mod ui;

pub use error::{ChatError, ChatResult};
pub use service::ChatService;
