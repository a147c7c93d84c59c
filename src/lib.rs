//! # Orinda
//!
//! A local chat and retrieval-augmented generation front end for an
//! Ollama-compatible server.
//!
//! Documents (PDF, DOCX, XLSX, Markdown, plain text) are split into
//! overlapping chunks, embedded by the server and kept in a SQLite vector
//! store. Questions asked with `/ask` are answered from the most relevant
//! chunks; plain messages go to the model as-is. Conversations can be saved,
//! listed, reloaded and deleted.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌──────────────┐
//! │  loader  │──▶│  chunker  │──▶│ embedding  │──▶│ vector store │
//! └──────────┘   └───────────┘   └────────────┘   └──────┬───────┘
//!                                                        │
//!         query ──▶ embedding ──▶ retrieve ──▶ prompt ──▶ inference
//!                                                        │
//!                 session ◀── worker events ◀────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | Schema migrations |
//! | [`loader`] | File → text segments |
//! | [`embedding`] | Ollama embedding client |
//! | [`inference`] | Ollama chat client |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`conversation`] | Saved chat transcripts |
//! | [`progress`] | Ingestion progress events |
//! | [`ingest`] | Ingestion pipeline |
//! | [`context`] | Shared application services |
//! | [`worker`] | Background task dispatch |
//! | [`session`] | Interactive terminal session |
//!
//! Chunking, retrieval, prompt assembly and the storage traits live in the
//! `orinda-core` crate.

pub mod config;
pub mod context;
pub mod conversation;
pub mod db;
pub mod embedding;
pub mod inference;
pub mod ingest;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod progress;
pub mod session;
pub mod sqlite_store;
pub mod worker;
