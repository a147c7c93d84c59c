//! # Orinda Core
//!
//! Shared logic for Orinda: data model, error kinds, chunking, the
//! embedding and vector-store abstractions, retrieval orchestration and
//! prompt assembly.
//!
//! This crate contains no tokio, sqlx, HTTP or filesystem I/O. Concrete
//! embedding clients, the SQLite vector store and document loaders live in
//! the `orinda` application crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod store;

pub use error::{IngestFailure, OrindaError};
