//! # Code Oracle
//!
//! Incremental multi-language code indexing and retrieval for coding agents.
//!
//! The oracle walks a source tree, cuts each file into declaration-level
//! chunks with tree-sitter (or overlapping line windows when no grammar
//! applies), embeds them into a vector store, and answers natural-language
//! queries with the nearest chunks and the files they come from. Every
//! successful query is appended to a project memory log.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌────────────┐   ┌──────────┐
//! │   scan   │──▶│ tracker  │──▶│   chunk /  │──▶│ indexer  │
//! │ walkdir  │   │  mtimes  │   │  fallback  │   │  embed   │
//! └──────────┘   └──────────┘   └────────────┘   └────┬─────┘
//!                                                     ▼
//!                ┌──────────┐   ┌────────────┐   ┌──────────┐
//!                │  memory  │◀──│   query    │──▶│  store   │
//!                └──────────┘   └────────────┘   │  SQLite  │
//!                                                └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! oracle --root ./my-repo build
//! oracle --root ./my-repo query "where is the retry policy configured"
//! oracle --root ./my-repo symbol RetryPolicy
//! oracle --root ./my-repo serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Library error type |
//! | [`models`] | Core data types |
//! | [`languages`] | Extension table and grammars |
//! | [`parser`] | Parser registry |
//! | [`tracker`] | Change tracking |
//! | [`chunk`] | Syntax chunk extraction |
//! | [`fallback`] | Line-window chunking |
//! | [`scan`] | Directory walk |
//! | [`indexer`] | Per-file index writer |
//! | [`embedding`] | Embedding providers |
//! | [`store`] | Vector stores |
//! | [`query`] | Query engine |
//! | [`memory`] | Project memory |
//! | [`oracle`] | Facade |
//! | [`server`] | HTTP transport |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod fallback;
pub mod indexer;
pub mod languages;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod oracle;
pub mod parser;
pub mod query;
pub mod scan;
pub mod server;
pub mod store;
pub mod tracker;

pub use error::{OracleError, Result};
pub use oracle::Oracle;
