//! # polibase-transcripts
//!
//! Ingests political video transcripts (HTML and VLOS-XML), persists them in
//! a Postgres content store, and keeps a search engine in sync for hybrid
//! full-text/semantic/filtered queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     polibase-transcripts                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐                                                 │
//! │  │   CLI   │  sync / ingest / reindex / migrate              │
//! │  └────┬────┘                                                 │
//! │       │                                                      │
//! │  ┌────┴─────┐   ┌───────────┐   ┌────────────┐   ┌─────────┐ │
//! │  │  parse   │──▶│  ingest   │──▶│   store    │──▶│ search  │ │
//! │  │ html/vlos│   │orchestrate│   │ (Postgres) │   │(project/│ │
//! │  └──────────┘   └───────────┘   └────────────┘   │sync/qry)│ │
//! │                                                   └─────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod parse;
pub mod progress;
pub mod search;
pub mod store;

pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::progress::{JobProgress, JobStatus, ProgressBus};
pub use crate::store::ContentStore;
