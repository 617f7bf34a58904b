//! # Opening Blunders
//!
//! Finds chess positions where players at a given rating commonly blunder,
//! and the openings that lead to them.
//!
//! Stored games are folded into an opening tree (a trie of move sequences
//! with per-move frequencies). The tree is walked with a probability weight
//! for reaching each position; positions past the opening phase are scored by
//! a UCI engine and every continuation that swings the evaluation is counted.
//! Results are merged across transpositions and rolled up by opening.
//!
//! ## Architecture
//!
//! ```text
//! SQLite (games) → TreeBuilder → OpeningTree → find_common_blunders → rank_openings
//!                                                     ↓
//!                                  EvaluationCache → UCI engine (process)
//!                                         ↓
//!                                  SQLite (evaluations)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use opening_blunders::analysis::Perspective;
//! use opening_blunders::cli::{run_analysis, AnalysisRequest};
//! use opening_blunders::engine::UciEngine;
//! use opening_blunders::storage::SqliteStorage;
//! use opening_blunders::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = Arc::new(SqliteStorage::new(&config.database).await?);
//!     let engine = Arc::new(UciEngine::new(config.engine.clone()));
//!     let request = AnalysisRequest {
//!         elo: 1500.0,
//!         elo_buffer: 200.0,
//!         perspective: Perspective::White,
//!         starting_moves: None,
//!         concurrency: 1,
//!     };
//!     let outcome = run_analysis(storage, engine, &request, &config.analysis).await?;
//!     println!("{} positions", outcome.report.records.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Blunder classification, evaluation caching and opening ranking.
pub mod analysis;
/// CLI commands and the end-to-end analysis pipeline.
pub mod cli;
/// Configuration management.
pub mod config;
/// UCI scoring engine client.
pub mod engine;
/// Error types and result aliases for the application.
pub mod error;
/// JSON Lines game import.
pub mod import;
/// Text rendering of analysis results.
pub mod report;
/// Chess rules adapter.
pub mod rules;
/// SQLite storage layer for games and evaluations.
pub mod storage;
/// Opening tree and its builder.
pub mod tree;

pub use config::Config;
pub use error::{AppError, AppResult};
