//! Storage layer for game records and cached position evaluations.
//!
//! This module provides the [`Storage`] contract used by the tree builder and
//! the evaluation cache, plus the SQLite-backed implementation.

mod sqlite;

pub use sqlite::SqliteStorage;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

/// A stored game record: the opening moves of one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Row identifier.
    pub id: i64,
    /// Space-delimited SAN tokens.
    pub moves: String,
    /// Opening name as reported by the game source.
    pub opening: String,
    /// Average rating of both players.
    pub elo: f64,
    /// Time control string, when known.
    pub time_control: Option<String>,
}

impl GameRecord {
    /// Move tokens of the game, in order.
    pub fn move_tokens(&self) -> Vec<&str> {
        self.moves.split_whitespace().collect()
    }
}

/// A game record waiting to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGame {
    /// Space-delimited SAN tokens.
    pub moves: String,
    /// Opening name.
    pub opening: String,
    /// Average rating of both players.
    pub elo: f64,
    /// Time control string, when known.
    pub time_control: Option<String>,
    /// When the record was imported.
    pub imported_at: DateTime<Utc>,
}

impl NewGame {
    /// Create a new game record stamped with the current time.
    pub fn new(moves: impl Into<String>, opening: impl Into<String>, elo: f64) -> Self {
        Self {
            moves: moves.into(),
            opening: opening.into(),
            elo,
            time_control: None,
            imported_at: Utc::now(),
        }
    }

    /// Set the time control.
    pub fn with_time_control(mut self, time_control: impl Into<String>) -> Self {
        self.time_control = Some(time_control.into());
        self
    }
}

/// Selection of game records for one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct GameQuery {
    /// Inclusive lower rating bound.
    pub min_elo: f64,
    /// Inclusive upper rating bound.
    pub max_elo: f64,
    /// Only games whose move text starts with this prefix.
    pub starting_moves: Option<String>,
    /// Move sequences are truncated to this many half-moves.
    pub max_plies: usize,
}

impl GameQuery {
    /// Games within `buffer` rating points of `elo`.
    pub fn around(elo: f64, buffer: f64) -> Self {
        Self {
            min_elo: elo - buffer,
            max_elo: elo + buffer,
            starting_moves: None,
            max_plies: 40,
        }
    }

    /// Restrict to games starting with the given moves. Blank or `none` clears the filter.
    pub fn with_starting_moves(mut self, moves: impl Into<String>) -> Self {
        let moves = moves.into();
        let trimmed = moves.trim();
        self.starting_moves = if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    /// Set the half-move truncation.
    pub fn with_max_plies(mut self, max_plies: usize) -> Self {
        self.max_plies = max_plies;
        self
    }
}

/// Truncate space-delimited move text to `max_plies` tokens.
pub fn truncate_moves(moves: &str, max_plies: usize) -> String {
    moves
        .split_whitespace()
        .take(max_plies)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Storage trait for database operations.
///
/// Covers the game-record source read by the tree builder and the
/// evaluation store backing the position evaluation cache.
#[async_trait]
pub trait Storage: Send + Sync {
    // Game record operations

    /// Fetch games matching the query, ordered by move text.
    async fn fetch_games(&self, query: &GameQuery) -> StorageResult<Vec<GameRecord>>;
    /// Insert a game record, returning its row id.
    async fn insert_game(&self, game: &NewGame) -> StorageResult<i64>;
    /// Count stored games.
    async fn count_games(&self) -> StorageResult<i64>;

    // Evaluation operations

    /// Load every stored evaluation.
    async fn load_evaluations(&self) -> StorageResult<HashMap<String, f64>>;
    /// Store an evaluation. Repeated inserts for a position overwrite it.
    async fn insert_evaluation(&self, position: &str, evaluation: f64) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_moves() {
        assert_eq!(truncate_moves("e4 e5 Nf3 Nc6 Bb5", 3), "e4 e5 Nf3");
        assert_eq!(truncate_moves("e4  e5", 40), "e4 e5");
        assert_eq!(truncate_moves("", 10), "");
    }

    #[test]
    fn test_query_around() {
        let query = GameQuery::around(1500.0, 200.0);
        assert_eq!(query.min_elo, 1300.0);
        assert_eq!(query.max_elo, 1700.0);
        assert_eq!(query.starting_moves, None);
        assert_eq!(query.max_plies, 40);
    }

    #[test]
    fn test_starting_moves_none_sentinel() {
        let query = GameQuery::around(1500.0, 100.0).with_starting_moves("none");
        assert_eq!(query.starting_moves, None);

        let query = GameQuery::around(1500.0, 100.0).with_starting_moves("  ");
        assert_eq!(query.starting_moves, None);

        let query = GameQuery::around(1500.0, 100.0).with_starting_moves(" e4 e5 ");
        assert_eq!(query.starting_moves.as_deref(), Some("e4 e5"));
    }

    #[test]
    fn test_game_record_tokens() {
        let record = GameRecord {
            id: 1,
            moves: "d4 d5 c4".to_string(),
            opening: "Queen's Gambit".to_string(),
            elo: 1500.0,
            time_control: None,
        };
        assert_eq!(record.move_tokens(), vec!["d4", "d5", "c4"]);
    }
}
