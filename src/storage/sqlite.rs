use async_trait::async_trait;
use chrono::Utc;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info};

use super::{truncate_moves, GameQuery, GameRecord, NewGame, Storage};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory database, used by tests.
    ///
    /// The pool holds a single connection that never expires; an in-memory
    /// SQLite database lives exactly as long as its connection.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Build a `LIKE` pattern matching text that starts with `prefix`.
fn prefix_pattern(prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) => {
            let escaped = prefix
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("{}%", escaped)
        }
        None => "%".to_string(),
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn fetch_games(&self, query: &GameQuery) -> StorageResult<Vec<GameRecord>> {
        let pattern = prefix_pattern(query.starting_moves.as_deref());

        let rows: Vec<GameRow> = sqlx::query_as(
            r#"
            SELECT id, moves, opening, elo, time_control
            FROM games
            WHERE elo >= ? AND elo <= ? AND moves LIKE ? ESCAPE '\'
            ORDER BY moves
            "#,
        )
        .bind(query.min_elo)
        .bind(query.max_elo)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            games = rows.len(),
            min_elo = query.min_elo,
            max_elo = query.max_elo,
            pattern = %pattern,
            "Fetched game records"
        );

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut record: GameRecord = row.into();
                record.moves = truncate_moves(&record.moves, query.max_plies);
                record
            })
            .collect())
    }

    async fn insert_game(&self, game: &NewGame) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO games (moves, opening, elo, time_control, imported_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&game.moves)
        .bind(&game.opening)
        .bind(game.elo)
        .bind(&game.time_control)
        .bind(game.imported_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn count_games(&self) -> StorageResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM games")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn load_evaluations(&self) -> StorageResult<HashMap<String, f64>> {
        let rows: Vec<EvaluationRow> =
            sqlx::query_as("SELECT fen, evaluation FROM position_evaluations")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|r| (r.fen, r.evaluation)).collect())
    }

    async fn insert_evaluation(&self, position: &str, evaluation: f64) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO position_evaluations (fen, evaluation, evaluated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(fen) DO UPDATE SET
                evaluation = excluded.evaluation,
                evaluated_at = excluded.evaluated_at
            "#,
        )
        .bind(position)
        .bind(evaluation)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct GameRow {
    id: i64,
    moves: String,
    opening: String,
    elo: f64,
    time_control: Option<String>,
}

impl From<GameRow> for GameRecord {
    fn from(row: GameRow) -> Self {
        Self {
            id: row.id,
            moves: row.moves,
            opening: row.opening,
            elo: row.elo,
            time_control: row.time_control,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EvaluationRow {
    fen: String,
    evaluation: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_pattern_escapes_wildcards() {
        assert_eq!(prefix_pattern(None), "%");
        assert_eq!(prefix_pattern(Some("e4 e5")), "e4 e5%");
        assert_eq!(prefix_pattern(Some("a_b%")), "a\\_b\\%%");
    }
}
