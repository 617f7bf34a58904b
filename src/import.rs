//! Game record import from JSON Lines.
//!
//! Each line holds one game:
//!
//! ```text
//! {"moves": "e4 e5 Nf3", "opening": "King's Knight Opening", "white_elo": 1510, "black_elo": "1490", "time_control": "600+0"}
//! ```
//!
//! Ratings may be numbers or numeric strings; the stored elo is their
//! average. Moves are truncated to the configured number of plies.

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::error::{AppResult, ImportError};
use crate::storage::{truncate_moves, NewGame, Storage};

/// A player rating as it appears in the input.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Rating {
    /// A JSON number.
    Number(f64),
    /// A string holding a number.
    Text(String),
}

impl Rating {
    fn value(&self) -> Option<f64> {
        let value = match self {
            Rating::Number(n) => Some(*n),
            Rating::Text(s) => s.trim().parse().ok(),
        };
        value.filter(|v: &f64| v.is_finite())
    }

    fn raw(&self) -> String {
        match self {
            Rating::Number(n) => n.to_string(),
            Rating::Text(s) => s.clone(),
        }
    }
}

/// One line of import input.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRecord {
    /// Space-delimited SAN tokens.
    pub moves: String,
    /// Opening name.
    pub opening: String,
    /// White's rating.
    pub white_elo: Rating,
    /// Black's rating.
    pub black_elo: Rating,
    /// Time control string.
    #[serde(default)]
    pub time_control: Option<String>,
}

impl ImportRecord {
    /// Validate the record and turn it into a storable game.
    pub fn into_game(self, line: usize, max_plies: usize) -> Result<NewGame, ImportError> {
        let white = self.white_elo.value().ok_or_else(|| ImportError::InvalidElo {
            line,
            value: self.white_elo.raw(),
        })?;
        let black = self.black_elo.value().ok_or_else(|| ImportError::InvalidElo {
            line,
            value: self.black_elo.raw(),
        })?;

        let moves = truncate_moves(&self.moves, max_plies);
        if moves.is_empty() {
            return Err(ImportError::EmptyMoves { line });
        }

        let game = NewGame::new(moves, self.opening, (white + black) / 2.0);
        Ok(match self.time_control {
            Some(tc) => game.with_time_control(tc),
            None => game,
        })
    }
}

/// Outcome of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Games inserted.
    pub imported: usize,
    /// Records rejected.
    pub skipped: usize,
}

/// Parse one line of input.
pub fn parse_line(text: &str, line: usize, max_plies: usize) -> Result<NewGame, ImportError> {
    let record: ImportRecord = serde_json::from_str(text).map_err(|e| ImportError::Malformed {
        line,
        message: e.to_string(),
    })?;
    record.into_game(line, max_plies)
}

/// Read JSON Lines from `reader` and insert every valid game.
///
/// Invalid records are skipped with a warning; read and storage failures
/// abort the import.
pub async fn import_games<R>(reader: R, storage: &dyn Storage, max_plies: usize) -> AppResult<ImportStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = ImportStats::default();
    let mut line = 0;

    while let Some(text) = lines.next_line().await.map_err(ImportError::from)? {
        line += 1;
        if text.trim().is_empty() {
            continue;
        }

        match parse_line(&text, line, max_plies) {
            Ok(game) => {
                storage.insert_game(&game).await?;
                stats.imported += 1;
            }
            Err(e) => {
                warn!(error = %e, "Skipping game record");
                stats.skipped += 1;
            }
        }

        if line % 10_000 == 0 {
            debug!(lines = line, imported = stats.imported, "Import progress");
        }
    }

    info!(imported = stats.imported, skipped = stats.skipped, "Import complete");
    Ok(stats)
}
