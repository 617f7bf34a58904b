//! Scoring engine collaborator.
//!
//! [`ScoringEngine`] is the seam the evaluation cache calls through;
//! [`UciEngine`] drives an external UCI engine process such as Stockfish.

mod uci;

pub use uci::UciEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;

/// Kind of score reported by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    /// Material-style score in hundredths of a pawn.
    Centipawn,
    /// Moves until mate; negative when White is being mated.
    Mate,
}

/// A raw engine score from White's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawScore {
    /// How `value` is measured.
    pub kind: ScoreKind,
    /// Centipawns, or moves until mate.
    pub value: i32,
}

impl RawScore {
    /// A centipawn score.
    pub fn centipawns(value: i32) -> Self {
        Self {
            kind: ScoreKind::Centipawn,
            value,
        }
    }

    /// A mate-in-N score.
    pub fn mate(value: i32) -> Self {
        Self {
            kind: ScoreKind::Mate,
            value,
        }
    }
}

/// Scores positions. May be slow; callers cache the results.
#[async_trait]
pub trait ScoringEngine: Send + Sync {
    /// Score `position` (a FEN string) from White's point of view.
    async fn evaluate(&self, position: &str) -> EngineResult<RawScore>;
}
