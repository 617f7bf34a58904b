//! Blunder analysis over an opening tree.
//!
//! - [`EvaluationCache`]: memoized, normalized position scores
//! - [`find_common_blunders`]: probability-weighted walk producing blunder records
//! - [`rank_openings`]: rolls retained records into an opening ranking

mod cache;
mod openings;
mod traversal;

pub use cache::*;
pub use openings::*;
pub use traversal::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side whose opponent's mistakes are being searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perspective {
    /// Both sides; every move is weighted by frequency.
    None,
    /// Blunders that hand White an advantage.
    White,
    /// Blunders that hand Black an advantage.
    Black,
}

impl Perspective {
    /// True when the analyzed side makes the move at 1-based ply `depth`.
    ///
    /// Such moves are chosen, not sampled, so they keep the parent's
    /// probability. White moves on odd plies and Black on even plies.
    pub fn chooses(self, depth: u32) -> bool {
        match self {
            Perspective::None => false,
            Perspective::White => depth % 2 == 1,
            Perspective::Black => depth % 2 == 0,
        }
    }

    fn looks_for_white_gains(self) -> bool {
        matches!(self, Perspective::White | Perspective::None)
    }

    fn looks_for_black_gains(self) -> bool {
        matches!(self, Perspective::Black | Perspective::None)
    }
}

impl FromStr for Perspective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Perspective::None),
            "white" => Ok(Perspective::White),
            "black" => Ok(Perspective::Black),
            other => Err(format!(
                "unknown perspective '{}', expected none, white or black",
                other
            )),
        }
    }
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Perspective::None => "none",
            Perspective::White => "white",
            Perspective::Black => "black",
        };
        f.write_str(name)
    }
}

/// Minimum evaluation swing, in pawns, for a continuation to count as a blunder.
pub const BLUNDER_SWING: f64 = 0.5;

/// Evaluation White must reach after the continuation.
pub const WHITE_ADVANTAGE: f64 = 0.5;

/// True when moving from `current` to `next` is a blunder worth reporting
/// for `perspective`. Both bounds are inclusive.
pub fn is_blunder(perspective: Perspective, current: f64, next: f64) -> bool {
    let white_gain =
        perspective.looks_for_white_gains() && next - current >= BLUNDER_SWING && next >= WHITE_ADVANTAGE;
    let black_gain = perspective.looks_for_black_gains() && current - next >= BLUNDER_SWING && next <= 0.0;
    white_gain || black_gain
}

/// Knobs for [`find_common_blunders`].
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    /// Side being analyzed.
    pub perspective: Perspective,
    /// Plies walked structurally before classification starts.
    pub evaluation_depth: u32,
    /// Rare-line threshold is `max(plies_ingested / divisor, 1)`.
    pub rare_node_divisor: f64,
    /// Top-level subtrees walked at once.
    pub concurrency: usize,
}

impl TraversalOptions {
    /// Defaults for `perspective`.
    pub fn new(perspective: Perspective) -> Self {
        Self {
            perspective,
            evaluation_depth: 8,
            rare_node_divisor: 100_000.0,
            concurrency: 1,
        }
    }

    /// Set the number of plies walked before classification.
    pub fn with_evaluation_depth(mut self, depth: u32) -> Self {
        self.evaluation_depth = depth;
        self
    }

    /// Set the rare-line divisor.
    pub fn with_rare_node_divisor(mut self, divisor: f64) -> Self {
        self.rare_node_divisor = divisor;
        self
    }

    /// Set how many top-level subtrees are walked at once (at least one).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Edges with a count at or below this are skipped with their subtree.
    ///
    /// `plies` is the number of moves ingested over all games, so the cutoff
    /// grows with the volume of games rather than with the tree's width.
    pub fn rare_threshold(&self, plies: usize) -> f64 {
        (plies as f64 / self.rare_node_divisor).max(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perspective_parse_and_display() {
        assert_eq!("White".parse::<Perspective>().unwrap(), Perspective::White);
        assert_eq!(" black ".parse::<Perspective>().unwrap(), Perspective::Black);
        assert_eq!("NONE".parse::<Perspective>().unwrap(), Perspective::None);
        assert!("grey".parse::<Perspective>().is_err());
        assert_eq!(Perspective::Black.to_string(), "black");
    }

    #[test]
    fn test_chooses_by_ply_parity() {
        assert!(Perspective::White.chooses(1));
        assert!(!Perspective::White.chooses(2));
        assert!(Perspective::Black.chooses(2));
        assert!(!Perspective::Black.chooses(9));
        assert!(!Perspective::None.chooses(1));
        assert!(!Perspective::None.chooses(2));
    }

    #[test]
    fn test_white_blunder_bounds_inclusive() {
        assert!(is_blunder(Perspective::White, 0.0, 0.5));
        assert!(is_blunder(Perspective::White, 0.25, 0.75));
        assert!(!is_blunder(Perspective::White, 0.1, 0.5));
        assert!(!is_blunder(Perspective::White, -0.5, 0.4));
        assert!(!is_blunder(Perspective::Black, 0.0, 0.5));
    }

    #[test]
    fn test_black_blunder_bounds_inclusive() {
        assert!(is_blunder(Perspective::Black, 0.5, 0.0));
        assert!(is_blunder(Perspective::Black, 0.25, -0.25));
        assert!(!is_blunder(Perspective::Black, 0.4, 0.0));
        assert!(!is_blunder(Perspective::Black, 1.5, 0.1));
        assert!(!is_blunder(Perspective::White, 0.5, 0.0));
    }

    #[test]
    fn test_none_accepts_either_side() {
        assert!(is_blunder(Perspective::None, 0.0, 0.5));
        assert!(is_blunder(Perspective::None, 0.5, 0.0));
        assert!(!is_blunder(Perspective::None, 0.1, 0.3));
    }

    #[test]
    fn test_rare_threshold_floor() {
        let options = TraversalOptions::new(Perspective::White);
        assert_eq!(options.rare_threshold(10), 1.0);
        assert_eq!(options.rare_threshold(300_000), 3.0);
        assert_eq!(options.with_rare_node_divisor(4.0).rare_threshold(10), 2.5);
    }
}
