//! Chess rules collaborator: replays SAN moves and produces canonical FEN
//! position identifiers.

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position};

use crate::error::{RulesError, RulesResult};

/// FEN of the standard starting position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Replays moves against positions.
///
/// Implementations must be deterministic: the same position and token always
/// produce the same resulting identifier, so independently built trees agree
/// on positions for identical prefixes.
pub trait RulesEngine: Send + Sync {
    /// Identifier of the position every game starts from.
    fn starting_position(&self) -> String;

    /// Play `token` in `position` and return the resulting identifier.
    fn apply_move(&self, position: &str, token: &str) -> RulesResult<String>;

    /// Play `tokens` in order, returning the identifier after each one.
    fn replay(&self, position: &str, tokens: &[&str]) -> RulesResult<Vec<String>> {
        let mut positions = Vec::with_capacity(tokens.len());
        let mut current = position.to_string();
        for token in tokens {
            current = self.apply_move(&current, token)?;
            positions.push(current.clone());
        }
        Ok(positions)
    }
}

/// Standard chess rules backed by `shakmaty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardChess;

impl StandardChess {
    fn parse(position: &str) -> RulesResult<Chess> {
        let fen: Fen = position.parse().map_err(|e| RulesError::InvalidPosition {
            position: position.to_string(),
            message: format!("{}", e),
        })?;

        fen.into_position(CastlingMode::Standard)
            .map_err(|e| RulesError::InvalidPosition {
                position: position.to_string(),
                message: format!("{}", e),
            })
    }

    fn play(pos: &Chess, token: &str) -> RulesResult<Chess> {
        let illegal = || RulesError::IllegalMove {
            position: Self::fen(pos),
            token: token.to_string(),
        };

        let san: SanPlus = token.parse().map_err(|_| illegal())?;
        let m = san.san.to_move(pos).map_err(|_| illegal())?;
        pos.clone().play(&m).map_err(|_| illegal())
    }

    fn fen(pos: &Chess) -> String {
        Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string()
    }
}

impl RulesEngine for StandardChess {
    fn starting_position(&self) -> String {
        STARTING_FEN.to_string()
    }

    fn apply_move(&self, position: &str, token: &str) -> RulesResult<String> {
        let pos = Self::parse(position)?;
        Self::play(&pos, token).map(|next| Self::fen(&next))
    }

    fn replay(&self, position: &str, tokens: &[&str]) -> RulesResult<Vec<String>> {
        let mut pos = Self::parse(position)?;
        let mut positions = Vec::with_capacity(tokens.len());
        for token in tokens {
            pos = Self::play(&pos, token)?;
            positions.push(Self::fen(&pos));
        }
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starting_position_is_standard() {
        assert_eq!(StandardChess.starting_position(), STARTING_FEN);
    }

    #[test]
    fn test_apply_move_produces_fen() {
        let next = StandardChess.apply_move(STARTING_FEN, "Nf3").unwrap();
        assert_eq!(
            next,
            "rnbqkbnr/pppppppp/8/8/8/5N2/PPPPPPPP/RNBQKB1R b KQkq - 1 1"
        );
    }

    #[test]
    fn test_en_passant_square_only_when_legal() {
        // No black pawn can capture on e3, so no en passant square is written.
        let next = StandardChess.apply_move(STARTING_FEN, "e4").unwrap();
        assert_eq!(
            next,
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );
    }

    #[test]
    fn test_check_suffix_accepted() {
        let positions = StandardChess
            .replay(STARTING_FEN, &["e4", "f5", "Qh5+"])
            .unwrap();
        assert_eq!(positions.len(), 3);
    }

    #[test]
    fn test_illegal_move_rejected() {
        let err = StandardChess.apply_move(STARTING_FEN, "Ke2").unwrap_err();
        assert!(matches!(err, RulesError::IllegalMove { .. }));

        let err = StandardChess.apply_move(STARTING_FEN, "not-a-move").unwrap_err();
        assert!(matches!(err, RulesError::IllegalMove { .. }));
    }

    #[test]
    fn test_invalid_position_rejected() {
        let err = StandardChess.apply_move("garbage", "e4").unwrap_err();
        assert!(matches!(err, RulesError::InvalidPosition { .. }));
    }

    #[test]
    fn test_replay_matches_apply_move() {
        let tokens = ["d4", "d5", "c4", "e6"];
        let replayed = StandardChess.replay(STARTING_FEN, &tokens).unwrap();

        let mut current = STARTING_FEN.to_string();
        for (token, expected) in tokens.iter().zip(&replayed) {
            current = StandardChess.apply_move(&current, token).unwrap();
            assert_eq!(&current, expected);
        }
    }

    #[test]
    fn test_transposition_reaches_identical_fen() {
        let a = StandardChess
            .replay(STARTING_FEN, &["Nf3", "Nf6", "Nc3", "Nc6"])
            .unwrap();
        let b = StandardChess
            .replay(STARTING_FEN, &["Nc3", "Nc6", "Nf3", "Nf6"])
            .unwrap();
        assert_eq!(a.last(), b.last());
    }
}
