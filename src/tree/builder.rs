use std::time::Instant;

use tracing::{debug, info, warn};

use super::{MoveEdge, OpeningTree};
use crate::error::{RulesResult, StorageResult};
use crate::rules::RulesEngine;
use crate::storage::{GameQuery, Storage};

/// Folds game records into an [`OpeningTree`].
///
/// The builder owns the tree while it grows, so the node counter used for
/// sequence indices travels with it instead of living in global state.
pub struct TreeBuilder<R> {
    rules: R,
    tree: OpeningTree,
}

/// Outcome of building a tree from stored games.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Games folded into the tree.
    pub ingested: usize,
    /// Games rejected by the rules engine.
    pub skipped: usize,
}

impl<R: RulesEngine> TreeBuilder<R> {
    /// Start an empty tree at the rules engine's starting position.
    pub fn new(rules: R) -> Self {
        let tree = OpeningTree::new(rules.starting_position());
        Self { rules, tree }
    }

    /// The tree built so far.
    pub fn tree(&self) -> &OpeningTree {
        &self.tree
    }

    /// Finish building and hand out the tree.
    pub fn finish(self) -> OpeningTree {
        self.tree
    }

    /// Fold one game into the tree, returning the number of edges created.
    ///
    /// Positions for every edge new to the tree are computed before anything
    /// is modified, so a move the rules engine rejects leaves the tree exactly
    /// as it was. An empty sequence is a no-op.
    pub fn ingest(&mut self, tokens: &[&str], opening: &str) -> RulesResult<usize> {
        if tokens.is_empty() {
            return Ok(0);
        }

        // Walk the prefix that already exists.
        let mut known = 0;
        let mut anchor = self.tree.root_position();
        let mut level = self.tree.children();
        for token in tokens {
            match level.get(*token) {
                Some(edge) => {
                    known += 1;
                    anchor = edge.position();
                    level = edge.children();
                }
                None => break,
            }
        }

        let fresh_tokens = &tokens[known..];
        let fresh_positions = if fresh_tokens.is_empty() {
            Vec::new()
        } else {
            self.rules.replay(anchor, fresh_tokens)?
        };

        let first_index = self.tree.reserve_indices(fresh_tokens.len());
        let chain = fresh_tokens
            .iter()
            .zip(fresh_positions)
            .enumerate()
            .rev()
            .fold(None, |below: Option<MoveEdge>, (offset, (token, position))| {
                let mut edge = MoveEdge::new(*token, position, opening, first_index + offset);
                if let Some(child) = below {
                    edge.children_mut().insert(child.token().to_string(), child);
                }
                Some(edge)
            });

        attach(self.tree.children_mut(), &tokens[..known], opening, chain);
        self.tree.record_game(tokens.len());

        Ok(fresh_tokens.len())
    }
}

/// Record a visit on every edge of `known`, then hang `chain` below the last one.
fn attach(
    level: &mut std::collections::BTreeMap<String, MoveEdge>,
    known: &[&str],
    opening: &str,
    chain: Option<MoveEdge>,
) {
    match known.split_first() {
        Some((token, rest)) => {
            if let Some(edge) = level.get_mut(*token) {
                edge.record_visit(opening);
                attach(edge.children_mut(), rest, opening, chain);
            }
        }
        None => {
            if let Some(edge) = chain {
                level.insert(edge.token().to_string(), edge);
            }
        }
    }
}

/// Query stored games and fold them into a fresh tree.
///
/// Games with moves the rules engine rejects are skipped with a warning.
pub async fn build_opening_tree<R: RulesEngine>(
    storage: &dyn Storage,
    rules: R,
    query: &GameQuery,
) -> StorageResult<(OpeningTree, BuildStats)> {
    let start = Instant::now();
    let games = storage.fetch_games(query).await?;
    info!(games = games.len(), "Building opening tree");

    let mut builder = TreeBuilder::new(rules);
    let mut stats = BuildStats::default();

    for (index, game) in games.iter().enumerate() {
        match builder.ingest(&game.move_tokens(), &game.opening) {
            Ok(_) => stats.ingested += 1,
            Err(e) => {
                warn!(game_id = game.id, error = %e, "Skipping game with unplayable moves");
                stats.skipped += 1;
            }
        }

        if (index + 1) % 10_000 == 0 {
            debug!(
                processed = index + 1,
                total = games.len(),
                nodes = builder.tree().node_count(),
                "Tree building progress"
            );
        }
    }

    let tree = builder.finish();
    info!(
        ingested = stats.ingested,
        skipped = stats.skipped,
        nodes = tree.node_count(),
        elapsed_ms = start.elapsed().as_millis(),
        "Opening tree built"
    );

    Ok((tree, stats))
}
