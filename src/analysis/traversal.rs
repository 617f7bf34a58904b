use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{is_blunder, EvaluationCache, TraversalOptions};
use crate::error::{AppError, AppResult, EvaluationError};
use crate::tree::{MoveEdge, OpeningTree};

/// Blunder statistics for one resulting position, summed over every path
/// that reaches it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlunderRecord {
    /// FEN of the position.
    pub position: String,
    /// Relative likelihood of reaching the position. Summed across
    /// transpositions, so it may exceed 1.0.
    pub reach_probability: f64,
    /// Games that continued with a blunder.
    pub blunder_count: u64,
    /// Games that reached the position.
    pub reach_count: u64,
    /// Continuations and how often each was played.
    pub next_moves: BTreeMap<String, u64>,
    /// Openings of the games that reached the position.
    pub openings: BTreeSet<String>,
}

impl BlunderRecord {
    /// Share of games that continued with a blunder.
    pub fn blunder_rate(&self) -> f64 {
        if self.reach_count == 0 {
            0.0
        } else {
            self.blunder_count as f64 / self.reach_count as f64
        }
    }

    /// Continuations ordered by count descending, then by move.
    pub fn top_next_moves(&self) -> Vec<(&str, u64)> {
        let mut moves: Vec<(&str, u64)> = self
            .next_moves
            .iter()
            .map(|(token, count)| (token.as_str(), *count))
            .collect();
        moves.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        moves
    }

    fn absorb(&mut self, other: BlunderRecord) {
        self.reach_probability += other.reach_probability;
        self.blunder_count += other.blunder_count;
        self.reach_count += other.reach_count;
        for (token, count) in other.next_moves {
            *self.next_moves.entry(token).or_insert(0) += count;
        }
        self.openings.extend(other.openings);
    }
}

/// Blunder records keyed by position, kept in first-visit order.
#[derive(Debug, Clone, Default)]
pub struct BlunderTable {
    records: Vec<BlunderRecord>,
    index: HashMap<String, usize>,
}

impl BlunderTable {
    /// Add a record, merging it into an existing one for the same position.
    pub fn insert(&mut self, record: BlunderRecord) {
        match self.index.get(&record.position) {
            Some(&slot) => self.records[slot].absorb(record),
            None => {
                self.index.insert(record.position.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Fold `other` into this table after this table's own visits.
    pub fn merge(&mut self, other: BlunderTable) {
        for record in other.records {
            self.insert(record);
        }
    }

    /// Record for `position`, if any.
    pub fn get(&self, position: &str) -> Option<&BlunderRecord> {
        self.index.get(position).map(|&slot| &self.records[slot])
    }

    /// Number of distinct positions.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing was classified.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keep records with a blunder rate above one half, highest rate first.
    /// Records with equal rates keep their first-visit order.
    pub fn finalize(self) -> Vec<BlunderRecord> {
        let mut records: Vec<BlunderRecord> = self
            .records
            .into_iter()
            .filter(|r| r.blunder_rate() > 0.5)
            .collect();
        records.sort_by(|a, b| b.blunder_rate().total_cmp(&a.blunder_rate()));
        records
    }
}

/// Result of [`find_common_blunders`].
#[derive(Debug, Clone, Default)]
pub struct BlunderReport {
    /// Retained records, highest blunder rate first.
    pub records: Vec<BlunderRecord>,
    /// Distinct positions classified before filtering.
    pub candidates: usize,
    /// Edges classified.
    pub classified: usize,
    /// Edges skipped with their subtree as too rare.
    pub pruned: usize,
    /// Edges left unclassified because the engine was unavailable.
    pub skipped_evaluations: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct WalkStats {
    classified: usize,
    pruned: usize,
    skipped_evaluations: usize,
}

impl WalkStats {
    fn add(&mut self, other: WalkStats) {
        self.classified += other.classified;
        self.pruned += other.pruned;
        self.skipped_evaluations += other.skipped_evaluations;
    }
}

struct Frame<'a> {
    edge: &'a MoveEdge,
    depth: u32,
    sibling_total: u64,
    parent_probability: f64,
}

/// Walk `tree` and collect positions that commonly precede a blunder.
///
/// Every edge deeper than the evaluation depth that has continuations and is
/// not rare is classified: its continuations are scored and the games that
/// played a blunder are counted. Records are merged by resulting position so
/// transpositions accumulate. Rare edges are skipped together with their
/// whole subtree.
///
/// With `concurrency > 1` the first moves are walked as separate tasks and
/// their tables merged in move order, which gives the same records as a
/// sequential walk.
pub async fn find_common_blunders(
    tree: Arc<OpeningTree>,
    cache: Arc<EvaluationCache>,
    options: &TraversalOptions,
) -> AppResult<BlunderReport> {
    let start = Instant::now();
    let threshold = options.rare_threshold(tree.plies_ingested());
    info!(
        perspective = %options.perspective,
        nodes = tree.node_count(),
        plies = tree.plies_ingested(),
        threshold,
        concurrency = options.concurrency,
        "Searching opening tree for blunders"
    );

    let (table, stats) = if options.concurrency > 1 && tree.children().len() > 1 {
        walk_concurrently(tree.clone(), cache, options).await?
    } else {
        let roots: Vec<&MoveEdge> = tree.children().values().collect();
        walk(&roots, tree.children_total(), &tree, &cache, options).await
    };

    let candidates = table.len();
    let records = table.finalize();

    info!(
        candidates,
        retained = records.len(),
        classified = stats.classified,
        pruned = stats.pruned,
        skipped_evaluations = stats.skipped_evaluations,
        elapsed_ms = start.elapsed().as_millis(),
        "Blunder search complete"
    );

    Ok(BlunderReport {
        records,
        candidates,
        classified: stats.classified,
        pruned: stats.pruned,
        skipped_evaluations: stats.skipped_evaluations,
    })
}

async fn walk_concurrently(
    tree: Arc<OpeningTree>,
    cache: Arc<EvaluationCache>,
    options: &TraversalOptions,
) -> AppResult<(BlunderTable, WalkStats)> {
    let permits = Arc::new(Semaphore::new(options.concurrency));
    let root_total = tree.children_total();
    let mut tasks = JoinSet::new();

    for (slot, token) in tree.children().keys().cloned().enumerate() {
        let tree = tree.clone();
        let cache = cache.clone();
        let options = options.clone();
        let permits = permits.clone();

        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let roots: Vec<&MoveEdge> = tree.children().get(&token).into_iter().collect();
            let result = walk(&roots, root_total, &tree, &cache, &options).await;
            (slot, result)
        });
    }

    let mut shards: Vec<Option<(BlunderTable, WalkStats)>> = vec![None; tree.children().len()];
    while let Some(joined) = tasks.join_next().await {
        let (slot, shard) = joined.map_err(|e| AppError::Internal {
            message: format!("traversal task failed: {}", e),
        })?;
        shards[slot] = Some(shard);
    }

    let mut table = BlunderTable::default();
    let mut stats = WalkStats::default();
    for (shard_table, shard_stats) in shards.into_iter().flatten() {
        table.merge(shard_table);
        stats.add(shard_stats);
    }
    Ok((table, stats))
}

/// Depth-first walk over `roots` and everything below them, in the same
/// pre-order a recursive walk would use.
async fn walk(
    roots: &[&MoveEdge],
    root_total: u64,
    tree: &OpeningTree,
    cache: &EvaluationCache,
    options: &TraversalOptions,
) -> (BlunderTable, WalkStats) {
    let threshold = options.rare_threshold(tree.plies_ingested());
    let mut table = BlunderTable::default();
    let mut stats = WalkStats::default();

    let mut stack: Vec<Frame<'_>> = roots
        .iter()
        .rev()
        .map(|edge| Frame {
            edge,
            depth: 1,
            sibling_total: root_total,
            parent_probability: 1.0,
        })
        .collect();

    while let Some(frame) = stack.pop() {
        let edge = frame.edge;

        if edge.sequence_index() % 10_000 == 0 {
            debug!(
                node = edge.sequence_index(),
                total = tree.node_count(),
                "Traversal progress"
            );
        }

        if edge.is_leaf() {
            continue;
        }
        if edge.count() as f64 <= threshold {
            stats.pruned += 1;
            continue;
        }

        let probability = if options.perspective.chooses(frame.depth) {
            frame.parent_probability
        } else {
            frame.parent_probability * edge.count() as f64 / frame.sibling_total as f64
        };

        if frame.depth > options.evaluation_depth {
            match classify(edge, probability, cache, options).await {
                Ok(record) => {
                    stats.classified += 1;
                    table.insert(record);
                }
                Err(e) => {
                    warn!(position = %edge.position(), error = %e, "Skipping position without evaluation");
                    stats.skipped_evaluations += 1;
                }
            }
        }

        let children_total = edge.children_total();
        for child in edge.children().values().rev() {
            stack.push(Frame {
                edge: child,
                depth: frame.depth + 1,
                sibling_total: children_total,
                parent_probability: probability,
            });
        }
    }

    (table, stats)
}

/// Score `edge` and each continuation, counting games that blundered.
async fn classify(
    edge: &MoveEdge,
    probability: f64,
    cache: &EvaluationCache,
    options: &TraversalOptions,
) -> Result<BlunderRecord, EvaluationError> {
    let current = cache.get(edge.position()).await?;

    let mut blunder_count = 0;
    let mut next_moves = BTreeMap::new();
    for (token, child) in edge.children() {
        let next = cache.get(child.position()).await?;
        if is_blunder(options.perspective, current, next) {
            blunder_count += child.count();
        }
        next_moves.insert(token.clone(), child.count());
    }

    Ok(BlunderRecord {
        position: edge.position().to_string(),
        reach_probability: probability,
        blunder_count,
        reach_count: edge.count(),
        next_moves,
        openings: edge.openings().clone(),
    })
}
