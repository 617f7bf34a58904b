use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::engine::{RawScore, ScoreKind, ScoringEngine};
use crate::error::{EvaluationError, StorageResult};
use crate::storage::Storage;

/// Normalized value of a forced mate.
pub const MATE_VALUE: f64 = 5.0;

/// Convert a raw engine score to pawns from White's point of view.
///
/// Centipawns are scaled by 0.01 and rounded to two decimals; mates collapse
/// to [`MATE_VALUE`] with the sign of the score.
pub fn normalize_score(score: RawScore) -> f64 {
    match score.kind {
        ScoreKind::Centipawn => (score.value as f64 * 0.01 * 100.0).round() / 100.0,
        ScoreKind::Mate if score.value < 0 => -MATE_VALUE,
        ScoreKind::Mate => MATE_VALUE,
    }
}

/// Counters for logging cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Positions with a known evaluation.
    pub entries: usize,
    /// Lookups answered without waiting on the engine.
    pub hits: u64,
    /// Engine evaluations performed.
    pub misses: u64,
}

/// Memoized position evaluations backed by the evaluation store.
///
/// Each position is evaluated by the engine at most once. Concurrent lookups
/// of the same uncached position share a single engine request.
pub struct EvaluationCache {
    engine: Arc<dyn ScoringEngine>,
    storage: Arc<dyn Storage>,
    entries: Mutex<HashMap<String, Arc<OnceCell<f64>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EvaluationCache {
    /// Build a cache primed with every stored evaluation.
    pub async fn load(engine: Arc<dyn ScoringEngine>, storage: Arc<dyn Storage>) -> StorageResult<Self> {
        let stored = storage.load_evaluations().await?;
        info!(entries = stored.len(), "Loaded stored evaluations");

        let entries = stored
            .into_iter()
            .map(|(position, value)| (position, Arc::new(OnceCell::new_with(Some(value)))))
            .collect();

        Ok(Self {
            engine,
            storage,
            entries: Mutex::new(entries),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Normalized evaluation of `position`.
    ///
    /// A failed engine request leaves the position uncached, so a later call
    /// asks the engine again.
    pub async fn get(&self, position: &str) -> Result<f64, EvaluationError> {
        let cell = {
            let mut entries = self.entries.lock().await;
            entries.entry(position.to_string()).or_default().clone()
        };

        if let Some(value) = cell.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(*value);
        }

        let value = cell
            .get_or_try_init(|| self.evaluate_and_store(position))
            .await?;
        Ok(*value)
    }

    /// Snapshot of the counters.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        CacheStats {
            entries: entries.values().filter(|cell| cell.initialized()).count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    async fn evaluate_and_store(&self, position: &str) -> Result<f64, EvaluationError> {
        let raw = self
            .engine
            .evaluate(position)
            .await
            .map_err(|source| EvaluationError::EngineUnavailable {
                position: position.to_string(),
                source,
            })?;

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = normalize_score(raw);

        // The value stays cached for this run even if it cannot be persisted.
        if let Err(e) = self.storage.insert_evaluation(position, value).await {
            warn!(position = %position, error = %e, "Failed to persist evaluation");
        }

        debug!(position = %position, evaluation = value, "Position evaluated");
        Ok(value)
    }
}
