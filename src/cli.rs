//! CLI commands: import game records and analyze them for common blunders.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Subcommand;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{error, info};

use crate::analysis::{
    find_common_blunders, rank_openings, BlunderReport, CacheStats, EvaluationCache, OpeningCount,
    Perspective, TraversalOptions,
};
use crate::config::{AnalysisConfig, Config};
use crate::engine::{ScoringEngine, UciEngine};
use crate::error::{AppResult, ImportError};
use crate::import::import_games;
use crate::report::{render_report, PhaseTimings};
use crate::rules::StandardChess;
use crate::storage::{GameQuery, Storage};
use crate::tree::{build_opening_tree, BuildStats};

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Find positions where opponents commonly blunder
    Analyze {
        /// Target rating
        #[arg(long)]
        elo: f64,

        /// Games within this many rating points of the target are used
        #[arg(long, default_value = "200")]
        elo_buffer: f64,

        /// Side to analyze for: white, black or none
        #[arg(long, default_value = "none")]
        perspective: Perspective,

        /// Only use games starting with these moves, e.g. "e4 e5"
        #[arg(long)]
        starting_moves: Option<String>,

        /// Number of positions to print
        #[arg(long, default_value = "10")]
        top: usize,

        /// First moves walked at once
        #[arg(long, default_value = "1")]
        concurrency: usize,
    },

    /// Import game records from JSON Lines
    Import {
        /// Input file; standard input when omitted
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

/// Result of CLI command execution.
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Parameters of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Target rating.
    pub elo: f64,
    /// Accepted distance from the target rating.
    pub elo_buffer: f64,
    /// Side being analyzed.
    pub perspective: Perspective,
    /// Optional move prefix filter.
    pub starting_moves: Option<String>,
    /// First moves walked at once.
    pub concurrency: usize,
}

/// Everything an analysis run produced.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// Games ingested and skipped while building the tree.
    pub build: BuildStats,
    /// Edges in the tree.
    pub node_count: usize,
    /// Blunder records and traversal counters.
    pub report: BlunderReport,
    /// Openings ranked by retained positions.
    pub openings: Vec<OpeningCount>,
    /// Cache counters at the end of the run.
    pub cache: CacheStats,
    /// Time spent per phase.
    pub timings: PhaseTimings,
}

/// Build the tree for `request`, search it and rank the openings.
pub async fn run_analysis(
    storage: Arc<dyn Storage>,
    engine: Arc<dyn ScoringEngine>,
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> AppResult<AnalysisOutcome> {
    let mut timings = PhaseTimings::default();

    let mut query = GameQuery::around(request.elo, request.elo_buffer)
        .with_max_plies(config.max_plies);
    if let Some(moves) = &request.starting_moves {
        query = query.with_starting_moves(moves.as_str());
    }

    let start = Instant::now();
    let (tree, build) = build_opening_tree(storage.as_ref(), StandardChess, &query).await?;
    timings.tree = start.elapsed();
    let node_count = tree.node_count();

    let start = Instant::now();
    let cache = Arc::new(EvaluationCache::load(engine, storage).await?);
    let options = TraversalOptions::new(request.perspective)
        .with_evaluation_depth(config.evaluation_depth)
        .with_rare_node_divisor(config.rare_node_divisor)
        .with_concurrency(request.concurrency);
    let report = find_common_blunders(Arc::new(tree), cache.clone(), &options).await?;
    timings.traversal = start.elapsed();

    let start = Instant::now();
    let openings = rank_openings(&report.records, config.top_k);
    timings.ranking = start.elapsed();

    let cache = cache.stats().await;
    info!(
        entries = cache.entries,
        hits = cache.hits,
        misses = cache.misses,
        "Evaluation cache summary"
    );

    Ok(AnalysisOutcome {
        build,
        node_count,
        report,
        openings,
        cache,
        timings,
    })
}

/// Execute a CLI command.
pub async fn execute_command(command: Commands, config: &Config, storage: Arc<dyn Storage>) -> CliResult {
    match command {
        Commands::Analyze {
            elo,
            elo_buffer,
            perspective,
            starting_moves,
            top,
            concurrency,
        } => {
            let request = AnalysisRequest {
                elo,
                elo_buffer,
                perspective,
                starting_moves,
                concurrency,
            };
            execute_analyze(&request, top, config, storage).await
        }
        Commands::Import { file } => execute_import(file, config, storage).await,
    }
}

async fn execute_analyze(
    request: &AnalysisRequest,
    top: usize,
    config: &Config,
    storage: Arc<dyn Storage>,
) -> CliResult {
    let engine = Arc::new(UciEngine::new(config.engine.clone()));
    let result = run_analysis(storage, engine.clone(), request, &config.analysis).await;
    engine.shutdown().await;

    match result {
        Ok(outcome) => {
            if outcome.build.ingested == 0 {
                return CliResult::success(format!(
                    "No games found within {} of {}",
                    request.elo_buffer, request.elo
                ));
            }
            CliResult::success(render_report(
                request.perspective,
                &outcome.report.records,
                top,
                &outcome.openings,
                Some(&outcome.timings),
            ))
        }
        Err(e) => {
            error!(error = %e, "Analysis failed");
            CliResult::error(format!("Analysis failed: {}", e))
        }
    }
}

async fn execute_import(file: Option<PathBuf>, config: &Config, storage: Arc<dyn Storage>) -> CliResult {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &file {
        Some(path) => match tokio::fs::File::open(path).await {
            Ok(f) => Box::new(BufReader::new(f)),
            Err(e) => {
                let e = ImportError::Read(e);
                error!(path = %path.display(), error = %e, "Failed to open import file");
                return CliResult::error(format!("Cannot open {}: {}", path.display(), e));
            }
        },
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    match import_games(reader, storage.as_ref(), config.analysis.max_plies).await {
        Ok(stats) => CliResult::success(format!(
            "Imported {} games ({} skipped)",
            stats.imported, stats.skipped
        )),
        Err(e) => {
            error!(error = %e, "Import failed");
            CliResult::error(format!("Import failed: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_result_codes() {
        let ok = CliResult::success("done");
        assert_eq!(ok.exit_code, 0);
        assert_eq!(ok.message, "done");

        let err = CliResult::error("failed");
        assert_eq!(err.exit_code, 1);
    }
}
