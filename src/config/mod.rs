use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
    pub analysis: AnalysisConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// UCI scoring engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub path: String,
    /// Extra command-line arguments for the engine executable.
    pub args: Vec<String>,
    pub depth: u32,
    pub threads: u32,
    pub hash_mb: u32,
    pub timeout_ms: u64,
}

/// Tree building and traversal configuration
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Half-moves kept from every game record.
    pub max_plies: usize,
    /// Plies walked structurally before classification starts.
    pub evaluation_depth: u32,
    /// Rare-line threshold is `max(total_nodes / divisor, 1)`.
    pub rare_node_divisor: f64,
    pub top_k: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/openings.db".to_string()),
            ),
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let engine = EngineConfig {
            path: env::var("ENGINE_PATH").unwrap_or_else(|_| "stockfish".to_string()),
            args: env::var("ENGINE_ARGS")
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            depth: parse_env("ENGINE_DEPTH", 20),
            threads: parse_env("ENGINE_THREADS", 2),
            hash_mb: parse_env("ENGINE_HASH_MB", 16),
            timeout_ms: parse_env("ENGINE_TIMEOUT_MS", 30000),
        };

        if engine.depth == 0 {
            return Err(AppError::Config {
                message: "ENGINE_DEPTH must be greater than zero".to_string(),
            });
        }
        if engine.path.trim().is_empty() {
            return Err(AppError::Config {
                message: "ENGINE_PATH cannot be empty".to_string(),
            });
        }

        let analysis = AnalysisConfig {
            max_plies: parse_env("ANALYSIS_MAX_PLIES", 40),
            evaluation_depth: parse_env("ANALYSIS_EVALUATION_DEPTH", 8),
            rare_node_divisor: parse_env("ANALYSIS_RARE_NODE_DIVISOR", 100_000.0),
            top_k: parse_env("ANALYSIS_TOP_K", 10),
        };

        if analysis.rare_node_divisor <= 0.0 {
            return Err(AppError::Config {
                message: "ANALYSIS_RARE_NODE_DIVISOR must be positive".to_string(),
            });
        }

        Ok(Config {
            database,
            logging,
            engine,
            analysis,
        })
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: "stockfish".to_string(),
            args: Vec::new(),
            depth: 20,
            threads: 2,
            hash_mb: 16,
            timeout_ms: 30000,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_plies: 40,
            evaluation_depth: 8,
            rare_node_divisor: 100_000.0,
            top_k: 10,
        }
    }
}
