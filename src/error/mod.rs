use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Scoring engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to start engine {path}: {message}")]
    Spawn { path: String, message: String },

    #[error("Engine request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Engine protocol error: {message}")]
    Protocol { message: String },

    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Chess rules errors raised while replaying moves
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("Invalid position '{position}': {message}")]
    InvalidPosition { position: String, message: String },

    #[error("Illegal move '{token}' in position '{position}'")]
    IllegalMove { position: String, token: String },
}

/// Position evaluation errors
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Scoring engine unavailable for '{position}': {source}")]
    EngineUnavailable {
        position: String,
        #[source]
        source: EngineError,
    },
}

/// Game import errors
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to read input: {0}")]
    Read(#[from] std::io::Error),

    #[error("Line {line}: malformed record: {message}")]
    Malformed { line: usize, message: String },

    #[error("Line {line}: unparsable elo '{value}'")]
    InvalidElo { line: usize, value: String },

    #[error("Line {line}: record has no moves")]
    EmptyMoves { line: usize },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for scoring engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type alias for rules engine operations
pub type RulesResult<T> = Result<T, RulesError>;
