//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Config::from_env() also loads a .env file
//! via dotenvy, so these tests focus on override behavior.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use opening_blunders::config::{Config, LogFormat};
use serial_test::serial;
use std::env;

#[test]
#[serial]
fn test_config_from_env_loads_successfully() {
    let config = Config::from_env().unwrap();
    assert!(!config.engine.path.is_empty());
    assert!(config.engine.depth > 0);
    assert!(config.analysis.rare_node_divisor > 0.0);
}

#[test]
#[serial]
fn test_config_from_env_custom_database() {
    env::set_var("DATABASE_PATH", "/custom/openings.db");
    env::set_var("DATABASE_MAX_CONNECTIONS", "10");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.path.to_str().unwrap(), "/custom/openings.db");
    assert_eq!(config.database.max_connections, 10);

    env::remove_var("DATABASE_PATH");
    env::remove_var("DATABASE_MAX_CONNECTIONS");
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    env::set_var("LOG_FORMAT", "JSON");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    env::remove_var("LOG_FORMAT");
}

#[test]
#[serial]
fn test_config_from_env_engine_overrides() {
    env::set_var("ENGINE_PATH", "/usr/local/bin/stockfish");
    env::set_var("ENGINE_ARGS", "--quiet  --nnue");
    env::set_var("ENGINE_DEPTH", "14");
    env::set_var("ENGINE_TIMEOUT_MS", "5000");

    let config = Config::from_env().unwrap();
    assert_eq!(config.engine.path, "/usr/local/bin/stockfish");
    assert_eq!(config.engine.args, vec!["--quiet", "--nnue"]);
    assert_eq!(config.engine.depth, 14);
    assert_eq!(config.engine.timeout_ms, 5000);

    env::remove_var("ENGINE_PATH");
    env::remove_var("ENGINE_ARGS");
    env::remove_var("ENGINE_DEPTH");
    env::remove_var("ENGINE_TIMEOUT_MS");
}

#[test]
#[serial]
fn test_config_from_env_analysis_overrides() {
    env::set_var("ANALYSIS_MAX_PLIES", "30");
    env::set_var("ANALYSIS_EVALUATION_DEPTH", "6");
    env::set_var("ANALYSIS_RARE_NODE_DIVISOR", "50000");
    env::set_var("ANALYSIS_TOP_K", "5");

    let config = Config::from_env().unwrap();
    assert_eq!(config.analysis.max_plies, 30);
    assert_eq!(config.analysis.evaluation_depth, 6);
    assert_eq!(config.analysis.rare_node_divisor, 50_000.0);
    assert_eq!(config.analysis.top_k, 5);

    env::remove_var("ANALYSIS_MAX_PLIES");
    env::remove_var("ANALYSIS_EVALUATION_DEPTH");
    env::remove_var("ANALYSIS_RARE_NODE_DIVISOR");
    env::remove_var("ANALYSIS_TOP_K");
}

#[test]
#[serial]
fn test_config_from_env_invalid_number_uses_default() {
    env::set_var("ENGINE_THREADS", "many");

    let config = Config::from_env().unwrap();
    assert_eq!(config.engine.threads, 2);

    env::remove_var("ENGINE_THREADS");
}

#[test]
#[serial]
fn test_config_from_env_zero_depth_rejected() {
    env::set_var("ENGINE_DEPTH", "0");

    let result = Config::from_env();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("ENGINE_DEPTH"));

    env::remove_var("ENGINE_DEPTH");
}

#[test]
#[serial]
fn test_config_from_env_nonpositive_divisor_rejected() {
    env::set_var("ANALYSIS_RARE_NODE_DIVISOR", "-1");

    let result = Config::from_env();
    assert!(result.is_err());

    env::remove_var("ANALYSIS_RARE_NODE_DIVISOR");
}
