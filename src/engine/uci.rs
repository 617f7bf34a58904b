use async_trait::async_trait;
use std::collections::HashSet;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{RawScore, ScoreKind, ScoringEngine};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Client for an external UCI engine process.
///
/// The process is started on the first request and reused afterwards.
/// Requests are serialized; each one is bounded by the configured timeout,
/// and any failure discards the process so the next request starts afresh.
pub struct UciEngine {
    config: EngineConfig,
    process: Mutex<Option<UciProcess>>,
}

impl UciEngine {
    /// Create a client; no process is started yet.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            process: Mutex::new(None),
        }
    }

    /// Ask a running engine to quit, killing it if it does not exit promptly.
    pub async fn shutdown(&self) {
        let Some(mut process) = self.process.lock().await.take() else {
            return;
        };

        let _ = process.send("quit").await;
        match tokio::time::timeout(Duration::from_millis(300), process.child.wait()).await {
            Ok(_) => debug!("Engine exited"),
            Err(_) => {
                warn!("Engine did not exit after quit, killing");
                let _ = process.child.kill().await;
            }
        }
    }

    async fn run(slot: &mut Option<UciProcess>, config: &EngineConfig, position: &str) -> EngineResult<RawScore> {
        let mut process = match slot.take() {
            Some(process) => process,
            None => UciProcess::spawn(config).await?,
        };

        let score = process.search(position, config.depth).await?;
        *slot = Some(process);
        Ok(score)
    }
}

#[async_trait]
impl ScoringEngine for UciEngine {
    async fn evaluate(&self, position: &str) -> EngineResult<RawScore> {
        let mut slot = self.process.lock().await;
        let start = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_millis(self.config.timeout_ms),
            Self::run(&mut slot, &self.config, position),
        )
        .await
        .unwrap_or(Err(EngineError::Timeout {
            timeout_ms: self.config.timeout_ms,
        }));

        match &result {
            Ok(score) => debug!(
                position = %position,
                kind = ?score.kind,
                value = score.value,
                latency_ms = start.elapsed().as_millis(),
                "Engine evaluation succeeded"
            ),
            Err(e) => warn!(
                position = %position,
                error = %e,
                latency_ms = start.elapsed().as_millis(),
                "Engine evaluation failed"
            ),
        }

        result
    }
}

/// A running engine process and its pipes.
struct UciProcess {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

impl UciProcess {
    async fn spawn(config: &EngineConfig) -> EngineResult<Self> {
        let mut child = Command::new(&config.path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn {
                path: config.path.clone(),
                message: e.to_string(),
            })?;

        let missing_pipe = || EngineError::Spawn {
            path: config.path.clone(),
            message: "engine pipes were not captured".to_string(),
        };
        let stdin = child.stdin.take().ok_or_else(missing_pipe)?;
        let stdout = child.stdout.take().ok_or_else(missing_pipe)?;

        let mut process = Self {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
        };

        process.send("uci").await?;
        let mut options = HashSet::new();
        let mut name = None;
        loop {
            let line = process.read_line().await?;
            if let Some(rest) = line.strip_prefix("id name ") {
                name = Some(rest.to_string());
            } else if let Some(option) = parse_option_name(&line) {
                options.insert(option);
            } else if line == "uciok" {
                break;
            }
        }

        let threads = config.threads.to_string();
        let hash = config.hash_mb.to_string();
        for (option, value) in [("Threads", threads.as_str()), ("Hash", hash.as_str()), ("MultiPV", "1")] {
            if options.contains(option) {
                process
                    .send(&format!("setoption name {} value {}", option, value))
                    .await?;
            }
        }

        process.sync_ready().await?;
        process.send("ucinewgame").await?;
        process.sync_ready().await?;

        info!(
            path = %config.path,
            engine = name.as_deref().unwrap_or("unknown"),
            depth = config.depth,
            "UCI engine started"
        );

        Ok(process)
    }

    async fn send(&mut self, line: &str) -> EngineResult<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> EngineResult<String> {
        match self.lines.next_line().await? {
            Some(line) => Ok(line.trim().to_string()),
            None => Err(EngineError::Protocol {
                message: "engine closed its output".to_string(),
            }),
        }
    }

    async fn sync_ready(&mut self) -> EngineResult<()> {
        self.send("isready").await?;
        while self.read_line().await? != "readyok" {}
        Ok(())
    }

    async fn search(&mut self, position: &str, depth: u32) -> EngineResult<RawScore> {
        self.send(&format!("position fen {}", position)).await?;
        self.send(&format!("go depth {}", depth)).await?;

        let mut last = None;
        loop {
            let line = self.read_line().await?;
            if line.starts_with("bestmove") {
                break;
            }
            if let Some(score) = parse_info_score(&line) {
                last = Some(score);
            }
        }

        let score = last.ok_or_else(|| EngineError::Protocol {
            message: format!("no score reported for '{}'", position),
        })?;

        Ok(to_white_point_of_view(score, black_to_move(position)))
    }
}

/// Extract the option name from an `option name <name> type ...` line.
fn parse_option_name(line: &str) -> Option<String> {
    let rest = line.strip_prefix("option ")?;
    let mut tokens = rest.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "name" {
            let name: Vec<&str> = tokens.by_ref().take_while(|t| *t != "type").collect();
            if !name.is_empty() {
                return Some(name.join(" "));
            }
        }
    }
    None
}

/// Extract the score from an `info` line, relative to the side to move.
fn parse_info_score(line: &str) -> Option<RawScore> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "info" {
        return None;
    }

    while let Some(token) = tokens.next() {
        match token {
            "score" => {
                let kind = match tokens.next()? {
                    "cp" => ScoreKind::Centipawn,
                    "mate" => ScoreKind::Mate,
                    _ => return None,
                };
                let value = tokens.next()?.parse().ok()?;
                return Some(RawScore { kind, value });
            }
            // Everything after these is free text or a move list.
            "pv" | "string" => return None,
            _ => {}
        }
    }
    None
}

fn black_to_move(position: &str) -> bool {
    position.split_whitespace().nth(1) == Some("b")
}

/// Convert a side-to-move score to White's point of view.
///
/// `mate 0` means the side to move is already mated.
fn to_white_point_of_view(score: RawScore, black_to_move: bool) -> RawScore {
    let value = match score.kind {
        ScoreKind::Mate if score.value == 0 => -1,
        _ => score.value,
    };
    RawScore {
        kind: score.kind,
        value: if black_to_move { -value } else { value },
    }
}
