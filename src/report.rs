//! Plain-text rendering of analysis results.

use std::fmt::Write;
use std::time::Duration;

use crate::analysis::{BlunderRecord, OpeningCount, Perspective};

/// Wall-clock time spent in each phase of an analysis run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseTimings {
    /// Querying games and building the tree.
    pub tree: Duration,
    /// Walking the tree and classifying positions.
    pub traversal: Duration,
    /// Ranking openings.
    pub ranking: Duration,
}

fn rate_label(perspective: Perspective) -> &'static str {
    match perspective {
        Perspective::White => "Chance of reaching a +0.5 position as White",
        Perspective::Black => "Chance of reaching an equal or better position as Black",
        Perspective::None => "Chance of either side gaining a decisive swing",
    }
}

/// Render the top `top_n` blunder positions and the opening ranking.
pub fn render_report(
    perspective: Perspective,
    records: &[BlunderRecord],
    top_n: usize,
    openings: &[OpeningCount],
    timings: Option<&PhaseTimings>,
) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "Common blunder positions ({} perspective):", perspective);
    if records.is_empty() {
        let _ = writeln!(out, "  none found");
    }
    for (rank, record) in records.iter().take(top_n).enumerate() {
        let _ = writeln!(out, "{}. {}", rank + 1, record.position);
        let _ = writeln!(out, "   Reach weight: {:.5}%", record.reach_probability * 100.0);
        let _ = writeln!(
            out,
            "   {}: {:.2}% ({} of {} games)",
            rate_label(perspective),
            record.blunder_rate() * 100.0,
            record.blunder_count,
            record.reach_count
        );
        let _ = writeln!(out, "   Next moves:");
        for (token, count) in record.top_next_moves() {
            let _ = writeln!(out, "     {} - {}", token, count);
        }
        let openings: Vec<&str> = record.openings.iter().map(String::as_str).collect();
        let _ = writeln!(out, "   Openings: {}", openings.join(", "));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Openings leading to these positions:");
    if openings.is_empty() {
        let _ = writeln!(out, "  none found");
    }
    for (rank, entry) in openings.iter().enumerate() {
        let _ = writeln!(out, "{}. {} ({})", rank + 1, entry.opening, entry.positions);
    }

    if let Some(timings) = timings {
        let _ = writeln!(out);
        let _ = writeln!(out, "Tree built in {:.3}s", timings.tree.as_secs_f64());
        let _ = writeln!(out, "Blunder search took {:.3}s", timings.traversal.as_secs_f64());
        let _ = writeln!(out, "Opening ranking took {:.3}s", timings.ranking.as_secs_f64());
    }

    out
}
