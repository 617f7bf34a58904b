use std::collections::HashMap;

use serde::Serialize;

use super::BlunderRecord;

/// An opening and the number of retained blunder positions it reaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpeningCount {
    /// Opening name.
    pub opening: String,
    /// Retained positions reached from this opening.
    pub positions: usize,
}

/// Rank openings by how many of `records` they lead to, keeping the top `top_k`.
///
/// Ties are broken by opening name.
pub fn rank_openings(records: &[BlunderRecord], top_k: usize) -> Vec<OpeningCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        for opening in &record.openings {
            *counts.entry(opening.as_str()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<OpeningCount> = counts
        .into_iter()
        .map(|(opening, positions)| OpeningCount {
            opening: opening.to_string(),
            positions,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.positions
            .cmp(&a.positions)
            .then_with(|| a.opening.cmp(&b.opening))
    });
    ranked.truncate(top_k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn record(position: &str, openings: &[&str]) -> BlunderRecord {
        BlunderRecord {
            position: position.to_string(),
            reach_probability: 1.0,
            blunder_count: 1,
            reach_count: 1,
            next_moves: BTreeMap::new(),
            openings: openings.iter().map(|o| o.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn test_counts_positions_per_opening() {
        let records = vec![
            record("a", &["Sicilian", "French"]),
            record("b", &["Sicilian"]),
            record("c", &["Caro-Kann", "Sicilian"]),
        ];

        let ranked = rank_openings(&records, 10);
        assert_eq!(
            ranked,
            vec![
                OpeningCount { opening: "Sicilian".to_string(), positions: 3 },
                OpeningCount { opening: "Caro-Kann".to_string(), positions: 1 },
                OpeningCount { opening: "French".to_string(), positions: 1 },
            ]
        );
    }

    #[test]
    fn test_truncates_to_top_k() {
        let records = vec![record("a", &["B", "A", "C"]), record("b", &["C"])];
        let ranked = rank_openings(&records, 2);
        let names: Vec<&str> = ranked.iter().map(|r| r.opening.as_str()).collect();
        assert_eq!(names, vec!["C", "A"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(rank_openings(&[], 10).is_empty());
    }
}
