//! Opening tree: a trie of move sequences with per-node frequency and
//! opening attribution.
//!
//! - [`MoveEdge`]: one half-move transition from a parent position
//! - [`OpeningTree`]: the root mapping of first moves, plus the node and ply counters
//! - [`TreeBuilder`]: folds game records into a tree

mod builder;

pub use builder::*;

use std::collections::{BTreeMap, BTreeSet};

/// One half-move transition from a parent position.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveEdge {
    token: String,
    count: u64,
    position: String,
    openings: BTreeSet<String>,
    children: BTreeMap<String, MoveEdge>,
    sequence_index: usize,
}

impl MoveEdge {
    pub(crate) fn new(
        token: impl Into<String>,
        position: impl Into<String>,
        opening: impl Into<String>,
        sequence_index: usize,
    ) -> Self {
        let mut openings = BTreeSet::new();
        openings.insert(opening.into());
        Self {
            token: token.into(),
            count: 1,
            position: position.into(),
            openings,
            children: BTreeMap::new(),
            sequence_index,
        }
    }

    /// The SAN token of this move.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Number of ingested games passing through this exact prefix.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Position identifier after this move.
    pub fn position(&self) -> &str {
        &self.position
    }

    /// Openings of the games that passed through this edge.
    pub fn openings(&self) -> &BTreeSet<String> {
        &self.openings
    }

    /// Continuations keyed by move token.
    pub fn children(&self) -> &BTreeMap<String, MoveEdge> {
        &self.children
    }

    /// Creation order within the tree; only meaningful for progress reporting.
    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    /// True when no game continued past this move.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Sum of the children's counts.
    pub fn children_total(&self) -> u64 {
        self.children.values().map(|c| c.count).sum()
    }

    /// Follow a path of move tokens below this edge.
    pub fn descendant(&self, path: &[&str]) -> Option<&MoveEdge> {
        path.iter()
            .try_fold(self, |edge, token| edge.children.get(*token))
    }

    pub(crate) fn record_visit(&mut self, opening: &str) {
        self.count += 1;
        if !self.openings.contains(opening) {
            self.openings.insert(opening.to_string());
        }
    }

    pub(crate) fn children_mut(&mut self) -> &mut BTreeMap<String, MoveEdge> {
        &mut self.children
    }

    #[cfg(test)]
    pub(crate) fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_child(mut self, child: MoveEdge) -> Self {
        self.children.insert(child.token.clone(), child);
        self
    }

    #[cfg(test)]
    fn subtree_visits(&self) -> usize {
        self.count as usize + self.children.values().map(MoveEdge::subtree_visits).sum::<usize>()
    }

    fn renumber(&mut self, next_index: &mut usize) {
        self.sequence_index = *next_index;
        *next_index += 1;
        for child in self.children.values_mut() {
            child.renumber(next_index);
        }
    }
}

/// Trie of move sequences rooted at a starting position.
#[derive(Debug, Clone, PartialEq)]
pub struct OpeningTree {
    root_position: String,
    children: BTreeMap<String, MoveEdge>,
    node_count: usize,
    plies: usize,
    games: usize,
}

impl OpeningTree {
    /// Create an empty tree rooted at `root_position`.
    pub fn new(root_position: impl Into<String>) -> Self {
        Self {
            root_position: root_position.into(),
            children: BTreeMap::new(),
            node_count: 0,
            plies: 0,
            games: 0,
        }
    }

    /// Position every path starts from.
    pub fn root_position(&self) -> &str {
        &self.root_position
    }

    /// First moves keyed by token.
    pub fn children(&self) -> &BTreeMap<String, MoveEdge> {
        &self.children
    }

    /// Total number of edges in the tree.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Moves ingested across all games, counting a shared prefix once per
    /// game that plays it. Equals the sum of every edge's count.
    pub fn plies_ingested(&self) -> usize {
        self.plies
    }

    /// Number of games folded into the tree.
    pub fn games(&self) -> usize {
        self.games
    }

    /// Sum of the first moves' counts.
    pub fn children_total(&self) -> u64 {
        self.children.values().map(|c| c.count).sum()
    }

    /// True when nothing has been ingested.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Follow a path of move tokens from the root.
    pub fn get(&self, path: &[&str]) -> Option<&MoveEdge> {
        let (first, rest) = path.split_first()?;
        self.children.get(*first)?.descendant(rest)
    }

    /// Fold an independently built tree into this one.
    ///
    /// Counts are summed and openings unioned along shared prefixes; edges
    /// new to this tree are numbered after the existing ones. Both trees must
    /// have been built with the same rules engine from the same root.
    pub fn merge(&mut self, other: OpeningTree) {
        debug_assert_eq!(self.root_position, other.root_position);
        let mut next_index = self.node_count;
        merge_children(&mut self.children, other.children, &mut next_index);
        self.node_count = next_index;
        self.plies += other.plies;
        self.games += other.games;
    }

    pub(crate) fn children_mut(&mut self) -> &mut BTreeMap<String, MoveEdge> {
        &mut self.children
    }

    #[cfg(test)]
    pub(crate) fn from_edges(root_position: &str, edges: Vec<MoveEdge>) -> Self {
        let mut tree = Self::new(root_position);
        let mut next_index = 0;
        for mut edge in edges {
            edge.renumber(&mut next_index);
            tree.children.insert(edge.token.clone(), edge);
        }
        tree.node_count = next_index;
        tree.plies = tree.children.values().map(MoveEdge::subtree_visits).sum();
        tree
    }

    /// Reserve `count` consecutive sequence indices, returning the first.
    pub(crate) fn reserve_indices(&mut self, count: usize) -> usize {
        let first = self.node_count;
        self.node_count += count;
        first
    }

    pub(crate) fn record_game(&mut self, plies: usize) {
        self.plies += plies;
        self.games += 1;
    }
}

fn merge_children(
    into: &mut BTreeMap<String, MoveEdge>,
    from: BTreeMap<String, MoveEdge>,
    next_index: &mut usize,
) {
    for (token, mut incoming) in from {
        match into.get_mut(&token) {
            Some(existing) => {
                debug_assert_eq!(existing.position, incoming.position);
                existing.count += incoming.count;
                existing.openings.append(&mut incoming.openings);
                merge_children(&mut existing.children, incoming.children, next_index);
            }
            None => {
                incoming.renumber(next_index);
                into.insert(token, incoming);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(token: &str, count: u64) -> MoveEdge {
        let mut e = MoveEdge::new(token, format!("pos-{}", token), "Test", 0);
        e.count = count;
        e
    }

    #[test]
    fn test_new_edge_starts_with_one_visit() {
        let e = MoveEdge::new("e4", "fen", "King's Pawn", 3);
        assert_eq!(e.count(), 1);
        assert_eq!(e.sequence_index(), 3);
        assert!(e.is_leaf());
        assert!(e.openings().contains("King's Pawn"));
    }

    #[test]
    fn test_record_visit_does_not_duplicate_openings() {
        let mut e = MoveEdge::new("e4", "fen", "Sicilian", 0);
        e.record_visit("Sicilian");
        e.record_visit("French");
        assert_eq!(e.count(), 3);
        assert_eq!(e.openings().len(), 2);
    }

    #[test]
    fn test_children_total_and_descendant() {
        let mut root = edge("e4", 5);
        root.children_mut().insert("e5".into(), edge("e5", 3));
        root.children_mut().insert("c5".into(), edge("c5", 2));
        root.children
            .get_mut("c5")
            .unwrap()
            .children_mut()
            .insert("Nf3".into(), edge("Nf3", 2));

        assert_eq!(root.children_total(), 5);
        assert_eq!(root.descendant(&["c5", "Nf3"]).unwrap().count(), 2);
        assert!(root.descendant(&["d5"]).is_none());
        assert_eq!(root.descendant(&[]).unwrap().token(), "e4");
    }

    #[test]
    fn test_empty_tree() {
        let tree = OpeningTree::new("start");
        assert!(tree.is_empty());
        assert_eq!(tree.node_count(), 0);
        assert_eq!(tree.plies_ingested(), 0);
        assert!(tree.get(&[]).is_none());
        assert!(tree.get(&["e4"]).is_none());
    }
}
