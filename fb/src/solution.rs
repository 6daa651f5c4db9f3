//! Candidate feedback arc sets

use std::fmt;

use crate::graph::Edge;

/// Maximum number of edges a candidate can carry through the shared buffer
pub const MAX_SOLUTION_EDGES: usize = 8;

/// A candidate feedback arc set derived from one vertex ordering.
///
/// `edge_count` is the number of back-edges the ordering produced. At most
/// [`MAX_SOLUTION_EDGES`] of them are stored; when more were found the
/// candidate is truncated and its stored edges are not a complete removal set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    edges: [Edge; MAX_SOLUTION_EDGES],
    stored: usize,
    edge_count: usize,
}

impl Candidate {
    /// The empty candidate: the ordering is a topological order
    pub const fn acyclic() -> Self {
        Self {
            edges: [Edge::new(0, 0); MAX_SOLUTION_EDGES],
            stored: 0,
            edge_count: 0,
        }
    }

    /// Collect back-edges, storing the first [`MAX_SOLUTION_EDGES`] and counting all of them
    pub fn collect<I>(back_edges: I) -> Self
    where
        I: IntoIterator<Item = Edge>,
    {
        let mut candidate = Self::acyclic();
        for edge in back_edges {
            if candidate.stored < MAX_SOLUTION_EDGES {
                candidate.edges[candidate.stored] = edge;
                candidate.stored += 1;
            }
            candidate.edge_count += 1;
        }
        candidate
    }

    /// Rebuild a candidate from its stored edges and total count.
    ///
    /// Returns `None` when the parts are inconsistent: more than
    /// [`MAX_SOLUTION_EDGES`] stored edges, or fewer edges counted than stored,
    /// or a short stored list while `edge_count` claims more edges.
    pub fn from_parts(stored: &[Edge], edge_count: usize) -> Option<Self> {
        if stored.len() > MAX_SOLUTION_EDGES || edge_count < stored.len() {
            return None;
        }
        if edge_count > stored.len() && stored.len() < MAX_SOLUTION_EDGES {
            return None;
        }

        let mut candidate = Self::acyclic();
        candidate.edges[..stored.len()].copy_from_slice(stored);
        candidate.stored = stored.len();
        candidate.edge_count = edge_count;
        Some(candidate)
    }

    /// Total number of back-edges under the ordering that produced this candidate
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// The stored edges, at most [`MAX_SOLUTION_EDGES`]
    pub fn edges(&self) -> &[Edge] {
        &self.edges[..self.stored]
    }

    /// Whether back-edges were dropped for lack of capacity
    pub fn is_truncated(&self) -> bool {
        self.edge_count > self.stored
    }

    pub fn is_acyclic(&self) -> bool {
        self.edge_count == 0
    }

    /// Whether this candidate removes strictly fewer edges than `best`
    pub fn improves_on(&self, best: Option<usize>) -> bool {
        best.is_none_or(|best| self.edge_count < best)
    }
}

impl Default for Candidate {
    fn default() -> Self {
        Self::acyclic()
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for edge in self.edges() {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", edge)?;
            first = false;
        }
        if self.is_truncated() {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "(+{} more)", self.edge_count - self.stored)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(n: u32) -> Vec<Edge> {
        (0..n).map(|i| Edge::new(i + 1, i)).collect()
    }

    #[test]
    fn test_collect_within_capacity() {
        let candidate = Candidate::collect(edges(3));
        assert_eq!(candidate.edge_count(), 3);
        assert_eq!(candidate.edges().len(), 3);
        assert!(!candidate.is_truncated());
        assert!(!candidate.is_acyclic());
    }

    #[test]
    fn test_collect_exactly_capacity_is_not_truncated() {
        let candidate = Candidate::collect(edges(MAX_SOLUTION_EDGES as u32));
        assert_eq!(candidate.edge_count(), MAX_SOLUTION_EDGES);
        assert!(!candidate.is_truncated());
    }

    #[test]
    fn test_collect_over_capacity_is_truncated() {
        let candidate = Candidate::collect(edges(11));
        assert_eq!(candidate.edge_count(), 11);
        assert_eq!(candidate.edges().len(), MAX_SOLUTION_EDGES);
        assert_eq!(candidate.edges()[0], Edge::new(1, 0));
        assert_eq!(candidate.edges()[7], Edge::new(8, 7));
        assert!(candidate.is_truncated());
    }

    #[test]
    fn test_acyclic() {
        let candidate = Candidate::collect(Vec::new());
        assert!(candidate.is_acyclic());
        assert!(candidate.edges().is_empty());
        assert_eq!(candidate, Candidate::acyclic());
    }

    #[test]
    fn test_improves_on() {
        let two = Candidate::collect(edges(2));
        assert!(two.improves_on(None));
        assert!(two.improves_on(Some(3)));
        assert!(!two.improves_on(Some(2)));
        assert!(!two.improves_on(Some(1)));
    }

    #[test]
    fn test_from_parts_validates() {
        let stored = edges(2);
        assert!(Candidate::from_parts(&stored, 2).is_some());
        assert!(Candidate::from_parts(&stored, 1).is_none());
        assert!(Candidate::from_parts(&stored, 5).is_none());

        let full = edges(8);
        let truncated = Candidate::from_parts(&full, 20).unwrap();
        assert!(truncated.is_truncated());
        assert!(Candidate::from_parts(&edges(9), 9).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(Candidate::collect(edges(2)).to_string(), "1-0 2-1");
        assert_eq!(Candidate::acyclic().to_string(), "");
        let truncated = Candidate::collect(edges(10));
        assert!(truncated.to_string().ends_with("8-7 (+2 more)"));
    }
}
