//! Directed graph input: edges, edge-token parsing and the vertex universe

mod ordering;

pub use ordering::VertexOrder;

use std::fmt;
use std::num::IntErrorKind;
use std::ops::Range;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

/// Largest vertex id accepted on input.
///
/// Every worker allocates a permutation of `max_id + 1` entries, so the id
/// range is capped well below `u32::MAX`.
pub const MAX_VERTEX_ID: u32 = (1 << 24) - 1;

/// Errors produced while parsing edge tokens
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdgeParseError {
    #[error("no edges supplied, at least one edge is required")]
    NoEdges,

    #[error("edge '{token}' is missing the '-' separator")]
    MissingSeparator { token: String },

    #[error("edge '{token}' has an invalid vertex '{field}': {reason}")]
    InvalidVertex {
        token: String,
        field: String,
        reason: String,
    },

    #[error("edge '{token}' references vertex {vertex}, the maximum is {max}")]
    VertexOutOfRange { token: String, vertex: u64, max: u32 },
}

/// A directed edge `from -> to`
///
/// `repr(C)` because edges are stored verbatim in the shared ring slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct Edge {
    pub from: u32,
    pub to: u32,
}

impl Edge {
    pub const fn new(from: u32, to: u32) -> Self {
        Self { from, to }
    }

    /// Larger of the two endpoints
    pub fn max_vertex(&self) -> u32 {
        self.from.max(self.to)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

impl FromStr for Edge {
    type Err = EdgeParseError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let (from, to) = token.split_once('-').ok_or_else(|| EdgeParseError::MissingSeparator {
            token: token.to_string(),
        })?;

        Ok(Self {
            from: parse_vertex(token, from)?,
            to: parse_vertex(token, to)?,
        })
    }
}

fn parse_vertex(token: &str, field: &str) -> Result<u32, EdgeParseError> {
    let invalid = |reason: &str| EdgeParseError::InvalidVertex {
        token: token.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    };

    if field.is_empty() {
        return Err(invalid("empty vertex id"));
    }
    if !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("expected a non-negative integer"));
    }

    let value = match field.parse::<u64>() {
        Ok(value) => value,
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => u64::MAX,
        Err(e) => return Err(invalid(&e.to_string())),
    };

    if value > u64::from(MAX_VERTEX_ID) {
        return Err(EdgeParseError::VertexOutOfRange {
            token: token.to_string(),
            vertex: value,
            max: MAX_VERTEX_ID,
        });
    }

    Ok(value as u32)
}

/// Immutable edge list plus the vertex universe `{0, ..., n-1}` it spans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    edges: Vec<Edge>,
    vertex_count: usize,
}

impl Graph {
    /// Build a graph from already-parsed edges
    pub fn new(edges: Vec<Edge>) -> Result<Self, EdgeParseError> {
        if let Some(edge) = edges.iter().find(|e| e.max_vertex() > MAX_VERTEX_ID) {
            return Err(EdgeParseError::VertexOutOfRange {
                token: edge.to_string(),
                vertex: u64::from(edge.max_vertex()),
                max: MAX_VERTEX_ID,
            });
        }
        let max = edges.iter().map(Edge::max_vertex).max().ok_or(EdgeParseError::NoEdges)?;
        let vertex_count = max as usize + 1;
        debug!(edges = edges.len(), vertex_count, "Graph::new: built graph");
        Ok(Self { edges, vertex_count })
    }

    /// Parse one edge per token, in input order
    pub fn parse<I, S>(tokens: I) -> Result<Self, EdgeParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let edges = tokens
            .into_iter()
            .map(|token| token.as_ref().parse::<Edge>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(edges)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn vertices(&self) -> Range<u32> {
        0..self.vertex_count as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_edge() {
        assert_eq!("0-1".parse::<Edge>(), Ok(Edge::new(0, 1)));
        assert_eq!("12-7".parse::<Edge>(), Ok(Edge::new(12, 7)));
        assert_eq!("3-3".parse::<Edge>(), Ok(Edge::new(3, 3)));
    }

    #[test]
    fn test_edge_display() {
        assert_eq!(Edge::new(4, 2).to_string(), "4-2");
    }

    #[test]
    fn test_parse_missing_separator() {
        assert!(matches!(
            "12".parse::<Edge>(),
            Err(EdgeParseError::MissingSeparator { .. })
        ));
    }

    #[test]
    fn test_parse_non_numeric() {
        assert!(matches!("a-1".parse::<Edge>(), Err(EdgeParseError::InvalidVertex { .. })));
        assert!(matches!("1-b".parse::<Edge>(), Err(EdgeParseError::InvalidVertex { .. })));
        assert!(matches!("1-".parse::<Edge>(), Err(EdgeParseError::InvalidVertex { .. })));
        assert!(matches!(" 1-2".parse::<Edge>(), Err(EdgeParseError::InvalidVertex { .. })));
        assert!(matches!("1-2-3".parse::<Edge>(), Err(EdgeParseError::InvalidVertex { .. })));
    }

    #[test]
    fn test_parse_negative_vertex() {
        assert!(matches!("-1-2".parse::<Edge>(), Err(EdgeParseError::InvalidVertex { .. })));
        assert!(matches!("1--2".parse::<Edge>(), Err(EdgeParseError::InvalidVertex { .. })));
    }

    #[test]
    fn test_parse_out_of_range() {
        let err = "0-99999999999999999999999".parse::<Edge>().unwrap_err();
        assert!(matches!(err, EdgeParseError::VertexOutOfRange { .. }));

        let too_big = format!("0-{}", MAX_VERTEX_ID as u64 + 1);
        assert!(matches!(
            too_big.parse::<Edge>(),
            Err(EdgeParseError::VertexOutOfRange { .. })
        ));

        let max = format!("0-{}", MAX_VERTEX_ID);
        assert!(max.parse::<Edge>().is_ok());
    }

    #[test]
    fn test_graph_requires_edges() {
        let tokens: [&str; 0] = [];
        assert_eq!(Graph::parse(tokens), Err(EdgeParseError::NoEdges));
    }

    #[test]
    fn test_graph_vertex_universe() {
        let graph = Graph::parse(["0-1", "1-2", "2-0"]).unwrap();
        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.vertices(), 0..3);
        assert_eq!(graph.edges().len(), 3);
    }

    #[test]
    fn test_graph_new_rejects_vertex_above_cap() {
        let err = Graph::new(vec![Edge::new(0, 1), Edge::new(u32::MAX, 0)]).unwrap_err();
        assert_eq!(
            err,
            EdgeParseError::VertexOutOfRange {
                token: format!("{}-0", u32::MAX),
                vertex: u64::from(u32::MAX),
                max: MAX_VERTEX_ID,
            }
        );
        let graph = Graph::new(vec![Edge::new(MAX_VERTEX_ID, 0)]).unwrap();
        assert_eq!(graph.vertex_count(), MAX_VERTEX_ID as usize + 1);
    }

    #[test]
    fn test_graph_universe_includes_unreferenced_ids() {
        let graph = Graph::parse(["5-2"]).unwrap();
        assert_eq!(graph.vertex_count(), 6);
    }

    #[test]
    fn test_graph_rejects_first_bad_token() {
        let err = Graph::parse(["0-1", "oops", "1-2"]).unwrap_err();
        assert_eq!(
            err,
            EdgeParseError::MissingSeparator {
                token: "oops".to_string()
            }
        );
    }

    proptest! {
        #[test]
        fn prop_universe_is_zero_to_max(pairs in prop::collection::vec((0u32..500, 0u32..500), 1..40)) {
            let tokens: Vec<String> = pairs.iter().map(|(a, b)| format!("{}-{}", a, b)).collect();
            let graph = Graph::parse(&tokens).unwrap();

            let max = pairs.iter().map(|(a, b)| *a.max(b)).max().unwrap();
            prop_assert_eq!(graph.vertices(), 0..max + 1);
            prop_assert_eq!(graph.edges().len(), pairs.len());
        }
    }
}
