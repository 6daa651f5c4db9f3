//! Vertex orderings and the back-edge sets they induce

use rand::Rng;
use rand::seq::SliceRandom;

use super::Edge;
use crate::solution::Candidate;

/// A permutation of the vertex universe with an inverse index for O(1) position lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexOrder {
    order: Vec<u32>,
    position: Vec<u32>,
}

impl VertexOrder {
    /// The ordering `0, 1, ..., n-1`
    pub fn identity(vertex_count: usize) -> Self {
        let order: Vec<u32> = (0..vertex_count as u32).collect();
        let position = order.clone();
        Self { order, position }
    }

    /// Wrap an explicit ordering; `None` unless it is a permutation of `0..len`
    pub fn from_order(order: Vec<u32>) -> Option<Self> {
        let mut position = vec![u32::MAX; order.len()];
        for (index, &vertex) in order.iter().enumerate() {
            let slot = position.get_mut(vertex as usize)?;
            if *slot != u32::MAX {
                return None;
            }
            *slot = index as u32;
        }
        Some(Self { order, position })
    }

    /// Fisher-Yates shuffle in place
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.order.shuffle(rng);
        for (index, &vertex) in self.order.iter().enumerate() {
            self.position[vertex as usize] = index as u32;
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.order
    }

    /// Index of `vertex` in the ordering
    pub fn position(&self, vertex: u32) -> usize {
        self.position[vertex as usize] as usize
    }

    /// An edge is a back-edge when its source does not come strictly before its target
    pub fn is_back_edge(&self, edge: &Edge) -> bool {
        self.position(edge.from) >= self.position(edge.to)
    }

    /// Back-edges of `edges` under this ordering, in input order
    pub fn back_edges<'a>(&'a self, edges: &'a [Edge]) -> impl Iterator<Item = Edge> + 'a {
        edges.iter().copied().filter(|edge| self.is_back_edge(edge))
    }

    /// The candidate feedback arc set this ordering induces on `edges`
    pub fn candidate(&self, edges: &[Edge]) -> Candidate {
        Candidate::collect(self.back_edges(edges))
    }
}
