//! Unique undirected edge extraction

use crate::types::IndexedMesh;
use std::collections::HashSet;

/// Undirected edge between two vertex indices, always stored as `(min, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge(u32, u32);

impl Edge {
    /// Create an edge in canonical order
    pub fn new(a: u32, b: u32) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn start(&self) -> u32 {
        self.0
    }

    pub fn end(&self) -> u32 {
        self.1
    }

    pub fn as_pair(&self) -> (u32, u32) {
        (self.0, self.1)
    }
}

/// Deduplicated edges, iterated in the order they were first seen
#[derive(Debug, Clone, Default)]
pub struct EdgeSet {
    order: Vec<Edge>,
    seen: HashSet<Edge>,
}

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an edge, returning `false` if it was already present
    pub fn insert(&mut self, edge: Edge) -> bool {
        if self.seen.insert(edge) {
            self.order.push(edge);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, edge: &Edge) -> bool {
        self.seen.contains(edge)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.order.iter()
    }
}

impl PartialEq for EdgeSet {
    fn eq(&self, other: &Self) -> bool {
        self.seen == other.seen
    }
}

impl<'a> IntoIterator for &'a EdgeSet {
    type Item = &'a Edge;
    type IntoIter = std::slice::Iter<'a, Edge>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}

impl FromIterator<Edge> for EdgeSet {
    fn from_iter<I: IntoIterator<Item = Edge>>(iter: I) -> Self {
        let mut set = EdgeSet::new();
        for edge in iter {
            set.insert(edge);
        }
        set
    }
}

/// Collect the unique edges of every triangle in the mesh
pub fn extract_edges(mesh: &IndexedMesh) -> EdgeSet {
    mesh.triangles
        .iter()
        .flat_map(|&[a, b, c]| {
            [Edge::new(a, b), Edge::new(b, c), Edge::new(c, a)]
        })
        .collect()
}
