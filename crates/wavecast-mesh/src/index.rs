//! Vertex deduplication turning a triangle soup into an indexed mesh

use crate::types::{IndexedMesh, Position, TriangleSoup};
use std::collections::HashMap;
use tracing::debug;

/// Statistics about one indexing pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexStats {
    /// Vertex occurrences in the input soup
    pub input_vertices: usize,
    /// Vertices left after deduplication
    pub unique_vertices: usize,
    pub triangles: usize,
}

impl IndexStats {
    pub fn duplicates_removed(&self) -> usize {
        self.input_vertices - self.unique_vertices
    }

    pub fn vertex_reduction_percentage(&self) -> f32 {
        if self.input_vertices > 0 {
            (1.0 - self.unique_vertices as f32 / self.input_vertices as f32) * 100.0
        } else {
            0.0
        }
    }
}

/// Key for exact-match vertex deduplication.
///
/// Hashes the bit pattern of each coordinate with `-0.0` folded onto `0.0`,
/// so two positions share a key exactly when they compare equal with `==`.
/// Positions containing NaN never compare equal and get no key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VertexKey([u32; 3]);

impl VertexKey {
    fn new(position: &Position) -> Option<Self> {
        if position.iter().any(|v| v.is_nan()) {
            return None;
        }
        // Adding 0.0 turns -0.0 into 0.0 and leaves every other value unchanged
        Some(Self(position.map(|v| (v + 0.0).to_bits())))
    }
}

/// Build an indexed mesh from a triangle soup.
///
/// A soup that already carries indices is passed through unchanged.
pub fn index(soup: TriangleSoup) -> IndexedMesh {
    index_with_stats(soup).0
}

/// Build an indexed mesh and report how many vertices were merged
pub fn index_with_stats(soup: TriangleSoup) -> (IndexedMesh, IndexStats) {
    let TriangleSoup { positions, indices } = soup;

    if let Some(triangles) = indices {
        let stats = IndexStats {
            input_vertices: positions.len(),
            unique_vertices: positions.len(),
            triangles: triangles.len(),
        };
        return (IndexedMesh::new(positions, triangles), stats);
    }

    let triangle_count = positions.len() / 3;
    let input_vertices = triangle_count * 3;

    let mut vertex_map: HashMap<VertexKey, u32> = HashMap::with_capacity(input_vertices);
    let mut vertices: Vec<Position> = Vec::new();
    let mut triangles: Vec<[u32; 3]> = Vec::with_capacity(triangle_count);

    for corners in positions.chunks_exact(3) {
        let mut triangle = [0u32; 3];
        for (slot, position) in triangle.iter_mut().zip(corners) {
            *slot = match VertexKey::new(position) {
                Some(key) => *vertex_map.entry(key).or_insert_with(|| {
                    vertices.push(*position);
                    (vertices.len() - 1) as u32
                }),
                None => {
                    vertices.push(*position);
                    (vertices.len() - 1) as u32
                }
            };
        }
        triangles.push(triangle);
    }

    let stats = IndexStats {
        input_vertices,
        unique_vertices: vertices.len(),
        triangles: triangles.len(),
    };

    debug!(
        "Indexed mesh: {} vertices -> {} unique vertices ({:.1}% reduction)",
        stats.input_vertices,
        stats.unique_vertices,
        stats.vertex_reduction_percentage()
    );

    (IndexedMesh::new(vertices, triangles), stats)
}
