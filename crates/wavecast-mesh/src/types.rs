//! Shared mesh types passed between the decoder, indexer and scene builder

use serde::{Deserialize, Serialize};

/// A vertex position (x, y, z)
pub type Position = [f32; 3];

/// Triangles as decoded from a mesh file.
///
/// Without `indices`, every three consecutive positions form one triangle and
/// no vertex is shared. With `indices`, the soup was already indexed upstream
/// and the indexer passes it through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleSoup {
    /// Vertex positions, three per triangle unless `indices` is present
    pub positions: Vec<Position>,
    /// Optional triangle index list into `positions`
    pub indices: Option<Vec<[u32; 3]>>,
}

impl TriangleSoup {
    /// Create a non-indexed soup from raw positions
    pub fn from_positions(positions: Vec<Position>) -> Self {
        Self {
            positions,
            indices: None,
        }
    }

    /// Get the number of complete triangles
    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len(),
            None => self.positions.len() / 3,
        }
    }

    /// Check if this soup already carries sharing information
    pub fn is_indexed(&self) -> bool {
        self.indices.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.triangle_count() == 0
    }
}

impl From<IndexedMesh> for TriangleSoup {
    fn from(mesh: IndexedMesh) -> Self {
        Self {
            positions: mesh.vertices,
            indices: Some(mesh.triangles),
        }
    }
}

/// Triangle mesh with unique vertices referenced by index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexedMesh {
    /// Unique vertex positions
    pub vertices: Vec<Position>,
    /// Triangles as index triples into `vertices`, in original winding order
    pub triangles: Vec<[u32; 3]>,
}

impl IndexedMesh {
    /// Create a new indexed mesh
    pub fn new(vertices: Vec<Position>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty() && self.vertices.is_empty()
    }

    /// Compute the axis-aligned bounds of all vertices, `None` for an empty mesh
    pub fn bounds(&self) -> Option<Bounds> {
        let first = *self.vertices.first()?;
        let mut bounds = Bounds::new(first, first);
        for v in &self.vertices[1..] {
            bounds.include(*v);
        }
        Some(bounds)
    }

    /// Validate the mesh data consistency
    pub fn validate(&self) -> Result<(), String> {
        let vertex_count = self.vertices.len();
        for (i, triangle) in self.triangles.iter().enumerate() {
            if let Some(&index) = triangle.iter().find(|&&idx| idx as usize >= vertex_count) {
                return Err(format!(
                    "Triangle {i} references vertex {index} but only {vertex_count} vertices exist"
                ));
            }
        }
        Ok(())
    }
}

/// Axis-aligned bounds of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum coordinates (x, y, z)
    pub min: Position,
    /// Maximum coordinates (x, y, z)
    pub max: Position,
}

impl Bounds {
    pub fn new(min: Position, max: Position) -> Self {
        Self { min, max }
    }

    /// Grow the bounds to contain `point`
    pub fn include(&mut self, point: Position) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(point[axis]);
            self.max[axis] = self.max[axis].max(point[axis]);
        }
    }

    /// Calculate the center of the bounds
    pub fn center(&self) -> Position {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }

    /// Calculate the size of the bounds
    pub fn size(&self) -> Position {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Calculate the diagonal length of the bounds
    pub fn diagonal_length(&self) -> f32 {
        let size = self.size();
        (size[0] * size[0] + size[1] * size[1] + size[2] * size[2]).sqrt()
    }
}
