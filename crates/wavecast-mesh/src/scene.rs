//! Renderer-agnostic description of the model scene.
//!
//! The builder turns an indexed mesh and its edges into a flat list of
//! renderable objects under one [`ModelRoot`], so replacing the displayed model
//! is a single detach plus a single attach on the rendering side.

use crate::edges::EdgeSet;
use crate::types::{IndexedMesh, Position};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cosmetic constants for the generated scene
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneStyle {
    /// Radius of the sphere drawn at every vertex
    pub vertex_radius: f32,
    /// Radius of the tube drawn along every edge
    pub tube_radius: f32,
    /// Segments along the length of each tube
    pub tubular_segments: u32,
    /// Segments around the circumference of each tube
    pub radial_segments: u32,
    /// Radius of the marker drawn at the coordinate origin
    pub origin_radius: f32,
}

impl Default for SceneStyle {
    fn default() -> Self {
        Self {
            vertex_radius: 0.04,
            tube_radius: 0.015,
            tubular_segments: 1,
            radial_segments: 4,
            origin_radius: 0.06,
        }
    }
}

/// Which side of the surface is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceSide {
    /// Front faces, seen from outside the model
    Outside,
    /// Back faces, seen from inside the model
    Inside,
}

/// Thin cylinder drawn between two vertex positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tube {
    pub start: Position,
    pub end: Position,
    pub radius: f32,
    pub tubular_segments: u32,
    pub radial_segments: u32,
}

impl Tube {
    pub fn length(&self) -> f32 {
        let d = self.delta();
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
    }

    pub fn midpoint(&self) -> Position {
        [
            (self.start[0] + self.end[0]) / 2.0,
            (self.start[1] + self.end[1]) / 2.0,
            (self.start[2] + self.end[2]) / 2.0,
        ]
    }

    /// Unit direction from start to end, `None` for a zero-length tube
    pub fn direction(&self) -> Option<Position> {
        let len = self.length();
        if len > f32::EPSILON {
            let d = self.delta();
            Some([d[0] / len, d[1] / len, d[2] / len])
        } else {
            None
        }
    }

    fn delta(&self) -> Position {
        [
            self.end[0] - self.start[0],
            self.end[1] - self.start[1],
            self.end[2] - self.start[2],
        ]
    }
}

/// One renderable object of the model
#[derive(Debug, Clone, PartialEq)]
pub enum SceneObject {
    /// Filled faces; both sides share the same geometry
    Surface {
        side: SurfaceSide,
        geometry: Arc<IndexedMesh>,
    },
    /// Wireframe edge
    Tube(Tube),
    /// Sphere marking a vertex
    VertexMarker { position: Position, radius: f32 },
    /// Fixed reference marker at (0, 0, 0)
    OriginMarker { radius: f32 },
}

/// Counts of each object kind in a scene
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub surfaces: usize,
    pub tubes: usize,
    pub vertex_markers: usize,
    pub origin_markers: usize,
}

impl SceneStats {
    pub fn total(&self) -> usize {
        self.surfaces + self.tubes + self.vertex_markers + self.origin_markers
    }
}

/// Parent node of everything that makes up "the current model"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRoot {
    pub objects: Vec<SceneObject>,
}

impl ModelRoot {
    pub fn stats(&self) -> SceneStats {
        let mut stats = SceneStats::default();
        for object in &self.objects {
            match object {
                SceneObject::Surface { .. } => stats.surfaces += 1,
                SceneObject::Tube(_) => stats.tubes += 1,
                SceneObject::VertexMarker { .. } => stats.vertex_markers += 1,
                SceneObject::OriginMarker { .. } => stats.origin_markers += 1,
            }
        }
        stats
    }
}

/// Complete scene for one received mesh
#[derive(Debug, Clone, PartialEq)]
pub struct SceneGraph {
    pub root: ModelRoot,
    /// Geometry shared by both surfaces
    pub mesh: Arc<IndexedMesh>,
}

impl SceneGraph {
    pub fn stats(&self) -> SceneStats {
        self.root.stats()
    }
}

/// Build the scene for a mesh and its edges.
///
/// Does not touch any previously displayed scene; swapping is up to the caller.
pub fn build(mesh: Arc<IndexedMesh>, edges: &EdgeSet, style: &SceneStyle) -> SceneGraph {
    let mut objects = Vec::with_capacity(2 + edges.len() + mesh.vertex_count() + 1);

    objects.push(SceneObject::Surface {
        side: SurfaceSide::Outside,
        geometry: Arc::clone(&mesh),
    });
    objects.push(SceneObject::Surface {
        side: SurfaceSide::Inside,
        geometry: Arc::clone(&mesh),
    });

    let mut skipped = 0usize;
    for edge in edges {
        let (Some(&start), Some(&end)) = (
            mesh.vertices.get(edge.start() as usize),
            mesh.vertices.get(edge.end() as usize),
        ) else {
            skipped += 1;
            continue;
        };
        objects.push(SceneObject::Tube(Tube {
            start,
            end,
            radius: style.tube_radius,
            tubular_segments: style.tubular_segments,
            radial_segments: style.radial_segments,
        }));
    }
    if skipped > 0 {
        warn!("Skipped {} edges referencing missing vertices", skipped);
    }

    objects.extend(mesh.vertices.iter().map(|&position| SceneObject::VertexMarker {
        position,
        radius: style.vertex_radius,
    }));

    objects.push(SceneObject::OriginMarker {
        radius: style.origin_radius,
    });

    let root = ModelRoot { objects };
    debug!("Built scene: {:?}", root.stats());

    SceneGraph { root, mesh }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edges::extract_edges;

    fn quad() -> Arc<IndexedMesh> {
        Arc::new(IndexedMesh::new(
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [1.0, 1.0, 0.0],
            ],
            vec![[0, 1, 2], [1, 2, 3]],
        ))
    }

    #[test]
    fn test_build_object_counts() {
        let mesh = quad();
        let edges = extract_edges(&mesh);
        let scene = build(mesh, &edges, &SceneStyle::default());

        let stats = scene.stats();
        assert_eq!(stats.surfaces, 2);
        assert_eq!(stats.tubes, 5);
        assert_eq!(stats.vertex_markers, 4);
        assert_eq!(stats.origin_markers, 1);
        assert_eq!(stats.total(), 12);
    }

    #[test]
    fn test_surfaces_share_geometry() {
        let mesh = quad();
        let edges = extract_edges(&mesh);
        let scene = build(Arc::clone(&mesh), &edges, &SceneStyle::default());

        let sides: Vec<_> = scene
            .root
            .objects
            .iter()
            .filter_map(|o| match o {
                SceneObject::Surface { side, geometry } => {
                    assert!(Arc::ptr_eq(geometry, &mesh));
                    Some(*side)
                }
                _ => None,
            })
            .collect();
        assert_eq!(sides, vec![SurfaceSide::Outside, SurfaceSide::Inside]);
    }

    #[test]
    fn test_empty_mesh_keeps_origin_marker() {
        let mesh = Arc::new(IndexedMesh::default());
        let scene = build(mesh, &EdgeSet::new(), &SceneStyle::default());

        let stats = scene.stats();
        assert_eq!(stats.origin_markers, 1);
        assert_eq!(stats.tubes, 0);
        assert_eq!(stats.vertex_markers, 0);
    }

    #[test]
    fn test_tube_geometry() {
        let tube = Tube {
            start: [0.0, 0.0, 0.0],
            end: [0.0, 2.0, 0.0],
            radius: 0.015,
            tubular_segments: 1,
            radial_segments: 4,
        };
        assert_eq!(tube.length(), 2.0);
        assert_eq!(tube.midpoint(), [0.0, 1.0, 0.0]);
        assert_eq!(tube.direction(), Some([0.0, 1.0, 0.0]));

        let degenerate = Tube {
            end: tube.start,
            ..tube
        };
        assert_eq!(degenerate.direction(), None);
    }

    #[test]
    fn test_style_applied() {
        let style = SceneStyle {
            vertex_radius: 0.5,
            tube_radius: 0.25,
            ..SceneStyle::default()
        };
        let mesh = quad();
        let edges = extract_edges(&mesh);
        let scene = build(mesh, &edges, &style);

        for object in &scene.root.objects {
            match object {
                SceneObject::Tube(tube) => assert_eq!(tube.radius, 0.25),
                SceneObject::VertexMarker { radius, .. } => assert_eq!(*radius, 0.5),
                _ => {}
            }
        }
    }
}
