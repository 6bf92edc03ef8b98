//! Decode, index, extract edges, build and swap: one received payload at a time

use crate::decode::{decode, DecodeError};
use crate::display::SceneDisplay;
use crate::edges::extract_edges;
use crate::index::index_with_stats;
use crate::scene::{build, SceneGraph, SceneStyle};
use crate::types::Bounds;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a successfully applied payload turned into
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub vertices: usize,
    pub triangles: usize,
    pub edges: usize,
    /// Vertex occurrences merged by deduplication
    pub duplicates_removed: usize,
    /// Renderable objects under the new root
    pub objects: usize,
    pub bounds: Option<Bounds>,
}

/// Run the decode, index, edge and build stages without touching any display
pub fn prepare_scene(
    payload: &[u8],
    style: &SceneStyle,
) -> Result<(SceneGraph, ModelSummary), DecodeError> {
    let soup = decode(payload)?;
    let (mesh, stats) = index_with_stats(soup);
    let edges = extract_edges(&mesh);
    let mesh = Arc::new(mesh);

    let summary = ModelSummary {
        vertices: mesh.vertex_count(),
        triangles: mesh.triangle_count(),
        edges: edges.len(),
        duplicates_removed: stats.duplicates_removed(),
        objects: 0,
        bounds: mesh.bounds(),
    };

    let scene = build(mesh, &edges, style);
    let summary = ModelSummary {
        objects: scene.root.objects.len(),
        ..summary
    };

    Ok((scene, summary))
}

/// Counters kept across payloads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub applied: u64,
    pub rejected: u64,
}

/// Owns the handle of the live model root and replaces it wholesale.
///
/// At most one root created by this pipeline is attached at any time.
#[derive(Debug)]
pub struct ModelPipeline<H> {
    style: SceneStyle,
    current: Option<H>,
    stats: PipelineStats,
}

impl<H> Default for ModelPipeline<H> {
    fn default() -> Self {
        Self::new(SceneStyle::default())
    }
}

impl<H> ModelPipeline<H> {
    pub fn new(style: SceneStyle) -> Self {
        Self {
            style,
            current: None,
            stats: PipelineStats::default(),
        }
    }

    /// Whether a model root is currently attached
    pub fn has_model(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&H> {
        self.current.as_ref()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Turn a payload into a scene and swap it in.
    ///
    /// On a decode failure the display is left exactly as it was.
    pub fn apply<D>(&mut self, display: &mut D, payload: &[u8]) -> Result<ModelSummary, DecodeError>
    where
        D: SceneDisplay<Handle = H>,
    {
        let (scene, summary) = match prepare_scene(payload, &self.style) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.stats.rejected += 1;
                warn!(
                    "Rejected mesh payload of {} bytes, keeping previous model: {}",
                    payload.len(),
                    e
                );
                return Err(e);
            }
        };

        if let Some(previous) = self.current.take() {
            debug!("Detaching previous model root");
            display.detach(previous);
        }
        self.current = Some(display.attach(scene));
        display.request_redraw();

        self.stats.applied += 1;
        info!(
            "Displaying mesh: {} vertices, {} triangles, {} edges",
            summary.vertices, summary.triangles, summary.edges
        );

        Ok(summary)
    }

    /// Detach the live model root, if any
    pub fn clear<D>(&mut self, display: &mut D)
    where
        D: SceneDisplay<Handle = H>,
    {
        if let Some(previous) = self.current.take() {
            display.detach(previous);
            display.request_redraw();
        }
    }
}
