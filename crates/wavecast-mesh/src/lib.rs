//! Mesh pipeline for live STL viewers
//!
//! Decodes STL buffers, deduplicates them into indexed meshes, extracts their
//! unique edges and builds a renderer-agnostic scene that a [`SceneDisplay`]
//! can show. [`ModelPipeline`] ties the stages together and swaps the displayed
//! model each time a new buffer arrives.

pub mod decode;
pub mod display;
pub mod edges;
pub mod index;
pub mod pipeline;
pub mod scene;
pub mod types;

// Re-export commonly used types
pub use decode::{decode, DecodeError, StlFormat};
pub use display::{HeadlessDisplay, RootId, SceneDisplay};
pub use edges::{extract_edges, Edge, EdgeSet};
pub use index::{index, index_with_stats, IndexStats};
pub use pipeline::{prepare_scene, ModelPipeline, ModelSummary, PipelineStats};
pub use scene::{
    build, ModelRoot, SceneGraph, SceneObject, SceneStats, SceneStyle, SurfaceSide, Tube,
};
pub use types::{Bounds, IndexedMesh, Position, TriangleSoup};
