//! Seam between the mesh pipeline and whatever renders the scene

use crate::scene::SceneGraph;
use std::collections::BTreeMap;
use tracing::trace;

/// A rendering surface that can show model roots.
///
/// Implementations own the renderable objects created from a [`SceneGraph`];
/// `detach` must release every object that `attach` created for that root.
pub trait SceneDisplay {
    /// Identifies one attached root
    type Handle;

    /// Insert a scene root and return a handle for detaching it later
    fn attach(&mut self, scene: SceneGraph) -> Self::Handle;

    /// Remove a previously attached root and everything under it
    fn detach(&mut self, handle: Self::Handle);

    /// Ask for one frame to be drawn
    fn request_redraw(&mut self);
}

/// Handle of a root attached to a [`HeadlessDisplay`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RootId(u64);

/// In-memory display that keeps attached scenes and counts redraws
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    next_id: u64,
    attached: BTreeMap<RootId, SceneGraph>,
    detached: usize,
    redraws: usize,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of roots currently attached
    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    pub fn is_attached(&self, id: RootId) -> bool {
        self.attached.contains_key(&id)
    }

    /// The most recently attached root still present
    pub fn current(&self) -> Option<&SceneGraph> {
        self.attached.values().next_back()
    }

    /// Total number of renderable objects across all attached roots
    pub fn object_count(&self) -> usize {
        self.attached.values().map(|s| s.root.objects.len()).sum()
    }

    pub fn detached_count(&self) -> usize {
        self.detached
    }

    pub fn redraw_count(&self) -> usize {
        self.redraws
    }
}

impl SceneDisplay for HeadlessDisplay {
    type Handle = RootId;

    fn attach(&mut self, scene: SceneGraph) -> RootId {
        let id = RootId(self.next_id);
        self.next_id += 1;
        let objects = scene.root.objects.len();
        trace!("Attaching root {:?} with {} objects", id, objects);
        self.attached.insert(id, scene);
        id
    }

    fn detach(&mut self, handle: RootId) {
        if self.attached.remove(&handle).is_some() {
            trace!("Detached root {:?}", handle);
            self.detached += 1;
        }
    }

    fn request_redraw(&mut self) {
        self.redraws += 1;
    }
}
