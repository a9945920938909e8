//! Ghosting: import read-only copies of remote entities so each part sees
//! a controlled neighborhood of off-process mesh.
//!
//! A [`Ghosting`] plan maps entities to destination parts; the collector
//! expands it downward and unifies it across shared copies; the exchanger
//! ships entities and tags and installs bidirectional ghost pointers.
//! [`GhostRegistry`] carries the resulting bookkeeping — there is no
//! process-wide singleton; callers thread the registry through
//! create/delete.

pub mod collect;
pub mod exchange;
pub mod layer;
pub mod plan;
pub mod wire;

pub use collect::collect_entities;
pub use exchange::{ghost_create, GhostCommTags};
pub use layer::ghost_create_layer;
pub use plan::{Ghosting, PARTS_INDEX_TAG_NAME};

use crate::mesh::{EntityId, Mesh, GHOSTED_TAG_NAME, GHOST_TAG_NAME};

/// Per-dimension registries of received ghost copies and locally-resident
/// entities that have been sent as ghosts. Lives from ghost-create until
/// ghost-delete.
#[derive(Debug, Default)]
pub struct GhostRegistry {
    ghost: [Vec<EntityId>; 4],
    ghosted: [Vec<EntityId>; 4],
}

impl GhostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Received ghost copies of dimension `d`.
    pub fn ghost_entities(&self, d: usize) -> &[EntityId] {
        &self.ghost[d]
    }

    /// Locally-resident entities of dimension `d` sent somewhere as ghosts.
    pub fn ghosted_entities(&self, d: usize) -> &[EntityId] {
        &self.ghosted[d]
    }

    pub fn is_empty(&self) -> bool {
        self.ghost.iter().all(Vec::is_empty) && self.ghosted.iter().all(Vec::is_empty)
    }

    pub(crate) fn push_ghost(&mut self, d: usize, e: EntityId) {
        self.ghost[d].push(e);
    }

    pub(crate) fn push_ghosted(&mut self, d: usize, e: EntityId) {
        self.ghosted[d].push(e);
    }
}

/// Tear down all ghosting: destroy received ghost copies, clear the
/// ghost pointers and tags of everything that was sent, and empty the
/// registry.
///
/// Top dimension first, so nothing is destroyed while still referenced
/// from above.
pub fn ghost_delete<M: Mesh>(m: &mut M, reg: &mut GhostRegistry) {
    let ghosted_tag = m.find_tag(GHOSTED_TAG_NAME);
    for d in (0..4).rev() {
        for e in std::mem::take(&mut reg.ghost[d]) {
            m.destroy(e);
        }
        for e in std::mem::take(&mut reg.ghosted[d]) {
            if let Some(t) = ghosted_tag {
                m.remove_tag(e, t);
            }
            m.delete_ghost(e);
        }
    }
    if let Some(t) = m.find_tag(GHOST_TAG_NAME) {
        m.destroy_tag(t);
    }
    if let Some(t) = ghosted_tag {
        m.destroy_tag(t);
    }
}
