//! The ghost plan: entity → destination part set.
//!
//! Each planned entity stores a small integer index — kept in the
//! `_parts_index_` tag so it survives arbitrary mesh mutation — into a
//! per-dimension arena of destination sets. The first `send` for an
//! entity allocates its slot; later calls reuse it. Plans only grow:
//! destinations are added, never removed.

use crate::mesh::{
    EntityId, Mesh, PartId, TagId, TagKind, GHOSTED_TAG_NAME, GHOST_TAG_NAME,
};
use std::collections::BTreeSet;

/// Name of the integer tag holding an entity's slot index in the plan.
pub const PARTS_INDEX_TAG_NAME: &str = "_parts_index_";

/// A ghosting plan at a fixed ghost dimension.
///
/// Entries may exist for entities of any dimension up to the ghost
/// dimension (the collector adds the downward closure). Destinations
/// never include the local part: self is never a remote of itself, and
/// `send` rejects such requests up-front.
pub struct Ghosting {
    ghost_dim: usize,
    self_part: PartId,
    parts: [Vec<BTreeSet<PartId>>; 4],
    index_tag: TagId,
}

impl Ghosting {
    /// Create an empty plan at `ghost_dim`, ensuring the ghost bookkeeping
    /// tags exist on the mesh.
    pub fn new<M: Mesh>(m: &mut M, ghost_dim: usize) -> Self {
        assert!(ghost_dim <= 3, "ghost dimension out of range");
        if m.find_tag(GHOST_TAG_NAME).is_none() {
            m.create_tag(GHOST_TAG_NAME, TagKind::Int, 1);
        }
        if m.find_tag(GHOSTED_TAG_NAME).is_none() {
            m.create_tag(GHOSTED_TAG_NAME, TagKind::Int, 1);
        }
        let index_tag = m.create_tag(PARTS_INDEX_TAG_NAME, TagKind::Int, 1);
        Self {
            ghost_dim,
            self_part: m.part_id(),
            parts: Default::default(),
            index_tag,
        }
    }

    pub fn ghost_dim(&self) -> usize {
        self.ghost_dim
    }

    /// True iff `e` has a plan entry.
    pub fn has<M: Mesh>(&self, m: &M, e: EntityId) -> bool {
        m.has_tag(e, self.index_tag)
    }

    /// Add `to` to the destination set of `e`. Self destinations are
    /// elided.
    pub fn send<M: Mesh>(&mut self, m: &mut M, e: EntityId, to: PartId) {
        if to == self.self_part {
            return;
        }
        let d = m.entity_dim(e);
        debug_assert!(d <= self.ghost_dim);
        let index = match m.get_ints(e, self.index_tag) {
            Some(ix) => ix[0] as usize,
            None => {
                let ix = self.parts[d].len();
                m.set_ints(e, self.index_tag, &[ix as i32]);
                self.parts[d].push(BTreeSet::new());
                ix
            }
        };
        self.parts[d][index].insert(to);
    }

    /// Mark every entity of the ghost dimension for `to`.
    pub fn send_all<M: Mesh>(&mut self, m: &mut M, to: PartId) {
        if to == self.self_part {
            return;
        }
        for e in m.entities(self.ghost_dim) {
            self.send(m, e, to);
        }
    }

    /// Destination set of `e` (dimension `d`). The entity must have a plan
    /// entry; a missing index tag is a broken invariant.
    pub fn sending<M: Mesh>(&self, m: &M, e: EntityId, d: usize) -> &BTreeSet<PartId> {
        let ix = m
            .get_ints(e, self.index_tag)
            .unwrap_or_else(|| panic!("entity {e} (dim {d}) has no {PARTS_INDEX_TAG_NAME} tag"));
        let set = &self.parts[d][ix[0] as usize];
        debug_assert!(!set.contains(&self.self_part));
        set
    }

    /// Number of destinations recorded for `e`, zero when unplanned.
    pub fn count_entity<M: Mesh>(&self, m: &M, e: EntityId, d: usize) -> usize {
        match m.get_ints(e, self.index_tag) {
            Some(ix) => self.parts[d][ix[0] as usize].len(),
            None => 0,
        }
    }

    /// Number of planned entities at the ghost dimension.
    pub fn count(&self) -> usize {
        self.parts[self.ghost_dim].len()
    }

    /// Clear the index tag across every planned dimension and destroy it.
    pub fn destroy<M: Mesh>(mut self, m: &mut M) {
        for d in 0..=self.ghost_dim {
            m.remove_tag_from_dimension(self.index_tag, d);
            self.parts[d].clear();
        }
        m.destroy_tag(self.index_tag);
    }

    #[cfg(any(debug_assertions, feature = "check-invariants"))]
    pub fn validate_invariants<M: Mesh>(&self, m: &M) {
        for d in 0..=self.ghost_dim {
            for e in m.entities(d) {
                if let Some(ix) = m.get_ints(e, self.index_tag) {
                    let ix = ix[0] as usize;
                    assert!(ix < self.parts[d].len(), "plan index out of range");
                    assert!(
                        !self.parts[d][ix].contains(&self.self_part),
                        "plan contains a self destination"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{EntityType, InMemoryMesh, ModelEntity};

    fn tri_mesh() -> (InMemoryMesh, EntityId, EntityId) {
        let mut m = InMemoryMesh::new(2, 0);
        let cls = ModelEntity { dim: 2, tag: 1 };
        let a = m.create_vertex(cls, [0.0; 3], [0.0; 3]);
        let b = m.create_vertex(cls, [1.0, 0.0, 0.0], [0.0; 3]);
        let c = m.create_vertex(cls, [0.0, 1.0, 0.0], [0.0; 3]);
        let ab = m.create_entity(EntityType::Edge, cls, &[a, b]);
        let bc = m.create_entity(EntityType::Edge, cls, &[b, c]);
        let ca = m.create_entity(EntityType::Edge, cls, &[c, a]);
        let t = m.create_entity(EntityType::Triangle, cls, &[ab, bc, ca]);
        (m, t, a)
    }

    #[test]
    fn slot_is_allocated_once() {
        let (mut m, t, _) = tri_mesh();
        let mut plan = Ghosting::new(&mut m, 2);
        plan.send(&mut m, t, 1);
        plan.send(&mut m, t, 2);
        plan.send(&mut m, t, 1);
        assert_eq!(plan.count(), 1);
        assert_eq!(plan.count_entity(&m, t, 2), 2);
        assert_eq!(
            plan.sending(&m, t, 2).iter().copied().collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn self_destination_is_elided() {
        let (mut m, t, _) = tri_mesh();
        let mut plan = Ghosting::new(&mut m, 2);
        plan.send(&mut m, t, 0);
        assert!(!plan.has(&m, t));
        assert_eq!(plan.count(), 0);
    }

    #[test]
    fn send_all_marks_every_top_entity() {
        let (mut m, t, _) = tri_mesh();
        let mut plan = Ghosting::new(&mut m, 2);
        plan.send_all(&mut m, 3);
        assert!(plan.has(&m, t));
        assert_eq!(plan.count(), 1);
        plan.send_all(&mut m, 0); // self: no-op
        assert_eq!(plan.count_entity(&m, t, 2), 1);
    }

    #[test]
    fn lower_dimension_entries() {
        let (mut m, _, a) = tri_mesh();
        let mut plan = Ghosting::new(&mut m, 2);
        plan.send(&mut m, a, 4);
        assert!(plan.has(&m, a));
        assert_eq!(plan.count_entity(&m, a, 0), 1);
        assert_eq!(plan.count(), 0); // nothing at the ghost dimension yet
    }

    #[test]
    fn destroy_clears_the_index_tag() {
        let (mut m, t, a) = tri_mesh();
        let mut plan = Ghosting::new(&mut m, 2);
        plan.send(&mut m, t, 1);
        plan.send(&mut m, a, 1);
        plan.destroy(&mut m);
        assert_eq!(m.find_tag(PARTS_INDEX_TAG_NAME), None);
    }

    #[test]
    fn plan_creates_ghost_bookkeeping_tags() {
        let (mut m, _, _) = tri_mesh();
        let _plan = Ghosting::new(&mut m, 2);
        assert!(m.find_tag(GHOST_TAG_NAME).is_some());
        assert!(m.find_tag(GHOSTED_TAG_NAME).is_some());
    }
}
