//! The mesh collaborator interface.
//!
//! The core never owns a mesh database. Everything it needs — iteration,
//! adjacency, classification, geometry queries, the remote/ghost/residence
//! tables and typed per-entity tags — is expressed through the [`Mesh`]
//! trait, with [`InMemoryMesh`] as the reference per-part implementation.
//!
//! Conventions carried by the trait itself:
//! - `is_ghost` / `is_ghosted` default to reading the `ghost_tag` /
//!   `ghosted_tag` integer tags maintained by the ghost exchanger. Backends
//!   with native ghost flags may override.
//! - `downward`/`upward` accept any lower/higher dimension and expand
//!   across intermediate levels; `second_adjacent` is the bridge traversal
//!   (down to the bridge dimension, back up to the target dimension).
//! - Adjacency answers must be deterministic for a given mesh state; the
//!   reference implementation sorts upward answers by id.

pub mod entity;
pub mod in_memory;

pub use entity::{EntityId, EntityType, PartId};
pub use in_memory::{InMemoryMesh, NullModel};

use std::collections::BTreeSet;

/// Name of the integer tag marking received ghost copies (value: sender part).
pub const GHOST_TAG_NAME: &str = "ghost_tag";
/// Name of the integer tag marking locally-resident entities that have been
/// sent as ghosts (value: one recipient part; boolean semantics).
pub const GHOSTED_TAG_NAME: &str = "ghosted_tag";

/// Classification record: the model entity a mesh entity lies on.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelEntity {
    /// Model dimension, 0..=3.
    pub dim: usize,
    /// Model entity id within its dimension.
    pub tag: i32,
}

/// Value type of a mesh tag.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TagKind {
    Int,
    Long,
    Double,
}

/// Typed per-entity tag payload.
#[derive(Clone, Debug, PartialEq)]
pub enum TagData {
    Ints(Vec<i32>),
    Longs(Vec<i64>),
    Doubles(Vec<f64>),
}

impl TagData {
    pub fn kind(&self) -> TagKind {
        match self {
            TagData::Ints(_) => TagKind::Int,
            TagData::Longs(_) => TagKind::Long,
            TagData::Doubles(_) => TagKind::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TagData::Ints(v) => v.len(),
            TagData::Longs(v) => v.len(),
            TagData::Doubles(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opaque handle for a mesh tag definition.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TagId(pub(crate) u32);

/// Geometry kernel interface: parametric ranges and model projection.
///
/// Model dimension and id travel inside [`ModelEntity`]; the kernel only
/// answers the two queries the snap path needs.
pub trait GeometricModel {
    /// Parametric range `[lo, hi]` of axis `axis` on `class`, and whether
    /// the axis is periodic.
    fn periodic_range(&self, class: ModelEntity, axis: usize) -> ([f64; 2], bool);

    /// Project the parametric coordinate onto the model, yielding a
    /// position in space.
    fn snap_to_model(&self, class: ModelEntity, param: [f64; 3]) -> [f64; 3];
}

/// The mesh database collaborator.
///
/// One instance per part. All mutation happens on the single control
/// thread of the owning process; the core never retains entity references
/// across calls, only `EntityId` handles.
pub trait Mesh {
    /// Topological dimension of the mesh (2 or 3).
    fn dimension(&self) -> usize;

    /// The local part id (equals the messaging rank).
    fn part_id(&self) -> PartId;

    /// All local entities of the given dimension, in deterministic order.
    /// Includes ghost copies.
    fn entities(&self, dim: usize) -> Vec<EntityId>;

    fn entity_type(&self, e: EntityId) -> EntityType;

    fn entity_dim(&self, e: EntityId) -> usize {
        self.entity_type(e).dimension()
    }

    /// Downward adjacent entities of dimension `dim < entity_dim(e)`,
    /// expanded across intermediate levels, first-seen order, deduplicated.
    fn downward(&self, e: EntityId, dim: usize) -> Vec<EntityId>;

    /// Upward adjacent entities of dimension `dim > entity_dim(e)`,
    /// expanded across intermediate levels, deterministic order.
    fn upward(&self, e: EntityId, dim: usize) -> Vec<EntityId>;

    /// The full downward closure of `e`: every strictly lower-dimensional
    /// entity bounding it.
    fn downward_closure(&self, e: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        for d in (0..self.entity_dim(e)).rev() {
            out.extend(self.downward(e, d));
        }
        out
    }

    /// Second-order adjacency: entities of `target_dim` reachable from `e`
    /// through a shared `bridge_dim` entity, excluding `e` itself.
    fn second_adjacent(
        &self,
        e: EntityId,
        bridge_dim: usize,
        target_dim: usize,
    ) -> Vec<EntityId> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let bridges = if bridge_dim < self.entity_dim(e) {
            self.downward(e, bridge_dim)
        } else {
            self.upward(e, bridge_dim)
        };
        for b in bridges {
            for u in self.upward(b, target_dim) {
                if u != e && seen.insert(u) {
                    out.push(u);
                }
            }
        }
        out
    }

    // --- geometry & classification -------------------------------------

    /// Model entity `e` is classified on.
    fn classification(&self, e: EntityId) -> ModelEntity;

    /// Parametric range of `axis` on `class` (delegates to the geometry
    /// kernel).
    fn periodic_range(&self, class: ModelEntity, axis: usize) -> ([f64; 2], bool);

    /// Project a parametric coordinate onto the model.
    fn snap_to_model(&self, class: ModelEntity, param: [f64; 3]) -> [f64; 3];

    /// Position of a vertex.
    fn point(&self, v: EntityId) -> [f64; 3];

    fn set_point(&mut self, v: EntityId, p: [f64; 3]);

    /// Parametric coordinate of a vertex on its classifying model entity.
    fn param(&self, v: EntityId) -> [f64; 3];

    /// Parametric coordinate of `v` as seen on model entity `class`
    /// (which may bound the vertex's own classification).
    fn param_on(&self, class: ModelEntity, v: EntityId) -> [f64; 3];

    // --- parallel state -------------------------------------------------

    /// Remote copies of `e`: `(part, handle-on-that-part)` pairs.
    fn remotes(&self, e: EntityId) -> Vec<(PartId, EntityId)>;

    fn is_shared(&self, e: EntityId) -> bool {
        !self.remotes(e).is_empty()
    }

    /// Owning part of `e`.
    fn owner(&self, e: EntityId) -> PartId;

    fn is_owned(&self, e: EntityId) -> bool {
        self.owner(e) == self.part_id()
    }

    /// Ghost copies of `e` (or, on a ghost copy, the original).
    fn ghosts(&self, e: EntityId) -> Vec<(PartId, EntityId)>;

    /// Record that `remote` on `part` is a ghost counterpart of `e`.
    /// Idempotent per `(part, remote)` pair.
    fn add_ghost(&mut self, e: EntityId, part: PartId, remote: EntityId);

    /// Drop all ghost counterparts recorded for `e`.
    fn delete_ghost(&mut self, e: EntityId);

    /// True iff `e` is a received ghost copy.
    fn is_ghost(&self, e: EntityId) -> bool {
        self.find_tag(GHOST_TAG_NAME)
            .is_some_and(|t| self.has_tag(e, t))
    }

    /// True iff `e` has been sent somewhere as a ghost.
    fn is_ghosted(&self, e: EntityId) -> bool {
        self.find_tag(GHOSTED_TAG_NAME)
            .is_some_and(|t| self.has_tag(e, t))
    }

    /// Parts on which `e` is considered to live.
    fn residence(&self, e: EntityId) -> BTreeSet<PartId>;

    fn set_residence(&mut self, e: EntityId, parts: BTreeSet<PartId>);

    // --- mutation -------------------------------------------------------

    /// Create a vertex classified on `class` at the given position and
    /// parametric coordinate.
    fn create_vertex(&mut self, class: ModelEntity, point: [f64; 3], param: [f64; 3])
        -> EntityId;

    /// Create a non-vertex entity from its one-level downward adjacency.
    fn create_entity(
        &mut self,
        ty: EntityType,
        class: ModelEntity,
        downward: &[EntityId],
    ) -> EntityId;

    /// Destroy an entity. The caller guarantees nothing upward still
    /// references it.
    fn destroy(&mut self, e: EntityId);

    /// Commit a batch of topology changes (no-op for backends without
    /// deferred bookkeeping).
    fn commit(&mut self) {}

    // --- tags -----------------------------------------------------------

    fn create_tag(&mut self, name: &str, kind: TagKind, size: usize) -> TagId;

    fn find_tag(&self, name: &str) -> Option<TagId>;

    fn destroy_tag(&mut self, tag: TagId);

    /// All live tag handles.
    fn tag_list(&self) -> Vec<TagId>;

    fn tag_name(&self, tag: TagId) -> String;

    fn tag_kind(&self, tag: TagId) -> TagKind;

    fn tag_size(&self, tag: TagId) -> usize;

    fn set_tag(&mut self, e: EntityId, tag: TagId, data: TagData);

    fn get_tag(&self, e: EntityId, tag: TagId) -> Option<TagData>;

    fn has_tag(&self, e: EntityId, tag: TagId) -> bool {
        self.get_tag(e, tag).is_some()
    }

    fn remove_tag(&mut self, e: EntityId, tag: TagId);

    /// Remove `tag` from every entity of dimension `dim`.
    fn remove_tag_from_dimension(&mut self, tag: TagId, dim: usize) {
        for e in self.entities(dim) {
            self.remove_tag(e, tag);
        }
    }

    // Typed convenience accessors.

    fn set_ints(&mut self, e: EntityId, tag: TagId, vals: &[i32]) {
        self.set_tag(e, tag, TagData::Ints(vals.to_vec()));
    }

    fn get_ints(&self, e: EntityId, tag: TagId) -> Option<Vec<i32>> {
        match self.get_tag(e, tag) {
            Some(TagData::Ints(v)) => Some(v),
            _ => None,
        }
    }

    fn set_doubles(&mut self, e: EntityId, tag: TagId, vals: &[f64]) {
        self.set_tag(e, tag, TagData::Doubles(vals.to_vec()));
    }

    fn get_doubles(&self, e: EntityId, tag: TagId) -> Option<Vec<f64>> {
        match self.get_tag(e, tag) {
            Some(TagData::Doubles(v)) => Some(v),
            _ => None,
        }
    }
}
