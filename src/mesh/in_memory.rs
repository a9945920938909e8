//! Reference per-part mesh database.
//!
//! `InMemoryMesh` implements the [`Mesh`] trait over hash maps: immediate
//! one-level downward adjacency is stored, everything else (multi-level
//! downward, upward, second-order) is derived. Upward answers are sorted
//! by id so adjacency queries are deterministic for a given mesh state.
//!
//! Remote tables are seeded by whoever constructs the partitioned mesh
//! (a loader in production, fixtures in tests) via [`InMemoryMesh::add_remote`].

use super::{
    EntityId, EntityType, GeometricModel, Mesh, ModelEntity, PartId, TagData, TagId, TagKind,
};
use hashbrown::HashMap;
use std::collections::BTreeSet;

/// Geometry kernel that never moves anything: no periodic axes, and the
/// model projection of a parametric coordinate is the coordinate itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullModel;

impl GeometricModel for NullModel {
    fn periodic_range(&self, _class: ModelEntity, _axis: usize) -> ([f64; 2], bool) {
        ([0.0, 0.0], false)
    }

    fn snap_to_model(&self, _class: ModelEntity, param: [f64; 3]) -> [f64; 3] {
        param
    }
}

#[derive(Clone, Debug)]
struct EntityRec {
    ty: EntityType,
    class: ModelEntity,
    /// Immediate (one level down) adjacency; empty for vertices.
    down: Vec<EntityId>,
    /// Immediate (one level up) adjacency, maintained on creation.
    up: Vec<EntityId>,
    point: [f64; 3],
    param: [f64; 3],
    remotes: Vec<(PartId, EntityId)>,
    ghosts: Vec<(PartId, EntityId)>,
    residence: BTreeSet<PartId>,
}

#[derive(Clone, Debug)]
struct TagDef {
    name: String,
    kind: TagKind,
    size: usize,
    alive: bool,
}

/// In-memory [`Mesh`] implementation, generic over the geometry kernel.
pub struct InMemoryMesh<G: GeometricModel = NullModel> {
    dim: usize,
    part: PartId,
    model: G,
    next_id: u64,
    ents: HashMap<EntityId, EntityRec>,
    /// Per-dimension creation order; drives `entities(dim)`.
    by_dim: [Vec<EntityId>; 4],
    tags: Vec<TagDef>,
    tag_values: HashMap<(u32, EntityId), TagData>,
}

impl InMemoryMesh<NullModel> {
    pub fn new(dim: usize, part: PartId) -> Self {
        Self::with_model(dim, part, NullModel)
    }
}

impl<G: GeometricModel> InMemoryMesh<G> {
    pub fn with_model(dim: usize, part: PartId, model: G) -> Self {
        assert!((1..=3).contains(&dim), "mesh dimension must be 1..=3");
        Self {
            dim,
            part,
            model,
            next_id: 0,
            ents: HashMap::new(),
            by_dim: Default::default(),
            tags: Vec::new(),
            tag_values: HashMap::new(),
        }
    }

    fn alloc_id(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId::new(self.next_id).expect("id counter overflowed past u64::MAX")
    }

    fn rec(&self, e: EntityId) -> &EntityRec {
        self.ents.get(&e).expect("unknown entity handle")
    }

    fn rec_mut(&mut self, e: EntityId) -> &mut EntityRec {
        self.ents.get_mut(&e).expect("unknown entity handle")
    }

    /// Seed a remote copy: `e` also lives on `part` under handle `remote`.
    /// Extends the residence set accordingly.
    pub fn add_remote(&mut self, e: EntityId, part: PartId, remote: EntityId) {
        assert_ne!(part, self.part, "an entity is never a remote of itself");
        let rec = self.rec_mut(e);
        if !rec.remotes.iter().any(|&(p, _)| p == part) {
            rec.remotes.push((part, remote));
            rec.remotes.sort_unstable_by_key(|&(p, _)| p);
        }
        rec.residence.insert(part);
    }

    /// Total number of live entities of dimension `dim`.
    pub fn count(&self, dim: usize) -> usize {
        self.by_dim[dim].len()
    }

    fn expand_down(&self, e: EntityId, dim: usize) -> Vec<EntityId> {
        let mut cur = vec![e];
        let mut cur_dim = self.entity_dim(e);
        while cur_dim > dim {
            let mut seen = BTreeSet::new();
            let mut next = Vec::new();
            for c in cur {
                for &d in &self.rec(c).down {
                    if seen.insert(d) {
                        next.push(d);
                    }
                }
            }
            cur = next;
            cur_dim -= 1;
        }
        cur
    }

    fn expand_up(&self, e: EntityId, dim: usize) -> Vec<EntityId> {
        let mut cur = vec![e];
        let mut cur_dim = self.entity_dim(e);
        while cur_dim < dim {
            let mut seen = BTreeSet::new();
            let mut next = Vec::new();
            for c in cur {
                for &u in &self.rec(c).up {
                    if seen.insert(u) {
                        next.push(u);
                    }
                }
            }
            cur = next;
            cur_dim += 1;
        }
        cur.sort_unstable();
        cur
    }
}

impl<G: GeometricModel> Mesh for InMemoryMesh<G> {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn part_id(&self) -> PartId {
        self.part
    }

    fn entities(&self, dim: usize) -> Vec<EntityId> {
        self.by_dim[dim].clone()
    }

    fn entity_type(&self, e: EntityId) -> EntityType {
        self.rec(e).ty
    }

    fn downward(&self, e: EntityId, dim: usize) -> Vec<EntityId> {
        debug_assert!(dim < self.entity_dim(e));
        self.expand_down(e, dim)
    }

    fn upward(&self, e: EntityId, dim: usize) -> Vec<EntityId> {
        debug_assert!(dim > self.entity_dim(e));
        self.expand_up(e, dim)
    }

    fn classification(&self, e: EntityId) -> ModelEntity {
        self.rec(e).class
    }

    fn periodic_range(&self, class: ModelEntity, axis: usize) -> ([f64; 2], bool) {
        self.model.periodic_range(class, axis)
    }

    fn snap_to_model(&self, class: ModelEntity, param: [f64; 3]) -> [f64; 3] {
        self.model.snap_to_model(class, param)
    }

    fn point(&self, v: EntityId) -> [f64; 3] {
        self.rec(v).point
    }

    fn set_point(&mut self, v: EntityId, p: [f64; 3]) {
        self.rec_mut(v).point = p;
    }

    fn param(&self, v: EntityId) -> [f64; 3] {
        self.rec(v).param
    }

    fn param_on(&self, _class: ModelEntity, v: EntityId) -> [f64; 3] {
        // Single-chart model space: the stored parameter is valid on any
        // model entity bounding the vertex's classification.
        self.rec(v).param
    }

    fn remotes(&self, e: EntityId) -> Vec<(PartId, EntityId)> {
        self.rec(e).remotes.clone()
    }

    fn owner(&self, e: EntityId) -> PartId {
        // Smallest residence member, the conventional choice.
        self.rec(e)
            .remotes
            .iter()
            .map(|&(p, _)| p)
            .min()
            .map_or(self.part, |m| m.min(self.part))
    }

    fn ghosts(&self, e: EntityId) -> Vec<(PartId, EntityId)> {
        self.rec(e).ghosts.clone()
    }

    fn add_ghost(&mut self, e: EntityId, part: PartId, remote: EntityId) {
        let rec = self.rec_mut(e);
        if !rec.ghosts.iter().any(|&(p, r)| p == part && r == remote) {
            rec.ghosts.push((part, remote));
            rec.ghosts.sort_unstable();
        }
    }

    fn delete_ghost(&mut self, e: EntityId) {
        self.rec_mut(e).ghosts.clear();
    }

    fn residence(&self, e: EntityId) -> BTreeSet<PartId> {
        self.rec(e).residence.clone()
    }

    fn set_residence(&mut self, e: EntityId, parts: BTreeSet<PartId>) {
        self.rec_mut(e).residence = parts;
    }

    fn create_vertex(
        &mut self,
        class: ModelEntity,
        point: [f64; 3],
        param: [f64; 3],
    ) -> EntityId {
        let id = self.alloc_id();
        let mut residence = BTreeSet::new();
        residence.insert(self.part);
        self.ents.insert(
            id,
            EntityRec {
                ty: EntityType::Vertex,
                class,
                down: Vec::new(),
                up: Vec::new(),
                point,
                param,
                remotes: Vec::new(),
                ghosts: Vec::new(),
                residence,
            },
        );
        self.by_dim[0].push(id);
        id
    }

    fn create_entity(
        &mut self,
        ty: EntityType,
        class: ModelEntity,
        downward: &[EntityId],
    ) -> EntityId {
        let dim = ty.dimension();
        assert!(dim >= 1, "use create_vertex for vertices");
        for &d in downward {
            assert_eq!(
                self.entity_dim(d),
                dim - 1,
                "downward adjacency must be one level down"
            );
        }
        let id = self.alloc_id();
        let mut residence = BTreeSet::new();
        residence.insert(self.part);
        self.ents.insert(
            id,
            EntityRec {
                ty,
                class,
                down: downward.to_vec(),
                up: Vec::new(),
                point: [0.0; 3],
                param: [0.0; 3],
                remotes: Vec::new(),
                ghosts: Vec::new(),
                residence,
            },
        );
        for &d in downward {
            self.rec_mut(d).up.push(id);
        }
        self.by_dim[dim].push(id);
        id
    }

    fn destroy(&mut self, e: EntityId) {
        let rec = self.ents.remove(&e).expect("destroying unknown entity");
        let dim = rec.ty.dimension();
        debug_assert!(
            rec.up.iter().all(|u| !self.ents.contains_key(u)),
            "destroying an entity still referenced from above"
        );
        for d in rec.down {
            if let Some(down_rec) = self.ents.get_mut(&d) {
                down_rec.up.retain(|&u| u != e);
            }
        }
        self.by_dim[dim].retain(|&x| x != e);
        self.tag_values.retain(|&(_, ent), _| ent != e);
    }

    fn create_tag(&mut self, name: &str, kind: TagKind, size: usize) -> TagId {
        debug_assert!(
            self.find_tag(name).is_none(),
            "tag `{name}` already exists"
        );
        let id = TagId(self.tags.len() as u32);
        self.tags.push(TagDef {
            name: name.to_owned(),
            kind,
            size,
            alive: true,
        });
        id
    }

    fn find_tag(&self, name: &str) -> Option<TagId> {
        self.tags
            .iter()
            .position(|t| t.alive && t.name == name)
            .map(|i| TagId(i as u32))
    }

    fn destroy_tag(&mut self, tag: TagId) {
        self.tags[tag.0 as usize].alive = false;
        self.tag_values.retain(|&(t, _), _| t != tag.0);
    }

    fn tag_list(&self) -> Vec<TagId> {
        (0..self.tags.len() as u32)
            .filter(|&i| self.tags[i as usize].alive)
            .map(TagId)
            .collect()
    }

    fn tag_name(&self, tag: TagId) -> String {
        self.tags[tag.0 as usize].name.clone()
    }

    fn tag_kind(&self, tag: TagId) -> TagKind {
        self.tags[tag.0 as usize].kind
    }

    fn tag_size(&self, tag: TagId) -> usize {
        self.tags[tag.0 as usize].size
    }

    fn set_tag(&mut self, e: EntityId, tag: TagId, data: TagData) {
        let def = &self.tags[tag.0 as usize];
        debug_assert!(def.alive, "setting a destroyed tag");
        debug_assert_eq!(data.kind(), def.kind, "tag `{}` kind mismatch", def.name);
        debug_assert_eq!(data.len(), def.size, "tag `{}` size mismatch", def.name);
        self.tag_values.insert((tag.0, e), data);
    }

    fn get_tag(&self, e: EntityId, tag: TagId) -> Option<TagData> {
        self.tag_values.get(&(tag.0, e)).cloned()
    }

    fn remove_tag(&mut self, e: EntityId, tag: TagId) {
        self.tag_values.remove(&(tag.0, e));
    }
}
