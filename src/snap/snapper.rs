//! The snap cavity operator.
//!
//! Operators are a small capability set the cavity-apply driver invokes
//! per candidate entity: pick (`should_apply`), gather (`request_locality`),
//! act (`apply`). The driver that migrates cavities between parts is a
//! collaborator; [`apply_operator`] with [`LocalCavity`] is the
//! single-part rendition.

use super::Snap;
use crate::mesh::{EntityId, Mesh, TagId};

/// Grants cavity ownership to an operator before it may act.
pub trait CavityOp {
    /// Ensure the listed entities (and their cavities) are local to this
    /// part. Returns false when the attempt must be postponed.
    fn request_locality(&mut self, entities: &[EntityId]) -> bool;
}

/// Cavity driver for a single part: every cavity is local by construction.
pub struct LocalCavity;

impl CavityOp for LocalCavity {
    fn request_locality(&mut self, _entities: &[EntityId]) -> bool {
        true
    }
}

/// A mesh-modification operator driven over cavities.
pub trait Operator {
    /// Dimension of the entities this operator inspects.
    fn target_dimension(&self) -> usize;
    /// Decide whether `e` needs work this round (and remember it).
    fn should_apply(&mut self, e: EntityId) -> bool;
    /// Request locality of the remembered entity's cavity.
    fn request_locality(&mut self, cav: &mut dyn CavityOp) -> bool;
    /// Execute one attempt on the remembered entity.
    fn apply(&mut self);
}

/// Drive `op` over the candidate entities through a cavity driver.
pub fn apply_operator<O: Operator>(
    candidates: &[EntityId],
    op: &mut O,
    cav: &mut dyn CavityOp,
) {
    for &e in candidates {
        if op.should_apply(e) && op.request_locality(cav) {
            op.apply();
        }
    }
}

/// Mesh-modification pre-step that opens space in a cavity so a
/// subsequent snap can succeed. Needs a two-layer cavity.
pub trait Digger<M: Mesh> {
    /// Record the vertex to dig around and request cavity locality.
    fn set_vert(&mut self, v: EntityId, cav: &mut dyn CavityOp) -> bool;
    /// Open space around the recorded vertex; true if the mesh changed.
    fn run(&mut self, mesh: &mut M) -> bool;
}

/// Digger for callers with no dig collaborator: never makes progress, so
/// the dig phase reaches quiescence after one round.
pub struct NoDigger;

impl<M: Mesh> Digger<M> for NoDigger {
    fn set_vert(&mut self, v: EntityId, cav: &mut dyn CavityOp) -> bool {
        cav.request_locality(&[v])
    }

    fn run(&mut self, _mesh: &mut M) -> bool {
        false
    }
}

/// Move a vertex to its snap target if every incident element stays
/// valid; otherwise restore the old position.
///
/// On success the target tag is removed: the tag is the authoritative
/// record of pending work, so a tagless vertex is permanently snapped.
pub(crate) fn try_snapping<M, V>(ctx: &mut Snap<'_, M, V>, tag: TagId, vert: EntityId) -> bool
where
    M: Mesh,
    V: Fn(&M, EntityId) -> bool,
{
    let x = ctx.mesh.point(vert);
    let s = ctx
        .mesh
        .get_doubles(vert, tag)
        .expect("snap candidate lost its target tag");
    ctx.mesh.set_point(vert, [s[0], s[1], s[2]]);
    let dim = ctx.mesh.dimension();
    for e in ctx.mesh.upward(vert, dim) {
        if !(ctx.is_element_valid)(&*ctx.mesh, e) {
            ctx.mesh.set_point(vert, x);
            return false;
        }
    }
    ctx.mesh.remove_tag(vert, tag);
    true
}

/// Per-vertex snap operator, optionally preceded by a dig.
pub struct Snapper<'a, 'm, M, V, D>
where
    M: Mesh,
    V: Fn(&M, EntityId) -> bool,
    D: Digger<M>,
{
    ctx: &'a mut Snap<'m, M, V>,
    tag: TagId,
    digger: Option<&'a mut D>,
    vert: Option<EntityId>,
    pub success_count: i64,
    pub did_anything: bool,
}

impl<'a, 'm, M, V, D> Snapper<'a, 'm, M, V, D>
where
    M: Mesh,
    V: Fn(&M, EntityId) -> bool,
    D: Digger<M>,
{
    pub fn new(ctx: &'a mut Snap<'m, M, V>, tag: TagId, digger: Option<&'a mut D>) -> Self {
        Self {
            ctx,
            tag,
            digger,
            vert: None,
            success_count: 0,
            did_anything: false,
        }
    }
}

impl<'a, 'm, M, V, D> Operator for Snapper<'a, 'm, M, V, D>
where
    M: Mesh,
    V: Fn(&M, EntityId) -> bool,
    D: Digger<M>,
{
    fn target_dimension(&self) -> usize {
        0
    }

    fn should_apply(&mut self, e: EntityId) -> bool {
        if !self.ctx.has_snap_flag(e) {
            return false;
        }
        self.vert = Some(e);
        true
    }

    fn request_locality(&mut self, cav: &mut dyn CavityOp) -> bool {
        let Some(v) = self.vert else {
            return false;
        };
        match self.digger.as_mut() {
            Some(d) => d.set_vert(v, cav),
            None => cav.request_locality(&[v]),
        }
    }

    fn apply(&mut self) {
        let Some(v) = self.vert else {
            return;
        };
        let mut snapped = false;
        match self.digger.as_mut() {
            Some(d) => {
                if d.run(&mut *self.ctx.mesh) {
                    self.did_anything = true;
                    snapped = try_snapping(self.ctx, self.tag, v);
                    log::trace!("digging succeeded around vertex {v}");
                } else {
                    log::trace!("digging failed around vertex {v}");
                }
            }
            None => {
                snapped = try_snapping(self.ctx, self.tag, v);
            }
        }
        if snapped {
            self.did_anything = true;
            self.success_count += 1;
        }
        // Cleared no matter what; retries re-mark from the target tag.
        self.ctx.clear_snap_flag(v);
    }
}
