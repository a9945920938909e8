//! Vertex snapping: move mesh vertices onto the geometric model without
//! invalidating elements.
//!
//! The driver runs two phases, each to global quiescence. Phase one tries
//! plain snaps: cheap per-vertex validity checking against the elements
//! around the vertex, which handles the vast majority. Phase two turns on
//! digging, a two-layer cavity modification that opens space for the
//! stubborn remainder. Termination: applying the operator always clears
//! the SNAP flag, and a retry requires re-marking from the target tag,
//! which only survives on unsnapped vertices.

pub mod param;
pub mod planner;
pub mod snapper;

pub use planner::{mark_verts_to_snap, tag_verts_to_snap, SNAP_TAG_NAME};
pub use snapper::{apply_operator, CavityOp, Digger, LocalCavity, NoDigger, Operator, Snapper};

use crate::comm::bulk::{add_i64, or_reduce};
use crate::comm::{CommTag, Communicator};
use crate::error::MeshHaloError;
use crate::mesh::{EntityId, Mesh, TagId};
use std::collections::HashSet;

/// Snap context: the mesh under modification, the element validity
/// predicate, and the per-round scratch flags.
///
/// Replaces the original's process-wide adapter state with an explicit
/// object threaded through the operations.
pub struct Snap<'m, M, V>
where
    M: Mesh,
    V: Fn(&M, EntityId) -> bool,
{
    pub mesh: &'m mut M,
    pub(crate) is_element_valid: V,
    layer: HashSet<EntityId>,
    snap_flags: HashSet<EntityId>,
}

impl<'m, M, V> Snap<'m, M, V>
where
    M: Mesh,
    V: Fn(&M, EntityId) -> bool,
{
    pub fn new(mesh: &'m mut M, is_element_valid: V) -> Self {
        Self {
            mesh,
            is_element_valid,
            layer: HashSet::new(),
            snap_flags: HashSet::new(),
        }
    }

    /// Exclude a boundary-layer vertex from snapping.
    pub fn mark_layer(&mut self, v: EntityId) {
        self.layer.insert(v);
    }

    pub fn is_layer(&self, v: EntityId) -> bool {
        self.layer.contains(&v)
    }

    pub(crate) fn set_snap_flag(&mut self, v: EntityId) {
        self.snap_flags.insert(v);
    }

    pub(crate) fn clear_snap_flag(&mut self, v: EntityId) {
        self.snap_flags.remove(&v);
    }

    pub(crate) fn has_snap_flag(&self, v: EntityId) -> bool {
        self.snap_flags.contains(&v)
    }
}

/// Outcome of a snap run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SnapSummary {
    /// Vertices moved onto the model (global, owned).
    pub snapped: i64,
    /// Vertices initially needing a move (global, owned).
    pub target: i64,
}

/// One collective round: mark tagged vertices, apply the operator, and
/// reduce progress across parts.
fn snap_round<M, V, D, C>(
    ctx: &mut Snap<'_, M, V>,
    tag: TagId,
    digger: Option<&mut D>,
    comm: &C,
    reduce: CommTag,
) -> Result<(bool, i64), MeshHaloError>
where
    M: Mesh,
    V: Fn(&M, EntityId) -> bool,
    D: Digger<M>,
    C: Communicator,
{
    mark_verts_to_snap(ctx, tag);
    let candidates = ctx.mesh.entities(0);
    let mut snapper = Snapper::new(ctx, tag, digger);
    apply_operator(&candidates, &mut snapper, &mut LocalCavity);
    let n = snapper.success_count;
    let any = snapper.did_anything;
    let n = add_i64(comm, reduce, n)?;
    let any = or_reduce(comm, reduce, any)?;
    Ok((any, n))
}

/// Snap every off-model vertex onto the geometric model.
///
/// Collective over `comm`. Pass [`NoDigger`] when no dig collaborator is
/// available; phase two then quiesces immediately. Returns the global
/// snapped/target counts and logs the summary line.
pub fn snap<M, V, D, C>(
    ctx: &mut Snap<'_, M, V>,
    digger: &mut D,
    comm: &C,
    base: CommTag,
) -> Result<SnapSummary, MeshHaloError>
where
    M: Mesh,
    V: Fn(&M, EntityId) -> bool,
    D: Digger<M>,
    C: Communicator,
{
    let (tag, target) = tag_verts_to_snap(ctx, comm, base)?;
    let mut snapped = 0i64;
    loop {
        let (progress, n) = snap_round::<M, V, D, C>(ctx, tag, None, comm, base)?;
        snapped += n;
        if !progress {
            break;
        }
    }
    loop {
        let (progress, n) = snap_round(ctx, tag, Some(&mut *digger), comm, base)?;
        snapped += n;
        if !progress {
            break;
        }
    }
    ctx.mesh.destroy_tag(tag);
    log::info!("snapped {snapped} of {target} vertices");
    Ok(SnapSummary { snapped, target })
}
