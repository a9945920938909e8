//! Snap planning: decide which vertices need to move.

use super::Snap;
use crate::comm::bulk::add_i64;
use crate::comm::{CommTag, Communicator};
use crate::error::MeshHaloError;
use crate::mesh::{EntityId, Mesh, TagId, TagKind};

/// Name of the 3-double tag carrying a vertex's snap target position.
pub const SNAP_TAG_NAME: &str = "ma_snap";

/// Model projection of a vertex's parametric coordinate.
fn snap_point<M: Mesh>(m: &M, v: EntityId) -> [f64; 3] {
    let class = m.classification(v);
    let p = m.param(v);
    m.snap_to_model(class, p)
}

/// Create the snap target tag and populate it on every vertex whose
/// position differs from its model projection.
///
/// Boundary-layer vertices and vertices classified on a model entity of
/// mesh dimension are skipped; a vertex already sitting exactly on its
/// projection is not a candidate. Returns the tag and the global count of
/// owned candidates (collective).
pub fn tag_verts_to_snap<M, V, C>(
    ctx: &mut Snap<'_, M, V>,
    comm: &C,
    reduce: CommTag,
) -> Result<(TagId, i64), MeshHaloError>
where
    M: Mesh,
    V: Fn(&M, EntityId) -> bool,
    C: Communicator,
{
    let dim = ctx.mesh.dimension();
    let tag = ctx.mesh.create_tag(SNAP_TAG_NAME, TagKind::Double, 3);
    let mut n = 0i64;
    for v in ctx.mesh.entities(0) {
        if ctx.is_layer(v) {
            continue;
        }
        if ctx.mesh.classification(v).dim == dim {
            continue;
        }
        let s = snap_point(ctx.mesh, v);
        let x = ctx.mesh.point(v);
        if s == x {
            continue;
        }
        ctx.mesh.set_doubles(v, tag, &s);
        if ctx.mesh.is_owned(v) {
            n += 1;
        }
    }
    let n = add_i64(comm, reduce, n)?;
    Ok((tag, n))
}

/// Raise the SNAP flag on every vertex still carrying the target tag.
pub fn mark_verts_to_snap<M, V>(ctx: &mut Snap<'_, M, V>, tag: TagId)
where
    M: Mesh,
    V: Fn(&M, EntityId) -> bool,
{
    for v in ctx.mesh.entities(0) {
        if ctx.mesh.has_tag(v, tag) {
            ctx.set_snap_flag(v);
        }
    }
}
