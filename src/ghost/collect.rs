//! Ghost collection: expand the user's plan to everything that must ship.
//!
//! Two processes may independently need to ghost the same shared entity
//! to different targets; both must ship it consistently and record the
//! full set of resulting residences. Hence the per-dimension
//! reconciliation pass after the downward expansion.

use super::plan::Ghosting;
use crate::comm::bulk::{Outbox, PackBytes, PhaseTags};
use crate::comm::Communicator;
use crate::error::MeshHaloError;
use crate::mesh::{EntityId, Mesh, PartId};
use hashbrown::HashSet;

/// Expand `plan` to the full downward closure of its top-level entries
/// and unify destination sets across shared copies. Returns the entities
/// to send, bucketed by dimension.
///
/// Collective over `comm`: every part must call with a plan of the same
/// ghost dimension.
pub fn collect_entities<M, C>(
    m: &mut M,
    plan: &mut Ghosting,
    comm: &C,
    tags: PhaseTags,
) -> Result<[Vec<EntityId>; 4], MeshHaloError>
where
    M: Mesh,
    C: Communicator,
{
    let ghost_dim = plan.ghost_dim();
    let mut buckets: [Vec<EntityId>; 4] = Default::default();
    let mut marked: HashSet<EntityId> = HashSet::new();

    // Seed with every planned entity of the ghost dimension. Seeds are
    // marked too, so a reconciliation echo cannot insert one twice.
    for e in m.entities(ghost_dim) {
        if plan.has(m, e) {
            marked.insert(e);
            buckets[ghost_dim].push(e);
        }
    }

    // Propagate the ghost requirement down the closure of each seed.
    let seeds = buckets[ghost_dim].clone();
    for g in seeds {
        let dests: Vec<PartId> = plan.sending(m, g, ghost_dim).iter().copied().collect();
        for down in m.downward_closure(g) {
            let d = m.entity_dim(down);
            if marked.insert(down) {
                buckets[d].push(down);
            }
            for &p in &dests {
                plan.send(m, down, p);
            }
        }
    }

    // Reconcile shared copies, one dimension at a time: tell every remote
    // copy our current destination set for each shared entity, and merge
    // whatever the peers tell us.
    for dim in 0..=ghost_dim {
        let mut out = Outbox::begin(comm, tags);
        let snapshot = buckets[dim].clone();
        for e in snapshot {
            if !m.is_shared(e) {
                continue;
            }
            let dests: Vec<PartId> = plan.sending(m, e, dim).iter().copied().collect();
            for (p, remote_handle) in m.remotes(e) {
                let buf = out.to(p);
                buf.pack_entity(remote_handle);
                buf.pack_u32(dests.len() as u32);
                for &pid in &dests {
                    buf.pack_u32(pid as u32);
                }
            }
        }
        let inbox = out.send()?;
        for mut msg in inbox.messages() {
            while msg.remaining() > 0 {
                let local = msg.unpack_entity()?;
                let n = msg.unpack_u32()? as usize;
                if marked.insert(local) {
                    buckets[dim].push(local);
                }
                for _ in 0..n {
                    let pid = msg.unpack_u32()? as PartId;
                    plan.send(m, local, pid);
                }
            }
        }
    }

    Ok(buckets)
}
