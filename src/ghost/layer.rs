//! Layered ghost planning: breadth-first bands around partition
//! boundaries.
//!
//! Every shared bridge entity seeds a band: its upward ghost-dimension
//! neighbors are layer one, and each further layer expands by
//! second-order adjacency through the bridge dimension. Everything
//! accepted is planned toward every remote part of the seed bridge, so a
//! part ends up holding `num_layers` bridge-connected layers around each
//! boundary it touches.

use super::exchange::{ghost_create, GhostCommTags};
use super::plan::Ghosting;
use super::GhostRegistry;
use crate::comm::Communicator;
use crate::error::MeshHaloError;
use crate::mesh::{EntityId, Mesh, PartId};
use hashbrown::HashSet;
use std::time::Instant;

/// Build and execute a layered ghost plan.
///
/// `bridge_dim` must lie below `ghost_dim`, which must be a positive
/// dimension of the mesh; `num_layers >= 1`. Invalid combinations are
/// reported on rank 0 and the mesh is left untouched. Unless
/// `include_copy` is set, only bridges owned locally seed expansion.
///
/// Collective over `comm`.
pub fn ghost_create_layer<M, C>(
    m: &mut M,
    bridge_dim: usize,
    ghost_dim: usize,
    num_layers: usize,
    include_copy: bool,
    reg: &mut GhostRegistry,
    comm: &C,
    tags: GhostCommTags,
) -> Result<(), MeshHaloError>
where
    M: Mesh,
    C: Communicator,
{
    if comm.size() == 1 || num_layers == 0 {
        return Ok(());
    }
    let mesh_dim = m.dimension();
    if bridge_dim >= ghost_dim || bridge_dim >= mesh_dim || ghost_dim > mesh_dim || ghost_dim < 1
    {
        if comm.rank() == 0 {
            log::error!(
                "invalid bridge/ghost dimensions ({bridge_dim}, {ghost_dim}) for a {mesh_dim}d mesh"
            );
        }
        return Ok(());
    }

    let start = Instant::now();
    let mut plan = Ghosting::new(m, ghost_dim);
    let self_part = m.part_id();

    for bridge in m.entities(bridge_dim) {
        if !m.is_shared(bridge) {
            continue;
        }
        if !include_copy && m.owner(bridge) != self_part {
            continue;
        }
        let remotes: Vec<PartId> = m.remotes(bridge).iter().map(|&(p, _)| p).collect();

        // Layer one: ghost-dimension entities touching the bridge.
        let mut seen: HashSet<EntityId> = HashSet::new();
        let mut processed: Vec<EntityId> = Vec::new();
        for g in m.upward(bridge, ghost_dim) {
            if m.is_ghost(g) {
                continue;
            }
            for &p in &remotes {
                plan.send(m, g, p);
            }
            seen.insert(g);
            processed.push(g);
        }

        // Layers two and up: expand the previous layer through the bridge
        // dimension.
        let mut prev_start = 0;
        for _layer in 2..=num_layers {
            let prev_end = processed.len();
            for i in prev_start..prev_end {
                let g = processed[i];
                for a in m.second_adjacent(g, bridge_dim, ghost_dim) {
                    if m.is_ghost(a) || seen.contains(&a) {
                        continue;
                    }
                    for &p in &remotes {
                        plan.send(m, a, p);
                    }
                    seen.insert(a);
                    processed.push(a);
                }
            }
            prev_start = prev_end;
        }
    }

    ghost_create(m, plan, reg, comm, tags)?;
    log::info!(
        "ghost layer construction took {:.6} seconds",
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
