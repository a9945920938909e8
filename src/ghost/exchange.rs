//! The ghost exchanger: pack, ship, and install ghost copies.
//!
//! Dimensions are processed lowest first so the boundary of a ghosted
//! element is already present on the receiver when the element arrives:
//! a packed non-vertex references its downward entities by the handles
//! they carry *on the destination part*, resolved through the sender's
//! remote and ghost tables. The acknowledgement pass of each dimension
//! installs those ghost handles before the next dimension packs.

use super::collect::collect_entities;
use super::plan::Ghosting;
use super::wire::{unpack_record, WireEcho, WireEntityHdr};
use super::GhostRegistry;
use crate::comm::bulk::{Message, Outbox, PackBytes, PhaseTags};
use crate::comm::{CommTag, Communicator};
use crate::error::MeshHaloError;
use crate::mesh::{
    EntityId, EntityType, Mesh, ModelEntity, PartId, TagData, TagId, GHOSTED_TAG_NAME,
    GHOST_TAG_NAME,
};
use std::collections::BTreeSet;

/// Tag bundle for the three exchange phases of ghost creation.
#[derive(Copy, Clone, Debug)]
pub struct GhostCommTags {
    /// Destination-set reconciliation (collector).
    pub collect: PhaseTags,
    /// Entity + tag payloads.
    pub entities: PhaseTags,
    /// Acknowledgement echoes.
    pub ack: PhaseTags,
}

impl GhostCommTags {
    #[inline]
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            collect: PhaseTags::from_base(base),
            entities: PhaseTags::from_base(base.offset(2)),
            ack: PhaseTags::from_base(base.offset(4)),
        }
    }
}

/// Bookkeeping tags are never shipped; everything else on the entity is.
fn is_internal_tag(name: &str) -> bool {
    name == super::PARTS_INDEX_TAG_NAME || name == GHOST_TAG_NAME || name == GHOSTED_TAG_NAME
}

/// Handle of `e` on `part`, through the remote table first and the ghost
/// table second.
fn handle_on<M: Mesh>(m: &M, e: EntityId, part: PartId) -> Result<EntityId, MeshHaloError> {
    if let Some(&(_, h)) = m.remotes(e).iter().find(|&&(p, _)| p == part) {
        return Ok(h);
    }
    if let Some(&(_, h)) = m.ghosts(e).iter().find(|&&(p, _)| p == part) {
        return Ok(h);
    }
    Err(MeshHaloError::UnresolvedDownward {
        entity: e.get(),
        part,
    })
}

fn pack_tag_block<M: Mesh>(m: &M, e: EntityId, user_tags: &[TagId], buf: &mut Vec<u8>) {
    let present: Vec<TagId> = user_tags
        .iter()
        .copied()
        .filter(|&t| m.has_tag(e, t))
        .collect();
    buf.pack_u32(present.len() as u32);
    for t in present {
        let name = m.tag_name(t);
        buf.pack_u32(name.len() as u32);
        buf.extend_from_slice(name.as_bytes());
        let data = m.get_tag(e, t).expect("tag vanished while packing");
        match data {
            TagData::Ints(v) => {
                buf.pack_u16(0).pack_u32(v.len() as u32);
                for x in v {
                    buf.pack_i32(x);
                }
            }
            TagData::Longs(v) => {
                buf.pack_u16(1).pack_u32(v.len() as u32);
                for x in v {
                    buf.pack_i64(x);
                }
            }
            TagData::Doubles(v) => {
                buf.pack_u16(2).pack_u32(v.len() as u32);
                for x in v {
                    buf.pack_f64(x);
                }
            }
        }
    }
}

fn unpack_tag_block<M: Mesh>(
    m: &mut M,
    e: EntityId,
    msg: &mut Message,
) -> Result<(), MeshHaloError> {
    let ntags = msg.unpack_u32()?;
    for _ in 0..ntags {
        let name_len = msg.unpack_u32()? as usize;
        let name = {
            let bytes = msg.take(name_len)?;
            std::str::from_utf8(bytes)
                .map_err(|_| MeshHaloError::WireFormat("tag name is not UTF-8".into()))?
                .to_owned()
        };
        let kind_code = msg.unpack_u16()?;
        let n = msg.unpack_u32()? as usize;
        let data = match kind_code {
            0 => {
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    v.push(msg.unpack_i32()?);
                }
                TagData::Ints(v)
            }
            1 => {
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    v.push(msg.unpack_i64()?);
                }
                TagData::Longs(v)
            }
            2 => {
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    v.push(msg.unpack_f64()?);
                }
                TagData::Doubles(v)
            }
            other => {
                return Err(MeshHaloError::WireFormat(format!(
                    "unknown tag kind code {other}"
                )));
            }
        };
        let tag = match m.find_tag(&name) {
            Some(t) => t,
            None => m.create_tag(&name, data.kind(), data.len()),
        };
        m.set_tag(e, tag, data);
    }
    Ok(())
}

/// Pack one entity, bound for `to`: header, residence, geometry or
/// receiver-local downward handles, then the user tags.
fn pack_entity<M: Mesh>(
    m: &M,
    e: EntityId,
    to: PartId,
    user_tags: &[TagId],
    buf: &mut Vec<u8>,
) -> Result<(), MeshHaloError> {
    let ty = m.entity_type(e);
    let class = m.classification(e);
    let hdr = WireEntityHdr::new(e.get(), ty.to_code(), class.dim as u16, class.tag);
    buf.extend_from_slice(bytemuck::bytes_of(&hdr));

    let res = m.residence(e);
    buf.pack_u32(res.len() as u32);
    for p in res {
        buf.pack_u32(p as u32);
    }

    if ty == EntityType::Vertex {
        for x in m.point(e) {
            buf.pack_f64(x);
        }
        for x in m.param(e) {
            buf.pack_f64(x);
        }
    } else {
        let down = m.downward(e, ty.dimension() - 1);
        buf.pack_u32(down.len() as u32);
        for d in down {
            buf.pack_entity(handle_on(m, d, to)?);
        }
    }

    pack_tag_block(m, e, user_tags, buf);
    Ok(())
}

/// Send pass for one dimension: the owner of each planned entity ships it
/// to every destination that does not already hold a copy.
fn send_entities<M, C>(
    m: &M,
    plan: &Ghosting,
    dim: usize,
    bucket: &[EntityId],
    user_tags: &[TagId],
    out: &mut Outbox<'_, C>,
) -> Result<(), MeshHaloError>
where
    M: Mesh,
    C: Communicator,
{
    let me = m.part_id();
    for &e in bucket {
        // A peer reconciling a ghost bound for this very part leaves the
        // entity bucketed without destinations; nothing to send then.
        if !plan.has(m, e) {
            continue;
        }
        let mut res_parts: BTreeSet<PartId> = BTreeSet::new();
        if m.is_shared(e) {
            // Let the owner part send the ghost copy.
            if me != m.owner(e) {
                continue;
            }
            for (p, _) in m.remotes(e) {
                res_parts.insert(p);
            }
            res_parts.insert(me);
        }
        if m.is_ghosted(e) {
            for (p, _) in m.ghosts(e) {
                res_parts.insert(p);
            }
        }
        for &to in plan.sending(m, e, dim).difference(&res_parts) {
            if to == me {
                continue;
            }
            pack_entity(m, e, to, user_tags, out.to(to))?;
        }
    }
    Ok(())
}

/// Construct a ghost copy from one packed record.
fn unpack_ghost<M: Mesh>(
    m: &mut M,
    reg: &mut GhostRegistry,
    ghost_tag: TagId,
    from: PartId,
    msg: &mut Message,
) -> Result<EntityId, MeshHaloError> {
    let hdr: WireEntityHdr = unpack_record(msg)?;
    let sender = EntityId::new(hdr.sender())?;
    let ty = EntityType::from_code(hdr.kind())?;
    let class = ModelEntity {
        dim: hdr.model_dim() as usize,
        tag: hdr.model_tag(),
    };

    let nres = msg.unpack_u32()? as usize;
    let mut residence = BTreeSet::new();
    for _ in 0..nres {
        residence.insert(msg.unpack_u32()? as PartId);
    }

    let entity = if ty == EntityType::Vertex {
        let mut point = [0.0; 3];
        let mut param = [0.0; 3];
        for x in &mut point {
            *x = msg.unpack_f64()?;
        }
        for x in &mut param {
            *x = msg.unpack_f64()?;
        }
        m.create_vertex(class, point, param)
    } else {
        let ndown = msg.unpack_u32()? as usize;
        let mut down = Vec::with_capacity(ndown);
        for _ in 0..ndown {
            down.push(msg.unpack_entity()?);
        }
        m.create_entity(ty, class, &down)
    };

    residence.insert(from);
    m.set_residence(entity, residence);
    unpack_tag_block(m, entity, msg)?;

    // The sender's handle is the ghost counterpart of this new copy.
    m.add_ghost(entity, from, sender);
    reg.push_ghost(ty.dimension(), entity);
    m.set_ints(entity, ghost_tag, &[from as i32]);
    Ok(entity)
}

/// Acknowledgement pass: each receiver echoes (sender handle, new local
/// handle) so the sender installs the reciprocal ghost pointer.
fn setup_ghosts<M, C>(
    m: &mut M,
    reg: &mut GhostRegistry,
    ghosted_tag: TagId,
    received: &[EntityId],
    comm: &C,
    tags: PhaseTags,
) -> Result<(), MeshHaloError>
where
    M: Mesh,
    C: Communicator,
{
    let mut out = Outbox::begin(comm, tags);
    for &entity in received {
        // The ghost table currently holds exactly the sender entry.
        let Some(&(to, sender)) = m.ghosts(entity).first() else {
            continue;
        };
        let echo = WireEcho::new(sender.get(), entity.get());
        out.to(to).extend_from_slice(bytemuck::bytes_of(&echo));
    }
    let inbox = out.send()?;
    for mut msg in inbox.messages() {
        let from = msg.from;
        while msg.remaining() > 0 {
            let echo: WireEcho = unpack_record(&mut msg)?;
            let original = EntityId::new(echo.original())?;
            let ghost_handle = EntityId::new(echo.ghost())?;
            m.add_ghost(original, from, ghost_handle);
            // ghosted_tag is an is-ghosted boolean; the ghost table holds
            // the full recipient set.
            if !m.has_tag(original, ghosted_tag) {
                reg.push_ghosted(m.entity_dim(original), original);
                m.set_ints(original, ghosted_tag, &[from as i32]);
            }
        }
    }
    Ok(())
}

/// Execute a ghosting plan: collect, then per dimension send, receive,
/// and acknowledge. Consumes the plan and commits the mesh.
///
/// Collective over `comm`; every part must pass a plan of the same ghost
/// dimension and the same tag bundle.
pub fn ghost_create<M, C>(
    m: &mut M,
    mut plan: Ghosting,
    reg: &mut GhostRegistry,
    comm: &C,
    tags: GhostCommTags,
) -> Result<(), MeshHaloError>
where
    M: Mesh,
    C: Communicator,
{
    if comm.size() == 1 {
        plan.destroy(m);
        return Ok(());
    }

    let buckets = collect_entities(m, &mut plan, comm, tags.collect)?;
    #[cfg(any(debug_assertions, feature = "check-invariants"))]
    plan.validate_invariants(m);

    let ghost_tag = m
        .find_tag(GHOST_TAG_NAME)
        .ok_or(MeshHaloError::MissingTag(GHOST_TAG_NAME))?;
    let ghosted_tag = m
        .find_tag(GHOSTED_TAG_NAME)
        .ok_or(MeshHaloError::MissingTag(GHOSTED_TAG_NAME))?;
    let user_tags: Vec<TagId> = m
        .tag_list()
        .into_iter()
        .filter(|&t| !is_internal_tag(&m.tag_name(t)))
        .collect();

    for dim in 0..=plan.ghost_dim() {
        let mut out = Outbox::begin(comm, tags.entities);
        send_entities(m, &plan, dim, &buckets[dim], &user_tags, &mut out)?;
        let inbox = out.send()?;

        let mut received = Vec::new();
        for mut msg in inbox.messages() {
            let from = msg.from;
            while msg.remaining() > 0 {
                received.push(unpack_ghost(m, reg, ghost_tag, from, &mut msg)?);
            }
        }

        setup_ghosts(m, reg, ghosted_tag, &received, comm, tags.ack)?;
    }

    plan.destroy(m);
    m.commit();
    Ok(())
}
