//! Bulk-synchronous phases over a [`Communicator`].
//!
//! Each protocol phase packs per-peer byte streams into an [`Outbox`];
//! `send` runs a symmetric size exchange (every rank tells every other
//! rank how many bytes to expect) followed by the payload exchange, and
//! returns an [`Inbox`] of received [`Message`]s. Integer reductions
//! (`add_i64`, `or_reduce`, `exscan_i64`) gather to rank 0 and scatter
//! the result.
//!
//! All ranks must enter every phase of a protocol, even with nothing to
//! send; the size exchange is what lets receivers stop waiting.

use super::{CommTag, Communicator, Wait};
use crate::error::MeshHaloError;
use crate::mesh::{EntityId, PartId};
use std::collections::BTreeMap;

/// Tag pair for one exchange phase: sizes first, then payloads.
#[derive(Copy, Clone, Debug)]
pub struct PhaseTags {
    pub sizes: CommTag,
    pub data: CommTag,
}

impl PhaseTags {
    #[inline]
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            sizes: base,
            data: base.offset(1),
        }
    }
}

/// Little-endian append helpers for packing wire payloads.
pub trait PackBytes {
    fn pack_u16(&mut self, v: u16) -> &mut Self;
    fn pack_u32(&mut self, v: u32) -> &mut Self;
    fn pack_u64(&mut self, v: u64) -> &mut Self;
    fn pack_i32(&mut self, v: i32) -> &mut Self;
    fn pack_i64(&mut self, v: i64) -> &mut Self;
    fn pack_f64(&mut self, v: f64) -> &mut Self;
    fn pack_entity(&mut self, e: EntityId) -> &mut Self;
}

impl PackBytes for Vec<u8> {
    #[inline]
    fn pack_u16(&mut self, v: u16) -> &mut Self {
        self.extend_from_slice(&v.to_le_bytes());
        self
    }
    #[inline]
    fn pack_u32(&mut self, v: u32) -> &mut Self {
        self.extend_from_slice(&v.to_le_bytes());
        self
    }
    #[inline]
    fn pack_u64(&mut self, v: u64) -> &mut Self {
        self.extend_from_slice(&v.to_le_bytes());
        self
    }
    #[inline]
    fn pack_i32(&mut self, v: i32) -> &mut Self {
        self.extend_from_slice(&v.to_le_bytes());
        self
    }
    #[inline]
    fn pack_i64(&mut self, v: i64) -> &mut Self {
        self.extend_from_slice(&v.to_le_bytes());
        self
    }
    #[inline]
    fn pack_f64(&mut self, v: f64) -> &mut Self {
        self.extend_from_slice(&v.to_bits().to_le_bytes());
        self
    }
    #[inline]
    fn pack_entity(&mut self, e: EntityId) -> &mut Self {
        self.pack_u64(e.get())
    }
}

/// Per-peer outgoing byte streams for one phase.
pub struct Outbox<'c, C: Communicator> {
    comm: &'c C,
    tags: PhaseTags,
    bufs: BTreeMap<PartId, Vec<u8>>,
}

impl<'c, C: Communicator> Outbox<'c, C> {
    pub fn begin(comm: &'c C, tags: PhaseTags) -> Self {
        Self {
            comm,
            tags,
            bufs: BTreeMap::new(),
        }
    }

    /// The byte stream bound for `peer`. Self-sends are a protocol error.
    pub fn to(&mut self, peer: PartId) -> &mut Vec<u8> {
        debug_assert_ne!(peer, self.comm.rank(), "self-sends are elided upstream");
        debug_assert!(peer < self.comm.size());
        self.bufs.entry(peer).or_default()
    }

    /// Complete the phase: exchange sizes with every peer, then payloads.
    /// Collective: every rank must call this exactly once per phase.
    pub fn send(self) -> Result<Inbox, MeshHaloError> {
        let me = self.comm.rank();
        let n = self.comm.size();

        let mut size_recvs = Vec::new();
        for r in (0..n).filter(|&r| r != me) {
            let mut b = [0u8; 4];
            size_recvs.push((r, self.comm.irecv(r, self.tags.sizes.as_u16(), &mut b)));
        }
        let mut size_sends = Vec::new();
        for r in (0..n).filter(|&r| r != me) {
            let count = self.bufs.get(&r).map_or(0, |v| v.len()) as u32;
            size_sends.push(
                self.comm
                    .isend(r, self.tags.sizes.as_u16(), &count.to_le_bytes()),
            );
        }
        let mut incoming = Vec::new();
        for (r, h) in size_recvs {
            let data = h.wait().ok_or_else(|| MeshHaloError::CommError {
                neighbor: r,
                detail: "size receive returned no data".into(),
            })?;
            if data.len() != 4 {
                return Err(MeshHaloError::CommError {
                    neighbor: r,
                    detail: format!("size message was {} bytes, expected 4", data.len()),
                });
            }
            let mut arr = [0u8; 4];
            arr.copy_from_slice(&data);
            let len = u32::from_le_bytes(arr) as usize;
            if len > 0 {
                incoming.push((r, len));
            }
        }

        let mut data_recvs = Vec::new();
        for &(r, len) in &incoming {
            let mut b = vec![0u8; len];
            data_recvs.push((r, len, self.comm.irecv(r, self.tags.data.as_u16(), &mut b)));
        }
        let mut data_sends = Vec::new();
        for (&r, buf) in &self.bufs {
            if !buf.is_empty() {
                data_sends.push(self.comm.isend(r, self.tags.data.as_u16(), buf));
            }
        }
        let mut msgs = Vec::new();
        for (r, len, h) in data_recvs {
            let data = h.wait().ok_or_else(|| MeshHaloError::CommError {
                neighbor: r,
                detail: "payload receive returned no data".into(),
            })?;
            if data.len() != len {
                return Err(MeshHaloError::CommError {
                    neighbor: r,
                    detail: format!("payload was {} bytes, expected {len}", data.len()),
                });
            }
            msgs.push((r, data));
        }
        for h in size_sends {
            let _ = h.wait();
        }
        for h in data_sends {
            let _ = h.wait();
        }
        Ok(Inbox { msgs })
    }
}

/// Received messages for one phase, in peer order.
pub struct Inbox {
    msgs: Vec<(PartId, Vec<u8>)>,
}

impl Inbox {
    pub fn is_empty(&self) -> bool {
        self.msgs.is_empty()
    }

    pub fn messages(self) -> impl Iterator<Item = Message> {
        self.msgs.into_iter().map(|(from, buf)| Message {
            from,
            buf,
            pos: 0,
        })
    }
}

/// A received byte stream with an unpack cursor.
pub struct Message {
    pub from: PartId,
    buf: Vec<u8>,
    pos: usize,
}

impl Message {
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&[u8], MeshHaloError> {
        if self.pos + n > self.buf.len() {
            return Err(MeshHaloError::WireFormat(format!(
                "message from part {} truncated: wanted {n} bytes, {} left",
                self.from,
                self.remaining()
            )));
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn unpack_u16(&mut self) -> Result<u16, MeshHaloError> {
        let mut arr = [0u8; 2];
        arr.copy_from_slice(self.take(2)?);
        Ok(u16::from_le_bytes(arr))
    }

    pub fn unpack_u32(&mut self) -> Result<u32, MeshHaloError> {
        let mut arr = [0u8; 4];
        arr.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(arr))
    }

    pub fn unpack_u64(&mut self) -> Result<u64, MeshHaloError> {
        let mut arr = [0u8; 8];
        arr.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(arr))
    }

    pub fn unpack_i32(&mut self) -> Result<i32, MeshHaloError> {
        Ok(self.unpack_u32()? as i32)
    }

    pub fn unpack_i64(&mut self) -> Result<i64, MeshHaloError> {
        Ok(self.unpack_u64()? as i64)
    }

    pub fn unpack_f64(&mut self) -> Result<f64, MeshHaloError> {
        Ok(f64::from_bits(self.unpack_u64()?))
    }

    pub fn unpack_entity(&mut self) -> Result<EntityId, MeshHaloError> {
        EntityId::new(self.unpack_u64()?)
    }
}

/// Global sum of `value` across all ranks.
pub fn add_i64<C: Communicator>(
    comm: &C,
    tag: CommTag,
    value: i64,
) -> Result<i64, MeshHaloError> {
    let n = comm.size();
    if n <= 1 {
        return Ok(value);
    }
    if comm.rank() == 0 {
        let mut total = value;
        for r in 1..n {
            total += recv_i64(comm, r, tag)?;
        }
        let sends: Vec<_> = (1..n)
            .map(|r| comm.isend(r, tag.as_u16(), &total.to_le_bytes()))
            .collect();
        for s in sends {
            let _ = s.wait();
        }
        Ok(total)
    } else {
        let s = comm.isend(0, tag.as_u16(), &value.to_le_bytes());
        let total = recv_i64(comm, 0, tag)?;
        let _ = s.wait();
        Ok(total)
    }
}

/// Global logical-or of `flag` across all ranks.
pub fn or_reduce<C: Communicator>(
    comm: &C,
    tag: CommTag,
    flag: bool,
) -> Result<bool, MeshHaloError> {
    Ok(add_i64(comm, tag, flag as i64)? > 0)
}

/// Exclusive prefix scan: rank r receives the sum of `value` over ranks
/// `0..r` (rank 0 receives 0).
pub fn exscan_i64<C: Communicator>(
    comm: &C,
    tag: CommTag,
    value: i64,
) -> Result<i64, MeshHaloError> {
    let n = comm.size();
    if n <= 1 {
        return Ok(0);
    }
    if comm.rank() == 0 {
        let mut prefix = value;
        let mut sends = Vec::new();
        for r in 1..n {
            sends.push(comm.isend(r, tag.as_u16(), &prefix.to_le_bytes()));
            prefix += recv_i64(comm, r, tag)?;
        }
        for s in sends {
            let _ = s.wait();
        }
        Ok(0)
    } else {
        let s = comm.isend(0, tag.as_u16(), &value.to_le_bytes());
        let prefix = recv_i64(comm, 0, tag)?;
        let _ = s.wait();
        Ok(prefix)
    }
}

fn recv_i64<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
) -> Result<i64, MeshHaloError> {
    let mut b = [0u8; 8];
    let h = comm.irecv(peer, tag.as_u16(), &mut b);
    let data = h.wait().ok_or_else(|| MeshHaloError::CommError {
        neighbor: peer,
        detail: "reduction receive returned no data".into(),
    })?;
    if data.len() != 8 {
        return Err(MeshHaloError::CommError {
            neighbor: peer,
            detail: format!("reduction message was {} bytes, expected 8", data.len()),
        });
    }
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&data);
    Ok(i64::from_le_bytes(arr))
}
