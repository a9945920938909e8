//! Fixed, little-endian wire records for the ghost protocols.
//!
//! All multi-byte integers are LE fixed width. Fixed-shape records are
//! `#[repr(C)]` + `bytemuck::Pod`; variable-length parts (destination
//! sets, residence sets, downward lists, tag blocks) are packed through
//! [`PackBytes`](crate::comm::bulk::PackBytes) under the same
//! conventions.

use crate::comm::bulk::Message;
use crate::error::MeshHaloError;
use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

/// Leading record of a packed ghost entity: the sender's handle, the
/// entity kind, and its model classification.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireEntityHdr {
    pub sender_le: u64,
    pub kind_le: u16,
    pub model_dim_le: u16,
    pub model_tag_le: i32,
}

impl WireEntityHdr {
    pub fn new(sender: u64, kind: u16, model_dim: u16, model_tag: i32) -> Self {
        Self {
            sender_le: sender.to_le(),
            kind_le: kind.to_le(),
            model_dim_le: model_dim.to_le(),
            model_tag_le: model_tag.to_le(),
        }
    }

    pub fn sender(&self) -> u64 {
        u64::from_le(self.sender_le)
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn model_dim(&self) -> u16 {
        u16::from_le(self.model_dim_le)
    }
    pub fn model_tag(&self) -> i32 {
        i32::from_le(self.model_tag_le)
    }
}

/// Acknowledgement record: the sender's original handle and the handle of
/// the freshly created ghost copy on the receiver.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireEcho {
    pub original_le: u64,
    pub ghost_le: u64,
}

impl WireEcho {
    pub fn new(original: u64, ghost: u64) -> Self {
        Self {
            original_le: original.to_le(),
            ghost_le: ghost.to_le(),
        }
    }

    pub fn original(&self) -> u64 {
        u64::from_le(self.original_le)
    }
    pub fn ghost(&self) -> u64 {
        u64::from_le(self.ghost_le)
    }
}

/// Read a Pod record from a message cursor (unaligned).
pub fn unpack_record<T: Pod>(msg: &mut Message) -> Result<T, MeshHaloError> {
    let bytes = msg.take(size_of::<T>())?;
    Ok(bytemuck::pod_read_unaligned(bytes))
}

const _: () = {
    assert!(size_of::<WireEntityHdr>() == 16);
    assert!(size_of::<WireEcho>() == 16);
};
