//! `EntityId`: a strong, zero-cost handle for mesh entities.
//!
//! Every mesh entity (vertex, edge, face, region) is represented by an
//! opaque identifier. `EntityId` wraps a nonzero `u64` so that 0 can be
//! reserved as an invalid/sentinel value at both compile- and runtime.
//! Remote and ghost handles carry an `EntityId` in the *owning part's*
//! id space; they are never dereferenced locally.

use crate::error::MeshHaloError;
use std::{convert::TryFrom, fmt, num::NonZeroU64};

/// A part is a process-local partition of the mesh; in the usual
/// one-part-per-process deployment the part id equals the messaging rank.
pub type PartId = usize;

/// Opaque nonzero handle for a mesh entity.
///
/// `repr(transparent)` guarantees the same ABI as `u64`, so handles can
/// travel on the wire as plain integers.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct EntityId(NonZeroU64);

impl EntityId {
    /// Creates an `EntityId` from a raw `u64`, rejecting zero.
    #[inline]
    pub fn new(raw: u64) -> Result<Self, MeshHaloError> {
        NonZeroU64::new(raw)
            .map(EntityId)
            .ok_or(MeshHaloError::InvalidEntityId)
    }

    /// Returns the underlying `u64` value.
    #[inline]
    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

impl TryFrom<u64> for EntityId {
    type Error = MeshHaloError;
    #[inline]
    fn try_from(raw: u64) -> Result<Self, MeshHaloError> {
        EntityId::new(raw)
    }
}

impl From<EntityId> for u64 {
    #[inline]
    fn from(e: EntityId) -> Self {
        e.get()
    }
}

impl From<NonZeroU64> for EntityId {
    #[inline]
    fn from(nz: NonZeroU64) -> Self {
        EntityId(nz)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityId").field(&self.get()).finish()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Topological kind of a mesh entity.
///
/// The discriminants double as the on-wire type codes, so the order is
/// part of the wire contract.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum EntityType {
    /// 0D vertex.
    Vertex,
    /// 1D edge.
    Edge,
    /// 2D simplex.
    Triangle,
    /// 2D tensor-product face.
    Quadrilateral,
    /// 3D simplex.
    Tetrahedron,
    /// 3D tensor-product region.
    Hexahedron,
    /// 3D wedge.
    Prism,
    /// 3D pyramid.
    Pyramid,
}

impl EntityType {
    /// Topological dimension of the entity kind.
    pub fn dimension(self) -> usize {
        match self {
            EntityType::Vertex => 0,
            EntityType::Edge => 1,
            EntityType::Triangle | EntityType::Quadrilateral => 2,
            EntityType::Tetrahedron
            | EntityType::Hexahedron
            | EntityType::Prism
            | EntityType::Pyramid => 3,
        }
    }

    /// On-wire type code.
    pub fn to_code(self) -> u16 {
        self as u16
    }

    /// Decode an on-wire type code.
    pub fn from_code(code: u16) -> Result<Self, MeshHaloError> {
        Ok(match code {
            0 => EntityType::Vertex,
            1 => EntityType::Edge,
            2 => EntityType::Triangle,
            3 => EntityType::Quadrilateral,
            4 => EntityType::Tetrahedron,
            5 => EntityType::Hexahedron,
            6 => EntityType::Prism,
            7 => EntityType::Pyramid,
            other => return Err(MeshHaloError::UnknownEntityType(other)),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_zero_returns_error() {
        assert!(EntityId::new(0).is_err());
    }

    #[test]
    fn new_and_get() {
        let e = EntityId::new(42).unwrap();
        assert_eq!(e.get(), 42);
    }

    #[test]
    fn debug_and_display() {
        let e = EntityId::new(7).unwrap();
        assert_eq!(format!("{:?}", e), "EntityId(7)");
        assert_eq!(format!("{}", e), "7");
    }

    #[test]
    fn ordering_and_hash() {
        use std::collections::HashSet;
        let a = EntityId::new(1).unwrap();
        let b = EntityId::new(2).unwrap();
        assert!(a < b);
        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn type_codes_round_trip() {
        for ty in [
            EntityType::Vertex,
            EntityType::Edge,
            EntityType::Triangle,
            EntityType::Quadrilateral,
            EntityType::Tetrahedron,
            EntityType::Hexahedron,
            EntityType::Prism,
            EntityType::Pyramid,
        ] {
            assert_eq!(EntityType::from_code(ty.to_code()).unwrap(), ty);
        }
        assert!(matches!(
            EntityType::from_code(99),
            Err(MeshHaloError::UnknownEntityType(99))
        ));
    }

    #[test]
    fn dimensions() {
        assert_eq!(EntityType::Vertex.dimension(), 0);
        assert_eq!(EntityType::Edge.dimension(), 1);
        assert_eq!(EntityType::Triangle.dimension(), 2);
        assert_eq!(EntityType::Tetrahedron.dimension(), 3);
    }
}
