//! Unified error type for mesh-halo public APIs.
//!
//! Protocol entry points return `Result<_, MeshHaloError>` instead of
//! panicking. Local geometric failures inside the snap operator are not
//! errors at all; they are recovered by reverting the vertex position.
//! Broken bookkeeping invariants (an entity missing its plan index tag)
//! abort via assertion rather than surfacing here.

use crate::mesh::PartId;
use thiserror::Error;

/// Unified error type for mesh-halo operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshHaloError {
    /// Attempted to construct an `EntityId` with a zero value.
    #[error("EntityId must be non-zero (0 is reserved as invalid/sentinel)")]
    InvalidEntityId,
    /// A peer exchange failed or produced a malformed reply.
    #[error("communication error with part {neighbor}: {detail}")]
    CommError { neighbor: PartId, detail: String },
    /// A received byte stream was truncated or otherwise malformed.
    #[error("wire format error: {0}")]
    WireFormat(String),
    /// An unknown entity-type code arrived on the wire.
    #[error("unknown entity type code {0} on the wire")]
    UnknownEntityType(u16),
    /// A packed non-vertex references a downward entity with no copy on
    /// the destination part.
    #[error("downward entity {entity} has no remote or ghost copy on part {part}")]
    UnresolvedDownward { entity: u64, part: PartId },
    /// A required mesh tag does not exist.
    #[error("required tag `{0}` does not exist")]
    MissingTag(&'static str),
    /// Bridge/ghost dimensions passed to the layered planner are out of
    /// range for the mesh.
    #[error("invalid bridge/ghost dimensions ({bridge}, {ghost}) for a {mesh_dim}d mesh")]
    InvalidGhostParams {
        bridge: usize,
        ghost: usize,
        mesh_dim: usize,
    },
}
