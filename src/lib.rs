//! # mesh-halo
//!
//! mesh-halo is the core of a distributed unstructured-mesh runtime: the
//! algorithms that snap mesh vertices onto an underlying geometric model
//! while preserving element validity, and that ghost mesh entities across
//! processes so each part sees a controlled neighborhood of off-process
//! mesh.
//!
//! ## Features
//! - Two-phase vertex snapping (plain, then dig-assisted) driven to
//!   global quiescence, with periodic parametric interpolation
//! - Ghost plans with downward-closure collection and cross-part
//!   destination reconciliation
//! - A three-pass exchanger installing bidirectional ghost pointers and
//!   shipping per-entity tags
//! - Layered ghost construction from (bridge dim, ghost dim, layer count)
//! - Pluggable communication backends (serial, in-process threads, MPI)
//!
//! ## Usage
//! Add `mesh-halo` as a dependency and enable features as needed:
//!
//! ```toml
//! [dependencies]
//! mesh-halo = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "check-invariants"]
//! ```
//!
//! The mesh database, geometry kernel, element validity predicate, and
//! cavity migration driver are collaborators expressed as traits; the
//! crate ships an [`InMemoryMesh`](mesh::InMemoryMesh) reference backend
//! and a [`ThreadComm`](comm::ThreadComm) mailbox communicator that tests
//! drive with one thread per rank.
//!
//! All protocol entry points are collective: every rank must call them
//! with the same dimensions and communication tags.

pub mod comm;
pub mod error;
pub mod ghost;
pub mod mesh;
pub mod snap;

/// A convenient prelude to import the most-used traits and types.
pub mod prelude {
    pub use crate::comm::bulk::{add_i64, exscan_i64, or_reduce, PhaseTags};
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::comm::{CommTag, Communicator, NoComm, ThreadComm};
    pub use crate::error::MeshHaloError;
    pub use crate::ghost::{
        ghost_create, ghost_create_layer, ghost_delete, GhostCommTags, GhostRegistry, Ghosting,
    };
    pub use crate::mesh::{
        EntityId, EntityType, GeometricModel, InMemoryMesh, Mesh, ModelEntity, NullModel,
        PartId, TagData, TagId, TagKind,
    };
    pub use crate::snap::{
        snap, CavityOp, Digger, NoDigger, Operator, Snap, SnapSummary, Snapper,
    };
}
