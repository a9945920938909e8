//! Shared fixtures: a two-part triangle strip and a per-rank thread
//! driver over `ThreadComm`.
//!
//! The strip is the unit rectangle `[0,2] x [0,1]` split at `x = 1`:
//!
//! ```text
//!   d --- c --- f
//!   | t1 /| t3 /|
//!   |  /  |  / *|
//!   | / t0| / t2|
//!   a --- b --- e
//!      p0  |  p1
//! ```
//!
//! Parts 0 and 1 share vertices `b`, `c` and edge `bc`. Both parts create
//! the shared entities first and in the same order, so the shared handles
//! coincide (`b = 1`, `c = 2`, `bc = 3`) and the remote tables can be
//! seeded symmetrically.

#![allow(dead_code)]

use mesh_halo::prelude::*;

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct StripPart {
    pub mesh: InMemoryMesh,
    pub b: EntityId,
    pub c: EntityId,
    pub bc: EntityId,
    /// The two local triangles.
    pub tris: [EntityId; 2],
}

pub fn strip_part(part: PartId) -> StripPart {
    assert!(part < 2);
    let peer = 1 - part;
    let interior = ModelEntity { dim: 2, tag: 1 };
    let mut m = InMemoryMesh::new(2, part);

    // Shared entities first, same order on both parts.
    let b = m.create_vertex(interior, [1.0, 0.0, 0.0], [0.0; 3]);
    let c = m.create_vertex(interior, [1.0, 1.0, 0.0], [0.0; 3]);
    let bc = m.create_entity(EntityType::Edge, interior, &[b, c]);
    m.add_remote(b, peer, b);
    m.add_remote(c, peer, c);
    m.add_remote(bc, peer, bc);

    let (tris, mesh) = if part == 0 {
        let a = m.create_vertex(interior, [0.0, 0.0, 0.0], [0.0; 3]);
        let d = m.create_vertex(interior, [0.0, 1.0, 0.0], [0.0; 3]);
        let ab = m.create_entity(EntityType::Edge, interior, &[a, b]);
        let ca = m.create_entity(EntityType::Edge, interior, &[c, a]);
        let cd = m.create_entity(EntityType::Edge, interior, &[c, d]);
        let da = m.create_entity(EntityType::Edge, interior, &[d, a]);
        let t0 = m.create_entity(EntityType::Triangle, interior, &[ab, bc, ca]);
        let t1 = m.create_entity(EntityType::Triangle, interior, &[ca, cd, da]);
        ([t0, t1], m)
    } else {
        let e = m.create_vertex(interior, [2.0, 0.0, 0.0], [0.0; 3]);
        let f = m.create_vertex(interior, [2.0, 1.0, 0.0], [0.0; 3]);
        let be = m.create_entity(EntityType::Edge, interior, &[b, e]);
        let ef = m.create_entity(EntityType::Edge, interior, &[e, f]);
        let fb = m.create_entity(EntityType::Edge, interior, &[f, b]);
        let fc = m.create_entity(EntityType::Edge, interior, &[f, c]);
        let t2 = m.create_entity(EntityType::Triangle, interior, &[be, ef, fb]);
        let t3 = m.create_entity(EntityType::Triangle, interior, &[fb, fc, bc]);
        ([t2, t3], m)
    };

    StripPart {
        mesh,
        b,
        c,
        bc,
        tris,
    }
}

/// Run `f` once per rank, each on its own thread with its own
/// `ThreadComm`, and collect the results in rank order.
pub fn on_parts<F, R>(size: usize, f: F) -> Vec<R>
where
    F: Fn(ThreadComm) -> R + Send + Sync,
    R: Send,
{
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..size)
            .map(|r| {
                let f = &f;
                s.spawn(move || f(ThreadComm::new(r, size)))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Entity counts per dimension, for structural round-trip comparisons.
pub fn dim_counts(m: &InMemoryMesh) -> [usize; 3] {
    [m.count(0), m.count(1), m.count(2)]
}
