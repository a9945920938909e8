//! Layered ghosting across two parts.

mod common;

use common::{dim_counts, on_parts, strip_part, StripPart};
use mesh_halo::mesh::GHOST_TAG_NAME;
use mesh_halo::prelude::*;

fn run_layer(
    base: u16,
    bridge_dim: usize,
    ghost_dim: usize,
    num_layers: usize,
    include_copy: bool,
) -> Vec<(StripPart, GhostRegistry)> {
    on_parts(2, move |comm| {
        let mut part = strip_part(comm.rank());
        let mut reg = GhostRegistry::new();
        ghost_create_layer(
            &mut part.mesh,
            bridge_dim,
            ghost_dim,
            num_layers,
            include_copy,
            &mut reg,
            &comm,
            GhostCommTags::from_base(CommTag::new(base)),
        )
        .unwrap();
        (part, reg)
    })
}

#[test]
fn one_layer_vertex_bridge_ships_incident_elements() {
    common::init_logs();
    let results = run_layer(0x1000, 0, 2, 1, true);
    for (part, reg) in &results {
        // Both peer triangles touch a shared vertex, so each part receives
        // exactly the two elements incident to the shared vertices on the
        // peer, plus their closure.
        assert_eq!(reg.ghost_entities(2).len(), 2);
        assert_eq!(reg.ghost_entities(1).len(), 4);
        assert_eq!(reg.ghost_entities(0).len(), 2);
        assert_eq!(dim_counts(&part.mesh), [6, 9, 4]);

        // Everything local was shipped the other way.
        assert_eq!(reg.ghosted_entities(2).len(), 2);
        assert_eq!(reg.ghosted_entities(1).len(), 4);
        assert_eq!(reg.ghosted_entities(0).len(), 2);
    }
}

#[test]
fn ghost_copies_are_tagged_with_the_sender() {
    let results = run_layer(0x1100, 0, 2, 1, true);
    for (rank, (part, reg)) in results.iter().enumerate() {
        let tag = part.mesh.find_tag(GHOST_TAG_NAME).unwrap();
        for d in 0..3 {
            for &g in reg.ghost_entities(d) {
                assert!(part.mesh.is_ghost(g));
                assert_eq!(
                    part.mesh.get_ints(g, tag),
                    Some(vec![1 - rank as i32]),
                    "ghost copy must record its sender part"
                );
            }
            for &e in reg.ghosted_entities(d) {
                assert!(part.mesh.is_ghosted(e));
            }
        }
    }
}

#[test]
fn ghost_pointers_are_symmetric() {
    let results = run_layer(0x1200, 0, 2, 1, true);
    for rank in 0..2 {
        let (part, reg) = &results[rank];
        let (peer_part, _) = &results[1 - rank];
        for d in 0..3 {
            for &g in reg.ghost_entities(d) {
                let back = part.mesh.ghosts(g);
                assert_eq!(back.len(), 1);
                let (sender, original) = back[0];
                assert_eq!(sender, 1 - rank);
                // The original on the sender points back at this copy.
                assert!(
                    peer_part.mesh.ghosts(original).contains(&(rank, g)),
                    "missing reciprocal ghost pointer for {original}"
                );
            }
        }
    }
}

#[test]
fn edge_bridge_only_ships_elements_on_the_seam() {
    // Bridge through the shared edge instead of the shared vertices:
    // only t0 (part 0) and t3 (part 1) touch bc.
    let results = run_layer(0x1300, 1, 2, 1, true);
    for (part, reg) in &results {
        assert_eq!(reg.ghost_entities(2).len(), 1);
        assert_eq!(dim_counts(&part.mesh)[2], 3);
        assert!(reg.ghost_entities(2).iter().all(|&g| part.mesh.is_ghost(g)));
    }
}

#[test]
fn two_layers_cover_the_whole_strip() {
    // Layer 2 expands through bridge-dimension adjacency: from the seam
    // elements across the rest of each part.
    let results = run_layer(0x1400, 0, 2, 2, true);
    for (part, reg) in &results {
        assert_eq!(reg.ghost_entities(2).len(), 2);
        assert_eq!(dim_counts(&part.mesh), [6, 9, 4]);
    }
}

#[test]
fn owner_side_seeding_is_asymmetric() {
    // Without include_copy only the owner of a bridge seeds expansion.
    // Part 0 owns the shared vertices, so part 1 ships nothing.
    let results = run_layer(0x1500, 0, 2, 1, false);
    let (p0, reg0) = &results[0];
    let (p1, reg1) = &results[1];
    assert_eq!(reg0.ghost_entities(2).len(), 0);
    assert_eq!(reg0.ghosted_entities(2).len(), 2);
    assert_eq!(reg1.ghost_entities(2).len(), 2);
    assert_eq!(reg1.ghosted_entities(2).len(), 0);
    assert_eq!(dim_counts(&p0.mesh), [4, 5, 2]);
    assert_eq!(dim_counts(&p1.mesh), [6, 9, 4]);
}

#[test]
fn invalid_dimensions_leave_the_mesh_untouched() {
    let results = on_parts(2, |comm| {
        let mut part = strip_part(comm.rank());
        let mut reg = GhostRegistry::new();
        // bridge == ghost is reported and refused.
        ghost_create_layer(
            &mut part.mesh,
            2,
            2,
            1,
            true,
            &mut reg,
            &comm,
            GhostCommTags::from_base(CommTag::new(0x1600)),
        )
        .unwrap();
        (part, reg)
    });
    for (part, reg) in &results {
        assert!(reg.is_empty());
        assert_eq!(dim_counts(&part.mesh), [4, 5, 2]);
        assert_eq!(part.mesh.find_tag(GHOST_TAG_NAME), None);
    }
}

#[test]
fn single_rank_is_a_no_op() {
    let mut part = strip_part(0);
    let mut reg = GhostRegistry::new();
    ghost_create_layer(
        &mut part.mesh,
        0,
        2,
        1,
        true,
        &mut reg,
        &NoComm,
        GhostCommTags::from_base(CommTag::new(0x1700)),
    )
    .unwrap();
    assert!(reg.is_empty());
    assert_eq!(dim_counts(&part.mesh), [4, 5, 2]);
}
