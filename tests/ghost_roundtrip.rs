//! Plan-driven ghost creation, tag shipping, and full deletion.

mod common;

use common::{dim_counts, on_parts, strip_part, StripPart};
use mesh_halo::ghost::PARTS_INDEX_TAG_NAME;
use mesh_halo::mesh::{Mesh, TagKind, GHOSTED_TAG_NAME, GHOST_TAG_NAME};
use mesh_halo::prelude::*;

/// Part 0 ghosts its seam triangle to part 1; part 1 plans nothing but
/// still participates in the collective.
fn one_sided_create(base: u16) -> Vec<(StripPart, GhostRegistry)> {
    on_parts(2, move |comm| {
        let mut part = strip_part(comm.rank());
        let mut reg = GhostRegistry::new();
        let mut plan = Ghosting::new(&mut part.mesh, 2);
        if comm.rank() == 0 {
            let t0 = part.tris[0];
            let w = part.mesh.create_tag("weight", TagKind::Double, 1);
            part.mesh.set_doubles(t0, w, &[2.5]);
            plan.send(&mut part.mesh, t0, 1);
        }
        ghost_create(
            &mut part.mesh,
            plan,
            &mut reg,
            &comm,
            GhostCommTags::from_base(CommTag::new(base)),
        )
        .unwrap();
        (part, reg)
    })
}

#[test]
fn one_sided_plan_ships_the_closure() {
    let results = one_sided_create(0x2000);
    let (p0, reg0) = &results[0];
    let (p1, reg1) = &results[1];

    // Part 1 gains t0 plus the non-resident part of its closure:
    // vertex a and edges ab, ca (b, c, bc are already resident).
    assert_eq!(dim_counts(&p1.mesh), [5, 7, 3]);
    assert_eq!(reg1.ghost_entities(2).len(), 1);
    assert_eq!(reg1.ghost_entities(1).len(), 2);
    assert_eq!(reg1.ghost_entities(0).len(), 1);
    assert!(reg1.ghosted_entities(2).is_empty());

    // Part 0 is structurally unchanged but remembers what it sent.
    assert_eq!(dim_counts(&p0.mesh), [4, 5, 2]);
    assert!(reg0.ghost_entities(2).is_empty());
    assert_eq!(reg0.ghosted_entities(2).len(), 1);
    assert_eq!(reg0.ghosted_entities(1).len(), 2);
    assert_eq!(reg0.ghosted_entities(0).len(), 1);

    // The plan's index tag is gone on both sides.
    for (p, _) in &results {
        assert_eq!(p.mesh.find_tag(PARTS_INDEX_TAG_NAME), None);
    }
}

#[test]
fn user_tags_travel_with_the_entity() {
    let results = one_sided_create(0x2100);
    let (_, reg1) = &results[1];
    let p1 = &results[1].0;
    let w = p1.mesh.find_tag("weight").expect("shipped tag must exist");
    let ghost_tri = reg1.ghost_entities(2)[0];
    assert_eq!(p1.mesh.get_doubles(ghost_tri, w), Some(vec![2.5]));
    // Bookkeeping tags are not shipped as user data: the ghost triangle
    // carries ghost_tag set locally by the exchanger, valued with the
    // sender part.
    let gt = p1.mesh.find_tag(GHOST_TAG_NAME).unwrap();
    assert_eq!(p1.mesh.get_ints(ghost_tri, gt), Some(vec![0]));
}

#[test]
fn ghost_geometry_and_classification_survive_the_wire() {
    let results = one_sided_create(0x2200);
    let p1 = &results[1].0;
    let reg1 = &results[1].1;
    let ghost_vert = reg1.ghost_entities(0)[0];
    assert_eq!(p1.mesh.point(ghost_vert), [0.0, 0.0, 0.0]); // vertex a
    assert_eq!(p1.mesh.classification(ghost_vert).dim, 2);
    let ghost_tri = reg1.ghost_entities(2)[0];
    // The ghost triangle closes over resident and ghost copies alike.
    let verts = p1.mesh.downward(ghost_tri, 0);
    assert_eq!(verts.len(), 3);
    assert!(verts.contains(&p1.b));
    assert!(verts.contains(&p1.c));
    assert!(verts.contains(&ghost_vert));
}

#[test]
fn ghost_residence_includes_the_sender() {
    let results = one_sided_create(0x2300);
    let p1 = &results[1].0;
    let reg1 = &results[1].1;
    for d in 0..3 {
        for &g in reg1.ghost_entities(d) {
            assert!(p1.mesh.residence(g).contains(&0));
        }
    }
}

#[test]
fn create_then_delete_restores_the_mesh() {
    let results = on_parts(2, |comm| {
        let mut part = strip_part(comm.rank());
        let before = dim_counts(&part.mesh);
        let mut reg = GhostRegistry::new();
        ghost_create_layer(
            &mut part.mesh,
            0,
            2,
            1,
            true,
            &mut reg,
            &comm,
            GhostCommTags::from_base(CommTag::new(0x2400)),
        )
        .unwrap();
        assert_ne!(dim_counts(&part.mesh), before);
        ghost_delete(&mut part.mesh, &mut reg);
        (part, reg, before)
    });

    for (part, reg, before) in &results {
        assert_eq!(dim_counts(&part.mesh), *before);
        assert!(reg.is_empty());
        assert_eq!(part.mesh.find_tag(GHOST_TAG_NAME), None);
        assert_eq!(part.mesh.find_tag(GHOSTED_TAG_NAME), None);
        for d in 0..3 {
            for e in part.mesh.entities(d) {
                assert!(!part.mesh.is_ghost(e));
                assert!(!part.mesh.is_ghosted(e));
                assert!(
                    part.mesh.ghosts(e).is_empty(),
                    "entity {e} still has a ghost copy"
                );
            }
        }
        // Remote tables survive the round trip.
        assert!(part.mesh.is_shared(part.b));
        assert!(part.mesh.is_shared(part.bc));
    }
}

#[test]
fn empty_plans_on_every_part_complete() {
    let results = on_parts(2, |comm| {
        let mut part = strip_part(comm.rank());
        let mut reg = GhostRegistry::new();
        let plan = Ghosting::new(&mut part.mesh, 2);
        ghost_create(
            &mut part.mesh,
            plan,
            &mut reg,
            &comm,
            GhostCommTags::from_base(CommTag::new(0x2500)),
        )
        .unwrap();
        (dim_counts(&part.mesh), reg.is_empty())
    });
    assert_eq!(results[0], ([4, 5, 2], true));
    assert_eq!(results[1], ([4, 5, 2], true));
}
