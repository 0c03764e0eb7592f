//! CPU side of the path tracer: flattening, primitive lists, accumulation and
//! the edit-to-renderer invalidation flow.

use raystudio::pathtracer::{DispatchSlot, Phase, MAX_TRIANGLE_MESHES};
use raystudio::prelude::*;
use raystudio::util::{Mat4, Vec3};

fn pose_at(z: f32) -> CameraPose {
    let eye = Vec3::new(0.0, 0.0, z);
    CameraPose::new(eye, Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y))
}

#[test]
fn test_sphere_in_box_first_frame() {
    let mut editor = SceneEditor::default();
    editor.add_instance("Sphere").unwrap();
    let room = editor.add_instance("Box").unwrap();
    editor.set_uniform_scale(room, 5.0);

    assert_eq!(editor.take_invalidation(), Invalidation::Rebuild);

    let scene = editor.scene();
    let flat = flatten(scene);
    assert_eq!(flat.triangle_count(), 12);
    assert_eq!(flat.ranges.len(), 1);
    assert_eq!(flat.ranges[0].instance, room);

    let lists = PrimitiveLists::build(scene, &flat).unwrap();
    assert_eq!(lists.spheres.len(), 1);
    assert!(lists.tori.is_empty());
    assert_eq!(lists.meshes.len(), 1);
    assert_eq!(lists.meshes[0].range[..2], [0, 12]);
    assert_eq!(lists.to_gpu().counts, [1, 0, 1, 0]);

    // First frame dispatches with an empty history
    let mut acc = Accumulator::new();
    assert!(acc.observe_camera(pose_at(10.0)));
    assert_eq!(
        acc.begin_dispatch(),
        DispatchSlot { sample_index: 0, read: 0, write: 1 }
    );
}

#[test]
fn test_flatten_is_deterministic() {
    let mut scene = ObjectManager::default();
    for (name, x) in [("Cube", -2.0), ("Plane", 0.0), ("Quad", 1.0), ("Box", 2.0), ("Sphere", 3.0)] {
        let inst = Instance::default().with_transform(
            Vec3::new(x, 0.5, 0.0),
            Vec3::new(10.0, 20.0, 30.0),
            Vec3::splat(0.75),
        );
        scene.add_instance_by_name(name, Some(inst)).unwrap();
    }

    let a = flatten(&scene);
    let b = flatten(&scene);
    assert_eq!(a.triangles_bytes(), b.triangles_bytes());
    assert_eq!(a.ranges, b.ranges);
    // Plane, Cube, Box, Quad: 2 + 12 + 12 + 2
    assert_eq!(a.triangle_count(), 28);
}

#[test]
fn test_move_keeps_layout_add_changes_it() {
    let mut editor = SceneEditor::default();
    let cube = editor.add_instance("Cube").unwrap();
    editor.add_instance("Plane").unwrap();
    editor.take_invalidation();
    let before = flatten(editor.scene());

    editor.set_position(cube, Vec3::new(0.0, 3.0, 0.0));
    assert_eq!(editor.take_invalidation(), Invalidation::Retransform);
    let moved = flatten(editor.scene());
    assert!(moved.retransform_compatible(&before));
    assert_ne!(moved.triangles_bytes(), before.triangles_bytes());

    editor.add_instance("Quad").unwrap();
    assert_eq!(editor.take_invalidation(), Invalidation::Rebuild);
    assert!(!flatten(editor.scene()).retransform_compatible(&moved));
}

#[test]
fn test_material_edit_changes_lists_not_triangles() {
    let mut editor = SceneEditor::default();
    let cube = editor.add_instance("Cube").unwrap();
    editor.take_invalidation();
    let flat = flatten(editor.scene());
    let before = PrimitiveLists::build(editor.scene(), &flat).unwrap();

    editor.set_emission_strength(cube, 4.0);
    assert_eq!(editor.take_invalidation(), Invalidation::Reset);
    assert_eq!(flatten(editor.scene()), flat);
    let after = PrimitiveLists::build(editor.scene(), &flat).unwrap();
    assert_ne!(after, before);
}

#[test]
fn test_accumulation_counts_and_resets() {
    let mut acc = Accumulator::new();
    acc.observe_camera(pose_at(10.0));
    for n in 0..4 {
        let slot = acc.begin_dispatch();
        assert_eq!(slot.sample_index, n);
        assert_ne!(slot.read, slot.write);
        acc.finish_dispatch();
        assert_eq!(acc.latest(), slot.write);
    }
    assert_eq!(acc.sample_count(), 4);
    assert_eq!(acc.phase(), Phase::Accumulating);

    // Same pose again: history kept
    assert!(!acc.observe_camera(pose_at(10.0)));
    assert_eq!(acc.sample_count(), 4);

    // Moved camera
    assert!(acc.observe_camera(pose_at(9.5)));
    assert_eq!(acc.sample_count(), 0);
    assert_eq!(acc.phase(), Phase::Cold);
    assert_eq!(acc.begin_dispatch().sample_index, 0);
}

#[test]
fn test_flattened_capacity_shared_across_kinds() {
    let mut editor = SceneEditor::default();
    for i in 0..MAX_TRIANGLE_MESHES {
        let name = if i % 2 == 0 { "Plane" } else { "Quad" };
        editor.add_instance(name).unwrap();
    }
    editor.take_invalidation();

    assert!(editor.add_instance("Cube").is_none());
    assert_eq!(editor.take_invalidation(), Invalidation::Clean);

    let flat = flatten(editor.scene());
    assert!(PrimitiveLists::build(editor.scene(), &flat).is_ok());
}

#[test]
fn test_two_signal_reads_after_moving_cube() {
    let mut editor = SceneEditor::default();
    let cube = editor.add_instance("Cube").unwrap();
    editor.take_invalidation();
    let before = flatten(editor.scene());

    editor.set_position(cube, Vec3::new(2.0, 0.0, 0.0));
    assert!(!editor.take_geometry_dirty());
    assert_eq!(editor.take_accumulation_dirty(), Invalidation::Retransform);
    assert_eq!(editor.take_invalidation(), Invalidation::Clean);

    let moved = flatten(editor.scene());
    assert!(moved.retransform_compatible(&before));
    assert_ne!(moved.triangles_bytes(), before.triangles_bytes());

    editor.set_color(cube, Vec3::new(0.2, 0.9, 0.2));
    assert!(!editor.take_geometry_dirty());
    assert_eq!(editor.take_accumulation_dirty(), Invalidation::Reset);
    assert_eq!(editor.take_accumulation_dirty(), Invalidation::Clean);
}

#[test]
fn test_edits_zero_the_sample_counter() {
    let mut editor = SceneEditor::default();
    let cube = editor.add_instance("Cube").unwrap();
    let sphere = editor.add_instance("Sphere").unwrap();

    let mut acc = Accumulator::new();
    acc.observe_camera(pose_at(10.0));
    assert!(acc.apply(editor.take_invalidation()));

    let edits: [(&str, Box<dyn Fn(&mut SceneEditor)>); 4] = [
        ("material", Box::new(move |e: &mut SceneEditor| { e.set_reflectivity(sphere, 0.7); })),
        ("move flattened", Box::new(move |e: &mut SceneEditor| { e.set_position(cube, Vec3::Y); })),
        ("add", Box::new(|e: &mut SceneEditor| { e.add_instance("Plane"); })),
        ("bounces", Box::new(|e: &mut SceneEditor| { e.set_max_bounces(12); })),
    ];
    for (what, edit) in edits {
        for _ in 0..3 {
            acc.finish_dispatch();
        }
        edit(&mut editor);
        assert!(acc.apply(editor.take_invalidation()), "{what}");
        assert_eq!(acc.sample_count(), 0, "{what}");
    }

    // Nothing pending: history survives
    acc.finish_dispatch();
    assert!(!acc.apply(editor.take_invalidation()));
    assert_eq!(acc.sample_count(), 1);
}
