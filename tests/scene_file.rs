//! Integration tests for scene files on disk.

use raystudio::prelude::*;
use raystudio::scene::{scene_file, LoadReport};
use raystudio::util::Vec3;

use tempfile::tempdir;

fn sample_scene() -> ObjectManager {
    let mut scene = ObjectManager::default();
    scene
        .add_instance_by_name(
            "Box",
            Some(
                Instance::new(Vec3::new(0.9, 0.9, 0.9))
                    .with_transform(Vec3::ZERO, Vec3::ZERO, Vec3::splat(5.0)),
            ),
        )
        .unwrap();
    scene
        .add_instance_by_name(
            "Sphere",
            Some(
                Instance::new(Vec3::new(0.8, 0.1, 0.1))
                    .with_transform(Vec3::new(0.0, -3.5, 0.0), Vec3::ZERO, Vec3::splat(1.5))
                    .with_emission(Vec3::new(1.0, 0.9, 0.7), 2.5),
            ),
        )
        .unwrap();
    let mut torus = Instance::new(Vec3::new(0.1, 0.7, 0.2))
        .with_transform(Vec3::new(1.25, 0.5, -2.0), Vec3::new(30.0, -45.0, 90.0), Vec3::ONE);
    torus.set_smoothness(0.35);
    torus.set_reflectivity(0.6);
    scene.add_instance_by_name("Torus", Some(torus)).unwrap();
    scene.add_instance_by_name("Quad", None).unwrap();
    scene
}

#[test]
fn test_save_load_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("roundtrip.txt");

    let scene = sample_scene();
    scene.save(&path).unwrap();

    let mut loaded = ObjectManager::default();
    let report = loaded.load(&path).unwrap();
    assert_eq!(report, LoadReport { loaded: 4, skipped: 0 });
    assert_eq!(loaded.instances(), scene.instances());
    assert_eq!(loaded.names(), scene.names());
    for i in 0..scene.len() {
        let h = InstanceHandle::new(i);
        assert_eq!(loaded.kind_of(h).unwrap(), scene.kind_of(h).unwrap());
    }
    loaded.check_consistency().unwrap();
}

#[test]
fn test_save_creates_directory_and_overwrites() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("scenes").join("a.txt");

    sample_scene().save(&path).unwrap();
    let mut small = ObjectManager::default();
    small.add_instance_by_name("Plane", None).unwrap();
    small.save(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.matches("MESH").count(), 1);
    assert!(text.starts_with("MESH Plane"));
}

#[test]
fn test_load_accepts_legacy_count_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("legacy.txt");
    std::fs::write(
        &path,
        "2\n\
         MESH Plane\nCOLOR 1 1 1\nEMICOLOR 0 0 0\nSMOOTHNESS 0\nREFLEXIVITY 0\n\
         POS 0 -1 0\nSIZE 3 1 3\nROTATION 0 0 0\n.\n\
         MESH Sphere\nCOLOR 0 0 1\nPOS 0 0.5 0\n.\n",
    )
    .unwrap();

    let mut scene = ObjectManager::default();
    let report = scene.load(&path).unwrap();
    assert_eq!(report.loaded, 2);

    let plane = scene.instance(InstanceHandle::new(0)).unwrap();
    assert_eq!(plane.scale(), Vec3::new(3.0, 1.0, 3.0));
    assert_eq!(plane.smoothness(), 0.0);

    // Omitted fields fall back to per-record defaults
    let sphere = scene.instance(InstanceHandle::new(1)).unwrap();
    assert_eq!(sphere.smoothness(), 1.0);
    assert_eq!(sphere.scale(), Vec3::ONE);
    assert_eq!(sphere.emission_strength(), 0.0);
}

#[test]
fn test_bad_records_are_skipped() {
    let mut scene = ObjectManager::default();
    let report = scene_file::parse_scene(
        &mut scene,
        "MESH Teapot\nCOLOR 1 0 0\n.\n\
         COLOR 0 1 0\n.\n\
         MESH Cube\nCOLOR abc 1 1\nPOS 1 2 3\n.\n\
         MESH Quad\nCOLOR 1 1 1\n",
    );
    // Unknown template, missing MESH, unterminated tail
    assert_eq!(report, LoadReport { loaded: 1, skipped: 3 });

    let cube = scene.instance(InstanceHandle::new(0)).unwrap();
    assert_eq!(cube.position(), Vec3::new(1.0, 2.0, 3.0));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let mut scene = ObjectManager::default();
    scene.add_instance_by_name("Cube", None).unwrap();

    let err = scene.load(dir.path().join("nope.txt")).unwrap_err();
    assert!(matches!(err, Error::SceneFile { .. }));
}

#[test]
fn test_editor_save_load_by_name() {
    let dir = tempdir().unwrap();
    let mut editor = SceneEditor::new(ObjectManager::default(), dir.path());
    editor.add_instance("Cube").unwrap();
    editor.add_instance("Sphere").unwrap();
    assert!(editor.unsaved_changes());

    assert!(editor.save("two.txt"));
    assert!(!editor.unsaved_changes());
    assert!(dir.path().join("two.txt").exists());

    editor.clear();
    editor.take_invalidation();
    let report = editor.load("two.txt").unwrap();
    assert_eq!(report.loaded, 2);
    assert_eq!(editor.len(), 2);
    assert!(!editor.unsaved_changes());
    assert_eq!(editor.take_invalidation(), Invalidation::Rebuild);
}

#[test]
fn test_bundled_scene_loads_cleanly() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("data/scenes/cornell.txt");
    let mut scene = ObjectManager::default();
    let report = scene.load(&path).unwrap();
    assert_eq!(report, LoadReport { loaded: 5, skipped: 0 });
    assert_eq!(scene.instances_of_mesh_named("Sphere").unwrap().len(), 2);
    assert_eq!(raystudio::pathtracer::flatten(&scene).triangle_count(), 24);
}
