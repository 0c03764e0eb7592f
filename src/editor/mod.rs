//! Parameter surface between the UI and the scene.
//!
//! [`SceneEditor`] is the only mutation path the UI uses. Every edit goes
//! through it so the matching [`Invalidation`] is raised. Scene-level errors
//! are logged and the edit is dropped.

mod dirty;

pub use dirty::{DirtyTracker, Invalidation};

use std::fs;
use std::path::{Path, PathBuf};

use crate::scene::{
    resolve_scene_path, scene_file, Instance, InstanceHandle, LoadReport, MeshHandle, ObjectManager,
    DEFAULT_SCENES_DIR,
};
use crate::util::{Error, Result, Vec3};

/// Bounce depth limits for the trace kernel.
pub const MIN_BOUNCES: u32 = 1;
pub const MAX_BOUNCES: u32 = 50;
pub const DEFAULT_BOUNCES: u32 = 5;

/// Scene plus edit bookkeeping.
#[derive(Debug)]
pub struct SceneEditor {
    scene: ObjectManager,
    dirty: DirtyTracker,
    max_bounces: u32,
    scenes_dir: PathBuf,
    unsaved_changes: bool,
}

impl Default for SceneEditor {
    fn default() -> Self {
        Self::new(ObjectManager::default(), DEFAULT_SCENES_DIR)
    }
}

impl SceneEditor {
    pub fn new(scene: ObjectManager, scenes_dir: impl Into<PathBuf>) -> Self {
        Self {
            scene,
            // First frame uploads whatever the scene starts with.
            dirty: {
                let mut d = DirtyTracker::new();
                d.mark_geometry();
                d
            },
            max_bounces: DEFAULT_BOUNCES,
            scenes_dir: scenes_dir.into(),
            unsaved_changes: false,
        }
    }

    pub fn scene(&self) -> &ObjectManager {
        &self.scene
    }

    pub fn scenes_dir(&self) -> &Path {
        &self.scenes_dir
    }

    pub fn set_scenes_dir(&mut self, dir: impl Into<PathBuf>) {
        self.scenes_dir = dir.into();
    }

    /// True after any edit since the last save or load.
    pub fn unsaved_changes(&self) -> bool {
        self.unsaved_changes
    }

    /// Available template names.
    pub fn template_names(&self) -> Vec<&str> {
        self.scene.mesh_names()
    }

    /// Instance display names, indexed by handle.
    pub fn instance_names(&self) -> &[String] {
        self.scene.names()
    }

    pub fn len(&self) -> usize {
        self.scene.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scene.is_empty()
    }

    // ---------------------------------------------------------------------
    // Structure

    /// Add a default instance of the template called `name`.
    pub fn add_instance(&mut self, name: &str) -> Option<InstanceHandle> {
        self.add_instance_with(name, Instance::default())
    }

    /// Add `instance` as an instance of the template called `name`.
    pub fn add_instance_with(&mut self, name: &str, instance: Instance) -> Option<InstanceHandle> {
        let result = self.scene.add_instance_by_name(name, Some(instance));
        self.finish_structural(result, "add")
    }

    /// Add a default instance of `mesh`.
    pub fn add_instance_of(&mut self, mesh: MeshHandle) -> Option<InstanceHandle> {
        let result = self.scene.add_instance(mesh, None);
        self.finish_structural(result, "add")
    }

    fn finish_structural<T>(&mut self, result: Result<T>, what: &str) -> Option<T> {
        match result {
            Ok(value) => {
                self.dirty.mark_geometry();
                self.unsaved_changes = true;
                Some(value)
            }
            Err(e) => {
                tracing::warn!("{} rejected: {}", what, e);
                None
            }
        }
    }

    /// Remove the instance at `handle`. Later handles shift down by one.
    pub fn remove_instance(&mut self, handle: InstanceHandle) -> bool {
        let result = self.scene.remove_instance(handle);
        self.finish_structural(result, "remove").is_some()
    }

    /// Remove every instance.
    pub fn clear(&mut self) {
        self.scene.clear();
        self.dirty.mark_geometry();
        self.unsaved_changes = true;
    }

    // ---------------------------------------------------------------------
    // Instance attributes

    pub fn instance(&self, handle: InstanceHandle) -> Option<&Instance> {
        self.scene.instance(handle).ok()
    }

    /// Apply `f` to one instance and raise the matching signal if it changed.
    fn edit(&mut self, handle: InstanceHandle, moves: bool, f: impl FnOnce(&mut Instance)) -> bool {
        let kind = match self.scene.kind_of(handle) {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!("edit rejected: {}", e);
                return false;
            }
        };
        let Ok(inst) = self.scene.instance_mut(handle) else {
            return false;
        };
        let before = inst.clone();
        f(inst);
        if *inst == before {
            return false;
        }

        if moves && kind.is_flattened() {
            self.dirty.mark_triangles_moved();
        } else {
            self.dirty.mark_accumulation();
        }
        self.unsaved_changes = true;
        true
    }

    pub fn set_color(&mut self, handle: InstanceHandle, color: Vec3) -> bool {
        self.edit(handle, false, |i| i.set_color(color))
    }

    pub fn set_emissive_color(&mut self, handle: InstanceHandle, color: Vec3) -> bool {
        self.edit(handle, false, |i| i.set_emissive_color(color))
    }

    pub fn set_emission_strength(&mut self, handle: InstanceHandle, strength: f32) -> bool {
        self.edit(handle, false, |i| i.set_emission_strength(strength))
    }

    pub fn set_smoothness(&mut self, handle: InstanceHandle, smoothness: f32) -> bool {
        self.edit(handle, false, |i| i.set_smoothness(smoothness))
    }

    pub fn set_reflectivity(&mut self, handle: InstanceHandle, reflectivity: f32) -> bool {
        self.edit(handle, false, |i| i.set_reflectivity(reflectivity))
    }

    pub fn set_position(&mut self, handle: InstanceHandle, position: Vec3) -> bool {
        self.edit(handle, true, |i| i.set_position(position))
    }

    /// Euler angles in degrees.
    pub fn set_rotation(&mut self, handle: InstanceHandle, rotation: Vec3) -> bool {
        self.edit(handle, true, |i| i.set_rotation(rotation))
    }

    pub fn set_scale(&mut self, handle: InstanceHandle, scale: Vec3) -> bool {
        self.edit(handle, true, |i| i.set_scale(scale))
    }

    pub fn set_uniform_scale(&mut self, handle: InstanceHandle, scale: f32) -> bool {
        self.edit(handle, true, |i| i.set_uniform_scale(scale))
    }

    // ---------------------------------------------------------------------
    // Render settings

    pub fn max_bounces(&self) -> u32 {
        self.max_bounces
    }

    /// Set the bounce depth, clamped to `MIN_BOUNCES..=MAX_BOUNCES`.
    pub fn set_max_bounces(&mut self, bounces: u32) {
        let bounces = bounces.clamp(MIN_BOUNCES, MAX_BOUNCES);
        if bounces != self.max_bounces {
            self.max_bounces = bounces;
            self.dirty.mark_accumulation();
        }
    }

    // ---------------------------------------------------------------------
    // Invalidation

    /// Consume all pending signals. Call once per frame.
    pub fn take_invalidation(&mut self) -> Invalidation {
        self.dirty.take()
    }

    /// Read and clear the geometry signal alone.
    pub fn take_geometry_dirty(&mut self) -> bool {
        self.dirty.take_geometry()
    }

    /// Read and clear the accumulation signal alone. `Retransform` means the
    /// flattened triangles must be rewritten in place before the reset.
    pub fn take_accumulation_dirty(&mut self) -> Invalidation {
        self.dirty.take_accumulation()
    }

    // ---------------------------------------------------------------------
    // Files

    /// Resolve a scene file name against the scenes directory.
    pub fn scene_path(&self, name: impl AsRef<Path>) -> PathBuf {
        resolve_scene_path(&self.scenes_dir, name)
    }

    /// Save the scene under `name`. Failures are logged.
    pub fn save(&mut self, name: impl AsRef<Path>) -> bool {
        let path = self.scene_path(name);
        match self.scene.save(&path) {
            Ok(()) => {
                self.unsaved_changes = false;
                true
            }
            Err(e) => {
                tracing::error!("save failed: {}", e);
                false
            }
        }
    }

    /// Replace the scene with the file `name`.
    ///
    /// An unreadable file is logged and leaves the scene untouched.
    pub fn load(&mut self, name: impl AsRef<Path>) -> Option<LoadReport> {
        let path = self.scene_path(name);
        match self.try_load(&path) {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!("load failed: {}", e);
                None
            }
        }
    }

    fn try_load(&mut self, path: &Path) -> Result<LoadReport> {
        let text = fs::read_to_string(path).map_err(|e| Error::scene_file(path, e))?;
        self.scene.clear();
        let report = scene_file::parse_scene(&mut self.scene, &text);
        tracing::info!(
            "loaded {} instances from {} ({} skipped)",
            report.loaded,
            path.display(),
            report.skipped
        );
        self.dirty.mark_geometry();
        self.unsaved_changes = false;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> SceneEditor {
        let mut ed = SceneEditor::default();
        ed.take_invalidation();
        ed
    }

    #[test]
    fn test_starts_with_rebuild() {
        let mut ed = SceneEditor::default();
        assert_eq!(ed.take_invalidation(), Invalidation::Rebuild);
        assert_eq!(ed.take_invalidation(), Invalidation::Clean);
    }

    #[test]
    fn test_add_and_remove_rebuild() {
        let mut ed = editor();
        let h = ed.add_instance("Cube").unwrap();
        assert_eq!(ed.take_invalidation(), Invalidation::Rebuild);
        assert!(ed.remove_instance(h));
        assert_eq!(ed.take_invalidation(), Invalidation::Rebuild);
    }

    #[test]
    fn test_rejected_add_is_clean() {
        let mut ed = editor();
        assert!(ed.add_instance("Teapot").is_none());
        assert!(!ed.remove_instance(InstanceHandle::new(3)));
        assert_eq!(ed.take_invalidation(), Invalidation::Clean);
        assert!(!ed.unsaved_changes());
    }

    #[test]
    fn test_material_edit_resets_only() {
        let mut ed = editor();
        let cube = ed.add_instance("Cube").unwrap();
        ed.take_invalidation();

        assert!(ed.set_color(cube, Vec3::X));
        assert_eq!(ed.take_invalidation(), Invalidation::Reset);
    }

    #[test]
    fn test_transform_edit_by_kind() {
        let mut ed = editor();
        let cube = ed.add_instance("Cube").unwrap();
        let ball = ed.add_instance("Sphere").unwrap();
        ed.take_invalidation();

        ed.set_position(cube, Vec3::Y);
        assert_eq!(ed.take_invalidation(), Invalidation::Retransform);

        ed.set_position(ball, Vec3::Y);
        assert_eq!(ed.take_invalidation(), Invalidation::Reset);
    }

    #[test]
    fn test_unchanged_value_is_clean() {
        let mut ed = editor();
        let cube = ed.add_instance("Cube").unwrap();
        ed.take_invalidation();
        assert!(!ed.set_position(cube, Vec3::ZERO));
        assert_eq!(ed.take_invalidation(), Invalidation::Clean);
    }

    #[test]
    fn test_max_bounces_clamped() {
        let mut ed = editor();
        assert_eq!(ed.max_bounces(), DEFAULT_BOUNCES);
        ed.set_max_bounces(0);
        assert_eq!(ed.max_bounces(), MIN_BOUNCES);
        assert_eq!(ed.take_invalidation(), Invalidation::Reset);
        ed.set_max_bounces(500);
        assert_eq!(ed.max_bounces(), MAX_BOUNCES);
    }

    #[test]
    fn test_load_missing_file_keeps_scene() {
        let mut ed = editor();
        ed.add_instance("Plane").unwrap();
        ed.take_invalidation();
        let missing = std::env::temp_dir().join("raystudio-does-not-exist.scene");
        assert!(ed.load(&missing).is_none());
        assert_eq!(ed.len(), 1);
        assert_eq!(ed.take_invalidation(), Invalidation::Clean);
    }
}
