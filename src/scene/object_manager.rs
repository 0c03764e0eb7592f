//! Scene graph: dense instance storage grouped by mesh template.
//!
//! Three structures are kept in agreement:
//! - the global instance list, indexed by [`InstanceHandle`],
//! - a back-reference per instance: `(mesh, slot in that mesh's list)`,
//! - one list of instance handles per registered template.
//!
//! Removal renumbers every later handle so the handle space stays dense.

use super::instance::Instance;
use super::mesh::{MeshHandle, MeshKind, MeshRegistry};
use crate::pathtracer::gpu_data;
use crate::util::{BBox3f, Error, Result};
use std::fmt;
use std::path::Path;

/// Dense index into the scene's instance list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceHandle(pub(crate) usize);

impl InstanceHandle {
    /// Handle for position `index` in the instance list.
    #[inline]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owner of all instances and of the mesh registry they refer to.
#[derive(Debug)]
pub struct ObjectManager {
    registry: MeshRegistry,
    instances: Vec<Instance>,
    /// handle -> (mesh, slot in `per_mesh[mesh]`)
    back_refs: Vec<(MeshHandle, usize)>,
    per_mesh: Vec<Vec<InstanceHandle>>,
    names: Vec<String>,
}

impl Default for ObjectManager {
    fn default() -> Self {
        Self::new(MeshRegistry::with_defaults())
    }
}

impl ObjectManager {
    /// Empty scene over `registry`.
    pub fn new(registry: MeshRegistry) -> Self {
        let per_mesh = vec![Vec::new(); registry.len()];
        Self {
            registry,
            instances: Vec::new(),
            back_refs: Vec::new(),
            per_mesh,
            names: Vec::new(),
        }
    }

    pub fn registry(&self) -> &MeshRegistry {
        &self.registry
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn check_handle(&self, handle: InstanceHandle) -> Result<()> {
        if handle.0 < self.instances.len() {
            Ok(())
        } else {
            Err(Error::InvalidHandle {
                handle: handle.0,
                count: self.instances.len(),
            })
        }
    }

    /// Fails with [`Error::CapacityExceeded`] if one more instance of `mesh`
    /// would not fit into the path tracer's primitive lists.
    pub fn ensure_capacity(&self, mesh: MeshHandle) -> Result<()> {
        let kind = self.registry.lookup(mesh)?.kind();
        let (label, capacity) = gpu_data::capacity_for(kind);
        let used = if kind.is_flattened() {
            self.flattened_instance_count()
        } else {
            self.per_mesh[mesh.0].len()
        };
        if used >= capacity {
            return Err(Error::CapacityExceeded { kind: label, capacity });
        }
        Ok(())
    }

    /// Instances across all flattened templates.
    pub fn flattened_instance_count(&self) -> usize {
        self.registry
            .iter()
            .filter(|(_, t)| t.kind().is_flattened())
            .map(|(h, _)| self.per_mesh[h.0].len())
            .sum()
    }

    /// Append an instance of `mesh`. `None` uses [`Instance::default`].
    pub fn add_instance(
        &mut self,
        mesh: MeshHandle,
        instance: Option<Instance>,
    ) -> Result<InstanceHandle> {
        self.ensure_capacity(mesh)?;

        let handle = InstanceHandle(self.instances.len());
        self.instances.push(instance.unwrap_or_default());
        let list = &mut self.per_mesh[mesh.0];
        list.push(handle);
        self.back_refs.push((mesh, list.len() - 1));
        self.regenerate_names();

        debug_assert!(self.check_consistency().is_ok());
        tracing::debug!("added {} as {}", self.names[handle.0], handle);
        Ok(handle)
    }

    /// Append an instance of the template called `name`.
    pub fn add_instance_by_name(
        &mut self,
        name: &str,
        instance: Option<Instance>,
    ) -> Result<InstanceHandle> {
        let mesh = self.registry.find(name)?;
        self.add_instance(mesh, instance)
    }

    /// Remove the instance at `handle`; later handles shift down by one.
    pub fn remove_instance(&mut self, handle: InstanceHandle) -> Result<Instance> {
        self.check_handle(handle)?;
        let k = handle.0;
        let (mesh, slot) = self.back_refs[k];

        let removed = self.instances.remove(k);
        self.per_mesh[mesh.0].remove(slot);
        for list in &mut self.per_mesh {
            for h in list.iter_mut().filter(|h| h.0 > k) {
                h.0 -= 1;
            }
        }

        self.back_refs.remove(k);
        for (m, s) in &mut self.back_refs {
            if *m == mesh && *s > slot {
                *s -= 1;
            }
        }
        self.regenerate_names();

        debug_assert!(self.check_consistency().is_ok());
        tracing::debug!("removed instance {}, {} left", handle, self.instances.len());
        Ok(removed)
    }

    /// Remove every instance. Templates stay registered.
    pub fn clear(&mut self) {
        self.instances.clear();
        self.back_refs.clear();
        for list in &mut self.per_mesh {
            list.clear();
        }
        self.names.clear();
    }

    pub fn instance(&self, handle: InstanceHandle) -> Result<&Instance> {
        self.check_handle(handle)?;
        Ok(&self.instances[handle.0])
    }

    pub(crate) fn instance_mut(&mut self, handle: InstanceHandle) -> Result<&mut Instance> {
        self.check_handle(handle)?;
        Ok(&mut self.instances[handle.0])
    }

    /// All instances in handle order.
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Template of the instance at `handle`.
    pub fn mesh_of(&self, handle: InstanceHandle) -> Result<MeshHandle> {
        self.check_handle(handle)?;
        Ok(self.back_refs[handle.0].0)
    }

    /// Kind of the template of the instance at `handle`.
    pub fn kind_of(&self, handle: InstanceHandle) -> Result<MeshKind> {
        let mesh = self.mesh_of(handle)?;
        Ok(self.registry.lookup(mesh)?.kind())
    }

    /// Handles of all instances of `mesh`, in insertion order.
    pub fn instances_of_mesh(&self, mesh: MeshHandle) -> Result<&[InstanceHandle]> {
        self.registry.lookup(mesh)?;
        Ok(&self.per_mesh[mesh.0])
    }

    /// Handles of all instances of the template called `name`.
    pub fn instances_of_mesh_named(&self, name: &str) -> Result<&[InstanceHandle]> {
        let mesh = self.registry.find(name)?;
        self.instances_of_mesh(mesh)
    }

    /// Display names, `"<template> <ordinal>"`, indexed by handle.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Template names in registration order.
    pub fn mesh_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    fn regenerate_names(&mut self) {
        self.names = self
            .back_refs
            .iter()
            .map(|(mesh, slot)| {
                let name = self.registry.lookup(*mesh).map(|t| t.name()).unwrap_or("?");
                format!("{} {}", name, slot)
            })
            .collect();
    }

    /// Verify that the instance list, back-references and per-mesh lists agree.
    pub fn check_consistency(&self) -> Result<()> {
        let n = self.instances.len();
        if self.back_refs.len() != n || self.names.len() != n {
            return Err(Error::inconsistent(format!(
                "{} instances, {} back-references, {} names",
                n,
                self.back_refs.len(),
                self.names.len()
            )));
        }
        if self.per_mesh.len() != self.registry.len() {
            return Err(Error::inconsistent("per-mesh table does not match registry"));
        }

        let listed: usize = self.per_mesh.iter().map(Vec::len).sum();
        if listed != n {
            return Err(Error::inconsistent(format!(
                "per-mesh lists hold {} handles for {} instances",
                listed, n
            )));
        }

        for (mesh_index, list) in self.per_mesh.iter().enumerate() {
            for (slot, handle) in list.iter().enumerate() {
                let back = self.back_refs.get(handle.0).ok_or_else(|| {
                    Error::inconsistent(format!("handle {} out of range", handle))
                })?;
                if *back != (MeshHandle(mesh_index), slot) {
                    return Err(Error::inconsistent(format!(
                        "handle {} listed under mesh {} slot {} but refers to {:?}",
                        handle, mesh_index, slot, back
                    )));
                }
            }
        }
        Ok(())
    }

    /// World-space bounds of every instance.
    pub fn bounds(&self) -> BBox3f {
        let mut bounds = BBox3f::EMPTY;
        for (instance, (mesh, _)) in self.instances.iter().zip(&self.back_refs) {
            if let Ok(template) = self.registry.lookup(*mesh) {
                bounds.expand_by_box(&template.bounds().transformed(instance.model()));
            }
        }
        bounds
    }

    /// Write the scene to `path`. See [`super::scene_file`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        super::scene_file::save_scene(self, path.as_ref())
    }

    /// Append the records of the scene file at `path`.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<super::scene_file::LoadReport> {
        super::scene_file::load_scene(self, path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Vec3;

    #[test]
    fn test_add_groups_by_mesh() {
        let mut scene = ObjectManager::default();
        let a = scene.add_instance_by_name("Sphere", None).unwrap();
        let b = scene.add_instance_by_name("Cube", None).unwrap();
        let c = scene.add_instance_by_name("Sphere", None).unwrap();

        assert_eq!(scene.instances_of_mesh_named("Sphere").unwrap(), &[a, c]);
        assert_eq!(scene.instances_of_mesh_named("Cube").unwrap(), &[b]);
        assert_eq!(scene.names(), &["Sphere 0", "Cube 0", "Sphere 1"]);
        scene.check_consistency().unwrap();
    }

    #[test]
    fn test_remove_renumbers() {
        let mut scene = ObjectManager::default();
        scene.add_instance_by_name("Cube", None).unwrap();
        scene.add_instance_by_name("Sphere", None).unwrap();
        scene.add_instance_by_name("Cube", None).unwrap();
        scene.add_instance_by_name("Sphere", None).unwrap();

        scene.remove_instance(InstanceHandle(1)).unwrap();
        assert_eq!(scene.len(), 3);
        assert_eq!(
            scene.instances_of_mesh_named("Cube").unwrap(),
            &[InstanceHandle(0), InstanceHandle(1)]
        );
        assert_eq!(scene.instances_of_mesh_named("Sphere").unwrap(), &[InstanceHandle(2)]);
        assert_eq!(scene.names(), &["Cube 0", "Cube 1", "Sphere 0"]);
        scene.check_consistency().unwrap();
    }

    #[test]
    fn test_invalid_references() {
        let mut scene = ObjectManager::default();
        assert!(matches!(
            scene.remove_instance(InstanceHandle(0)),
            Err(Error::InvalidHandle { handle: 0, count: 0 })
        ));
        assert!(matches!(
            scene.add_instance_by_name("Teapot", None),
            Err(Error::UnknownTemplate(_))
        ));
        assert!(scene.is_empty());
    }

    #[test]
    fn test_capacity_rejects_add() {
        let mut scene = ObjectManager::default();
        for _ in 0..gpu_data::MAX_TORI {
            scene.add_instance_by_name("Torus", None).unwrap();
        }
        let err = scene.add_instance_by_name("Torus", None).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { capacity, .. } if capacity == gpu_data::MAX_TORI));
        assert_eq!(scene.len(), gpu_data::MAX_TORI);
    }

    #[test]
    fn test_bounds() {
        let mut scene = ObjectManager::default();
        assert!(scene.bounds().is_empty());
        let inst = Instance::default().with_transform(Vec3::new(5.0, 0.0, 0.0), Vec3::ZERO, Vec3::ONE);
        scene.add_instance_by_name("Cube", Some(inst)).unwrap();
        let b = scene.bounds();
        assert!((b.center() - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_clear() {
        let mut scene = ObjectManager::default();
        scene.add_instance_by_name("Plane", None).unwrap();
        scene.clear();
        assert!(scene.is_empty());
        assert!(scene.instances_of_mesh_named("Plane").unwrap().is_empty());
        scene.check_consistency().unwrap();
    }
}
