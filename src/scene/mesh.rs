//! Mesh templates and the registry that owns them.
//!
//! Templates are immutable geometry shared by every instance that refers to
//! them. They are registered once at startup and never removed, so a
//! [`MeshHandle`] stays valid for the lifetime of the registry.

use super::primitives::{self, MeshData};
use crate::util::{BBox3f, Error, Result, Vec2, Vec3};
use std::fmt;

/// Built-in template shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshKind {
    Cube,
    Sphere,
    /// Cube with faces pointing inward.
    Box,
    Plane,
    Torus,
    /// Upright plane facing +Z, typically used as a light panel.
    Quad,
}

impl MeshKind {
    /// Registration order of [`MeshRegistry::with_defaults`].
    pub const ALL: [MeshKind; 6] = [
        MeshKind::Cube,
        MeshKind::Sphere,
        MeshKind::Box,
        MeshKind::Plane,
        MeshKind::Torus,
        MeshKind::Quad,
    ];

    /// Kinds turned into triangles for the path tracer, in processing order.
    pub const FLATTENED: [MeshKind; 4] =
        [MeshKind::Plane, MeshKind::Cube, MeshKind::Box, MeshKind::Quad];

    /// Canonical template name, as written to scene files.
    pub fn name(self) -> &'static str {
        match self {
            MeshKind::Cube => "Cube",
            MeshKind::Sphere => "Sphere",
            MeshKind::Box => "Box",
            MeshKind::Plane => "Plane",
            MeshKind::Torus => "Torus",
            MeshKind::Quad => "Quad",
        }
    }

    /// Resolve a template name. Accepts the legacy torus name `Tore`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Cube" => Some(MeshKind::Cube),
            "Sphere" => Some(MeshKind::Sphere),
            "Box" => Some(MeshKind::Box),
            "Plane" => Some(MeshKind::Plane),
            "Torus" | "Tore" => Some(MeshKind::Torus),
            "Quad" => Some(MeshKind::Quad),
            _ => None,
        }
    }

    /// True for kinds that the path tracer intersects as triangles.
    pub fn is_flattened(self) -> bool {
        Self::FLATTENED.contains(&self)
    }
}

impl fmt::Display for MeshKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed index into a [`MeshRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub(crate) usize);

impl MeshHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for MeshHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mesh#{}", self.0)
    }
}

/// Tessellation parameters for template generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateParams {
    /// Segment count for curved shapes.
    pub resolution: u32,
    pub torus_major_radius: f32,
    pub torus_minor_radius: f32,
}

impl Default for TemplateParams {
    fn default() -> Self {
        Self {
            resolution: 16,
            torus_major_radius: 1.0,
            torus_minor_radius: 0.1,
        }
    }
}

/// Immutable indexed geometry.
#[derive(Debug, Clone)]
pub struct MeshTemplate {
    name: String,
    kind: MeshKind,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Option<Vec<Vec2>>,
    indices: Vec<u32>,
    bounds: BBox3f,
}

impl MeshTemplate {
    fn from_data(kind: MeshKind, data: MeshData) -> Self {
        let mut bounds = BBox3f::EMPTY;
        for p in &data.positions {
            bounds.expand_by_point(*p);
        }
        Self {
            name: kind.name().to_string(),
            kind,
            positions: data.positions,
            normals: data.normals,
            uvs: data.uvs,
            indices: data.indices,
            bounds,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MeshKind {
        self.kind
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn uvs(&self) -> Option<&[Vec2]> {
        self.uvs.as_deref()
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Object-space bounds.
    pub fn bounds(&self) -> BBox3f {
        self.bounds
    }
}

/// Owner of all mesh templates.
#[derive(Debug, Default)]
pub struct MeshRegistry {
    templates: Vec<MeshTemplate>,
}

impl MeshRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in kind, in [`MeshKind::ALL`] order.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let params = TemplateParams::default();
        for kind in MeshKind::ALL {
            registry.create_template(kind, params);
        }
        registry
    }

    /// Generate and register the template for `kind`.
    ///
    /// Each kind is registered at most once; a second call returns the
    /// existing handle.
    pub fn create_template(&mut self, kind: MeshKind, params: TemplateParams) -> MeshHandle {
        if let Some(handle) = self.handle_of(kind) {
            tracing::debug!("template {} already registered as {}", kind, handle);
            return handle;
        }

        let data = match kind {
            MeshKind::Cube => primitives::cube(false),
            MeshKind::Box => primitives::cube(true),
            MeshKind::Plane => primitives::plane(),
            MeshKind::Quad => primitives::quad(),
            MeshKind::Sphere => primitives::sphere(params.resolution),
            MeshKind::Torus => primitives::torus(
                params.torus_major_radius,
                params.torus_minor_radius,
                params.resolution * 2,
                (params.resolution * 3 / 4).max(3),
            ),
        };

        let template = MeshTemplate::from_data(kind, data);
        tracing::debug!(
            "registered template {}: {} vertices, {} triangles",
            template.name,
            template.positions.len(),
            template.triangle_count()
        );
        self.templates.push(template);
        MeshHandle(self.templates.len() - 1)
    }

    /// Template behind `handle`.
    pub fn lookup(&self, handle: MeshHandle) -> Result<&MeshTemplate> {
        self.templates.get(handle.0).ok_or(Error::InvalidMeshHandle {
            handle: handle.0,
            count: self.templates.len(),
        })
    }

    /// Handle of the template registered under `name`.
    pub fn find(&self, name: &str) -> Result<MeshHandle> {
        MeshKind::from_name(name)
            .and_then(|kind| self.handle_of(kind))
            .ok_or_else(|| Error::UnknownTemplate(name.to_string()))
    }

    /// Handle of the template of `kind`, if registered.
    pub fn handle_of(&self, kind: MeshKind) -> Option<MeshHandle> {
        self.templates
            .iter()
            .position(|t| t.kind == kind)
            .map(MeshHandle)
    }

    /// Template names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Iterate over `(handle, template)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (MeshHandle, &MeshTemplate)> {
        self.templates
            .iter()
            .enumerate()
            .map(|(i, t)| (MeshHandle(i), t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_order() {
        let reg = MeshRegistry::with_defaults();
        assert_eq!(reg.names(), vec!["Cube", "Sphere", "Box", "Plane", "Torus", "Quad"]);
        assert_eq!(reg.find("Box").unwrap(), MeshHandle(2));
    }

    #[test]
    fn test_legacy_torus_name() {
        let reg = MeshRegistry::with_defaults();
        assert_eq!(reg.find("Tore").unwrap(), reg.find("Torus").unwrap());
    }

    #[test]
    fn test_unknown_name_and_handle() {
        let reg = MeshRegistry::with_defaults();
        assert!(matches!(reg.find("Teapot"), Err(Error::UnknownTemplate(n)) if n == "Teapot"));
        assert!(matches!(
            reg.lookup(MeshHandle(99)),
            Err(Error::InvalidMeshHandle { handle: 99, count: 6 })
        ));
    }

    #[test]
    fn test_create_template_idempotent() {
        let mut reg = MeshRegistry::new();
        let a = reg.create_template(MeshKind::Cube, TemplateParams::default());
        let b = reg.create_template(MeshKind::Cube, TemplateParams::default());
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_template_triangle_counts() {
        let reg = MeshRegistry::with_defaults();
        let tri = |name| reg.lookup(reg.find(name).unwrap()).unwrap().triangle_count();
        assert_eq!(tri("Cube"), 12);
        assert_eq!(tri("Box"), 12);
        assert_eq!(tri("Plane"), 2);
        assert_eq!(tri("Quad"), 2);
    }

    #[test]
    fn test_flattened_kinds() {
        assert!(MeshKind::Plane.is_flattened());
        assert!(MeshKind::Quad.is_flattened());
        assert!(!MeshKind::Sphere.is_flattened());
        assert!(!MeshKind::Torus.is_flattened());
    }
}
