//! Scene representation.
//!
//! - [`MeshRegistry`] - immutable mesh templates, addressed by [`MeshHandle`]
//! - [`Instance`] - material and transform of one placed object
//! - [`ObjectManager`] - the scene graph, addressed by [`InstanceHandle`]
//! - [`scene_file`] - text scene serialization

mod instance;
mod mesh;
mod object_manager;
pub mod primitives;
pub mod scene_file;

pub use instance::Instance;
pub use mesh::{MeshHandle, MeshKind, MeshRegistry, MeshTemplate, TemplateParams};
pub use object_manager::{InstanceHandle, ObjectManager};
pub use scene_file::{resolve_scene_path, LoadReport, DEFAULT_SCENES_DIR};
