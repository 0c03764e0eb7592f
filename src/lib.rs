//! # raystudio
//!
//! Interactive 3D scene editor with a rasterized preview and a progressive
//! compute-shader path tracer.
//!
//! ## Modules
//!
//! - [`util`] - Errors, math re-exports and transform helpers
//! - [`scene`] - Mesh templates, instances, scene graph and scene files
//! - [`pathtracer`] - Triangle flattening, GPU layouts, accumulation
//! - [`editor`] - Edit surface and dirty tracking between UI and renderer
//! - `viewer` - eframe/wgpu application (feature `viewer`)
//!
//! ## Example
//!
//! ```
//! use raystudio::prelude::*;
//!
//! let mut scene = ObjectManager::default();
//! scene.add_instance_by_name("Sphere", None)?;
//! scene.add_instance_by_name("Box", None)?;
//!
//! let flat = flatten(&scene);
//! assert_eq!(flat.triangle_count(), 12);
//! # Ok::<(), raystudio::Error>(())
//! ```

pub mod editor;
pub mod pathtracer;
pub mod scene;
pub mod util;

// Editor application (optional, enabled with "viewer" feature)
#[cfg(feature = "viewer")]
pub mod viewer;

// Re-export commonly used types
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::editor::{Invalidation, SceneEditor};
    pub use crate::pathtracer::{flatten, Accumulator, CameraPose, FlattenedTriangles, PrimitiveLists};
    pub use crate::scene::{
        Instance, InstanceHandle, MeshHandle, MeshKind, MeshRegistry, ObjectManager,
    };
    pub use crate::util::{Error, Result};
}
