//! Path tracer: scene-to-GPU conversion and progressive accumulation.
//!
//! ## Architecture
//! ```text
//! ObjectManager -> flatten (Plane/Cube/Box/Quad) -> triangle storage buffer
//!               -> PrimitiveLists (spheres, tori, triangle ranges) -> uniform
//!               -> compute dispatch (ping-pong images) -> blit
//! ```
//!
//! Everything except [`compute`] is plain CPU code and is available without
//! the `viewer` feature.

pub mod accumulation;
#[cfg(feature = "viewer")]
pub mod compute;
pub mod flatten;
pub mod gpu_data;

pub use accumulation::{Accumulator, CameraPose, DispatchSlot, Phase};
#[cfg(feature = "viewer")]
pub use compute::PathTraceCompute;
pub use flatten::{flatten, FlattenedTriangles, TriangleRange};
pub use gpu_data::{
    GpuPrimitives, GpuTraceParams, GpuTriangle, PrimitiveLists, MAX_SPHERES, MAX_TORI,
    MAX_TRIANGLE_MESHES,
};
