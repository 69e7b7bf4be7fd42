//! WebGPU rendering module
//!
//! The scene builder turns simulation state into a [`FramePlan`] of plain
//! triangles; the pipeline composites it with the background and fog textures.

pub mod pipeline;
pub mod scene;
pub mod shapes;
pub mod vertex;

pub use pipeline::RenderState;
pub use scene::{Batch, Blend, FramePlan};
pub use vertex::{QuadVertex, Vertex};
