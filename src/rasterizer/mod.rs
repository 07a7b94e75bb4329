//! CPU triangle rasterizer
//!
//! Components, leaf first:
//! - `barycentric`: per-triangle coverage and interpolation weights with a fill rule
//! - `color`: colors, gamma transfer functions and pixel packing
//! - `image` / `sampler`: pixel storage, mips and filtered texture lookups
//! - `pipeline` / `model`: draw state, shader contracts and geometry buffers
//! - `render`: the rasterizer that ties them together
//!
//! Raster space has its origin at the bottom-left corner with Y up. Pixel centers sit
//! at +0.5 on both axes.

mod barycentric;
mod color;
mod image;
mod math;
mod model;
mod pipeline;
mod render;
mod sampler;
mod types;

pub mod mesh;
pub mod shaders;

pub use barycentric::*;
pub use color::*;
pub use self::image::*;
pub use math::*;
pub use model::*;
pub use pipeline::*;
pub use render::*;
pub use sampler::*;
pub use types::*;

/// Default render target size
pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 240;
