//! rasterkit: a software triangle rasterizer with pluggable vertex and pixel shaders
//!
//! ```no_run
//! use std::sync::Arc;
//! use rasterkit::rasterizer::{Color, FrameBuffer, Model, Pipeline, PipelineState, Rasterizer, Vec3};
//!
//! let pipeline = Arc::new(Pipeline::new(PipelineState::default()).with_pixel_shader(|_, _| Color::RED));
//! let mut model = Model::new(pipeline);
//! model.set_vertex_data(&[Vec3::new(-0.5, -0.5, 0.5), Vec3::new(0.5, -0.5, 0.5), Vec3::new(0.0, 0.5, 0.5)]);
//! model.set_indices(&[0, 1, 2]);
//!
//! let mut target = FrameBuffer::new(64, 64);
//! target.clear(Color::BLACK, 1.0);
//! Rasterizer::new().draw(&mut target, &model, 1);
//! ```

pub mod config;
pub mod error;
pub mod rasterizer;

pub use config::RenderConfig;
pub use error::{Error, Result};
pub use rasterizer::{
    Color, FrameBuffer, Image, ImageOptions, Model, Pipeline, PipelineState, Rasterizer, Sampler2D,
};
