//! Render configuration loaded from RON
//!
//! Every field has a default, so a config file only needs the values it changes:
//!
//! ```ron
//! (
//!     width: 640,
//!     height: 480,
//!     pipeline: (blend: (enabled: true, src_color: SrcAlpha, dst_color: InvSrcAlpha)),
//!     texture: (min_filter: Linear, use_mips: true),
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::rasterizer::{Color, ImageOptions, PipelineState, Real, HEIGHT, WIDTH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub clear_color: Color,
    pub clear_depth: Real,
    pub pipeline: PipelineState,
    /// Sampling state for the demo texture; width and height are taken from the texture itself
    pub texture: ImageOptions,
    pub instance_count: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: WIDTH,
            height: HEIGHT,
            clear_color: Color::rgb(0.05, 0.05, 0.08),
            clear_depth: 1.0,
            pipeline: PipelineState::default(),
            texture: ImageOptions::default().trilinear(),
            instance_count: 1,
        }
    }
}

impl RenderConfig {
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: RenderConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&source)?;
        info!(path = %path.display(), width = config.width, height = config.height, "loaded render config");
        Ok(config)
    }

    pub fn to_ron_string(&self) -> Result<String> {
        let pretty = ron::ser::PrettyConfig::new().depth_limit(4);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Reject sizes the frame buffer can't be built with. Out-of-range depth values are
    /// clamped with a warning rather than rejected.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidConfig(format!("render target {}x{} has no pixels", self.width, self.height)));
        }
        if self.width > u16::MAX as u32 || self.height > u16::MAX as u32 {
            return Err(Error::InvalidConfig(format!("render target {}x{} is too large", self.width, self.height)));
        }
        if !(0.0..=1.0).contains(&self.clear_depth) {
            warn!(clear_depth = self.clear_depth, "clear depth outside [0, 1], it will be clamped");
        }
        Ok(())
    }

    pub fn clear_depth(&self) -> Real {
        self.clear_depth.clamp(0.0, 1.0)
    }
}
