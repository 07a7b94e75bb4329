//! Fixed-function state enums shared by the pipeline, images and samplers
//!
//! All of these are plain configuration values; they derive serde so that
//! pipeline and image settings can be written in RON config files.

use serde::{Deserialize, Serialize};

use super::math::Real;

/// Rotational order of a front-facing triangle's vertices in raster space
/// (origin bottom-left, Y up).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindingOrder {
    Clockwise,
    #[default]
    CounterClockwise,
}

impl WindingOrder {
    /// +1 for counter-clockwise, -1 for clockwise. Multiplying a 2D cross product by
    /// this keeps barycentric weights positive inside front-facing triangles.
    pub fn sign(self) -> Real {
        match self {
            WindingOrder::CounterClockwise => 1.0,
            WindingOrder::Clockwise => -1.0,
        }
    }

    /// Winding of a triangle given its signed double area in raster space
    pub fn from_signed_area(area: Real) -> Self {
        if area >= 0.0 {
            WindingOrder::CounterClockwise
        } else {
            WindingOrder::Clockwise
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            WindingOrder::CounterClockwise => WindingOrder::Clockwise,
            WindingOrder::Clockwise => WindingOrder::CounterClockwise,
        }
    }
}

/// Depth test comparison. `src` is the incoming fragment, `dst` the stored value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    Never,
    Always,
    #[default]
    Less,
    Greater,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
}

impl Comparator {
    pub fn compare(self, src: Real, dst: Real) -> bool {
        match self {
            Comparator::Never => false,
            Comparator::Always => true,
            Comparator::Less => src < dst,
            Comparator::Greater => src > dst,
            Comparator::Equal => src == dst,
            Comparator::NotEqual => src != dst,
            Comparator::LessEqual => src <= dst,
            Comparator::GreaterEqual => src >= dst,
        }
    }

    pub const ALL: [Comparator; 8] = [
        Comparator::Never,
        Comparator::Always,
        Comparator::Less,
        Comparator::Greater,
        Comparator::Equal,
        Comparator::NotEqual,
        Comparator::LessEqual,
        Comparator::GreaterEqual,
    ];
}

/// Multiplier applied to the source or destination color before the blend operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    DstColor,
    InvSrcColor,
    InvDstColor,
    SrcAlpha,
    DstAlpha,
    InvSrcAlpha,
    InvDstAlpha,
    ConstColor,
    InvConstColor,
    ConstAlpha,
    InvConstAlpha,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendOperator {
    #[default]
    Add,
    /// Source - Destination
    Subtract,
    /// Destination - Source
    ReverseSubtract,
    Min,
    Max,
}

impl BlendOperator {
    pub fn apply(self, src: Real, dst: Real) -> Real {
        match self {
            BlendOperator::Add => src + dst,
            BlendOperator::Subtract => src - dst,
            BlendOperator::ReverseSubtract => dst - src,
            BlendOperator::Min => src.min(dst),
            BlendOperator::Max => src.max(dst),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFiltering {
    /// Nearest texel
    #[default]
    Point,
    /// Bilinear between the 4 neighbouring texels (or between mip levels)
    Linear,
}

/// How texture coordinates outside [0, 1] are resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageWrapping {
    #[default]
    Clamp,
    Repeat,
    MirrorRepeat,
    /// Out-of-range coordinates resolve to the image's border color
    Border,
}

/// Color space the stored bytes of an image are encoded in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GammaSpace {
    #[default]
    Linear,
    GammaCorrected,
}

/// Memory layout of one pixel.
///
/// Color layouts are named by channel order from the most significant byte of the
/// packed 32-bit value to the least significant one; the value is stored little-endian.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelLayout {
    Argb8,
    Abgr8,
    #[default]
    Rgba8,
    Bgra8,
    /// One [`Real`] per pixel, so depth keeps the precision it was computed with
    Depth,
}

impl PixelLayout {
    pub const COLOR_LAYOUTS: [PixelLayout; 4] =
        [PixelLayout::Argb8, PixelLayout::Abgr8, PixelLayout::Rgba8, PixelLayout::Bgra8];

    /// Size of a pixel in bytes
    pub fn pixel_size(self) -> usize {
        match self {
            PixelLayout::Depth => std::mem::size_of::<Real>(),
            _ => 4,
        }
    }

    pub fn is_color(self) -> bool {
        !matches!(self, PixelLayout::Depth)
    }

    /// Bit shift of the R, G, B and A channels inside the packed value
    pub(crate) fn channel_shifts(self) -> [u32; 4] {
        match self {
            PixelLayout::Argb8 => [16, 8, 0, 24],
            PixelLayout::Abgr8 => [0, 8, 16, 24],
            PixelLayout::Rgba8 => [24, 16, 8, 0],
            PixelLayout::Bgra8 => [8, 16, 24, 0],
            PixelLayout::Depth => [0, 0, 0, 0],
        }
    }
}

/// How fragment depth is derived from the three vertex depths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepthInterpolation {
    /// Interpolate NDC z with the screen-space barycentric weights (z/w is affine in screen space)
    #[default]
    Linear,
    /// Interpolate 1/z and invert the result
    Reciprocal,
}
