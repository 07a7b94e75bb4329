//! Texture sampling: wrapping, LOD selection and point/bilinear/trilinear filtering
//!
//! Texture space has (0, 0) at the bottom-left texel and (1, 1) at the top-right one.
//! A coordinate maps onto texels as `u * (width - 1)`, so 0 and 1 hit the centers of
//! the first and last texel.

use super::color::Color;
use super::image::Image;
use super::math::{lerp, Point2i, Real, Vec2};
use super::types::{ImageFiltering, ImageWrapping};

/// Smallest footprint fed to `log2` when computing the LOD
const MIN_FOOTPRINT: Real = 1e-8;

/// Samples an [`Image`] using the filtering and wrapping state in its options
#[derive(Debug, Clone, Copy)]
pub struct Sampler2D<'a> {
    image: &'a Image,
}

impl<'a> Sampler2D<'a> {
    pub fn new(image: &'a Image) -> Self {
        debug_assert!(image.layout().is_color(), "sampling a non-color image");
        Self { image }
    }

    pub fn image(&self) -> &'a Image {
        self.image
    }

    /// Sample at `uv`. `duvdx` and `duvdy` are the screen-space derivatives of `uv`
    /// (change per one-pixel step) and drive mip selection. Returns a linear-space color.
    pub fn sample(&self, uv: Vec2, duvdx: Vec2, duvdy: Vec2) -> Color {
        let options = self.image.options();
        let uv = self.wrap(uv);
        if uv.x.is_infinite() || uv.y.is_infinite() {
            return options.border_color;
        }

        let lod = self.lod(duvdx, duvdy);
        if lod >= 0.0 && options.use_mips && self.image.mip_levels() > 1 {
            return self.sample_trilinear(uv, lod);
        }

        let filter = if lod < 0.0 { options.mag_filter } else { options.min_filter };
        match filter {
            ImageFiltering::Point => sample_nearest(self.image, uv),
            ImageFiltering::Linear => sample_bilinear(self.image, uv),
        }
    }

    /// Level of detail for a derivative footprint. Negative values mean magnification.
    pub fn lod(&self, duvdx: Vec2, duvdy: Vec2) -> Real {
        let footprint = duvdx.abs().max_element().max(duvdy.abs().max_element());
        let levels = self.image.lod_level_count() as Real;
        levels - 1.0 + footprint.max(MIN_FOOTPRINT).log2() + self.image.options().lod_bias
    }

    /// Apply the image's wrap modes. Border wrapping marks out-of-range axes with infinity.
    pub fn wrap(&self, uv: Vec2) -> Vec2 {
        let options = self.image.options();
        Vec2::new(wrap_coordinate(uv.x, options.wrap_u), wrap_coordinate(uv.y, options.wrap_v))
    }

    fn sample_trilinear(&self, uv: Vec2, lod: Real) -> Color {
        let last = (self.image.mip_levels() - 1) as Real;
        let lod = lod.min(last);
        let lower = lod.floor();
        let upper = lod.ceil();

        if self.image.options().mip_filter == ImageFiltering::Point {
            let nearest = if lod - lower > 0.5 { upper } else { lower };
            return sample_bilinear(self.image.level(nearest as usize), uv);
        }

        let a = sample_bilinear(self.image.level(lower as usize), uv);
        if upper == lower {
            return a;
        }
        let b = sample_bilinear(self.image.level(upper as usize), uv);
        lerp(lod - lower, a, b)
    }
}

pub fn wrap_coordinate(value: Real, mode: ImageWrapping) -> Real {
    match mode {
        ImageWrapping::Clamp => value.clamp(0.0, 1.0),
        ImageWrapping::Repeat => value - value.floor(),
        ImageWrapping::MirrorRepeat => {
            let period = value.floor();
            let frac = value - period;
            if (period as i64).rem_euclid(2) == 0 {
                frac
            } else {
                1.0 - frac
            }
        }
        ImageWrapping::Border => {
            if (0.0..=1.0).contains(&value) {
                value
            } else {
                Real::INFINITY
            }
        }
    }
}

fn texel_coordinates(image: &Image, uv: Vec2) -> Vec2 {
    Vec2::new(uv.x * (image.width() - 1) as Real, uv.y * (image.height() - 1) as Real)
}

/// Nearest texel; `uv` must already be wrapped into [0, 1]
pub fn sample_nearest(image: &Image, uv: Vec2) -> Color {
    let t = texel_coordinates(image, uv);
    image.pixel_color(Point2i::new(t.x.round() as i32, t.y.round() as i32))
}

/// Blend of the 4 texels around `uv`; `uv` must already be wrapped into [0, 1]
pub fn sample_bilinear(image: &Image, uv: Vec2) -> Color {
    let t = texel_coordinates(image, uv);
    let (max_x, max_y) = (image.width() as i32 - 1, image.height() as i32 - 1);

    let x0 = (t.x.floor() as i32).min(max_x);
    let y0 = (t.y.floor() as i32).min(max_y);
    let x1 = (x0 + 1).min(max_x);
    let y1 = (y0 + 1).min(max_y);
    let fx = t.x - x0 as Real;
    let fy = t.y - y0 as Real;

    let bottom = lerp(fx, image.pixel_color(Point2i::new(x0, y0)), image.pixel_color(Point2i::new(x1, y0)));
    let top = lerp(fx, image.pixel_color(Point2i::new(x0, y1)), image.pixel_color(Point2i::new(x1, y1)));
    lerp(fy, bottom, top)
}
