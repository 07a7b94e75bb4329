//! Color math: linear/gamma transfer functions and pixel packing
//!
//! A [`Color`] does not know which space it is in. Callers track that; images
//! do it through their [`GammaSpace`](super::types::GammaSpace).

use std::ops::{Add, AddAssign, Mul, MulAssign, Sub};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use super::math::{Real, Vec3};
use super::types::PixelLayout;

/// Exponent of the power-law segment of the sRGB transfer curve
pub const DEFAULT_GAMMA: Real = 2.4;

/// Linear values at or below this use the linear segment when encoding
const LINEAR_THRESHOLD: Real = 0.003_130_8;
/// Encoded values at or below this use the linear segment when decoding
const ENCODED_THRESHOLD: Real = 0.040_45;

/// Convert one linear channel value in [0, 1] to gamma-corrected space
pub fn to_gamma_correct_space(value: Real, gamma: Real) -> Real {
    if value <= LINEAR_THRESHOLD {
        value * 12.92
    } else {
        1.055 * value.powf(1.0 / gamma) - 0.055
    }
}

/// Convert one gamma-corrected channel value in [0, 1] back to linear space
pub fn to_linear_space(value: Real, gamma: Real) -> Real {
    if value <= ENCODED_THRESHOLD {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(gamma)
    }
}

/// RGBA color with real components.
///
/// Components are nominally in [0, 1] but only alpha is kept there by addition;
/// color channels may exceed 1 until the value is packed.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
pub struct Color {
    pub r: Real,
    pub g: Real,
    pub b: Real,
    pub a: Real,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const PINK: Color = Color::rgb(1.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: Real, g: Real, b: Real, a: Real) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: Real, g: Real, b: Real) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn from_vec3(v: Vec3, a: Real) -> Self {
        Self::new(v.x, v.y, v.z, a)
    }

    pub fn rgb_vec(self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }

    pub fn with_alpha(self, a: Real) -> Self {
        Self { a, ..self }
    }

    pub fn clamped(self) -> Self {
        Self::new(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
            self.a.clamp(0.0, 1.0),
        )
    }

    /// Apply the sRGB encoding curve to the color channels; alpha is left untouched
    pub fn to_gamma_correct_space(self) -> Self {
        Self::new(
            to_gamma_correct_space(self.r, DEFAULT_GAMMA),
            to_gamma_correct_space(self.g, DEFAULT_GAMMA),
            to_gamma_correct_space(self.b, DEFAULT_GAMMA),
            self.a,
        )
    }

    /// Inverse of [`Color::to_gamma_correct_space`]
    pub fn to_linear_space(self) -> Self {
        Self::new(
            to_linear_space(self.r, DEFAULT_GAMMA),
            to_linear_space(self.g, DEFAULT_GAMMA),
            to_linear_space(self.b, DEFAULT_GAMMA),
            self.a,
        )
    }

    /// Pack into a 32-bit value. Channels are clamped to [0, 1] and rounded to the
    /// nearest of 256 levels.
    pub fn to_u32(self, layout: PixelLayout) -> u32 {
        debug_assert!(layout.is_color(), "cannot pack a color into {:?}", layout);
        let quantize = |c: Real| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
        let [rs, gs, bs, as_] = layout.channel_shifts();
        (quantize(self.r) << rs) | (quantize(self.g) << gs) | (quantize(self.b) << bs) | (quantize(self.a) << as_)
    }

    pub fn from_u32(value: u32, layout: PixelLayout) -> Self {
        debug_assert!(layout.is_color(), "cannot unpack a color from {:?}", layout);
        let [rs, gs, bs, as_] = layout.channel_shifts();
        let channel = |shift: u32| ((value >> shift) & 0xFF) as Real / 255.0;
        Self::new(channel(rs), channel(gs), channel(bs), channel(as_))
    }

    /// Porter-Duff "over": `src` composited on top of `dst`, both in linear space
    pub fn blend_over(src: Color, dst: Color) -> Color {
        let inv = 1.0 - src.a;
        Color::new(
            src.r * src.a + dst.r * inv,
            src.g * src.a + dst.g * inv,
            src.b * src.a + dst.b * inv,
            src.a + dst.a * inv,
        )
    }
}

impl Add for Color {
    type Output = Color;
    fn add(self, o: Color) -> Color {
        Color::new(self.r + o.r, self.g + o.g, self.b + o.b, (self.a + o.a).min(1.0))
    }
}

impl AddAssign for Color {
    fn add_assign(&mut self, o: Color) {
        *self = *self + o;
    }
}

impl Sub for Color {
    type Output = Color;
    fn sub(self, o: Color) -> Color {
        Color::new(self.r - o.r, self.g - o.g, self.b - o.b, self.a - o.a)
    }
}

impl Mul<Real> for Color {
    type Output = Color;
    fn mul(self, s: Real) -> Color {
        Color::new(self.r * s, self.g * s, self.b * s, self.a * s)
    }
}

impl MulAssign<Real> for Color {
    fn mul_assign(&mut self, s: Real) {
        *self = *self * s;
    }
}

impl Mul<Color> for Color {
    type Output = Color;
    fn mul(self, o: Color) -> Color {
        Color::new(self.r * o.r, self.g * o.g, self.b * o.b, self.a * o.a)
    }
}

/// Precomputed transfer curves sampled at 100,001 points over [0, 1].
///
/// Build one at startup and share it by reference (or `Arc`) with whatever
/// converts colors in a hot loop; lookups trade a small quantization error for
/// avoiding `powf` per channel.
#[derive(Debug, Clone)]
pub struct GammaTable {
    gamma: Real,
    to_gamma: Vec<Real>,
    to_linear: Vec<Real>,
}

impl GammaTable {
    pub const SIZE: usize = 100_001;
    const STEPS: Real = (Self::SIZE - 1) as Real;

    pub fn new(gamma: Real) -> Self {
        let sample = |i: usize| i as Real / Self::STEPS;
        let to_gamma = (0..Self::SIZE).map(|i| to_gamma_correct_space(sample(i), gamma)).collect();
        let to_linear = (0..Self::SIZE).map(|i| to_linear_space(sample(i), gamma)).collect();
        Self { gamma, to_gamma, to_linear }
    }

    pub fn gamma(&self) -> Real {
        self.gamma
    }

    fn lookup(table: &[Real], value: Real) -> Real {
        let index = (value * Self::STEPS).round();
        if index <= 0.0 || index.is_nan() {
            return 0.0;
        }
        if index >= Self::STEPS {
            return 1.0;
        }
        table[index as usize]
    }

    pub fn to_gamma_correct_space(&self, value: Real) -> Real {
        Self::lookup(&self.to_gamma, value)
    }

    pub fn to_linear_space(&self, value: Real) -> Real {
        Self::lookup(&self.to_linear, value)
    }

    pub fn color_to_gamma_correct_space(&self, c: Color) -> Color {
        Color::new(
            self.to_gamma_correct_space(c.r),
            self.to_gamma_correct_space(c.g),
            self.to_gamma_correct_space(c.b),
            c.a,
        )
    }

    pub fn color_to_linear_space(&self, c: Color) -> Color {
        Color::new(self.to_linear_space(c.r), self.to_linear_space(c.g), self.to_linear_space(c.b), c.a)
    }
}

impl Default for GammaTable {
    fn default() -> Self {
        Self::new(DEFAULT_GAMMA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BYTE_STEP: Real = 1.0 / 255.0;

    fn close(a: Color, b: Color, eps: Real) -> bool {
        (a.r - b.r).abs() <= eps && (a.g - b.g).abs() <= eps && (a.b - b.b).abs() <= eps && (a.a - b.a).abs() <= eps
    }

    #[test]
    fn test_argb_packing_matches_byte_positions() {
        let c = Color::new(1.0, 0.0, 0.0, 1.0);
        assert_eq!(c.to_u32(PixelLayout::Argb8), 0xFFFF_0000);
        assert_eq!(c.to_u32(PixelLayout::Rgba8), 0xFF00_00FF);
        assert_eq!(c.to_u32(PixelLayout::Bgra8), 0x0000_FFFF);
        assert_eq!(c.to_u32(PixelLayout::Abgr8), 0xFF00_00FF);
    }

    #[test]
    fn test_packing_clamps_out_of_range() {
        let hdr = Color::new(4.0, -1.0, 0.5, 1.0);
        let back = Color::from_u32(hdr.to_u32(PixelLayout::Rgba8), PixelLayout::Rgba8);
        assert_eq!(back.r, 1.0);
        assert_eq!(back.g, 0.0);
        assert!((back.b - 0.5).abs() <= BYTE_STEP);
    }

    #[test]
    fn test_gamma_round_trip_at_boundaries() {
        for x in [0.0, LINEAR_THRESHOLD, 1.0] {
            let back = to_linear_space(to_gamma_correct_space(x, DEFAULT_GAMMA), DEFAULT_GAMMA);
            assert!((back - x).abs() < 1e-3, "x = {}", x);
        }
    }

    #[test]
    fn test_gamma_curve_is_brighter_in_midtones() {
        let encoded = to_gamma_correct_space(0.2, DEFAULT_GAMMA);
        assert!(encoded > 0.2);
        assert!((to_gamma_correct_space(1.0, DEFAULT_GAMMA) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_gamma_table_matches_exact_curve() {
        let table = GammaTable::default();
        for i in 0..=100 {
            let x = i as Real / 100.0;
            let exact = to_gamma_correct_space(x, DEFAULT_GAMMA);
            assert!((table.to_gamma_correct_space(x) - exact).abs() < 1e-3);
            let exact = to_linear_space(x, DEFAULT_GAMMA);
            assert!((table.to_linear_space(x) - exact).abs() < 1e-3);
        }
        assert_eq!(table.to_gamma_correct_space(-0.5), 0.0);
        assert_eq!(table.to_linear_space(7.0), 1.0);
    }

    #[test]
    fn test_addition_clamps_alpha_only() {
        let c = Color::new(0.8, 0.8, 0.8, 0.8) + Color::new(0.8, 0.1, 0.1, 0.8);
        assert!((c.r - 1.6).abs() < 1e-6);
        assert_eq!(c.a, 1.0);
    }

    #[test]
    fn test_blend_over() {
        let half_red = Color::new(1.0, 0.0, 0.0, 0.5);
        let out = Color::blend_over(half_red, Color::BLUE);
        assert!(close(out, Color::new(0.5, 0.0, 0.5, 1.0), 1e-6));
    }

    proptest! {
        #[test]
        fn prop_pack_round_trip(r in 0.0..=1.0f64, g in 0.0..=1.0f64, b in 0.0..=1.0f64, a in 0.0..=1.0f64) {
            let c = Color::new(r as Real, g as Real, b as Real, a as Real);
            for layout in PixelLayout::COLOR_LAYOUTS {
                let back = Color::from_u32(c.to_u32(layout), layout);
                prop_assert!(close(back, c, BYTE_STEP), "{:?}: {:?} -> {:?}", layout, c, back);
            }
        }

        #[test]
        fn prop_gamma_round_trip(x in 0.0..=1.0f64) {
            let x = x as Real;
            let back = to_linear_space(to_gamma_correct_space(x, DEFAULT_GAMMA), DEFAULT_GAMMA);
            prop_assert!((back - x).abs() < 1e-3);
        }
    }
}
