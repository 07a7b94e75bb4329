//! Pixel storage for render targets, depth buffers and textures
//!
//! Rows are stored bottom-up: pixel (0, 0) is the bottom-left corner, matching
//! raster space. Files are flipped on load and on save.

use std::mem::size_of;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::color::{Color, GammaTable};
use super::math::{Bounds2i, Point2i, Real};
use super::types::{GammaSpace, ImageFiltering, ImageWrapping, PixelLayout};
use crate::error::{Error, Result};

/// Construction options. Also carries the sampling state used by [`Sampler2D`](super::sampler::Sampler2D).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    pub width: u32,
    pub height: u32,
    /// Number of 2D slices (depth of a 3D image or length of an array)
    pub array_size: u32,
    pub layout: PixelLayout,
    pub gamma_space: GammaSpace,
    pub min_filter: ImageFiltering,
    pub mag_filter: ImageFiltering,
    pub mip_filter: ImageFiltering,
    pub wrap_u: ImageWrapping,
    pub wrap_v: ImageWrapping,
    pub border_color: Color,
    /// Build a mip chain on load and sample it when minifying
    pub use_mips: bool,
    pub lod_bias: Real,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            array_size: 1,
            layout: PixelLayout::Rgba8,
            gamma_space: GammaSpace::Linear,
            min_filter: ImageFiltering::Point,
            mag_filter: ImageFiltering::Point,
            mip_filter: ImageFiltering::Point,
            wrap_u: ImageWrapping::Clamp,
            wrap_v: ImageWrapping::Clamp,
            border_color: Color::BLACK,
            use_mips: false,
            lod_bias: 0.0,
        }
    }
}

impl ImageOptions {
    pub fn new(width: u32, height: u32, layout: PixelLayout) -> Self {
        Self { width, height, layout, ..Default::default() }
    }

    /// Bilinear filtering everywhere with linearly blended mips
    pub fn trilinear(mut self) -> Self {
        self.min_filter = ImageFiltering::Linear;
        self.mag_filter = ImageFiltering::Linear;
        self.mip_filter = ImageFiltering::Linear;
        self.use_mips = true;
        self
    }

    pub fn with_wrapping(mut self, wrap: ImageWrapping) -> Self {
        self.wrap_u = wrap;
        self.wrap_v = wrap;
        self
    }

    fn byte_size(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.array_size as usize)?
            .checked_mul(self.layout.pixel_size())
    }
}

/// Pack 8-bit R, G, B, A channels into a layout's 32-bit value
fn pack_channels(rgba: [u8; 4], layout: PixelLayout) -> u32 {
    let shifts = layout.channel_shifts();
    rgba.iter().zip(shifts).fold(0u32, |acc, (&c, s)| acc | ((c as u32) << s))
}

fn unpack_channels(value: u32, layout: PixelLayout) -> [u8; 4] {
    layout.channel_shifts().map(|s| ((value >> s) & 0xFF) as u8)
}

/// An owned pixel buffer with an optional mip chain.
///
/// The buffer holds exactly `width * height * array_size * pixel_size` bytes. If that
/// allocation fails the image is still constructed but [`Image::is_valid`] returns false
/// and it must not be drawn into or sampled.
#[derive(Debug, Clone)]
pub struct Image {
    options: ImageOptions,
    buffer: Vec<u8>,
    /// Levels 1.. of the mip chain; level 0 is `self`
    mips: Vec<Image>,
    gamma_table: Option<Arc<GammaTable>>,
    valid: bool,
}

impl Image {
    pub fn new(options: ImageOptions) -> Self {
        let mut image = Self { options, buffer: Vec::new(), mips: Vec::new(), gamma_table: None, valid: false };

        let size = match image.options.byte_size() {
            Some(0) | None => {
                warn!(
                    width = image.options.width,
                    height = image.options.height,
                    array_size = image.options.array_size,
                    "image has no addressable pixels"
                );
                return image;
            }
            Some(size) => size,
        };

        if let Err(e) = image.buffer.try_reserve_exact(size) {
            warn!(bytes = size, error = %e, "image allocation failed");
            return image;
        }
        image.buffer.resize(size, 0);
        image.valid = true;

        if !image.options.layout.is_color() {
            image.clear_depth(1.0);
        }

        debug!(
            width = image.options.width,
            height = image.options.height,
            layout = ?image.options.layout,
            "image allocated"
        );
        image
    }

    pub fn with_size(width: u32, height: u32, layout: PixelLayout) -> Self {
        Self::new(ImageOptions::new(width, height, layout))
    }

    /// Checkerboard texture with square cells of `cell` pixels
    pub fn checkerboard(options: ImageOptions, cell: u32, color1: Color, color2: Color) -> Self {
        let mut image = Self::new(options);
        if !image.valid {
            return image;
        }
        let cell = cell.max(1) as i32;
        for y in 0..image.height() as i32 {
            for x in 0..image.width() as i32 {
                let checker = ((x / cell) + (y / cell)) % 2 == 0;
                image.set_pixel_color(Point2i::new(x, y), if checker { color1 } else { color2 });
            }
        }
        if image.options.use_mips {
            image.generate_mips();
        }
        image
    }

    /// Decode an image file (PNG, JPEG, BMP). Width and height come from the file,
    /// everything else from `options`.
    pub fn from_file<P: AsRef<Path>>(path: P, options: ImageOptions) -> Result<Self> {
        let path = path.as_ref();
        let decoded = ::image::open(path)?;
        let image = Self::from_decoded(decoded, options)?;
        info!(path = %path.display(), width = image.width(), height = image.height(), "loaded image");
        Ok(image)
    }

    pub fn from_bytes(bytes: &[u8], options: ImageOptions) -> Result<Self> {
        let decoded = ::image::load_from_memory(bytes)?;
        Self::from_decoded(decoded, options)
    }

    fn from_decoded(decoded: ::image::DynamicImage, options: ImageOptions) -> Result<Self> {
        if !options.layout.is_color() {
            return Err(Error::UnsupportedLayout(options.layout));
        }
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut image = Self::new(ImageOptions { width, height, array_size: 1, ..options });
        if !image.valid {
            return Err(Error::InvalidImage(format!("cannot allocate {}x{} image", width, height)));
        }

        let layout = image.options.layout;
        for (x, y, p) in rgba.enumerate_pixels() {
            // File rows are top-down
            let position = Point2i::new(x as i32, (height - 1 - y) as i32);
            image.set_pixel_packed(position, pack_channels(p.0, layout));
        }

        if image.options.use_mips {
            image.generate_mips();
        }
        Ok(image)
    }

    /// Write slice 0 to disk; the format is picked from the file extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_rgba8_top_down()?;
        let out = ::image::RgbaImage::from_raw(self.width(), self.height(), bytes)
            .ok_or_else(|| Error::InvalidImage("pixel buffer does not match image size".to_string()))?;
        out.save(path)?;
        info!(path = %path.display(), width = self.width(), height = self.height(), "saved image");
        Ok(())
    }

    /// Slice 0 as tightly packed RGBA8 rows, top row first. The stored encoding is kept
    /// as is, so a gamma-corrected image yields sRGB bytes.
    pub fn to_rgba8_top_down(&self) -> Result<Vec<u8>> {
        if !self.valid {
            return Err(Error::InvalidImage("image has no pixel buffer".to_string()));
        }
        let layout = self.options.layout;
        if !layout.is_color() {
            return Err(Error::UnsupportedLayout(layout));
        }
        let (w, h) = (self.width() as i32, self.height() as i32);
        let mut out = Vec::with_capacity(self.width() as usize * self.height() as usize * 4);
        for y in (0..h).rev() {
            for x in 0..w {
                out.extend_from_slice(&unpack_channels(self.pixel_packed(Point2i::new(x, y)), layout));
            }
        }
        Ok(out)
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn options(&self) -> &ImageOptions {
        &self.options
    }

    pub fn width(&self) -> u32 {
        self.options.width
    }

    pub fn height(&self) -> u32 {
        self.options.height
    }

    pub fn array_size(&self) -> u32 {
        self.options.array_size
    }

    pub fn layout(&self) -> PixelLayout {
        self.options.layout
    }

    pub fn gamma_space(&self) -> GammaSpace {
        self.options.gamma_space
    }

    pub fn aspect_ratio(&self) -> Real {
        self.options.width as Real / self.options.height as Real
    }

    /// Pixel rectangle of one slice
    pub fn bounds(&self) -> Bounds2i {
        Bounds2i::new(Point2i::new(0, 0), Point2i::new(self.width() as i32, self.height() as i32))
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Use a lookup table instead of `powf` for gamma conversions of this image
    pub fn set_gamma_table(&mut self, table: Option<Arc<GammaTable>>) {
        for mip in &mut self.mips {
            mip.set_gamma_table(table.clone());
        }
        self.gamma_table = table;
    }

    pub fn gamma_table(&self) -> Option<&Arc<GammaTable>> {
        self.gamma_table.as_ref()
    }

    /// Byte offset of a pixel. Out-of-range positions panic here rather than touching
    /// another pixel's bytes.
    fn offset(&self, p: Point2i, slice: u32) -> usize {
        assert!(
            self.bounds().contains(p) && slice < self.options.array_size,
            "pixel ({}, {}) slice {} outside {}x{}x{} image",
            p.x,
            p.y,
            slice,
            self.options.width,
            self.options.height,
            self.options.array_size
        );
        let (w, h) = (self.options.width as usize, self.options.height as usize);
        ((slice as usize * h + p.y as usize) * w + p.x as usize) * self.options.layout.pixel_size()
    }

    fn read_u32(&self, offset: usize) -> u32 {
        let b = &self.buffer[offset..offset + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    fn write_bytes(&mut self, offset: usize, bytes: [u8; 4]) {
        self.buffer[offset..offset + 4].copy_from_slice(&bytes);
    }

    fn decode(&self, packed: u32) -> Color {
        let color = Color::from_u32(packed, self.options.layout);
        match (self.options.gamma_space, &self.gamma_table) {
            (GammaSpace::Linear, _) => color,
            (GammaSpace::GammaCorrected, Some(table)) => table.color_to_linear_space(color),
            (GammaSpace::GammaCorrected, None) => color.to_linear_space(),
        }
    }

    fn encode(&self, color: Color) -> u32 {
        let color = match (self.options.gamma_space, &self.gamma_table) {
            (GammaSpace::Linear, _) => color,
            (GammaSpace::GammaCorrected, Some(table)) => table.color_to_gamma_correct_space(color.clamped()),
            (GammaSpace::GammaCorrected, None) => color.clamped().to_gamma_correct_space(),
        };
        color.to_u32(self.options.layout)
    }

    pub fn pixel_packed(&self, p: Point2i) -> u32 {
        self.read_u32(self.offset(p, 0))
    }

    pub fn set_pixel_packed(&mut self, p: Point2i, value: u32) {
        let offset = self.offset(p, 0);
        self.write_bytes(offset, value.to_le_bytes());
    }

    /// Color at a pixel, converted to linear space
    pub fn pixel_color(&self, p: Point2i) -> Color {
        self.pixel_color_in_slice(p, 0)
    }

    pub fn pixel_color_in_slice(&self, p: Point2i, slice: u32) -> Color {
        debug_assert!(self.options.layout.is_color());
        self.decode(self.read_u32(self.offset(p, slice)))
    }

    /// Store a linear-space color, encoding it into the image's gamma space and layout
    pub fn set_pixel_color(&mut self, p: Point2i, color: Color) {
        self.set_pixel_color_in_slice(p, 0, color);
    }

    pub fn set_pixel_color_in_slice(&mut self, p: Point2i, slice: u32, color: Color) {
        debug_assert!(self.options.layout.is_color());
        let offset = self.offset(p, slice);
        let packed = self.encode(color);
        self.write_bytes(offset, packed.to_le_bytes());
    }

    pub fn pixel_depth(&self, p: Point2i) -> Real {
        debug_assert_eq!(self.options.layout, PixelLayout::Depth);
        let offset = self.offset(p, 0);
        bytemuck::pod_read_unaligned(&self.buffer[offset..offset + size_of::<Real>()])
    }

    pub fn set_pixel_depth(&mut self, p: Point2i, depth: Real) {
        debug_assert_eq!(self.options.layout, PixelLayout::Depth);
        let offset = self.offset(p, 0);
        self.buffer[offset..offset + size_of::<Real>()].copy_from_slice(bytemuck::bytes_of(&depth));
    }

    /// Fill every slice with one color
    pub fn clear_color(&mut self, color: Color) {
        debug_assert!(self.options.layout.is_color());
        let bytes = self.encode(color).to_le_bytes();
        for pixel in self.buffer.chunks_exact_mut(4) {
            pixel.copy_from_slice(&bytes);
        }
    }

    pub fn clear_depth(&mut self, depth: Real) {
        debug_assert_eq!(self.options.layout, PixelLayout::Depth);
        let bytes = bytemuck::bytes_of(&depth);
        for pixel in self.buffer.chunks_exact_mut(size_of::<Real>()) {
            pixel.copy_from_slice(bytes);
        }
    }

    /// Re-encode every pixel (mips included) into another gamma space and color layout
    pub fn set_pixel_format(&mut self, gamma_space: GammaSpace, layout: PixelLayout) -> Result<()> {
        if !self.options.layout.is_color() || !layout.is_color() {
            return Err(Error::UnsupportedLayout(if layout.is_color() { self.options.layout } else { layout }));
        }
        if gamma_space == self.options.gamma_space && layout == self.options.layout {
            return Ok(());
        }

        let mut converted = Self {
            options: ImageOptions { gamma_space, layout, ..self.options.clone() },
            buffer: Vec::new(),
            mips: Vec::new(),
            gamma_table: self.gamma_table.clone(),
            valid: self.valid,
        };
        let mut buffer = Vec::with_capacity(self.buffer.len());
        for chunk in self.buffer.chunks_exact(4) {
            let color = self.decode(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
            buffer.extend_from_slice(&converted.encode(color).to_le_bytes());
        }
        converted.buffer = buffer;

        for mip in &mut self.mips {
            mip.set_pixel_format(gamma_space, layout)?;
        }
        self.options = converted.options;
        self.buffer = converted.buffer;
        Ok(())
    }

    /// Composite `source` over this image with its bottom-left corner at `origin`.
    /// Pixels falling outside this image are dropped.
    pub fn blit(&mut self, source: &Image, origin: Point2i) {
        debug_assert!(self.options.layout.is_color() && source.options.layout.is_color());
        let target = self.bounds();
        for y in 0..source.height() as i32 {
            for x in 0..source.width() as i32 {
                let p = Point2i::new(origin.x + x, origin.y + y);
                if !target.contains(p) {
                    continue;
                }
                let src = source.pixel_color(Point2i::new(x, y));
                let dst = self.pixel_color(p);
                self.set_pixel_color(p, Color::blend_over(src, dst));
            }
        }
    }

    /// Number of levels a full chain for this size has: `floor(log2(max(w, h))) + 1`
    pub fn lod_level_count(&self) -> u32 {
        let largest = self.options.width.max(self.options.height).max(1);
        u32::BITS - largest.leading_zeros()
    }

    /// Levels actually stored, including level 0
    pub fn mip_levels(&self) -> usize {
        1 + self.mips.len()
    }

    /// Mip level `level`, clamped to the last stored one
    pub fn level(&self, level: usize) -> &Image {
        match level {
            0 => self,
            n => self.mips.get(n - 1).or(self.mips.last()).unwrap_or(self),
        }
    }

    /// Rebuild the mip chain down to 1x1 with a 2x2 box filter in linear space
    pub fn generate_mips(&mut self) {
        self.mips.clear();
        if !self.valid || !self.options.layout.is_color() {
            warn!(layout = ?self.options.layout, valid = self.valid, "skipping mip generation");
            return;
        }

        let levels = self.lod_level_count() as usize;
        for _ in 1..levels {
            let previous = self.mips.last().unwrap_or(&*self);
            let next = previous.downsample();
            if !next.valid {
                warn!(width = next.width(), height = next.height(), "mip allocation failed, chain truncated");
                break;
            }
            self.mips.push(next);
        }
        debug!(levels = self.mip_levels(), width = self.width(), height = self.height(), "generated mips");
    }

    fn downsample(&self) -> Image {
        let width = (self.width() / 2).max(1);
        let height = (self.height() / 2).max(1);
        let mut next = Image::new(ImageOptions { width, height, use_mips: false, ..self.options.clone() });
        if !next.valid {
            return next;
        }
        next.gamma_table = self.gamma_table.clone();

        let (max_x, max_y) = (self.width() as i32 - 1, self.height() as i32 - 1);
        for slice in 0..self.array_size() {
            for y in 0..height as i32 {
                for x in 0..width as i32 {
                    // A 1-pixel-wide (or tall) source repeats its single column (or row)
                    let (x0, y0) = ((2 * x).min(max_x), (2 * y).min(max_y));
                    let (x1, y1) = ((2 * x + 1).min(max_x), (2 * y + 1).min(max_y));
                    let samples = [(x0, y0), (x1, y0), (x0, y1), (x1, y1)]
                        .map(|(sx, sy)| self.pixel_color_in_slice(Point2i::new(sx, sy), slice));
                    // Summed by hand: Color addition saturates alpha
                    let (r, g, b, a) = samples
                        .iter()
                        .fold((0.0, 0.0, 0.0, 0.0), |(r, g, b, a), c| (r + c.r, g + c.g, b + c.b, a + c.a));
                    next.set_pixel_color_in_slice(Point2i::new(x, y), slice, Color::new(r, g, b, a) * 0.25);
                }
            }
        }
        next
    }
}
