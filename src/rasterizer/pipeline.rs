//! Pipeline state and the vertex/pixel shader contracts
//!
//! A [`Pipeline`] bundles the fixed-function state (winding, depth, blend) with the two
//! shader callbacks. Shaders see vertex, instance and constant records as byte slices
//! and read them back through `bytemuck`, either whole (`vertex::<T>()`) or one field
//! at a time by byte offset (`interpolate::<T>(offset_of!(Vertex, uv))`).

use std::fmt;
use std::mem::size_of;
use std::ops::{Add, Mul, Sub};

use bytemuck::Pod;
use serde::{Deserialize, Serialize};

use super::barycentric::{BarycentricCoordinates, BarycentricHelper};
use super::color::Color;
use super::math::{Point2i, Real, Vec3, Vec4};
use super::types::{BlendFactor, BlendOperator, Comparator, DepthInterpolation, WindingOrder};

/// Values a pixel shader can interpolate across a triangle
pub trait Interpolant: Pod + Add<Output = Self> + Sub<Output = Self> + Mul<Real, Output = Self> {}

impl<T> Interpolant for T where T: Pod + Add<Output = T> + Sub<Output = T> + Mul<Real, Output = T> {}

/// Read a `T` stored at `offset` bytes into a record
pub fn read_field<T: Pod>(record: &[u8], offset: usize) -> T {
    let end = offset + size_of::<T>();
    assert!(
        end <= record.len(),
        "field of {} bytes at offset {} overruns a {} byte record",
        size_of::<T>(),
        offset,
        record.len()
    );
    bytemuck::pod_read_unaligned(&record[offset..end])
}

/// Read a whole record as `T`. Debug builds check that the record is exactly a `T`.
fn read_record<T: Pod>(record: &[u8]) -> T {
    debug_assert_eq!(
        record.len(),
        size_of::<T>(),
        "record is {} bytes, {} is {}",
        record.len(),
        std::any::type_name::<T>(),
        size_of::<T>()
    );
    read_field(record, 0)
}

/// Input of one vertex shader invocation
#[derive(Debug, Clone, Copy)]
pub struct PerVertexInfo<'a> {
    pub primitive_index: usize,
    /// Index into the model's vertex buffer
    pub vertex_index: usize,
    pub instance_index: usize,
    pub vertex_data: &'a [u8],
    /// Empty for models without instance data
    pub instance_data: &'a [u8],
    pub constants: &'a [u8],
}

impl PerVertexInfo<'_> {
    pub fn vertex<T: Pod>(&self) -> T {
        read_record(self.vertex_data)
    }

    pub fn instance<T: Pod>(&self) -> T {
        read_record(self.instance_data)
    }

    pub fn constants<T: Pod>(&self) -> T {
        read_record(self.constants)
    }
}

/// Input of one pixel shader invocation.
///
/// Interpolation is perspective-correct: each vertex field is weighted by its
/// barycentric weight times the vertex's `1/w`, renormalized by the interpolated `w`.
#[derive(Debug, Clone, Copy)]
pub struct PerPixelInfo<'a> {
    pub position: Point2i,
    pub barycentric: BarycentricCoordinates,
    pub primitive_index: usize,
    pub instance_index: usize,
    pub vertex_data: [&'a [u8]; 3],
    pub instance_data: &'a [u8],
    pub constants: &'a [u8],
    helper: &'a BarycentricHelper,
    one_over_w: [Real; 3],
}

impl<'a> PerPixelInfo<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        position: Point2i,
        barycentric: BarycentricCoordinates,
        primitive_index: usize,
        instance_index: usize,
        vertex_data: [&'a [u8]; 3],
        instance_data: &'a [u8],
        constants: &'a [u8],
        helper: &'a BarycentricHelper,
        one_over_w: [Real; 3],
    ) -> Self {
        Self {
            position,
            barycentric,
            primitive_index,
            instance_index,
            vertex_data,
            instance_data,
            constants,
            helper,
            one_over_w,
        }
    }

    /// Perspective-correct clip-space `w` at this pixel
    pub fn w(&self) -> Real {
        1.0 / self.barycentric.interpolate_array(&self.one_over_w)
    }

    pub fn vertex<T: Pod>(&self, corner: usize) -> T {
        read_record(self.vertex_data[corner])
    }

    pub fn instance<T: Pod>(&self) -> T {
        read_record(self.instance_data)
    }

    pub fn constants<T: Pod>(&self) -> T {
        read_record(self.constants)
    }

    /// Interpolate the vertex field of type `T` found at `offset` in each vertex record
    pub fn interpolate<T: Interpolant>(&self, offset: usize) -> T {
        self.interpolate_with(&self.barycentric, offset)
    }

    /// Change of an interpolated field over a one-pixel step to the right
    pub fn derivative_x<T: Interpolant>(&self, offset: usize) -> T {
        let next = self.helper.coordinates(self.position + Point2i::new(1, 0));
        self.interpolate_with::<T>(&next, offset) - self.interpolate::<T>(offset)
    }

    /// Change of an interpolated field over a one-pixel step up
    pub fn derivative_y<T: Interpolant>(&self, offset: usize) -> T {
        let next = self.helper.coordinates(self.position + Point2i::new(0, 1));
        self.interpolate_with::<T>(&next, offset) - self.interpolate::<T>(offset)
    }

    fn interpolate_with<T: Interpolant>(&self, coords: &BarycentricCoordinates, offset: usize) -> T {
        let weights = [
            coords.x * self.one_over_w[0],
            coords.y * self.one_over_w[1],
            coords.z * self.one_over_w[2],
        ];
        let w = 1.0 / (weights[0] + weights[1] + weights[2]);
        let field = |i: usize| read_field::<T>(self.vertex_data[i], offset) * (weights[i] * w);
        field(0) + field(1) + field(2)
    }
}

/// Returns the vertex position in homogeneous clip space; the rasterizer divides by `w`
/// to get normalized device coordinates (x, y in [-1, 1], z in [0, 1]).
pub type VertexShader = Box<dyn Fn(&PerVertexInfo) -> Vec4 + Send + Sync>;

/// Returns the fragment color in linear space. The depth argument holds the
/// interpolated depth and is only read back when the pipeline lets shaders write depth.
pub type PixelShader = Box<dyn Fn(&PerPixelInfo, &mut Real) -> Color + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthState {
    pub enabled: bool,
    pub comparator: Comparator,
    /// Run the depth test after the pixel shader with the depth it wrote
    pub shader_writes_depth: bool,
}

impl Default for DepthState {
    fn default() -> Self {
        Self { enabled: true, comparator: Comparator::Less, shader_writes_depth: false }
    }
}

impl DepthState {
    pub fn disabled() -> Self {
        Self { enabled: false, ..Default::default() }
    }
}

/// Blend equation: `op(src * src_factor, dst * dst_factor)`, evaluated separately for
/// the color channels and for alpha
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendState {
    pub enabled: bool,
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub color_op: BlendOperator,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOperator,
    pub const_color: Vec3,
    pub const_alpha: Real,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            src_color: BlendFactor::One,
            dst_color: BlendFactor::Zero,
            color_op: BlendOperator::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            alpha_op: BlendOperator::Add,
            const_color: Vec3::ZERO,
            const_alpha: 0.0,
        }
    }
}

impl BlendState {
    /// Classic "over" blending with straight alpha
    pub fn alpha_blending() -> Self {
        Self {
            enabled: true,
            src_color: BlendFactor::SrcAlpha,
            dst_color: BlendFactor::InvSrcAlpha,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::InvSrcAlpha,
            ..Default::default()
        }
    }

    pub fn additive() -> Self {
        Self {
            enabled: true,
            src_color: BlendFactor::One,
            dst_color: BlendFactor::One,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::One,
            ..Default::default()
        }
    }

    fn color_factor(&self, factor: BlendFactor, src: Color, dst: Color) -> Vec3 {
        let splat = |v: Real| Vec3::new(v, v, v);
        match factor {
            BlendFactor::Zero => Vec3::ZERO,
            BlendFactor::One => Vec3::ONE,
            BlendFactor::SrcColor => src.rgb_vec(),
            BlendFactor::DstColor => dst.rgb_vec(),
            BlendFactor::InvSrcColor => Vec3::ONE - src.rgb_vec(),
            BlendFactor::InvDstColor => Vec3::ONE - dst.rgb_vec(),
            BlendFactor::SrcAlpha => splat(src.a),
            BlendFactor::DstAlpha => splat(dst.a),
            BlendFactor::InvSrcAlpha => splat(1.0 - src.a),
            BlendFactor::InvDstAlpha => splat(1.0 - dst.a),
            BlendFactor::ConstColor => self.const_color,
            BlendFactor::InvConstColor => Vec3::ONE - self.const_color,
            BlendFactor::ConstAlpha => splat(self.const_alpha),
            BlendFactor::InvConstAlpha => splat(1.0 - self.const_alpha),
        }
    }

    /// Color factors used in the alpha slot resolve to their alpha counterparts
    fn alpha_factor(&self, factor: BlendFactor, src: Color, dst: Color) -> Real {
        match factor {
            BlendFactor::Zero => 0.0,
            BlendFactor::One => 1.0,
            BlendFactor::SrcColor | BlendFactor::SrcAlpha => src.a,
            BlendFactor::DstColor | BlendFactor::DstAlpha => dst.a,
            BlendFactor::InvSrcColor | BlendFactor::InvSrcAlpha => 1.0 - src.a,
            BlendFactor::InvDstColor | BlendFactor::InvDstAlpha => 1.0 - dst.a,
            BlendFactor::ConstColor | BlendFactor::ConstAlpha => self.const_alpha,
            BlendFactor::InvConstColor | BlendFactor::InvConstAlpha => 1.0 - self.const_alpha,
        }
    }

    /// Combine a fragment color with the stored one. Weighted terms and the result are
    /// clamped to [0, 1].
    pub fn blend(&self, src: Color, dst: Color) -> Color {
        let src_rgb = src.rgb_vec().mul_elements(self.color_factor(self.src_color, src, dst)).clamp(0.0, 1.0);
        let dst_rgb = dst.rgb_vec().mul_elements(self.color_factor(self.dst_color, src, dst)).clamp(0.0, 1.0);
        let rgb = Vec3::new(
            self.color_op.apply(src_rgb.x, dst_rgb.x),
            self.color_op.apply(src_rgb.y, dst_rgb.y),
            self.color_op.apply(src_rgb.z, dst_rgb.z),
        )
        .clamp(0.0, 1.0);

        let src_a = (src.a * self.alpha_factor(self.src_alpha, src, dst)).clamp(0.0, 1.0);
        let dst_a = (dst.a * self.alpha_factor(self.dst_alpha, src, dst)).clamp(0.0, 1.0);
        let a = self.alpha_op.apply(src_a, dst_a).clamp(0.0, 1.0);

        Color::from_vec3(rgb, a)
    }
}

/// Fixed-function part of a pipeline; serializable so it can come from a config file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineState {
    /// Winding of front faces in raster space
    pub winding_order: WindingOrder,
    pub cull_back_faces: bool,
    pub depth: DepthState,
    pub blend: BlendState,
    pub depth_interpolation: DepthInterpolation,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            winding_order: WindingOrder::CounterClockwise,
            cull_back_faces: true,
            depth: DepthState::default(),
            blend: BlendState::default(),
            depth_interpolation: DepthInterpolation::Linear,
        }
    }
}

/// Reads a [`Vec3`] position from the start of each vertex record and passes it through
/// as NDC with `w = 1`. Records too short to hold one produce `w = 0`, which the
/// rasterizer rejects.
fn default_vertex_shader(info: &PerVertexInfo) -> Vec4 {
    if info.vertex_data.len() < size_of::<Vec3>() {
        return Vec4::ZERO;
    }
    Vec4::from_point(read_field::<Vec3>(info.vertex_data, 0))
}

fn default_pixel_shader(_info: &PerPixelInfo, _depth: &mut Real) -> Color {
    Color::WHITE
}

/// Everything a draw needs besides geometry and targets.
///
/// The color and depth images are not part of the pipeline: they travel as a
/// [`FrameBuffer`](super::render::FrameBuffer) passed to
/// [`Rasterizer::draw`](super::render::Rasterizer::draw).
pub struct Pipeline {
    pub state: PipelineState,
    vertex_shader: VertexShader,
    pixel_shader: PixelShader,
}

impl Pipeline {
    /// A pipeline with pass-through shaders that draws white
    pub fn new(state: PipelineState) -> Self {
        Self {
            state,
            vertex_shader: Box::new(default_vertex_shader),
            pixel_shader: Box::new(default_pixel_shader),
        }
    }

    pub fn with_vertex_shader<F>(mut self, shader: F) -> Self
    where
        F: Fn(&PerVertexInfo) -> Vec4 + Send + Sync + 'static,
    {
        self.vertex_shader = Box::new(shader);
        self
    }

    pub fn with_pixel_shader<F>(mut self, shader: F) -> Self
    where
        F: Fn(&PerPixelInfo, &mut Real) -> Color + Send + Sync + 'static,
    {
        self.pixel_shader = Box::new(shader);
        self
    }

    pub fn run_vertex_shader(&self, info: &PerVertexInfo) -> Vec4 {
        (self.vertex_shader)(info)
    }

    pub fn run_pixel_shader(&self, info: &PerPixelInfo, depth: &mut Real) -> Color {
        (self.pixel_shader)(info, depth)
    }

    /// `src` is the fragment depth, `dst` the stored one. Depths outside [0, 1] always fail.
    pub fn depth_test(&self, src: Real, dst: Real) -> bool {
        if !(0.0..=1.0).contains(&src) {
            return false;
        }
        self.state.depth.comparator.compare(src, dst)
    }

    pub fn blend(&self, src: Color, dst: Color) -> Color {
        self.state.blend.blend(src, dst)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineState::default())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("state", &self.state).finish_non_exhaustive()
    }
}
