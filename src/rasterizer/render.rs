//! Triangle rasterization
//!
//! Per draw: instances × triangles → vertex shader ×3 → perspective divide and
//! viewport transform → rejection (w, depth range, degenerate, back face, off-screen)
//! → bounding-box walk with the barycentric coverage test → depth test → pixel
//! shader → blending → write.

use tracing::{trace, warn};

use super::barycentric::BarycentricHelper;
use super::color::Color;
use super::image::{Image, ImageOptions};
use super::math::{Bounds2i, Point2i, Real, Vec3, Vec4};
use super::model::Model;
use super::pipeline::{PerPixelInfo, PerVertexInfo, Pipeline};
use super::types::{DepthInterpolation, PixelLayout, WindingOrder};

/// Color target with an optional depth buffer
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub color: Image,
    pub depth: Option<Image>,
}

impl FrameBuffer {
    /// RGBA8 linear color plus a float depth buffer cleared to the far plane
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_color_options(ImageOptions::new(width, height, PixelLayout::Rgba8))
    }

    pub fn with_color_options(options: ImageOptions) -> Self {
        let depth = Image::with_size(options.width, options.height, PixelLayout::Depth);
        Self { color: Image::new(options), depth: Some(depth) }
    }

    pub fn without_depth(color: Image) -> Self {
        Self { color, depth: None }
    }

    pub fn width(&self) -> u32 {
        self.color.width()
    }

    pub fn height(&self) -> u32 {
        self.color.height()
    }

    pub fn is_valid(&self) -> bool {
        let depth_ok = self.depth.as_ref().map_or(true, |d| {
            d.is_valid() && d.width() == self.color.width() && d.height() == self.color.height()
        });
        self.color.is_valid() && depth_ok
    }

    pub fn clear(&mut self, color: Color, depth: Real) {
        self.color.clear_color(color);
        if let Some(d) = self.depth.as_mut() {
            d.clear_depth(depth);
        }
    }
}

/// Counters collected over one draw call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    /// Triangles submitted (instances × index triples)
    pub triangles: usize,
    /// Back faces skipped by culling
    pub culled: usize,
    /// Behind the camera, outside the depth range or off the target
    pub outside: usize,
    /// Zero area in raster space
    pub degenerate: usize,
    /// Pixels that passed the coverage test
    pub fragments_tested: usize,
    pub fragments_shaded: usize,
    pub fragments_depth_rejected: usize,
}

impl DrawStats {
    pub fn triangles_rasterized(&self) -> usize {
        self.triangles - self.culled - self.outside - self.degenerate
    }
}

/// One triangle after the vertex stage, in raster space
struct Triangle {
    raster: [Vec3; 3],
    one_over_w: [Real; 3],
}

/// Drives draws. Holds no state between them; one instance can serve any target.
#[derive(Debug, Default)]
pub struct Rasterizer;

impl Rasterizer {
    pub fn new() -> Self {
        Self
    }

    /// NDC (x, y in [-1, 1]) to continuous raster space (origin bottom-left, y up, in pixels).
    /// Depth passes through.
    pub fn ndc_to_raster(ndc: Vec3, width: u32, height: u32) -> Vec3 {
        Vec3::new((1.0 + ndc.x) * 0.5 * width as Real, (1.0 + ndc.y) * 0.5 * height as Real, ndc.z)
    }

    pub fn raster_to_ndc(raster: Vec3, width: u32, height: u32) -> Vec3 {
        Vec3::new(raster.x / width as Real * 2.0 - 1.0, raster.y / height as Real * 2.0 - 1.0, raster.z)
    }

    /// Pixels whose centers may fall inside the triangle, clipped to `target`
    fn triangle_bounds(raster: &[Vec3; 3], target: Bounds2i) -> Bounds2i {
        let lo = raster[0].min(raster[1]).min(raster[2]);
        let hi = raster[0].max(raster[1]).max(raster[2]);
        // Clip in Real first; far off-screen vertices don't fit in i32
        let clip = |v: Real, min: i32, max: i32| v.clamp(min as Real, max as Real) as i32;
        let bounds = Bounds2i::new(
            Point2i::new(clip(lo.x.floor(), target.min.x, target.max.x), clip(lo.y.floor(), target.min.y, target.max.y)),
            Point2i::new(
                clip(hi.x.floor() + 1.0, target.min.x, target.max.x),
                clip(hi.y.floor() + 1.0, target.min.y, target.max.y),
            ),
        );
        bounds.intersect(&target)
    }

    /// Draw `instance_count` instances of every triangle in `model`.
    ///
    /// Panics if an index is out of range or if the model has fewer instance records
    /// than requested.
    pub fn draw(&mut self, target: &mut FrameBuffer, model: &Model, instance_count: usize) -> DrawStats {
        let mut stats = DrawStats::default();

        if !target.is_valid() {
            warn!(width = target.width(), height = target.height(), "skipping draw into an invalid frame buffer");
            return stats;
        }
        if model.is_empty() {
            warn!(vertices = model.vertex_count(), indices = model.indices().len(), "skipping draw of an empty model");
            return stats;
        }
        assert!(model.indices_in_range(), "model index out of range of {} vertices", model.vertex_count());
        assert!(
            model.instance_count() == 0 || instance_count <= model.instance_count(),
            "{} instances requested, model holds {}",
            instance_count,
            model.instance_count()
        );

        let pipeline = model.pipeline().as_ref();
        let target_bounds = target.color.bounds();

        for instance in 0..instance_count {
            for (primitive, tri) in model.indices().chunks_exact(3).enumerate() {
                stats.triangles += 1;
                let corners = [tri[0] as usize, tri[1] as usize, tri[2] as usize];

                let Some(triangle) = Self::run_vertex_stage(target, model, primitive, instance, &corners) else {
                    stats.outside += 1;
                    continue;
                };

                let [p0, p1, p2] = triangle.raster;
                let area = BarycentricHelper::signed_double_area(p0, p1, p2);
                if area.abs() <= Real::EPSILON {
                    stats.degenerate += 1;
                    continue;
                }

                let front_facing = area * pipeline.state.winding_order.sign() > 0.0;
                if pipeline.state.cull_back_faces && !front_facing {
                    stats.culled += 1;
                    continue;
                }

                let bounds = Self::triangle_bounds(&triangle.raster, target_bounds);
                if bounds.is_empty() {
                    stats.outside += 1;
                    continue;
                }

                // Without culling both faces are drawn with weights signed by their own winding
                let winding = if pipeline.state.cull_back_faces {
                    pipeline.state.winding_order
                } else {
                    WindingOrder::from_signed_area(area)
                };
                let helper = BarycentricHelper::new(winding, p0, p1, p2);
                let vertex_data = corners.map(|i| model.vertex_record(i));

                for y in bounds.min.y..bounds.max.y {
                    for x in bounds.min.x..bounds.max.x {
                        let position = Point2i::new(x, y);
                        let coords = helper.coordinates(position);
                        if !helper.is_inside(&coords) {
                            continue;
                        }
                        stats.fragments_tested += 1;

                        let depth = match pipeline.state.depth_interpolation {
                            // Relative to p0 so a constant depth stays exact
                            DepthInterpolation::Linear => p0.z + coords.y * (p1.z - p0.z) + coords.z * (p2.z - p0.z),
                            DepthInterpolation::Reciprocal => 1.0 / coords.interpolate(1.0 / p0.z, 1.0 / p1.z, 1.0 / p2.z),
                        };
                        let info = PerPixelInfo::new(
                            position,
                            coords,
                            primitive,
                            instance,
                            vertex_data,
                            model.instance_record(instance),
                            model.constants(),
                            &helper,
                            triangle.one_over_w,
                        );
                        Self::process_fragment(target, pipeline, &info, depth, &mut stats);
                    }
                }
            }
        }

        trace!(
            triangles = stats.triangles,
            rasterized = stats.triangles_rasterized(),
            culled = stats.culled,
            shaded = stats.fragments_shaded,
            "draw finished"
        );
        stats
    }

    /// Run the vertex shader on the three corners and project them. Returns `None` when
    /// the triangle cannot be drawn: a corner is behind the eye (`w <= 0`) or the whole
    /// triangle lies before the near or beyond the far plane.
    fn run_vertex_stage(
        target: &FrameBuffer,
        model: &Model,
        primitive: usize,
        instance: usize,
        corners: &[usize; 3],
    ) -> Option<Triangle> {
        let pipeline = model.pipeline();
        let clip: [Vec4; 3] = corners.map(|vertex_index| {
            pipeline.run_vertex_shader(&PerVertexInfo {
                primitive_index: primitive,
                vertex_index,
                instance_index: instance,
                vertex_data: model.vertex_record(vertex_index),
                instance_data: model.instance_record(instance),
                constants: model.constants(),
            })
        });

        if clip.iter().any(|c| c.w <= 0.0 || !c.w.is_finite()) {
            return None;
        }

        let raster = clip.map(|c| Self::ndc_to_raster(c.to_euclidean(), target.width(), target.height()));
        if raster.iter().all(|p| p.z < 0.0) || raster.iter().all(|p| p.z > 1.0) {
            return None;
        }

        Some(Triangle { raster, one_over_w: clip.map(|c| 1.0 / c.w) })
    }

    /// Depth test, shading, blending and the final write for one covered pixel
    fn process_fragment(target: &mut FrameBuffer, pipeline: &Pipeline, info: &PerPixelInfo, depth: Real, stats: &mut DrawStats) {
        let state = &pipeline.state;
        let depth_enabled = state.depth.enabled && target.depth.is_some();
        let late_depth = state.depth.shader_writes_depth;

        if depth_enabled && !late_depth && !Self::run_depth_test(target, pipeline, info.position, depth) {
            stats.fragments_depth_rejected += 1;
            return;
        }

        let mut shaded_depth = depth;
        let color = pipeline.run_pixel_shader(info, &mut shaded_depth);
        stats.fragments_shaded += 1;

        if depth_enabled && late_depth && !Self::run_depth_test(target, pipeline, info.position, shaded_depth) {
            stats.fragments_depth_rejected += 1;
            return;
        }

        let color = Self::apply_alpha_compositing(target, pipeline, info.position, color);
        target.color.set_pixel_color(info.position, color);
    }

    /// Compare against the stored depth and store `depth` if it passes
    fn run_depth_test(target: &mut FrameBuffer, pipeline: &Pipeline, position: Point2i, depth: Real) -> bool {
        let Some(buffer) = target.depth.as_mut() else {
            return true;
        };
        if !pipeline.depth_test(depth, buffer.pixel_depth(position)) {
            return false;
        }
        buffer.set_pixel_depth(position, depth);
        true
    }

    fn apply_alpha_compositing(target: &FrameBuffer, pipeline: &Pipeline, position: Point2i, color: Color) -> Color {
        if !pipeline.state.blend.enabled {
            return color;
        }
        pipeline.blend(color, target.color.pixel_color(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::math::Mat4;
    use crate::rasterizer::pipeline::{BlendState, DepthState, PipelineState};
    use crate::rasterizer::types::Comparator;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const SIZE: u32 = 32;

    /// Raster position (in pixels on a 32x32 target) to NDC; exact in binary floating point
    fn ndc(x: Real, y: Real, z: Real) -> Vec3 {
        Vec3::new(x / 16.0 - 1.0, y / 16.0 - 1.0, z)
    }

    fn black_target(with_depth: bool) -> FrameBuffer {
        let mut color = Image::with_size(SIZE, SIZE, PixelLayout::Rgba8);
        color.clear_color(Color::BLACK);
        if with_depth {
            let mut fb = FrameBuffer { color, depth: Some(Image::with_size(SIZE, SIZE, PixelLayout::Depth)) };
            fb.clear(Color::BLACK, 1.0);
            fb
        } else {
            FrameBuffer::without_depth(color)
        }
    }

    fn solid(state: PipelineState, color: Color) -> Arc<Pipeline> {
        Arc::new(Pipeline::new(state).with_pixel_shader(move |_, _| color))
    }

    fn no_depth() -> PipelineState {
        PipelineState { depth: DepthState::disabled(), ..Default::default() }
    }

    fn model(pipeline: Arc<Pipeline>, vertices: &[Vec3], indices: &[u32]) -> Model {
        let mut m = Model::new(pipeline);
        m.set_vertex_data(vertices);
        m.set_indices(indices);
        m
    }

    fn px(fb: &FrameBuffer, x: i32, y: i32) -> Color {
        fb.color.pixel_color(Point2i::new(x, y))
    }

    #[test]
    fn test_ndc_raster_roundtrip() {
        let r = Rasterizer::ndc_to_raster(Vec3::new(-1.0, 1.0, 0.5), 320, 240);
        assert_eq!(r, Vec3::new(0.0, 240.0, 0.5));
        let back = Rasterizer::raster_to_ndc(Vec3::new(160.0, 60.0, 0.25), 320, 240);
        assert_eq!(back, Vec3::new(0.0, -0.5, 0.25));
    }

    #[test]
    fn test_single_triangle_end_to_end() {
        let mut fb = black_target(false);
        let m = model(
            solid(no_depth(), Color::WHITE),
            &[ndc(10.0, 10.0, 0.5), ndc(20.0, 10.0, 0.5), ndc(10.0, 20.0, 0.5)],
            &[0, 1, 2],
        );
        let stats = Rasterizer::new().draw(&mut fb, &m, 1);

        assert_eq!(px(&fb, 12, 12), Color::WHITE);
        assert_eq!(px(&fb, 1, 1), Color::BLACK);
        assert_eq!(px(&fb, 30, 30), Color::BLACK);
        assert_eq!(stats.triangles, 1);
        assert_eq!(stats.triangles_rasterized(), 1);
        // 55 centers lie inside or on the edges; the 10 on the hypotenuse belong to the
        // neighbouring triangle of a quad
        assert_eq!(stats.fragments_shaded, 45);
    }

    #[test]
    fn test_quad_diagonal_is_drawn_once() {
        let mut fb = black_target(false);
        let additive = PipelineState { blend: BlendState::additive(), ..no_depth() };
        let a = model(
            solid(additive, Color::RED),
            &[ndc(10.0, 10.0, 0.5), ndc(20.0, 10.0, 0.5), ndc(10.0, 20.0, 0.5)],
            &[0, 1, 2],
        );
        let b = model(
            solid(additive, Color::BLUE),
            &[ndc(20.0, 10.0, 0.5), ndc(20.0, 20.0, 0.5), ndc(10.0, 20.0, 0.5)],
            &[0, 1, 2],
        );
        let mut rasterizer = Rasterizer::new();
        rasterizer.draw(&mut fb, &a, 1);
        rasterizer.draw(&mut fb, &b, 1);

        for y in 10..20 {
            for x in 10..20 {
                let c = px(&fb, x, y);
                assert!(c == Color::RED || c == Color::BLUE, "pixel ({}, {}) is {:?}", x, y, c);
            }
        }
        // Pixel centers exactly on the hypotenuse x + y = 30
        for x in 10..19 {
            let c = px(&fb, x, 29 - x);
            assert!(c == Color::RED || c == Color::BLUE, "hypotenuse pixel ({}, {}) is {:?}", x, 29 - x, c);
        }
    }

    #[test]
    fn test_back_faces_are_culled() {
        let mut fb = black_target(false);
        // Clockwise in raster space
        let vertices = [ndc(10.0, 10.0, 0.5), ndc(10.0, 20.0, 0.5), ndc(20.0, 10.0, 0.5)];
        let culled = model(solid(no_depth(), Color::WHITE), &vertices, &[0, 1, 2]);
        let stats = Rasterizer::new().draw(&mut fb, &culled, 1);
        assert_eq!(stats.culled, 1);
        assert_eq!(px(&fb, 12, 12), Color::BLACK);

        let two_sided = PipelineState { cull_back_faces: false, ..no_depth() };
        let drawn = model(solid(two_sided, Color::WHITE), &vertices, &[0, 1, 2]);
        Rasterizer::new().draw(&mut fb, &drawn, 1);
        assert_eq!(px(&fb, 12, 12), Color::WHITE);
    }

    #[test]
    fn test_clockwise_front_faces() {
        let mut fb = black_target(false);
        let state = PipelineState { winding_order: WindingOrder::Clockwise, ..no_depth() };
        let m = model(
            solid(state, Color::GREEN),
            &[ndc(10.0, 10.0, 0.5), ndc(10.0, 20.0, 0.5), ndc(20.0, 10.0, 0.5)],
            &[0, 1, 2],
        );
        let stats = Rasterizer::new().draw(&mut fb, &m, 1);
        assert_eq!(stats.culled, 0);
        assert_eq!(px(&fb, 12, 12), Color::GREEN);
    }

    #[test]
    fn test_rejected_triangles_are_counted() {
        let mut fb = black_target(false);
        let vertices = [
            // Degenerate: three collinear points
            ndc(1.0, 1.0, 0.5),
            ndc(5.0, 5.0, 0.5),
            ndc(9.0, 9.0, 0.5),
            // Entirely off the target
            ndc(40.0, 40.0, 0.5),
            ndc(50.0, 40.0, 0.5),
            ndc(40.0, 50.0, 0.5),
            // Entirely beyond the far plane
            ndc(10.0, 10.0, 1.5),
            ndc(20.0, 10.0, 1.5),
            ndc(10.0, 20.0, 1.5),
        ];
        let m = model(solid(no_depth(), Color::WHITE), &vertices, &[0, 1, 2, 3, 4, 5, 6, 7, 8]);
        let stats = Rasterizer::new().draw(&mut fb, &m, 1);
        assert_eq!(stats.triangles, 3);
        assert_eq!(stats.degenerate, 1);
        assert_eq!(stats.outside, 2);
        assert_eq!(stats.fragments_tested, 0);
    }

    #[test]
    fn test_far_off_screen_vertices_still_cover_target() {
        // Vertices project billions of pixels away, past what i32 can hold
        let far: Real = 1.0e9;
        let triangles = [
            [Vec3::new(-1.0, -1.0, 0.5), Vec3::new(far, -1.0, 0.5), Vec3::new(-1.0, far, 0.5)],
            [Vec3::new(1.0, 1.0, 0.5), Vec3::new(-far, 1.0, 0.5), Vec3::new(1.0, -far, 0.5)],
        ];
        for vertices in triangles {
            let mut fb = black_target(false);
            let m = model(solid(no_depth(), Color::WHITE), &vertices, &[0, 1, 2]);
            let stats = Rasterizer::new().draw(&mut fb, &m, 1);
            assert_eq!(stats.outside, 0);
            assert_eq!(stats.triangles_rasterized(), 1);
            assert_eq!(px(&fb, 4, 4), Color::WHITE);
            assert_eq!(px(&fb, 28, 28), Color::WHITE);
        }
    }

    #[test]
    fn test_depth_interpolation_modes() {
        // Raster corners (0, 0, 0.2), (32, 0, 0.8), (0, 32, 0.8); the center of pixel
        // (15, 0) has weights (0.5, 15.5 / 32, 0.5 / 32)
        let vertices = [ndc(0.0, 0.0, 0.2), ndc(32.0, 0.0, 0.8), ndc(0.0, 32.0, 0.8)];
        let stored_depth = |interpolation: DepthInterpolation| {
            let mut fb = black_target(true);
            let state = PipelineState {
                depth: DepthState { comparator: Comparator::Always, ..Default::default() },
                depth_interpolation: interpolation,
                ..Default::default()
            };
            let m = model(solid(state, Color::WHITE), &vertices, &[0, 1, 2]);
            Rasterizer::new().draw(&mut fb, &m, 1);
            fb.depth.as_ref().map(|d| d.pixel_depth(Point2i::new(15, 0)))
        };

        let linear = stored_depth(DepthInterpolation::Linear).unwrap();
        assert!((linear - 0.5).abs() < 1e-5, "linear depth {}", linear);

        // 1 / (0.5 / 0.2 + 0.5 / 0.8)
        let reciprocal = stored_depth(DepthInterpolation::Reciprocal).unwrap();
        assert!((reciprocal - 0.32).abs() < 1e-5, "reciprocal depth {}", reciprocal);
    }

    #[test]
    fn test_vertex_behind_eye_rejects_triangle() {
        let mut fb = black_target(false);
        let pipeline = Pipeline::new(no_depth()).with_vertex_shader(|info| {
            let p = info.vertex::<Vec3>();
            // Third corner gets a negative w
            let w = if info.vertex_index == 2 { -1.0 } else { 1.0 };
            Vec4::new(p.x * w, p.y * w, p.z * w, w)
        });
        let m = model(
            Arc::new(pipeline),
            &[ndc(10.0, 10.0, 0.5), ndc(20.0, 10.0, 0.5), ndc(10.0, 20.0, 0.5)],
            &[0, 1, 2],
        );
        let stats = Rasterizer::new().draw(&mut fb, &m, 1);
        assert_eq!(stats.outside, 1);
        assert_eq!(px(&fb, 12, 12), Color::BLACK);
    }

    #[test]
    fn test_depth_test_less_against_seeded_buffer() {
        let near_far = [(0.3, true), (0.7, false)];
        for (z, passes) in near_far {
            let mut fb = black_target(true);
            if let Some(d) = fb.depth.as_mut() {
                d.clear_depth(0.5);
            }
            let m = model(
                solid(PipelineState::default(), Color::WHITE),
                &[ndc(0.0, 0.0, z), ndc(32.0, 0.0, z), ndc(0.0, 32.0, z)],
                &[0, 1, 2],
            );
            let stats = Rasterizer::new().draw(&mut fb, &m, 1);
            let stored = fb.depth.as_ref().map(|d| d.pixel_depth(Point2i::new(4, 4)));

            if passes {
                assert_eq!(px(&fb, 4, 4), Color::WHITE);
                assert!((stored.unwrap() - 0.3).abs() < 1e-6);
                assert_eq!(stats.fragments_depth_rejected, 0);
            } else {
                assert_eq!(px(&fb, 4, 4), Color::BLACK);
                assert_eq!(stored, Some(0.5));
                assert_eq!(stats.fragments_shaded, 0);
                assert!(stats.fragments_depth_rejected > 0);
            }
        }
    }

    #[test]
    fn test_all_comparators_against_seeded_buffer() {
        for comparator in Comparator::ALL {
            for z in [0.3, 0.5, 0.7] {
                let mut fb = black_target(true);
                if let Some(d) = fb.depth.as_mut() {
                    d.clear_depth(0.5);
                }
                let state = PipelineState { depth: DepthState { comparator, ..Default::default() }, ..Default::default() };
                let m = model(
                    solid(state, Color::WHITE),
                    &[ndc(0.0, 0.0, z), ndc(32.0, 0.0, z), ndc(0.0, 32.0, z)],
                    &[0, 1, 2],
                );
                Rasterizer::new().draw(&mut fb, &m, 1);

                let expected = comparator.compare(z, 0.5);
                let written = px(&fb, 4, 4) == Color::WHITE;
                assert_eq!(written, expected, "{:?} with depth {}", comparator, z);
                let stored = fb.depth.as_ref().map_or(0.0, |d| d.pixel_depth(Point2i::new(4, 4)));
                assert_eq!(stored, if expected { z } else { 0.5 }, "{:?} with depth {}", comparator, z);
            }
        }
    }

    #[test]
    fn test_nearer_triangle_wins_regardless_of_order() {
        let mut fb = black_target(true);
        let far = model(
            solid(PipelineState::default(), Color::RED),
            &[ndc(0.0, 0.0, 0.8), ndc(32.0, 0.0, 0.8), ndc(0.0, 32.0, 0.8)],
            &[0, 1, 2],
        );
        let near = model(
            solid(PipelineState::default(), Color::BLUE),
            &[ndc(0.0, 0.0, 0.2), ndc(32.0, 0.0, 0.2), ndc(0.0, 32.0, 0.2)],
            &[0, 1, 2],
        );
        let mut rasterizer = Rasterizer::new();
        rasterizer.draw(&mut fb, &near, 1);
        rasterizer.draw(&mut fb, &far, 1);
        assert_eq!(px(&fb, 5, 5), Color::BLUE);
    }

    #[test]
    fn test_early_depth_test_skips_shader() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let pipeline = Pipeline::new(PipelineState::default()).with_pixel_shader(move |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
            Color::WHITE
        });
        let mut fb = black_target(true);
        if let Some(d) = fb.depth.as_mut() {
            d.clear_depth(0.1);
        }
        let m = model(Arc::new(pipeline), &[ndc(0.0, 0.0, 0.5), ndc(32.0, 0.0, 0.5), ndc(0.0, 32.0, 0.5)], &[0, 1, 2]);
        let stats = Rasterizer::new().draw(&mut fb, &m, 1);
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert_eq!(stats.fragments_depth_rejected, stats.fragments_tested);
    }

    #[test]
    fn test_shader_written_depth_is_tested_late() {
        let state = PipelineState {
            depth: DepthState { shader_writes_depth: true, ..Default::default() },
            ..Default::default()
        };
        // Geometry sits at 0.9 but the shader pulls it in front of the stored 0.5
        let pipeline = Pipeline::new(state).with_pixel_shader(|_, depth| {
            *depth = 0.25;
            Color::WHITE
        });
        let mut fb = black_target(true);
        if let Some(d) = fb.depth.as_mut() {
            d.clear_depth(0.5);
        }
        let m = model(Arc::new(pipeline), &[ndc(0.0, 0.0, 0.9), ndc(32.0, 0.0, 0.9), ndc(0.0, 32.0, 0.9)], &[0, 1, 2]);
        Rasterizer::new().draw(&mut fb, &m, 1);
        assert_eq!(px(&fb, 4, 4), Color::WHITE);
        assert_eq!(fb.depth.as_ref().map(|d| d.pixel_depth(Point2i::new(4, 4))), Some(0.25));
    }

    #[test]
    fn test_instancing_offsets() {
        // Instance records are translations in NDC
        let pipeline = Pipeline::new(no_depth())
            .with_vertex_shader(|info| {
                let offset = info.instance::<Vec3>();
                Vec4::from_point(info.vertex::<Vec3>() + offset)
            })
            .with_pixel_shader(|info, _| {
                [Color::RED, Color::GREEN, Color::BLUE][info.instance_index]
            });

        let mut m = model(
            Arc::new(pipeline),
            &[ndc(0.0, 0.0, 0.5), ndc(8.0, 0.0, 0.5), ndc(8.0, 8.0, 0.5), ndc(0.0, 8.0, 0.5)],
            &[0, 1, 2, 0, 2, 3],
        );
        // 8 pixels = 0.5 in NDC on a 32 pixel target
        m.set_instance_data(&[Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.75, 0.0, 0.0), Vec3::new(0.0, 0.75, 0.0)]);

        let mut fb = black_target(false);
        let stats = Rasterizer::new().draw(&mut fb, &m, m.instance_count());
        assert_eq!(stats.triangles, 6);
        assert_eq!(stats.fragments_shaded, 3 * 64);

        assert_eq!(px(&fb, 4, 4), Color::RED);
        assert_eq!(px(&fb, 16, 4), Color::GREEN);
        assert_eq!(px(&fb, 4, 16), Color::BLUE);
        assert_eq!(px(&fb, 16, 16), Color::BLACK);

        let mut touched = 0;
        for y in 0..SIZE as i32 {
            for x in 0..SIZE as i32 {
                if px(&fb, x, y) != Color::BLACK {
                    touched += 1;
                }
            }
        }
        assert_eq!(touched, 3 * 64);
    }

    #[test]
    fn test_perspective_correct_varyings_reach_shader() {
        #[repr(C)]
        #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
        struct Vertex {
            position: Vec3,
            shade: Real,
        }

        // Camera at the origin looking down -Z at a floor-like quad that recedes
        let projection = Mat4::perspective(std::f64::consts::FRAC_PI_2 as Real, 1.0, 0.1, 100.0);
        let pipeline = Pipeline::new(PipelineState { cull_back_faces: false, ..Default::default() })
            .with_vertex_shader(move |info| projection.mul_vec4(Vec4::from_point(info.vertex::<Vertex>().position)))
            .with_pixel_shader(|info, _| {
                let s: Real = info.interpolate(std::mem::offset_of!(Vertex, shade));
                Color::rgb(s, s, s)
            });
        let vertices = [
            Vertex { position: Vec3::new(-1.0, -1.0, -1.0), shade: 0.0 },
            Vertex { position: Vec3::new(1.0, -1.0, -1.0), shade: 0.0 },
            Vertex { position: Vec3::new(1.0, -1.0, -9.0), shade: 1.0 },
            Vertex { position: Vec3::new(-1.0, -1.0, -9.0), shade: 1.0 },
        ];
        let mut m = Model::new(Arc::new(pipeline));
        m.set_vertex_data(&vertices);
        m.set_indices(&[0, 1, 2, 0, 2, 3]);

        let mut fb = black_target(true);
        Rasterizer::new().draw(&mut fb, &m, 1);

        // Halfway up the screen between the near and far edges is still close to the near
        // edge in world space; affine interpolation would give 0.5 there
        let project = |p: Vec3| Rasterizer::ndc_to_raster(projection.mul_vec4(Vec4::from_point(p)).to_euclidean(), SIZE, SIZE);
        let near_row = project(Vec3::new(0.0, -1.0, -1.0)).y;
        let far_row = project(Vec3::new(0.0, -1.0, -9.0)).y;
        let mid = ((near_row + far_row) * 0.5) as i32;

        // The floor is at y = -1, so a pixel row at NDC y sees world depth -1 / y
        let ndc_y = (mid as Real + 0.5) / 16.0 - 1.0;
        let expected = (-1.0 / ndc_y - 1.0) / 8.0;
        let c = px(&fb, 16, mid);
        assert!(expected < 0.2);
        assert!((c.r - expected).abs() < 0.02, "shade {} expected {}", c.r, expected);
    }
}
