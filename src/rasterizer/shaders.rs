//! Ready-made shaders and lighting helpers
//!
//! Vertex layouts belong to the caller, so the builders take byte offsets of the
//! fields they read (`std::mem::offset_of!`).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::color::Color;
use super::image::Image;
use super::math::{Mat4, Real, Vec2, Vec3, Vec4};
use super::pipeline::{read_field, PerPixelInfo, PerVertexInfo};
use super::sampler::Sampler2D;

/// Ambient term of [`PhongMaterial::default`]
pub const DEFAULT_AMBIENT: Real = 0.01;

/// Vertex shader: `constants * instance * position`, where the constants record is the
/// view-projection [`Mat4`] and each instance record (if any) is a model [`Mat4`]
pub fn transform(position_offset: usize) -> impl Fn(&PerVertexInfo) -> Vec4 + Send + Sync + 'static {
    move |info| {
        let position = Vec4::from_point(read_field::<Vec3>(info.vertex_data, position_offset));
        let view_projection = info.constants::<Mat4>();
        let world = if info.instance_data.is_empty() {
            position
        } else {
            info.instance::<Mat4>().mul_vec4(position)
        };
        view_projection.mul_vec4(world)
    }
}

pub fn solid_color(color: Color) -> impl Fn(&PerPixelInfo, &mut Real) -> Color + Send + Sync + 'static {
    move |_, _| color
}

/// Interpolated per-vertex [`Color`]
pub fn vertex_color(color_offset: usize) -> impl Fn(&PerPixelInfo, &mut Real) -> Color + Send + Sync + 'static {
    move |info, _| info.interpolate::<Color>(color_offset)
}

/// Samples `texture` at the interpolated UV, with screen-space derivatives for mip selection
pub fn textured(texture: Arc<Image>, uv_offset: usize) -> impl Fn(&PerPixelInfo, &mut Real) -> Color + Send + Sync + 'static {
    move |info, _| {
        let uv: Vec2 = info.interpolate(uv_offset);
        let duvdx: Vec2 = info.derivative_x(uv_offset);
        let duvdy: Vec2 = info.derivative_y(uv_offset);
        Sampler2D::new(&texture).sample(uv, duvdx, duvdy)
    }
}

/// Diffuse lighting with an ambient floor, in [0, 1]
pub fn shade_intensity(normal: Vec3, light_dir: Vec3, ambient: Real) -> Real {
    let diffuse = normal.dot(light_dir).max(0.0);
    (ambient + (1.0 - ambient) * diffuse).clamp(0.0, 1.0)
}

/// Interpolated normal lit by one directional light; `light_dir` points toward the light
pub fn lambert(
    normal_offset: usize,
    light_dir: Vec3,
    ambient: Real,
    color: Color,
) -> impl Fn(&PerPixelInfo, &mut Real) -> Color + Send + Sync + 'static {
    let light_dir = light_dir.normalize();
    move |info, _| {
        let normal = info.interpolate::<Vec3>(normal_offset).normalize();
        let shade = shade_intensity(normal, light_dir, ambient);
        Color::from_vec3(color.rgb_vec() * shade, color.a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Light {
    Point { position: Vec3, color: Vec3 },
    /// `direction` is the way the light travels
    Directional { direction: Vec3, color: Vec3 },
}

impl Light {
    /// Unit vector from `point` toward the light, and the light's color
    fn incidence(&self, point: Vec3) -> (Vec3, Vec3) {
        match *self {
            Light::Point { position, color } => ((position - point).normalize(), color),
            Light::Directional { direction, color } => ((-direction).normalize(), color),
        }
    }
}

/// Phong reflection: ambient + Σ light × (diffuse × N·L + specular × (R·V)^shininess)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhongMaterial {
    pub ambient: Real,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: Real,
    pub lights: Vec<Light>,
}

impl Default for PhongMaterial {
    fn default() -> Self {
        Self {
            ambient: DEFAULT_AMBIENT,
            diffuse: Vec3::ONE,
            specular: Vec3::new(0.5, 0.5, 0.5),
            shininess: 32.0,
            lights: Vec::new(),
        }
    }
}

impl PhongMaterial {
    /// Linear-space radiance at `position` seen from `eye`. `albedo` scales the ambient
    /// and diffuse terms (a texture sample, or white).
    pub fn shade(&self, position: Vec3, normal: Vec3, eye: Vec3, albedo: Vec3) -> Vec3 {
        let normal = normal.normalize();
        let view = (eye - position).normalize();
        let base = albedo.mul_elements(self.diffuse);

        let mut result = base * self.ambient;
        for light in &self.lights {
            let (to_light, color) = light.incidence(position);
            let n_dot_l = normal.dot(to_light);
            if n_dot_l <= 0.0 {
                continue;
            }
            let reflected = to_light.reflect(normal);
            let specular = reflected.dot(view).max(0.0).powf(self.shininess);
            result += color.mul_elements(base * n_dot_l + self.specular * specular);
        }
        result
    }
}
