//! rasterkit viewer: renders a lit, textured, instanced cube with the CPU rasterizer
//! and presents the frame buffer through macroquad.
//!
//! Usage: `rasterkit-viewer [config.ron]`

use std::mem::offset_of;
use std::sync::Arc;

use macroquad::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rasterkit::rasterizer::{self as rk, mesh, shaders};
use rasterkit::RenderConfig;

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const TEXTURE_SIZE: u32 = 64;
const EYE: rk::Vec3 = rk::Vec3::new(0.0, 0.0, 6.0);

fn window_conf() -> Conf {
    Conf {
        window_title: format!("rasterkit v{}", VERSION),
        window_width: rk::WIDTH as i32 * 3,
        window_height: rk::HEIGHT as i32 * 3,
        window_resizable: true,
        high_dpi: true,
        ..Default::default()
    }
}

fn load_config() -> RenderConfig {
    let Some(path) = std::env::args().nth(1) else {
        return RenderConfig::default();
    };
    match RenderConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!(%path, error = %e, "failed to load config, using defaults");
            RenderConfig::default()
        }
    }
}

fn build_pipeline(config: &RenderConfig, texture: Arc<rk::Image>) -> rk::Pipeline {
    let material = shaders::PhongMaterial {
        lights: vec![
            shaders::Light::Directional { direction: rk::Vec3::new(-0.4, -0.8, -0.6), color: rk::Vec3::new(0.9, 0.85, 0.8) },
            shaders::Light::Point { position: rk::Vec3::new(3.0, 2.0, 4.0), color: rk::Vec3::new(0.3, 0.3, 0.5) },
        ],
        ..Default::default()
    };
    let position_offset = offset_of!(mesh::MeshVertex, position);
    let normal_offset = offset_of!(mesh::MeshVertex, normal);
    let uv_offset = offset_of!(mesh::MeshVertex, uv);
    let color_offset = offset_of!(mesh::MeshVertex, color);

    rk::Pipeline::new(config.pipeline)
        .with_vertex_shader(shaders::transform(position_offset))
        .with_pixel_shader(move |info, _depth| {
            let world = info.instance::<rk::Mat4>();
            let position = world.transform_point(info.interpolate::<rk::Vec3>(position_offset));
            let normal = world.transform_vector(info.interpolate::<rk::Vec3>(normal_offset));

            let uv: rk::Vec2 = info.interpolate(uv_offset);
            let texel = rk::Sampler2D::new(&texture).sample(uv, info.derivative_x(uv_offset), info.derivative_y(uv_offset));
            let tint = info.interpolate::<rk::Color>(color_offset);

            let albedo = texel.rgb_vec().mul_elements(tint.rgb_vec());
            rk::Color::from_vec3(material.shade(position, normal, EYE, albedo), texel.a)
        })
}

/// One model matrix per instance, laid out on a row and spun over time
fn instance_transforms(count: usize, time: rk::Real) -> Vec<rk::Mat4> {
    let spacing = 2.5;
    let start = -(count.saturating_sub(1) as rk::Real) * spacing * 0.5;
    (0..count)
        .map(|i| {
            let phase = time + i as rk::Real * 0.6;
            rk::Mat4::translation(rk::Vec3::new(start + i as rk::Real * spacing, 0.0, 0.0))
                * rk::Mat4::rotation_y(phase)
                * rk::Mat4::rotation_x(phase * 0.7)
                * rk::Mat4::scale(rk::Vec3::new(0.8, 0.8, 0.8))
        })
        .collect()
}

#[macroquad::main(window_conf)]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config();

    let texture_options = rk::ImageOptions {
        width: TEXTURE_SIZE,
        height: TEXTURE_SIZE,
        ..config.texture.clone()
    };
    let texture = Arc::new(rk::Image::checkerboard(texture_options, 8, rk::Color::WHITE, rk::Color::rgb(0.2, 0.2, 0.25)));

    let mut fb = rk::FrameBuffer::with_color_options(rk::ImageOptions {
        gamma_space: rk::GammaSpace::GammaCorrected,
        ..rk::ImageOptions::new(config.width, config.height, rk::PixelLayout::Rgba8)
    });
    fb.color.set_gamma_table(Some(Arc::new(rk::GammaTable::default())));
    if !fb.is_valid() {
        warn!(width = config.width, height = config.height, "frame buffer could not be allocated");
        return;
    }

    let (vertices, indices) = mesh::cube();
    let mut model = rk::Model::new(Arc::new(build_pipeline(&config, texture)));
    model.set_vertex_data(&vertices);
    model.set_indices(&indices);

    let aspect = config.width as rk::Real / config.height as rk::Real;
    let view_projection = rk::Mat4::perspective(std::f32::consts::FRAC_PI_3 as rk::Real, aspect, 0.5, 50.0)
        * rk::Mat4::translation(-EYE);
    model.set_constants(&view_projection);

    let mut rasterizer = rk::Rasterizer::new();
    let instance_count = config.instance_count.max(1);
    info!(instance_count, width = config.width, height = config.height, "=== rasterkit viewer ===");

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        model.set_instance_data(&instance_transforms(instance_count, get_time() as rk::Real));
        fb.clear(config.clear_color, config.clear_depth());
        let stats = rasterizer.draw(&mut fb, &model, instance_count);

        clear_background(BLACK);
        match fb.color.to_rgba8_top_down() {
            Ok(pixels) => {
                let texture = Texture2D::from_rgba8(fb.width() as u16, fb.height() as u16, &pixels);
                texture.set_filter(FilterMode::Nearest);
                draw_texture_ex(
                    &texture,
                    0.0,
                    0.0,
                    WHITE,
                    DrawTextureParams {
                        dest_size: Some(Vec2::new(screen_width(), screen_height())),
                        ..Default::default()
                    },
                );
            }
            Err(e) => warn!(error = %e, "could not convert frame buffer"),
        }

        draw_text(
            &format!(
                "FPS: {} | tris: {} culled: {} | fragments shaded: {}",
                get_fps(),
                stats.triangles_rasterized(),
                stats.culled,
                stats.fragments_shaded
            ),
            8.0,
            20.0,
            20.0,
            Color::from_rgba(220, 220, 220, 255),
        );

        next_frame().await;
    }
}
