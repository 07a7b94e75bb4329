//! Procedural test meshes
//!
//! Faces wind counter-clockwise when seen from outside, so they are front-facing under
//! a right-handed projection with the default winding order.

use bytemuck::{Pod, Zeroable};

use super::color::Color;
use super::math::{Vec2, Vec3};

/// Vertex record used by the built-in meshes
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub color: Color,
}

const FACE_UVS: [Vec2; 4] = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];

/// Append one quad (4 corners, counter-clockwise) as two triangles
fn push_face(vertices: &mut Vec<MeshVertex>, indices: &mut Vec<u32>, corners: [Vec3; 4], normal: Vec3, color: Color) {
    let base = vertices.len() as u32;
    for (position, uv) in corners.into_iter().zip(FACE_UVS) {
        vertices.push(MeshVertex { position, normal, uv, color });
    }
    indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
}

/// Unit quad in the XY plane facing +Z, spanning [-1, 1]
pub fn quad(color: Color) -> (Vec<MeshVertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(4);
    let mut indices = Vec::with_capacity(6);
    push_face(
        &mut vertices,
        &mut indices,
        [
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
        ],
        Vec3::new(0.0, 0.0, 1.0),
        color,
    );
    (vertices, indices)
}

/// Cube spanning [-1, 1] on every axis with per-face normals, UVs and colors
pub fn cube() -> (Vec<MeshVertex>, Vec<u32>) {
    let faces: [([Vec3; 4], Vec3, Color); 6] = [
        // Front
        (
            [
                Vec3::new(-1.0, -1.0, 1.0),
                Vec3::new(1.0, -1.0, 1.0),
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(-1.0, 1.0, 1.0),
            ],
            Vec3::new(0.0, 0.0, 1.0),
            Color::RED,
        ),
        // Back
        (
            [
                Vec3::new(1.0, -1.0, -1.0),
                Vec3::new(-1.0, -1.0, -1.0),
                Vec3::new(-1.0, 1.0, -1.0),
                Vec3::new(1.0, 1.0, -1.0),
            ],
            Vec3::new(0.0, 0.0, -1.0),
            Color::GREEN,
        ),
        // Top
        (
            [
                Vec3::new(-1.0, 1.0, 1.0),
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(1.0, 1.0, -1.0),
                Vec3::new(-1.0, 1.0, -1.0),
            ],
            Vec3::new(0.0, 1.0, 0.0),
            Color::BLUE,
        ),
        // Bottom
        (
            [
                Vec3::new(-1.0, -1.0, -1.0),
                Vec3::new(1.0, -1.0, -1.0),
                Vec3::new(1.0, -1.0, 1.0),
                Vec3::new(-1.0, -1.0, 1.0),
            ],
            Vec3::new(0.0, -1.0, 0.0),
            Color::rgb(1.0, 1.0, 0.0),
        ),
        // Right
        (
            [
                Vec3::new(1.0, -1.0, 1.0),
                Vec3::new(1.0, -1.0, -1.0),
                Vec3::new(1.0, 1.0, -1.0),
                Vec3::new(1.0, 1.0, 1.0),
            ],
            Vec3::new(1.0, 0.0, 0.0),
            Color::PINK,
        ),
        // Left
        (
            [
                Vec3::new(-1.0, -1.0, -1.0),
                Vec3::new(-1.0, -1.0, 1.0),
                Vec3::new(-1.0, 1.0, 1.0),
                Vec3::new(-1.0, 1.0, -1.0),
            ],
            Vec3::new(-1.0, 0.0, 0.0),
            Color::rgb(0.0, 1.0, 1.0),
        ),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (corners, normal, color) in faces {
        push_face(&mut vertices, &mut indices, corners, normal, color);
    }
    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_counts() {
        let (vertices, indices) = cube();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }

    #[test]
    fn test_cube_faces_wind_outward() {
        let (vertices, indices) = cube();
        for tri in indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| vertices[i as usize]);
            let geometric = (b.position - a.position).cross(c.position - a.position).normalize();
            assert!(geometric.dot(a.normal) > 0.99, "triangle {:?} winds against its normal", tri);
        }
    }

    #[test]
    fn test_quad_faces_positive_z() {
        let (vertices, indices) = quad(Color::WHITE);
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3]);
        assert!(vertices.iter().all(|v| v.normal == Vec3::new(0.0, 0.0, 1.0) && v.color == Color::WHITE));
    }
}
