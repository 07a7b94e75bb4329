//! Vector math for the rasterization pipeline
//!
//! Everything is built on [`Real`], which is `f32` unless the `f64` feature is on.
//! Vector types are `repr(C)` and `Pod` so they can live inside user vertex records
//! and be read back by byte offset from the pixel stage.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

#[cfg(not(feature = "f64"))]
pub type Real = f32;
#[cfg(feature = "f64")]
pub type Real = f64;

/// 2D cross product (z component of the 3D cross of two vectors lying in the XY plane)
#[inline]
pub fn cross_2d(a: Vec3, b: Vec3) -> Real {
    a.x * b.y - a.y * b.x
}

#[inline]
pub fn lerp<T>(t: Real, a: T, b: T) -> T
where
    T: Add<Output = T> + Mul<Real, Output = T>,
{
    a * (1.0 - t) + b * t
}

/// 2D Vector (texture coordinates, derivatives)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
pub struct Vec2 {
    pub x: Real,
    pub y: Real,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: Real, y: Real) -> Self {
        Self { x, y }
    }

    pub fn abs(self) -> Vec2 {
        Vec2::new(self.x.abs(), self.y.abs())
    }

    pub fn max_element(self) -> Real {
        self.x.max(self.y)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<Real> for Vec2 {
    type Output = Vec2;
    fn mul(self, s: Real) -> Vec2 {
        Vec2::new(self.x * s, self.y * s)
    }
}

/// 3D Vector
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
pub struct Vec3 {
    pub x: Real,
    pub y: Real,
    pub z: Real,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Vec3 = Vec3 { x: 1.0, y: 1.0, z: 1.0 };
    pub const UP: Vec3 = Vec3 { x: 0.0, y: 1.0, z: 0.0 };

    pub const fn new(x: Real, y: Real, z: Real) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> Real {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn len(self) -> Real {
        self.dot(self).sqrt()
    }

    pub fn normalize(self) -> Vec3 {
        let l = self.len();
        if l == 0.0 {
            return Vec3::ZERO;
        }
        self * (1.0 / l)
    }

    /// Reflect `self` around `normal` (both pointing away from the surface)
    pub fn reflect(self, normal: Vec3) -> Vec3 {
        normal * (2.0 * self.dot(normal)) - self
    }

    pub fn min(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn max(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// Component-wise product
    pub fn mul_elements(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    pub fn clamp(self, lo: Real, hi: Real) -> Vec3 {
        Vec3::new(self.x.clamp(lo, hi), self.y.clamp(lo, hi), self.z.clamp(lo, hi))
    }

    pub fn xy(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, other: Vec3) {
        *self = *self + other;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl Mul<Real> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: Real) -> Vec3 {
        Vec3 {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// Homogeneous 4D vector. Vertex shaders return clip positions as `Vec4`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
pub struct Vec4 {
    pub x: Real,
    pub y: Real,
    pub z: Real,
    pub w: Real,
}

impl Vec4 {
    pub const ZERO: Vec4 = Vec4 { x: 0.0, y: 0.0, z: 0.0, w: 0.0 };

    pub const fn new(x: Real, y: Real, z: Real, w: Real) -> Self {
        Self { x, y, z, w }
    }

    pub const fn from_point(p: Vec3) -> Self {
        Self { x: p.x, y: p.y, z: p.z, w: 1.0 }
    }

    pub fn xyz(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Perspective divide
    pub fn to_euclidean(self) -> Vec3 {
        let inv_w = 1.0 / self.w;
        Vec3::new(self.x * inv_w, self.y * inv_w, self.z * inv_w)
    }
}

impl Add for Vec4 {
    type Output = Vec4;
    fn add(self, o: Vec4) -> Vec4 {
        Vec4::new(self.x + o.x, self.y + o.y, self.z + o.z, self.w + o.w)
    }
}

impl Sub for Vec4 {
    type Output = Vec4;
    fn sub(self, o: Vec4) -> Vec4 {
        Vec4::new(self.x - o.x, self.y - o.y, self.z - o.z, self.w - o.w)
    }
}

impl Mul<Real> for Vec4 {
    type Output = Vec4;
    fn mul(self, s: Real) -> Vec4 {
        Vec4::new(self.x * s, self.y * s, self.z * s, self.w * s)
    }
}

/// Integer pixel position (discrete space)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point2i {
    pub x: i32,
    pub y: i32,
}

impl Point2i {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point2i {
    type Output = Point2i;
    fn add(self, o: Point2i) -> Point2i {
        Point2i::new(self.x + o.x, self.y + o.y)
    }
}

/// Axis-aligned pixel rectangle, `min` inclusive and `max` exclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds2i {
    pub min: Point2i,
    pub max: Point2i,
}

impl Bounds2i {
    pub const fn new(min: Point2i, max: Point2i) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> i32 {
        (self.max.x - self.min.x).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.max.y - self.min.y).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains(&self, p: Point2i) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    pub fn overlaps(&self, other: &Bounds2i) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    /// Intersection of two rectangles; empty (zero-sized at the origin) if they don't overlap
    pub fn intersect(&self, other: &Bounds2i) -> Bounds2i {
        if !self.overlaps(other) {
            return Bounds2i::default();
        }
        Bounds2i {
            min: Point2i::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            max: Point2i::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        }
    }
}

/// Conversions between discrete pixel coordinates and continuous raster space.
///
/// In continuous space a pixel starts at (0, 0), ends at (1, 1) and its center is at (0.5, 0.5).
pub mod pixel {
    use super::{Point2i, Real, Vec2};

    pub fn to_continuous(p: Point2i) -> Vec2 {
        Vec2::new(p.x as Real + 0.5, p.y as Real + 0.5)
    }

    pub fn to_discrete(v: Vec2) -> Point2i {
        Point2i::new(v.x.floor() as i32, v.y.floor() as i32)
    }
}

/// Row-major 4x4 matrix, column vectors (`m * v`)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Mat4 {
    pub m: [[Real; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn translation(t: Vec3) -> Mat4 {
        let mut r = Mat4::IDENTITY;
        r.m[0][3] = t.x;
        r.m[1][3] = t.y;
        r.m[2][3] = t.z;
        r
    }

    pub fn scale(s: Vec3) -> Mat4 {
        let mut r = Mat4::IDENTITY;
        r.m[0][0] = s.x;
        r.m[1][1] = s.y;
        r.m[2][2] = s.z;
        r
    }

    pub fn rotation_x(angle: Real) -> Mat4 {
        let (s, c) = angle.sin_cos();
        let mut r = Mat4::IDENTITY;
        r.m[1][1] = c;
        r.m[1][2] = -s;
        r.m[2][1] = s;
        r.m[2][2] = c;
        r
    }

    pub fn rotation_y(angle: Real) -> Mat4 {
        let (s, c) = angle.sin_cos();
        let mut r = Mat4::IDENTITY;
        r.m[0][0] = c;
        r.m[0][2] = s;
        r.m[2][0] = -s;
        r.m[2][2] = c;
        r
    }

    /// Right-handed perspective projection mapping view-space depth to [0, 1]
    /// (camera looks down -Z, `near` lands on 0 and `far` on 1).
    pub fn perspective(fov_y: Real, aspect: Real, near: Real, far: Real) -> Mat4 {
        let f = 1.0 / (fov_y * 0.5).tan();
        let range = 1.0 / (near - far);
        Mat4 {
            m: [
                [f / aspect, 0.0, 0.0, 0.0],
                [0.0, f, 0.0, 0.0],
                [0.0, 0.0, far * range, near * far * range],
                [0.0, 0.0, -1.0, 0.0],
            ],
        }
    }

    pub fn mul_vec4(&self, v: Vec4) -> Vec4 {
        let row = |r: &[Real; 4]| r[0] * v.x + r[1] * v.y + r[2] * v.z + r[3] * v.w;
        Vec4::new(row(&self.m[0]), row(&self.m[1]), row(&self.m[2]), row(&self.m[3]))
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.mul_vec4(Vec4::from_point(p)).xyz()
    }

    /// Transform a direction (ignores translation)
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.mul_vec4(Vec4::new(v.x, v.y, v.z, 0.0)).xyz()
    }
}

impl Mul for Mat4 {
    type Output = Mat4;
    fn mul(self, o: Mat4) -> Mat4 {
        let mut r = [[0.0; 4]; 4];
        for (i, row) in r.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.m[i][k] * o.m[k][j]).sum();
            }
        }
        Mat4 { m: r }
    }
}

impl Div<Real> for Vec3 {
    type Output = Vec3;
    fn div(self, s: Real) -> Vec3 {
        self * (1.0 / s)
    }
}
