//! Barycentric coverage test and interpolation weights
//!
//! One [`BarycentricHelper`] is built per triangle in raster space. For every pixel
//! it yields the three vertex weights, which double as the inside/outside test.

use std::ops::Index;

use super::math::{cross_2d, pixel, Point2i, Real, Vec2, Vec3};
use super::types::WindingOrder;

/// Weights of the three triangle vertices at a point. They sum to 1 on the triangle's plane.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BarycentricCoordinates {
    pub x: Real,
    pub y: Real,
    pub z: Real,
}

impl BarycentricCoordinates {
    pub const fn new(x: Real, y: Real, z: Real) -> Self {
        Self { x, y, z }
    }

    pub fn interpolate(&self, a: Real, b: Real, c: Real) -> Real {
        self.x * a + self.y * b + self.z * c
    }

    pub fn interpolate_array(&self, values: &[Real; 3]) -> Real {
        self.interpolate(values[0], values[1], values[2])
    }

    pub fn sum(&self) -> Real {
        self.x + self.y + self.z
    }
}

impl Index<usize> for BarycentricCoordinates {
    type Output = Real;

    fn index(&self, i: usize) -> &Real {
        match i {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("barycentric index out of range: {}", i),
        }
    }
}

/// Per-triangle setup for coverage and weight computation.
///
/// Points are in continuous raster space (x, y in pixels, z carries depth).
/// The winding order is the one considered front-facing and is fixed for the
/// helper's lifetime since it signs every weight.
#[derive(Debug, Clone, Copy)]
pub struct BarycentricHelper {
    winding_order: WindingOrder,
    points: [Vec3; 3],
    edges: [Vec3; 3],
    signed_area: Real,
    inv_area: Real,
}

impl BarycentricHelper {
    /// Twice the signed area of the triangle; positive when counter-clockwise
    pub fn signed_double_area(p0: Vec3, p1: Vec3, p2: Vec3) -> Real {
        cross_2d(p1 - p0, p2 - p0)
    }

    /// Degenerate (zero-area) triangles must be filtered out before this is called.
    pub fn new(winding_order: WindingOrder, p0: Vec3, p1: Vec3, p2: Vec3) -> Self {
        let signed_area = Self::signed_double_area(p0, p1, p2);
        debug_assert!(signed_area != 0.0, "degenerate triangle passed to BarycentricHelper");
        Self {
            winding_order,
            points: [p0, p1, p2],
            edges: [p2 - p1, p0 - p2, p1 - p0],
            signed_area,
            inv_area: 1.0 / signed_area.abs(),
        }
    }

    pub fn points(&self) -> &[Vec3; 3] {
        &self.points
    }

    pub fn winding_order(&self) -> WindingOrder {
        self.winding_order
    }

    pub fn signed_area(&self) -> Real {
        self.signed_area
    }

    /// True when the triangle's orientation matches the front-face winding order
    pub fn is_winding_order_correct(&self) -> bool {
        self.signed_area * self.winding_order.sign() > 0.0
    }

    /// Weights at the center of a discrete pixel
    pub fn coordinates(&self, pixel_position: Point2i) -> BarycentricCoordinates {
        self.coordinates_at(pixel::to_continuous(pixel_position))
    }

    /// Weights at an arbitrary point in continuous raster space
    pub fn coordinates_at(&self, point: Vec2) -> BarycentricCoordinates {
        let p = Vec3::new(point.x, point.y, 0.0);
        let scale = self.inv_area * self.winding_order.sign();
        BarycentricCoordinates {
            x: cross_2d(self.edges[0], p - self.points[1]) * scale,
            y: cross_2d(self.edges[1], p - self.points[2]) * scale,
            z: cross_2d(self.edges[2], p - self.points[0]) * scale,
        }
    }

    /// Coverage test with a fill rule for points lying exactly on an edge.
    ///
    /// A zero weight means the point is on the edge opposite that vertex. Such a
    /// point belongs to this triangle only if the edge points down (winding-adjusted),
    /// or is horizontal and points left. Two triangles sharing an edge traverse it
    /// in opposite directions, so exactly one of them owns it.
    pub fn is_inside(&self, coords: &BarycentricCoordinates) -> bool {
        if coords.x < 0.0 || coords.y < 0.0 || coords.z < 0.0 {
            return false;
        }

        let sign = self.winding_order.sign();
        let owns_edge = |edge: &Vec3| (edge.y == 0.0 && sign * edge.x < 0.0) || sign * edge.y < 0.0;

        (coords.x != 0.0 || owns_edge(&self.edges[0]))
            && (coords.y != 0.0 || owns_edge(&self.edges[1]))
            && (coords.z != 0.0 || owns_edge(&self.edges[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(x: Real, y: Real) -> Vec3 {
        Vec3::new(x, y, 0.0)
    }

    fn covers(h: &BarycentricHelper, p: Point2i) -> bool {
        h.is_inside(&h.coordinates(p))
    }

    #[test]
    fn test_interior_point_weights() {
        let h = BarycentricHelper::new(WindingOrder::CounterClockwise, v(10.0, 10.0), v(20.0, 10.0), v(10.0, 20.0));
        let c = h.coordinates(Point2i::new(12, 12));
        assert!(h.is_inside(&c));
        assert!((c.sum() - 1.0).abs() < 1e-5);
        assert!(c.x > c.y && c.x > c.z);
    }

    #[test]
    fn test_vertex_weights_are_unit() {
        let h = BarycentricHelper::new(WindingOrder::CounterClockwise, v(0.0, 0.0), v(8.0, 0.0), v(0.0, 8.0));
        let c = h.coordinates_at(Vec2::new(8.0, 0.0));
        assert!((c.y - 1.0).abs() < 1e-6);
        assert!(c.x.abs() < 1e-6 && c.z.abs() < 1e-6);
    }

    #[test]
    fn test_back_face_is_outside() {
        // Clockwise in raster space, front face is counter-clockwise
        let h = BarycentricHelper::new(WindingOrder::CounterClockwise, v(10.0, 10.0), v(10.0, 20.0), v(20.0, 10.0));
        assert!(!h.is_winding_order_correct());
        assert!(!covers(&h, Point2i::new(12, 12)));
    }

    #[test]
    fn test_shared_diagonal_is_owned_once() {
        let a = BarycentricHelper::new(WindingOrder::CounterClockwise, v(10.0, 10.0), v(20.0, 10.0), v(10.0, 20.0));
        let b = BarycentricHelper::new(WindingOrder::CounterClockwise, v(20.0, 10.0), v(20.0, 20.0), v(10.0, 20.0));
        for y in 10..20 {
            for x in 10..20 {
                let p = Point2i::new(x, y);
                let count = covers(&a, p) as u32 + covers(&b, p) as u32;
                assert_eq!(count, 1, "pixel ({}, {}) covered {} times", x, y, count);
            }
        }
    }

    #[test]
    fn test_edges_through_pixel_centers_are_owned_once() {
        // 2x2 grid of quads with vertices on pixel centers, each quad split along a diagonal.
        // Internal edges (horizontal, vertical, diagonal) and the shared center vertex all
        // pass through pixel centers.
        let xs = [2.5, 8.5, 14.5];
        let mut tris = Vec::new();
        for j in 0..2 {
            for i in 0..2 {
                let (x0, x1, y0, y1) = (xs[i], xs[i + 1], xs[j], xs[j + 1]);
                tris.push(BarycentricHelper::new(WindingOrder::CounterClockwise, v(x0, y0), v(x1, y0), v(x1, y1)));
                tris.push(BarycentricHelper::new(WindingOrder::CounterClockwise, v(x0, y0), v(x1, y1), v(x0, y1)));
            }
        }
        for y in 3..14 {
            for x in 3..14 {
                let p = Point2i::new(x, y);
                let count = tris.iter().filter(|t| covers(t, p)).count();
                assert_eq!(count, 1, "pixel ({}, {}) covered {} times", x, y, count);
            }
        }
    }

    #[test]
    fn test_winding_swap_with_reversed_vertices_is_identical() {
        let (p0, p1, p2) = (v(3.5, 1.0), v(17.0, 6.5), v(6.5, 15.5));
        let ccw = BarycentricHelper::new(WindingOrder::CounterClockwise, p0, p1, p2);
        let cw = BarycentricHelper::new(WindingOrder::Clockwise, p2, p1, p0);
        for y in 0..20 {
            for x in 0..20 {
                let p = Point2i::new(x, y);
                assert_eq!(covers(&ccw, p), covers(&cw, p), "pixel ({}, {})", x, y);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_partition_of_unity(
            ax in -20.0..20.0f64, ay in -20.0..20.0f64,
            bx in -20.0..20.0f64, by in -20.0..20.0f64,
            cx in -20.0..20.0f64, cy in -20.0..20.0f64,
            u in 0.01..0.98f64, t in 0.01..0.98f64,
        ) {
            let (p0, p1, p2) = (v(ax as Real, ay as Real), v(bx as Real, by as Real), v(cx as Real, cy as Real));
            let area = BarycentricHelper::signed_double_area(p0, p1, p2);
            prop_assume!(area.abs() > 20.0);

            // Strictly interior point built from known weights
            let w1 = u * (1.0 - t);
            let w2 = t * (1.0 - u);
            prop_assume!(w1 + w2 < 0.99);
            let w0 = 1.0 - w1 - w2;
            let px = w0 * ax + w1 * bx + w2 * cx;
            let py = w0 * ay + w1 * by + w2 * cy;

            let winding = WindingOrder::from_signed_area(area);
            let h = BarycentricHelper::new(winding, p0, p1, p2);
            let c = h.coordinates_at(Vec2::new(px as Real, py as Real));
            prop_assert!((c.sum() - 1.0).abs() < 1e-4);
            for i in 0..3 {
                prop_assert!(c[i] >= -1e-4 && c[i] <= 1.0 + 1e-4);
            }
            prop_assert!((c.x as f64 - w0).abs() < 1e-2);
        }
    }
}
