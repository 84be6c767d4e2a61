//! Geometric primitives and intersection routines.
//!
//! 3D types ([`Plane`], [`Ray`], [`Triangle3`]) work in object or world space;
//! [`TexelRect`] is an integer rectangle in surface or tile-local texel space.
//! All degeneracy tests use [`crate::math::EPSILON`].

use crate::math::{Vec3, EPSILON};

/// A plane defined by a point on the plane and its normal vector.
/// The normal points toward the "inside" (positive) half-space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub point: Vec3,
    pub normal: Vec3,
}

impl Plane {
    pub fn new(point: Vec3, normal: Vec3) -> Self {
        Self { point, normal }
    }

    /// Returns the signed distance from a point to this plane, scaled by the
    /// normal's length. Positive = inside (same side as normal).
    pub fn signed_distance(&self, position: Vec3) -> f32 {
        (position - self.point).dot(self.normal)
    }
}

/// A half-line `origin + t * direction`, `t >= 0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// Where a ray meets a triangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Ray parameter of the hit point.
    pub t: f32,
    /// Barycentric weights of the hit point relative to the triangle's vertices.
    pub barycentric: [f32; 3],
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Ray through two points, starting at `from`.
    pub fn through(from: Vec3, to: Vec3) -> Self {
        Self::new(from, to - from)
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Ray parameter where this ray crosses `plane`, if it does so in front of the origin.
    pub fn intersect_plane(&self, plane: &Plane) -> Option<f32> {
        let denom = self.direction.dot(plane.normal);
        if denom.abs() < EPSILON {
            return None;
        }
        let t = (plane.point - self.origin).dot(plane.normal) / denom;
        (t >= 0.0).then_some(t)
    }

    /// Möller-Trumbore ray/triangle intersection. Both windings are accepted.
    pub fn intersect_triangle(&self, triangle: &Triangle3) -> Option<RayHit> {
        let [a, b, c] = triangle.points;
        let e1 = b - a;
        let e2 = c - a;
        let p = self.direction.cross(e2);
        let det = e1.dot(p);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(e1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(q) * inv_det;
        (t >= 0.0).then_some(RayHit {
            t,
            barycentric: [1.0 - u - v, u, v],
        })
    }
}

/// A triangle in 3D space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle3 {
    pub points: [Vec3; 3],
}

impl Triangle3 {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { points: [a, b, c] }
    }

    /// Unnormalized face normal; its length is twice the triangle's area.
    pub fn scaled_normal(&self) -> Vec3 {
        let [a, b, c] = self.points;
        (b - a).cross(c - a)
    }

    pub fn area(&self) -> f32 {
        0.5 * self.scaled_normal().magnitude()
    }

    pub fn is_degenerate(&self) -> bool {
        self.area() < EPSILON
    }

    pub fn plane(&self) -> Option<Plane> {
        self.scaled_normal()
            .try_normalize()
            .map(|normal| Plane::new(self.points[0], normal))
    }

    pub fn centroid(&self) -> Vec3 {
        let [a, b, c] = self.points;
        (a + b + c) / 3.0
    }
}

/// Half-open integer rectangle `[min_x, max_x) x [min_y, max_y)` in texel units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TexelRect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl TexelRect {
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub const fn from_origin_size(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self::new(x, y, x + width as i32, y + height as i32)
    }

    pub fn width(&self) -> u32 {
        (self.max_x - self.min_x).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.max_y - self.min_y).max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    /// Overlap of two rectangles; empty when they are disjoint.
    pub fn intersection(&self, other: &TexelRect) -> TexelRect {
        TexelRect::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        )
    }

    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_triangle() -> Triangle3 {
        Triangle3::new(
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        )
    }

    #[test]
    fn ray_hits_triangle_interior_with_barycentrics() {
        let ray = Ray::new(Vec3::new(0.25, 0.25, 0.0), Vec3::FORWARD);
        let hit = ray.intersect_triangle(&unit_triangle()).expect("hit");
        assert_relative_eq!(hit.t, 1.0);
        assert_relative_eq!(hit.barycentric[0], 0.5);
        assert_relative_eq!(hit.barycentric[1], 0.25);
        assert_relative_eq!(hit.barycentric[2], 0.25);
    }

    #[test]
    fn ray_misses_outside_and_behind() {
        let outside = Ray::new(Vec3::new(0.8, 0.8, 0.0), Vec3::FORWARD);
        assert!(outside.intersect_triangle(&unit_triangle()).is_none());

        let behind = Ray::new(Vec3::new(0.2, 0.2, 2.0), Vec3::FORWARD);
        assert!(behind.intersect_triangle(&unit_triangle()).is_none());
    }

    #[test]
    fn ray_plane_agrees_with_triangle_hit() {
        let tri = unit_triangle();
        let plane = tri.plane().expect("non-degenerate");
        let ray = Ray::through(Vec3::new(0.1, 0.2, -3.0), Vec3::new(0.1, 0.2, 5.0));
        let t = ray.intersect_plane(&plane).expect("crosses plane");
        let hit = ray.intersect_triangle(&tri).expect("hits triangle");
        assert_relative_eq!(t, hit.t, epsilon = 1e-6);
        assert_relative_eq!(ray.at(t).z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn collinear_triangle_is_degenerate() {
        let tri = Triangle3::new(Vec3::ZERO, Vec3::ONE, Vec3::ONE * 2.0);
        assert!(tri.is_degenerate());
        assert!(tri.plane().is_none());
        assert!(!unit_triangle().is_degenerate());
    }

    #[test]
    fn rect_intersection_and_emptiness() {
        let a = TexelRect::new(0, 0, 8, 8);
        let b = TexelRect::new(6, 4, 12, 20);
        assert_eq!(a.intersection(&b), TexelRect::new(6, 4, 8, 8));
        assert_eq!(a.intersection(&b).area(), 8);
        assert!(a.intersection(&TexelRect::new(8, 0, 9, 1)).is_empty());
        assert!(b.contains(6, 19));
        assert!(!b.contains(12, 5));
    }
}
