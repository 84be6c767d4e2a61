//! Clip-space clipping against the homogeneous clip cube.
//!
//! The clip volume is defined by:
//!
//! ```text
//! -w <= x <= w
//! -w <= y <= w
//! -w <= z <= w   (OpenGL-style depth range)
//! ```
//!
//! A triangle crossing one plane becomes a triangle or a quad (split into two
//! triangles by fan triangulation); new vertices lie exactly on the plane.

use log::trace;
use smallvec::SmallVec;

use crate::math::{Vec4, EPSILON};
use crate::mesh::Interpolation;

/// Inline capacity for per-vertex attribute components.
pub const INLINE_ATTRIBUTES: usize = 16;

/// A vertex in homogeneous clip space with its packed attribute values.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipSpaceVertex {
    /// Position in clip space (x, y, z, w) - before perspective divide
    pub position: Vec4,
    pub attributes: SmallVec<[f32; INLINE_ATTRIBUTES]>,
}

impl ClipSpaceVertex {
    pub fn new(position: Vec4, attributes: &[f32]) -> Self {
        Self {
            position,
            attributes: SmallVec::from_slice(attributes),
        }
    }

    /// Point at parameter `t` along the clip-space segment `self -> other`.
    ///
    /// Perspective attributes interpolate with `t` (linear in homogeneous
    /// space). Screen-space linear attributes use the parameter of the
    /// projected point along the projected segment, so they stay exact after
    /// the perspective divide. Flat attributes keep `self`'s value; the
    /// provoking vertex value is restored after clipping anyway.
    pub fn lerp(&self, other: &Self, t: f32, modes: &[Interpolation]) -> Self {
        let position = self.position.lerp(other.position, t);
        let w = position.w;
        let screen_t = if w.abs() < EPSILON {
            t
        } else {
            (t * other.position.w / w).clamp(0.0, 1.0)
        };

        let attributes = self
            .attributes
            .iter()
            .zip(&other.attributes)
            .zip(modes)
            .map(|((&a, &b), mode)| match mode {
                Interpolation::Perspective => a + (b - a) * t,
                Interpolation::Linear => a + (b - a) * screen_t,
                Interpolation::Flat => a,
            })
            .collect();

        Self {
            position,
            attributes,
        }
    }
}

/// The 6 planes of the canonical clip-space cube.
///
/// The signed distance is positive when inside the clip volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipPlane {
    /// Left plane: x >= -w
    Left,
    /// Right plane: x <= w
    Right,
    /// Bottom plane: y >= -w
    Bottom,
    /// Top plane: y <= w
    Top,
    /// Near plane: z >= -w
    Near,
    /// Far plane: z <= w
    Far,
}

impl ClipPlane {
    pub const ALL: [ClipPlane; 6] = [
        ClipPlane::Near,
        ClipPlane::Far,
        ClipPlane::Left,
        ClipPlane::Right,
        ClipPlane::Bottom,
        ClipPlane::Top,
    ];

    /// Returns the signed distance from a position to this plane.
    /// Positive = inside the clip volume, Negative = outside.
    pub fn signed_distance(&self, p: Vec4) -> f32 {
        match self {
            Self::Left => p.w + p.x,
            Self::Right => p.w - p.x,
            Self::Bottom => p.w + p.y,
            Self::Top => p.w - p.y,
            Self::Near => p.w + p.z,
            Self::Far => p.w - p.z,
        }
    }

    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Bitmask of the planes a position lies outside of.
pub fn outcode(p: Vec4) -> u8 {
    ClipPlane::ALL
        .iter()
        .filter(|plane| plane.signed_distance(p) < 0.0)
        .fold(0, |code, plane| code | plane.bit())
}

/// A convex polygon in clip space. A triangle clipped against all six planes
/// has at most nine vertices.
#[derive(Clone, Debug, Default)]
pub struct ClipSpacePolygon {
    pub vertices: SmallVec<[ClipSpaceVertex; 9]>,
}

impl ClipSpacePolygon {
    pub fn from_triangle(v0: ClipSpaceVertex, v1: ClipSpaceVertex, v2: ClipSpaceVertex) -> Self {
        let mut vertices = SmallVec::new();
        vertices.extend([v0, v1, v2]);
        Self { vertices }
    }

    /// Returns true if the polygon has been completely clipped away.
    pub fn is_empty(&self) -> bool {
        self.vertices.len() < 3
    }

    /// Clip this polygon against a single plane (Sutherland-Hodgman).
    pub fn clip_against_plane(&self, plane: ClipPlane, modes: &[Interpolation]) -> Self {
        let mut output = Self::default();
        if self.is_empty() {
            return output;
        }

        let n = self.vertices.len();
        for i in 0..n {
            let current = &self.vertices[i];
            let next = &self.vertices[(i + 1) % n];

            let d1 = plane.signed_distance(current.position);
            let d2 = plane.signed_distance(next.position);
            let current_inside = d1 >= 0.0;
            let next_inside = d2 >= 0.0;

            if current_inside {
                output.push_distinct(current.clone());
            }
            if current_inside != next_inside {
                let t = d1 / (d1 - d2);
                output.push_distinct(current.lerp(next, t, modes));
            }
        }

        // Closing edge may have produced a duplicate of the first vertex.
        if output.vertices.len() > 1 {
            let first = output.vertices[0].position;
            let last = output.vertices[output.vertices.len() - 1].position;
            if nearly_equal(first, last) {
                output.vertices.pop();
            }
        }

        output
    }

    /// Fan triangulation of the (convex) polygon.
    pub fn triangulate(
        &self,
    ) -> impl Iterator<Item = [&ClipSpaceVertex; 3]> + '_ {
        (1..self.vertices.len().saturating_sub(1))
            .map(move |i| [&self.vertices[0], &self.vertices[i], &self.vertices[i + 1]])
    }

    fn push_distinct(&mut self, vertex: ClipSpaceVertex) {
        let duplicate = self
            .vertices
            .last()
            .map_or(false, |last| nearly_equal(last.position, vertex.position));
        if !duplicate {
            self.vertices.push(vertex);
        }
    }
}

fn nearly_equal(a: Vec4, b: Vec4) -> bool {
    let d = a - b;
    d.x.abs() < EPSILON && d.y.abs() < EPSILON && d.z.abs() < EPSILON && d.w.abs() < EPSILON
}

/// Result of clipping one triangle.
#[derive(Debug)]
pub enum Clipped {
    /// Entirely inside; no new vertices were created.
    Unclipped,
    /// Entirely outside at least one plane.
    Rejected,
    /// Crossed one or more planes; the polygon may still be empty after
    /// degenerate slivers are removed.
    Polygon(ClipSpacePolygon),
}

/// Clips triangles against the canonical clip-space cube. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipSpaceClipper;

impl ClipSpaceClipper {
    pub fn new() -> Self {
        ClipSpaceClipper
    }

    /// Classify and, when needed, clip a triangle.
    pub fn clip_triangle(&self, vertices: [&ClipSpaceVertex; 3], modes: &[Interpolation]) -> Clipped {
        let codes = vertices.map(|v| outcode(v.position));
        if codes.iter().all(|&c| c == 0) {
            return Clipped::Unclipped;
        }
        if codes[0] & codes[1] & codes[2] != 0 {
            return Clipped::Rejected;
        }

        let crossing = codes[0] | codes[1] | codes[2];
        let mut polygon = ClipSpacePolygon::from_triangle(
            vertices[0].clone(),
            vertices[1].clone(),
            vertices[2].clone(),
        );
        for plane in ClipPlane::ALL {
            if crossing & plane.bit() == 0 {
                continue;
            }
            polygon = polygon.clip_against_plane(plane, modes);
            if polygon.is_empty() {
                break;
            }
        }
        trace!(
            "clipped triangle (outcodes {:#08b}) into {} vertices",
            crossing,
            polygon.vertices.len()
        );
        Clipped::Polygon(polygon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const MODES: [Interpolation; 2] = [Interpolation::Perspective, Interpolation::Linear];

    fn vertex(x: f32, y: f32, z: f32, w: f32, attr: f32) -> ClipSpaceVertex {
        ClipSpaceVertex::new(Vec4::new(x, y, z, w), &[attr, attr])
    }

    #[test]
    fn inside_triangle_is_untouched() {
        let (a, b, c) = (
            vertex(0.0, 0.0, 0.0, 1.0, 0.0),
            vertex(0.5, 0.0, 0.0, 1.0, 0.0),
            vertex(0.0, 0.5, 0.0, 1.0, 0.0),
        );
        assert!(matches!(
            ClipSpaceClipper::new().clip_triangle([&a, &b, &c], &MODES),
            Clipped::Unclipped
        ));
    }

    #[test]
    fn triangle_behind_near_plane_is_rejected() {
        let (a, b, c) = (
            vertex(0.0, 0.0, -3.0, 1.0, 0.0),
            vertex(0.5, 0.0, -2.0, 1.0, 0.0),
            vertex(0.0, 0.5, -5.0, 1.0, 0.0),
        );
        assert!(matches!(
            ClipSpaceClipper::new().clip_triangle([&a, &b, &c], &MODES),
            Clipped::Rejected
        ));
    }

    #[test]
    fn one_vertex_outside_near_plane_yields_quad_on_the_plane() {
        let a = vertex(0.0, 0.0, -2.0, 1.0, 0.0); // outside: z < -w
        let b = vertex(0.5, 0.0, 0.0, 1.0, 1.0);
        let c = vertex(0.0, 0.5, 0.0, 1.0, 1.0);

        let polygon = match ClipSpaceClipper::new().clip_triangle([&a, &b, &c], &MODES) {
            Clipped::Polygon(p) => p,
            other => panic!("expected clipping, got {other:?}"),
        };
        assert_eq!(polygon.vertices.len(), 4);
        assert_eq!(polygon.triangulate().count(), 2);
        for v in &polygon.vertices {
            assert!(ClipPlane::Near.signed_distance(v.position) >= -1e-6);
        }
        // New vertices sit exactly on z = -w.
        let on_plane = polygon
            .vertices
            .iter()
            .filter(|v| ClipPlane::Near.signed_distance(v.position).abs() < 1e-6)
            .count();
        assert_eq!(on_plane, 2);
    }

    #[test]
    fn screen_linear_attributes_use_projected_parameter() {
        // Segment from w=1 to w=3; halfway in clip space is 3/4 of the way on screen.
        let a = vertex(0.0, 0.0, 0.0, 1.0, 0.0);
        let b = vertex(0.0, 0.0, 0.0, 3.0, 1.0);
        let mid = a.lerp(&b, 0.5, &MODES);
        assert_abs_diff_eq!(mid.attributes[0], 0.5);
        assert_abs_diff_eq!(mid.attributes[1], 0.75);
    }
}
