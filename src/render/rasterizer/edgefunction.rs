//! Fixed-point edge functions with an exact top-left fill rule.
//!
//! # Edge Function
//!
//! For an edge from point A to point B, the edge function at point P is:
//!
//! ```text
//! E(P) = (P.x - A.x) * (B.y - A.y) - (P.y - A.y) * (B.x - A.x)
//! ```
//!
//! Raster space has y pointing down. Triangles are wound so that
//! `E(v0, v1, v2) > 0`; with that winding the interior is where all three
//! edge functions are positive.
//!
//! # Barycentric Coordinates
//!
//! The edge function values are proportional to barycentric coordinates:
//!
//! ```text
//! λ0 = E(v1, v2, P) / E(v0, v1, v2)
//! λ1 = E(v2, v0, P) / E(v0, v1, v2)
//! λ2 = E(v0, v1, P) / E(v0, v1, v2)
//! ```
//!
//! # Precision
//!
//! Vertices are snapped to `1 / 2^SUBPIXEL_BITS` of a texel and every edge
//! function is evaluated in `i64`. Products stay below 2^48 for any surface
//! up to [`crate::config::MAX_SURFACE_SIZE`], so there is no rounding and a
//! sample lying exactly on an edge is detected as exactly zero.
//!
//! # Fill Rule
//!
//! A sample exactly on an edge belongs to the triangle only when that edge is
//! a *top* edge (horizontal, interior below it) or a *left* edge (interior to
//! its right, i.e. the edge runs downward). Two triangles sharing an edge see
//! it with opposite directions, so exactly one of them owns the samples on it.

use crate::math::Vec2;
use crate::primitives::TexelRect;

/// Fractional bits of raster coordinates.
pub const SUBPIXEL_BITS: u32 = 8;
/// One texel in subpixel units.
pub const SUBPIXEL_ONE: i64 = 1 << SUBPIXEL_BITS;

/// A raster-space point in subpixel units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FixedPoint {
    pub x: i64,
    pub y: i64,
}

impl FixedPoint {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Snaps a floating-point raster position to the subpixel grid.
    /// Returns `None` for non-finite input.
    pub fn from_raster(p: Vec2) -> Option<Self> {
        if !p.x.is_finite() || !p.y.is_finite() {
            return None;
        }
        let scale = SUBPIXEL_ONE as f64;
        Some(Self::new(
            (p.x as f64 * scale).round() as i64,
            (p.y as f64 * scale).round() as i64,
        ))
    }

    pub fn to_raster(self) -> Vec2 {
        let scale = SUBPIXEL_ONE as f32;
        Vec2::new(self.x as f32 / scale, self.y as f32 / scale)
    }
}

/// Computes the edge function for point `p` relative to edge `a -> b`.
#[inline]
pub fn edge_function(a: FixedPoint, b: FixedPoint, p: FixedPoint) -> i64 {
    (p.x - a.x) * (b.y - a.y) - (p.y - a.y) * (b.x - a.x)
}

/// Whether an edge with direction `(dx, dy)` owns the samples lying on it.
#[inline]
pub fn is_top_left(dx: i64, dy: i64) -> bool {
    (dy == 0 && dx < 0) || dy > 0
}

/// One directed triangle edge, with its fill-rule bias folded in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    origin: FixedPoint,
    dx: i64,
    dy: i64,
    /// 0 for top-left edges, -1 otherwise: `E + bias >= 0` means covered.
    bias: i64,
}

impl Edge {
    pub fn new(a: FixedPoint, b: FixedPoint) -> Self {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        Self {
            origin: a,
            dx,
            dy,
            bias: if is_top_left(dx, dy) { 0 } else { -1 },
        }
    }

    #[inline]
    pub fn eval(&self, p: FixedPoint) -> i64 {
        (p.x - self.origin.x) * self.dy - (p.y - self.origin.y) * self.dx
    }

    pub fn is_top_left(&self) -> bool {
        self.bias == 0
    }

    #[inline]
    fn covers(&self, value: i64) -> bool {
        value + self.bias >= 0
    }

    /// Smallest and largest biased values over the corners of a box.
    fn range_over(&self, min: FixedPoint, max: FixedPoint) -> (i64, i64) {
        [
            FixedPoint::new(min.x, min.y),
            FixedPoint::new(max.x, min.y),
            FixedPoint::new(min.x, max.y),
            FixedPoint::new(max.x, max.y),
        ]
        .iter()
        .map(|&corner| self.eval(corner) + self.bias)
        .fold((i64::MAX, i64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
    }
}

/// How a triangle overlaps a block of samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileClass {
    /// No sample in the block can be covered.
    Outside,
    /// Some samples may be covered; each must be tested.
    Partial,
    /// Every sample in the block is covered.
    Inside,
}

/// The three edges of a positively wound triangle.
///
/// `edges[i]` is the edge opposite vertex `i`, so its value at a point is
/// proportional to that vertex's barycentric weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeFunctions {
    edges: [Edge; 3],
    /// Twice the triangle's area in subpixel units squared; always positive.
    area: i64,
}

impl EdgeFunctions {
    /// Builds the edges for `v`. Returns `None` unless the vertices are in
    /// positive winding with non-zero area.
    pub fn new(v: [FixedPoint; 3]) -> Option<Self> {
        let area = edge_function(v[0], v[1], v[2]);
        if area <= 0 {
            return None;
        }
        Some(Self {
            edges: [
                Edge::new(v[1], v[2]),
                Edge::new(v[2], v[0]),
                Edge::new(v[0], v[1]),
            ],
            area,
        })
    }

    pub fn area(&self) -> i64 {
        self.area
    }

    pub fn edges(&self) -> &[Edge; 3] {
        &self.edges
    }

    /// Unnormalized barycentric weights at `p`.
    #[inline]
    pub fn weights(&self, p: FixedPoint) -> [i64; 3] {
        [
            self.edges[0].eval(p),
            self.edges[1].eval(p),
            self.edges[2].eval(p),
        ]
    }

    /// Coverage test under the top-left rule.
    #[inline]
    pub fn covers(&self, weights: [i64; 3]) -> bool {
        self.edges
            .iter()
            .zip(weights)
            .all(|(edge, w)| edge.covers(w))
    }

    /// Classifies the axis-aligned box of sample positions `[min, max]`.
    ///
    /// Edge functions are linear, so their extremes over the box are at its
    /// corners.
    pub fn classify(&self, min: FixedPoint, max: FixedPoint) -> TileClass {
        let mut inside = true;
        for edge in &self.edges {
            let (lo, hi) = edge.range_over(min, max);
            if hi < 0 {
                return TileClass::Outside;
            }
            inside &= lo >= 0;
        }
        if inside {
            TileClass::Inside
        } else {
            TileClass::Partial
        }
    }
}

/// Texels whose samples may fall inside the box `[min, max]` of subpixel
/// positions. Samples of texel `t` lie in `[t, t + 1)` texels, so this is
/// the floor of each bound.
pub fn texel_bounds(min: FixedPoint, max: FixedPoint) -> TexelRect {
    let clamp = |v: i64| v.clamp(i32::MIN as i64 + 1, i32::MAX as i64 - 1) as i32;
    TexelRect::new(
        clamp(min.x >> SUBPIXEL_BITS),
        clamp(min.y >> SUBPIXEL_BITS),
        clamp(max.x >> SUBPIXEL_BITS) + 1,
        clamp(max.y >> SUBPIXEL_BITS) + 1,
    )
}
