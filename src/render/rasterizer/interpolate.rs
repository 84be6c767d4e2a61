//! Barycentric weights and attribute interpolation.

use smallvec::SmallVec;

use crate::clipper::clip_space::INLINE_ATTRIBUTES;
use crate::math::EPSILON;
use crate::mesh::Interpolation;

/// Interpolated attribute values for one fragment.
pub type AttributeValues = SmallVec<[f32; INLINE_ATTRIBUTES]>;

/// Interpolation weights at one point of a triangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Barycentric {
    /// Plain screen-space weights.
    pub screen: [f32; 3],
    /// Weights corrected by each vertex's 1/w.
    pub perspective: [f32; 3],
    /// Interpolated 1/w at the point.
    pub inv_w: f32,
}

impl Barycentric {
    /// Builds the weights from screen-space barycentrics and per-vertex 1/w:
    ///
    /// ```text
    /// λp_i = λ_i * invw_i / Σ λ_j * invw_j
    /// ```
    pub fn new(screen: [f32; 3], inv_w: [f32; 3]) -> Self {
        let weighted = [
            screen[0] * inv_w[0],
            screen[1] * inv_w[1],
            screen[2] * inv_w[2],
        ];
        let sum = weighted[0] + weighted[1] + weighted[2];
        let perspective = if sum.abs() > EPSILON {
            weighted.map(|w| w / sum)
        } else {
            screen
        };
        Self {
            screen,
            perspective,
            inv_w: sum,
        }
    }

    /// Weights at the mean of `count` sample points, given the sums of their
    /// unnormalized edge values and twice the triangle area.
    pub fn from_edge_sums(sums: [i64; 3], count: u32, area: i64, inv_w: [f32; 3]) -> Self {
        let denominator = area as f64 * count.max(1) as f64;
        let screen = sums.map(|s| (s as f64 / denominator) as f32);
        Self::new(screen, inv_w)
    }

    /// Weights for `mode`.
    #[inline]
    pub fn weights(&self, mode: Interpolation) -> [f32; 3] {
        match mode {
            Interpolation::Perspective => self.perspective,
            Interpolation::Linear => self.screen,
            Interpolation::Flat => [1.0, 0.0, 0.0],
        }
    }
}

/// Interpolates every attribute component of a triangle's vertices into
/// `out`, honouring each component's interpolation mode. Flat components
/// take the provoking vertex (`vertices[0]`).
pub fn interpolate_attributes(
    barycentric: &Barycentric,
    modes: &[Interpolation],
    vertices: [&[f32]; 3],
    out: &mut AttributeValues,
) {
    out.clear();
    out.extend(modes.iter().enumerate().map(|(i, &mode)| {
        let [l0, l1, l2] = barycentric.weights(mode);
        match mode {
            Interpolation::Flat => vertices[0][i],
            _ => l0 * vertices[0][i] + l1 * vertices[1][i] + l2 * vertices[2][i],
        }
    }));
}
