//! Tiling triangle rasterization.
//!
//! Triangles arrive in raster space with snapped fixed-point vertices. For
//! each tile the rasterizer:
//! 1. Clips the triangle's texel bounds to the tile.
//! 2. Classifies the clipped block as outside, partially or fully covered.
//! 3. Tests each sample against the three edge functions (top-left rule).
//! 4. Depth-tests covered samples, shades once per (triangle, texel) at the
//!    centroid of the covered samples, and stores the result.
//!
//! Tiles are independent: computing one never reads another.

pub mod edgefunction;
pub mod interpolate;
pub mod sampling;
pub mod shader;

use log::trace;
use smallvec::SmallVec;

use crate::clipper::clip_space::INLINE_ATTRIBUTES;
use crate::error::BakeResult;
use crate::mesh::{AttributeLayout, Interpolation};
use crate::primitives::TexelRect;
use crate::render::framebuffer::{SampleBuffer, SampleMask};
use crate::render::tile::{TileBuffer, TileCoord, TileGrid};

use edgefunction::{texel_bounds, EdgeFunctions, FixedPoint, TileClass};
use interpolate::{interpolate_attributes, AttributeValues, Barycentric};
use sampling::SamplePattern;
use shader::{Attributes, ShadeInput, TexelShader};

/// Largest supported samples per texel.
pub const MAX_SAMPLES: usize = 16;

/// A vertex in raster space.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterVertex {
    pub position: FixedPoint,
    /// Reciprocal of clip-space w.
    pub inv_w: f32,
    pub attributes: SmallVec<[f32; INLINE_ATTRIBUTES]>,
}

/// A triangle ready for rasterization: positively wound, non-degenerate,
/// with edge functions precomputed.
#[derive(Clone, Debug)]
pub struct RasterTriangle {
    vertices: [RasterVertex; 3],
    edges: EdgeFunctions,
    bounds: TexelRect,
}

impl RasterTriangle {
    /// Sets up a triangle, swapping `vertices[1]` and `vertices[2]` if it is
    /// wound negatively so the provoking vertex stays first. Returns `None`
    /// when the snapped vertices enclose zero area.
    pub fn new(vertices: [RasterVertex; 3]) -> Option<Self> {
        let [v0, mut v1, mut v2] = vertices;
        let area = edgefunction::edge_function(v0.position, v1.position, v2.position);
        if area == 0 {
            return None;
        }
        if area < 0 {
            std::mem::swap(&mut v1, &mut v2);
        }
        let positions = [v0.position, v1.position, v2.position];
        let edges = EdgeFunctions::new(positions)?;
        let min = FixedPoint::new(
            positions.iter().map(|p| p.x).min().unwrap_or_default(),
            positions.iter().map(|p| p.y).min().unwrap_or_default(),
        );
        let max = FixedPoint::new(
            positions.iter().map(|p| p.x).max().unwrap_or_default(),
            positions.iter().map(|p| p.y).max().unwrap_or_default(),
        );
        Some(Self {
            vertices: [v0, v1, v2],
            edges,
            bounds: texel_bounds(min, max),
        })
    }

    pub fn vertices(&self) -> &[RasterVertex; 3] {
        &self.vertices
    }

    pub fn edges(&self) -> &EdgeFunctions {
        &self.edges
    }

    /// Texels whose samples may lie inside the triangle.
    pub fn texel_bounds(&self) -> TexelRect {
        self.bounds
    }

    fn inv_w(&self) -> [f32; 3] {
        [
            self.vertices[0].inv_w,
            self.vertices[1].inv_w,
            self.vertices[2].inv_w,
        ]
    }

    /// Interpolated 1/w at a point with unnormalized weights `w`.
    #[inline]
    fn depth(&self, w: [i64; 3]) -> f32 {
        let area = self.edges.area() as f64;
        let inv_w = self.inv_w();
        (0..3)
            .map(|i| w[i] as f64 / area * inv_w[i] as f64)
            .sum::<f64>() as f32
    }

    /// Classifies the samples of the texels in `rect` against this triangle.
    pub fn classify(&self, rect: TexelRect, pattern: &SamplePattern) -> TileClass {
        let region = rect.intersection(&self.bounds);
        if region.is_empty() {
            return TileClass::Outside;
        }
        let (min_x, min_y, max_x, max_y) = pattern.extent();
        let one = edgefunction::SUBPIXEL_ONE;
        let min = FixedPoint::new(region.min_x as i64 * one + min_x, region.min_y as i64 * one + min_y);
        let max = FixedPoint::new(
            (region.max_x - 1) as i64 * one + max_x,
            (region.max_y - 1) as i64 * one + max_y,
        );
        self.edges.classify(min, max)
    }
}

/// One covered texel of one triangle.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    /// Surface texel coordinates.
    pub x: i32,
    pub y: i32,
    /// Covered samples.
    pub mask: SampleMask,
    /// Fraction of the texel's samples covered.
    pub coverage: f32,
    /// Weights at the centroid of the covered samples.
    pub barycentric: Barycentric,
    /// Interpolated 1/w per sample; only entries in `mask` are meaningful.
    pub depths: [f32; MAX_SAMPLES],
}

impl Fragment {
    /// Interpolates the triangle's attributes at this fragment.
    pub fn interpolate(&self, triangle: &RasterTriangle, modes: &[Interpolation], out: &mut AttributeValues) {
        let [v0, v1, v2] = triangle.vertices();
        interpolate_attributes(
            &self.barycentric,
            modes,
            [
                v0.attributes.as_slice(),
                v1.attributes.as_slice(),
                v2.attributes.as_slice(),
            ],
            out,
        );
    }
}

/// Fragments of one triangle inside one tile.
#[derive(Clone, Debug)]
pub struct TileFragments {
    pub coord: TileCoord,
    pub fragments: Vec<Fragment>,
}

/// Computes coverage and interpolation weights tile by tile.
#[derive(Debug, Clone, Copy)]
pub struct TilingRasterizer {
    pattern: SamplePattern,
    depth_test: bool,
}

impl TilingRasterizer {
    pub fn new(pattern: SamplePattern, depth_test: bool) -> Self {
        Self {
            pattern,
            depth_test,
        }
    }

    pub fn pattern(&self) -> SamplePattern {
        self.pattern
    }

    /// Tiles of `grid` the triangle covers at least one sample of.
    pub fn touched_tiles<'a>(
        &'a self,
        triangle: &'a RasterTriangle,
        grid: &'a TileGrid,
    ) -> impl Iterator<Item = TileCoord> + 'a {
        grid.tiles_overlapping(triangle.texel_bounds())
            .filter(move |&coord| triangle.classify(grid.rect(coord), &self.pattern) != TileClass::Outside)
    }

    /// Coverage of `triangle` in each of `targets` it touches.
    pub fn rasterize(&self, triangle: &RasterTriangle, grid: &TileGrid, targets: &[TileCoord]) -> Vec<TileFragments> {
        targets
            .iter()
            .filter(|&&coord| grid.contains(coord))
            .filter_map(|&coord| {
                let mut fragments = Vec::new();
                self.scan(triangle, grid.rect(coord), |fragment| fragments.push(fragment.clone()));
                (!fragments.is_empty()).then_some(TileFragments { coord, fragments })
            })
            .collect()
    }

    /// Rasterizes `triangles`, in order, into a fresh tile. `shader` must
    /// already be bound to `layout`; [`crate::engine::Baker`] guarantees it.
    pub(crate) fn rasterize_tile<'t, S, I>(
        &self,
        coord: TileCoord,
        rect: TexelRect,
        triangles: I,
        shader: &S,
        layout: &AttributeLayout,
        background: S::Output,
    ) -> BakeResult<TileBuffer<S::Output>>
    where
        S: TexelShader,
        I: IntoIterator<Item = &'t RasterTriangle>,
    {
        let mut samples = SampleBuffer::new(rect.width(), rect.height(), self.pattern.len(), background)?;
        let modes = layout.component_modes();
        let mut values = AttributeValues::new();
        let mut count = 0usize;

        for triangle in triangles {
            count += 1;
            self.scan(triangle, rect, |fragment| {
                let x = (fragment.x - rect.min_x) as u32;
                let y = (fragment.y - rect.min_y) as u32;
                let passed = samples.depth_test(x, y, fragment.mask, &fragment.depths, self.depth_test);
                if passed == 0 {
                    return;
                }
                fragment.interpolate(triangle, modes, &mut values);
                let value = shader.shade(&ShadeInput {
                    x: fragment.x as u32,
                    y: fragment.y as u32,
                    tile: coord,
                    attributes: Attributes::new(layout, &values),
                    barycentric: fragment.barycentric.perspective,
                    inv_w: fragment.barycentric.inv_w,
                    coverage: fragment.coverage,
                });
                samples.write(x, y, passed, &fragment.depths, value);
            });
        }

        trace!("rasterized {} triangles into tile {:?}", count, coord);
        samples.resolve(coord, rect, background)
    }

    /// Visits every texel of `rect` the triangle covers.
    fn scan(&self, triangle: &RasterTriangle, rect: TexelRect, mut visit: impl FnMut(&Fragment)) {
        let region = rect.intersection(&triangle.texel_bounds());
        if region.is_empty() {
            return;
        }
        let class = triangle.classify(region, &self.pattern);
        if class == TileClass::Outside {
            return;
        }

        let edges = triangle.edges();
        let sample_count = self.pattern.len();
        let inv_w = triangle.inv_w();

        for y in region.min_y..region.max_y {
            for x in region.min_x..region.max_x {
                let mut mask: SampleMask = 0;
                let mut sums = [0i64; 3];
                let mut depths = [0.0f32; MAX_SAMPLES];

                for s in 0..sample_count {
                    let w = edges.weights(self.pattern.position(x, y, s));
                    if class == TileClass::Inside || edges.covers(w) {
                        mask |= 1 << s;
                        sums[0] += w[0];
                        sums[1] += w[1];
                        sums[2] += w[2];
                        depths[s] = triangle.depth(w);
                    }
                }

                if mask == 0 {
                    continue;
                }
                let covered = mask.count_ones();
                visit(&Fragment {
                    x,
                    y,
                    mask,
                    coverage: covered as f32 / sample_count as f32,
                    barycentric: Barycentric::from_edge_sums(sums, covered, edges.area(), inv_w),
                    depths,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;
    use crate::mesh::AttributeKind;
    use approx::assert_relative_eq;
    use shader::ConstantShader;

    fn vertex(x: f32, y: f32, value: f32) -> RasterVertex {
        RasterVertex {
            position: FixedPoint::from_raster(Vec2::new(x, y)).unwrap(),
            inv_w: 1.0,
            attributes: SmallVec::from_slice(&[value]),
        }
    }

    fn triangle(points: [(f32, f32); 3]) -> RasterTriangle {
        RasterTriangle::new(points.map(|(x, y)| vertex(x, y, x))).expect("non-degenerate")
    }

    #[test]
    fn winding_is_normalized_and_provoking_vertex_kept() {
        let tri = triangle([(0.0, 0.0), (4.0, 0.0), (0.0, 4.0)]);
        assert_eq!(tri.vertices()[0].position, FixedPoint::new(0, 0));
        assert_eq!(tri.vertices()[1].position, FixedPoint::new(0, 1024));
    }

    #[test]
    fn zero_area_after_snapping_is_rejected() {
        let v = [vertex(1.0, 1.0, 0.0), vertex(1.0001, 1.0, 0.0), vertex(1.0, 1.0001, 0.0)];
        assert!(RasterTriangle::new(v).is_none());
    }

    #[test]
    fn touched_tiles_skip_uncoverable_corner() {
        // The hypotenuse passes near tile (1, 1)'s corner without covering a sample.
        let grid = TileGrid::new(16, 16, 8);
        let rasterizer = TilingRasterizer::new(SamplePattern::SINGLE, true);
        let tri = triangle([(0.0, 0.0), (16.0, 0.0), (0.0, 16.0)]);
        let tiles: Vec<_> = rasterizer.touched_tiles(&tri, &grid).collect();
        assert_eq!(
            tiles,
            vec![TileCoord::new(0, 0), TileCoord::new(0, 1), TileCoord::new(1, 0)]
        );
    }

    #[test]
    fn rasterize_reports_fragments_per_target() {
        let grid = TileGrid::new(16, 16, 8);
        let rasterizer = TilingRasterizer::new(SamplePattern::SINGLE, true);
        let tri = triangle([(0.0, 0.0), (16.0, 0.0), (0.0, 16.0)]);
        let result = rasterizer.rasterize(&tri, &grid, &[TileCoord::new(0, 1), TileCoord::new(1, 1)]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].coord, TileCoord::new(0, 1));
        // Columns 8..16 of rows 0..8 with x + y < 15 strictly inside the hypotenuse.
        let expected: usize = (0..8).map(|y| (8..16).filter(|x| x + y < 15).count()).sum();
        assert_eq!(result[0].fragments.len(), expected);
    }

    #[test]
    fn linear_attribute_matches_screen_position() {
        let layout = AttributeLayout::new().with("x", AttributeKind::Scalar, Interpolation::Linear);
        let grid = TileGrid::new(16, 16, 16);
        let rasterizer = TilingRasterizer::new(SamplePattern::SINGLE, true);
        let tri = triangle([(0.0, 0.0), (16.0, 0.0), (0.0, 16.0)]);
        let result = rasterizer.rasterize(&tri, &grid, &[TileCoord::new(0, 0)]);
        let mut values = AttributeValues::new();
        for fragment in &result[0].fragments {
            fragment.interpolate(&tri, layout.component_modes(), &mut values);
            assert_relative_eq!(values[0], fragment.x as f32 + 0.5, epsilon = 1e-4);
        }
    }

    #[test]
    fn partial_coverage_with_multisampling() {
        let pattern = SamplePattern::for_count(4).unwrap();
        let rasterizer = TilingRasterizer::new(pattern, true);
        // Vertical edge through the middle of texel column 2.
        let tri = triangle([(0.0, 0.0), (0.0, 8.0), (2.5, 8.0)]);
        let tri2 = triangle([(0.0, 0.0), (2.5, 8.0), (2.5, 0.0)]);
        let rect = TexelRect::new(0, 0, 8, 8);
        let layout = AttributeLayout::new();
        let tile = rasterizer
            .rasterize_tile(
                TileCoord::new(0, 0),
                rect,
                [&tri, &tri2],
                &ConstantShader::new(1.0f32),
                &layout,
                0.0,
            )
            .unwrap();
        assert_relative_eq!(tile.get(0, 4).unwrap(), 1.0);
        assert_relative_eq!(tile.get(2, 4).unwrap(), 0.5);
        assert_eq!(tile.get(3, 4), None);
    }
}
