//! Transform pipeline: object space to raster space.
//!
//! ```text
//! object --mvp--> clip --clip cube--> NDC (/w) --viewport--> raster (y down)
//! ```
//!
//! Each raster vertex keeps `1 / w` for perspective-correct interpolation.
//! Zero-area triangles, before or after snapping, are dropped and reported as
//! [`Projected::Degenerate`].

use smallvec::SmallVec;

use crate::clipper::clip_space::{ClipSpaceClipper, ClipSpaceVertex, Clipped, INLINE_ATTRIBUTES};
use crate::math::{Mat4, Vec2, Vec3, Vec4, EPSILON};
use crate::mesh::{AttributeLayout, Interpolation, Triangle, Vertex};
use crate::primitives::Ray;
use crate::render::rasterizer::edgefunction::FixedPoint;
use crate::render::rasterizer::{RasterTriangle, RasterVertex};

/// What became of one submitted triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projected {
    /// This many raster triangles were produced.
    Rasterizable(usize),
    /// Zero area in raster space.
    Degenerate,
    /// Entirely outside the clip volume.
    ClippedAway,
}

#[derive(Debug, Clone)]
pub struct VertexPipeline {
    mvp: Mat4,
    width: u32,
    height: u32,
    modes: Vec<Interpolation>,
    clipper: ClipSpaceClipper,
}

impl VertexPipeline {
    pub fn new(mvp: Mat4, width: u32, height: u32, layout: &AttributeLayout) -> Self {
        Self {
            mvp,
            width,
            height,
            modes: layout.component_modes().to_vec(),
            clipper: ClipSpaceClipper::new(),
        }
    }

    pub fn mvp(&self) -> Mat4 {
        self.mvp
    }

    pub fn to_clip(&self, vertex: &Vertex) -> ClipSpaceVertex {
        ClipSpaceVertex::new(self.mvp * Vec4::from(vertex.position), vertex.values())
    }

    /// Perspective divide and viewport mapping. `None` if `w` is not positive.
    pub fn to_raster(&self, vertex: &ClipSpaceVertex) -> Option<RasterVertex> {
        let p = vertex.position;
        if p.w <= EPSILON {
            return None;
        }
        let inv_w = 1.0 / p.w;
        let raster = Vec2::new(
            (p.x * inv_w + 1.0) * 0.5 * self.width as f32,
            (1.0 - p.y * inv_w) * 0.5 * self.height as f32,
        );
        Some(RasterVertex {
            position: FixedPoint::from_raster(raster)?,
            inv_w,
            attributes: vertex.attributes.clone(),
        })
    }

    /// Transforms, clips and sets up one triangle, appending the results to
    /// `out` in fan order.
    pub fn project(&self, triangle: Triangle<'_>, out: &mut Vec<RasterTriangle>) -> Projected {
        let clip = triangle.vertices.map(|v| self.to_clip(v));
        let before = out.len();

        match self.clipper.clip_triangle([&clip[0], &clip[1], &clip[2]], &self.modes) {
            Clipped::Rejected => return Projected::ClippedAway,
            Clipped::Unclipped => self.emit([&clip[0], &clip[1], &clip[2]], None, out),
            Clipped::Polygon(polygon) => {
                if polygon.is_empty() {
                    return Projected::ClippedAway;
                }
                for corners in polygon.triangulate() {
                    self.emit(corners, Some(clip[0].attributes.as_slice()), out);
                }
            }
        }

        match out.len() - before {
            0 => Projected::Degenerate,
            n => Projected::Rasterizable(n),
        }
    }

    fn emit(&self, corners: [&ClipSpaceVertex; 3], provoking: Option<&[f32]>, out: &mut Vec<RasterTriangle>) {
        let [a, b, c] = corners;
        let (Some(mut a), Some(mut b), Some(mut c)) = (self.to_raster(a), self.to_raster(b), self.to_raster(c)) else {
            return;
        };
        if let Some(provoking) = provoking {
            for v in [&mut a, &mut b, &mut c] {
                restore_flat(&mut v.attributes, provoking, &self.modes);
            }
        }
        if let Some(triangle) = RasterTriangle::new([a, b, c]) {
            out.push(triangle);
        }
    }

    /// Object-space ray through the raster point `(x, y)`, from the near
    /// plane toward the far plane. `None` if the transform is singular.
    pub fn unproject_ray(&self, x: f32, y: f32) -> Option<Ray> {
        let inverse = self.mvp.inverse()?;
        let ndc_x = 2.0 * x / self.width as f32 - 1.0;
        let ndc_y = 1.0 - 2.0 * y / self.height as f32;
        let near = inverse * Vec3::new(ndc_x, ndc_y, -1.0);
        let far = inverse * Vec3::new(ndc_x, ndc_y, 1.0);
        Some(Ray::through(near, far))
    }
}

/// Clipping may have moved flat components off the provoking vertex's value.
fn restore_flat(attributes: &mut SmallVec<[f32; INLINE_ATTRIBUTES]>, provoking: &[f32], modes: &[Interpolation]) {
    for ((value, &source), mode) in attributes.iter_mut().zip(provoking).zip(modes) {
        if *mode == Interpolation::Flat {
            *value = source;
        }
    }
}
