//! Polygon clipping in homogeneous clip space.
//!
//! Triangles are clipped against the canonical clip cube with the
//! Sutherland-Hodgman algorithm before the perspective divide. Clipping
//! against the near plane guarantees `w > 0` for every vertex that reaches
//! raster space; the side planes bound raster coordinates to the surface so
//! the fixed-point rasterizer never overflows.

pub mod clip_space;

pub use clip_space::{ClipPlane, ClipSpaceClipper, ClipSpacePolygon, ClipSpaceVertex};
