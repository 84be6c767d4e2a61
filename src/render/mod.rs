//! Rasterization pipeline: vertex processing, tiling, per-sample storage
//! and the assembled output surface.

pub mod framebuffer;
pub mod rasterizer;
pub mod surface;
pub mod tile;
pub mod vertex;

pub use framebuffer::SampleBuffer;
pub use rasterizer::shader::{Attributes, ShadeInput, TexelShader};
pub use rasterizer::{RasterTriangle, RasterVertex, TilingRasterizer};
pub use surface::Surface;
pub use tile::{TileBuffer, TileContentKey, TileCoord, TileGrid};
pub use vertex::{Projected, VertexPipeline};
