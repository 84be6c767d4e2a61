//! A tiled CPU rasterizer that bakes per-texel surface data from triangle
//! meshes.
//!
//! Triangles are transformed and clipped into raster space, binned into
//! fixed-size tiles, and rasterized with fixed-point edge functions under the
//! top-left fill rule. A [`TexelShader`] turns interpolated vertex attributes
//! into texel values. Finished tiles live in a memory-bounded [`TileCache`]
//! so repeated bakes of unchanged content skip rasterization.
//!
//! # Quick Start
//!
//! ```ignore
//! use tilebake::prelude::*;
//!
//! let mesh = Mesh::load_obj("model.obj")?.remove(0).uv_unwrapped("uv")?;
//! let mut config = BakeConfig::new(1024, 1024, Vec4::ZERO);
//! config.set_samples_per_texel(4);
//! let baker = Baker::new(config, MaterialShader::normal(), mesh.layout())?;
//! let surface = baker.bake(&mesh, Projection::texture_space().matrix())?;
//! ```

pub mod cache;
pub mod clipper;
pub mod concurrent;
pub mod config;
pub mod engine;
pub mod error;
pub mod math;
pub mod mesh;
pub mod primitives;
pub mod projection;
pub mod render;
pub mod texture;
pub mod transform;

pub use cache::{CacheStats, TileCache, TileSource, TileView};
pub use config::{BakeConfig, Execution};
pub use engine::{BakeStats, Baker};
pub use error::{BakeError, BakeResult, ConfigError};
pub use mesh::{AttributeKind, AttributeLayout, ContentVersion, Interpolation, Mesh, MeshError};
pub use projection::Projection;
pub use render::{Surface, TexelShader, TileBuffer, TileCoord};
pub use transform::Transform;

/// Prelude module for convenient imports.
///
/// # Example
/// ```ignore
/// use tilebake::prelude::*;
/// ```
pub mod prelude {
    // Engine
    pub use crate::config::{BakeConfig, Execution};
    pub use crate::engine::{BakeStats, Baker};
    pub use crate::error::{BakeError, BakeResult, ConfigError};

    // Geometry
    pub use crate::mesh::{AttributeKind, AttributeLayout, ContentVersion, Interpolation, Mesh};
    pub use crate::projection::Projection;
    pub use crate::transform::Transform;

    // Math
    pub use crate::math::{Mat4, Vec2, Vec3, Vec4};

    // Shading
    pub use crate::render::rasterizer::shader::{
        AttributeShader, ConstantShader, FnShader, GouraudShader, MaterialShader, NormalShader,
        ShadeInput, TexelShader, TextureShader,
    };
    pub use crate::texture::{save_png, Texture};

    // Output
    pub use crate::cache::{TileCache, TileView};
    pub use crate::render::{Surface, TileBuffer, TileCoord};
}
