//! Small linear-algebra toolkit used by the bake pipeline.
//!
//! Everything is `f32`; the rasterizer switches to fixed point once vertices
//! reach raster space (see [`crate::render::rasterizer`]).

pub mod mat4;
pub mod vec2;
pub mod vec3;
pub mod vec4;

pub use mat4::Mat4;
pub use vec2::Vec2;
pub use vec3::Vec3;
pub use vec4::Vec4;

/// Tolerance for every degeneracy test on floating-point geometry
/// (zero-area triangles, singular matrices, parallel rays, duplicate clip vertices).
pub const EPSILON: f32 = 1e-6;
