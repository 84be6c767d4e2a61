//! Error types for the bake pipeline.
//!
//! Geometry anomalies (zero-area or fully clipped triangles) are not errors;
//! they are skipped and counted in [`crate::engine::BakeStats`].

use thiserror::Error;

use crate::mesh::AttributeKind;
use crate::render::tile::TileCoord;

/// Result type for bake operations
pub type BakeResult<T> = Result<T, BakeError>;

/// Setup problems detected before any rasterization begins.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("tile size must be between 1 and {max} texels, got {size}")]
    InvalidTileSize { size: u32, max: u32 },

    #[error("cache budget must be greater than zero bytes")]
    ZeroCacheBudget,

    #[error("unsupported sample count {0}; expected 1, 2, 4, 8 or 16")]
    UnsupportedSampleCount(u32),

    #[error("surface size {width}x{height} is outside 1..={max} texels per side")]
    InvalidSurfaceSize { width: u32, height: u32, max: u32 },

    #[error("shader requires attribute `{name}` which the mesh does not provide")]
    MissingAttribute { name: String },

    #[error("attribute `{name}` is {found:?}, shader expects {expected:?}")]
    AttributeKindMismatch {
        name: String,
        expected: AttributeKind,
        found: AttributeKind,
    },

    #[error("mesh `{mesh}` has a different attribute layout than the baker was configured with")]
    LayoutMismatch { mesh: String },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Errors that abort a bake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BakeError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("out of memory allocating {bytes} bytes")]
    OutOfMemory { bytes: usize },

    #[error("tile {coord:?} is outside the {cols}x{rows} tile grid")]
    TileOutOfBounds { coord: TileCoord, cols: u32, rows: u32 },
}

/// Allocates a vector of `len` copies of `value`, reporting allocation
/// failure instead of aborting the process.
pub(crate) fn try_filled_vec<T: Clone>(len: usize, value: T) -> BakeResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| BakeError::OutOfMemory {
        bytes: len.saturating_mul(std::mem::size_of::<T>()),
    })?;
    v.resize(len, value);
    Ok(v)
}
