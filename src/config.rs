//! Bake configuration.
//!
//! Provides [`BakeConfig`] with a fluent API in the style of
//! [`crate::transform::Transform`]:
//!
//! ```ignore
//! let mut config = BakeConfig::new(1024, 1024, 0.0f32);
//! config
//!     .set_tile_size(32)
//!     .set_samples_per_texel(4)
//!     .set_cache_budget_bytes(16 << 20);
//! config.validate()?;
//! ```

use crate::error::ConfigError;
use crate::render::rasterizer::sampling::SamplePattern;

pub const DEFAULT_TILE_SIZE: u32 = 64;
pub const MAX_TILE_SIZE: u32 = 1024;
pub const MAX_SURFACE_SIZE: u32 = 16384;
pub const DEFAULT_CACHE_BUDGET_BYTES: usize = 64 * 1024 * 1024;

/// How tiles are dispatched to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// Tiles are computed one after another on the calling thread.
    Sequential,
    /// Tiles are computed on a rayon pool. `None` uses the global pool.
    Parallel { threads: Option<usize> },
}

impl Default for Execution {
    fn default() -> Self {
        Execution::Parallel { threads: None }
    }
}

/// Options for one bake run.
///
/// `T` is the texel type produced by the shader; `background` fills every
/// texel no triangle covers.
#[derive(Debug, Clone, PartialEq)]
pub struct BakeConfig<T> {
    width: u32,
    height: u32,
    background: T,
    tile_size: u32,
    cache_budget_bytes: usize,
    samples_per_texel: u32,
    depth_test: bool,
    execution: Execution,
}

impl<T: Copy> BakeConfig<T> {
    /// Create a configuration for a `width` x `height` surface with default
    /// tiling, a single sample per texel and a 64 MiB cache.
    pub fn new(width: u32, height: u32, background: T) -> Self {
        Self {
            width,
            height,
            background,
            tile_size: DEFAULT_TILE_SIZE,
            cache_budget_bytes: DEFAULT_CACHE_BUDGET_BYTES,
            samples_per_texel: 1,
            depth_test: true,
            execution: Execution::default(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn background(&self) -> T {
        self.background
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn cache_budget_bytes(&self) -> usize {
        self.cache_budget_bytes
    }

    pub fn samples_per_texel(&self) -> u32 {
        self.samples_per_texel
    }

    pub fn depth_test(&self) -> bool {
        self.depth_test
    }

    pub fn execution(&self) -> Execution {
        self.execution
    }

    pub fn set_surface_size(&mut self, width: u32, height: u32) -> &mut Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn set_background(&mut self, background: T) -> &mut Self {
        self.background = background;
        self
    }

    pub fn set_tile_size(&mut self, tile_size: u32) -> &mut Self {
        self.tile_size = tile_size;
        self
    }

    pub fn set_cache_budget_bytes(&mut self, bytes: usize) -> &mut Self {
        self.cache_budget_bytes = bytes;
        self
    }

    pub fn set_samples_per_texel(&mut self, samples: u32) -> &mut Self {
        self.samples_per_texel = samples;
        self
    }

    pub fn set_depth_test(&mut self, enabled: bool) -> &mut Self {
        self.depth_test = enabled;
        self
    }

    pub fn set_execution(&mut self, execution: Execution) -> &mut Self {
        self.execution = execution;
        self
    }

    /// Check every option. Called by [`crate::engine::Baker::new`] before
    /// anything is rasterized.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size == 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(ConfigError::InvalidTileSize {
                size: self.tile_size,
                max: MAX_TILE_SIZE,
            });
        }
        if self.cache_budget_bytes == 0 {
            return Err(ConfigError::ZeroCacheBudget);
        }
        if SamplePattern::for_count(self.samples_per_texel).is_none() {
            return Err(ConfigError::UnsupportedSampleCount(self.samples_per_texel));
        }
        let valid_side = |side: u32| (1..=MAX_SURFACE_SIZE).contains(&side);
        if !valid_side(self.width) || !valid_side(self.height) {
            return Err(ConfigError::InvalidSurfaceSize {
                width: self.width,
                height: self.height,
                max: MAX_SURFACE_SIZE,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = BakeConfig::new(256, 128, 0.0f32);
        assert_eq!(config.tile_size(), DEFAULT_TILE_SIZE);
        assert_eq!(config.samples_per_texel(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn fluent_setters_chain() {
        let mut config = BakeConfig::new(64, 64, 0.0f32);
        config
            .set_tile_size(16)
            .set_samples_per_texel(4)
            .set_execution(Execution::Sequential);
        assert_eq!(config.tile_size(), 16);
        assert_eq!(config.samples_per_texel(), 4);
        assert_eq!(config.execution(), Execution::Sequential);
    }

    #[test]
    fn rejects_zero_tile_size() {
        let mut config = BakeConfig::new(64, 64, 0.0f32);
        config.set_tile_size(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidTileSize {
                size: 0,
                max: MAX_TILE_SIZE
            })
        );
    }

    #[test]
    fn rejects_zero_budget() {
        let mut config = BakeConfig::new(64, 64, 0.0f32);
        config.set_cache_budget_bytes(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroCacheBudget));
    }

    #[test]
    fn rejects_odd_sample_counts() {
        let mut config = BakeConfig::new(64, 64, 0.0f32);
        config.set_samples_per_texel(3);
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnsupportedSampleCount(3))
        );
    }

    #[test]
    fn rejects_empty_surface() {
        let config = BakeConfig::new(0, 64, 0.0f32);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSurfaceSize { width: 0, .. })
        ));
    }
}
