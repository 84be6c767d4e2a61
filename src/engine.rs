//! Bake engine.
//!
//! The [`Baker`] struct is the main entry point. It owns one configuration,
//! one bound shader and one tile cache, and runs the pipeline:
//!
//! 1. Transform and clip every triangle into raster space
//!    ([`VertexPipeline`]).
//! 2. Bin the raster triangles into the tiles they cover, keeping
//!    submission order within each tile.
//! 3. Fetch every touched tile from the cache, rasterizing it on a miss,
//!    and blit it into the output [`Surface`] as soon as it is ready. Tiles
//!    run on the configured executor, so at most one tile per worker is held
//!    outside the cache at any time.
//!
//! Tiles are cached under a [`TileContentKey`] built from the tile
//! coordinate, the raster configuration and the mesh's [`ContentVersion`].
//! The cache does not look at geometry: callers must give each distinct
//! combination of mesh content and transform its own version.

use log::{debug, info};
use parking_lot::Mutex;

use crate::cache::{TileCache, TileSource, TileView};
use crate::concurrent::{Executor, TileExecutor};
use crate::config::BakeConfig;
use crate::error::{BakeError, BakeResult, ConfigError};
use crate::math::Mat4;
use crate::mesh::{AttributeLayout, ContentVersion, Mesh};
use crate::render::rasterizer::edgefunction::TileClass;
use crate::render::rasterizer::sampling::SamplePattern;
use crate::render::rasterizer::shader::TexelShader;
use crate::render::rasterizer::{RasterTriangle, TilingRasterizer};
use crate::render::surface::Surface;
use crate::render::tile::{TileBuffer, TileContentKey, TileCoord, TileGrid};
use crate::render::vertex::{Projected, VertexPipeline};

/// Counters for one bake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BakeStats {
    /// Triangles in the mesh.
    pub triangles_submitted: usize,
    /// Zero-area triangles, skipped.
    pub degenerate: usize,
    /// Triangles entirely outside the clip volume, skipped.
    pub clipped_away: usize,
    /// Raster triangles after clipping.
    pub triangles_rasterized: usize,
    /// Tiles at least one triangle covers.
    pub tiles_touched: usize,
    /// Tiles rasterized by this bake.
    pub tiles_computed: usize,
    /// Tiles served from the cache, including ones another worker computed.
    pub cache_hits: usize,
}

pub struct Baker<S: TexelShader> {
    config: BakeConfig<S::Output>,
    shader: S,
    layout: AttributeLayout,
    grid: TileGrid,
    rasterizer: TilingRasterizer,
    cache: TileCache<S::Output>,
    executor: TileExecutor,
}

impl<S: TexelShader> Baker<S> {
    /// Validates `config`, binds `shader` to `layout` and sets up the cache.
    ///
    /// Every configuration problem is reported here, before anything is
    /// rasterized.
    pub fn new(config: BakeConfig<S::Output>, mut shader: S, layout: &AttributeLayout) -> Result<Self, ConfigError> {
        config.validate()?;
        shader.bind(layout)?;
        let pattern = SamplePattern::for_count(config.samples_per_texel())
            .ok_or(ConfigError::UnsupportedSampleCount(config.samples_per_texel()))?;
        let executor = TileExecutor::from_execution(config.execution())?;

        debug!(
            "baker ready: {}x{} texels, {} px tiles, {} samples, {} byte cache",
            config.width(),
            config.height(),
            config.tile_size(),
            pattern.len(),
            config.cache_budget_bytes()
        );

        Ok(Self {
            grid: TileGrid::new(config.width(), config.height(), config.tile_size()),
            rasterizer: TilingRasterizer::new(pattern, config.depth_test()),
            cache: TileCache::new(config.cache_budget_bytes()),
            layout: layout.clone(),
            config,
            shader,
            executor,
        })
    }

    pub fn config(&self) -> &BakeConfig<S::Output> {
        &self.config
    }

    pub fn shader(&self) -> &S {
        &self.shader
    }

    pub fn layout(&self) -> &AttributeLayout {
        &self.layout
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn cache(&self) -> &TileCache<S::Output> {
        &self.cache
    }

    /// Drops every cached tile of `version`.
    pub fn invalidate(&self, version: ContentVersion) -> usize {
        self.cache.invalidate_version(version)
    }

    /// Cache key of tile `coord` for content `version`.
    pub fn key(&self, coord: TileCoord, version: ContentVersion) -> TileContentKey {
        TileContentKey {
            coord,
            tile_size: self.grid.tile_size(),
            surface_width: self.grid.width(),
            surface_height: self.grid.height(),
            samples: self.rasterizer.pattern().len() as u32,
            version,
        }
    }

    /// Bakes `mesh`, transformed by `mvp`, into a full surface.
    pub fn bake(&self, mesh: &Mesh, mvp: Mat4) -> BakeResult<Surface<S::Output>> {
        self.bake_with_stats(mesh, mvp).map(|(surface, _)| surface)
    }

    pub fn bake_with_stats(&self, mesh: &Mesh, mvp: Mat4) -> BakeResult<(Surface<S::Output>, BakeStats)> {
        let mut stats = BakeStats::default();
        let triangles = self.prepare(mesh, mvp, &mut stats)?;

        let mut bins: Vec<Vec<u32>> = vec![Vec::new(); self.grid.tile_count()];
        for (index, triangle) in triangles.iter().enumerate() {
            for coord in self.rasterizer.touched_tiles(triangle, &self.grid) {
                bins[self.grid.index(coord)].push(index as u32);
            }
        }
        let touched: Vec<TileCoord> = self
            .grid
            .coords()
            .filter(|&coord| !bins[self.grid.index(coord)].is_empty())
            .collect();
        stats.tiles_touched = touched.len();

        let background = self.config.background();
        let surface = Mutex::new(Surface::new(self.config.width(), self.config.height(), background)?);
        let results = self.executor.build_vector(touched.len(), |i| -> BakeResult<TileSource> {
            let coord = touched[i];
            let bin = &bins[self.grid.index(coord)];
            let (tile, source) = self.cache.get_or_compute(self.key(coord, mesh.version()), || {
                self.rasterizer.rasterize_tile(
                    coord,
                    self.grid.rect(coord),
                    bin.iter().map(|&t| &triangles[t as usize]),
                    &self.shader,
                    &self.layout,
                    background,
                )
            })?;
            surface.lock().blit(&tile);
            Ok(source)
        });

        for source in results {
            match source? {
                TileSource::Computed => stats.tiles_computed += 1,
                TileSource::Cached | TileSource::Shared => stats.cache_hits += 1,
            }
        }
        let surface = surface.into_inner();

        info!(
            "baked `{}` into {}x{}: {} triangles ({} degenerate, {} clipped away), {} tiles ({} computed, {} cached)",
            mesh.name(),
            surface.width(),
            surface.height(),
            stats.triangles_submitted,
            stats.degenerate,
            stats.clipped_away,
            stats.tiles_touched,
            stats.tiles_computed,
            stats.cache_hits
        );
        Ok((surface, stats))
    }

    /// Rasterizes a single tile without consulting or filling the cache.
    pub fn rasterize_tile(&self, coord: TileCoord, mesh: &Mesh, mvp: Mat4) -> BakeResult<TileBuffer<S::Output>> {
        self.check_coord(coord)?;
        let mut stats = BakeStats::default();
        let triangles = self.prepare(mesh, mvp, &mut stats)?;
        self.rasterize_prepared(coord, &triangles)
    }

    /// The cached tile at `coord`, computing it on a miss.
    pub fn tile(&self, coord: TileCoord, mesh: &Mesh, mvp: Mat4) -> BakeResult<TileView<S::Output>> {
        self.check_coord(coord)?;
        let key = self.key(coord, mesh.version());
        let (tile, _) = self.cache.get_or_compute(key, || {
            let mut stats = BakeStats::default();
            let triangles = self.prepare(mesh, mvp, &mut stats)?;
            self.rasterize_prepared(coord, &triangles)
        })?;
        Ok(tile)
    }

    fn check_coord(&self, coord: TileCoord) -> BakeResult<()> {
        if self.grid.contains(coord) {
            Ok(())
        } else {
            Err(BakeError::TileOutOfBounds {
                coord,
                cols: self.grid.cols(),
                rows: self.grid.rows(),
            })
        }
    }

    fn rasterize_prepared(&self, coord: TileCoord, triangles: &[RasterTriangle]) -> BakeResult<TileBuffer<S::Output>> {
        let rect = self.grid.rect(coord);
        let pattern = self.rasterizer.pattern();
        self.rasterizer.rasterize_tile(
            coord,
            rect,
            triangles
                .iter()
                .filter(|triangle| triangle.classify(rect, &pattern) != TileClass::Outside),
            &self.shader,
            &self.layout,
            self.config.background(),
        )
    }

    /// Transform pipeline over every face of `mesh`.
    fn prepare(&self, mesh: &Mesh, mvp: Mat4, stats: &mut BakeStats) -> BakeResult<Vec<RasterTriangle>> {
        if mesh.layout() != &self.layout {
            return Err(ConfigError::LayoutMismatch {
                mesh: mesh.name().to_string(),
            }
            .into());
        }
        let pipeline = VertexPipeline::new(mvp, self.grid.width(), self.grid.height(), &self.layout);
        let mut triangles = Vec::new();
        triangles
            .try_reserve(mesh.triangle_count())
            .map_err(|_| BakeError::OutOfMemory {
                bytes: mesh
                    .triangle_count()
                    .saturating_mul(std::mem::size_of::<RasterTriangle>()),
            })?;

        for triangle in mesh.triangles() {
            stats.triangles_submitted += 1;
            match pipeline.project(triangle, &mut triangles) {
                Projected::Rasterizable(_) => {}
                Projected::Degenerate => stats.degenerate += 1,
                Projected::ClippedAway => stats.clipped_away += 1,
            }
        }
        stats.triangles_rasterized = triangles.len();
        debug!(
            "prepared {} raster triangles from {} faces of `{}`",
            triangles.len(),
            stats.triangles_submitted,
            mesh.name()
        );
        Ok(triangles)
    }
}
