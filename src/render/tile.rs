//! Tiles: grid addressing, cache identity, and per-tile texel storage.

use crate::error::{try_filled_vec, BakeResult};
use crate::mesh::ContentVersion;
use crate::primitives::TexelRect;

/// Row and column of a tile in a [`TileGrid`].
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct TileCoord {
    pub row: u32,
    pub col: u32,
}

impl TileCoord {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// Cache identity of a tile.
///
/// Two requests with equal keys must describe the same content: the cache
/// compares keys only. Callers bump `version` whenever the geometry, the
/// transform, or the shader inputs change.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct TileContentKey {
    pub coord: TileCoord,
    pub tile_size: u32,
    pub surface_width: u32,
    pub surface_height: u32,
    pub samples: u32,
    pub version: ContentVersion,
}

/// Division of a `width` x `height` surface into square tiles. Tiles on the
/// right and bottom edges are clipped to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_size: u32,
    cols: u32,
    rows: u32,
}

impl TileGrid {
    /// `tile_size` must be non-zero; [`crate::config::BakeConfig::validate`]
    /// guarantees it for grids built by the baker.
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        let tile_size = tile_size.max(1);
        Self {
            width,
            height,
            tile_size,
            cols: width.div_ceil(tile_size),
            rows: height.div_ceil(tile_size),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn tile_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        coord.row < self.rows && coord.col < self.cols
    }

    /// Row-major index of `coord`.
    pub fn index(&self, coord: TileCoord) -> usize {
        coord.row as usize * self.cols as usize + coord.col as usize
    }

    pub fn coord_at(&self, index: usize) -> TileCoord {
        let cols = self.cols.max(1) as usize;
        TileCoord::new((index / cols) as u32, (index % cols) as u32)
    }

    /// Every tile, row by row.
    pub fn coords(&self) -> impl Iterator<Item = TileCoord> {
        let cols = self.cols;
        (0..self.rows).flat_map(move |row| (0..cols).map(move |col| TileCoord::new(row, col)))
    }

    /// Surface texels covered by `coord`.
    pub fn rect(&self, coord: TileCoord) -> TexelRect {
        let x = coord.col * self.tile_size;
        let y = coord.row * self.tile_size;
        TexelRect::new(
            x as i32,
            y as i32,
            (x + self.tile_size).min(self.width) as i32,
            (y + self.tile_size).min(self.height) as i32,
        )
    }

    /// Tiles overlapping `rect`, clamped to the grid.
    pub fn tiles_overlapping(&self, rect: TexelRect) -> impl Iterator<Item = TileCoord> {
        let surface = TexelRect::new(0, 0, self.width as i32, self.height as i32);
        let clipped = rect.intersection(&surface);
        let size = self.tile_size as i32;
        let (cols, rows) = if clipped.is_empty() {
            (0..0, 0..0)
        } else {
            (
                (clipped.min_x / size) as u32..((clipped.max_x - 1) / size + 1) as u32,
                (clipped.min_y / size) as u32..((clipped.max_y - 1) / size + 1) as u32,
            )
        };
        rows.flat_map(move |row| cols.clone().map(move |col| TileCoord::new(row, col)))
    }
}

/// Texels of one computed tile plus its coverage mask.
///
/// Texels no triangle covers hold the background value and are marked
/// invalid.
#[derive(Debug, Clone, PartialEq)]
pub struct TileBuffer<T> {
    coord: TileCoord,
    rect: TexelRect,
    texels: Vec<T>,
    mask: Vec<bool>,
}

impl<T: Copy> TileBuffer<T> {
    /// An empty tile: every texel is `background` and invalid.
    pub fn new(coord: TileCoord, rect: TexelRect, background: T) -> BakeResult<Self> {
        let len = rect.area();
        Ok(Self {
            coord,
            rect,
            texels: try_filled_vec(len, background)?,
            mask: try_filled_vec(len, false)?,
        })
    }

    pub(crate) fn from_parts(coord: TileCoord, rect: TexelRect, texels: Vec<T>, mask: Vec<bool>) -> Self {
        debug_assert_eq!(texels.len(), rect.area());
        debug_assert_eq!(mask.len(), rect.area());
        Self {
            coord,
            rect,
            texels,
            mask,
        }
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    /// Surface texels this tile covers.
    pub fn rect(&self) -> TexelRect {
        self.rect
    }

    /// Surface position of the tile's top-left texel.
    pub fn origin(&self) -> (u32, u32) {
        (self.rect.min_x as u32, self.rect.min_y as u32)
    }

    pub fn width(&self) -> u32 {
        self.rect.width()
    }

    pub fn height(&self) -> u32 {
        self.rect.height()
    }

    pub fn texels(&self) -> &[T] {
        &self.texels
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width() && y < self.height()).then(|| (y * self.width() + x) as usize)
    }

    /// Value at tile-local `(x, y)` if a triangle covers it.
    pub fn get(&self, x: u32, y: u32) -> Option<T> {
        self.offset(x, y)
            .filter(|&i| self.mask[i])
            .map(|i| self.texels[i])
    }

    /// Stored value at tile-local `(x, y)`, background included.
    pub fn texel(&self, x: u32, y: u32) -> Option<T> {
        self.offset(x, y).map(|i| self.texels[i])
    }

    pub fn is_covered(&self, x: u32, y: u32) -> bool {
        self.offset(x, y).map_or(false, |i| self.mask[i])
    }

    pub fn covered_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Memory charged against the cache budget.
    pub fn byte_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.texels.len() * std::mem::size_of::<T>()
            + self.mask.len() * std::mem::size_of::<bool>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_tiles_are_clipped() {
        let grid = TileGrid::new(100, 40, 32);
        assert_eq!((grid.cols(), grid.rows()), (4, 2));
        assert_eq!(grid.rect(TileCoord::new(1, 3)), TexelRect::new(96, 32, 100, 40));
        assert_eq!(grid.coords().count(), grid.tile_count());
    }

    #[test]
    fn index_roundtrip() {
        let grid = TileGrid::new(100, 40, 32);
        for coord in grid.coords() {
            assert_eq!(grid.coord_at(grid.index(coord)), coord);
        }
    }

    #[test]
    fn overlapping_tiles_are_clamped_to_grid() {
        let grid = TileGrid::new(64, 64, 16);
        let tiles: Vec<_> = grid.tiles_overlapping(TexelRect::new(-5, 10, 17, 100)).collect();
        assert_eq!(tiles.len(), 2 * 4);
        assert!(tiles.contains(&TileCoord::new(3, 1)));
        assert!(!tiles.contains(&TileCoord::new(0, 2)));
        assert_eq!(grid.tiles_overlapping(TexelRect::new(70, 0, 80, 10)).count(), 0);
    }

    #[test]
    fn new_tile_is_background_and_invalid() {
        let tile = TileBuffer::new(TileCoord::new(0, 1), TexelRect::new(8, 0, 16, 8), 0.5f32).unwrap();
        assert_eq!(tile.origin(), (8, 0));
        assert_eq!(tile.texel(7, 7), Some(0.5));
        assert_eq!(tile.get(7, 7), None);
        assert_eq!(tile.texel(8, 0), None);
        assert_eq!(tile.covered_count(), 0);
        assert!(tile.byte_size() >= 64 * 5);
    }
}
