//! The assembled output surface.

use crate::error::{try_filled_vec, BakeResult};
use crate::render::tile::TileBuffer;

/// Dense `width` x `height` raster of baked texels with a coverage mask.
///
/// Tiles are composited with [`Surface::blit`] in any order; only their
/// valid texels are copied.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface<T> {
    width: u32,
    height: u32,
    background: T,
    texels: Vec<T>,
    mask: Vec<bool>,
}

impl<T: Copy> Surface<T> {
    /// Allocates a surface filled with `background`.
    pub fn new(width: u32, height: u32, background: T) -> BakeResult<Self> {
        let len = width as usize * height as usize;
        Ok(Self {
            width,
            height,
            background,
            texels: try_filled_vec(len, background)?,
            mask: try_filled_vec(len, false)?,
        })
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

    pub fn texels(&self) -> &[T] {
        &self.texels
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Resets every texel to the background.
    pub fn clear(&mut self) {
        self.texels.fill(self.background);
        self.mask.fill(false);
    }

    /// Copies the valid texels of `tile` to its position on this surface.
    /// Invalid tile texels leave the destination untouched; parts of the
    /// tile outside the surface are ignored.
    pub fn blit(&mut self, tile: &TileBuffer<T>) {
        let (origin_x, origin_y) = tile.origin();
        let width = tile.width().min(self.width.saturating_sub(origin_x));
        let height = tile.height().min(self.height.saturating_sub(origin_y));

        for y in 0..height {
            let src = (y * tile.width()) as usize;
            let dst = ((origin_y + y) * self.width + origin_x) as usize;
            let src_texels = &tile.texels()[src..src + width as usize];
            let src_mask = &tile.mask()[src..src + width as usize];
            for (x, (&value, &valid)) in src_texels.iter().zip(src_mask).enumerate() {
                if valid {
                    self.texels[dst + x] = value;
                    self.mask[dst + x] = true;
                }
            }
        }
    }

    /// Copies the covered texels of a same-sized `other` onto this surface.
    /// Returns `false` without copying when the sizes differ.
    pub fn composite(&mut self, other: &Surface<T>) -> bool {
        if other.width != self.width || other.height != self.height {
            return false;
        }
        for (i, &covered) in other.mask.iter().enumerate() {
            if covered {
                self.texels[i] = other.texels[i];
                self.mask[i] = true;
            }
        }
        true
    }

    /// Value at `(x, y)`, background included, or `None` outside the surface.
    pub fn get(&self, x: u32, y: u32) -> Option<T> {
        (x < self.width && y < self.height).then(|| self.texels[(y * self.width + x) as usize])
    }

    /// Writes one texel and marks it covered. Out-of-range writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, value: T) {
        if x < self.width && y < self.height {
            let i = (y * self.width + x) as usize;
            self.texels[i] = value;
            self.mask[i] = true;
        }
    }

    pub fn is_covered(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.mask[(y * self.width + x) as usize]
    }

    pub fn covered_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Rows of texels, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        self.texels.chunks_exact(self.width.max(1) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::TexelRect;
    use crate::render::tile::TileCoord;

    fn tile_with_diagonal(coord: TileCoord, rect: TexelRect) -> TileBuffer<f32> {
        let n = rect.area();
        let width = rect.width() as usize;
        let mask: Vec<bool> = (0..n).map(|i| i % width == i / width).collect();
        TileBuffer::from_parts(coord, rect, vec![9.0; n], mask)
    }

    #[test]
    fn blit_copies_only_valid_texels() {
        let mut surface = Surface::new(8, 8, 1.0f32).unwrap();
        surface.blit(&tile_with_diagonal(TileCoord::new(1, 1), TexelRect::new(4, 4, 8, 8)));
        assert_eq!(surface.get(5, 5), Some(9.0));
        assert_eq!(surface.get(6, 5), Some(1.0));
        assert!(!surface.is_covered(6, 5));
        assert_eq!(surface.covered_count(), 4);
    }

    #[test]
    fn blit_keeps_earlier_texels_under_invalid_ones() {
        let mut surface = Surface::new(4, 4, 0.0f32).unwrap();
        let full = TileBuffer::from_parts(TileCoord::new(0, 0), TexelRect::new(0, 0, 4, 4), vec![2.0; 16], vec![true; 16]);
        surface.blit(&full);
        surface.blit(&tile_with_diagonal(TileCoord::new(0, 0), TexelRect::new(0, 0, 4, 4)));
        assert_eq!(surface.get(1, 0), Some(2.0));
        assert_eq!(surface.get(1, 1), Some(9.0));
    }

    #[test]
    fn clear_restores_background() {
        let mut surface = Surface::new(4, 4, 0.0f32).unwrap();
        surface.blit(&tile_with_diagonal(TileCoord::new(0, 0), TexelRect::new(0, 0, 4, 4)));
        surface.clear();
        assert_eq!(surface.covered_count(), 0);
        assert!(surface.rows().all(|row| row.iter().all(|&v| v == 0.0)));
        assert_eq!(surface.get(4, 0), None);
    }

    #[test]
    fn composite_copies_covered_texels() {
        let mut below = Surface::new(4, 4, 0.0f32).unwrap();
        below.set(0, 0, 5.0);
        below.set(1, 0, 5.0);
        let mut above = Surface::new(4, 4, 0.0f32).unwrap();
        above.set(1, 0, 7.0);
        assert!(below.composite(&above));
        assert_eq!(below.get(0, 0), Some(5.0));
        assert_eq!(below.get(1, 0), Some(7.0));
        assert_eq!(below.covered_count(), 2);
        assert!(!below.composite(&Surface::new(2, 2, 0.0f32).unwrap()));
    }
}
