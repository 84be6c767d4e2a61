//! Per-tile sample storage used while a tile is being rasterized.
//!
//! Every texel holds one value and one depth per sample of the active
//! [`SamplePattern`](super::rasterizer::sampling::SamplePattern), plus a bit
//! mask of the samples some triangle has written.
//!
//! # Depth Buffer
//!
//! The depth buffer stores 1/w values (reciprocal of clip-space W) for each
//! sample. Using 1/w instead of z because it can be linearly interpolated in
//! screen space. Larger values are closer to the camera.

use crate::error::{try_filled_vec, BakeResult};
use crate::primitives::TexelRect;
use crate::render::rasterizer::shader::Texel;
use crate::render::tile::{TileBuffer, TileCoord};

/// Bit `i` set means sample `i`.
pub type SampleMask = u16;

pub struct SampleBuffer<T> {
    color_buffer: Vec<T>,
    depth_buffer: Vec<f32>,
    written: Vec<SampleMask>,
    width: u32,
    height: u32,
    samples: usize,
}

impl<T: Texel> SampleBuffer<T> {
    pub fn new(width: u32, height: u32, samples: usize, background: T) -> BakeResult<Self> {
        let texels = width as usize * height as usize;
        let len = texels.saturating_mul(samples);
        Ok(Self {
            color_buffer: try_filled_vec(len, background)?,
            depth_buffer: try_filled_vec(len, 0.0)?,
            written: try_filled_vec(texels, 0)?,
            width,
            height,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn texel_index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    /// Samples of `mask` that a fragment with per-sample `depths` may write.
    ///
    /// With depth testing a sample passes only if it was never written or
    /// the new depth is strictly greater, so ties keep the earlier triangle.
    #[inline]
    pub fn depth_test(&self, x: u32, y: u32, mask: SampleMask, depths: &[f32], depth_test: bool) -> SampleMask {
        if !depth_test {
            return mask;
        }
        let texel = self.texel_index(x, y);
        let written = self.written[texel];
        let base = texel * self.samples;
        (0..self.samples)
            .filter(|&s| mask & (1 << s) != 0)
            .filter(|&s| written & (1 << s) == 0 || depths[s] > self.depth_buffer[base + s])
            .fold(0, |passed, s| passed | (1 << s))
    }

    /// Stores `value` and the matching depth into every sample of `mask`.
    #[inline]
    pub fn write(&mut self, x: u32, y: u32, mask: SampleMask, depths: &[f32], value: T) {
        let texel = self.texel_index(x, y);
        let base = texel * self.samples;
        for s in (0..self.samples).filter(|&s| mask & (1 << s) != 0) {
            self.color_buffer[base + s] = value;
            self.depth_buffer[base + s] = depths[s];
        }
        self.written[texel] |= mask;
    }

    /// Get the value of one sample, or None if out of bounds.
    pub fn get_sample(&self, x: u32, y: u32, sample: usize) -> Option<T> {
        (x < self.width && y < self.height && sample < self.samples)
            .then(|| self.color_buffer[self.texel_index(x, y) * self.samples + sample])
    }

    /// Averages each texel's samples into a finished tile. Unwritten samples
    /// contribute `background`; a texel is valid if any sample was written.
    pub fn resolve(self, coord: TileCoord, rect: TexelRect, background: T) -> BakeResult<TileBuffer<T>> {
        let texels = self.written.len();
        let mut values = try_filled_vec(texels, background)?;
        let mut mask = try_filled_vec(texels, false)?;
        let scale = 1.0 / self.samples as f32;

        for (texel, &written) in self.written.iter().enumerate() {
            if written == 0 {
                continue;
            }
            let samples = &self.color_buffer[texel * self.samples..(texel + 1) * self.samples];
            values[texel] = if self.samples == 1 {
                samples[0]
            } else {
                samples[1..]
                    .iter()
                    .fold(samples[0] * scale, |sum, &value| sum + value * scale)
            };
            mask[texel] = true;
        }

        Ok(TileBuffer::from_parts(coord, rect, values, mask))
    }
}
