//! Image input and output.
//!
//! [`Texture`] is a read-only RGBA image that shaders can sample; [`save_png`]
//! writes a baked [`Surface`] to disk through [`ToRgba8`].

use std::path::Path;

use image::error::{ParameterError, ParameterErrorKind};
use image::{ImageError, Rgba, RgbaImage};

use crate::math::{Vec2, Vec3, Vec4};
use crate::render::surface::Surface;

/// A 2D RGBA texture with components normalized to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    data: Vec<Vec4>,
    width: u32,
    height: u32,
}

impl Texture {
    /// Load a texture from an image file (PNG, JPG, etc.)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ImageError> {
        let img = image::open(path)?.to_rgba8();
        Self::from_image(&img)
            .ok_or_else(|| ImageError::Parameter(ParameterError::from_kind(ParameterErrorKind::DimensionMismatch)))
    }

    /// Converts `img`, or `None` if either side is zero.
    pub fn from_image(img: &RgbaImage) -> Option<Self> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return None;
        }
        let data = img
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0.map(|c| c as f32 / 255.0);
                Vec4::new(r, g, b, a)
            })
            .collect();
        Some(Self { data, width, height })
    }

    /// Solid `width` x `height` texture, or `None` if either side is zero.
    pub fn filled(width: u32, height: u32, color: Vec4) -> Option<Self> {
        (width > 0 && height > 0).then(|| Self {
            data: vec![color; width as usize * height as usize],
            width,
            height,
        })
    }

    /// Sample the texture at UV coordinates using nearest-neighbor filtering.
    ///
    /// `v = 0` is the bottom row, as in OBJ files, while rows are stored top
    /// first. Coordinates outside `[0, 1)` wrap.
    #[inline]
    pub fn sample(&self, u: f32, v: f32) -> Vec4 {
        let u = u.rem_euclid(1.0);
        let v = (1.0 - v).rem_euclid(1.0);

        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);

        self.data[(y * self.width + x) as usize]
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Conversion of a texel value to an 8-bit RGBA pixel. Components are
/// clamped to `[0, 1]`.
pub trait ToRgba8 {
    fn to_rgba8(&self) -> [u8; 4];
}

fn quantize(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl ToRgba8 for f32 {
    fn to_rgba8(&self) -> [u8; 4] {
        let c = quantize(*self);
        [c, c, c, 255]
    }
}

impl ToRgba8 for Vec2 {
    fn to_rgba8(&self) -> [u8; 4] {
        [quantize(self.x), quantize(self.y), 0, 255]
    }
}

impl ToRgba8 for Vec3 {
    fn to_rgba8(&self) -> [u8; 4] {
        [quantize(self.x), quantize(self.y), quantize(self.z), 255]
    }
}

impl ToRgba8 for Vec4 {
    fn to_rgba8(&self) -> [u8; 4] {
        [quantize(self.x), quantize(self.y), quantize(self.z), quantize(self.w)]
    }
}

/// Converts a surface to an 8-bit image, row 0 at the top.
pub fn to_image<T: Copy + ToRgba8>(surface: &Surface<T>) -> RgbaImage {
    let width = surface.width();
    let texels = surface.texels();
    RgbaImage::from_fn(surface.width(), surface.height(), |x, y| {
        Rgba(texels[(y * width + x) as usize].to_rgba8())
    })
}

/// Writes `surface` to `path`; the format follows the file extension.
pub fn save_png<T: Copy + ToRgba8, P: AsRef<Path>>(surface: &Surface<T>, path: P) -> Result<(), ImageError> {
    to_image(surface).save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> Texture {
        // Top row red, green; bottom row blue, white.
        let img = RgbaImage::from_fn(2, 2, |x, y| match (x, y) {
            (0, 0) => Rgba([255, 0, 0, 255]),
            (1, 0) => Rgba([0, 255, 0, 255]),
            (0, 1) => Rgba([0, 0, 255, 255]),
            _ => Rgba([255, 255, 255, 255]),
        });
        Texture::from_image(&img).unwrap()
    }

    #[test]
    fn sample_flips_v() {
        let tex = checker();
        assert_eq!(tex.sample(0.25, 0.25), Vec4::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(tex.sample(0.75, 0.75), Vec4::new(0.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn sample_wraps() {
        let tex = checker();
        assert_eq!(tex.sample(1.25, -0.75), tex.sample(0.25, 0.25));
    }

    #[test]
    fn filled_rejects_empty() {
        assert!(Texture::filled(0, 4, Vec4::ONE).is_none());
        let tex = Texture::filled(3, 2, Vec4::ONE).unwrap();
        assert_eq!(tex.sample(0.9, 0.1), Vec4::ONE);
    }

    #[test]
    fn from_image_rejects_empty() {
        assert!(Texture::from_image(&RgbaImage::new(0, 0)).is_none());
        assert!(Texture::from_image(&RgbaImage::new(4, 0)).is_none());
        assert!(Texture::from_image(&RgbaImage::new(1, 1)).is_some());
    }

    #[test]
    fn rgba_conversion_clamps() {
        assert_eq!(1.5f32.to_rgba8(), [255, 255, 255, 255]);
        assert_eq!(Vec3::new(-1.0, 0.5, 1.0).to_rgba8(), [0, 128, 255, 255]);
    }

    #[test]
    fn surface_converts_row_major() {
        let mut surface = Surface::new(2, 1, 0.0f32).unwrap();
        surface.set(1, 0, 1.0);
        let img = to_image(&surface);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [255, 255, 255, 255]);
    }
}
