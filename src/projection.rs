//! Projection parameters.
//!
//! A [`Projection`] is the single source of truth for how view space maps to
//! clip space. Texture-space baking uses [`Projection::texture_space`], which
//! maps UV `[0, 1]^2` onto the whole output surface.

use crate::math::Mat4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in radians.
        fov_y: f32,
        /// Width divided by height.
        aspect_ratio: f32,
        z_near: f32,
        z_far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        z_near: f32,
        z_far: f32,
    },
}

impl Projection {
    pub fn perspective(fov_y: f32, aspect_ratio: f32, z_near: f32, z_far: f32) -> Self {
        Projection::Perspective {
            fov_y,
            aspect_ratio,
            z_near,
            z_far,
        }
    }

    /// Creates a perspective projection from degrees instead of radians.
    pub fn perspective_degrees(fov_y_degrees: f32, aspect_ratio: f32, z_near: f32, z_far: f32) -> Self {
        Self::perspective(fov_y_degrees.to_radians(), aspect_ratio, z_near, z_far)
    }

    /// UV space: `u` runs left to right, `v = 1` is the top row of the surface.
    pub fn texture_space() -> Self {
        Projection::Orthographic {
            left: 0.0,
            right: 1.0,
            bottom: 0.0,
            top: 1.0,
            z_near: -1.0,
            z_far: 1.0,
        }
    }

    /// Raster space: positions are already texel coordinates on a
    /// `width` x `height` surface, `y` growing downward.
    pub fn raster_space(width: u32, height: u32) -> Self {
        Projection::Orthographic {
            left: 0.0,
            right: width as f32,
            bottom: height as f32,
            top: 0.0,
            z_near: -1.0,
            z_far: 1.0,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        match *self {
            Projection::Perspective {
                fov_y,
                aspect_ratio,
                z_near,
                z_far,
            } => Mat4::perspective_lh(fov_y, aspect_ratio, z_near, z_far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                z_near,
                z_far,
            } => Mat4::orthographic_lh(left, right, bottom, top, z_near, z_far),
        }
    }
}
