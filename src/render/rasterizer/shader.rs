//! Texel shaders.
//!
//! The rasterizer handles:
//! - Tile classification and edge function evaluation
//! - Inside/outside testing under the fill rule
//! - Barycentric weights and attribute interpolation
//!
//! The shader handles:
//! - Turning the interpolated attribute bundle into an output value
//!
//! Shaders resolve the attributes they need once, in [`TexelShader::bind`],
//! before any tile is rasterized. A missing or mistyped attribute is a
//! [`ConfigError`] at setup rather than a per-texel failure. `shade` takes
//! `&self`, so a bound shader is shared read-only by every worker.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, Mul};
use std::sync::Arc;

use crate::error::ConfigError;
use crate::math::{Vec2, Vec3, Vec4};
use crate::mesh::{AttributeId, AttributeKind, AttributeLayout};
use crate::render::tile::TileCoord;
use crate::texture::Texture;

/// A value a shader can produce and a tile can store.
///
/// Antialiasing resolves samples as `Σ value * (1 / n)`, hence the
/// arithmetic bounds.
pub trait Texel:
    Copy + Send + Sync + fmt::Debug + PartialEq + Add<Output = Self> + Mul<f32, Output = Self> + 'static
{
    /// Attribute shape with the same number of components.
    const KIND: AttributeKind;

    /// Builds a value from `KIND.components()` floats.
    fn from_components(values: &[f32]) -> Self;
}

impl Texel for f32 {
    const KIND: AttributeKind = AttributeKind::Scalar;

    fn from_components(values: &[f32]) -> Self {
        values[0]
    }
}

impl Texel for Vec2 {
    const KIND: AttributeKind = AttributeKind::Vec2;

    fn from_components(values: &[f32]) -> Self {
        Vec2::new(values[0], values[1])
    }
}

impl Texel for Vec3 {
    const KIND: AttributeKind = AttributeKind::Vec3;

    fn from_components(values: &[f32]) -> Self {
        Vec3::new(values[0], values[1], values[2])
    }
}

impl Texel for Vec4 {
    const KIND: AttributeKind = AttributeKind::Vec4;

    fn from_components(values: &[f32]) -> Self {
        Vec4::new(values[0], values[1], values[2], values[3])
    }
}

/// Interpolated attribute values of one fragment.
#[derive(Clone, Copy)]
pub struct Attributes<'a> {
    layout: &'a AttributeLayout,
    values: &'a [f32],
}

impl<'a> Attributes<'a> {
    pub fn new(layout: &'a AttributeLayout, values: &'a [f32]) -> Self {
        Self { layout, values }
    }

    /// Raw components of attribute `id`.
    #[inline]
    pub fn get(&self, id: AttributeId) -> &'a [f32] {
        &self.values[self.layout.get(id).range()]
    }

    #[inline]
    pub fn scalar(&self, id: AttributeId) -> f32 {
        self.get(id)[0]
    }

    #[inline]
    pub fn vec2(&self, id: AttributeId) -> Vec2 {
        Vec2::from_components(self.get(id))
    }

    #[inline]
    pub fn vec3(&self, id: AttributeId) -> Vec3 {
        Vec3::from_components(self.get(id))
    }

    #[inline]
    pub fn vec4(&self, id: AttributeId) -> Vec4 {
        Vec4::from_components(self.get(id))
    }

    /// Every component, in layout order.
    pub fn values(&self) -> &'a [f32] {
        self.values
    }
}

impl fmt::Debug for Attributes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.layout.iter().map(|desc| (&desc.name, &self.values[desc.range()])))
            .finish()
    }
}

/// Everything a shader sees for one (triangle, texel) pair.
#[derive(Debug, Clone, Copy)]
pub struct ShadeInput<'a> {
    /// Surface texel coordinates.
    pub x: u32,
    pub y: u32,
    pub tile: TileCoord,
    pub attributes: Attributes<'a>,
    /// Perspective-corrected barycentric weights.
    pub barycentric: [f32; 3],
    /// Interpolated 1/w (larger is closer).
    pub inv_w: f32,
    /// Fraction of the texel's samples this triangle covers.
    pub coverage: f32,
}

/// Per-texel evaluation function.
pub trait TexelShader: Send + Sync {
    type Output: Texel;

    /// Resolves required attributes against `layout`. Called once per bake
    /// setup; must fail if an attribute is missing or has the wrong shape.
    fn bind(&mut self, layout: &AttributeLayout) -> Result<(), ConfigError>;

    /// Computes the value of one texel. Must be pure.
    ///
    /// # Panics
    ///
    /// The built-in attribute shaders panic when called before a successful
    /// [`TexelShader::bind`]. Shading only happens inside a
    /// [`crate::engine::Baker`], which binds at construction.
    fn shade(&self, input: &ShadeInput<'_>) -> Self::Output;
}

/// Looks up `name` in `layout` and checks its shape.
pub fn require(
    layout: &AttributeLayout,
    name: &str,
    kind: AttributeKind,
) -> Result<AttributeId, ConfigError> {
    let id = layout.find(name).ok_or_else(|| ConfigError::MissingAttribute {
        name: name.to_string(),
    })?;
    let found = layout.get(id).kind;
    if found != kind {
        return Err(ConfigError::AttributeKindMismatch {
            name: name.to_string(),
            expected: kind,
            found,
        });
    }
    Ok(id)
}

fn unbound(name: &str) -> ! {
    panic!("shader attribute `{name}` used before TexelShader::bind")
}

/// Constant shader - returns the same value for every covered texel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantShader<T> {
    value: T,
}

impl<T: Texel> ConstantShader<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Texel> TexelShader for ConstantShader<T> {
    type Output = T;

    fn bind(&mut self, _layout: &AttributeLayout) -> Result<(), ConfigError> {
        Ok(())
    }

    #[inline]
    fn shade(&self, _input: &ShadeInput<'_>) -> T {
        self.value
    }
}

/// Writes one interpolated attribute straight into the texel.
#[derive(Debug, Clone)]
pub struct AttributeShader<T> {
    name: String,
    id: Option<AttributeId>,
    _output: PhantomData<T>,
}

impl<T: Texel> AttributeShader<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            _output: PhantomData,
        }
    }
}

impl<T: Texel> TexelShader for AttributeShader<T> {
    type Output = T;

    fn bind(&mut self, layout: &AttributeLayout) -> Result<(), ConfigError> {
        self.id = Some(require(layout, &self.name, T::KIND)?);
        Ok(())
    }

    #[inline]
    fn shade(&self, input: &ShadeInput<'_>) -> T {
        match self.id {
            Some(id) => T::from_components(input.attributes.get(id)),
            None => unbound(&self.name),
        }
    }
}

/// Normal shader - encodes the unit `normal` attribute as `n * 0.5 + 0.5`.
#[derive(Debug, Clone, Default)]
pub struct NormalShader {
    normal: Option<AttributeId>,
}

impl NormalShader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TexelShader for NormalShader {
    type Output = Vec3;

    fn bind(&mut self, layout: &AttributeLayout) -> Result<(), ConfigError> {
        self.normal = Some(require(layout, "normal", AttributeKind::Vec3)?);
        Ok(())
    }

    fn shade(&self, input: &ShadeInput<'_>) -> Vec3 {
        let Some(id) = self.normal else {
            unbound("normal")
        };
        // Interpolated normals are not unit length.
        let n = input.attributes.vec3(id).try_normalize().unwrap_or(Vec3::ZERO);
        n * 0.5 + Vec3::ONE * 0.5
    }
}

/// Gouraud shader - interpolates the per-vertex `color` attribute.
#[derive(Debug, Clone, Default)]
pub struct GouraudShader {
    color: Option<AttributeId>,
}

impl GouraudShader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TexelShader for GouraudShader {
    type Output = Vec3;

    fn bind(&mut self, layout: &AttributeLayout) -> Result<(), ConfigError> {
        self.color = Some(require(layout, "color", AttributeKind::Vec3)?);
        Ok(())
    }

    #[inline]
    fn shade(&self, input: &ShadeInput<'_>) -> Vec3 {
        match self.color {
            Some(id) => input.attributes.vec3(id),
            None => unbound("color"),
        }
    }
}

/// Texture shader - samples a texture at the interpolated `uv` attribute.
#[derive(Debug, Clone)]
pub struct TextureShader {
    texture: Arc<Texture>,
    uv: Option<AttributeId>,
}

impl TextureShader {
    pub fn new(texture: Arc<Texture>) -> Self {
        Self { texture, uv: None }
    }
}

impl TexelShader for TextureShader {
    type Output = Vec4;

    fn bind(&mut self, layout: &AttributeLayout) -> Result<(), ConfigError> {
        self.uv = Some(require(layout, "uv", AttributeKind::Vec2)?);
        Ok(())
    }

    #[inline]
    fn shade(&self, input: &ShadeInput<'_>) -> Vec4 {
        let Some(id) = self.uv else { unbound("uv") };
        let uv = input.attributes.vec2(id);
        self.texture.sample(uv.x, uv.y)
    }
}

/// Shader built from a closure and the attributes it declares.
///
/// The closure receives the resolved ids in declaration order:
///
/// ```ignore
/// let shader = FnShader::new(&[("uv", AttributeKind::Vec2)], |input, ids| {
///     let uv = input.attributes.vec2(ids[0]);
///     uv.x * uv.y
/// });
/// ```
pub struct FnShader<T, F> {
    requirements: Vec<(String, AttributeKind)>,
    ids: Vec<AttributeId>,
    function: F,
    _output: PhantomData<fn() -> T>,
}

impl<T, F> FnShader<T, F>
where
    T: Texel,
    F: Fn(&ShadeInput<'_>, &[AttributeId]) -> T + Send + Sync,
{
    pub fn new(requirements: &[(&str, AttributeKind)], function: F) -> Self {
        Self {
            requirements: requirements
                .iter()
                .map(|&(name, kind)| (name.to_string(), kind))
                .collect(),
            ids: Vec::new(),
            function,
            _output: PhantomData,
        }
    }
}

impl<T, F> TexelShader for FnShader<T, F>
where
    T: Texel,
    F: Fn(&ShadeInput<'_>, &[AttributeId]) -> T + Send + Sync,
{
    type Output = T;

    fn bind(&mut self, layout: &AttributeLayout) -> Result<(), ConfigError> {
        self.ids = self
            .requirements
            .iter()
            .map(|(name, kind)| require(layout, name, *kind))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    #[inline]
    fn shade(&self, input: &ShadeInput<'_>) -> T {
        (self.function)(input, &self.ids)
    }
}

/// Material kinds selectable at runtime, all producing RGBA.
#[derive(Debug, Clone)]
pub enum MaterialShader {
    /// Object-space normals encoded as color.
    Normal(NormalShader),
    /// Texture coordinates in red and green.
    Uv(AttributeShader<Vec2>),
    /// Object-space position normalized to a bounding box.
    Position {
        shader: AttributeShader<Vec3>,
        min: Vec3,
        extent: Vec3,
    },
    /// Opaque white wherever geometry covers the texel.
    Coverage,
    Texture(TextureShader),
}

impl MaterialShader {
    pub fn normal() -> Self {
        MaterialShader::Normal(NormalShader::new())
    }

    pub fn uv() -> Self {
        MaterialShader::Uv(AttributeShader::new("uv"))
    }

    /// Maps positions inside `[min, max]` to `[0, 1]` per channel.
    pub fn position(min: Vec3, max: Vec3) -> Self {
        let size = max - min;
        let safe = |v: f32| if v.abs() > crate::math::EPSILON { v } else { 1.0 };
        MaterialShader::Position {
            shader: AttributeShader::new("position"),
            min,
            extent: Vec3::new(safe(size.x), safe(size.y), safe(size.z)),
        }
    }

    pub fn texture(texture: Arc<Texture>) -> Self {
        MaterialShader::Texture(TextureShader::new(texture))
    }
}

impl TexelShader for MaterialShader {
    type Output = Vec4;

    fn bind(&mut self, layout: &AttributeLayout) -> Result<(), ConfigError> {
        match self {
            MaterialShader::Normal(shader) => shader.bind(layout),
            MaterialShader::Uv(shader) => shader.bind(layout),
            MaterialShader::Position { shader, .. } => shader.bind(layout),
            MaterialShader::Coverage => Ok(()),
            MaterialShader::Texture(shader) => shader.bind(layout),
        }
    }

    fn shade(&self, input: &ShadeInput<'_>) -> Vec4 {
        match self {
            MaterialShader::Normal(shader) => Vec4::from_vec3(shader.shade(input), 1.0),
            MaterialShader::Uv(shader) => {
                let uv = shader.shade(input);
                Vec4::new(uv.x, uv.y, 0.0, 1.0)
            }
            MaterialShader::Position {
                shader,
                min,
                extent,
            } => {
                let p = shader.shade(input) - *min;
                Vec4::new(p.x / extent.x, p.y / extent.y, p.z / extent.z, 1.0)
            }
            MaterialShader::Coverage => Vec4::ONE,
            MaterialShader::Texture(shader) => shader.shade(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Interpolation;
    use approx::assert_relative_eq;

    fn layout() -> AttributeLayout {
        AttributeLayout::new()
            .with("normal", AttributeKind::Vec3, Interpolation::Perspective)
            .with("uv", AttributeKind::Vec2, Interpolation::Perspective)
    }

    fn input<'a>(layout: &'a AttributeLayout, values: &'a [f32]) -> ShadeInput<'a> {
        ShadeInput {
            x: 0,
            y: 0,
            tile: TileCoord::new(0, 0),
            attributes: Attributes::new(layout, values),
            barycentric: [1.0, 0.0, 0.0],
            inv_w: 1.0,
            coverage: 1.0,
        }
    }

    #[test]
    fn bind_reports_missing_attribute() {
        let mut shader = GouraudShader::new();
        assert_eq!(
            shader.bind(&layout()),
            Err(ConfigError::MissingAttribute {
                name: "color".to_string()
            })
        );
    }

    #[test]
    fn bind_reports_kind_mismatch() {
        let mut shader = AttributeShader::<Vec4>::new("uv");
        assert_eq!(
            shader.bind(&layout()),
            Err(ConfigError::AttributeKindMismatch {
                name: "uv".to_string(),
                expected: AttributeKind::Vec4,
                found: AttributeKind::Vec2,
            })
        );
    }

    #[test]
    fn attribute_shader_reads_its_slot() {
        let layout = layout();
        let mut shader = AttributeShader::<Vec2>::new("uv");
        shader.bind(&layout).unwrap();
        let values = [0.0, 0.0, 1.0, 0.25, 0.75];
        assert_eq!(shader.shade(&input(&layout, &values)), Vec2::new(0.25, 0.75));
    }

    #[test]
    fn normal_shader_renormalizes() {
        let layout = layout();
        let mut shader = NormalShader::new();
        shader.bind(&layout).unwrap();
        let values = [0.0, 0.0, 2.0, 0.0, 0.0];
        let color = shader.shade(&input(&layout, &values));
        assert_relative_eq!(color, Vec3::new(0.5, 0.5, 1.0));
    }

    #[test]
    fn fn_shader_receives_ids_in_order() {
        let layout = layout();
        let mut shader = FnShader::new(
            &[("uv", AttributeKind::Vec2), ("normal", AttributeKind::Vec3)],
            |input: &ShadeInput<'_>, ids: &[AttributeId]| {
                input.attributes.vec2(ids[0]).x + input.attributes.vec3(ids[1]).z
            },
        );
        shader.bind(&layout).unwrap();
        let values = [0.0, 0.0, 1.0, 0.25, 0.75];
        assert_relative_eq!(shader.shade(&input(&layout, &values)), 1.25);
    }

    #[test]
    fn position_material_normalizes_to_bounds() {
        let layout = AttributeLayout::new().with("position", AttributeKind::Vec3, Interpolation::Perspective);
        let mut shader = MaterialShader::position(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 2.0, 0.0));
        shader.bind(&layout).unwrap();
        let values = [0.0, 1.0, 5.0];
        assert_relative_eq!(shader.shade(&input(&layout, &values)), Vec4::new(0.5, 0.5, 5.0, 1.0));
    }
}
