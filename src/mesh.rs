//! Source geometry: vertices with named attributes, indexed triangles, and
//! the content-version token the tile cache keys on.
//!
//! A [`Mesh`] is what the vertex-attribute evaluator hands to the baker. Its
//! vertices are immutable once submitted; rasterization only borrows them
//! through [`Triangle`].

use std::path::Path;

use thiserror::Error;

use crate::math::{Vec2, Vec3};
use crate::primitives::Triangle3;

/// Shape of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
}

impl AttributeKind {
    pub const fn components(self) -> usize {
        match self {
            AttributeKind::Scalar => 1,
            AttributeKind::Vec2 => 2,
            AttributeKind::Vec3 => 3,
            AttributeKind::Vec4 => 4,
        }
    }
}

/// How an attribute varies across a triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interpolation {
    /// Weighted by 1/w so the attribute varies linearly in 3D.
    #[default]
    Perspective,
    /// Plain screen-space barycentric weights.
    Linear,
    /// Value of the provoking (first) vertex, unweighted.
    Flat,
}

/// Index of an attribute within an [`AttributeLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDesc {
    pub name: String,
    pub kind: AttributeKind,
    pub interpolation: Interpolation,
    /// First component of this attribute within a vertex's value array.
    pub offset: usize,
}

impl AttributeDesc {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.kind.components()
    }
}

/// Ordered set of named attributes every vertex of a mesh carries, packed
/// into one flat `f32` array per vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeLayout {
    attributes: Vec<AttributeDesc>,
    component_modes: Vec<Interpolation>,
}

impl AttributeLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`AttributeLayout::push`].
    pub fn with(mut self, name: &str, kind: AttributeKind, interpolation: Interpolation) -> Self {
        self.push(name, kind, interpolation);
        self
    }

    /// Append an attribute. A second attribute with an existing name shadows
    /// nothing; [`AttributeLayout::find`] returns the first match.
    pub fn push(&mut self, name: &str, kind: AttributeKind, interpolation: Interpolation) -> AttributeId {
        let id = AttributeId(self.attributes.len());
        self.attributes.push(AttributeDesc {
            name: name.to_string(),
            kind,
            interpolation,
            offset: self.component_modes.len(),
        });
        self.component_modes
            .extend(std::iter::repeat(interpolation).take(kind.components()));
        id
    }

    pub fn find(&self, name: &str) -> Option<AttributeId> {
        self.attributes
            .iter()
            .position(|a| a.name == name)
            .map(AttributeId)
    }

    pub fn get(&self, id: AttributeId) -> &AttributeDesc {
        &self.attributes[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeDesc> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Number of `f32` components per vertex.
    pub fn stride(&self) -> usize {
        self.component_modes.len()
    }

    /// Interpolation mode of every component, in storage order.
    pub fn component_modes(&self) -> &[Interpolation] {
        &self.component_modes
    }
}

/// Caller-supplied identity of the geometry/attribute set a mesh holds.
/// Bump it whenever the mesh content changes so cached tiles are not reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContentVersion(pub u64);

impl ContentVersion {
    pub fn next(self) -> Self {
        ContentVersion(self.0.wrapping_add(1))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    values: Vec<f32>,
}

impl Vertex {
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn attribute(&self, desc: &AttributeDesc) -> &[f32] {
        &self.values[desc.range()]
    }
}

/// Indices into the mesh's vertex array (zero-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Face {
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

/// Borrowed view of one face. `vertices[0]` is the provoking vertex for
/// flat attributes.
#[derive(Clone, Copy, Debug)]
pub struct Triangle<'a> {
    pub vertices: [&'a Vertex; 3],
}

impl Triangle<'_> {
    pub fn geometry(&self) -> Triangle3 {
        Triangle3::new(
            self.vertices[0].position,
            self.vertices[1].position,
            self.vertices[2].position,
        )
    }
}

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("failed to load OBJ: {0}")]
    Obj(#[from] tobj::LoadError),

    #[error("vertex has {found} attribute components, layout expects {expected}")]
    AttributeCount { expected: usize, found: usize },

    #[error("face index {index} out of range for {vertex_count} vertices")]
    FaceIndex { index: u32, vertex_count: usize },

    #[error("mesh `{0}` has no texture coordinates")]
    MissingTexcoords(String),
}

#[derive(Debug, Clone)]
pub struct Mesh {
    name: String,
    layout: AttributeLayout,
    vertices: Vec<Vertex>,
    faces: Vec<Face>,
    version: ContentVersion,
}

impl Mesh {
    pub fn new(name: impl Into<String>, layout: AttributeLayout) -> Self {
        Self {
            name: name.into(),
            layout,
            vertices: Vec::new(),
            faces: Vec::new(),
            version: ContentVersion::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &AttributeLayout {
        &self.layout
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn version(&self) -> ContentVersion {
        self.version
    }

    pub fn set_version(&mut self, version: ContentVersion) -> &mut Self {
        self.version = version;
        self
    }

    /// Add a vertex whose attribute values are packed in layout order.
    /// Returns its index.
    pub fn push_vertex(&mut self, position: Vec3, values: &[f32]) -> Result<u32, MeshError> {
        if values.len() != self.layout.stride() {
            return Err(MeshError::AttributeCount {
                expected: self.layout.stride(),
                found: values.len(),
            });
        }
        self.vertices.push(Vertex {
            position,
            values: values.to_vec(),
        });
        Ok(self.vertices.len() as u32 - 1)
    }

    pub fn push_face(&mut self, a: u32, b: u32, c: u32) -> Result<(), MeshError> {
        let vertex_count = self.vertices.len();
        if let Some(&index) = [a, b, c].iter().find(|&&i| i as usize >= vertex_count) {
            return Err(MeshError::FaceIndex {
                index,
                vertex_count,
            });
        }
        self.faces.push(Face { a, b, c });
        Ok(())
    }

    /// Convenience for building triangle soups: pushes three vertices and a face.
    pub fn push_triangle(&mut self, corners: [(Vec3, &[f32]); 3]) -> Result<(), MeshError> {
        let [a, b, c] = corners;
        let a = self.push_vertex(a.0, a.1)?;
        let b = self.push_vertex(b.0, b.1)?;
        let c = self.push_vertex(c.0, c.1)?;
        self.push_face(a, b, c)
    }

    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    pub fn triangles(&self) -> impl Iterator<Item = Triangle<'_>> + '_ {
        self.faces.iter().map(move |face| Triangle {
            vertices: [
                &self.vertices[face.a as usize],
                &self.vertices[face.b as usize],
                &self.vertices[face.c as usize],
            ],
        })
    }

    /// Copy of this mesh whose positions are its texture coordinates
    /// `(u, v, 0)`, for baking in texture space. Attributes are unchanged, so
    /// the object-space position stays available if the layout carries it.
    pub fn uv_unwrapped(&self, uv_attribute: &str) -> Result<Mesh, MeshError> {
        let desc = self
            .layout
            .find(uv_attribute)
            .map(|id| self.layout.get(id))
            .filter(|desc| desc.kind == AttributeKind::Vec2)
            .ok_or_else(|| MeshError::MissingTexcoords(self.name.clone()))?;

        let mut unwrapped = self.clone();
        for vertex in &mut unwrapped.vertices {
            let uv = vertex.attribute(desc);
            vertex.position = Vec3::new(uv[0], uv[1], 0.0);
        }
        Ok(unwrapped)
    }

    /// Load every object in an OBJ file as its own mesh.
    ///
    /// Each mesh gets a `position` attribute (object-space position,
    /// perspective-correct), plus `normal` and `uv` when the file has them.
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<Vec<Mesh>, MeshError> {
        let (models, _materials) = tobj::load_obj(path.as_ref(), &tobj::GPU_LOAD_OPTIONS)?;

        models
            .into_iter()
            .map(|model| Self::from_tobj_mesh(model.name, &model.mesh))
            .collect()
    }

    fn from_tobj_mesh(name: String, source: &tobj::Mesh) -> Result<Mesh, MeshError> {
        let vertex_count = source.positions.len() / 3;
        let has_normals = source.normals.len() == vertex_count * 3 && vertex_count > 0;
        let has_uvs = source.texcoords.len() == vertex_count * 2 && vertex_count > 0;

        let mut layout = AttributeLayout::new().with(
            "position",
            AttributeKind::Vec3,
            Interpolation::Perspective,
        );
        if has_normals {
            layout.push("normal", AttributeKind::Vec3, Interpolation::Perspective);
        }
        if has_uvs {
            layout.push("uv", AttributeKind::Vec2, Interpolation::Perspective);
        }

        let mut mesh = Mesh::new(name, layout);
        let mut values = Vec::with_capacity(mesh.layout.stride());
        for i in 0..vertex_count {
            let position = Vec3::new(
                source.positions[3 * i],
                source.positions[3 * i + 1],
                source.positions[3 * i + 2],
            );
            values.clear();
            values.extend_from_slice(&position.to_array());
            if has_normals {
                values.extend_from_slice(&source.normals[3 * i..3 * i + 3]);
            }
            if has_uvs {
                let uv = Vec2::new(source.texcoords[2 * i], source.texcoords[2 * i + 1]);
                values.extend_from_slice(&[uv.x, uv.y]);
            }
            mesh.push_vertex(position, &values)?;
        }

        for face in source.indices.chunks_exact(3) {
            mesh.push_face(face[0], face[1], face[2])?;
        }

        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uv_layout() -> AttributeLayout {
        AttributeLayout::new()
            .with("uv", AttributeKind::Vec2, Interpolation::Perspective)
            .with("id", AttributeKind::Scalar, Interpolation::Flat)
    }

    #[test]
    fn layout_packs_components_in_order() {
        let layout = uv_layout();
        assert_eq!(layout.stride(), 3);
        let id = layout.find("id").expect("id attribute");
        assert_eq!(layout.get(id).offset, 2);
        assert_eq!(
            layout.component_modes(),
            &[
                Interpolation::Perspective,
                Interpolation::Perspective,
                Interpolation::Flat
            ]
        );
        assert!(layout.find("normal").is_none());
    }

    #[test]
    fn push_vertex_checks_stride() {
        let mut mesh = Mesh::new("tri", uv_layout());
        let err = mesh.push_vertex(Vec3::ZERO, &[0.0]).unwrap_err();
        assert!(matches!(
            err,
            MeshError::AttributeCount {
                expected: 3,
                found: 1
            }
        ));
    }

    #[test]
    fn push_face_checks_indices() {
        let mut mesh = Mesh::new("tri", uv_layout());
        mesh.push_vertex(Vec3::ZERO, &[0.0, 0.0, 7.0]).unwrap();
        assert!(matches!(
            mesh.push_face(0, 0, 3),
            Err(MeshError::FaceIndex { index: 3, .. })
        ));
    }

    #[test]
    fn uv_unwrap_moves_positions_into_texture_space() {
        let mut mesh = Mesh::new("tri", uv_layout());
        mesh.push_triangle([
            (Vec3::new(5.0, 5.0, 5.0), &[0.25, 0.5, 1.0]),
            (Vec3::new(6.0, 5.0, 5.0), &[0.75, 0.5, 1.0]),
            (Vec3::new(5.0, 6.0, 5.0), &[0.25, 1.0, 1.0]),
        ])
        .unwrap();

        let unwrapped = mesh.uv_unwrapped("uv").unwrap();
        assert_eq!(unwrapped.vertices()[1].position, Vec3::new(0.75, 0.5, 0.0));
        assert_eq!(unwrapped.vertices()[1].values(), mesh.vertices()[1].values());
        assert!(matches!(
            mesh.uv_unwrapped("id"),
            Err(MeshError::MissingTexcoords(_))
        ));
    }

    #[test]
    fn triangles_borrow_vertices_in_face_order() {
        let mut mesh = Mesh::new("quad", AttributeLayout::new());
        for p in [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ] {
            mesh.push_vertex(p, &[]).unwrap();
        }
        mesh.push_face(2, 0, 1).unwrap();
        let tri = mesh.triangles().next().unwrap();
        assert_eq!(tri.vertices[0].position, Vec3::new(1.0, 1.0, 0.0));
        assert!(!tri.geometry().is_degenerate());
    }
}
