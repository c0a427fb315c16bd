//! Triangle meshes

use std::any::Any;
use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;
use sv_core::{Axis, AxisExtent, DataItem, ItemEvent, ItemId};

use super::ItemError;

#[derive(Debug, Default)]
struct MeshInner {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
}

/// Indexed triangle mesh in display coordinates
#[derive(Debug)]
pub struct Mesh {
    id: ItemId,
    name: String,
    inner: RwLock<MeshInner>,
}

impl Mesh {
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
    ) -> Result<Arc<Self>, ItemError> {
        validate_triangles(&triangles, vertices.len())?;
        Ok(Arc::new(Self {
            id: ItemId::new(),
            name: name.into(),
            inner: RwLock::new(MeshInner { vertices, triangles }),
        }))
    }

    /// Axis-aligned box with corners `min` and `max`
    pub fn cuboid(name: impl Into<String>, min: Vec3, max: Vec3) -> Result<Arc<Self>, ItemError> {
        let vertices = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { min.x } else { max.x },
                    if i & 2 == 0 { min.y } else { max.y },
                    if i & 4 == 0 { min.z } else { max.z },
                )
            })
            .collect();
        let triangles = vec![
            [0, 2, 1], [1, 2, 3], // -z
            [4, 5, 6], [5, 7, 6], // +z
            [0, 1, 4], [1, 5, 4], // -y
            [2, 6, 3], [3, 6, 7], // +y
            [0, 4, 2], [2, 4, 6], // -x
            [1, 3, 5], [3, 7, 5], // +x
        ];
        Self::new(name, vertices, triangles)
    }

    pub fn vertices(&self) -> Vec<Vec3> {
        self.inner.read().vertices.clone()
    }

    pub fn triangles(&self) -> Vec<[u32; 3]> {
        self.inner.read().triangles.clone()
    }

    /// Vertices and triangles read together
    pub fn geometry(&self) -> (Vec<Vec3>, Vec<[u32; 3]>) {
        let inner = self.inner.read();
        (inner.vertices.clone(), inner.triangles.clone())
    }

    pub fn vertex_count(&self) -> usize {
        self.inner.read().vertices.len()
    }

    /// Axis-aligned bounding box, `None` for an empty mesh
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let inner = self.inner.read();
        let first = *inner.vertices.first()?;
        Some(inner.vertices.iter().fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v))))
    }

    /// Bounding box as X/Y/Z extents
    pub fn extents(&self) -> Vec<AxisExtent> {
        match self.bounds() {
            Some((lo, hi)) => vec![
                AxisExtent::new(Axis::X, lo.x as f64, hi.x as f64, 1.0),
                AxisExtent::new(Axis::Y, lo.y as f64, hi.y as f64, 1.0),
                AxisExtent::new(Axis::Z, lo.z as f64, hi.z as f64, 1.0),
            ],
            None => Vec::new(),
        }
    }

    /// Move every vertex by `offset`
    pub fn translate(&self, offset: Vec3) -> ItemEvent {
        for vertex in self.inner.write().vertices.iter_mut() {
            *vertex += offset;
        }
        ItemEvent::Updated(self.id)
    }

    /// Move the mesh so its bounding box is centred on the origin
    pub fn center(&self) -> ItemEvent {
        match self.bounds() {
            Some((lo, hi)) => self.translate(-(lo + hi) * 0.5),
            None => ItemEvent::Updated(self.id),
        }
    }

    /// Replace geometry and topology
    pub fn replace(
        &self,
        vertices: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
    ) -> Result<ItemEvent, ItemError> {
        validate_triangles(&triangles, vertices.len())?;
        *self.inner.write() = MeshInner { vertices, triangles };
        Ok(ItemEvent::Restructured(self.id))
    }

    /// Area-weighted vertex normals
    pub fn vertex_normals(&self) -> Vec<Vec3> {
        let inner = self.inner.read();
        let mut normals = vec![Vec3::ZERO; inner.vertices.len()];
        for triangle in &inner.triangles {
            let [a, b, c] = triangle.map(|i| i as usize);
            let origin = inner.vertices[a];
            let face = (inner.vertices[b] - origin).cross(inner.vertices[c] - origin);
            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }
        normals.into_iter().map(|n| n.normalize_or_zero()).collect()
    }
}

impl DataItem for Mesh {
    fn id(&self) -> ItemId {
        self.id
    }

    fn name(&self) -> Option<String> {
        (!self.name.is_empty()).then(|| self.name.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn validate_triangles(triangles: &[[u32; 3]], vertex_count: usize) -> Result<(), ItemError> {
    match triangles.iter().flatten().find(|&&i| i as usize >= vertex_count) {
        Some(&index) => Err(ItemError::VertexOutOfRange { index, vertex_count }),
        None => Ok(()),
    }
}
