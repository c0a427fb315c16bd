//! Surface view for triangle meshes

use std::any::Any;
use std::sync::Arc;

use ahash::AHashMap;
use glam::Vec3;
use sv_core::{Axis, AxisExtent, DataItem, View, ViewError, ViewFactory};

use crate::downcast_item;
use crate::items::Mesh;

/// Shows a [`Mesh`] in X/Y/Z. The mesh's bounding box is its own extent.
pub struct MeshView {
    item: Arc<dyn DataItem>,
    positions: AHashMap<Axis, f64>,
    normals: Vec<Vec3>,
    /// Triangles crossing the current Z position
    section: Vec<usize>,
    disposed: bool,
}

impl MeshView {
    pub fn new(item: Arc<dyn DataItem>) -> Self {
        Self {
            item,
            positions: AHashMap::new(),
            normals: Vec::new(),
            section: Vec::new(),
            disposed: false,
        }
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Indices of the triangles cut by the plane at the view's Z position
    pub fn section(&self) -> &[usize] {
        &self.section
    }

    fn mesh(&self) -> Result<&Mesh, ViewError> {
        if self.disposed {
            return Err(ViewError::Disposed);
        }
        let mesh = downcast_item::<Mesh>(&self.item).ok_or(ViewError::ItemUnavailable)?;
        if mesh.vertex_count() == 0 {
            return Err(ViewError::ItemUnavailable);
        }
        Ok(mesh)
    }
}

impl View for MeshView {
    fn item(&self) -> &Arc<dyn DataItem> {
        &self.item
    }

    fn view_type(&self) -> &str {
        "mesh"
    }

    fn own_axes(&self) -> Vec<AxisExtent> {
        downcast_item::<Mesh>(&self.item)
            .map(Mesh::extents)
            .unwrap_or_default()
    }

    fn own_position(&self, axis: &Axis) -> f64 {
        self.positions.get(axis).copied().unwrap_or(0.0)
    }

    fn set_own_position(&mut self, axis: &Axis, position: f64) {
        self.positions.insert(axis.clone(), position);
    }

    fn rebuild(&mut self) -> Result<(), ViewError> {
        let normals = self.mesh()?.vertex_normals();
        if normals.iter().all(|n| *n == Vec3::ZERO) {
            return Err(ViewError::Rebuild("mesh has no non-degenerate triangles".to_string()));
        }
        self.normals = normals;
        self.section.clear();
        Ok(())
    }

    fn update(&mut self) -> Result<(), ViewError> {
        let mesh = self.mesh()?;
        let (vertices, triangles) = mesh.geometry();
        let z = self.positions.get(&Axis::Z).copied().unwrap_or(0.0) as f32;
        let section = triangles
            .iter()
            .enumerate()
            .filter(|(_, triangle)| {
                let zs = triangle.map(|i| vertices[i as usize].z);
                let lo = zs.iter().copied().fold(f32::INFINITY, f32::min);
                let hi = zs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                lo <= z && z <= hi
            })
            .map(|(index, _)| index)
            .collect();
        self.section = section;
        Ok(())
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.normals.clear();
        self.section.clear();
        self.positions.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Accepts any [`Mesh`]
#[derive(Debug, Default)]
pub struct MeshViewFactory;

impl ViewFactory for MeshViewFactory {
    fn name(&self) -> &str {
        "mesh"
    }

    fn accepts(&self, item: &dyn DataItem) -> bool {
        item.as_any().is::<Mesh>()
    }

    fn create(&self, item: Arc<dyn DataItem>) -> Box<dyn View> {
        Box::new(MeshView::new(item))
    }
}
