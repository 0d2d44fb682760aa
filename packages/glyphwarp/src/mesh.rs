//! Base geometry adopted by the vertex simulation.
//!
//! A [`BaseMesh`] is immutable once built. Geometry changes upstream produce a
//! new mesh, never an in-place edit.
//!
//! ## Normal Handling
//!
//! OBJ meshes use provided normals when available. Normals are generated only
//! when missing, using area-weighted averaging of adjacent face normals.

use std::collections::HashMap;

use glam::Vec3;
use thiserror::Error;

/// Reasons a geometry buffer cannot become a base mesh.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("geometry has no position attribute")]
    MissingPositions,
    #[error("geometry has no normal attribute")]
    MissingNormals,
    #[error("position buffer length {0} is not a multiple of 3")]
    Misaligned(usize),
    #[error("normal buffer has {normals} floats but positions have {positions}")]
    LengthMismatch { positions: usize, normals: usize },
    #[error("geometry contains no vertices")]
    Empty,
    #[error("failed to parse OBJ: {0}")]
    Obj(String),
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundingBox {
    /// Compute the bounding box of a flat xyz buffer.
    pub fn from_positions(positions: &[f32]) -> Self {
        if positions.len() < 3 {
            return Self::default();
        }

        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];

        for p in positions.chunks_exact(3) {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }

        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (Vec3::from(self.min) + Vec3::from(self.max)) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        Vec3::from(self.max) - Vec3::from(self.min)
    }

    pub fn half_extents(&self) -> Vec3 {
        self.size() * 0.5
    }
}

/// Immutable base positions and normals of one glyph mesh.
#[derive(Debug, Clone)]
pub struct BaseMesh {
    positions: Vec<f32>,
    normals: Vec<f32>,
    bounds: BoundingBox,
}

impl BaseMesh {
    /// Build a mesh from flat xyz position and normal buffers.
    pub fn new(positions: Vec<f32>, normals: Vec<f32>) -> Result<Self, MeshError> {
        if positions.is_empty() {
            return Err(MeshError::Empty);
        }
        if positions.len() % 3 != 0 {
            return Err(MeshError::Misaligned(positions.len()));
        }
        if normals.len() != positions.len() {
            return Err(MeshError::LengthMismatch {
                positions: positions.len(),
                normals: normals.len(),
            });
        }

        let bounds = BoundingBox::from_positions(&positions);
        Ok(Self {
            positions,
            normals,
            bounds,
        })
    }

    /// Build a mesh from optional geometry attributes, as handed over by a
    /// geometry provider that may not have produced them yet.
    pub fn from_attributes(
        positions: Option<Vec<f32>>,
        normals: Option<Vec<f32>>,
    ) -> Result<Self, MeshError> {
        let positions = positions.ok_or(MeshError::MissingPositions)?;
        let normals = normals.ok_or(MeshError::MissingNormals)?;
        Self::new(positions, normals)
    }

    /// Parse a mesh from Wavefront OBJ content, merging all models.
    pub fn from_obj(obj_content: &str) -> Result<Self, MeshError> {
        let mut cursor = std::io::Cursor::new(obj_content.as_bytes());

        let load_options = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };

        let (models, _materials) =
            tobj::load_obj_buf(&mut cursor, &load_options, |_| Ok((vec![], HashMap::new())))
                .map_err(|e| MeshError::Obj(e.to_string()))?;

        let mut positions: Vec<f32> = Vec::new();
        let mut normals: Vec<f32> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        let mut has_normals = true;

        for model in &models {
            let mesh = &model.mesh;
            if mesh.positions.is_empty() {
                continue;
            }

            let offset = (positions.len() / 3) as u32;
            positions.extend_from_slice(&mesh.positions);

            if mesh.normals.len() == mesh.positions.len() {
                normals.extend_from_slice(&mesh.normals);
            } else {
                has_normals = false;
            }

            indices.extend(mesh.indices.iter().map(|i| offset + i));
        }

        if positions.is_empty() {
            return Err(MeshError::Empty);
        }

        if !has_normals || normals.len() != positions.len() {
            normals = compute_vertex_normals(&positions, &indices);
        }

        Self::new(positions, normals)
    }

    /// Subdivided rectangle in the XY plane facing +Z, centered at the origin.
    ///
    /// Stands in for glyph geometry when no mesh file is supplied.
    pub fn grid(columns: usize, rows: usize, width: f32, height: f32) -> Result<Self, MeshError> {
        if columns == 0 || rows == 0 {
            return Err(MeshError::Empty);
        }

        let count = (columns + 1) * (rows + 1);
        let mut positions = Vec::with_capacity(count * 3);
        let mut normals = Vec::with_capacity(count * 3);

        for row in 0..=rows {
            let y = (row as f32 / rows as f32 - 0.5) * height;
            for col in 0..=columns {
                let x = (col as f32 / columns as f32 - 0.5) * width;
                positions.extend_from_slice(&[x, y, 0.0]);
                normals.extend_from_slice(&[0.0, 0.0, 1.0]);
            }
        }

        Self::new(positions, normals)
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn position(&self, index: usize) -> Vec3 {
        Vec3::from_slice(&self.positions[index * 3..index * 3 + 3])
    }

    pub fn normal(&self, index: usize) -> Vec3 {
        Vec3::from_slice(&self.normals[index * 3..index * 3 + 3])
    }
}

/// Compute area-weighted vertex normals from triangle indices.
///
/// Each triangle adds its unnormalized face normal (magnitude = 2 * area) to
/// its three vertices; the sums are normalized at the end.
fn compute_vertex_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let vertex_count = positions.len() / 3;
    let mut accum = vec![Vec3::ZERO; vertex_count];
    let at = |i: usize| Vec3::from_slice(&positions[i * 3..i * 3 + 3]);

    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
            continue;
        }

        let p0 = at(i0);
        let face_normal = (at(i1) - p0).cross(at(i2) - p0);
        for idx in [i0, i1, i2] {
            accum[idx] += face_normal;
        }
    }

    let mut normals = Vec::with_capacity(positions.len());
    for n in accum {
        // Degenerate normal, use Y-up as fallback
        let n = n.try_normalize().unwrap_or(Vec3::Y);
        normals.extend_from_slice(&n.to_array());
    }
    normals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box() {
        let positions = vec![-1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0];
        let bounds = BoundingBox::from_positions(&positions);
        assert_eq!(bounds.min, [-1.0, 0.0, 0.0]);
        assert_eq!(bounds.max, [1.0, 2.0, 0.0]);
        assert_eq!(bounds.center(), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(bounds.half_extents(), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_missing_attributes() {
        assert_eq!(
            BaseMesh::from_attributes(None, Some(vec![0.0; 3])).unwrap_err(),
            MeshError::MissingPositions
        );
        assert_eq!(
            BaseMesh::from_attributes(Some(vec![0.0; 3]), None).unwrap_err(),
            MeshError::MissingNormals
        );
    }

    #[test]
    fn test_buffer_validation() {
        assert_eq!(BaseMesh::new(vec![], vec![]).unwrap_err(), MeshError::Empty);
        assert_eq!(
            BaseMesh::new(vec![0.0; 4], vec![0.0; 4]).unwrap_err(),
            MeshError::Misaligned(4)
        );
        assert_eq!(
            BaseMesh::new(vec![0.0; 6], vec![0.0; 3]).unwrap_err(),
            MeshError::LengthMismatch {
                positions: 6,
                normals: 3
            }
        );
    }

    #[test]
    fn test_obj_parsing_computes_normals() {
        let obj_content = r#"
            v 0 0 0
            v 1 0 0
            v 0 1 0
            f 1 2 3
        "#;

        let mesh = BaseMesh::from_obj(obj_content).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        for i in 0..3 {
            let n = mesh.normal(i);
            assert!((n - Vec3::Z).length() < 1e-5, "normal {:?}", n);
        }
    }

    #[test]
    fn test_obj_without_vertices() {
        assert!(BaseMesh::from_obj("# nothing here\n").is_err());
    }

    #[test]
    fn test_grid() {
        let mesh = BaseMesh::grid(4, 2, 2.0, 1.0).unwrap();
        assert_eq!(mesh.vertex_count(), 15);
        assert_eq!(mesh.positions().len(), mesh.normals().len());
        let bounds = mesh.bounds();
        assert_eq!(bounds.min, [-1.0, -0.5, 0.0]);
        assert_eq!(bounds.max, [1.0, 0.5, 0.0]);
        assert_eq!(mesh.normal(7), Vec3::Z);
    }
}
