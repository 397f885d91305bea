use glam::{Mat3, Mat4, Vec3};

use crate::math::{Transform, normal_matrix};
use crate::resources::material::{Material, MaterialPropertyBlock};
use crate::resources::mesh::Mesh;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ObjectTransform {
    Matrix(Mat4),
    Decomposed(Transform),
}

/// One queued draw request. Lives only inside a camera's queue.
#[derive(Debug, Clone)]
pub(crate) struct RenderObject {
    pub mesh: Mesh,
    pub transform: ObjectTransform,
    pub material: Material,
    pub property_block: Option<MaterialPropertyBlock>,
    /// World-space bounds midpoint; only computed for transparent materials
    pub world_midpoint: Vec3,
}

impl RenderObject {
    pub fn new(
        mesh: Mesh,
        transform: ObjectTransform,
        material: Material,
        property_block: Option<MaterialPropertyBlock>,
    ) -> Self {
        let world_midpoint = if material.is_transparent() {
            let model = match &transform {
                ObjectTransform::Matrix(m) => *m,
                ObjectTransform::Decomposed(t) => t.to_mat4(),
            };
            model.transform_point3(mesh.midpoint())
        } else {
            Vec3::ZERO
        };

        Self {
            mesh,
            transform,
            material,
            property_block,
            world_midpoint,
        }
    }

    pub fn model_matrix(&self) -> Mat4 {
        match &self.transform {
            ObjectTransform::Matrix(m) => *m,
            ObjectTransform::Decomposed(t) => t.to_mat4(),
        }
    }

    pub fn normal_matrix(&self) -> Mat3 {
        normal_matrix(&self.model_matrix())
    }

    pub fn is_depth_tested(&self) -> bool {
        self.material.is_depth_tested()
    }

    pub fn is_transparent(&self) -> bool {
        self.material.is_transparent()
    }
}
