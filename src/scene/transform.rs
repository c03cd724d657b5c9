use cgmath::SquareMatrix;

use crate::data::transform::Transform;
use crate::scene::context::RenderContext;
use crate::scene::{render_children, SceneNode};

pub struct TransformNode {
    matrix: cgmath::Matrix4<f32>,
}

impl Default for TransformNode {
    fn default() -> Self {
        Self::new(cgmath::Matrix4::identity())
    }
}

impl From<Transform> for TransformNode {
    fn from(transform: Transform) -> Self {
        Self::new(transform.matrix())
    }
}

impl TransformNode {
    pub fn new(matrix: cgmath::Matrix4<f32>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> cgmath::Matrix4<f32> {
        self.matrix
    }

    /// Takes effect on the next traversal.
    pub fn set_matrix(&mut self, matrix: cgmath::Matrix4<f32>) {
        self.matrix = matrix;
    }

    pub fn render(&self, context: &mut RenderContext, children: &[SceneNode]) {
        render_transformed(context, self.matrix, children);
    }
}

/// Renders `children` with `matrix` right-multiplied into the model matrix, then restores it.
pub(crate) fn render_transformed(
    context: &mut RenderContext,
    matrix: cgmath::Matrix4<f32>,
    children: &[SceneNode],
) {
    let previous = context.model_matrix;
    context.model_matrix = previous * matrix;

    render_children(children, context);

    context.model_matrix = previous;
}
