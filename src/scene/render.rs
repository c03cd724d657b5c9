use cgmath::{Matrix, SquareMatrix};

use crate::backend::{GeometryHandle, VertexAttribute};
use crate::scene::context::RenderContext;
use crate::scene::{render_children, SceneNode};

/// Draws one geometry with the active program.
pub struct RenderNode {
    geometry: GeometryHandle,
}

impl RenderNode {
    pub fn new(geometry: GeometryHandle) -> Self {
        Self { geometry }
    }

    pub fn geometry(&self) -> GeometryHandle {
        self.geometry
    }

    pub fn render(&self, context: &mut RenderContext, children: &[SceneNode]) {
        match context.shader {
            Some(program) => {
                let model_view = context.model_view_matrix();
                context.set_uniform("u_modelView", model_view);
                context.set_uniform("u_normalMatrix", normal_matrix(model_view));

                for attribute in VertexAttribute::ALL {
                    if let Some(location) = context.backend.attribute_location(program, attribute) {
                        context
                            .backend
                            .bind_attribute(self.geometry, attribute, location);
                    }
                }

                context.backend.draw(self.geometry);
            }
            None => log::warn!("Skipping {:?}: no shader is active", self.geometry),
        }

        render_children(children, context);
    }
}

/// The inverse transpose of the upper 3x3 of `model_view`.
pub fn normal_matrix(model_view: cgmath::Matrix4<f32>) -> cgmath::Matrix3<f32> {
    let upper = cgmath::Matrix3::from_cols(
        model_view.x.truncate(),
        model_view.y.truncate(),
        model_view.z.truncate(),
    );

    match upper.invert() {
        Some(inverse) => inverse.transpose(),
        None => upper,
    }
}
