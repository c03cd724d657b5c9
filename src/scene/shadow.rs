use cgmath::SquareMatrix;

use crate::backend::{TextureHandle, TextureUnit};
use crate::scene::context::{PassKind, RenderContext};
use crate::scene::{render_children, SceneNode};

/// Feeds the shadow map written by the shadow pass into the camera pass of its subtree.
///
/// `light_view_projection` is not computed here. The frame renderer stores it once per frame
/// after the shadow pass, and the camera pass must have `inv_view_matrix` set; stale values give
/// wrong shadows rather than an error.
pub struct ShadowNode {
    depth_texture: TextureHandle,
    unit: TextureUnit,
    width: u32,
    height: u32,
    light_view_projection: cgmath::Matrix4<f32>,
}

impl ShadowNode {
    pub fn new(depth_texture: TextureHandle, unit: TextureUnit, width: u32, height: u32) -> Self {
        Self {
            depth_texture,
            unit,
            width,
            height,
            light_view_projection: cgmath::Matrix4::identity(),
        }
    }

    pub fn depth_texture(&self) -> TextureHandle {
        self.depth_texture
    }

    pub fn unit(&self) -> TextureUnit {
        self.unit
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn light_view_projection(&self) -> cgmath::Matrix4<f32> {
        self.light_view_projection
    }

    pub fn set_light_view_projection(&mut self, light_view_projection: cgmath::Matrix4<f32>) {
        self.light_view_projection = light_view_projection;
    }

    /// Maps view space of the camera pass to clip space of the light.
    pub fn eye_to_light(&self, inv_view_matrix: cgmath::Matrix4<f32>) -> cgmath::Matrix4<f32> {
        self.light_view_projection * inv_view_matrix
    }

    pub fn render(&self, context: &mut RenderContext, children: &[SceneNode]) {
        // the depth map is being written in the shadow pass
        if context.pass == PassKind::Shadow {
            render_children(children, context);
            return;
        }

        let eye_to_light = self.eye_to_light(context.inv_view_matrix);
        context.set_uniform("u_eyeToLightMatrix", eye_to_light);
        context.set_uniform("u_shadowMapWidth", self.width as f32);
        context.set_uniform("u_shadowMapHeight", self.height as f32);
        context.set_uniform("u_depthMap", self.unit.0 as i32);
        context
            .backend
            .bind_texture(self.unit, Some(self.depth_texture));

        render_children(children, context);

        context.backend.bind_texture(self.unit, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::Command;
    use crate::backend::{RenderBackend, UniformValue};
    use crate::scene::test_support::*;

    #[test]
    fn camera_pass_samples_the_depth_map() {
        let (mut backend, program) = phong_backend();
        let target = backend.create_render_target(512, 256).unwrap();
        let depth = backend.render_target_depth_texture(target).unwrap();
        let leaf = cube_leaf(&mut backend);

        let light_view_projection =
            cgmath::Matrix4::from_translation(cgmath::Vector3::new(0.0, 0.0, -5.0));
        let inv_view = cgmath::Matrix4::from_angle_y(cgmath::Deg(20.0));

        let mut node = ShadowNode::new(depth, TextureUnit(3), 512, 256);
        node.set_light_view_projection(light_view_projection);
        let node = SceneNode::new(node).with_child(leaf);

        {
            let mut context = RenderContext::new(&mut backend, PassKind::Camera);
            context.activate_program(Some(program));
            context.inv_view_matrix = inv_view;
            node.render(&mut context);
        }

        assert_eq!(
            backend.uniform_value(program, "u_eyeToLightMatrix"),
            Some(UniformValue::from(light_view_projection * inv_view))
        );
        assert_eq!(
            backend.uniform_value(program, "u_shadowMapWidth"),
            Some(UniformValue::Float(512.0))
        );
        assert_eq!(
            backend.uniform_value(program, "u_shadowMapHeight"),
            Some(UniformValue::Float(256.0))
        );
        assert_eq!(
            backend.uniform_value(program, "u_depthMap"),
            Some(UniformValue::Int(3))
        );

        let commands = backend.commands();
        let draw = draw_positions(commands)[0];
        let bind = commands
            .iter()
            .position(|command| {
                command
                    == &Command::BindTexture {
                        unit: TextureUnit(3),
                        texture: Some(depth),
                    }
            })
            .unwrap();
        assert!(bind < draw);
        assert_eq!(
            commands.last(),
            Some(&Command::BindTexture {
                unit: TextureUnit(3),
                texture: None,
            })
        );
    }

    #[test]
    fn shadow_pass_does_not_read_the_map_it_writes() {
        let (mut backend, program) = phong_backend();
        let leaf = cube_leaf(&mut backend);
        let node = SceneNode::new(ShadowNode::new(TextureHandle(7), TextureUnit(3), 1024, 1024))
            .with_child(leaf);

        {
            let mut context = RenderContext::new(&mut backend, PassKind::Shadow);
            context.activate_program(Some(program));
            node.render(&mut context);
        }

        assert!(!backend
            .commands()
            .iter()
            .any(|command| matches!(command, Command::BindTexture { .. })));
        assert_eq!(backend.draw_count(), 1);
    }
}
