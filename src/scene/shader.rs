use crate::backend::ProgramHandle;
use crate::scene::context::{PassKind, RenderContext};
use crate::scene::{render_children, SceneNode};

/// Switches the active program for a subtree.
pub struct ShaderNode {
    program: ProgramHandle,
}

impl ShaderNode {
    pub fn new(program: ProgramHandle) -> Self {
        Self { program }
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn render(&self, context: &mut RenderContext, children: &[SceneNode]) {
        // the shadow pass keeps the depth program installed by the frame renderer
        if context.pass == PassKind::Shadow {
            render_children(children, context);
            return;
        }

        let previous = context.shader;
        context.activate_program(Some(self.program));

        // every program has its own uniform namespace
        let projection = context.projection_matrix;
        context.set_uniform("u_projection", projection);

        render_children(children, context);

        context.activate_program(previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Command, RecordingBackend};
    use crate::backend::{ProgramDescriptor, RenderBackend, UniformValue};
    use crate::geometry::make_sphere;
    use crate::scene::render::RenderNode;

    #[test]
    fn nested_shader_restores_the_outer_program() {
        let mut backend = RecordingBackend::new();
        let phong = backend
            .create_program(&ProgramDescriptor::phong())
            .unwrap();
        let single = backend
            .create_program(&ProgramDescriptor::single())
            .unwrap();
        let sphere = backend
            .create_geometry(&make_sphere(0.2, 10, 10))
            .unwrap();

        let root = SceneNode::new(ShaderNode::new(phong)).with_children([
            SceneNode::new(ShaderNode::new(single))
                .with_child(SceneNode::new(RenderNode::new(sphere))),
            SceneNode::new(RenderNode::new(sphere)),
        ]);

        let projection = cgmath::Matrix4::from_nonuniform_scale(2.0, 3.0, 1.0);
        {
            let mut context = RenderContext::new(&mut backend, PassKind::Camera);
            context.projection_matrix = projection;
            root.render(&mut context);
            assert_eq!(context.shader, None);
        }

        let programs: Vec<_> = backend
            .commands()
            .iter()
            .filter_map(|command| match command {
                Command::UseProgram(program) => Some(*program),
                Command::Draw { program, .. } => Some(Some(*program)),
                _ => None,
            })
            .collect();

        assert_eq!(
            programs,
            vec![
                Some(phong),
                Some(single),
                Some(single),
                Some(phong),
                Some(phong),
                None
            ]
        );
        assert_eq!(
            backend.uniform_value(single, "u_projection"),
            Some(UniformValue::from(projection))
        );
        assert_eq!(
            backend.uniform_value(phong, "u_projection"),
            Some(UniformValue::from(projection))
        );
    }

    #[test]
    fn shadow_pass_keeps_the_installed_program() {
        let mut backend = RecordingBackend::new();
        let depth = backend
            .create_program(&ProgramDescriptor::depth())
            .unwrap();
        let phong = backend
            .create_program(&ProgramDescriptor::phong())
            .unwrap();

        let node = SceneNode::new(ShaderNode::new(phong));
        {
            let mut context = RenderContext::new(&mut backend, PassKind::Shadow);
            context.activate_program(Some(depth));
            node.render(&mut context);
            assert_eq!(context.shader, Some(depth));
        }

        assert_eq!(backend.commands(), &[Command::UseProgram(Some(depth))]);
    }
}
