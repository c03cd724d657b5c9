use crate::backend::BlendMode;
use crate::scene::context::{PassKind, RenderContext};
use crate::scene::{render_children, SceneNode};

/// Phong coefficients uploaded under `u_material`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub emission: [f32; 4],
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: [0.2, 0.2, 0.2, 1.0],
            diffuse: [0.8, 0.8, 0.8, 1.0],
            specular: [0.0, 0.0, 0.0, 1.0],
            emission: [0.0, 0.0, 0.0, 1.0],
            shininess: 0.0,
        }
    }
}

impl Material {
    pub fn with_ambient(mut self, ambient: [f32; 4]) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn with_diffuse(mut self, diffuse: [f32; 4]) -> Self {
        self.diffuse = diffuse;
        self
    }

    pub fn with_specular(mut self, specular: [f32; 4]) -> Self {
        self.specular = specular;
        self
    }

    pub fn with_emission(mut self, emission: [f32; 4]) -> Self {
        self.emission = emission;
        self
    }

    pub fn with_shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess;
        self
    }

    fn upload(&self, context: &mut RenderContext, alpha: f32) {
        context.set_uniform("u_material.ambient", self.ambient);
        context.set_uniform("u_material.diffuse", self.diffuse);
        context.set_uniform("u_material.specular", self.specular);
        context.set_uniform("u_material.emission", self.emission);
        context.set_uniform("u_material.shininess", self.shininess);
        context.set_uniform("u_alpha", alpha);
    }
}

pub struct MaterialNode {
    pub material: Material,
}

impl MaterialNode {
    pub fn new(material: Material) -> Self {
        Self { material }
    }

    pub fn render(&self, context: &mut RenderContext, children: &[SceneNode]) {
        self.material.upload(context, 1.0);

        render_children(children, context);
    }
}

/// A material that blends its subtree over what is already drawn when `alpha` is below one.
pub struct TransparentMaterialNode {
    pub material: Material,
    alpha: f32,
}

impl TransparentMaterialNode {
    pub fn new(material: Material, alpha: f32) -> Self {
        Self {
            material,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn render(&self, context: &mut RenderContext, children: &[SceneNode]) {
        self.material.upload(context, self.alpha);

        // depth maps are written opaque
        if self.alpha >= 1.0 || context.pass == PassKind::Shadow {
            render_children(children, context);
            return;
        }

        let previous_blend_mode = context.blend_mode;
        let previous_depth_test = context.depth_test;
        context.set_blend_mode(Some(BlendMode::Alpha));
        context.set_depth_test(false);

        render_children(children, context);

        context.set_depth_test(previous_depth_test);
        context.set_blend_mode(previous_blend_mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::Command;
    use crate::backend::UniformValue;
    use crate::scene::test_support::*;
    use crate::scene::NodeKind;

    fn state_commands(commands: &[Command]) -> Vec<Command> {
        commands
            .iter()
            .filter(|command| {
                matches!(
                    command,
                    Command::SetBlendMode(_) | Command::SetDepthTest(_) | Command::Draw { .. }
                )
            })
            .cloned()
            .collect()
    }

    #[test]
    fn opaque_alpha_changes_no_blend_state() {
        let (mut backend, program) = phong_backend();
        let leaf = cube_leaf(&mut backend);
        let node = SceneNode::new(TransparentMaterialNode::new(Material::default(), 1.0))
            .with_child(leaf);

        {
            let mut context = RenderContext::new(&mut backend, PassKind::Camera);
            context.activate_program(Some(program));
            node.render(&mut context);
        }

        let commands = state_commands(backend.commands());
        assert_eq!(commands.len(), 1);
        assert!(matches!(commands[0], Command::Draw { .. }));
        assert_eq!(
            backend.uniform_value(program, "u_alpha"),
            Some(UniformValue::Float(1.0))
        );
    }

    #[test]
    fn partial_alpha_blends_only_around_the_subtree() {
        let (mut backend, program) = phong_backend();
        let leaf = cube_leaf(&mut backend);
        let node = SceneNode::new(TransparentMaterialNode::new(Material::default(), 0.5))
            .with_child(leaf);

        {
            let mut context = RenderContext::new(&mut backend, PassKind::Camera);
            context.activate_program(Some(program));
            node.render(&mut context);
            assert_eq!(context.blend_mode, None);
            assert!(context.depth_test);
        }

        let commands = state_commands(backend.commands());
        assert_eq!(commands.len(), 5);
        assert_eq!(commands[0], Command::SetBlendMode(Some(BlendMode::Alpha)));
        assert_eq!(commands[1], Command::SetDepthTest(false));
        assert!(matches!(commands[2], Command::Draw { .. }));
        assert_eq!(commands[3], Command::SetDepthTest(true));
        assert_eq!(commands[4], Command::SetBlendMode(None));
    }

    #[test]
    fn nested_transparency_does_not_toggle_twice() {
        let (mut backend, program) = phong_backend();
        let leaf = cube_leaf(&mut backend);
        let node = SceneNode::new(TransparentMaterialNode::new(Material::default(), 0.5))
            .with_child(
                SceneNode::new(TransparentMaterialNode::new(Material::default(), 0.25))
                    .with_child(leaf),
            );

        {
            let mut context = RenderContext::new(&mut backend, PassKind::Camera);
            context.activate_program(Some(program));
            node.render(&mut context);
        }

        let toggles = state_commands(backend.commands())
            .into_iter()
            .filter(|command| matches!(command, Command::SetBlendMode(_)))
            .count();
        assert_eq!(toggles, 2);
    }

    #[test]
    fn material_fields_use_the_material_namespace() {
        let (mut backend, program) = phong_backend();
        let material = Material::default()
            .with_ambient([1.0, 0.0, 0.0, 1.0])
            .with_specular([0.5, 0.5, 0.5, 1.0])
            .with_shininess(50.0);

        {
            let mut context = RenderContext::new(&mut backend, PassKind::Camera);
            context.activate_program(Some(program));
            SceneNode::new(MaterialNode::new(material)).render(&mut context);
        }

        assert_eq!(
            backend.uniform_value(program, "u_material.ambient"),
            Some(UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]))
        );
        assert_eq!(
            backend.uniform_value(program, "u_material.diffuse"),
            Some(UniformValue::Vec4([0.8, 0.8, 0.8, 1.0]))
        );
        assert_eq!(
            backend.uniform_value(program, "u_material.shininess"),
            Some(UniformValue::Float(50.0))
        );
    }

    #[test]
    fn materials_without_a_program_are_skipped() {
        let (mut backend, _) = phong_backend();

        {
            let mut context = RenderContext::new(&mut backend, PassKind::Camera);
            SceneNode::new(MaterialNode::new(Material::default())).render(&mut context);
        }

        assert!(backend.commands().is_empty());
    }

    #[test]
    fn set_alpha_switches_between_opaque_and_blended() {
        let (mut backend, program) = phong_backend();
        let leaf = cube_leaf(&mut backend);
        let mut node = SceneNode::new(TransparentMaterialNode::new(Material::default(), 0.5))
            .with_child(leaf);

        match node.kind_mut() {
            NodeKind::TransparentMaterial(material) => material.set_alpha(1.5),
            _ => unreachable!(),
        }
        {
            let mut context = RenderContext::new(&mut backend, PassKind::Camera);
            context.activate_program(Some(program));
            node.render(&mut context);
        }

        assert_eq!(
            backend.uniform_value(program, "u_alpha"),
            Some(UniformValue::Float(1.0))
        );
        assert!(!backend
            .commands()
            .iter()
            .any(|command| matches!(command, Command::SetBlendMode(_))));

        match node.kind_mut() {
            NodeKind::TransparentMaterial(material) => material.set_alpha(0.25),
            _ => unreachable!(),
        }
        backend.clear_commands();
        {
            let mut context = RenderContext::new(&mut backend, PassKind::Camera);
            context.activate_program(Some(program));
            node.render(&mut context);
        }

        assert_eq!(
            backend.uniform_value(program, "u_alpha"),
            Some(UniformValue::Float(0.25))
        );
        assert_eq!(
            state_commands(backend.commands())[0],
            Command::SetBlendMode(Some(BlendMode::Alpha))
        );
    }
}

