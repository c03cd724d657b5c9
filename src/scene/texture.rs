use anyhow::Result;

use crate::backend::{TextureHandle, TextureUnit};
use crate::error::Error;
use crate::scene::context::RenderContext;
use crate::scene::{render_children, SceneNode};

pub const MAX_NODE_TEXTURES: usize = 3;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TextureBinding {
    pub texture: TextureHandle,
    pub unit: TextureUnit,
}

/// Binds one to three object textures for a subtree.
///
/// The texture in slot `n` (counting from one) enables `u_enableObjectTexture{n}` and tells the
/// shader its unit through `u_tex{n}`.
pub struct TextureNode {
    bindings: Vec<TextureBinding>,
}

impl TextureNode {
    pub fn new(texture: TextureHandle, unit: TextureUnit) -> Self {
        Self {
            bindings: vec![TextureBinding { texture, unit }],
        }
    }

    pub fn with_bindings(bindings: &[TextureBinding]) -> Result<Self> {
        if bindings.is_empty() || bindings.len() > MAX_NODE_TEXTURES {
            return Err(Error::TextureCount(bindings.len()).into());
        }

        Ok(Self {
            bindings: bindings.to_vec(),
        })
    }

    pub fn bindings(&self) -> &[TextureBinding] {
        &self.bindings
    }

    pub fn render(&self, context: &mut RenderContext, children: &[SceneNode]) {
        for (index, binding) in self.bindings.iter().enumerate() {
            let slot = index + 1;
            context.set_uniform(&format!("u_enableObjectTexture{slot}"), true);
            context.set_uniform(&format!("u_tex{slot}"), binding.unit.0 as i32);
            context.backend.bind_texture(binding.unit, Some(binding.texture));
        }

        let seconds = (context.time_ms / 1000.0) as f32;
        context.set_uniform("u_wobbleTime", seconds);

        render_children(children, context);

        for (index, binding) in self.bindings.iter().enumerate() {
            context.backend.bind_texture(binding.unit, None);
            context.set_uniform(&format!("u_enableObjectTexture{}", index + 1), false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::Command;
    use crate::backend::{RenderBackend, UniformValue};
    use crate::scene::context::PassKind;
    use crate::scene::test_support::*;

    #[test]
    fn textures_are_unbound_after_the_children() {
        let (mut backend, program) = phong_backend();
        let first = backend
            .create_texture(&image::RgbaImage::new(2, 2))
            .unwrap();
        let second = backend
            .create_texture(&image::RgbaImage::new(2, 2))
            .unwrap();
        let leaf = cube_leaf(&mut backend);

        let node = SceneNode::new(
            TextureNode::with_bindings(&[
                TextureBinding {
                    texture: first,
                    unit: TextureUnit(0),
                },
                TextureBinding {
                    texture: second,
                    unit: TextureUnit(1),
                },
            ])
            .unwrap(),
        )
        .with_child(leaf);

        {
            let mut context = RenderContext::new(&mut backend, PassKind::Camera);
            context.activate_program(Some(program));
            node.render(&mut context);
        }

        let commands = backend.commands();
        let draw = draw_positions(commands)[0];
        let binds: Vec<(usize, &Command)> = commands
            .iter()
            .enumerate()
            .filter(|(_, command)| matches!(command, Command::BindTexture { .. }))
            .collect();

        assert_eq!(binds.len(), 4);
        assert!(binds[..2].iter().all(|(index, _)| *index < draw));
        assert!(binds[2..].iter().all(|(index, _)| *index > draw));
        assert_eq!(
            binds[3].1,
            &Command::BindTexture {
                unit: TextureUnit(1),
                texture: None,
            }
        );

        assert_eq!(
            backend.uniform_writes("u_enableObjectTexture2"),
            vec![UniformValue::Int(1), UniformValue::Int(0)]
        );
        assert_eq!(
            backend.uniform_value(program, "u_tex2"),
            Some(UniformValue::Int(1))
        );
    }

    #[test]
    fn wobble_time_is_in_seconds() {
        let (mut backend, program) = phong_backend();
        let texture = backend
            .create_texture(&image::RgbaImage::new(1, 1))
            .unwrap();

        {
            let mut context = RenderContext::new(&mut backend, PassKind::Camera);
            context.activate_program(Some(program));
            context.time_ms = 2500.0;
            SceneNode::new(TextureNode::new(texture, TextureUnit(2))).render(&mut context);
        }

        assert_eq!(
            backend.uniform_value(program, "u_wobbleTime"),
            Some(UniformValue::Float(2.5))
        );
    }

    #[test]
    fn binding_count_must_be_one_to_three() {
        let binding = TextureBinding {
            texture: TextureHandle(0),
            unit: TextureUnit(0),
        };

        let error = TextureNode::with_bindings(&[]).err().unwrap();
        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::TextureCount(0))
        ));
        assert!(TextureNode::with_bindings(&[binding; 3]).is_ok());

        let error = TextureNode::with_bindings(&[binding; 4]).err().unwrap();
        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::TextureCount(4))
        ));
    }
}
