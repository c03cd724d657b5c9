use anyhow::Result;

use crate::backend::ProgramDescriptor;
use crate::render::uniform::UniformLayout;

pub struct ShaderModulePackage {
    pub vertex_shader_module: wgpu::ShaderModule,
    pub fragment_shader_module: wgpu::ShaderModule,
}

impl ShaderModulePackage {
    pub fn from_templates(
        vertex_template_name: &str,
        fragment_template_name: &str,
        name: &str,
        device: &wgpu::Device,
        tera: &tera::Tera,
        shader_template_config: &ShaderTemplateConfiguration,
    ) -> Result<Self> {
        let shader_template_context = tera::Context::from_serialize(shader_template_config)?;

        let vertex_shader_source = ShaderModulePackage::render_shader(
            vertex_template_name,
            tera,
            &shader_template_context,
        )?;

        let fragment_shader_source = ShaderModulePackage::render_shader(
            fragment_template_name,
            tera,
            &shader_template_context,
        )?;

        log::debug!(
            "Creating shader module package {name} with {} uniforms",
            shader_template_config.uniforms.len()
        );

        Ok(ShaderModulePackage {
            vertex_shader_module: device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{}_VERTEX_SHADER_MODULE", name)),
                source: wgpu::ShaderSource::Wgsl(vertex_shader_source.into()),
            }),
            fragment_shader_module: device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{}_FRAGMENT_SHADER_MODULE", name)),
                source: wgpu::ShaderSource::Wgsl(fragment_shader_source.into()),
            }),
        })
    }

    fn render_shader(
        template_name: &str,
        tera: &tera::Tera,
        template_context: &tera::Context,
    ) -> Result<String> {
        match tera.render(template_name, template_context) {
            Ok(shader_source) => Ok(shader_source),
            Err(error) => Err(error.into()),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
pub struct ShaderUniformMember {
    pub name: String,
    pub wgsl_type: &'static str,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
pub struct ShaderVertexInput {
    pub name: &'static str,
    pub location: u32,
    pub wgsl_type: &'static str,
}

/// Values the shader templates are rendered with: the members of the uniform struct, in block
/// order, and the vertex inputs the program reads.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
pub struct ShaderTemplateConfiguration {
    pub uniforms: Vec<ShaderUniformMember>,
    pub attributes: Vec<ShaderVertexInput>,
}

impl ShaderTemplateConfiguration {
    pub fn from_program(descriptor: &ProgramDescriptor, layout: &UniformLayout) -> Self {
        Self {
            uniforms: layout
                .fields
                .iter()
                .map(|field| ShaderUniformMember {
                    name: field.member_name.clone(),
                    wgsl_type: field.wgsl_type,
                })
                .collect(),
            attributes: descriptor
                .attributes
                .iter()
                .map(|attribute| ShaderVertexInput {
                    name: attribute.name(),
                    location: attribute.location(),
                    wgsl_type: match attribute.component_count() {
                        2 => "vec2<f32>",
                        3 => "vec3<f32>",
                        _ => "vec4<f32>",
                    },
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shader_tera() -> tera::Tera {
        tera::Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/**/*")).unwrap()
    }

    fn render(template_name: &str, descriptor: &ProgramDescriptor) -> String {
        let layout = UniformLayout::from_descriptor(descriptor).unwrap();
        let config = ShaderTemplateConfiguration::from_program(descriptor, &layout);
        let context = tera::Context::from_serialize(&config).unwrap();

        shader_tera().render(template_name, &context).unwrap()
    }

    #[test]
    fn uniform_struct_lists_every_member_in_order() {
        let source = render("depth/depth.vert", &ProgramDescriptor::depth());

        let model_view = source.find("u_modelView: mat4x4<f32>").unwrap();
        let projection = source.find("u_projection: mat4x4<f32>").unwrap();
        assert!(model_view < projection);
    }

    #[test]
    fn dotted_names_become_struct_members() {
        let source = render("phong/phong.frag", &ProgramDescriptor::phong());

        assert!(source.contains("u_material_ambient: vec4<f32>"));
        assert!(source.contains("u_spotLight_cutoff: f32"));
        assert!(!source.contains("u_material.ambient"));
    }

    #[test]
    fn vertex_inputs_follow_the_program_attributes() {
        let source = render("single/single.vert", &ProgramDescriptor::single());

        assert!(source.contains("@location(0) a_position: vec3<f32>"));
        assert!(source.contains("@location(3) a_color: vec4<f32>"));
        assert!(!source.contains("a_normal"));
    }
}
