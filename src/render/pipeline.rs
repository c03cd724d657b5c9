use crate::backend::{BlendMode, ProgramHandle, VertexAttribute};
use crate::render::texture::DEPTH_FORMAT;

pub struct RenderPipeline {
    pub gpu_pipeline: wgpu::RenderPipeline,
}

impl RenderPipeline {
    pub fn from_config(
        config: RenderPipelineConfiguration,
        name: &str,
        device: &wgpu::Device,
        pipeline_layout: &wgpu::PipelineLayout,
        attributes: &[VertexAttribute],
        vertex_shader_module: &wgpu::ShaderModule,
        fragment_shader_module: &wgpu::ShaderModule,
    ) -> Self {
        log::debug!("Creating render pipeline {name} for {config:?}");

        let vertex_buffer_layout_builder =
            RenderPipeline::create_vertex_buffer_layout_builder(attributes);

        let (depth_write_enabled, depth_compare) = match config.depth_test {
            true => (true, wgpu::CompareFunction::Less),
            false => (false, wgpu::CompareFunction::Always),
        };

        let blend = match config.blend_mode {
            Some(BlendMode::Alpha) => wgpu::BlendState::ALPHA_BLENDING,
            None => wgpu::BlendState {
                color: wgpu::BlendComponent::REPLACE,
                alpha: wgpu::BlendComponent::REPLACE,
            },
        };

        let gpu_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{name}_RENDER_PIPELINE")),
            layout: Some(pipeline_layout),
            vertex: wgpu::VertexState {
                module: vertex_shader_module,
                entry_point: "vs_main",
                buffers: &vertex_buffer_layout_builder.build(),
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: fragment_shader_module,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled,
                depth_compare,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        Self { gpu_pipeline }
    }

    /// One tightly packed buffer per attribute, in the order the program lists them. The buffer
    /// slot of an attribute is its index in `attributes`.
    fn create_vertex_buffer_layout_builder(
        attributes: &[VertexAttribute],
    ) -> VertexBufferLayoutBuilder {
        let mut builder: VertexBufferLayoutBuilder = Default::default();

        for attribute in attributes {
            let component_count = attribute.component_count();

            builder.add(VertexBufferLayoutBuilderEntry {
                array_stride: (component_count as usize * std::mem::size_of::<f32>())
                    as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: vec![wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: attribute.location(),
                    format: match component_count {
                        2 => wgpu::VertexFormat::Float32x2,
                        3 => wgpu::VertexFormat::Float32x3,
                        _ => wgpu::VertexFormat::Float32x4,
                    },
                }],
            });
        }

        builder
    }
}

/// Everything a pipeline is specialised for. Pipelines are cached by this key, so every
/// combination of state a draw uses is built once.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RenderPipelineConfiguration {
    pub program: ProgramHandle,
    pub blend_mode: Option<BlendMode>,
    pub depth_test: bool,
    pub format: wgpu::TextureFormat,
}

#[derive(Default)]
struct VertexBufferLayoutBuilder {
    entries: Vec<VertexBufferLayoutBuilderEntry>,
}

impl VertexBufferLayoutBuilder {
    pub fn add(&mut self, entry: VertexBufferLayoutBuilderEntry) {
        self.entries.push(entry);
    }

    pub fn build(&self) -> Vec<wgpu::VertexBufferLayout> {
        self.entries
            .iter()
            .map(|entry| wgpu::VertexBufferLayout {
                array_stride: entry.array_stride,
                step_mode: entry.step_mode,
                attributes: &entry.attributes,
            })
            .collect()
    }
}

struct VertexBufferLayoutBuilderEntry {
    array_stride: wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode,
    attributes: Vec<wgpu::VertexAttribute>,
}
