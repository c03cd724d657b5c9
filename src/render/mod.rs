//! The wgpu implementation of [`RenderBackend`].
//!
//! Nodes drive the backend in the immediate style of a classic state machine: uniforms are
//! written to the active program, textures bound to numbered units, and draws issued one by one.
//! Each program keeps a CPU copy of its uniform block. A draw snapshots the block of the active
//! program together with the blend, depth and texture state into the open pass, and the whole
//! pass is encoded and submitted by [`RenderBackend::end_pass`].

use std::collections::HashMap;

use anyhow::Result;
use wgpu::util::DeviceExt;

use crate::backend::{
    BlendMode, GeometryHandle, PassTarget, ProgramDescriptor, ProgramHandle, RenderBackend,
    RenderTargetHandle, TextureHandle, TextureUnit, UniformLocation, UniformValue,
    VertexAttribute,
};
use crate::error::Error;
use crate::geometry::Geometry;
use crate::render::buffer::GeometryBuffers;
use crate::render::pipeline::{RenderPipeline, RenderPipelineConfiguration};
use crate::render::shader::{ShaderModulePackage, ShaderTemplateConfiguration};
use crate::render::state::{RenderSystemState, COLOR_TEXTURE_UNITS, DEPTH_TEXTURE_UNIT};
use crate::render::texture::{
    create_color_sampler, create_depth_sampler, validate_render_target, DepthTexture2DPackage,
    RenderTarget, Texture2DPackage, TextureResource, RENDER_TARGET_FORMAT,
};
use crate::render::uniform::{align_to, UniformBlock, UniformLayout, UNIFORM_BLOCK_SIZE};

mod buffer;
mod pipeline;
mod shader;
mod state;
mod texture;
mod uniform;

const TEXTURE_UNIT_COUNT: usize = (COLOR_TEXTURE_UNITS + 1) as usize;

/// The texture sampled by each unit of a draw, defaults already substituted.
type TextureBindings = [TextureHandle; TEXTURE_UNIT_COUNT];

struct Program {
    descriptor: ProgramDescriptor,
    shader_modules: ShaderModulePackage,
    uniforms: UniformBlock,
}

struct RecordedDraw {
    pipeline: RenderPipelineConfiguration,
    geometry: GeometryHandle,
    textures: TextureBindings,
    uniform_offset: u32,
}

struct OpenPass {
    target: PassTarget,
    draws: Vec<RecordedDraw>,
    uniform_data: Vec<u8>,
}

pub struct WgpuBackend {
    state: RenderSystemState,
    programs: Vec<Program>,
    geometries: Vec<GeometryBuffers>,
    textures: Vec<TextureResource>,
    render_targets: Vec<RenderTarget>,
    pipelines: HashMap<RenderPipelineConfiguration, RenderPipeline>,
    texture_bind_groups: HashMap<TextureBindings, wgpu::BindGroup>,
    color_sampler: wgpu::Sampler,
    depth_sampler: wgpu::Sampler,
    default_color_texture: TextureHandle,
    default_depth_texture: TextureHandle,
    uniform_stride: usize,
    active_program: Option<ProgramHandle>,
    blend_mode: Option<BlendMode>,
    depth_test: bool,
    bound_textures: [Option<TextureHandle>; TEXTURE_UNIT_COUNT],
    pass: Option<OpenPass>,
}

impl WgpuBackend {
    pub async fn from_window(window: std::sync::Arc<winit::window::Window>) -> Result<Self> {
        let state = RenderSystemState::from_window(window).await?;

        let uniform_stride = align_to(
            UNIFORM_BLOCK_SIZE as usize,
            state.device.limits().min_uniform_buffer_offset_alignment as usize,
        );

        let mut textures = Vec::new();
        textures.push(TextureResource::Color(
            Texture2DPackage::create_default_texture(&state.device, &state.queue),
        ));
        textures.push(TextureResource::Depth(
            DepthTexture2DPackage::create_default_texture(&state.device, &state.queue),
        ));

        Ok(Self {
            color_sampler: create_color_sampler(&state.device),
            depth_sampler: create_depth_sampler(&state.device),
            state,
            programs: vec![],
            geometries: vec![],
            textures,
            render_targets: vec![],
            pipelines: HashMap::new(),
            texture_bind_groups: HashMap::new(),
            default_color_texture: TextureHandle(0),
            default_depth_texture: TextureHandle(1),
            uniform_stride,
            active_program: None,
            blend_mode: None,
            depth_test: true,
            bound_textures: [None; TEXTURE_UNIT_COUNT],
            pass: None,
        })
    }

    pub fn sync_view_dimensions(&mut self) {
        self.set_view_dimensions(self.state.view_dimensions);
    }

    pub fn set_view_dimensions(&mut self, view_dimensions: winit::dpi::PhysicalSize<u32>) {
        if view_dimensions.width == 0 || view_dimensions.height == 0 {
            return;
        }

        self.state.set_view_dimensions(view_dimensions);
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.state.surface_config.width as f32 / self.state.surface_config.height.max(1) as f32
    }

    fn add_texture(&mut self, texture: TextureResource) -> TextureHandle {
        self.textures.push(texture);
        TextureHandle(self.textures.len() as u32 - 1)
    }

    fn texture(&self, handle: TextureHandle) -> Result<&TextureResource> {
        match self.textures.get(handle.0 as usize) {
            Some(texture) => Ok(texture),
            None => Err(Error::UnknownResource(format!("{handle:?}")).into()),
        }
    }

    fn render_target(&self, handle: RenderTargetHandle) -> Result<&RenderTarget> {
        match self.render_targets.get(handle.0 as usize) {
            Some(render_target) => Ok(render_target),
            None => Err(Error::UnknownResource(format!("{handle:?}")).into()),
        }
    }

    fn pass_format(&self, target: PassTarget) -> wgpu::TextureFormat {
        match target {
            PassTarget::Screen => self.state.surface_config.format,
            PassTarget::Offscreen(_) => RENDER_TARGET_FORMAT,
        }
    }

    /// Substitutes defaults for empty units and for textures that cannot be sampled by the unit
    /// they are bound to.
    fn resolve_textures(&self, target: PassTarget) -> TextureBindings {
        let mut bindings = [self.default_color_texture; TEXTURE_UNIT_COUNT];
        bindings[DEPTH_TEXTURE_UNIT as usize] = self.default_depth_texture;

        let rendered_depth = match target {
            PassTarget::Offscreen(handle) => self
                .render_targets
                .get(handle.0 as usize)
                .map(|render_target| render_target.depth_texture),
            PassTarget::Screen => None,
        };

        for (unit, bound) in self.bound_textures.iter().enumerate() {
            let handle = match bound {
                Some(handle) => *handle,
                None => continue,
            };

            let is_depth = match self.textures.get(handle.0 as usize) {
                Some(texture) => texture.is_depth(),
                None => {
                    log::warn!("Ignoring unknown {handle:?} bound to unit {unit}");
                    continue;
                }
            };

            if is_depth != (unit as u32 == DEPTH_TEXTURE_UNIT) {
                log::warn!("{handle:?} cannot be sampled through unit {unit}");
                continue;
            }

            if rendered_depth == Some(handle) {
                log::warn!("{handle:?} is the depth attachment of the open pass, sampling a default");
                continue;
            }

            bindings[unit] = handle;
        }

        bindings
    }

    fn prepare_pipeline(&mut self, config: RenderPipelineConfiguration) -> Result<()> {
        if self.pipelines.contains_key(&config) {
            return Ok(());
        }

        let program = match self.programs.get(config.program.0 as usize) {
            Some(program) => program,
            None => return Err(Error::UnknownResource(format!("{:?}", config.program)).into()),
        };

        let pipeline = RenderPipeline::from_config(
            config,
            &program.descriptor.name,
            &self.state.device,
            &self.state.pipeline_layout,
            &program.descriptor.attributes,
            &program.shader_modules.vertex_shader_module,
            &program.shader_modules.fragment_shader_module,
        );

        self.pipelines.insert(config, pipeline);

        Ok(())
    }

    fn prepare_texture_bind_group(&mut self, bindings: TextureBindings) -> Result<()> {
        if self.texture_bind_groups.contains_key(&bindings) {
            return Ok(());
        }

        let bind_group = {
            let views = bindings
                .iter()
                .map(|handle| self.texture(*handle).map(|texture| texture.view()))
                .collect::<Result<Vec<_>>>()?;

            let mut entries = Vec::with_capacity(TEXTURE_UNIT_COUNT * 2);
            for (unit, view) in views.iter().enumerate() {
                let sampler = match unit as u32 == DEPTH_TEXTURE_UNIT {
                    true => &self.depth_sampler,
                    false => &self.color_sampler,
                };

                entries.push(wgpu::BindGroupEntry {
                    binding: unit as u32 * 2,
                    resource: wgpu::BindingResource::TextureView(view),
                });
                entries.push(wgpu::BindGroupEntry {
                    binding: unit as u32 * 2 + 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                });
            }

            self.state
                .device
                .create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("TEXTURE_BIND_GROUP"),
                    layout: &self.state.texture_bind_group_layout,
                    entries: &entries,
                })
        };

        log::debug!("Created texture bind group for {bindings:?}");
        self.texture_bind_groups.insert(bindings, bind_group);

        Ok(())
    }
}

impl RenderBackend for WgpuBackend {
    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<ProgramHandle> {
        let layout = UniformLayout::from_descriptor(descriptor)?;
        let shader_template_config = ShaderTemplateConfiguration::from_program(descriptor, &layout);

        let shader_modules = ShaderModulePackage::from_templates(
            &descriptor.vertex_template,
            &descriptor.fragment_template,
            &descriptor.name,
            &self.state.device,
            &self.state.tera,
            &shader_template_config,
        )?;

        self.programs.push(Program {
            descriptor: descriptor.clone(),
            shader_modules,
            uniforms: UniformBlock::new(layout),
        });

        Ok(ProgramHandle(self.programs.len() as u32 - 1))
    }

    fn create_geometry(&mut self, geometry: &Geometry) -> Result<GeometryHandle> {
        if !geometry.has_attribute(VertexAttribute::Position) {
            return Err(Error::new(String::from("The given geometry has no positions.")).into());
        }

        let name = format!("GEOMETRY_{}", self.geometries.len());
        self.geometries.push(GeometryBuffers::from_geometry(
            geometry,
            &name,
            &self.state.device,
        ));

        Ok(GeometryHandle(self.geometries.len() as u32 - 1))
    }

    fn create_texture(&mut self, image: &image::RgbaImage) -> Result<TextureHandle> {
        let name = format!("TEXTURE_{}", self.textures.len());
        let texture =
            Texture2DPackage::from_image(image, &name, &self.state.device, &self.state.queue);

        Ok(self.add_texture(TextureResource::Color(texture)))
    }

    fn create_render_target(&mut self, width: u32, height: u32) -> Result<RenderTargetHandle> {
        validate_render_target(&self.state.adapter, &self.state.device.limits(), width, height)?;

        let name = format!("RENDER_TARGET_{}", self.render_targets.len());
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let color_texture = RenderTarget::create_color_texture(&name, &self.state.device, size);
        let depth_texture = self.add_texture(TextureResource::Depth(DepthTexture2DPackage::new(
            &format!("{name}_DEPTH_TEXTURE"),
            &self.state.device,
            size,
        )));

        self.render_targets.push(RenderTarget {
            color_texture,
            depth_texture,
        });

        log::info!("Created {width}x{height} render target {name}");

        Ok(RenderTargetHandle(self.render_targets.len() as u32 - 1))
    }

    fn render_target_depth_texture(&self, target: RenderTargetHandle) -> Option<TextureHandle> {
        self.render_targets
            .get(target.0 as usize)
            .map(|render_target| render_target.depth_texture)
    }

    fn begin_pass(&mut self, target: PassTarget) -> Result<()> {
        if let Some(pass) = &self.pass {
            return Err(Error::PassOrder(format!(
                "cannot begin {target:?} while {:?} is still open",
                pass.target
            ))
            .into());
        }

        if let PassTarget::Offscreen(handle) = target {
            self.render_target(handle)?;
        }

        self.pass = Some(OpenPass {
            target,
            draws: vec![],
            uniform_data: vec![],
        });

        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        let mut pass = match self.pass.take() {
            Some(pass) => pass,
            None => return Err(Error::PassOrder(String::from("no pass is open")).into()),
        };

        for draw in pass.draws.iter() {
            self.prepare_pipeline(draw.pipeline)?;
            self.prepare_texture_bind_group(draw.textures)?;
        }

        if pass.uniform_data.is_empty() {
            pass.uniform_data.resize(self.uniform_stride, 0);
        }

        let uniform_buffer =
            self.state
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("UNIFORM_BUFFER"),
                    contents: &pass.uniform_data,
                    usage: wgpu::BufferUsages::UNIFORM,
                });

        let uniform_bind_group = self
            .state
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("UNIFORM_BIND_GROUP"),
                layout: &self.state.uniform_bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &uniform_buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(UNIFORM_BLOCK_SIZE),
                    }),
                }],
            });

        let mut surface_texture = None;
        let screen_view;
        let (color_view, depth_view, clear_color) = match pass.target {
            PassTarget::Screen => {
                let output = self.state.surface.get_current_texture()?;
                screen_view = output
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                surface_texture = Some(output);

                (
                    &screen_view,
                    &self.state.depth_texture.gpu_texture_view,
                    wgpu::Color {
                        r: 0.1,
                        g: 0.2,
                        b: 0.3,
                        a: 1.0,
                    },
                )
            }
            PassTarget::Offscreen(handle) => {
                let render_target = self.render_target(handle)?;

                (
                    &render_target.color_texture.gpu_texture_view,
                    self.texture(render_target.depth_texture)?.view(),
                    wgpu::Color::WHITE,
                )
            }
        };

        let mut encoder =
            self.state
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("RENDER_SYSTEM_COMMAND_ENCODER"),
                });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("RENDER_SYSTEM_RENDER_PASS"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for draw in pass.draws.iter() {
                let (pipeline, texture_bind_group, program, geometry) = match (
                    self.pipelines.get(&draw.pipeline),
                    self.texture_bind_groups.get(&draw.textures),
                    self.programs.get(draw.pipeline.program.0 as usize),
                    self.geometries.get(draw.geometry.0 as usize),
                ) {
                    (Some(pipeline), Some(texture_bind_group), Some(program), Some(geometry)) => {
                        (pipeline, texture_bind_group, program, geometry)
                    }
                    _ => continue,
                };

                render_pass.set_pipeline(&pipeline.gpu_pipeline);
                render_pass.set_bind_group(0, &uniform_bind_group, &[draw.uniform_offset]);
                render_pass.set_bind_group(1, texture_bind_group, &[]);

                for (slot, attribute) in program.descriptor.attributes.iter().enumerate() {
                    if let Some(vertex_buffer) = geometry.vertex_buffer(*attribute) {
                        render_pass
                            .set_vertex_buffer(slot as u32, vertex_buffer.gpu_buffer.slice(..));
                    }
                }

                match &geometry.index_buffer {
                    Some(index_buffer) => {
                        render_pass
                            .set_index_buffer(index_buffer.gpu_buffer.slice(..), index_buffer.type_);
                        render_pass.draw_indexed(0..geometry.count, 0, 0..1);
                    }
                    None => {
                        render_pass.draw(0..geometry.count, 0..1);
                    }
                }
            }
        }

        self.state.queue.submit(std::iter::once(encoder.finish()));

        if let Some(output) = surface_texture {
            output.present();
        }

        Ok(())
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.active_program = program;
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let slot = self
            .programs
            .get(program.0 as usize)?
            .uniforms
            .layout
            .slot(name)?;

        Some(UniformLocation {
            program,
            slot: slot as u32,
        })
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        if let Some(program) = self.programs.get_mut(location.program.0 as usize) {
            program.uniforms.write(location.slot as usize, value);
        }
    }

    fn attribute_location(
        &self,
        program: ProgramHandle,
        attribute: VertexAttribute,
    ) -> Option<u32> {
        let program = self.programs.get(program.0 as usize)?;

        match program.descriptor.attributes.contains(&attribute) {
            true => Some(attribute.location()),
            false => None,
        }
    }

    fn bind_attribute(
        &mut self,
        geometry: GeometryHandle,
        attribute: VertexAttribute,
        location: u32,
    ) {
        // every geometry carries all attributes, the pipeline picks the buffers per draw
        if self.geometries.get(geometry.0 as usize).is_none() {
            log::warn!("Cannot bind {attribute:?} of unknown {geometry:?} to location {location}");
        }
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: Option<TextureHandle>) {
        match self.bound_textures.get_mut(unit.0 as usize) {
            Some(bound) => *bound = texture,
            None => log::warn!("Ignoring texture bound to unsupported {unit:?}"),
        }
    }

    fn set_blend_mode(&mut self, blend_mode: Option<BlendMode>) {
        self.blend_mode = blend_mode;
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    fn draw(&mut self, geometry: GeometryHandle) {
        let program_handle = match self.active_program {
            Some(program) => program,
            None => {
                log::warn!("Skipping draw of {geometry:?} without an active program");
                return;
            }
        };

        let target = match &self.pass {
            Some(pass) => pass.target,
            None => {
                log::warn!("Skipping draw of {geometry:?} outside of a pass");
                return;
            }
        };

        if self.geometries.get(geometry.0 as usize).is_none() {
            log::warn!("Skipping draw of unknown {geometry:?}");
            return;
        }

        let textures = self.resolve_textures(target);
        let pipeline = RenderPipelineConfiguration {
            program: program_handle,
            blend_mode: self.blend_mode,
            depth_test: self.depth_test,
            format: self.pass_format(target),
        };

        let (program, pass) = match (
            self.programs.get(program_handle.0 as usize),
            self.pass.as_mut(),
        ) {
            (Some(program), Some(pass)) => (program, pass),
            _ => return,
        };

        let uniform_offset = pass.uniform_data.len();
        pass.uniform_data
            .extend_from_slice(program.uniforms.data());
        pass.uniform_data
            .resize(uniform_offset + self.uniform_stride, 0);

        pass.draws.push(RecordedDraw {
            pipeline,
            geometry,
            textures,
            uniform_offset: uniform_offset as u32,
        });
    }
}
