use std::collections::HashMap;

use anyhow::Result;

use crate::backend::{
    BlendMode, GeometryHandle, PassTarget, ProgramDescriptor, ProgramHandle, RenderBackend,
    RenderTargetHandle, TextureHandle, TextureUnit, UniformLocation, UniformValue,
    VertexAttribute,
};
use crate::error::Error;
use crate::geometry::Geometry;

/// One call made against a [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    BeginPass(PassTarget),
    EndPass,
    UseProgram(Option<ProgramHandle>),
    SetUniform {
        program: ProgramHandle,
        name: String,
        value: UniformValue,
    },
    BindAttribute {
        geometry: GeometryHandle,
        attribute: VertexAttribute,
        location: u32,
    },
    BindTexture {
        unit: TextureUnit,
        texture: Option<TextureHandle>,
    },
    SetBlendMode(Option<BlendMode>),
    SetDepthTest(bool),
    Draw {
        program: ProgramHandle,
        geometry: GeometryHandle,
        count: usize,
        indexed: bool,
    },
}

/// Platform features a [`RecordingBackend`] pretends to have.
#[derive(Clone, Copy, Debug)]
pub struct Capabilities {
    pub depth_texture: bool,
    pub max_texture_dimension: u32,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            depth_texture: true,
            max_texture_dimension: 8192,
        }
    }
}

struct RecordedProgram {
    descriptor: ProgramDescriptor,
    values: HashMap<String, UniformValue>,
}

struct RecordedRenderTarget {
    depth_texture: TextureHandle,
}

/// A headless backend that keeps a log of every call instead of issuing GPU work.
///
/// It also remembers the last value written to each uniform of each program, which makes it
/// possible to inspect what a draw call would have seen.
pub struct RecordingBackend {
    capabilities: Capabilities,
    commands: Vec<Command>,
    programs: Vec<RecordedProgram>,
    geometries: Vec<Geometry>,
    texture_count: u32,
    render_targets: Vec<RecordedRenderTarget>,
    active_program: Option<ProgramHandle>,
    active_pass: Option<PassTarget>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::with_capabilities(Capabilities::default())
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            commands: vec![],
            programs: vec![],
            geometries: vec![],
            texture_count: 0,
            render_targets: vec![],
            active_program: None,
            active_pass: None,
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn active_program(&self) -> Option<ProgramHandle> {
        self.active_program
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, Command::Draw { .. }))
            .count()
    }

    /// The last value written to `name` on `program`, if any.
    pub fn uniform_value(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
        self.programs
            .get(program.0 as usize)
            .and_then(|recorded| recorded.values.get(name))
            .copied()
    }

    /// Every value written to `name`, in call order, across all programs.
    pub fn uniform_writes(&self, name: &str) -> Vec<UniformValue> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::SetUniform {
                    name: written,
                    value,
                    ..
                } if written == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    fn program(&self, program: ProgramHandle) -> Option<&RecordedProgram> {
        self.programs.get(program.0 as usize)
    }
}

impl RenderBackend for RecordingBackend {
    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<ProgramHandle> {
        log::debug!("Recording program {}", descriptor.name);

        self.programs.push(RecordedProgram {
            descriptor: descriptor.clone(),
            values: HashMap::new(),
        });

        Ok(ProgramHandle(self.programs.len() as u32 - 1))
    }

    fn create_geometry(&mut self, geometry: &Geometry) -> Result<GeometryHandle> {
        if !geometry.has_attribute(VertexAttribute::Position) {
            return Err(Error::new(String::from("The given geometry has no positions.")).into());
        }

        self.geometries.push(geometry.clone());

        Ok(GeometryHandle(self.geometries.len() as u32 - 1))
    }

    fn create_texture(&mut self, image: &image::RgbaImage) -> Result<TextureHandle> {
        log::debug!(
            "Recording texture {}x{}",
            image.dimensions().0,
            image.dimensions().1
        );

        self.texture_count += 1;

        Ok(TextureHandle(self.texture_count - 1))
    }

    fn create_render_target(&mut self, width: u32, height: u32) -> Result<RenderTargetHandle> {
        if !self.capabilities.depth_texture {
            return Err(Error::UnsupportedCapability(String::from(
                "depth textures cannot be used as render attachments",
            ))
            .into());
        }

        let max = self.capabilities.max_texture_dimension;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(Error::RenderTargetIncomplete(format!(
                "attachments of {width}x{height} are outside 1..={max}"
            ))
            .into());
        }

        self.texture_count += 1;
        self.render_targets.push(RecordedRenderTarget {
            depth_texture: TextureHandle(self.texture_count - 1),
        });

        Ok(RenderTargetHandle(self.render_targets.len() as u32 - 1))
    }

    fn render_target_depth_texture(&self, target: RenderTargetHandle) -> Option<TextureHandle> {
        self.render_targets
            .get(target.0 as usize)
            .map(|render_target| render_target.depth_texture)
    }

    fn begin_pass(&mut self, target: PassTarget) -> Result<()> {
        if let Some(active_pass) = self.active_pass {
            return Err(Error::PassOrder(format!(
                "cannot begin {target:?} while {active_pass:?} is still open"
            ))
            .into());
        }

        if let PassTarget::Offscreen(handle) = target {
            if self.render_targets.get(handle.0 as usize).is_none() {
                return Err(Error::UnknownResource(format!("{handle:?}")).into());
            }
        }

        self.active_pass = Some(target);
        self.commands.push(Command::BeginPass(target));

        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        if self.active_pass.take().is_none() {
            return Err(Error::PassOrder(String::from("no pass is open")).into());
        }

        self.commands.push(Command::EndPass);

        Ok(())
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.active_program = program;
        self.commands.push(Command::UseProgram(program));
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let recorded = self.program(program)?;

        recorded
            .descriptor
            .uniforms
            .iter()
            .position(|(uniform_name, _)| uniform_name == name)
            .map(|slot| UniformLocation {
                program,
                slot: slot as u32,
            })
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let recorded = match self.programs.get_mut(location.program.0 as usize) {
            Some(recorded) => recorded,
            None => return,
        };

        let (name, kind) = match recorded.descriptor.uniforms.get(location.slot as usize) {
            Some(uniform) => uniform.clone(),
            None => return,
        };

        if kind != value.kind() {
            log::warn!("Ignoring {:?} written to {kind:?} uniform {name}", value.kind());
            return;
        }

        recorded.values.insert(name.clone(), value);
        self.commands.push(Command::SetUniform {
            program: location.program,
            name,
            value,
        });
    }

    fn attribute_location(
        &self,
        program: ProgramHandle,
        attribute: VertexAttribute,
    ) -> Option<u32> {
        let recorded = self.program(program)?;

        match recorded.descriptor.attributes.contains(&attribute) {
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
        let has_attribute = match self.geometries.get(geometry.0 as usize) {
            Some(recorded) => recorded.has_attribute(attribute),
            None => false,
        };

        if has_attribute {
            self.commands.push(Command::BindAttribute {
                geometry,
                attribute,
                location,
            });
        }
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: Option<TextureHandle>) {
        self.commands.push(Command::BindTexture { unit, texture });
    }

    fn set_blend_mode(&mut self, blend_mode: Option<BlendMode>) {
        self.commands.push(Command::SetBlendMode(blend_mode));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.commands.push(Command::SetDepthTest(enabled));
    }

    fn draw(&mut self, geometry: GeometryHandle) {
        let program = match self.active_program {
            Some(program) => program,
            None => {
                log::warn!("Skipping draw of {geometry:?} without an active program");
                return;
            }
        };

        let (count, indexed) = match self.geometries.get(geometry.0 as usize) {
            Some(recorded) => (recorded.element_count(), recorded.is_indexed()),
            None => {
                log::warn!("Skipping draw of unknown {geometry:?}");
                return;
            }
        };

        self.commands.push(Command::Draw {
            program,
            geometry,
            count,
            indexed,
        });
    }
}
