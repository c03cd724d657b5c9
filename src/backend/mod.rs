//! The seam between the scene graph and a concrete graphics API.
//!
//! Scene nodes never talk to a device directly; every state change, uniform write and draw goes
//! through [`RenderBackend`], which keeps the graph independent of wgpu and lets the headless
//! [`recording::RecordingBackend`] stand in for tests and batch runs.

use anyhow::Result;

use crate::geometry::Geometry;

pub mod recording;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct GeometryHandle(pub u32);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct RenderTargetHandle(pub u32);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct TextureUnit(pub u32);

/// A resolved uniform slot of one program. Only ever obtained from
/// [`RenderBackend::uniform_location`], so holding one means the slot exists.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct UniformLocation {
    pub program: ProgramHandle,
    pub slot: u32,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum UniformKind {
    Int,
    Float,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([[f32; 3]; 3]),
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat3(_) => UniformKind::Mat3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        UniformValue::Int(value as i32)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<cgmath::Vector3<f32>> for UniformValue {
    fn from(value: cgmath::Vector3<f32>) -> Self {
        UniformValue::Vec3(value.into())
    }
}

impl From<cgmath::Matrix3<f32>> for UniformValue {
    fn from(value: cgmath::Matrix3<f32>) -> Self {
        UniformValue::Mat3(value.into())
    }
}

impl From<cgmath::Matrix4<f32>> for UniformValue {
    fn from(value: cgmath::Matrix4<f32>) -> Self {
        UniformValue::Mat4(value.into())
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum VertexAttribute {
    Position,
    Normal,
    TextureCoordinate,
    Color,
}

impl VertexAttribute {
    pub const ALL: [VertexAttribute; 4] = [
        VertexAttribute::Position,
        VertexAttribute::Normal,
        VertexAttribute::TextureCoordinate,
        VertexAttribute::Color,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VertexAttribute::Position => "a_position",
            VertexAttribute::Normal => "a_normal",
            VertexAttribute::TextureCoordinate => "a_texCoord",
            VertexAttribute::Color => "a_color",
        }
    }

    /// Fixed shader input location of the attribute.
    pub fn location(&self) -> u32 {
        match self {
            VertexAttribute::Position => 0,
            VertexAttribute::Normal => 1,
            VertexAttribute::TextureCoordinate => 2,
            VertexAttribute::Color => 3,
        }
    }

    pub fn component_count(&self) -> u32 {
        match self {
            VertexAttribute::Position | VertexAttribute::Normal => 3,
            VertexAttribute::TextureCoordinate => 2,
            VertexAttribute::Color => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BlendMode {
    /// `src * src_alpha + dst * (1 - src_alpha)`
    Alpha,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PassTarget {
    Screen,
    Offscreen(RenderTargetHandle),
}

/// Declares a shader program: the templates it is built from, the named uniform slots it exposes
/// and the vertex attributes it reads.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgramDescriptor {
    pub name: String,
    pub vertex_template: String,
    pub fragment_template: String,
    pub uniforms: Vec<(String, UniformKind)>,
    pub attributes: Vec<VertexAttribute>,
}

impl ProgramDescriptor {
    pub fn new(name: &str, vertex_template: &str, fragment_template: &str) -> Self {
        Self {
            name: name.to_string(),
            vertex_template: vertex_template.to_string(),
            fragment_template: fragment_template.to_string(),
            uniforms: vec![],
            attributes: vec![VertexAttribute::Position],
        }
    }

    pub fn with_uniform(mut self, name: &str, kind: UniformKind) -> Self {
        self.uniforms.push((name.to_string(), kind));
        self
    }

    pub fn with_attribute(mut self, attribute: VertexAttribute) -> Self {
        if !self.attributes.contains(&attribute) {
            self.attributes.push(attribute);
        }
        self
    }

    pub fn uniform_kind(&self, name: &str) -> Option<UniformKind> {
        self.uniforms
            .iter()
            .find(|(uniform_name, _)| uniform_name == name)
            .map(|(_, kind)| *kind)
    }

    fn with_transform_uniforms(self) -> Self {
        self.with_uniform("u_modelView", UniformKind::Mat4)
            .with_uniform("u_projection", UniformKind::Mat4)
    }

    fn with_light_uniforms(self, namespace: &str) -> Self {
        self.with_uniform(&format!("{namespace}.ambient"), UniformKind::Vec4)
            .with_uniform(&format!("{namespace}.diffuse"), UniformKind::Vec4)
            .with_uniform(&format!("{namespace}.specular"), UniformKind::Vec4)
    }

    /// The lit program: phong material, one directional, one point and one spot light slot,
    /// up to three object textures and a shadow map.
    pub fn phong() -> Self {
        let mut descriptor = Self::new("PHONG", "phong/phong.vert", "phong/phong.frag")
            .with_attribute(VertexAttribute::Normal)
            .with_attribute(VertexAttribute::TextureCoordinate)
            .with_transform_uniforms()
            .with_uniform("u_normalMatrix", UniformKind::Mat3)
            .with_uniform("u_material.ambient", UniformKind::Vec4)
            .with_uniform("u_material.diffuse", UniformKind::Vec4)
            .with_uniform("u_material.specular", UniformKind::Vec4)
            .with_uniform("u_material.emission", UniformKind::Vec4)
            .with_uniform("u_material.shininess", UniformKind::Float)
            .with_uniform("u_alpha", UniformKind::Float)
            .with_light_uniforms("u_dirLight")
            .with_uniform("u_dirLightDir", UniformKind::Vec3)
            .with_light_uniforms("u_light")
            .with_uniform("u_lightPos", UniformKind::Vec3)
            .with_light_uniforms("u_spotLight")
            .with_uniform("u_spotLightPos", UniformKind::Vec3)
            .with_uniform("u_spotLightDir", UniformKind::Vec3)
            .with_uniform("u_spotLight.angle", UniformKind::Float)
            .with_uniform("u_spotLight.cutoff", UniformKind::Float);

        for slot in 1..=3 {
            descriptor = descriptor
                .with_uniform(&format!("u_enableObjectTexture{slot}"), UniformKind::Int)
                .with_uniform(&format!("u_tex{slot}"), UniformKind::Int);
        }

        descriptor
            .with_uniform("u_wobbleTime", UniformKind::Float)
            .with_uniform("u_eyeToLightMatrix", UniformKind::Mat4)
            .with_uniform("u_shadowMapWidth", UniformKind::Float)
            .with_uniform("u_shadowMapHeight", UniformKind::Float)
            .with_uniform("u_depthMap", UniformKind::Int)
    }

    /// Unlit program used for debug geometry such as light spheres.
    pub fn single() -> Self {
        Self::new("SINGLE", "single/single.vert", "single/single.frag")
            .with_attribute(VertexAttribute::Color)
            .with_transform_uniforms()
    }

    /// Depth-only program forced onto every draw of the shadow pass.
    pub fn depth() -> Self {
        Self::new("DEPTH", "depth/depth.vert", "depth/depth.frag").with_transform_uniforms()
    }
}

/// Everything the scene graph needs from a graphics API.
///
/// Resource creation and pass boundaries are fallible; per-node state changes are not, so a
/// broken uniform or texture can never abort a frame.
pub trait RenderBackend {
    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<ProgramHandle>;
    fn create_geometry(&mut self, geometry: &Geometry) -> Result<GeometryHandle>;
    fn create_texture(&mut self, image: &image::RgbaImage) -> Result<TextureHandle>;

    /// Creates an off-screen colour + depth target whose depth attachment can later be sampled.
    /// Missing depth-texture support and incomplete targets are reported here, once.
    fn create_render_target(&mut self, width: u32, height: u32) -> Result<RenderTargetHandle>;
    fn render_target_depth_texture(&self, target: RenderTargetHandle) -> Option<TextureHandle>;

    fn begin_pass(&mut self, target: PassTarget) -> Result<()>;
    fn end_pass(&mut self) -> Result<()>;

    fn use_program(&mut self, program: Option<ProgramHandle>);
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);
    fn attribute_location(&self, program: ProgramHandle, attribute: VertexAttribute)
        -> Option<u32>;
    fn bind_attribute(&mut self, geometry: GeometryHandle, attribute: VertexAttribute, location: u32);
    fn bind_texture(&mut self, unit: TextureUnit, texture: Option<TextureHandle>);
    fn set_blend_mode(&mut self, blend_mode: Option<BlendMode>);
    fn set_depth_test(&mut self, enabled: bool);
    fn draw(&mut self, geometry: GeometryHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_programs_follow_the_uniform_naming_convention() {
        let phong = ProgramDescriptor::phong();

        for name in [
            "u_material.ambient",
            "u_light.diffuse",
            "u_lightPos",
            "u_spotLightDir",
            "u_enableObjectTexture1",
            "u_tex1",
            "u_depthMap",
            "u_eyeToLightMatrix",
            "u_shadowMapWidth",
            "u_shadowMapHeight",
            "u_modelView",
            "u_projection",
            "u_normalMatrix",
            "u_alpha",
        ] {
            assert!(phong.uniform_kind(name).is_some(), "missing {name}");
        }

        assert_eq!(
            ProgramDescriptor::depth().uniform_kind("u_material.ambient"),
            None
        );
    }

    #[test]
    fn uniform_values_convert_from_math_types() {
        use cgmath::SquareMatrix;

        assert_eq!(UniformValue::from(true), UniformValue::Int(1));
        assert_eq!(
            UniformValue::from(cgmath::Matrix4::<f32>::identity()).kind(),
            UniformKind::Mat4
        );
    }
}
