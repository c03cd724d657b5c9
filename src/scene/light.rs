//! Light nodes.
//!
//! Positions and directions are given in the node's local space and are moved into view space
//! with the model-view matrix in effect when the node renders, so a light follows the transforms
//! above it exactly like geometry does. Each light writes into its own uniform namespace, which
//! is how several lights of one kind can feed distinct slots of a program.

use cgmath::InnerSpace;

use crate::scene::context::RenderContext;
use crate::scene::transform::render_transformed;
use crate::scene::{render_children, SceneNode};

pub const DIRECTIONAL_LIGHT_NAMESPACE: &str = "u_dirLight";
pub const POINT_LIGHT_NAMESPACE: &str = "u_light";
pub const SPOT_LIGHT_NAMESPACE: &str = "u_spotLight";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightColors {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
}

impl Default for LightColors {
    fn default() -> Self {
        Self {
            ambient: [0.0, 0.0, 0.0, 1.0],
            diffuse: [1.0, 1.0, 1.0, 1.0],
            specular: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

impl LightColors {
    fn upload(&self, context: &mut RenderContext, namespace: &str) {
        context.set_uniform(&format!("{namespace}.ambient"), self.ambient);
        context.set_uniform(&format!("{namespace}.diffuse"), self.diffuse);
        context.set_uniform(&format!("{namespace}.specular"), self.specular);
    }
}

/// `position` (w = 1) in view space.
pub fn view_space_position(
    context: &RenderContext,
    position: cgmath::Vector3<f32>,
) -> cgmath::Vector3<f32> {
    (context.model_view_matrix() * position.extend(1.0)).truncate()
}

/// `direction` (w = 0) in view space: rotated by the upper 3x3 of the model-view matrix, never
/// translated, and renormalized unless it is zero.
pub fn view_space_direction(
    context: &RenderContext,
    direction: cgmath::Vector3<f32>,
) -> cgmath::Vector3<f32> {
    let model_view = context.model_view_matrix();
    let rotated = (model_view * direction.extend(0.0)).truncate();

    match rotated.magnitude2() > f32::EPSILON {
        true => rotated.normalize(),
        false => rotated,
    }
}

/// A light infinitely far away, shining along `direction`.
pub struct DirectionalLightNode {
    pub colors: LightColors,
    direction: cgmath::Vector3<f32>,
    namespace: String,
}

impl DirectionalLightNode {
    pub fn new(direction: cgmath::Vector3<f32>) -> Self {
        Self {
            colors: LightColors::default(),
            direction,
            namespace: DIRECTIONAL_LIGHT_NAMESPACE.to_string(),
        }
    }

    pub fn with_colors(mut self, colors: LightColors) -> Self {
        self.colors = colors;
        self
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn direction(&self) -> cgmath::Vector3<f32> {
        self.direction
    }

    pub fn set_direction(&mut self, direction: cgmath::Vector3<f32>) {
        self.direction = direction;
    }

    pub fn render(&self, context: &mut RenderContext, children: &[SceneNode]) {
        let direction = view_space_direction(context, self.direction);

        self.colors.upload(context, &self.namespace);
        context.set_uniform(&format!("{}Dir", self.namespace), direction);

        render_children(children, context);
    }
}

/// A light at `position` that also places its children there.
pub struct PointLightNode {
    pub colors: LightColors,
    position: cgmath::Vector3<f32>,
    namespace: String,
}

impl PointLightNode {
    pub fn new(position: cgmath::Vector3<f32>) -> Self {
        Self {
            colors: LightColors::default(),
            position,
            namespace: POINT_LIGHT_NAMESPACE.to_string(),
        }
    }

    pub fn with_colors(mut self, colors: LightColors) -> Self {
        self.colors = colors;
        self
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn position(&self) -> cgmath::Vector3<f32> {
        self.position
    }

    pub fn set_position(&mut self, position: cgmath::Vector3<f32>) {
        self.position = position;
    }

    pub fn local_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
    }

    pub fn render(&self, context: &mut RenderContext, children: &[SceneNode]) {
        let position = view_space_position(context, self.position);

        self.colors.upload(context, &self.namespace);
        context.set_uniform(&format!("{}Pos", self.namespace), position);

        render_transformed(context, self.local_matrix(), children);
    }
}

/// A point light restricted to a cone around `direction`.
pub struct SpotLightNode {
    pub colors: LightColors,
    position: cgmath::Vector3<f32>,
    direction: cgmath::Vector3<f32>,
    /// Half opening angle of the cone.
    angle: cgmath::Rad<f32>,
    /// Falloff exponent towards the cone border.
    cutoff: f32,
    namespace: String,
}

impl SpotLightNode {
    pub fn new(
        position: cgmath::Vector3<f32>,
        direction: cgmath::Vector3<f32>,
        angle: impl Into<cgmath::Rad<f32>>,
        cutoff: f32,
    ) -> Self {
        Self {
            colors: LightColors::default(),
            position,
            direction,
            angle: angle.into(),
            cutoff,
            namespace: SPOT_LIGHT_NAMESPACE.to_string(),
        }
    }

    pub fn with_colors(mut self, colors: LightColors) -> Self {
        self.colors = colors;
        self
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn position(&self) -> cgmath::Vector3<f32> {
        self.position
    }

    pub fn set_position(&mut self, position: cgmath::Vector3<f32>) {
        self.position = position;
    }

    pub fn direction(&self) -> cgmath::Vector3<f32> {
        self.direction
    }

    pub fn set_direction(&mut self, direction: cgmath::Vector3<f32>) {
        self.direction = direction;
    }

    pub fn angle(&self) -> cgmath::Rad<f32> {
        self.angle
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn local_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
    }

    pub fn render(&self, context: &mut RenderContext, children: &[SceneNode]) {
        let position = view_space_position(context, self.position);
        let direction = view_space_direction(context, self.direction);

        self.colors.upload(context, &self.namespace);
        context.set_uniform(&format!("{}Pos", self.namespace), position);
        context.set_uniform(&format!("{}Dir", self.namespace), direction);
        context.set_uniform(&format!("{}.angle", self.namespace), self.angle.0);
        context.set_uniform(&format!("{}.cutoff", self.namespace), self.cutoff);

        render_transformed(context, self.local_matrix(), children);
    }
}
