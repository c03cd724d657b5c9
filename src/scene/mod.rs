//! The retained scene graph.
//!
//! A [`SceneNode`] owns its children exclusively and in draw order. Behaviour comes from a closed
//! set of node kinds ([`NodeKind`]); each kind injects its state change around the traversal of
//! the children and undoes it afterwards.

use std::sync::atomic::{AtomicU64, Ordering};

use cgmath::SquareMatrix;

pub mod context;
pub mod light;
pub mod material;
pub mod render;
pub mod shader;
pub mod shadow;
pub mod texture;
pub mod transform;

use crate::scene::context::{PassKind, RenderContext};
use crate::scene::light::{DirectionalLightNode, PointLightNode, SpotLightNode};
use crate::scene::material::{MaterialNode, TransparentMaterialNode};
use crate::scene::render::RenderNode;
use crate::scene::shader::ShaderNode;
use crate::scene::shadow::ShadowNode;
use crate::scene::texture::TextureNode;
use crate::scene::transform::TransformNode;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

pub enum NodeKind {
    Group,
    Transform(TransformNode),
    Shader(ShaderNode),
    Material(MaterialNode),
    TransparentMaterial(TransparentMaterialNode),
    DirectionalLight(DirectionalLightNode),
    PointLight(PointLightNode),
    SpotLight(SpotLightNode),
    Texture(TextureNode),
    Shadow(ShadowNode),
    Render(RenderNode),
}

macro_rules! node_kind_from {
    ($($variant:ident($payload:ty)),* $(,)?) => {
        $(
            impl From<$payload> for NodeKind {
                fn from(value: $payload) -> Self {
                    NodeKind::$variant(value)
                }
            }
        )*
    };
}

node_kind_from!(
    Transform(TransformNode),
    Shader(ShaderNode),
    Material(MaterialNode),
    TransparentMaterial(TransparentMaterialNode),
    DirectionalLight(DirectionalLightNode),
    PointLight(PointLightNode),
    SpotLight(SpotLightNode),
    Texture(TextureNode),
    Shadow(ShadowNode),
    Render(RenderNode),
);

impl NodeKind {
    /// The transform this node applies to its children.
    pub fn local_matrix(&self) -> cgmath::Matrix4<f32> {
        match self {
            NodeKind::Transform(node) => node.matrix(),
            NodeKind::PointLight(node) => node.local_matrix(),
            NodeKind::SpotLight(node) => node.local_matrix(),
            _ => cgmath::Matrix4::identity(),
        }
    }
}

pub struct SceneNode {
    id: NodeId,
    kind: NodeKind,
    children: Vec<SceneNode>,
    casts_shadow: bool,
}

impl SceneNode {
    pub fn new(kind: impl Into<NodeKind>) -> Self {
        Self {
            id: NodeId::next(),
            kind: kind.into(),
            children: vec![],
            casts_shadow: true,
        }
    }

    pub fn group() -> Self {
        Self::new(NodeKind::Group)
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = SceneNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Leaves this subtree out of the shadow pass.
    pub fn without_shadow(mut self) -> Self {
        self.casts_shadow = false;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    pub fn casts_shadow(&self) -> bool {
        self.casts_shadow
    }

    pub fn set_casts_shadow(&mut self, casts_shadow: bool) {
        self.casts_shadow = casts_shadow;
    }

    /// Adds `child` after the existing children and returns it for further assembly.
    ///
    /// Tree shape is guaranteed by ownership: a node that is moved in here cannot also be one of
    /// this node's ancestors.
    pub fn append(&mut self, child: SceneNode) -> &mut SceneNode {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Removes the direct child with the given id. Returns whether it was found.
    pub fn remove(&mut self, id: NodeId) -> bool {
        self.detach(id).is_some()
    }

    /// Removes the direct child with the given id and hands it back.
    pub fn detach(&mut self, id: NodeId) -> Option<SceneNode> {
        let index = self.children.iter().position(|child| child.id == id)?;
        Some(self.children.remove(index))
    }

    pub fn find(&self, id: NodeId) -> Option<&SceneNode> {
        if self.id == id {
            return Some(self);
        }

        self.children.iter().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        if self.id == id {
            return Some(self);
        }

        self.children
            .iter_mut()
            .find_map(|child| child.find_mut(id))
    }

    /// The accumulated model matrix that is in effect when the node `id` renders, i.e. the
    /// product of the transforms of its ancestors, or `None` if `id` is not in this subtree.
    pub fn accumulated_matrix(&self, id: NodeId) -> Option<cgmath::Matrix4<f32>> {
        self.model_matrix_below(id, cgmath::Matrix4::identity())
    }

    fn model_matrix_below(
        &self,
        id: NodeId,
        parent: cgmath::Matrix4<f32>,
    ) -> Option<cgmath::Matrix4<f32>> {
        if self.id == id {
            return Some(parent);
        }

        let local = parent * self.kind.local_matrix();
        self.children
            .iter()
            .find_map(|child| child.model_matrix_below(id, local))
    }

    /// Replaces the matrix of a transform node. Returns `false` for any other kind.
    pub fn set_matrix(&mut self, matrix: cgmath::Matrix4<f32>) -> bool {
        match &mut self.kind {
            NodeKind::Transform(node) => {
                node.set_matrix(matrix);
                true
            }
            _ => false,
        }
    }

    /// Local position of a point or spot light.
    pub fn light_position(&self) -> Option<cgmath::Vector3<f32>> {
        match &self.kind {
            NodeKind::PointLight(node) => Some(node.position()),
            NodeKind::SpotLight(node) => Some(node.position()),
            _ => None,
        }
    }

    pub fn as_shadow_mut(&mut self) -> Option<&mut ShadowNode> {
        match &mut self.kind {
            NodeKind::Shadow(node) => Some(node),
            _ => None,
        }
    }

    pub fn render(&self, context: &mut RenderContext) {
        if context.pass == PassKind::Shadow && !self.casts_shadow {
            return;
        }

        match &self.kind {
            NodeKind::Group => render_children(&self.children, context),
            NodeKind::Transform(node) => node.render(context, &self.children),
            NodeKind::Shader(node) => node.render(context, &self.children),
            NodeKind::Material(node) => node.render(context, &self.children),
            NodeKind::TransparentMaterial(node) => node.render(context, &self.children),
            NodeKind::DirectionalLight(node) => node.render(context, &self.children),
            NodeKind::PointLight(node) => node.render(context, &self.children),
            NodeKind::SpotLight(node) => node.render(context, &self.children),
            NodeKind::Texture(node) => node.render(context, &self.children),
            NodeKind::Shadow(node) => node.render(context, &self.children),
            NodeKind::Render(node) => node.render(context, &self.children),
        }
    }
}

/// Renders `children` in insertion order with the same context.
pub fn render_children(children: &[SceneNode], context: &mut RenderContext) {
    for child in children {
        child.render(context);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::backend::recording::{Command, RecordingBackend};
    use crate::backend::{ProgramDescriptor, ProgramHandle, RenderBackend};
    use crate::geometry::make_cube;
    use crate::scene::render::RenderNode;
    use crate::scene::SceneNode;

    pub fn assert_matrix_eq(actual: cgmath::Matrix4<f32>, expected: cgmath::Matrix4<f32>) {
        let actual: [[f32; 4]; 4] = actual.into();
        let expected: [[f32; 4]; 4] = expected.into();

        for column in 0..4 {
            for row in 0..4 {
                assert!(
                    (actual[column][row] - expected[column][row]).abs() < 1e-4,
                    "{actual:?} != {expected:?}"
                );
            }
        }
    }

    pub fn phong_backend() -> (RecordingBackend, ProgramHandle) {
        let mut backend = RecordingBackend::new();
        let program = backend
            .create_program(&ProgramDescriptor::phong())
            .unwrap();
        (backend, program)
    }

    pub fn cube_leaf(backend: &mut RecordingBackend) -> SceneNode {
        let geometry = backend.create_geometry(&make_cube(1.0)).unwrap();
        SceneNode::new(RenderNode::new(geometry))
    }

    pub fn draw_positions(commands: &[Command]) -> Vec<usize> {
        commands
            .iter()
            .enumerate()
            .filter(|(_, command)| matches!(command, Command::Draw { .. }))
            .map(|(index, _)| index)
            .collect()
    }
}
