use cgmath::SquareMatrix;

use crate::backend::{BlendMode, ProgramHandle, RenderBackend, UniformValue};

/// Which of the two per-frame traversals is running.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PassKind {
    /// Depth-only traversal from the light's point of view. The orchestrator installs the depth
    /// program up front and shader nodes leave it in place.
    Shadow,
    /// Regular traversal from the camera.
    Camera,
}

/// Per-pass state threaded by reference through one traversal of the graph.
///
/// Nodes that change a field restore the previous value before returning, so the context seen
/// by a node only ever reflects its ancestors.
pub struct RenderContext<'a> {
    pub backend: &'a mut dyn RenderBackend,
    pub pass: PassKind,
    pub shader: Option<ProgramHandle>,
    pub model_matrix: cgmath::Matrix4<f32>,
    pub view_matrix: cgmath::Matrix4<f32>,
    pub inv_view_matrix: cgmath::Matrix4<f32>,
    pub projection_matrix: cgmath::Matrix4<f32>,
    pub time_ms: f64,
    pub blend_mode: Option<BlendMode>,
    pub depth_test: bool,
}

/// The save/restore fields of a [`RenderContext`], detached from the backend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContextState {
    pub shader: Option<ProgramHandle>,
    pub model_matrix: cgmath::Matrix4<f32>,
    pub blend_mode: Option<BlendMode>,
    pub depth_test: bool,
}

impl<'a> RenderContext<'a> {
    pub fn new(backend: &'a mut dyn RenderBackend, pass: PassKind) -> Self {
        Self {
            backend,
            pass,
            shader: None,
            model_matrix: cgmath::Matrix4::identity(),
            view_matrix: cgmath::Matrix4::identity(),
            inv_view_matrix: cgmath::Matrix4::identity(),
            projection_matrix: cgmath::Matrix4::identity(),
            time_ms: 0.0,
            blend_mode: None,
            depth_test: true,
        }
    }

    pub fn state(&self) -> ContextState {
        ContextState {
            shader: self.shader,
            model_matrix: self.model_matrix,
            blend_mode: self.blend_mode,
            depth_test: self.depth_test,
        }
    }

    pub fn model_view_matrix(&self) -> cgmath::Matrix4<f32> {
        self.view_matrix * self.model_matrix
    }

    /// Makes `program` current both in the context and on the backend.
    pub fn activate_program(&mut self, program: Option<ProgramHandle>) {
        self.shader = program;
        self.backend.use_program(program);
    }

    /// Writes a uniform of the active program. Returns `false` when there is no active program or
    /// the program has no uniform of that name; the write is skipped in both cases.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> bool {
        let program = match self.shader {
            Some(program) => program,
            None => return false,
        };

        match self.backend.uniform_location(program, name) {
            Some(location) => {
                self.backend.set_uniform(location, value.into());
                true
            }
            None => false,
        }
    }

    pub fn set_blend_mode(&mut self, blend_mode: Option<BlendMode>) {
        if self.blend_mode != blend_mode {
            self.blend_mode = blend_mode;
            self.backend.set_blend_mode(blend_mode);
        }
    }

    pub fn set_depth_test(&mut self, enabled: bool) {
        if self.depth_test != enabled {
            self.depth_test = enabled;
            self.backend.set_depth_test(enabled);
        }
    }
}
