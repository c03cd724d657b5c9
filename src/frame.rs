//! Per-frame orchestration of the two render passes.
//!
//! A frame first renders every shadow casting node from the light into an off-screen depth map,
//! then renders the full graph from the camera while shadow nodes sample that map.

use anyhow::Result;
use cgmath::SquareMatrix;

use crate::backend::{
    PassTarget, ProgramDescriptor, ProgramHandle, RenderBackend, RenderTargetHandle,
    TextureHandle,
};
use crate::camera::Camera;
use crate::data::projection::PerspectiveProjection;
use crate::error::Error;
use crate::scene::context::{PassKind, RenderContext};
use crate::scene::{NodeId, SceneNode};

#[derive(Clone, Copy, Debug)]
pub struct ShadowSettings {
    pub map_width: u32,
    pub map_height: u32,
    pub fovy: cgmath::Deg<f32>,
    pub znear: f32,
    pub zfar: f32,
    /// Point the light looks at.
    pub focus: cgmath::Point3<f32>,
    pub up: cgmath::Vector3<f32>,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            map_width: 1024,
            map_height: 1024,
            fovy: cgmath::Deg(30.0),
            znear: 2.0,
            zfar: 20.0,
            focus: cgmath::Point3::new(0.0, 0.0, 0.0),
            up: cgmath::Vector3::unit_y(),
        }
    }
}

impl ShadowSettings {
    pub fn projection(&self) -> PerspectiveProjection {
        PerspectiveProjection {
            aspect_ratio: self.map_width as f32 / self.map_height as f32,
            fovy: self.fovy.into(),
            znear: self.znear,
            zfar: self.zfar,
        }
    }

    pub fn view_matrix(&self, light_position: cgmath::Point3<f32>) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::look_at_rh(light_position, self.focus, self.up)
    }
}

/// The pass that ran last in the current frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FramePhase {
    Idle,
    ShadowPass,
    CameraPass,
}

pub struct FrameRenderer {
    settings: ShadowSettings,
    depth_program: ProgramHandle,
    target: RenderTargetHandle,
    depth_texture: TextureHandle,
    light: Option<NodeId>,
    shadow: Option<NodeId>,
    phase: FramePhase,
}

impl FrameRenderer {
    /// Creates the shadow map target and the depth program. Missing depth texture support or an
    /// unusable map size are fatal here.
    pub fn new(backend: &mut dyn RenderBackend, settings: ShadowSettings) -> Result<Self> {
        let target = backend.create_render_target(settings.map_width, settings.map_height)?;
        let depth_texture = match backend.render_target_depth_texture(target) {
            Some(depth_texture) => depth_texture,
            None => return Err(Error::UnknownResource(format!("{target:?}")).into()),
        };
        let depth_program = backend.create_program(&ProgramDescriptor::depth())?;

        log::info!(
            "Shadow map of {}x{} created",
            settings.map_width,
            settings.map_height
        );

        Ok(Self {
            settings,
            depth_program,
            target,
            depth_texture,
            light: None,
            shadow: None,
            phase: FramePhase::Idle,
        })
    }

    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    /// The shadow map, for the shadow nodes of the scene.
    pub fn depth_texture(&self) -> TextureHandle {
        self.depth_texture
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Selects the light the shadow pass looks from and the shadow node that receives its matrix.
    pub fn attach(&mut self, light: NodeId, shadow: NodeId) {
        self.light = Some(light);
        self.shadow = Some(shadow);
    }

    pub fn render_frame(
        &mut self,
        backend: &mut dyn RenderBackend,
        root: &mut SceneNode,
        camera: &Camera,
        time_ms: f64,
    ) -> Result<()> {
        self.render_shadow_pass(backend, root, time_ms)?;
        self.render_camera_pass(backend, root, camera, time_ms)
    }

    /// Renders the shadow casters into the depth map and stores the light view-projection matrix
    /// on the attached shadow node. Returns that matrix.
    pub fn render_shadow_pass(
        &mut self,
        backend: &mut dyn RenderBackend,
        root: &mut SceneNode,
        time_ms: f64,
    ) -> Result<cgmath::Matrix4<f32>> {
        if self.phase == FramePhase::ShadowPass {
            return Err(Error::PassOrder(String::from(
                "the shadow pass already ran for this frame",
            ))
            .into());
        }

        let light_position = self.light_world_position(root)?;
        let view_matrix = self.settings.view_matrix(light_position);
        let projection_matrix: cgmath::Matrix4<f32> = self.settings.projection().into();

        backend.begin_pass(PassTarget::Offscreen(self.target))?;
        {
            let mut context = RenderContext::new(backend, PassKind::Shadow);
            context.view_matrix = view_matrix;
            context.inv_view_matrix = invert_or_identity(view_matrix);
            context.projection_matrix = projection_matrix;
            context.time_ms = time_ms;

            context.activate_program(Some(self.depth_program));
            context.set_uniform("u_projection", projection_matrix);

            root.render(&mut context);

            context.activate_program(None);
        }
        backend.end_pass()?;

        let light_view_projection = projection_matrix * view_matrix;

        let shadow = self
            .shadow
            .and_then(|shadow| root.find_mut(shadow))
            .and_then(SceneNode::as_shadow_mut);
        match shadow {
            Some(shadow) => shadow.set_light_view_projection(light_view_projection),
            None => log::warn!("No shadow node is attached, the shadow map stays unused"),
        }

        self.phase = FramePhase::ShadowPass;

        Ok(light_view_projection)
    }

    /// Renders the full graph from `camera`. Fails unless the shadow pass of this frame ran.
    pub fn render_camera_pass(
        &mut self,
        backend: &mut dyn RenderBackend,
        root: &SceneNode,
        camera: &Camera,
        time_ms: f64,
    ) -> Result<()> {
        if self.phase != FramePhase::ShadowPass {
            return Err(Error::PassOrder(String::from(
                "the camera pass needs this frame's shadow map",
            ))
            .into());
        }

        backend.begin_pass(PassTarget::Screen)?;
        {
            let mut context = RenderContext::new(backend, PassKind::Camera);
            context.view_matrix = camera.view_matrix;
            context.inv_view_matrix = invert_or_identity(camera.view_matrix);
            context.projection_matrix = camera.projection_matrix();
            context.time_ms = time_ms;

            root.render(&mut context);
        }

        // the frame is over even when presenting it fails
        self.phase = FramePhase::CameraPass;

        backend.end_pass()
    }

    fn light_world_position(&self, root: &SceneNode) -> Result<cgmath::Point3<f32>> {
        let light = match self.light {
            Some(light) => light,
            None => return Err(Error::new(String::from("No light is attached")).into()),
        };

        let node = match root.find(light) {
            Some(node) => node,
            None => return Err(Error::UnknownResource(format!("{light:?}")).into()),
        };

        let (position, matrix) = match (node.light_position(), root.accumulated_matrix(light)) {
            (Some(position), Some(matrix)) => (position, matrix),
            _ => {
                return Err(Error::new(format!("{light:?} is not a positional light")).into())
            }
        };

        let world = matrix * position.extend(1.0);

        Ok(cgmath::Point3::new(world.x, world.y, world.z))
    }
}

fn invert_or_identity(matrix: cgmath::Matrix4<f32>) -> cgmath::Matrix4<f32> {
    match matrix.invert() {
        Some(inverse) => inverse,
        None => {
            log::warn!("View matrix is singular");
            cgmath::Matrix4::identity()
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Matrix;

    use super::*;
    use crate::backend::recording::{Capabilities, Command, RecordingBackend};
    use crate::backend::TextureUnit;
    use crate::geometry::{make_cube, make_rect};
    use crate::scene::light::PointLightNode;
    use crate::scene::render::RenderNode;
    use crate::scene::shader::ShaderNode;
    use crate::scene::shadow::ShadowNode;
    use crate::scene::test_support::assert_matrix_eq;

    struct Fixture {
        backend: RecordingBackend,
        frame: FrameRenderer,
        root: SceneNode,
        camera: Camera,
        phong: ProgramHandle,
    }

    fn fixture() -> Fixture {
        let mut backend = RecordingBackend::new();
        let mut frame = FrameRenderer::new(&mut backend, ShadowSettings::default()).unwrap();
        let phong = backend
            .create_program(&ProgramDescriptor::phong())
            .unwrap();
        let cube = backend.create_geometry(&make_cube(1.0)).unwrap();
        let floor = backend.create_geometry(&make_rect(2.0, 2.0)).unwrap();

        let light = SceneNode::new(PointLightNode::new(cgmath::Vector3::new(0.0, 5.0, 5.0)));
        let light_id = light.id();

        let (width, height) = (
            frame.settings().map_width,
            frame.settings().map_height,
        );
        let shadow = SceneNode::new(ShadowNode::new(
            frame.depth_texture(),
            TextureUnit(3),
            width,
            height,
        ))
        .with_children([
            SceneNode::new(RenderNode::new(cube)),
            SceneNode::new(RenderNode::new(floor)).without_shadow(),
        ]);
        let shadow_id = shadow.id();

        let root = SceneNode::new(ShaderNode::new(phong)).with_children([light, shadow]);
        frame.attach(light_id, shadow_id);

        let camera = Camera::look_at(
            cgmath::Point3::new(0.0, 1.0, -10.0),
            cgmath::Point3::new(0.0, 0.0, 0.0),
            PerspectiveProjection {
                aspect_ratio: 1.0,
                fovy: cgmath::Deg(30.0).into(),
                znear: 0.01,
                zfar: 100.0,
            },
        );

        Fixture {
            backend,
            frame,
            root,
            camera,
            phong,
        }
    }

    #[test]
    fn eye_to_light_reproduces_the_light_clip_position() {
        let Fixture {
            mut backend,
            mut frame,
            mut root,
            camera,
            ..
        } = fixture();
        let shadow_id = root.children()[1].id();

        frame
            .render_frame(&mut backend, &mut root, &camera, 0.0)
            .unwrap();

        let shadow = match root.find_mut(shadow_id).and_then(SceneNode::as_shadow_mut) {
            Some(shadow) => shadow,
            None => panic!("shadow node is gone"),
        };
        let inv_view = camera.view_matrix.invert().unwrap();
        let eye_to_light = shadow.eye_to_light(inv_view);

        // the light at [0, 5, 5] sees the origin straight ahead at distance sqrt(50)
        let distance = 50.0f32.sqrt();
        let (near, far) = (2.0, 20.0);
        let gl_z = (far + near) / (far - near) * distance - 2.0 * far * near / (far - near);
        let expected = cgmath::Vector4::new(0.0, 0.0, 0.5 * gl_z + 0.5 * distance, distance);

        let origin_in_eye = camera.view_matrix * cgmath::Vector4::new(0.0, 0.0, 0.0, 1.0);
        let actual = eye_to_light * origin_in_eye;
        for (a, e) in [
            (actual.x, expected.x),
            (actual.y, expected.y),
            (actual.z, expected.z),
            (actual.w, expected.w),
        ] {
            assert!((a - e).abs() < 1e-3, "{actual:?} != {expected:?}");
        }

        // the point one unit above the origin lands above the light's image centre
        let above = eye_to_light * camera.view_matrix * cgmath::Vector4::new(0.0, 1.0, 0.0, 1.0);
        assert!(above.y / above.w > 0.0);
        assert!(above.x.abs() < 1e-4);

        // world +x stays on the right of the light's image
        let right = eye_to_light * camera.view_matrix * cgmath::Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert!(right.x / right.w > 0.0);
        assert!(right.y.abs() < 1e-4);
    }

    #[test]
    fn eye_to_light_undoes_the_camera_into_the_light_view_projection() {
        let Fixture {
            mut backend,
            mut frame,
            mut root,
            camera,
            ..
        } = fixture();
        let shadow_id = root.children()[1].id();

        frame
            .render_frame(&mut backend, &mut root, &camera, 0.0)
            .unwrap();

        let shadow = root.find_mut(shadow_id).and_then(SceneNode::as_shadow_mut).unwrap();
        let inv_view = camera.view_matrix.invert().unwrap();
        let light_view_projection = shadow.eye_to_light(inv_view) * camera.view_matrix;

        // light at [0, 5, 5] looking at the origin with +y up, 30 degree square frustum over
        // [2, 20] and depth mapped to [0, 1]
        let s = std::f32::consts::FRAC_1_SQRT_2;
        let f = 1.0 / 15.0f32.to_radians().tan();
        let d = 50.0f32.sqrt();
        #[rustfmt::skip]
        let expected = cgmath::Matrix4::new(
            f,   0.0,             0.0,             0.0,
            0.0, f * s,           -f * s,          0.0,
            0.0, -10.0 * s / 9.0, -10.0 * s / 9.0, 10.0 * d / 9.0 - 20.0 / 9.0,
            0.0, -s,              -s,              d,
        )
        .transpose();

        assert_matrix_eq(light_view_projection, expected);
    }

    #[test]
    fn camera_pass_before_shadow_pass_is_rejected() {
        let Fixture {
            mut backend,
            mut frame,
            root,
            camera,
            ..
        } = fixture();

        let error = frame
            .render_camera_pass(&mut backend, &root, &camera, 0.0)
            .unwrap_err();

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::PassOrder(_))
        ));
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn every_frame_runs_shadow_then_camera() {
        let Fixture {
            mut backend,
            mut frame,
            mut root,
            camera,
            phong,
        } = fixture();

        for frame_index in 0..2 {
            backend.clear_commands();
            frame
                .render_frame(&mut backend, &mut root, &camera, frame_index as f64 * 16.0)
                .unwrap();
            assert_eq!(frame.phase(), FramePhase::CameraPass);

            let commands = backend.commands();
            let passes: Vec<_> = commands
                .iter()
                .filter_map(|command| match command {
                    Command::BeginPass(target) => Some(*target),
                    _ => None,
                })
                .collect();
            assert!(matches!(
                passes.as_slice(),
                [PassTarget::Offscreen(_), PassTarget::Screen]
            ));

            let draws: Vec<_> = commands
                .iter()
                .filter_map(|command| match command {
                    Command::Draw { program, .. } => Some(*program),
                    _ => None,
                })
                .collect();
            // the floor only shows up in the camera pass
            assert_eq!(draws.len(), 3);
            assert_ne!(draws[0], phong);
            assert_eq!(&draws[1..], &[phong, phong]);
        }
    }

    #[test]
    fn shadow_pass_twice_in_one_frame_is_rejected() {
        let Fixture {
            mut backend,
            mut frame,
            mut root,
            ..
        } = fixture();

        frame.render_shadow_pass(&mut backend, &mut root, 0.0).unwrap();
        assert!(frame.render_shadow_pass(&mut backend, &mut root, 0.0).is_err());
    }

    #[test]
    fn missing_depth_textures_abort_setup() {
        let mut backend = RecordingBackend::with_capabilities(Capabilities {
            depth_texture: false,
            ..Default::default()
        });

        let error = FrameRenderer::new(&mut backend, ShadowSettings::default())
            .err()
            .unwrap();

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::UnsupportedCapability(_))
        ));
    }
}
