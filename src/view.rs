use std::time::Instant;

use anyhow::Result;

use crate::args::Args;
use crate::camera::{Camera, OrbitalCameraController};
use crate::data::projection::PerspectiveProjection;
use crate::demo::DemoScene;
use crate::frame::FrameRenderer;
use crate::render::WgpuBackend;

pub struct ViewSystem {
    pub window: std::sync::Arc<winit::window::Window>,
    pub backend: WgpuBackend,
    pub camera_controller: OrbitalCameraController,
    frame_renderer: FrameRenderer,
    demo: DemoScene,
    camera: Camera,
    start_time: Instant,
}

impl ViewSystem {
    pub async fn from_window(window: winit::window::Window, args: &Args) -> Result<Self> {
        let window = std::sync::Arc::new(window);

        let mut backend = WgpuBackend::from_window(window.clone()).await?;

        let mut frame_renderer = FrameRenderer::new(&mut backend, crate::shadow_settings(args))?;
        let demo = DemoScene::build(&mut backend, &mut frame_renderer, crate::load_assets(args)?)?;

        let camera_controller = OrbitalCameraController::new(
            (0.0, 0.0, 0.0).into(),
            10.0,
            cgmath::Rad(0.0),
            cgmath::Deg(20.0).into(),
            2.0,
        );

        let camera = Camera {
            view_matrix: Camera::create_view_matrix_from_transform(
                camera_controller.calculate_camera_transform(),
            ),
            projection: PerspectiveProjection {
                aspect_ratio: backend.aspect_ratio(),
                fovy: cgmath::Deg(45.0).into(),
                znear: 0.1,
                zfar: 100.0,
            },
        };

        Ok(Self {
            window,
            backend,
            camera_controller,
            frame_renderer,
            demo,
            camera,
            start_time: Instant::now(),
        })
    }

    pub fn set_view_dimensions(&mut self, view_dimensions: winit::dpi::PhysicalSize<u32>) {
        self.backend.set_view_dimensions(view_dimensions);
        self.camera.set_aspect_ratio(self.backend.aspect_ratio());
    }

    pub fn update_view(&mut self, delta_time: std::time::Duration) -> Result<()> {
        if let Some(transform) = self
            .camera_controller
            .generate_updated_camera_transform(delta_time)
        {
            self.camera.set_transform(transform);
        }

        let time_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;

        self.demo.animate(time_ms);
        self.frame_renderer.render_frame(
            &mut self.backend,
            &mut self.demo.root,
            &self.camera,
            time_ms,
        )?;

        Ok(())
    }
}
