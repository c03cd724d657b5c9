use std::path::Path;

use anyhow::Result;

use crate::app::App;
use crate::args::{Args, RunMode};
use crate::backend::recording::RecordingBackend;
use crate::camera::Camera;
use crate::data::projection::PerspectiveProjection;
use crate::demo::{DemoAssets, DemoScene};
use crate::frame::{FrameRenderer, ShadowSettings};

mod app;
pub mod args;
pub mod backend;
pub mod camera;
pub mod data;
pub mod demo;
pub mod error;
pub mod frame;
pub mod geometry;
mod render;
pub mod resource;
pub mod scene;
mod view;

/// Simulated frame time of headless runs.
const HEADLESS_FRAME_TIME_MS: f64 = 1000.0 / 60.0;

pub fn run(args: Args) -> Result<()> {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            console_log::init_with_level(log::Level::Info)?;
        } else {
            env_logger::init();
        }
    }

    match args.mode {
        RunMode::Window => run_window(args),
        RunMode::Headless { frames } => run_headless(&args, frames),
    }
}

fn run_window(args: Args) -> Result<()> {
    let event_loop = App::create_event_loop()?;
    event_loop.set_control_flow(winit::event_loop::ControlFlow::Poll);

    #[allow(unused_mut)]
    let mut app = App::new(&event_loop, args);

    cfg_if::cfg_if! {
        if #[cfg(target_arch="wasm32")] {
            use winit::platform::web::EventLoopExtWebSys;
            event_loop.spawn_app(app);
        } else {
            event_loop.run_app(&mut app)?;
        }
    }

    Ok(())
}

fn run_headless(args: &Args, frames: u32) -> Result<()> {
    log::info!("Rendering {frames} frames headless");

    let mut backend = RecordingBackend::new();
    let mut frame_renderer = FrameRenderer::new(&mut backend, shadow_settings(args))?;
    let mut demo = DemoScene::build(&mut backend, &mut frame_renderer, load_assets(args)?)?;

    let camera = Camera::look_at(
        cgmath::Point3::new(0.0, 1.0, -10.0),
        cgmath::Point3::new(0.0, 0.0, 0.0),
        PerspectiveProjection {
            aspect_ratio: 4.0 / 3.0,
            fovy: cgmath::Deg(45.0).into(),
            znear: 0.1,
            zfar: 100.0,
        },
    );

    for frame in 0..frames {
        let time_ms = frame as f64 * HEADLESS_FRAME_TIME_MS;

        backend.clear_commands();
        demo.animate(time_ms);
        frame_renderer.render_frame(&mut backend, &mut demo.root, &camera, time_ms)?;

        log::info!(
            "Frame {frame}: {} calls, {} draws",
            backend.commands().len(),
            backend.draw_count()
        );
    }

    Ok(())
}

pub(crate) fn shadow_settings(args: &Args) -> ShadowSettings {
    ShadowSettings {
        map_width: args.shadow_map_size,
        map_height: args.shadow_map_size,
        ..Default::default()
    }
}

pub(crate) fn load_assets(args: &Args) -> Result<DemoAssets> {
    DemoAssets::load(
        args.model.as_deref().map(Path::new),
        args.floor_texture.as_deref().map(Path::new),
    )
}
