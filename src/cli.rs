use clap::Parser;

use scene_graph_viewer::args::{Args, RunMode};

/// A shadow mapping demo rendered through a retained-mode scene graph
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a .gltf or .glb file whose first mesh replaces the default sphere
    pub model: Option<String>,

    /// Path to an image used as the floor texture instead of the checkerboard
    #[arg(short = 'f', long)]
    pub floor_texture: Option<String>,

    /// Edge length of the square shadow map in texels
    #[arg(short = 's', long, default_value_t = 1024)]
    pub shadow_map_size: u32,

    /// Traverse the scene without a window and log the calls each frame issues
    #[arg(long)]
    pub headless: bool,

    /// Number of frames rendered in headless mode
    #[arg(long, default_value_t = 3, requires = "headless")]
    pub frames: u32,
}

impl From<Cli> for Args {
    fn from(value: Cli) -> Self {
        Args {
            model: value.model,
            floor_texture: value.floor_texture,
            shadow_map_size: value.shadow_map_size,
            mode: match value.headless {
                true => RunMode::Headless {
                    frames: value.frames,
                },
                false => RunMode::Window,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_mode_carries_the_frame_count() {
        let cli = Cli::parse_from(["viewer", "--headless", "--frames", "5"]);
        let args = Args::from(cli);

        assert_eq!(args.mode, RunMode::Headless { frames: 5 });
        assert_eq!(args.shadow_map_size, 1024);
        assert_eq!(args.model, None);
    }

    #[test]
    fn frames_require_headless_mode() {
        assert!(Cli::try_parse_from(["viewer", "--frames", "5"]).is_err());
    }

    #[test]
    fn model_and_floor_texture_are_optional_paths() {
        let cli = Cli::parse_from(["viewer", "teapot.glb", "-f", "floor.png", "-s", "2048"]);
        let args = Args::from(cli);

        assert_eq!(args.model.as_deref(), Some("teapot.glb"));
        assert_eq!(args.floor_texture.as_deref(), Some("floor.png"));
        assert_eq!(args.shadow_map_size, 2048);
        assert_eq!(args.mode, RunMode::Window);
    }
}
