#[derive(Clone, Debug)]
pub struct Args {
    pub model: Option<String>,
    pub floor_texture: Option<String>,
    pub shadow_map_size: u32,
    pub mode: RunMode,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunMode {
    Window,
    /// Renders through the recording backend, without a window or GPU.
    Headless { frames: u32 },
}
