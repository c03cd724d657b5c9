#[derive(Debug)]
pub enum Error {
    UnsupportedCapability(String),
    RenderTargetIncomplete(String),
    PassOrder(String),
    TextureCount(usize),
    UnknownResource(String),
    Message(String),
}

impl Error {
    pub fn new(message: String) -> Self {
        Self::Message(message)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnsupportedCapability(message) => {
                write!(f, "Unsupported platform capability: {message}")
            }
            Error::RenderTargetIncomplete(message) => {
                write!(f, "Render target incomplete: {message}")
            }
            Error::PassOrder(message) => write!(f, "Invalid render pass order: {message}"),
            Error::TextureCount(count) => write!(
                f,
                "A texture node binds between 1 and {} textures, got {count}",
                crate::scene::texture::MAX_NODE_TEXTURES
            ),
            Error::UnknownResource(message) => write!(f, "Unknown resource: {message}"),
            Error::Message(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for Error {}
