use anyhow::Result;

use crate::error::Error;

/// Format of sampled object textures.
pub const COLOR_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
/// Colour attachment format of off-screen render targets.
pub const RENDER_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub struct Texture2DPackage {
    #[allow(dead_code)]
    pub gpu_texture: wgpu::Texture,
    pub gpu_texture_view: wgpu::TextureView,
}

impl Texture2DPackage {
    pub fn from_image(
        image: &image::RgbaImage,
        name: &str,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Self {
        let image_dimensions = image.dimensions();
        let image_size = wgpu::Extent3d {
            width: image_dimensions.0,
            height: image_dimensions.1,
            depth_or_array_layers: 1,
        };

        let gpu_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(name),
            size: image_size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &gpu_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * image_dimensions.0),
                rows_per_image: Some(image_dimensions.1),
            },
            image_size,
        );

        let gpu_texture_view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            gpu_texture,
            gpu_texture_view,
        }
    }

    pub fn create_default_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let image = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));

        Texture2DPackage::from_image(&image, "DEFAULT_TEXTURE", device, queue)
    }
}

pub struct DepthTexture2DPackage {
    #[allow(dead_code)]
    pub gpu_texture: wgpu::Texture,
    pub gpu_texture_view: wgpu::TextureView,
}

impl DepthTexture2DPackage {
    pub fn new(name: &str, device: &wgpu::Device, size: wgpu::Extent3d) -> Self {
        let gpu_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(name),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let gpu_texture_view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            gpu_texture,
            gpu_texture_view,
        }
    }

    /// A 1x1 depth texture cleared to the far plane, sampled when no shadow map is bound.
    pub fn create_default_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let default_texture = DepthTexture2DPackage::new(
            "DEFAULT_DEPTH_TEXTURE",
            device,
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("DEFAULT_DEPTH_TEXTURE_COMMAND_ENCODER"),
        });

        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("DEFAULT_DEPTH_TEXTURE_CLEAR_PASS"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &default_texture.gpu_texture_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        queue.submit(std::iter::once(encoder.finish()));

        default_texture
    }
}

/// Any texture a handle can refer to.
pub enum TextureResource {
    Color(Texture2DPackage),
    Depth(DepthTexture2DPackage),
}

impl TextureResource {
    pub fn view(&self) -> &wgpu::TextureView {
        match self {
            TextureResource::Color(texture) => &texture.gpu_texture_view,
            TextureResource::Depth(texture) => &texture.gpu_texture_view,
        }
    }

    pub fn is_depth(&self) -> bool {
        matches!(self, TextureResource::Depth(_))
    }
}

/// An off-screen colour attachment plus a depth attachment that is later sampled as a texture.
pub struct RenderTarget {
    pub color_texture: Texture2DPackage,
    pub depth_texture: crate::backend::TextureHandle,
}

impl RenderTarget {
    pub fn create_color_texture(
        name: &str,
        device: &wgpu::Device,
        size: wgpu::Extent3d,
    ) -> Texture2DPackage {
        let gpu_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("{name}_COLOR_TEXTURE")),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: RENDER_TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let gpu_texture_view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());

        Texture2DPackage {
            gpu_texture,
            gpu_texture_view,
        }
    }
}

/// Checks that a render target of `width` x `height` with a sampleable depth attachment can be
/// created on `adapter`.
pub fn validate_render_target(
    adapter: &wgpu::Adapter,
    limits: &wgpu::Limits,
    width: u32,
    height: u32,
) -> Result<()> {
    let depth_features = adapter.get_texture_format_features(DEPTH_FORMAT);
    let required_usages =
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;

    if !depth_features.allowed_usages.contains(required_usages) {
        return Err(Error::UnsupportedCapability(format!(
            "{DEPTH_FORMAT:?} cannot be both rendered to and sampled"
        ))
        .into());
    }

    let max = limits.max_texture_dimension_2d;
    if width == 0 || height == 0 || width > max || height > max {
        return Err(Error::RenderTargetIncomplete(format!(
            "attachments of {width}x{height} are outside 1..={max}"
        ))
        .into());
    }

    Ok(())
}

pub fn create_color_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("COLOR_TEXTURE_SAMPLER"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

pub fn create_depth_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("DEPTH_TEXTURE_SAMPLER"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}
