//! The visible surface the final pass draws onto

use crate::context::GpuContext;
use crate::error::{Error, Result};
use crate::texture_pool::{BoundTarget, POOL_FORMAT};

/// Where the final pass draws
///
/// A window surface for interactive use, or a plain texture for headless
/// rendering and readback.
#[derive(Debug)]
pub enum Display {
    /// A configured presentation surface
    Surface {
        /// The presentation surface
        surface: wgpu::Surface<'static>,
        /// Current configuration
        config: wgpu::SurfaceConfiguration,
    },
    /// An offscreen texture that can be copied back to the CPU
    Offscreen {
        /// The render target
        texture: wgpu::Texture,
    },
}

impl Display {
    /// Configures `surface` for presentation at `width` x `height`
    pub fn from_surface(context: &GpuContext, surface: wgpu::Surface<'static>, width: u32, height: u32) -> Result<Self> {
        let capabilities = surface.get_capabilities(&context.adapter);
        let format = *capabilities
            .formats
            .first()
            .ok_or_else(|| Error::ContextUnavailable("surface is not supported by the adapter".to_string()))?;

        // Render through a linear view so pixel values pass through unchanged
        let view_format = format.remove_srgb_suffix();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: capabilities.alpha_modes[0],
            view_formats: if view_format == format { vec![] } else { vec![view_format] },
        };
        surface.configure(&context.device, &config);

        tracing::debug!("Configured surface {}x{} ({format:?}, rendering as {view_format:?})", config.width, config.height);

        Ok(Self::Surface { surface, config })
    }

    /// Creates an offscreen display of `width` x `height`
    pub fn offscreen(device: &wgpu::Device, width: u32, height: u32) -> Self {
        Self::Offscreen {
            texture: create_offscreen_texture(device, width, height),
        }
    }

    /// Format the final pass renders with
    pub fn format(&self) -> wgpu::TextureFormat {
        match self {
            Self::Surface { config, .. } => config.format.remove_srgb_suffix(),
            Self::Offscreen { texture } => texture.format(),
        }
    }

    /// Current size in pixels
    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::Surface { config, .. } => (config.width, config.height),
            Self::Offscreen { texture } => (texture.width(), texture.height()),
        }
    }

    /// Resizes the display, doing nothing when the size is unchanged
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if self.size() == (width, height) {
            return;
        }

        match self {
            Self::Surface { surface, config } => {
                config.width = width;
                config.height = height;
                surface.configure(device, config);
            }
            Self::Offscreen { texture } => *texture = create_offscreen_texture(device, width, height),
        }
    }

    /// Acquires the texture the next render draws into
    pub fn acquire(&self) -> Result<DisplayFrame> {
        let view_descriptor = wgpu::TextureViewDescriptor {
            label: Some("Display view"),
            format: Some(self.format()),
            ..Default::default()
        };

        match self {
            Self::Surface { surface, config } => {
                let surface_texture = surface.get_current_texture()?;
                let view = surface_texture.texture.create_view(&view_descriptor);
                Ok(DisplayFrame {
                    view,
                    size: (config.width, config.height),
                    surface_texture: Some(surface_texture),
                })
            }
            Self::Offscreen { texture } => Ok(DisplayFrame {
                view: texture.create_view(&view_descriptor),
                size: (texture.width(), texture.height()),
                surface_texture: None,
            }),
        }
    }

    /// The offscreen texture, if this display is offscreen
    pub fn texture(&self) -> Option<&wgpu::Texture> {
        match self {
            Self::Surface { .. } => None,
            Self::Offscreen { texture } => Some(texture),
        }
    }
}

fn create_offscreen_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen display"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: POOL_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

/// A display texture acquired for one render
#[derive(Debug)]
pub struct DisplayFrame {
    view: wgpu::TextureView,
    size: (u32, u32),
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl DisplayFrame {
    /// Selects the display as the render target with a viewport covering all of it
    pub fn bind(&self) -> BoundTarget<'_> {
        BoundTarget {
            view: &self.view,
            width: self.size.0,
            height: self.size.1,
        }
    }

    /// Shows the rendered frame; a no-op for offscreen displays
    pub fn present(self) {
        if let Some(surface_texture) = self.surface_texture {
            surface_texture.present();
        }
    }
}
