//! Ping-pong render targets for the offscreen passes
//!
//! Pass `i` renders into member `i % 2` and samples the member the previous
//! pass wrote, so no pass ever reads the texture it is writing.

use crate::frame::Frame;

/// Number of textures in the pool
pub const POOL_SIZE: usize = 2;

/// Format of the source texture and every pool member
pub const POOL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Creates an RGBA8 texture with a single mip level
pub fn create_rgba_texture(device: &wgpu::Device, label: &str, width: u32, height: u32, usage: wgpu::TextureUsages) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: POOL_FORMAT,
        usage,
        view_formats: &[],
    })
}

/// Texture holding the current source frame in image space
#[derive(Debug)]
pub struct SourceTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl SourceTexture {
    /// Allocates a source texture of the given size
    pub fn allocate(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = create_rgba_texture(
            device,
            "Source frame",
            width,
            height,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// Uploads a frame, storing its rows bottom-up
    ///
    /// The frame must have the size the texture was allocated with.
    pub fn upload(&self, queue: &wgpu::Queue, frame: &Frame) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.rows_bottom_up(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(frame.width() * 4),
                rows_per_image: Some(frame.height()),
            },
            self.texture.size(),
        );
    }

    /// Size in pixels
    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }

    /// The underlying texture
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// View sampled by the first pass
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// A render target selected for one pass
#[derive(Debug, Clone, Copy)]
pub struct BoundTarget<'a> {
    /// View rendered into
    pub view: &'a wgpu::TextureView,
    /// Viewport width in pixels
    pub width: u32,
    /// Viewport height in pixels
    pub height: u32,
}

#[derive(Debug)]
struct PoolMember {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Two same-sized RGBA8 textures, each usable as a render attachment
#[derive(Debug)]
pub struct TextureFramebufferPool {
    members: Vec<PoolMember>,
    size: (u32, u32),
}

impl TextureFramebufferPool {
    /// Allocates both pool members at `width` x `height`
    pub fn allocate(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let members = (0..POOL_SIZE)
            .map(|index| {
                let texture = create_rgba_texture(
                    device,
                    &format!("Effect target {index}"),
                    width,
                    height,
                    wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_SRC,
                );
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                PoolMember { texture, view }
            })
            .collect();

        tracing::debug!("Allocated {POOL_SIZE} effect targets at {width}x{height}");

        Self {
            members,
            size: (width, height),
        }
    }

    /// Selects member `index % 2` as the render target with a `width` x `height` viewport
    pub fn bind(&self, index: usize, width: u32, height: u32) -> BoundTarget<'_> {
        BoundTarget {
            view: self.view(index),
            width,
            height,
        }
    }

    /// Size of every member in pixels
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Member `index % 2`
    pub fn texture(&self, index: usize) -> &wgpu::Texture {
        &self.members[index % POOL_SIZE].texture
    }

    /// View of member `index % 2`
    pub fn view(&self, index: usize) -> &wgpu::TextureView {
        &self.members[index % POOL_SIZE].view
    }
}
