//! Effect chain execution
//!
//! Binds a [`RenderPlan`] to GPU resources and records its passes. Every
//! offscreen pass renders into the ping-pong pool; the final identity pass
//! draws the result onto the display.

use crate::display::Display;
use crate::error::Result;
use crate::frame::Frame;
use crate::kernels::KernelRegistry;
use crate::plan::{PassSource, PassTarget, RenderPlan, plan_passes};
use crate::selection::EffectSelection;
use crate::shader_pipeline::{ConvolutionUniforms, RECTANGLE_TEXCOORDS, RECTANGLE_VERTEX_COUNT, ShaderPipeline, rectangle};
use crate::texture_pool::{BoundTarget, SourceTexture, TextureFramebufferPool};
use wgpu::util::DeviceExt;

/// Summary of one completed render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    /// Effect passes rendered offscreen
    pub effect_passes: usize,
    /// Size of the source frame
    pub image_size: (u32, u32),
    /// Size of the display
    pub display_size: (u32, u32),
}

/// Vertex buffers of the rectangle every pass draws
#[derive(Debug)]
struct RectangleGeometry {
    positions: wgpu::Buffer,
    texcoords: wgpu::Buffer,
}

impl RectangleGeometry {
    fn new(device: &wgpu::Device) -> Self {
        let positions = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Rectangle positions"),
            size: std::mem::size_of::<[[f32; 2]; 6]>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let texcoords = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Rectangle texture coordinates"),
            contents: bytemuck::cast_slice(&RECTANGLE_TEXCOORDS),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self { positions, texcoords }
    }

    /// Covers an image of `width` x `height` pixels
    fn update(&self, queue: &wgpu::Queue, width: u32, height: u32) {
        queue.write_buffer(&self.positions, 0, bytemuck::cast_slice(&rectangle(0.0, 0.0, width as f32, height as f32)));
    }

    fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_vertex_buffer(0, self.positions.slice(..));
        render_pass.set_vertex_buffer(1, self.texcoords.slice(..));
        render_pass.draw(0..RECTANGLE_VERTEX_COUNT, 0..1);
    }
}

/// Runs the enabled effects over a frame and shows the result
#[derive(Debug)]
pub struct EffectChainExecutor {
    registry: KernelRegistry,
    pipeline: ShaderPipeline,
    clear_color: wgpu::Color,
    source: Option<SourceTexture>,
    pool: Option<TextureFramebufferPool>,
    geometry: RectangleGeometry,
}

impl EffectChainExecutor {
    /// Creates an executor drawing with `pipeline` and resolving kernels from `registry`
    pub fn new(device: &wgpu::Device, pipeline: ShaderPipeline, registry: KernelRegistry, clear_color: wgpu::Color) -> Self {
        Self {
            registry,
            pipeline,
            clear_color,
            source: None,
            pool: None,
            geometry: RectangleGeometry::new(device),
        }
    }

    /// Kernels the executor resolves effect names against
    pub fn registry(&self) -> &KernelRegistry {
        &self.registry
    }

    /// Mutable access for registering kernels between renders
    pub fn registry_mut(&mut self) -> &mut KernelRegistry {
        &mut self.registry
    }

    /// The ping-pong pool used by the last render, if any
    pub fn pool(&self) -> Option<&TextureFramebufferPool> {
        self.pool.as_ref()
    }

    /// Renders `frame` through every enabled effect onto `display`
    ///
    /// The pass plan is resolved before anything is written, so an unknown
    /// kernel leaves the display showing its previous frame.
    pub fn render(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, frame: &Frame, selection: &EffectSelection, display: &Display) -> Result<RenderStats> {
        let plan = plan_passes(&self.registry, selection, frame.size(), display.size())?;
        let display_frame = display.acquire()?;

        let (width, height) = frame.size();
        let source = reuse_or_allocate(&mut self.source, |source| source.size() == (width, height), || SourceTexture::allocate(device, width, height));
        source.upload(queue, frame);
        let pool = reuse_or_allocate(&mut self.pool, |pool| pool.size() == (width, height), || TextureFramebufferPool::allocate(device, width, height));

        // Geometry covers the image in pixels and is rebuilt every render
        self.geometry.update(queue, width, height);

        let uniforms = create_uniform_buffer(device, &plan);
        let stride = uniform_stride(device);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Effect chain") });
        for (index, pass) in plan.passes().iter().enumerate() {
            let source_view = match pass.source {
                PassSource::Original => source.view(),
                PassSource::Pool(member) => pool.view(member),
            };
            let bind_group = self
                .pipeline
                .create_bind_group(device, &pass.kernel_name, source_view, &uniforms, stride * index as wgpu::BufferAddress);

            let (target, pipeline) = match pass.target {
                PassTarget::Pool(member) => {
                    let (target_width, target_height) = pass.target_size();
                    (pool.bind(member, target_width, target_height), self.pipeline.offscreen_pipeline())
                }
                PassTarget::Display => (display_frame.bind(), self.pipeline.display_pipeline()),
            };

            let mut render_pass = begin_pass(&mut encoder, &pass.kernel_name, target, self.clear_color);
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            self.geometry.draw(&mut render_pass);
        }
        queue.submit(std::iter::once(encoder.finish()));
        display_frame.present();

        tracing::trace!("Rendered {} effect passes on a {width}x{height} frame", plan.effect_count());

        Ok(RenderStats {
            effect_passes: plan.effect_count(),
            image_size: plan.image_size(),
            display_size: plan.display_size(),
        })
    }
}

/// Keeps the value in `slot` if it still fits, otherwise replaces it
fn reuse_or_allocate<T>(slot: &mut Option<T>, fits: impl FnOnce(&T) -> bool, allocate: impl FnOnce() -> T) -> &mut T {
    let reusable = slot.take().filter(fits);
    slot.insert(reusable.unwrap_or_else(allocate))
}

/// Byte distance between consecutive uniform slots
fn uniform_stride(device: &wgpu::Device) -> wgpu::BufferAddress {
    let alignment = device.limits().min_uniform_buffer_offset_alignment as wgpu::BufferAddress;
    ConvolutionUniforms::SIZE.div_ceil(alignment) * alignment
}

/// Packs every pass's uniforms into one buffer, one aligned slot per pass
fn create_uniform_buffer(device: &wgpu::Device, plan: &RenderPlan) -> wgpu::Buffer {
    let stride = uniform_stride(device) as usize;
    let mut contents = vec![0u8; stride * plan.passes().len()];
    for (slot, pass) in contents.chunks_exact_mut(stride).zip(plan.passes()) {
        slot[..ConvolutionUniforms::SIZE as usize].copy_from_slice(bytemuck::bytes_of(&pass.uniforms));
    }

    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Effect uniforms"),
        contents: &contents,
        usage: wgpu::BufferUsages::UNIFORM,
    })
}

/// Starts a pass that clears `target` and draws over all of it
fn begin_pass<'e>(encoder: &'e mut wgpu::CommandEncoder, label: &str, target: BoundTarget<'_>, clear_color: wgpu::Color) -> wgpu::RenderPass<'e> {
    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target.view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(clear_color),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });

    render_pass.set_viewport(0.0, 0.0, target.width as f32, target.height as f32, 0.0, 1.0);
    render_pass
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuse_keeps_fitting_value() {
        let mut slot = Some((4, 3));
        let mut allocations = 0;

        let value = *reuse_or_allocate(&mut slot, |&size| size == (4, 3), || {
            allocations += 1;
            (4, 3)
        });

        assert_eq!(value, (4, 3));
        assert_eq!(allocations, 0);
    }

    #[test]
    fn test_reuse_replaces_stale_or_missing_value() {
        let mut slot = Some((4, 3));
        assert_eq!(*reuse_or_allocate(&mut slot, |&size| size == (8, 6), || (8, 6)), (8, 6));
        assert_eq!(slot, Some((8, 6)));

        let mut empty = None;
        assert_eq!(*reuse_or_allocate(&mut empty, |_: &(u32, u32)| true, || (1, 1)), (1, 1));
        assert_eq!(empty, Some((1, 1)));
    }
}
