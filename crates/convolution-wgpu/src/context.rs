//! GPU rendering context

use crate::error::{Error, Result};

/// Backends tried when creating an instance
#[cfg(web)]
pub const BACKENDS: wgpu::Backends = wgpu::Backends::GL.union(wgpu::Backends::BROWSER_WEBGPU);

/// Backends tried when creating an instance
#[cfg(not(web))]
pub const BACKENDS: wgpu::Backends = wgpu::Backends::PRIMARY;

/// Creates a wgpu instance for the platform's backends
pub fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: BACKENDS,
        ..Default::default()
    })
}

/// Adapter, device and queue shared by every render
#[derive(Debug)]
pub struct GpuContext {
    /// Instance the adapter was obtained from
    pub instance: wgpu::Instance,
    /// Selected adapter
    pub adapter: wgpu::Adapter,
    /// Logical device
    pub device: wgpu::Device,
    /// Submission queue
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Creates a context without a presentation surface
    pub async fn headless(power_preference: wgpu::PowerPreference) -> Result<Self> {
        Self::new(create_instance(), power_preference, None).await
    }

    /// Creates a context on `instance`, optionally requiring an adapter that can present to `compatible_surface`
    ///
    /// Fails with [`Error::ContextUnavailable`] when no adapter or device can be obtained.
    pub async fn new(instance: wgpu::Instance, power_preference: wgpu::PowerPreference, compatible_surface: Option<&wgpu::Surface<'_>>) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Error::ContextUnavailable(e.to_string()))?;

        let info = adapter.get_info();
        tracing::info!("Using adapter {} ({:?})", info.name, info.backend);

        // WebGL2 limits are the floor every target must reach
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Convolution device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| Error::ContextUnavailable(e.to_string()))?;

        Ok(Self { instance, adapter, device, queue })
    }
}
