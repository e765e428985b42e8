//! Multi-pass 3x3 convolution filters on the GPU
//!
//! This crate applies an ordered chain of named 3x3 kernels (sharpen, edge
//! detection, emboss, ...) to a still image or to video frames, ping-ponging
//! between two offscreen render targets and finishing with an identity pass
//! onto a visible surface. Rendering goes through wgpu, so the same code runs
//! natively and in the browser (WebGL2 or WebGPU).
//!
//! ```no_run
//! use convolution_wgpu::{Display, EffectSelection, GpuContext, ImageSource, RenderConfig, RenderLoop};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RenderConfig::default();
//! let context = GpuContext::headless(config.power_preference).await?;
//! let display = Display::offscreen(&context.device, 640, 480);
//! let mut renderer = RenderLoop::new(context, display, config).await?;
//!
//! let image = ImageSource::open("input.png")?;
//! let selection = EffectSelection::enabled_in_order(["sharpness", "emboss"]);
//! renderer.show_image(&image, &selection)?;
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod display;
mod effect_chain;
mod error;
mod frame;
mod frame_source;
mod render_loop;

pub mod kernels;
pub mod plan;
pub mod selection;
pub mod shader_pipeline;
pub mod texture_pool;

pub use config::RenderConfig;
pub use context::{BACKENDS, GpuContext, create_instance};
pub use display::{Display, DisplayFrame};
pub use effect_chain::{EffectChainExecutor, RenderStats};
pub use error::{Error, Result};
pub use frame::{FillOrientation, FillRect, Frame, fill_rect};
pub use frame_source::{ImageSource, VideoCapture, VideoSource};
pub use kernels::{Kernel, KernelRegistry};
pub use render_loop::{RenderLoop, TickOutcome};
pub use selection::{EffectSelection, EffectToggle};
pub use shader_pipeline::{ShaderPipeline, ShaderSources};
pub use texture_pool::TextureFramebufferPool;
