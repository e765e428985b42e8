//! Drives the effect chain from a still image or a playing video
//!
//! A still image is rendered once and again on every selection change. A video
//! is rendered once per display refresh: the host calls [`RenderLoop::tick`]
//! from its redraw callback and keeps requesting redraws for as long as it
//! returns [`TickOutcome::Continue`]. The last frame shown, still or captured,
//! is kept so a selection change redraws it even while a video is paused.

use crate::config::RenderConfig;
use crate::context::GpuContext;
use crate::display::Display;
use crate::effect_chain::{EffectChainExecutor, RenderStats};
use crate::error::Result;
use crate::frame::Frame;
use crate::frame_source::{ImageSource, VideoCapture, VideoSource};
use crate::kernels::KernelRegistry;
use crate::selection::EffectSelection;
use crate::shader_pipeline::ShaderPipeline;

/// Whether the host should schedule another tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was rendered; schedule the next tick on the next refresh
    Continue,
    /// Playback is paused, ended or not started; stop scheduling
    Stopped,
}

/// Owns the GPU state and renders frames as sources produce them
#[derive(Debug)]
pub struct RenderLoop {
    context: GpuContext,
    display: Display,
    executor: EffectChainExecutor,
    capture: VideoCapture,
    last_frame: Option<Frame>,
}

impl RenderLoop {
    /// Compiles the built-in program for `display` and sets up an executor with the built-in kernels
    pub async fn new(context: GpuContext, display: Display, config: RenderConfig) -> Result<Self> {
        Self::with_registry(context, display, config, KernelRegistry::with_builtins()).await
    }

    /// Like [`RenderLoop::new`] with a caller-provided kernel registry
    pub async fn with_registry(context: GpuContext, display: Display, config: RenderConfig, registry: KernelRegistry) -> Result<Self> {
        let pipeline = ShaderPipeline::builtin(&context.device, display.format()).await?;
        let executor = EffectChainExecutor::new(&context.device, pipeline, registry, config.clear_color);

        Ok(Self {
            context,
            display,
            executor,
            capture: VideoCapture::new(config.fill_orientation),
            last_frame: None,
        })
    }

    /// The GPU context
    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// The display the final pass draws onto
    pub fn display(&self) -> &Display {
        &self.display
    }

    /// The effect chain executor
    pub fn executor(&self) -> &EffectChainExecutor {
        &self.executor
    }

    /// Mutable executor access, e.g. to register kernels
    pub fn executor_mut(&mut self) -> &mut EffectChainExecutor {
        &mut self.executor
    }

    /// Sizes the display to the image and renders it once
    pub fn show_image(&mut self, image: &ImageSource, selection: &EffectSelection) -> Result<RenderStats> {
        let frame = image.frame().clone();
        self.display.resize(&self.context.device, frame.width(), frame.height());
        let stats = self.render(&frame, selection);
        self.last_frame = Some(frame);
        stats
    }

    /// Re-renders the last shown frame with a new selection
    ///
    /// Works for a still image as well as for a paused or ended video. Returns
    /// `None` when nothing has been shown since the last [`RenderLoop::on_play`].
    pub fn on_selection_changed(&mut self, selection: &EffectSelection) -> Result<Option<RenderStats>> {
        let Some(frame) = self.last_frame.take() else {
            return Ok(None);
        };

        let stats = self.render(&frame, selection);
        self.last_frame = Some(frame);
        stats.map(Some)
    }

    /// Latches the capture and display size when playback starts
    pub fn on_play(&mut self, width: u32, height: u32) {
        self.last_frame = None;
        self.capture.on_play(width, height);
        self.display.resize(&self.context.device, width, height);
    }

    /// Captures the current video frame and renders it
    ///
    /// Returns [`TickOutcome::Stopped`] without rendering once the video is
    /// paused or ended. A render error is returned as is; the host may keep
    /// ticking while the video plays.
    pub fn tick(&mut self, source: &mut dyn VideoSource, selection: &EffectSelection) -> Result<TickOutcome> {
        let Some(frame) = self.capture.capture(source)? else {
            return Ok(TickOutcome::Stopped);
        };

        self.render(&frame, selection)?;
        self.last_frame = Some(frame);
        Ok(TickOutcome::Continue)
    }

    fn render(&mut self, frame: &Frame, selection: &EffectSelection) -> Result<RenderStats> {
        self.executor
            .render(&self.context.device, &self.context.queue, frame, &selection.snapshot(), &self.display)
    }
}
