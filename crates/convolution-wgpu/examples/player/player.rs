//! Player state: window, playback and the convolution render loop
//!
//! Every redraw captures the frame currently showing, runs it through the
//! enabled effects and requests the next redraw while the animation plays.

use super::decoder::GifVideo;
use convolution_wgpu::{Display, EffectSelection, GpuContext, RenderConfig, RenderLoop, TickOutcome, VideoSource, create_instance, selection::DEFAULT_MENU};
use std::sync::Arc;
use winit::{
    dpi::PhysicalSize,
    event_loop::ActiveEventLoop,
    window::{Window, WindowAttributes},
};

/// Window, playback and renderer for one session
pub struct PlayerContext {
    /// Wrapped in `Arc` to avoid lifetime issue with `wgpu::Surface`
    window: Arc<Window>,
    video: GifVideo,
    renderer: RenderLoop,
    selection: EffectSelection,
}

impl PlayerContext {
    /// Opens a window sized to the video and prepares the renderer
    pub fn new(event_loop: &ActiveEventLoop, video: GifVideo, config: RenderConfig, selection: EffectSelection, start_paused: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let (width, height) = video.natural_size();
        let window = Arc::new(
            event_loop.create_window(
                WindowAttributes::default()
                    .with_resizable(false)
                    .with_visible(false)
                    .with_inner_size(PhysicalSize::new(width, height))
                    .with_title("Convolution Player"),
            )?,
        );

        let instance = create_instance();
        let surface = instance.create_surface(window.clone())?;
        let context = pollster::block_on(GpuContext::new(instance, config.power_preference, Some(&surface)))?;
        let display = Display::from_surface(&context, surface, width, height)?;
        let renderer = pollster::block_on(RenderLoop::new(context, display, config))?;

        let mut player = Self {
            window,
            video,
            renderer,
            selection,
        };

        player.update_window_title();
        player.window.set_visible(true);
        player.window.focus_window();

        if !start_paused {
            player.play();
        }

        Ok(player)
    }

    /// Renders the current frame and schedules the next redraw while playing
    pub fn handle_redraw(&mut self) {
        match self.renderer.tick(&mut self.video, &self.selection) {
            Ok(TickOutcome::Continue) => self.window.request_redraw(),
            Ok(TickOutcome::Stopped) => {
                if self.video.is_ended() {
                    tracing::info!("Playback ended");
                }
                self.update_window_title();
            }
            Err(e) => {
                tracing::warn!("Skipped frame: {e}");
                if !self.video.is_paused() && !self.video.is_ended() {
                    self.window.request_redraw();
                }
            }
        }
    }

    /// Whether playback is paused or ended
    pub fn is_stopped(&self) -> bool {
        self.video.is_paused() || self.video.is_ended()
    }

    /// Starts or resumes playback
    pub fn play(&mut self) {
        self.video.play();

        let (width, height): (u32, u32) = self.window.inner_size().into();
        self.renderer.on_play(width, height);

        self.update_window_title();
        self.window.request_redraw();

        tracing::info!("Playing");
    }

    /// Pauses playback
    pub fn pause(&mut self) {
        self.video.pause();
        self.update_window_title();

        tracing::info!("Paused");
    }

    /// Toggles the effect at `index` in the menu
    pub fn toggle_effect(&mut self, index: usize) {
        let Some(name) = DEFAULT_MENU.get(index) else {
            return;
        };

        self.selection.toggle(name);
        tracing::info!("Effects: [{}]", self.selection.enabled().collect::<Vec<_>>().join(", "));

        if let Err(e) = self.renderer.on_selection_changed(&self.selection) {
            tracing::warn!("Failed to apply effects: {e}");
        }
        self.update_window_title();
    }

    fn update_window_title(&self) {
        let effects = if self.selection.enabled_count() == 0 {
            "none".to_string()
        } else {
            self.selection.enabled().collect::<Vec<_>>().join(" > ")
        };

        let state = if self.video.is_ended() {
            " [ENDED]"
        } else if self.video.is_paused() {
            " [PAUSED]"
        } else {
            ""
        };

        self.window.set_title(&format!("Convolution Player [{effects}]{state}"));
    }
}
