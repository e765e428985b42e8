//! Window event handling for the convolution player

use super::decoder::GifVideo;
use super::player::PlayerContext;
use convolution_wgpu::{EffectSelection, RenderConfig, selection::DEFAULT_MENU};
use std::path::{Path, PathBuf};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowId,
};

/// Digit keys in menu order
const EFFECT_KEYS: [KeyCode; 6] = [KeyCode::Digit1, KeyCode::Digit2, KeyCode::Digit3, KeyCode::Digit4, KeyCode::Digit5, KeyCode::Digit6];

/// Main player application
pub struct PlayerApp {
    filename: PathBuf,
    looping: bool,
    start_paused: bool,
    config: RenderConfig,
    selection: EffectSelection,
    context: Option<PlayerContext>,
}

impl PlayerApp {
    pub fn new(filename: &Path, looping: bool, start_paused: bool, config: RenderConfig, selection: EffectSelection) -> Self {
        Self {
            filename: filename.to_path_buf(),
            looping,
            start_paused,
            config,
            selection,
            context: None,
        }
    }
}

impl ApplicationHandler for PlayerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.context.is_some() {
            return;
        }

        let context = GifVideo::open(&self.filename, self.looping)
            .and_then(|video| PlayerContext::new(event_loop, video, self.config, self.selection.clone(), self.start_paused));
        match context {
            Ok(context) => self.context = Some(context),
            Err(e) => {
                tracing::error!("Failed to start player: {e}");
                event_loop.exit();
                return;
            }
        }

        println!();
        println!("Keyboard shortcuts:");
        println!("  - Esc: Quit");
        println!("  - Space: Pause/Resume playback");
        for (index, name) in DEFAULT_MENU.iter().enumerate() {
            println!("  - {}: Toggle {name}", index + 1);
        }
        println!();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    state: ElementState::Pressed,
                    physical_key: PhysicalKey::Code(KeyCode::Escape),
                    ..
                },
                ..
            }
            | WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    state: ElementState::Pressed,
                    physical_key: PhysicalKey::Code(KeyCode::Space),
                    ..
                },
                ..
            } => {
                if let Some(context) = self.context.as_mut() {
                    if context.is_stopped() {
                        context.play();
                    } else {
                        context.pause();
                    }
                }
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    state: ElementState::Pressed,
                    physical_key: PhysicalKey::Code(keycode),
                    repeat: false,
                    ..
                },
                ..
            } => {
                if let (Some(index), Some(context)) = (EFFECT_KEYS.iter().position(|key| *key == keycode), self.context.as_mut()) {
                    context.toggle_effect(index);
                }
            }

            // Cadence follows the display: each redraw schedules the next one
            WindowEvent::RedrawRequested => {
                if let Some(context) = self.context.as_mut() {
                    context.handle_redraw();
                }
            }

            _ => {}
        }
    }
}
