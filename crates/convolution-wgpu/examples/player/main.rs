//! Convolution Player Example
//!
//! Plays an animated GIF in a window and runs every frame through the enabled
//! convolution effects, one render per display refresh.
//!
//! # Usage
//! ```bash
//! cargo run --example player -- animation.gif --effect sharpness [--paused] [--loop]
//! ```

/// Window event handling
#[cfg(not(web))]
mod app;

/// Animated image decoding
#[cfg(not(web))]
mod decoder;

/// Playback and rendering
#[cfg(not(web))]
mod player;

#[cfg(not(web))]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use crate::app::PlayerApp;
    use clap::Parser;
    use convolution_wgpu::{EffectSelection, EffectToggle, FillOrientation, RenderConfig, selection::DEFAULT_MENU};
    use std::path::PathBuf;
    use winit::event_loop::{ControlFlow, EventLoop};

    /// Command-line arguments for the player
    #[derive(Parser)]
    #[command(version, about, long_about=None)]
    pub struct Args {
        /// Path to the animated GIF to play
        filename: PathBuf,

        /// Effect enabled at startup; repeat for several
        #[arg(long, short)]
        effect: Vec<String>,

        /// How frames are fitted to the window (vertical, horizontal)
        #[arg(long, default_value = "vertical")]
        fill: String,

        /// Start the player in paused state
        #[arg(long, short)]
        paused: bool,

        /// Restart the animation when it ends
        #[arg(long = "loop")]
        looping: bool,
    }

    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let Some(fill_orientation) = FillOrientation::from_name(&args.fill) else {
        eprintln!("Invalid fill '{}'. Valid values: vertical, horizontal", args.fill);
        std::process::exit(1);
    };

    // Menu order decides application order, whatever order the flags came in
    let selection = EffectSelection::new(
        DEFAULT_MENU
            .iter()
            .map(|name| EffectToggle::new(*name, args.effect.iter().any(|effect| effect == name)))
            .collect(),
    );

    tracing::info!("Starting player...");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let config = RenderConfig::default().with_fill_orientation(fill_orientation);
    let mut app = PlayerApp::new(&args.filename, args.looping, args.paused, config, selection);
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(web)]
fn main() {
    println!("The player needs a native window; use the demo-web crate in the browser");
}
