//! Animated image decoding and playback clock
//!
//! Decodes every frame of an animated GIF up front and picks the frame to show
//! from the elapsed playback time, so the player can sample it at whatever
//! rate the display refreshes.

use convolution_wgpu::VideoSource;
use image::AnimationDecoder;
use std::path::Path;
use std::time::{Duration, Instant};

/// Delay used for frames that declare none
const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// A decoded frame and the time it stays on screen
struct TimedFrame {
    image: image::RgbaImage,
    delay: Duration,
}

/// Playback position that only advances while playing
#[derive(Debug, Default)]
struct PlaybackClock {
    /// Position accumulated before the current run
    elapsed: Duration,
    /// When the current run started, `None` while paused
    running_since: Option<Instant>,
}

impl PlaybackClock {
    fn position(&self) -> Duration {
        self.elapsed + self.running_since.map_or(Duration::ZERO, |since| since.elapsed())
    }

    fn start(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.elapsed += since.elapsed();
        }
    }

    fn rewind(&mut self) {
        self.elapsed = Duration::ZERO;
        if self.running_since.is_some() {
            self.running_since = Some(Instant::now());
        }
    }
}

/// An animated GIF played back in real time
pub struct GifVideo {
    frames: Vec<TimedFrame>,
    duration: Duration,
    looping: bool,
    clock: PlaybackClock,
}

impl GifVideo {
    /// Decodes all frames of `path`; playback starts paused
    pub fn open(path: &Path, looping: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        let decoder = image::codecs::gif::GifDecoder::new(reader)?;

        let frames = decoder
            .into_frames()
            .collect_frames()?
            .into_iter()
            .map(|frame| {
                let (numerator, denominator) = frame.delay().numer_denom_ms();
                let delay = match Duration::from_millis(numerator as u64).checked_div(denominator) {
                    Some(delay) if !delay.is_zero() => delay,
                    _ => DEFAULT_FRAME_DELAY,
                };
                TimedFrame {
                    image: frame.into_buffer(),
                    delay,
                }
            })
            .collect::<Vec<_>>();

        if frames.is_empty() {
            return Err(format!("{} contains no frames", path.display()).into());
        }

        let duration = frames.iter().map(|frame| frame.delay).sum();
        tracing::info!("Decoded {} frames ({duration:?}) from {}", frames.len(), path.display());

        Ok(Self {
            frames,
            duration,
            looping,
            clock: PlaybackClock::default(),
        })
    }

    /// Starts or resumes playback, rewinding first if the animation ended
    pub fn play(&mut self) {
        if self.is_ended() {
            self.clock.rewind();
        }
        self.clock.start();
    }

    /// Pauses playback
    pub fn pause(&mut self) {
        self.clock.stop();
    }

    /// Index of the frame showing at the current position
    fn current_index(&self) -> usize {
        let mut position = self.clock.position();
        if self.looping {
            position = Duration::from_nanos((position.as_nanos() % self.duration.as_nanos().max(1)) as u64);
        }

        let mut end = Duration::ZERO;
        for (index, frame) in self.frames.iter().enumerate() {
            end += frame.delay;
            if position < end {
                return index;
            }
        }
        self.frames.len() - 1
    }
}

impl VideoSource for GifVideo {
    fn is_paused(&self) -> bool {
        self.clock.running_since.is_none()
    }

    fn is_ended(&self) -> bool {
        !self.looping && self.clock.position() >= self.duration
    }

    fn natural_size(&self) -> (u32, u32) {
        self.frames[0].image.dimensions()
    }

    fn current_frame(&self) -> Option<&image::RgbaImage> {
        self.frames.get(self.current_index()).map(|frame| &frame.image)
    }
}
