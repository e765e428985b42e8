//! Still images and video playback as sources of frames

use crate::error::Result;
use crate::frame::{FillOrientation, FillRect, Frame, fill_rect};
use image::imageops;
use std::path::Path;

/// A single decoded image, rendered once per selection change
#[derive(Debug, Clone)]
pub struct ImageSource {
    frame: Frame,
}

impl ImageSource {
    /// Wraps an already decoded frame
    pub fn new(frame: Frame) -> Self {
        Self { frame }
    }

    /// Decodes an image file with whatever codecs `image` was built with
    pub fn open(path: impl AsRef<Path>) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let image = image::open(path)?.to_rgba8();
        Ok(Self::new(Frame::from_image(image)?))
    }

    /// The decoded frame
    pub fn frame(&self) -> &Frame {
        &self.frame
    }
}

/// A playing video that can be sampled once per display refresh
pub trait VideoSource {
    /// Whether playback is paused
    fn is_paused(&self) -> bool;

    /// Whether playback reached the end
    fn is_ended(&self) -> bool;

    /// Intrinsic size of the video frames
    fn natural_size(&self) -> (u32, u32);

    /// The frame currently showing, if one is decoded
    fn current_frame(&self) -> Option<&image::RgbaImage>;

    /// Draws the current frame scaled into `rect` on `canvas`
    ///
    /// Pixels outside the canvas are clipped. Implementations backed by a
    /// platform compositor can override this to let it do the scaling.
    fn draw_into(&mut self, canvas: &mut image::RgbaImage, rect: FillRect) {
        let Some(frame) = self.current_frame() else {
            return;
        };

        let (width, height) = rect.pixel_size();
        let scaled = imageops::resize(frame, width, height, imageops::FilterType::Triangle);
        imageops::replace(canvas, &scaled, rect.x.round() as i64, rect.y.round() as i64);
    }
}

/// Captures video frames through an intermediate canvas of fixed size
///
/// The canvas size is latched when playback starts and stays fixed for the
/// rest of the session.
#[derive(Debug, Clone)]
pub struct VideoCapture {
    orientation: FillOrientation,
    canvas: Option<image::RgbaImage>,
}

impl VideoCapture {
    /// Creates a capture that fills along `orientation`
    pub fn new(orientation: FillOrientation) -> Self {
        Self { orientation, canvas: None }
    }

    /// Latches the capture size on playback start
    pub fn on_play(&mut self, width: u32, height: u32) {
        tracing::debug!("Latched capture size {width}x{height}");
        self.canvas = Some(image::RgbaImage::new(width, height));
    }

    /// Latched capture size, if playback started
    pub fn size(&self) -> Option<(u32, u32)> {
        self.canvas.as_ref().map(|canvas| canvas.dimensions())
    }

    /// Draws the source's current frame onto the canvas and returns a copy of it
    ///
    /// Returns `None` when playback has not started, is paused or has ended.
    /// The canvas is not cleared between captures, so areas the fill rectangle
    /// does not cover keep their previous contents.
    pub fn capture(&mut self, source: &mut dyn VideoSource) -> Result<Option<Frame>> {
        if source.is_paused() || source.is_ended() {
            return Ok(None);
        }
        let Some(canvas) = self.canvas.as_mut() else {
            return Ok(None);
        };

        if let Some(rect) = fill_rect(self.orientation, canvas.dimensions(), source.natural_size()) {
            source.draw_into(canvas, rect);
        }

        Frame::from_image(canvas.clone()).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Video source whose frames are solid colors, counting every draw
    #[derive(Debug)]
    struct SolidVideo {
        paused: bool,
        ended: bool,
        draws: usize,
        frame: image::RgbaImage,
    }

    impl SolidVideo {
        fn new(width: u32, height: u32, color: [u8; 4]) -> Self {
            Self {
                paused: false,
                ended: false,
                draws: 0,
                frame: image::RgbaImage::from_pixel(width, height, image::Rgba(color)),
            }
        }
    }

    impl VideoSource for SolidVideo {
        fn is_paused(&self) -> bool {
            self.paused
        }

        fn is_ended(&self) -> bool {
            self.ended
        }

        fn natural_size(&self) -> (u32, u32) {
            self.frame.dimensions()
        }

        fn current_frame(&self) -> Option<&image::RgbaImage> {
            Some(&self.frame)
        }

        fn draw_into(&mut self, canvas: &mut image::RgbaImage, rect: FillRect) {
            self.draws += 1;
            let (width, height) = rect.pixel_size();
            let scaled = imageops::resize(&self.frame, width, height, imageops::FilterType::Nearest);
            imageops::replace(canvas, &scaled, 0, 0);
        }
    }

    #[test]
    fn test_capture_before_play_yields_nothing() {
        let mut capture = VideoCapture::new(FillOrientation::Vertical);
        let mut video = SolidVideo::new(4, 4, [255, 0, 0, 255]);

        assert_eq!(capture.capture(&mut video).unwrap(), None);
        assert_eq!(video.draws, 0);
    }

    #[test]
    fn test_capture_skips_paused_and_ended() {
        let mut capture = VideoCapture::new(FillOrientation::Vertical);
        capture.on_play(4, 4);

        let mut video = SolidVideo::new(4, 4, [255, 0, 0, 255]);
        video.paused = true;
        assert_eq!(capture.capture(&mut video).unwrap(), None);

        video.paused = false;
        video.ended = true;
        assert_eq!(capture.capture(&mut video).unwrap(), None);
        assert_eq!(video.draws, 0);
    }

    #[test]
    fn test_capture_has_latched_size() {
        let mut capture = VideoCapture::new(FillOrientation::Vertical);
        capture.on_play(6, 4);

        let mut video = SolidVideo::new(16, 9, [0, 255, 0, 255]);
        let frame = capture.capture(&mut video).unwrap().unwrap();

        assert_eq!(frame.size(), (6, 4));
        assert_eq!(capture.size(), Some((6, 4)));
        assert_eq!(video.draws, 1);
    }

    #[test]
    fn test_horizontal_capture_leaves_uncovered_rows() {
        let mut capture = VideoCapture::new(FillOrientation::Horizontal);
        capture.on_play(8, 8);

        // 2:1 video fills the top half of a square canvas
        let mut video = SolidVideo::new(4, 2, [0, 0, 255, 255]);
        let image = capture.capture(&mut video).unwrap().unwrap().into_image();

        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(7, 3).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(0, 4).0, [0, 0, 0, 0]);
        assert_eq!(image.get_pixel(7, 7).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_default_draw_scales_and_clips() {
        struct StillVideo(image::RgbaImage);

        impl VideoSource for StillVideo {
            fn is_paused(&self) -> bool {
                false
            }
            fn is_ended(&self) -> bool {
                false
            }
            fn natural_size(&self) -> (u32, u32) {
                self.0.dimensions()
            }
            fn current_frame(&self) -> Option<&image::RgbaImage> {
                Some(&self.0)
            }
        }

        let mut capture = VideoCapture::new(FillOrientation::Vertical);
        capture.on_play(4, 4);

        // A wide frame scaled to the canvas height overflows to the right
        let mut video = StillVideo(image::RgbaImage::from_pixel(8, 2, image::Rgba([9, 9, 9, 255])));
        let image = capture.capture(&mut video).unwrap().unwrap().into_image();

        assert_eq!(image.dimensions(), (4, 4));
        assert!(image.pixels().all(|pixel| pixel.0 == [9, 9, 9, 255]));
    }
}
