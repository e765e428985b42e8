//! Source frames and the aspect-fill rectangle used for video capture

use crate::error::{Error, Result};

/// An RGBA8 pixel grid stored top row first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    /// Wraps a pixel buffer, checking it holds exactly `width * height` RGBA8 pixels
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(Error::InvalidFrame {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Self { width, height, pixels })
    }

    /// Takes ownership of a decoded image
    pub fn from_image(image: image::RgbaImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// (width, height) in pixels
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixels, top row first
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixels with the row order reversed, bottom row first
    ///
    /// This is the upload order for y-up image space.
    pub fn rows_bottom_up(&self) -> Vec<u8> {
        let row_bytes = self.width as usize * 4;
        self.pixels.chunks_exact(row_bytes).rev().flatten().copied().collect()
    }

    /// Converts the frame back into an image
    pub fn into_image(self) -> image::RgbaImage {
        // The buffer length was checked on construction
        image::RgbaImage::from_raw(self.width, self.height, self.pixels).unwrap_or_default()
    }
}

/// Which canvas dimension a video frame is scaled to fill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FillOrientation {
    /// Match the canvas height, deriving the width from the video aspect ratio
    #[default]
    Vertical,
    /// Match the canvas width, deriving the height from the video aspect ratio
    Horizontal,
}

impl FillOrientation {
    /// All orientations
    pub const ALL: [Self; 2] = [Self::Vertical, Self::Horizontal];

    /// Lowercase name used on command lines
    pub fn name(self) -> &'static str {
        match self {
            Self::Vertical => "vertical",
            Self::Horizontal => "horizontal",
        }
    }

    /// Parses a name produced by [`FillOrientation::name`], ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|orientation| orientation.name().eq_ignore_ascii_case(name))
    }
}

/// Destination rectangle of a video frame on the capture canvas, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillRect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl FillRect {
    /// Rounded (width, height), never smaller than one pixel
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.width.round().max(1.0) as u32, self.height.round().max(1.0) as u32)
    }
}

/// Computes the aspect-preserving rectangle a video frame is drawn into
///
/// The rectangle is anchored at the canvas origin. One dimension matches the
/// canvas and the other follows the video's aspect ratio, so part of the frame
/// may fall outside the canvas. Returns `None` until the video reports a
/// non-zero natural size.
pub fn fill_rect(orientation: FillOrientation, canvas_size: (u32, u32), video_size: (u32, u32)) -> Option<FillRect> {
    let (canvas_width, canvas_height) = (canvas_size.0 as f32, canvas_size.1 as f32);
    let (video_width, video_height) = (video_size.0 as f32, video_size.1 as f32);
    if video_size.0 == 0 || video_size.1 == 0 {
        return None;
    }

    let (width, height) = match orientation {
        FillOrientation::Vertical => (canvas_height / video_height * video_width, canvas_height),
        FillOrientation::Horizontal => (canvas_width, canvas_width / video_width * video_height),
    };

    Some(FillRect { x: 0.0, y: 0.0, width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_wrong_length() {
        match Frame::new(2, 2, vec![0; 15]) {
            Err(Error::InvalidFrame { expected, actual, .. }) => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 15);
            }
            other => panic!("expected InvalidFrame, got {other:?}"),
        }
    }

    #[test]
    fn test_frame_rejects_empty() {
        assert!(Frame::new(0, 4, Vec::new()).is_err());
        assert!(Frame::new(4, 0, Vec::new()).is_err());
    }

    #[test]
    fn test_rows_bottom_up() {
        #[rustfmt::skip]
        let pixels = vec![
            1, 1, 1, 1,  2, 2, 2, 2,
            3, 3, 3, 3,  4, 4, 4, 4,
            5, 5, 5, 5,  6, 6, 6, 6,
        ];
        let frame = Frame::new(2, 3, pixels).unwrap();

        #[rustfmt::skip]
        let expected = vec![
            5, 5, 5, 5,  6, 6, 6, 6,
            3, 3, 3, 3,  4, 4, 4, 4,
            1, 1, 1, 1,  2, 2, 2, 2,
        ];
        assert_eq!(frame.rows_bottom_up(), expected);
    }

    #[test]
    fn test_frame_image_conversion_keeps_pixels() {
        let image = image::RgbaImage::from_fn(3, 2, |x, y| image::Rgba([x as u8, y as u8, 7, 255]));
        let frame = Frame::from_image(image.clone()).unwrap();

        assert_eq!(frame.size(), (3, 2));
        assert_eq!(frame.into_image(), image);
    }

    #[test]
    fn test_vertical_fill_matches_canvas_height() {
        // 1920x1080 video on a 640x480 canvas
        let rect = fill_rect(FillOrientation::Vertical, (640, 480), (1920, 1080)).unwrap();

        assert_eq!(rect.x, 0.0);
        assert_eq!(rect.y, 0.0);
        assert_eq!(rect.height, 480.0);
        assert!((rect.width - 853.333).abs() < 1e-2);
        assert_eq!(rect.pixel_size(), (853, 480));
    }

    #[test]
    fn test_horizontal_fill_matches_canvas_width() {
        let rect = fill_rect(FillOrientation::Horizontal, (640, 480), (1920, 1080)).unwrap();

        assert_eq!(rect.width, 640.0);
        assert_eq!(rect.height, 360.0);
    }

    #[test]
    fn test_fill_waits_for_video_size() {
        assert_eq!(fill_rect(FillOrientation::Vertical, (640, 480), (0, 0)), None);
    }

    #[test]
    fn test_orientation_names() {
        assert_eq!(FillOrientation::default(), FillOrientation::Vertical);
        for orientation in FillOrientation::ALL {
            assert_eq!(FillOrientation::from_name(orientation.name()), Some(orientation));
        }
        assert_eq!(FillOrientation::from_name("HORIZONTAL"), Some(FillOrientation::Horizontal));
        assert_eq!(FillOrientation::from_name("diagonal"), None);
    }
}
