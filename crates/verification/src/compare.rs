//! Image comparison utilities for verification
//!
//! Compares GPU output with the CPU reference, allowing a per-channel
//! tolerance for rounding differences in the shader arithmetic.

/// Result of comparing two images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    /// Every channel is within tolerance
    Match,
    /// Images have different dimensions
    DimensionMismatch {
        /// Dimensions of the reference image
        expected: (u32, u32),
        /// Dimensions of the image under test
        actual: (u32, u32),
    },
    /// Images have matching dimensions but some channels differ too much
    PixelMismatch {
        /// Number of pixels with at least one channel out of tolerance
        mismatched_pixels: usize,
        /// Largest channel difference found
        max_difference: u8,
        /// First mismatching pixel, in row-major order
        first_mismatch: (u32, u32),
    },
}

impl CompareResult {
    /// Whether the images matched
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Compares two RGBA8 images channel by channel
///
/// A channel matches when it differs from the reference by at most `tolerance`.
pub fn compare_images(expected: &image::RgbaImage, actual: &image::RgbaImage, tolerance: u8) -> CompareResult {
    if expected.dimensions() != actual.dimensions() {
        return CompareResult::DimensionMismatch {
            expected: expected.dimensions(),
            actual: actual.dimensions(),
        };
    }

    let mut mismatched_pixels = 0;
    let mut max_difference = 0;
    let mut first_mismatch = None;

    for ((x, y, expected_pixel), actual_pixel) in expected.enumerate_pixels().zip(actual.pixels()) {
        let difference = expected_pixel.0.iter().zip(actual_pixel.0).map(|(&e, a)| e.abs_diff(a)).max().unwrap_or(0);
        max_difference = max_difference.max(difference);

        if difference > tolerance {
            mismatched_pixels += 1;
            first_mismatch.get_or_insert((x, y));
        }
    }

    match first_mismatch {
        None => CompareResult::Match,
        Some(first_mismatch) => CompareResult::PixelMismatch {
            mismatched_pixels,
            max_difference,
            first_mismatch,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_images_match() {
        let image = image::RgbaImage::from_pixel(3, 3, image::Rgba([1, 2, 3, 255]));

        assert_eq!(compare_images(&image, &image, 0), CompareResult::Match);
    }

    #[test]
    fn test_tolerance_absorbs_rounding() {
        let expected = image::RgbaImage::from_pixel(2, 2, image::Rgba([100, 100, 100, 255]));
        let mut actual = expected.clone();
        actual.put_pixel(1, 0, image::Rgba([101, 99, 100, 255]));

        assert!(compare_images(&expected, &actual, 1).is_match());
        assert_eq!(
            compare_images(&expected, &actual, 0),
            CompareResult::PixelMismatch {
                mismatched_pixels: 1,
                max_difference: 1,
                first_mismatch: (1, 0),
            }
        );
    }

    #[test]
    fn test_dimension_mismatch() {
        let expected = image::RgbaImage::new(2, 2);
        let actual = image::RgbaImage::new(2, 3);

        assert_eq!(
            compare_images(&expected, &actual, 255),
            CompareResult::DimensionMismatch {
                expected: (2, 2),
                actual: (2, 3),
            }
        );
    }
}
