//! CPU reference implementation of the effect chain
//!
//! Mirrors what the GPU computes: neighbours are clamped to the image edge,
//! sums are taken in `f32` over normalized channels, every pass is quantized
//! to 8 bits like the RGBA8 pool, and alpha is forced to one.

use convolution_wgpu::{EffectSelection, Kernel, KernelRegistry, kernels::IDENTITY_KERNEL};

/// Applies one kernel to an image
///
/// The first kernel row weights the row above each pixel, the first column
/// the pixel to its left.
pub fn apply_kernel(input: &image::RgbaImage, kernel: &Kernel) -> image::RgbaImage {
    let (width, height) = input.dimensions();
    let coefficients = kernel.coefficients();
    let weight = kernel.weight();

    let sample = |x: i64, y: i64, channel: usize| -> f32 {
        let x = x.clamp(0, width as i64 - 1) as u32;
        let y = y.clamp(0, height as i64 - 1) as u32;
        input.get_pixel(x, y).0[channel] as f32 / 255.0
    };

    image::RgbaImage::from_fn(width, height, |x, y| {
        let mut pixel = [0u8, 0, 0, 255];
        for (channel, value) in pixel.iter_mut().enumerate().take(3) {
            let mut sum = 0.0f32;
            for row in 0..3 {
                for column in 0..3 {
                    let coefficient = coefficients[row * 3 + column];
                    sum += sample(x as i64 + column as i64 - 1, y as i64 + row as i64 - 1, channel) * coefficient;
                }
            }
            *value = quantize(sum / weight);
        }
        image::Rgba(pixel)
    })
}

/// Converts a normalized value to 8 bits the way a UNORM render target stores it
pub fn quantize(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Runs the enabled effects of a selection on the CPU
#[derive(Debug, Clone)]
pub struct ReferenceEngine {
    registry: KernelRegistry,
}

impl Default for ReferenceEngine {
    fn default() -> Self {
        Self::new(KernelRegistry::with_builtins())
    }
}

impl ReferenceEngine {
    /// Creates an engine resolving kernels from `registry`
    pub fn new(registry: KernelRegistry) -> Self {
        Self { registry }
    }

    /// Applies every enabled effect in list order, then the identity display pass
    pub fn run(&self, input: &image::RgbaImage, selection: &EffectSelection) -> convolution_wgpu::Result<image::RgbaImage> {
        // Resolve everything first so an unknown kernel produces no output
        let kernels = selection.enabled().map(|name| self.registry.lookup(name)).collect::<convolution_wgpu::Result<Vec<_>>>()?;
        let identity = self.registry.lookup(IDENTITY_KERNEL)?;

        let mut current = input.clone();
        for kernel in kernels {
            current = apply_kernel(&current, kernel);
        }
        Ok(apply_kernel(&current, identity))
    }
}
