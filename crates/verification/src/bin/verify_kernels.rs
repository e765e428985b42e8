//! Kernel verification binary
//!
//! Renders every menu effect, and every ordered pair of them, on the GPU and
//! compares the displayed result with the CPU reference.

use convolution_wgpu::{EffectSelection, selection::DEFAULT_MENU};
use convolution_wgpu_verification::{
    compare::{CompareResult, compare_images},
    gpu_engine::GpuEngine,
    reference_engine::ReferenceEngine,
};

/// Largest per-channel difference accepted for a single pass
const SINGLE_PASS_TOLERANCE: u8 = 1;

/// Largest per-channel difference accepted for a two-pass chain
const PAIR_TOLERANCE: u8 = 2;

/// Effect chains to verify: each effect alone, then each ordered pair
fn get_chains() -> Vec<(Vec<&'static str>, u8)> {
    let singles = DEFAULT_MENU.iter().map(|name| (vec![*name], SINGLE_PASS_TOLERANCE));
    let pairs = DEFAULT_MENU
        .iter()
        .flat_map(|first| DEFAULT_MENU.iter().map(move |second| (vec![*first, *second], PAIR_TOLERANCE)));
    singles.chain(pairs).collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <input_image>", args[0]);
        return Ok(());
    }

    let input_path = &args[1];
    let input_image = image::open(input_path).map_err(|e| format!("Failed to open input image: {e}"))?.to_rgba8();

    let mut engine = GpuEngine::new().await?;
    let reference = ReferenceEngine::default();
    let mut failures = 0;

    for (chain, tolerance) in get_chains() {
        let label = chain.join(" > ");
        let selection = EffectSelection::enabled_in_order(chain);

        let started = std::time::Instant::now();
        let gpu_output = match engine.run(&input_image, &selection) {
            Ok(output) => output,
            Err(e) => {
                eprintln!("✗ Error rendering {label} on the GPU: {e}");
                failures += 1;
                continue;
            }
        };
        let gpu_duration = started.elapsed();

        let started = std::time::Instant::now();
        let cpu_output = reference.run(&input_image, &selection)?;
        let cpu_duration = started.elapsed();

        match compare_images(&cpu_output, &gpu_output, tolerance) {
            CompareResult::Match => {
                println!("✓ Outputs match for {label} (CPU: {cpu_duration:.2?}, GPU: {gpu_duration:.2?})");
            }
            CompareResult::DimensionMismatch { expected, actual } => {
                eprintln!("✗ Dimension mismatch for {label}: CPU {expected:?}, GPU {actual:?}");
                failures += 1;
            }
            CompareResult::PixelMismatch {
                mismatched_pixels,
                max_difference,
                first_mismatch,
            } => {
                eprintln!("✗ Pixel mismatch for {label}: {mismatched_pixels} pixels, max difference {max_difference}, first at {first_mismatch:?}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(format!("{failures} chains failed verification").into());
    }

    Ok(())
}
