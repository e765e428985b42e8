//! Convolution filter CLI
//!
//! Applies a chain of 3x3 convolution effects to an image on the GPU and saves
//! the displayed result.
//!
//! # Usage
//! ```bash
//! convolution-cli input.png output.png --effect sharpness --effect emboss
//! convolution-cli input.png output.png --kernel box=1,1,1,1,1,1,1,1,1 --effect box
//! ```

use clap::Parser;
use convolution_wgpu::{Display, EffectSelection, GpuContext, ImageSource, RenderConfig, RenderLoop, selection::DEFAULT_MENU};
use std::path::PathBuf;

/// Command-line arguments for the convolution filter
#[derive(Parser)]
#[command(version, about = "Apply 3x3 convolution effects to an image on the GPU")]
struct Args {
    /// Input image file path
    input: PathBuf,

    /// Output image file path
    output: PathBuf,

    /// Effect to apply; repeat to chain effects in the given order
    /// (sharpness, unsharpen, edgeDetect, sobelHorizontal, previtHorizontal, emboss)
    #[arg(long, short)]
    effect: Vec<String>,

    /// Custom kernel as NAME=c0,c1,...,c8 (row-major, top row first); repeat for several
    #[arg(long, short, value_parser = parse_kernel)]
    kernel: Vec<(String, [f32; 9])>,

    /// Prefer a low-power adapter
    #[arg(long)]
    low_power: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    for effect in &args.effect {
        let custom = args.kernel.iter().any(|(name, _)| name == effect);
        if !custom && !DEFAULT_MENU.contains(&effect.as_str()) {
            eprintln!("Unknown effect '{effect}'. Valid effects: {} or a --kernel name", DEFAULT_MENU.join(", "));
            std::process::exit(1);
        }
    }

    let mut config = RenderConfig::default();
    if args.low_power {
        config = config.with_power_preference(wgpu::PowerPreference::LowPower);
    }

    tracing::info!("Loading image from: {}", args.input.display());
    let image = ImageSource::open(&args.input)?;
    let (width, height) = image.frame().size();
    tracing::info!("Input image: {width}x{height}");

    let context = pollster::block_on(GpuContext::headless(config.power_preference))?;
    let display = Display::offscreen(&context.device, width, height);
    let mut renderer = pollster::block_on(RenderLoop::new(context, display, config))?;

    for (name, coefficients) in &args.kernel {
        renderer.executor_mut().registry_mut().register(name.clone(), *coefficients);
        tracing::info!("Registered kernel {name}: {coefficients:?}");
    }

    let selection = EffectSelection::enabled_in_order(args.effect.iter().cloned());
    let stats = renderer.show_image(&image, &selection)?;
    tracing::info!("Applied {} effect passes", stats.effect_passes);

    let texture = renderer.display().texture().ok_or("display is not offscreen")?;
    let output = read_texture(&renderer.context().device, &renderer.context().queue, texture)?;
    output.save(&args.output)?;

    tracing::info!("Saved result to: {}", args.output.display());

    Ok(())
}

/// Parses a `NAME=c0,...,c8` kernel definition
fn parse_kernel(definition: &str) -> Result<(String, [f32; 9]), String> {
    let (name, values) = definition.split_once('=').ok_or("expected NAME=c0,c1,...,c8")?;
    if name.is_empty() {
        return Err("kernel name is empty".to_string());
    }

    let values = values
        .split(',')
        .map(|value| value.trim().parse::<f32>().map_err(|e| format!("invalid coefficient '{value}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    let coefficients: [f32; 9] = values.try_into().map_err(|values: Vec<f32>| format!("expected 9 coefficients, got {}", values.len()))?;

    Ok((name.to_string(), coefficients))
}

/// Copies an RGBA8 texture back to the CPU
fn read_texture(device: &wgpu::Device, queue: &wgpu::Queue, texture: &wgpu::Texture) -> Result<image::RgbaImage, Box<dyn std::error::Error>> {
    let (width, height) = (texture.width(), texture.height());

    // Rows in a copy must start on a 256-byte boundary
    let unpadded_bytes_per_row = width * 4;
    let bytes_per_row = unpadded_bytes_per_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback buffer"),
        size: (bytes_per_row * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback") });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        texture.size(),
    );
    queue.submit(std::iter::once(encoder.finish()));

    let buffer_slice = buffer.slice(..);
    let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |v| sender.send(v).unwrap());

    device.poll(wgpu::PollType::Wait)?;

    pollster::block_on(receiver.receive()).ok_or("Failed to map buffer for reading")??;

    let data = buffer_slice.get_mapped_range();
    let pixels = data
        .chunks_exact(bytes_per_row as usize)
        .flat_map(|row| &row[..unpadded_bytes_per_row as usize])
        .copied()
        .collect::<Vec<_>>();

    Ok(image::RgbaImage::from_raw(width, height, pixels).ok_or("Failed to create image from readback data")?)
}
