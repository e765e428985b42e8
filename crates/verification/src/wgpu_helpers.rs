//! wgpu readback helpers for verification
//!
//! Copies RGBA8 render targets back to the CPU so they can be compared with
//! the reference engine.

/// Errors raised while reading a texture back
#[derive(Debug, thiserror::Error)]
pub enum ReadbackError {
    /// Only 8-bit RGBA targets can be read back
    #[error("unsupported texture format for readback: {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),

    /// Waiting for the GPU failed
    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    /// The readback buffer could not be mapped
    #[error("failed to map readback buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    /// The mapping callback was dropped without answering
    #[error("readback channel closed before the buffer was mapped")]
    ChannelClosed,
}

/// Rounds a row size up to the copy alignment
pub fn padded_bytes_per_row(width: u32) -> u32 {
    (width * 4).div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Reads an RGBA8 texture back into an image, top row first
pub fn read_texture_rgba8(device: &wgpu::Device, queue: &wgpu::Queue, texture: &wgpu::Texture) -> Result<image::RgbaImage, ReadbackError> {
    let format = texture.format();
    if !matches!(format, wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb) {
        return Err(ReadbackError::UnsupportedFormat(format));
    }

    let (width, height) = (texture.width(), texture.height());
    let unpadded_bytes_per_row = width * 4;
    let bytes_per_row = padded_bytes_per_row(width);

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
    pollster::block_on(receiver.receive()).ok_or(ReadbackError::ChannelClosed)??;

    let data = buffer_slice.get_mapped_range();
    let pixels = data
        .chunks_exact(bytes_per_row as usize)
        .flat_map(|row| &row[..unpadded_bytes_per_row as usize])
        .copied()
        .collect::<Vec<_>>();
    drop(data);
    buffer.unmap();

    Ok(image::RgbaImage::from_raw(width, height, pixels).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
    }
}
