//! Screenshots of the path traced image.
//!
//! The latest accumulation image (`rgba32float`) is copied into a mappable
//! buffer, clamped to `0..1` the same way the display pass does, and written
//! as an 8-bit PNG.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::pathtracer::PathTraceCompute;

const BYTES_PER_TEXEL: u32 = 16;

/// First `render_<n>.png` in `dir` that does not exist yet.
pub fn next_screenshot_path(dir: &Path) -> PathBuf {
    (0u32..)
        .map(|n| dir.join(format!("render_{}.png", n)))
        .find(|p| !p.exists())
        .unwrap_or_else(|| dir.join("render.png"))
}

/// Convert float texels to 8-bit RGBA, dropping row padding.
pub fn texels_to_rgba8(data: &[u8], width: u32, height: u32, padded_row: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity((width * height * 4) as usize);
    for row in 0..height {
        let start = (row * padded_row) as usize;
        let end = start + (width * BYTES_PER_TEXEL) as usize;
        for texel in data[start..end].chunks_exact(BYTES_PER_TEXEL as usize) {
            for channel in texel[..12].chunks_exact(4) {
                let c: f32 = bytemuck::pod_read_unaligned(channel);
                out.push((c.clamp(0.0, 1.0) * 255.0).round() as u8);
            }
            out.push(255);
        }
    }
    out
}

/// Read back the latest accumulated image and write it to `path` as PNG.
#[tracing::instrument(skip(device, queue, path_tracer))]
pub fn save_screenshot(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    path_tracer: &PathTraceCompute,
    path: &Path,
) -> Result<()> {
    let (width, height) = path_tracer.dimensions();
    let padded_row = (width * BYTES_PER_TEXEL).div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
        * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("screenshot_readback"),
        size: (padded_row * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("screenshot_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: path_tracer.latest_texture(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &readback,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = readback.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |r| {
        let _ = tx.send(r);
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .context("waiting for screenshot readback")?;
    rx.recv()
        .context("readback callback dropped")?
        .context("mapping screenshot buffer")?;

    let pixels = {
        let data = slice.get_mapped_range();
        texels_to_rgba8(&data, width, height, padded_row)
    };
    readback.unmap();

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    image::save_buffer(path, &pixels, width, height, image::ColorType::Rgba8)
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!("saved {}x{} render to {}", width, height, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_screenshot_path_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(next_screenshot_path(dir.path()), dir.path().join("render_0.png"));
        std::fs::write(dir.path().join("render_0.png"), b"x").unwrap();
        std::fs::write(dir.path().join("render_1.png"), b"x").unwrap();
        assert_eq!(next_screenshot_path(dir.path()), dir.path().join("render_2.png"));
    }

    #[test]
    fn test_texels_clamped_and_unpadded() {
        // 1x2 image, rows padded to 32 bytes
        let mut data = vec![0u8; 64];
        let row0: [f32; 4] = [2.0, 0.5, -1.0, 1.0];
        let row1: [f32; 4] = [0.0, 1.0, 0.25, 1.0];
        data[0..16].copy_from_slice(bytemuck::cast_slice(&row0));
        data[32..48].copy_from_slice(bytemuck::cast_slice(&row1));

        let out = texels_to_rgba8(&data, 1, 2, 32);
        assert_eq!(out, vec![255, 128, 0, 255, 0, 255, 64, 255]);
    }
}
