use super::OutputSink;
use anyhow::{Context, Result};
use image::{imageops, Rgba, RgbaImage};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use v4l::video::Output;
use v4l::{Device, FourCC, Format};

/// Publishes frames to a v4l2loopback device as packed YUYV
pub struct V4L2Output {
    // Held open so the loopback keeps the negotiated format while we write
    _device: Device,
    file: File,
    width: u32,
    height: u32,
    yuyv: Vec<u8>,
}

impl V4L2Output {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{})",
            path.display(),
            width,
            height
        );

        let device = Device::with_path(path)
            .with_context(|| format!("Failed to open v4l2 device at {}", path.display()))?;
        let current = Output::format(&device).context("Failed to query output format")?;
        let format = Output::set_format(&device, &loopback_format(current, width, height))
            .context("Failed to set YUYV output format")?;
        tracing::info!(
            "Output format negotiated: {}x{} {}",
            format.width,
            format.height,
            format.fourcc
        );

        // v4l2loopback accepts raw frame data written to the device file
        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;

        tracing::info!("v4l2loopback device opened successfully");

        Ok(Self {
            _device: device,
            file,
            width,
            height,
            yuyv: Vec::with_capacity(yuyv_len(width, height)),
        })
    }
}

/// The device's current format switched to packed YUYV at the output size
fn loopback_format(mut format: Format, width: u32, height: u32) -> Format {
    format.width = width;
    format.height = height;
    format.fourcc = FourCC::new(b"YUYV");
    format.stride = width * 2;
    format.size = yuyv_len(width, height) as u32;
    format
}

fn yuyv_len(width: u32, height: u32) -> usize {
    (width as usize).div_ceil(2) * 4 * height as usize
}

/// Pack an RGBA frame as YUYV 4:2:2, ignoring alpha
///
/// Each pair of pixels shares averaged U and V; an odd last column is
/// paired with itself.
pub(crate) fn rgba_to_yuyv(frame: &RgbaImage, yuyv: &mut Vec<u8>) {
    let (width, height) = frame.dimensions();
    yuyv.clear();
    yuyv.reserve(yuyv_len(width, height));

    for y in 0..height {
        for x in (0..width).step_by(2) {
            let pixel1 = frame.get_pixel(x, y);
            let pixel2 = if x + 1 < width {
                frame.get_pixel(x + 1, y)
            } else {
                pixel1
            };

            let (y1, u1, v1) = rgb_to_yuv(pixel1);
            let (y2, u2, v2) = rgb_to_yuv(pixel2);

            let u = ((u1 as u16 + u2 as u16) / 2) as u8;
            let v = ((v1 as u16 + v2 as u16) / 2) as u8;

            yuyv.extend_from_slice(&[y1, u, y2, v]);
        }
    }
}

/// BT.601 RGB to YUV
fn rgb_to_yuv(pixel: &Rgba<u8>) -> (u8, u8, u8) {
    let r = pixel[0] as f32;
    let g = pixel[1] as f32;
    let b = pixel[2] as f32;

    let y = (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 255.0) as u8;
    let u = ((-0.147 * r - 0.289 * g + 0.436 * b) + 128.0).clamp(0.0, 255.0) as u8;
    let v = ((0.615 * r - 0.515 * g - 0.100 * b) + 128.0).clamp(0.0, 255.0) as u8;

    (y, u, v)
}

impl OutputSink for V4L2Output {
    fn write_frame(&mut self, frame: &RgbaImage) -> Result<()> {
        let resized;
        let frame = if frame.dimensions() != (self.width, self.height) {
            resized = imageops::resize(
                frame,
                self.width,
                self.height,
                imageops::FilterType::Triangle,
            );
            &resized
        } else {
            frame
        };

        rgba_to_yuyv(frame, &mut self.yuyv);

        self.file
            .write_all(&self.yuyv)
            .context("Failed to write frame to v4l2loopback device")?;

        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
