use super::{CaptureSource, CapturedFrame, StreamClock};
use anyhow::{Context, Result};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;

pub struct WebcamCapture {
    camera: Camera,
    width: u32,
    height: u32,
    clock: StreamClock,
}

impl WebcamCapture {
    /// Open the camera at the format closest to the requested size and rate
    pub fn new(device_index: u32, width: u32, height: u32, fps: u32) -> Result<Self> {
        tracing::info!(
            "Initializing webcam {} at {}x{}@{}",
            device_index,
            width,
            height,
            fps
        );

        let index = CameraIndex::Index(device_index);
        let wanted = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, fps);
        let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(wanted));

        let mut camera = Camera::new(index, requested).context("Failed to open camera")?;

        camera
            .open_stream()
            .context("Failed to open camera stream")?;

        let negotiated = camera.resolution();
        let requested_size = (width, height);
        let (width, height) = (negotiated.width(), negotiated.height());
        if (width, height) != requested_size {
            tracing::warn!(
                "Camera does not offer {}x{}, using {}x{}",
                requested_size.0,
                requested_size.1,
                width,
                height
            );
        }
        tracing::info!(
            "Webcam initialized successfully, streaming at {}x{}@{}",
            width,
            height,
            camera.frame_rate()
        );

        Ok(Self {
            camera,
            width,
            height,
            clock: StreamClock::new(),
        })
    }
}

impl CaptureSource for WebcamCapture {
    /// Blocks until the driver hands over the next frame, so every call
    /// yields a fresh frame with a fresh timestamp.
    fn capture_frame(&mut self) -> Result<CapturedFrame> {
        let frame = self.camera.frame().context("Failed to capture frame")?;
        let timestamp = self.clock.stamp();

        let image = frame
            .decode_image::<RgbAFormat>()
            .context("Failed to decode frame")?;

        Ok(CapturedFrame { image, timestamp })
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
