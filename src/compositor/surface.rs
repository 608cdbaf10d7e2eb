use image::RgbaImage;

/// The outgoing frame: the camera frame is drawn into it, then the
/// composited result replaces it.
#[derive(Debug, Default)]
pub struct WorkingSurface {
    pixels: RgbaImage,
}

impl WorkingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a camera frame into the surface.
    ///
    /// The surface takes the frame's dimensions. Returns `true` when that
    /// changed its size.
    pub fn draw_frame(&mut self, frame: &RgbaImage) -> bool {
        if self.pixels.dimensions() == frame.dimensions() {
            self.pixels.copy_from_slice(frame.as_raw());
            false
        } else {
            tracing::info!(
                "Working surface resized from {:?} to {:?}",
                self.pixels.dimensions(),
                frame.dimensions()
            );
            self.pixels = frame.clone();
            true
        }
    }

    /// Write a composited frame of the surface's size back into it
    pub fn put(&mut self, composited: &RgbaImage) {
        debug_assert_eq!(composited.dimensions(), self.pixels.dimensions());
        self.pixels.copy_from_slice(composited.as_raw());
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }
}
