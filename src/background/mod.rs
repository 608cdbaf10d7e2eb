mod generate;

pub use generate::{spawn_prompt_worker, BackgroundGenerator};

use anyhow::{Context, Result};
use image::{imageops, RgbaImage};
use reqwest::blocking::Client;
use std::sync::Arc;
use std::time::Duration;

/// A decoded background picture. Never modified after loading.
#[derive(Debug, Clone)]
pub struct BackgroundImage {
    source: String,
    pixels: Arc<RgbaImage>,
}

impl BackgroundImage {
    pub fn from_image(source: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            source: source.into(),
            pixels: Arc::new(pixels),
        }
    }

    /// Load from a file path or an http(s) URL
    pub fn load(source: &str) -> Result<Self> {
        if is_url(source) {
            let client = Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("Failed to build HTTP client")?;
            return Self::fetch(&client, source);
        }

        tracing::info!("Loading background image from {}", source);
        let image = image::open(source)
            .with_context(|| format!("Failed to open background image {source}"))?;
        Ok(Self::from_image(source, image.to_rgba8()))
    }

    /// Download and decode a background image
    pub fn fetch(client: &Client, url: &str) -> Result<Self> {
        tracing::info!("Downloading background image from {}", url);
        let bytes = client
            .get(url)
            .send()
            .with_context(|| format!("Failed to request background image {url}"))?
            .error_for_status()
            .context("Background image download returned error status")?
            .bytes()
            .context("Failed while reading background image bytes")?;

        let image = image::load_from_memory(&bytes)
            .with_context(|| format!("Failed to decode background image {url}"))?;
        Ok(Self::from_image(url, image.to_rgba8()))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// The background drawn at the origin of a transparent canvas the size of
/// the working surface. Parts of the picture outside the canvas are cut off
/// and uncovered canvas stays transparent black.
#[derive(Debug, Default)]
pub struct BackgroundLayer {
    image: Option<BackgroundImage>,
    rendered: RgbaImage,
}

impl BackgroundLayer {
    pub fn new(image: Option<BackgroundImage>) -> Self {
        Self {
            image,
            rendered: RgbaImage::new(0, 0),
        }
    }

    /// Swap in a new background; the layer is redrawn on next use
    pub fn replace(&mut self, image: BackgroundImage) {
        tracing::info!(
            "Background replaced with {} ({:?})",
            image.source(),
            image.dimensions()
        );
        self.image = Some(image);
        self.rendered = RgbaImage::new(0, 0);
    }

    /// The layer at the given surface size, redrawn only when the size or
    /// the picture changed
    pub fn rendered(&mut self, width: u32, height: u32) -> &RgbaImage {
        if self.rendered.dimensions() != (width, height) {
            let mut canvas = RgbaImage::new(width, height);
            if let Some(image) = &self.image {
                imageops::replace(&mut canvas, image.pixels.as_ref(), 0, 0);
            }
            self.rendered = canvas;
        }
        &self.rendered
    }
}
