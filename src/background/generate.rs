use super::BackgroundImage;
use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;

/// Body of a background generation request
#[derive(Debug, Serialize)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub width: u32,
    pub height: u32,
    pub num_images_per_prompt: u32,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    image_url: String,
}

/// Client for a text-to-image endpoint that answers with the URL of the
/// generated picture
pub struct BackgroundGenerator {
    client: Client,
    endpoint: String,
    width: u32,
    height: u32,
}

impl BackgroundGenerator {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        })
    }

    pub fn request<'a>(&self, prompt: &'a str) -> GenerationRequest<'a> {
        GenerationRequest {
            prompt,
            width: self.width,
            height: self.height,
            num_images_per_prompt: 1,
        }
    }

    /// Generate a background for `prompt` and download it
    pub fn generate(&self, prompt: &str) -> Result<BackgroundImage> {
        let _span = tracing::info_span!("generate_background").entered();
        tracing::info!("Requesting background for prompt {:?}", prompt);

        let response: GenerationResponse = self
            .client
            .post(&self.endpoint)
            .json(&self.request(prompt))
            .send()
            .with_context(|| format!("Failed to reach generation endpoint {}", self.endpoint))?
            .error_for_status()
            .context("Generation endpoint returned error status")?
            .json()
            .context("Generation endpoint returned an unexpected body")?;

        BackgroundImage::fetch(&self.client, &response.image_url)
    }
}

/// Run `generate` for every prompt received, on a worker thread.
///
/// Blank prompts are skipped and failures are logged; the returned channel
/// only carries successfully generated backgrounds.
pub fn spawn_prompt_worker<F>(prompts: Receiver<String>, mut generate: F) -> Receiver<BackgroundImage>
where
    F: FnMut(&str) -> Result<BackgroundImage> + Send + 'static,
{
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for prompt in prompts {
            let prompt = prompt.trim();
            if prompt.is_empty() {
                continue;
            }

            match generate(prompt) {
                Ok(background) => {
                    if tx.send(background).is_err() {
                        break;
                    }
                }
                Err(err) => tracing::warn!("Background generation failed: {err:#}"),
            }
        }
        tracing::debug!("Prompt worker stopped");
    });
    rx
}
