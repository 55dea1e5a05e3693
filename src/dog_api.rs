//! Resolvers that turn a breed name into a displayable thumbnail.
//!
//! The online resolver talks to a dog image service exposing
//! `GET {base}/breed/{key}/images/random`, which answers with
//! `{"status": "success", "message": "<image url>"}`.

use crate::breeds::BreedCatalog;
use crate::image_pool::{ImageError, ImageHandle, ImageResolver, Thumbnail};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://dog.ceo/api";
const USER_AGENT: &str = concat!("breedblink/", env!("CARGO_PKG_VERSION"));

impl From<reqwest::Error> for ImageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ImageError::Timeout
        } else if let Some(status) = err.status() {
            ImageError::Status(status.as_u16())
        } else if err.is_decode() {
            ImageError::Decode(err.to_string())
        } else {
            ImageError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct RandomImageResponse {
    status: String,
    #[serde(default)]
    message: String,
}

/// Size of the raster handed to the terminal, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

/// Decode image bytes and shrink them to fit `size`, keeping the aspect ratio
pub fn decode_thumbnail(bytes: &[u8], size: ThumbnailSize) -> Result<Thumbnail, ImageError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;
    let rgb = decoded.thumbnail(size.width, size.height).to_rgb8();
    let (width, height) = rgb.dimensions();
    let pixels = rgb.pixels().map(|p| p.0).collect();
    Ok(Thumbnail::new(width, height, pixels))
}

/// Production resolver backed by the HTTP dog image service
pub struct DogApiResolver {
    client: reqwest::Client,
    base_url: String,
    catalog: BreedCatalog,
    size: ThumbnailSize,
    next_key: AtomicU64,
}

impl DogApiResolver {
    pub fn new(
        base_url: &str,
        catalog: BreedCatalog,
        size: ThumbnailSize,
        timeout: Duration,
    ) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            catalog,
            size,
            next_key: AtomicU64::new(0),
        })
    }

    pub fn lookup_url(&self, breed: &str) -> String {
        format!(
            "{}/breed/{}/images/random",
            self.base_url,
            self.catalog.image_source_key(breed)
        )
    }
}

impl ImageResolver for DogApiResolver {
    async fn resolve(&self, breed: &str) -> Result<ImageHandle, ImageError> {
        let url = self.lookup_url(breed);
        debug!(%breed, %url, "looking up image");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ImageError::Status(response.status().as_u16()));
        }
        let body: RandomImageResponse = response.json().await?;
        if body.status != "success" || body.message.is_empty() {
            return Err(ImageError::NotFound(breed.to_string()));
        }

        let bytes = self
            .client
            .get(&body.message)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let thumbnail = decode_thumbnail(&bytes, self.size)?;

        let n = self.next_key.fetch_add(1, Ordering::Relaxed);
        Ok(ImageHandle::new(format!("dog-{n}"), body.message, thumbnail))
    }
}

/// Network-free resolver painting a deterministic pattern per breed
#[derive(Debug, Default)]
pub struct OfflineResolver {
    size: Option<ThumbnailSize>,
    latency: Duration,
    next_key: AtomicU64,
}

impl OfflineResolver {
    pub fn new(size: ThumbnailSize, latency: Duration) -> Self {
        Self {
            size: Some(size),
            latency,
            next_key: AtomicU64::new(0),
        }
    }

    pub fn paint(breed: &str, size: ThumbnailSize) -> Thumbnail {
        let seed = breed
            .bytes()
            .fold(0x811c_9dc5u32, |h, b| (h ^ b as u32).wrapping_mul(0x0100_0193));
        let base = [(seed >> 16) as u8, (seed >> 8) as u8, seed as u8];

        let mut pixels = Vec::with_capacity((size.width * size.height) as usize);
        for y in 0..size.height {
            for x in 0..size.width {
                let stripe = ((x / 4 + y / 4) % 2) as u8;
                pixels.push(if stripe == 0 {
                    base
                } else {
                    [base[0] / 2, base[1] / 2, base[2] / 2]
                });
            }
        }
        Thumbnail::new(size.width, size.height, pixels)
    }
}

impl ImageResolver for OfflineResolver {
    async fn resolve(&self, breed: &str) -> Result<ImageHandle, ImageError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let size = self.size.unwrap_or(ThumbnailSize {
            width: 16,
            height: 16,
        });
        let n = self.next_key.fetch_add(1, Ordering::Relaxed);
        Ok(ImageHandle::new(
            format!("offline-{n}"),
            format!("offline://{breed}"),
            Self::paint(breed, size),
        ))
    }
}

/// Resolver picked at startup from the command line
pub enum Resolver {
    Online(DogApiResolver),
    Offline(OfflineResolver),
}

impl ImageResolver for Resolver {
    async fn resolve(&self, breed: &str) -> Result<ImageHandle, ImageError> {
        match self {
            Resolver::Online(r) => r.resolve(breed).await,
            Resolver::Offline(r) => r.resolve(breed).await,
        }
    }
}
