use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ImageConfig;
use crate::http_client::build_http_client_with_timeout;

use super::chat::ChatBridge;

/// Model variants tried in order until one yields an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant {
    pub model: &'static str,
    pub width: u32,
    pub height: u32,
}

pub const VARIANTS: [Variant; 3] = [
    Variant {
        model: "flux",
        width: 1024,
        height: 1024,
    },
    Variant {
        model: "turbo",
        width: 768,
        height: 768,
    },
    Variant {
        model: "default",
        width: 512,
        height: 512,
    },
];

const SLUG_MAX_CHARS: usize = 30;

#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Anything that can turn a request URL into a response body.
#[async_trait]
pub trait ImageEndpoint: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage>;
}

/// GET-based text-to-image service.
pub struct HttpImageEndpoint {
    client: reqwest::Client,
}

impl HttpImageEndpoint {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: build_http_client_with_timeout(Some(timeout)),
        }
    }
}

#[async_trait]
impl ImageEndpoint for HttpImageEndpoint {
    async fn fetch(&self, url: &str) -> Result<FetchedImage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to reach image service")?;

        if !response.status().is_success() {
            anyhow::bail!("Image service returned {}", response.status());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .context("Failed to read image bytes")?;

        Ok(FetchedImage {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

/// How an image request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    Saved { path: PathBuf, from_cache: bool },
    /// No image produced; text description instead
    Described(String),
}

pub fn cache_key(description: &str) -> String {
    let normalized = description.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    digest.iter().map(|byte| format!("{:02x}", byte)).collect()
}

pub fn request_url(base: &str, description: &str, variant: &Variant) -> String {
    format!(
        "{}/{}?width={}&height={}&model={}&nologo=true",
        base.trim_end_matches('/'),
        urlencoding::encode(description.trim()),
        variant.width,
        variant.height,
        variant.model
    )
}

/// File-name-safe fragment of the description.
pub fn slug(description: &str) -> String {
    let mut slug = String::new();
    for ch in description.trim().to_lowercase().chars() {
        if slug.chars().count() >= SLUG_MAX_CHARS {
            break;
        }
        if ch.is_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_').to_string();
    if slug.is_empty() {
        "imagem".to_string()
    } else {
        slug
    }
}

fn looks_like_image(fetched: &FetchedImage) -> bool {
    if fetched.bytes.is_empty() {
        return false;
    }
    let declared = fetched
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"));
    declared || image::guess_format(&fetched.bytes).is_ok()
}

/// Text-to-image with an on-disk cache and ordered model fallback.
pub struct ImageBridge {
    endpoint: Arc<dyn ImageEndpoint>,
    api_url: String,
    cache_dir: PathBuf,
    output_dir: PathBuf,
    attempt_delay: Duration,
}

impl ImageBridge {
    pub fn new(endpoint: Arc<dyn ImageEndpoint>, config: &ImageConfig) -> Self {
        Self {
            endpoint,
            api_url: config.api_url.clone(),
            cache_dir: PathBuf::from(&config.cache_dir),
            output_dir: PathBuf::from(&config.output_dir),
            attempt_delay: Duration::from_millis(config.attempt_delay_ms),
        }
    }

    pub fn cache_path(&self, description: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.png", cache_key(description)))
    }

    fn fresh_output_path(&self, description: &str) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
        self.output_dir
            .join(format!("imagem_{}_{}.png", stamp, slug(description)))
    }

    /// Serves from cache, else tries each variant, else asks `chat` for a description.
    pub async fn generate(&self, description: &str, chat: &ChatBridge) -> ImageOutcome {
        match self.try_generate(description).await {
            Ok(Some((path, from_cache))) => ImageOutcome::Saved { path, from_cache },
            Ok(None) => {
                tracing::warn!("All image variants failed for '{}'", description);
                ImageOutcome::Described(chat.describe_image(description).await.into_inner())
            }
            Err(e) => {
                tracing::warn!("Image bridge error: {:#}", e);
                ImageOutcome::Described(chat.describe_image(description).await.into_inner())
            }
        }
    }

    async fn try_generate(&self, description: &str) -> Result<Option<(PathBuf, bool)>> {
        let cached = self.cache_path(description);
        if cached.is_file() {
            let output = self.fresh_output_path(description);
            ensure_parent(&output)?;
            std::fs::copy(&cached, &output)
                .with_context(|| format!("Failed to copy cached image to {:?}", output))?;
            tracing::info!("Image cache hit: {:?}", cached);
            return Ok(Some((output, true)));
        }

        for (attempt, variant) in VARIANTS.iter().enumerate() {
            if attempt > 0 && !self.attempt_delay.is_zero() {
                tokio::time::sleep(self.attempt_delay).await;
            }

            let url = request_url(&self.api_url, description, variant);
            tracing::debug!("Image attempt {} ({}): {}", attempt + 1, variant.model, url);

            let fetched = match self.endpoint.fetch(&url).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    tracing::warn!("Image variant '{}' failed: {:#}", variant.model, e);
                    continue;
                }
            };
            if !looks_like_image(&fetched) {
                tracing::warn!(
                    "Image variant '{}' returned non-image content ({:?}, {} bytes)",
                    variant.model,
                    fetched.content_type,
                    fetched.bytes.len()
                );
                continue;
            }

            let output = self.fresh_output_path(description);
            save(&output, &fetched.bytes)?;
            if let Err(e) = save(&cached, &fetched.bytes) {
                tracing::warn!("Failed to mirror image into cache: {:#}", e);
            }
            tracing::info!("Generated image saved to: {:?}", output);
            return Ok(Some((output, false)));
        }

        Ok(None)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
    }
    Ok(())
}

fn save(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, bytes).with_context(|| format!("Failed to write image to {:?}", path))
}
