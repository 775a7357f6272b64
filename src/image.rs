//! Image loading for multi-modal turns
//!
//! A locator is either an `http(s)://` URL or a local path.

use crate::config::ChatConfig;
use crate::conversation::{ContentBlock, ImageFormat, ImageSource};
use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to create HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("failed to fetch {locator}")]
    Fetch {
        locator: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read {locator}")]
    Read {
        locator: String,
        #[source]
        source: std::io::Error,
    },
    #[error("not a file: {0}")]
    NotAFile(String),
    #[error("image too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },
}

/// Resolves image locators into content blocks
pub struct ImageLoader {
    client: Client,
    max_bytes: u64,
    pass_urls: bool,
}

impl ImageLoader {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(config: &ChatConfig) -> Result<Self, ImageError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ImageError::Client)?;

        Ok(Self {
            client,
            max_bytes: config.max_image_bytes,
            pass_urls: config.pass_image_urls,
        })
    }

    /// Read the raw bytes behind `locator`
    ///
    /// # Errors
    ///
    /// Fails if the image cannot be fetched or read, or exceeds the size
    /// limit.
    pub async fn resolve(&self, locator: &str) -> Result<Vec<u8>, ImageError> {
        let bytes = if is_url(locator) {
            self.fetch(locator).await?
        } else {
            self.read_local(locator).await?
        };
        self.check_size(bytes.len() as u64)?;
        Ok(bytes)
    }

    /// Build an image block for `locator`
    ///
    /// URLs become references when the loader is configured to pass them
    /// through; everything else is loaded inline.
    ///
    /// # Errors
    ///
    /// See [`ImageLoader::resolve`].
    pub async fn block(&self, locator: &str) -> Result<ContentBlock, ImageError> {
        if self.pass_urls && is_url(locator) {
            let format = extension_format(locator).unwrap_or(ImageFormat::Jpeg);
            return Ok(ContentBlock::image(format, ImageSource::Reference(locator.to_string())));
        }

        let bytes = self.resolve(locator).await?;
        let format = detect_format(locator, &bytes);
        tracing::debug!(locator, bytes = bytes.len(), ?format, "Image loaded");
        Ok(ContentBlock::image(format, ImageSource::Bytes(bytes)))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let fetch_err = |source| ImageError::Fetch {
            locator: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_err)?;
        if let Some(len) = response.content_length() {
            self.check_size(len)?;
        }

        // Content-Length is optional; cap the body as it arrives
        let mut bytes = Vec::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(fetch_err)?;
            self.check_size((bytes.len() + chunk.len()) as u64)?;
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    async fn read_local(&self, path: &str) -> Result<Vec<u8>, ImageError> {
        let read_err = |source| ImageError::Read {
            locator: path.to_string(),
            source,
        };

        let metadata = tokio::fs::metadata(path).await.map_err(read_err)?;
        if !metadata.is_file() {
            return Err(ImageError::NotAFile(path.to_string()));
        }
        self.check_size(metadata.len())?;
        tokio::fs::read(path).await.map_err(read_err)
    }

    fn check_size(&self, size: u64) -> Result<(), ImageError> {
        if size > self.max_bytes {
            return Err(ImageError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }
        Ok(())
    }
}

fn is_url(locator: &str) -> bool {
    reqwest::Url::parse(locator).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

fn extension_format(locator: &str) -> Option<ImageFormat> {
    let path = reqwest::Url::parse(locator)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| locator.to_string());
    Path::new(&path)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension)
}

/// Magic bytes first, then the extension, then JPEG
fn detect_format(locator: &str, bytes: &[u8]) -> ImageFormat {
    ImageFormat::sniff(bytes)
        .or_else(|| extension_format(locator))
        .unwrap_or(ImageFormat::Jpeg)
}
