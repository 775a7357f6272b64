//! Client configuration
//!
//! Built once by the entry point and passed by reference to the transport
//! and the driver.

use crate::driver::ResponseMode;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
/// 5MB
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// Everything needed to talk to the model
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: Option<String>,
    pub model: String,
    /// Messages endpoint URL
    pub base_url: String,
    pub max_tokens: u32,
    /// Optional system prompt sent with every request
    pub system: Option<String>,
    pub response_mode: ResponseMode,
    /// Send image URLs as references instead of downloading them
    pub pass_image_urls: bool,
    pub request_timeout: Duration,
    pub max_image_bytes: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system: None,
            response_mode: ResponseMode::Sync,
            pass_image_urls: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset or unparsable values
    /// keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            api_key: non_empty("ANTHROPIC_API_KEY"),
            model: non_empty("CONVERSE_MODEL").unwrap_or(defaults.model),
            base_url: non_empty("CONVERSE_BASE_URL").unwrap_or(defaults.base_url),
            max_tokens: non_empty("CONVERSE_MAX_TOKENS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_tokens),
            ..defaults
        }
    }
}
