//! Configuration module
//!
//! Client configuration loaded from the environment (and an optional `.env` file): the remote
//! service location, request timeout, upload limit, presentational phase delay, watermark canvas
//! size and local output directories.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::validation::MAX_UPLOAD_BYTES;

// Common constants
const DEFAULT_API_URL: &str = "https://muhammedemireren-glowii.hf.space";
const REQUEST_TIMEOUT_SECS: u64 = 120;
const MAX_FILE_SIZE_MB: usize = MAX_UPLOAD_BYTES / (1024 * 1024);
const PHASE_DELAY_MS: u64 = 1000;
const CANVAS_WIDTH: u32 = 500;
const CANVAS_HEIGHT: u32 = 500;

/// Enhancement client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub max_file_size_bytes: usize,
    /// Delay of each presentational processing sub-phase
    pub phase_delay_ms: u64,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub download_dir: PathBuf,
    /// Directory of the last-upload cache. `None` disables the cache.
    pub cache_dir: Option<PathBuf>,
    pub environment: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            max_file_size_bytes: MAX_UPLOAD_BYTES,
            phase_delay_ms: PHASE_DELAY_MS,
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
            download_dir: PathBuf::from("."),
            cache_dir: None,
            environment: "development".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let config = ClientConfig {
            api_base_url: env::var("GLOWII_API_URL")
                .or_else(|_| env::var("API_URL"))
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            request_timeout_secs: env::var("GLOWII_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| REQUEST_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(REQUEST_TIMEOUT_SECS),
            max_file_size_bytes: megabytes_to_bytes(max_file_size_mb)?,
            phase_delay_ms: env::var("GLOWII_PHASE_DELAY_MS")
                .unwrap_or_else(|_| PHASE_DELAY_MS.to_string())
                .parse()
                .unwrap_or(PHASE_DELAY_MS),
            canvas_width: env::var("GLOWII_CANVAS_WIDTH")
                .unwrap_or_else(|_| CANVAS_WIDTH.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("GLOWII_CANVAS_WIDTH must be a valid number"))?,
            canvas_height: env::var("GLOWII_CANVAS_HEIGHT")
                .unwrap_or_else(|_| CANVAS_HEIGHT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("GLOWII_CANVAS_HEIGHT must be a valid number"))?,
            download_dir: env::var("GLOWII_DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            cache_dir: env::var("GLOWII_CACHE_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            environment,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "GLOWII_API_URL must be an http:// or https:// URL"
            ));
        }

        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(anyhow::anyhow!("Canvas dimensions must be non-zero"));
        }

        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be at least 1"));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn phase_delay(&self) -> Duration {
        Duration::from_millis(self.phase_delay_ms)
    }
}

fn megabytes_to_bytes(megabytes: usize) -> Result<usize, anyhow::Error> {
    megabytes
        .checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow::anyhow!("MAX_FILE_SIZE_MB is too large: {}", megabytes))
}
