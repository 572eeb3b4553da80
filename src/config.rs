//! Environment-driven configuration.

use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default OpenAI-compatible base URL.
pub const DEFAULT_MODEL_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model for vision-capable stages.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";

/// Default Nutritionix base URL.
pub const DEFAULT_NUTRITIONIX_BASE_URL: &str = "https://trackapi.nutritionix.com/v2";

/// Per-request Nutritionix timeout, tuned to minimize stalls.
pub const DEFAULT_NUTRITIONIX_TIMEOUT: Duration = Duration::from_secs(6);

/// Concurrency ceiling for per-item nutrition lookups within one run.
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 8;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Model-provider configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: String,
    /// Model used for stages that see the image.
    pub vision_model: String,
    /// Model used for text-only stages.
    pub text_model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ModelConfig {
    /// Load from environment.
    ///
    /// Required: `OPENAI_API_KEY`.
    /// Optional: `OPENAI_VISION_MODEL`, `OPENAI_TEXT_MODEL`,
    /// `MEALSCAN_MODEL_BASE_URL`, `MEALSCAN_MODEL_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let vision_model =
            env::var("OPENAI_VISION_MODEL").unwrap_or_else(|_| DEFAULT_VISION_MODEL.to_string());
        let text_model =
            env::var("OPENAI_TEXT_MODEL").unwrap_or_else(|_| vision_model.clone());
        let base_url = env::var("MEALSCAN_MODEL_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_MODEL_BASE_URL.to_string());
        let timeout = env::var("MEALSCAN_MODEL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Ok(Self {
            api_key,
            vision_model,
            text_model,
            base_url,
            timeout,
        })
    }
}

/// Nutritionix API configuration.
#[derive(Debug, Clone)]
pub struct NutritionixConfig {
    pub app_id: String,
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl NutritionixConfig {
    /// Load from environment.
    ///
    /// Required: `NUTRITIONIX_APP_ID`, `NUTRITIONIX_API_KEY`.
    /// Optional: `MEALSCAN_NUTRITIONIX_BASE_URL`, `MEALSCAN_NUTRITIONIX_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let app_id = env::var("NUTRITIONIX_APP_ID")
            .map_err(|_| ConfigError::MissingEnvVar("NUTRITIONIX_APP_ID".to_string()))?;
        let api_key = env::var("NUTRITIONIX_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("NUTRITIONIX_API_KEY".to_string()))?;
        let base_url = env::var("MEALSCAN_NUTRITIONIX_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_NUTRITIONIX_BASE_URL.to_string());
        let timeout = env::var("MEALSCAN_NUTRITIONIX_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_NUTRITIONIX_TIMEOUT);

        Ok(Self {
            app_id,
            api_key,
            base_url,
            timeout,
        })
    }
}

/// Top-level configuration for one orchestrator deployment.
#[derive(Debug, Clone)]
pub struct Config {
    pub model: ModelConfig,
    pub nutritionix: NutritionixConfig,
    /// Max concurrent nutrition lookups per run.
    pub lookup_concurrency: usize,
    /// Image retention; `None` keeps entries for the process lifetime.
    pub image_ttl: Option<Duration>,
}

impl Config {
    /// Load everything from environment.
    ///
    /// Optional on top of the sub-configs: `MEALSCAN_LOOKUP_CONCURRENCY`,
    /// `MEALSCAN_IMAGE_TTL_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup_concurrency = env::var("MEALSCAN_LOOKUP_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(DEFAULT_LOOKUP_CONCURRENCY);

        let image_ttl = env::var("MEALSCAN_IMAGE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs);

        Ok(Self {
            model: ModelConfig::from_env()?,
            nutritionix: NutritionixConfig::from_env()?,
            lookup_concurrency,
            image_ttl,
        })
    }
}
