//! Nutritionix API client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::config::NutritionixConfig;
use crate::nutrition::provider::{InstantResults, NutritionError, NutritionProvider};

/// Production client for the Nutritionix track API.
pub struct NutritionixClient {
    config: NutritionixConfig,
    client: reqwest::Client,
}

impl NutritionixClient {
    pub fn new(config: NutritionixConfig) -> Result<Self, NutritionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NutritionError::RequestFailed(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self, NutritionError> {
        let config = NutritionixConfig::from_env()
            .map_err(|e| NutritionError::RequestFailed(e.to_string()))?;
        Self::new(config)
    }

    fn check_status(status: u16, body: &str) -> Result<(), NutritionError> {
        match status {
            200 => Ok(()),
            404 => Err(NutritionError::NotFound),
            429 => Err(NutritionError::RateLimited),
            _ => Err(NutritionError::ApiError {
                status,
                message: body.chars().take(200).collect(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NaturalResponse {
    #[serde(default)]
    foods: Vec<JsonValue>,
}

#[async_trait]
impl NutritionProvider for NutritionixClient {
    async fn instant_search(&self, query: &str) -> Result<InstantResults, NutritionError> {
        tracing::debug!(query, "nutritionix instant search");
        let response = self
            .client
            .get(format!("{}/search/instant", self.config.base_url))
            .header("x-app-id", &self.config.app_id)
            .header("x-app-key", &self.config.api_key)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|e| NutritionError::RequestFailed(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| NutritionError::RequestFailed(e.to_string()))?;
        Self::check_status(status, &body)?;

        serde_json::from_str(&body).map_err(|e| NutritionError::RequestFailed(e.to_string()))
    }

    async fn natural_nutrients(&self, query: &str) -> Result<JsonValue, NutritionError> {
        tracing::debug!(query, "nutritionix natural nutrients");
        let response = self
            .client
            .post(format!("{}/natural/nutrients", self.config.base_url))
            .header("x-app-id", &self.config.app_id)
            .header("x-app-key", &self.config.api_key)
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| NutritionError::RequestFailed(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| NutritionError::RequestFailed(e.to_string()))?;
        Self::check_status(status, &body)?;

        let parsed: NaturalResponse =
            serde_json::from_str(&body).map_err(|e| NutritionError::RequestFailed(e.to_string()))?;
        parsed.foods.into_iter().next().ok_or(NutritionError::NotFound)
    }
}
