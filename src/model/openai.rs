//! OpenAI chat-completions provider.

use super::{CompletionRequest, ModelError, ModelProvider};
use crate::config::ModelConfig;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// OpenAI API provider. Uses the vision model when an image is attached and
/// the text model otherwise.
#[derive(Debug)]
pub struct OpenAiProvider {
    config: ModelConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::RequestFailed(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self, ModelError> {
        let config = ModelConfig::from_env().map_err(|e| ModelError::NotConfigured(e.to_string()))?;
        Self::new(config)
    }

    fn data_url(bytes: &[u8], mime_type: &str) -> String {
        let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
        format!("data:{};base64,{}", mime_type, b64)
    }
}

/// Chat-completions request format.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: serde_json::Value,
}

/// Chat-completions response format.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        let model = if request.image.is_some() {
            &self.config.vision_model
        } else {
            &self.config.text_model
        };

        let mut user_parts = vec![json!({"type": "text", "text": request.user_text})];
        if let Some(image) = &request.image {
            let url = Self::data_url(&image.bytes, &image.mime_type);
            user_parts.push(json!({"type": "image_url", "image_url": {"url": url}}));
        }

        let body = ChatRequest {
            model: model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: json!(request.system_prompt),
                },
                ChatMessage {
                    role: "user",
                    content: serde_json::Value::Array(user_parts),
                },
            ],
        };

        tracing::debug!(model = %model, has_image = request.image.is_some(), "calling model API");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::RequestFailed(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ModelError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ModelError::RequestFailed(e.to_string()))?;

        if status != 200 {
            if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(&text) {
                return Err(ModelError::ApiError {
                    status,
                    message: parsed.error.message,
                });
            }
            return Err(ModelError::ApiError {
                status,
                message: text,
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| ModelError::ParseError(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ModelError::ParseError("No text content in response".to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_encodes_mime_and_payload() {
        let url = OpenAiProvider::data_url(&[0xFF, 0xD8], "image/jpeg");
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert!(url.ends_with("/9g="));
    }
}
