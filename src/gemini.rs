//! Gemini API client for the generative-text collaborator
//!
//! Uses a long-lived reqwest::Client for connection pooling. The pipeline
//! never sees these errors raw: the agent layer collapses any failure into
//! the apology sentinel.

use crate::error::SupportAgentError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// Sentinel returned to the customer when the generative service fails.
pub const APOLOGY_RESPONSE: &str =
    "I'm sorry, I wasn't able to generate a response just now. Please try again in a moment.";

/// Generative-text collaborator: prompt in, free-text completion out.
#[async_trait]
pub trait GenerativeService: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> crate::Result<String>;
}

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent".to_string(),
        }
    }
}

#[async_trait]
impl GenerativeService for GeminiClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(SupportAgentError::ConfigError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: user_prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: system_prompt.to_string(),
                }],
            },
        };

        info!("Calling Gemini API");

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(SupportAgentError::LlmError(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            SupportAgentError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        let answer = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| {
                SupportAgentError::LlmError("Empty response from Gemini".to_string())
            })?;

        info!(chars = answer.len(), "Gemini response received");

        Ok(answer)
    }
}

/// Canned generative service for tests and offline runs: echoes a short
/// grounded-looking answer built from the prompt tail.
pub struct MockGenerativeService {
    pub canned: String,
}

impl MockGenerativeService {
    pub fn new(canned: &str) -> Self {
        Self {
            canned: canned.to_string(),
        }
    }
}

#[async_trait]
impl GenerativeService for MockGenerativeService {
    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> crate::Result<String> {
        Ok(self.canned.clone())
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "Where is my order?".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: "You are a support agent".to_string(),
                }],
            },
        };

        let json = serde_json::to_string(&request);
        assert!(json.is_ok());
        assert!(json.unwrap().contains("Where is my order?"));
    }

    #[tokio::test]
    async fn test_mock_service_returns_canned_text() {
        let svc = MockGenerativeService::new("Your order shipped.");
        let answer = svc.complete("system", "user").await.unwrap();
        assert_eq!(answer, "Your order shipped.");
    }
}
