//! OpenAI-backed semantic category matcher
//!
//! Last rung of the classification ladder, consulted only when the static
//! table has no answer for a pair. The model is instructed to answer with
//! a bare JSON object; anything else is a typed parse error the
//! classifier recovers from.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::providers::RateLimiter;
use crate::types::{CategoryMatch, CategoryMatchProvider, MatchError};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const RATE_LIMIT_MS: u64 = 500;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Chat-completions client implementing `CategoryMatchProvider`
pub struct OpenAiCategoryMatcher {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
}

impl OpenAiCategoryMatcher {
    pub fn new(api_key: String) -> dscout_common::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| dscout_common::Error::Internal(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            model: DEFAULT_MODEL.to_string(),
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn build_prompt(
        event_category: &str,
        target_category: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> String {
        let mut prompt = format!(
            "Do events in category \"{}\" compete for the same audience as events \
             in category \"{}\"?",
            event_category, target_category
        );
        if let Some(title) = title {
            prompt.push_str(&format!(" The event is titled \"{}\".", title));
        }
        if let Some(description) = description {
            prompt.push_str(&format!(" Description: {}", truncate(description, 300)));
        }
        prompt.push_str(
            " Answer with only a JSON object: \
             {\"is_match\": bool, \"confidence\": number 0-1, \"reasoning\": string}",
        );
        prompt
    }
}

#[async_trait]
impl CategoryMatchProvider for OpenAiCategoryMatcher {
    async fn match_category(
        &self,
        event_category: &str,
        target_category: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<CategoryMatch, MatchError> {
        self.rate_limiter.wait().await;

        let prompt = Self::build_prompt(event_category, target_category, title, description);

        tracing::debug!(
            event_category = %event_category,
            target_category = %target_category,
            "Requesting AI category match"
        );

        let response = self
            .http_client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "temperature": 0.0,
                "messages": [
                    {
                        "role": "system",
                        "content": "You classify whether two event categories draw overlapping audiences. Respond with JSON only."
                    },
                    {"role": "user", "content": prompt}
                ],
            }))
            .send()
            .await
            .map_err(|e| MatchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MatchError::Api(status.as_u16(), error_text));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| MatchError::Parse(e.to_string()))?;

        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| MatchError::Parse("empty choices".to_string()))?;

        parse_match_response(content)
    }
}

/// Parse the model's JSON answer, tolerating markdown code fences.
pub fn parse_match_response(content: &str) -> Result<CategoryMatch, MatchError> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let parsed: CategoryMatch = serde_json::from_str(trimmed)
        .map_err(|e| MatchError::Parse(format!("{}: {}", e, truncate(trimmed, 120))))?;

    if !(0.0..=1.0).contains(&parsed.confidence) {
        return Err(MatchError::Parse(format!(
            "confidence out of range: {}",
            parsed.confidence
        )));
    }

    Ok(parsed)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
