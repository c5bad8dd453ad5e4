use super::{InlineImage, StrategyOracle, non_empty_response, with_heartbeat};
use crate::error::OracleError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

/// Oracle backed by an OpenAI-compatible chat-completions endpoint.
///
/// Supports one inline image, sent as a `data:` URI content part.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpOracle {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            max_tokens: 4096,
            timeout,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Request body for one prompt
    fn request_body(&self, prompt: &str, image: Option<&InlineImage>) -> Value {
        let content = match image {
            Some(image) => json!([
                {"type": "text", "text": prompt},
                {"type": "image_url", "image_url": {"url": image.data_uri()}}
            ]),
            None => json!(prompt),
        };
        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{"role": "user", "content": content}]
        })
    }

    async fn send(&self, body: &Value) -> Result<String, OracleError> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OracleError::Rejected(format!(
                "HTTP {}: {}",
                status,
                crate::utils::truncate_chars(&text, 200)
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Transport(format!("unreadable response: {}", e)))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        non_empty_response(text)
    }
}

#[async_trait]
impl StrategyOracle for HttpOracle {
    async fn ask(&self, prompt: &str, image: Option<&InlineImage>) -> Result<String, OracleError> {
        if self.endpoint.trim().is_empty() || self.model.trim().is_empty() {
            return Err(OracleError::NotConfigured("endpoint and model are required".to_string()));
        }

        ::log::info!("Asking strategy oracle at {} (model {})", self.endpoint, self.model);
        let body = self.request_body(prompt, image);
        let text = with_heartbeat(tokio::time::timeout(self.timeout, self.send(&body)))
            .await
            .map_err(|_| OracleError::Timeout(self.timeout.as_secs()))??;
        ::log::info!("Strategy oracle answered with {} characters", text.chars().count());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_only_body() {
        let oracle = HttpOracle::new("https://llm.test/v1/chat/completions", "m-1", Duration::from_secs(1));
        let body = oracle.request_body("hello", None);
        assert_eq!(body["model"], json!("m-1"));
        assert_eq!(body["messages"][0]["content"], json!("hello"));
    }

    #[test]
    fn test_body_with_image() {
        let oracle = HttpOracle::new("https://llm.test/v1/chat/completions", "m-1", Duration::from_secs(1))
            .with_max_tokens(100);
        let image = InlineImage::png(vec![1, 2, 3]);
        let body = oracle.request_body("look", Some(&image));
        assert_eq!(body["max_tokens"], json!(100));
        assert_eq!(body["messages"][0]["content"][0]["text"], json!("look"));
        assert_eq!(
            body["messages"][0]["content"][1]["image_url"]["url"],
            json!("data:image/png;base64,AQID")
        );
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices": [{"message": {"role": "assistant", "content": "{\"a\": 1}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("{\"a\": 1}"));
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let oracle = HttpOracle::new("", "", Duration::from_secs(1));
        assert!(matches!(
            oracle.ask("p", None).await,
            Err(OracleError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let oracle = HttpOracle::new("http://127.0.0.1:9/v1/chat/completions", "m", Duration::from_secs(5));
        assert!(matches!(
            oracle.ask("p", None).await,
            Err(OracleError::Transport(_))
        ));
    }
}
