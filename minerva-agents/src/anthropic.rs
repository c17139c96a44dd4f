//! Anthropic Claude backend
//!
//! Speaks the Messages API directly over `reqwest`. The API requires strict
//! user/assistant alternation, so consecutive messages with the same role are
//! merged into one message with several content blocks, and messages from
//! other agents carry their author as a text prefix.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use minerva_core::ContentPart;

use crate::{BackendMessage, Completion, CompletionRequest, LlmBackend, LlmError, SharedBackend, ToolCallRequest};

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic Claude backend configuration
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key
    pub api_key: String,
    /// Model name (e.g., claude-3-5-sonnet-20241022)
    pub model: String,
    /// Max tokens
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl AnthropicConfig {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens: 4096,
            timeout_secs: 120,
        }
    }
}

/// Anthropic Claude backend
pub struct AnthropicBackend {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicBackend {
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config("API key is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": request.system,
            "messages": to_anthropic_messages(&request.messages),
        });

        if !request.tools.is_empty() {
            body["tools"] = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.parameters,
                    })
                })
                .collect::<Vec<_>>()
                .into();
        }

        body
    }
}

/// Convert history to Anthropic messages, merging same-role neighbours
fn to_anthropic_messages(messages: &[BackendMessage]) -> Vec<Value> {
    let mut merged: Vec<(&'static str, Vec<Value>)> = Vec::new();

    for message in messages {
        let (role, blocks) = match message {
            BackendMessage::User { name, parts } => {
                let blocks = parts
                    .iter()
                    .enumerate()
                    .map(|(i, part)| match part {
                        ContentPart::Text { text } => {
                            let text = match name {
                                Some(name) if i == 0 => format!("[{}]: {}", name, text),
                                _ => text.clone(),
                            };
                            json!({"type": "text", "text": text})
                        }
                        ContentPart::Image { image } => json!({
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": image.media_type,
                                "data": image.to_base64(),
                            },
                        }),
                    })
                    .collect::<Vec<_>>();
                ("user", blocks)
            }
            BackendMessage::Assistant {
                content,
                tool_calls,
            } => {
                let mut blocks = Vec::new();
                if let Some(text) = content.as_deref().filter(|t| !t.is_empty()) {
                    blocks.push(json!({"type": "text", "text": text}));
                }
                for call in tool_calls {
                    let input: Value = serde_json::from_str(&call.arguments).unwrap_or(json!({}));
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": input,
                    }));
                }
                ("assistant", blocks)
            }
            BackendMessage::ToolResult { call_id, content } => (
                "user",
                vec![json!({
                    "type": "tool_result",
                    "tool_use_id": call_id,
                    "content": content,
                })],
            ),
        };

        if blocks.is_empty() {
            continue;
        }

        match merged.last_mut() {
            Some((last_role, last_blocks)) if *last_role == role => last_blocks.extend(blocks),
            _ => merged.push((role, blocks)),
        }
    }

    merged
        .into_iter()
        .map(|(role, content)| json!({"role": role, "content": content}))
        .collect()
}

/// Read text and tool_use blocks out of a Messages API response
fn parse_anthropic_response(json: &Value) -> Result<Completion, LlmError> {
    let blocks = json["content"].as_array().ok_or(LlmError::EmptyResponse)?;

    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(text) = block["text"].as_str() {
                    texts.push(text.to_string());
                }
            }
            Some("tool_use") => tool_calls.push(ToolCallRequest {
                id: block["id"].as_str().unwrap_or_default().to_string(),
                name: block["name"].as_str().unwrap_or_default().to_string(),
                arguments: block["input"].to_string(),
            }),
            _ => {}
        }
    }

    if texts.is_empty() && tool_calls.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    Ok(Completion {
        text: if texts.is_empty() { None } else { Some(texts.join("\n")) },
        tool_calls,
    })
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let response = self
            .client
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("Anthropic API error {}: {}", status, text)));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        parse_anthropic_response(&json)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Create a shared Anthropic backend
pub fn create_anthropic_backend(config: AnthropicConfig) -> Result<SharedBackend, LlmError> {
    Ok(Arc::new(AnthropicBackend::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolSpec;
    use minerva_core::ImageInput;

    #[test]
    fn test_same_role_messages_merge() {
        let messages = vec![
            BackendMessage::User {
                name: Some("User".to_string()),
                parts: vec![ContentPart::Image {
                    image: ImageInput::new("image/png", vec![1, 2, 3]),
                }],
            },
            BackendMessage::user_text(Some("OCR_Specialist"), "You won a gift card!"),
        ];

        let converted = to_anthropic_messages(&messages);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0]["role"], "user");
        assert_eq!(converted[0]["content"][0]["type"], "image");
        assert_eq!(converted[0]["content"][0]["source"]["data"], "AQID");
        assert_eq!(converted[0]["content"][1]["text"], "[OCR_Specialist]: You won a gift card!");
    }

    #[test]
    fn test_tool_round_trip_blocks() {
        let messages = vec![
            BackendMessage::user_text(None, "check it"),
            BackendMessage::Assistant {
                content: None,
                tool_calls: vec![ToolCallRequest {
                    id: "toolu_1".to_string(),
                    name: "is_url_safe".to_string(),
                    arguments: r#"{"url":"http://bit.ly/xyz"}"#.to_string(),
                }],
            },
            BackendMessage::ToolResult {
                call_id: "toolu_1".to_string(),
                content: "{}".to_string(),
            },
        ];

        let converted = to_anthropic_messages(&messages);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[1]["content"][0]["type"], "tool_use");
        assert_eq!(converted[1]["content"][0]["input"]["url"], "http://bit.ly/xyz");
        assert_eq!(converted[2]["content"][0]["type"], "tool_result");
    }

    #[test]
    fn test_request_body_includes_tools() {
        let backend = AnthropicBackend::new(AnthropicConfig::new("k", "claude-3-5-sonnet-20241022")).unwrap();
        let body = backend.request_body(&CompletionRequest {
            system: "sys".to_string(),
            messages: vec![BackendMessage::user_text(None, "hi")],
            tools: vec![ToolSpec {
                name: "is_url_safe".to_string(),
                description: "Checks if a URL is safe".to_string(),
                parameters: json!({"type": "object"}),
            }],
        });

        assert_eq!(body["system"], "sys");
        assert_eq!(body["tools"][0]["name"], "is_url_safe");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
    }

    #[test]
    fn test_parse_tool_use_response() {
        let json = json!({
            "content": [
                {"type": "text", "text": "Let me check that link."},
                {"type": "tool_use", "id": "toolu_1", "name": "is_url_safe", "input": {"url": "http://bit.ly/xyz"}}
            ]
        });

        let completion = parse_anthropic_response(&json).unwrap();
        assert!(completion.wants_tools());
        assert_eq!(completion.tool_calls[0].name, "is_url_safe");
        assert_eq!(completion.text.as_deref(), Some("Let me check that link."));
    }

    #[test]
    fn test_parse_empty_response() {
        let json = json!({"content": []});
        assert!(matches!(parse_anthropic_response(&json), Err(LlmError::EmptyResponse)));
    }
}
