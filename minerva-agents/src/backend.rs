//! LLM backend abstraction
//!
//! Supports OpenAI-compatible APIs and Anthropic Claude. A backend takes one
//! completion request (system directive, multimodal history, tool specs) and
//! returns either final text or a batch of tool call requests.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionCall, FunctionObjectArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use minerva_core::ContentPart;

/// LLM backend errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Empty response")]
    EmptyResponse,
}

/// A tool offered to the backend
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

/// A tool invocation requested by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model
    pub arguments: String,
}

/// One entry of the conversation history sent to a backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMessage {
    /// Input from the user or from another agent
    User {
        name: Option<String>,
        parts: Vec<ContentPart>,
    },
    /// Earlier output of the agent being invoked
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    },
    /// Result of a tool call requested in the preceding assistant message
    ToolResult { call_id: String, content: String },
}

impl BackendMessage {
    pub fn user_text(name: Option<&str>, text: &str) -> Self {
        Self::User {
            name: name.map(str::to_string),
            parts: vec![ContentPart::Text {
                text: text.to_string(),
            }],
        }
    }

    pub fn assistant_text(text: &str) -> Self {
        Self::Assistant {
            content: Some(text.to_string()),
            tool_calls: Vec::new(),
        }
    }
}

/// Everything a backend needs for one completion
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<BackendMessage>,
    pub tools: Vec<ToolSpec>,
}

/// What the backend produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl Completion {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text: None,
            tool_calls,
        }
    }

    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Generic LLM backend trait
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Run one completion over the given history
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible backend configuration
#[derive(Debug, Clone)]
pub struct OpenAIBackendConfig {
    /// API key
    pub api_key: String,
    /// Base URL (for OpenRouter, local servers, etc.)
    pub base_url: Option<String>,
    /// Model name (must accept image input)
    pub model: String,
    /// Temperature (0.0 - 2.0)
    pub temperature: f32,
    /// Max tokens
    pub max_tokens: u32,
}

impl Default for OpenAIBackendConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            model: "gpt-4o".to_string(),
            temperature: 0.0,
            max_tokens: 4096,
        }
    }
}

impl OpenAIBackendConfig {
    pub fn openai(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            ..Default::default()
        }
    }

    pub fn openrouter(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: Some("https://openrouter.ai/api/v1".to_string()),
            model: model.to_string(),
            ..Default::default()
        }
    }

    pub fn local(base_url: &str, model: &str) -> Self {
        Self {
            api_key: "sk-local".to_string(),
            base_url: Some(base_url.to_string()),
            model: model.to_string(),
            ..Default::default()
        }
    }
}

/// OpenAI-compatible LLM backend
pub struct OpenAIBackend {
    client: Client<OpenAIConfig>,
    config: OpenAIBackendConfig,
}

impl OpenAIBackend {
    pub fn new(config: OpenAIBackendConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config("API key is empty".to_string()));
        }

        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);

        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        let client = Client::with_config(openai_config);

        Ok(Self { client, config })
    }

    fn to_openai_messages(
        &self,
        request: &CompletionRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let mut messages = vec![ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.as_str())
                .build()
                .map_err(|e| LlmError::Api(e.to_string()))?,
        )];

        for message in &request.messages {
            let converted = match message {
                BackendMessage::User { name, parts } => {
                    let content = parts.iter().map(to_openai_part).collect::<Vec<_>>();
                    let mut args = ChatCompletionRequestUserMessageArgs::default();
                    args.content(ChatCompletionRequestUserMessageContent::Array(content));
                    if let Some(name) = name {
                        args.name(name.as_str());
                    }
                    ChatCompletionRequestMessage::User(
                        args.build().map_err(|e| LlmError::Api(e.to_string()))?,
                    )
                }
                BackendMessage::Assistant {
                    content,
                    tool_calls,
                } => {
                    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                    if let Some(content) = content {
                        args.content(content.as_str());
                    }
                    if !tool_calls.is_empty() {
                        args.tool_calls(
                            tool_calls
                                .iter()
                                .map(|call| ChatCompletionMessageToolCall {
                                    id: call.id.clone(),
                                    r#type: ChatCompletionToolType::Function,
                                    function: FunctionCall {
                                        name: call.name.clone(),
                                        arguments: call.arguments.clone(),
                                    },
                                })
                                .collect::<Vec<_>>(),
                        );
                    }
                    ChatCompletionRequestMessage::Assistant(
                        args.build().map_err(|e| LlmError::Api(e.to_string()))?,
                    )
                }
                BackendMessage::ToolResult { call_id, content } => {
                    ChatCompletionRequestMessage::Tool(
                        ChatCompletionRequestToolMessageArgs::default()
                            .content(content.as_str())
                            .tool_call_id(call_id.as_str())
                            .build()
                            .map_err(|e| LlmError::Api(e.to_string()))?,
                    )
                }
            };
            messages.push(converted);
        }

        Ok(messages)
    }

    fn to_openai_tools(&self, tools: &[ToolSpec]) -> Result<Vec<ChatCompletionTool>, LlmError> {
        tools
            .iter()
            .map(|tool| {
                let function = FunctionObjectArgs::default()
                    .name(tool.name.as_str())
                    .description(tool.description.as_str())
                    .parameters(tool.parameters.clone())
                    .build()
                    .map_err(|e| LlmError::Api(e.to_string()))?;

                ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(function)
                    .build()
                    .map_err(|e| LlmError::Api(e.to_string()))
            })
            .collect()
    }
}

fn to_openai_part(part: &ContentPart) -> ChatCompletionRequestUserMessageContentPart {
    match part {
        ContentPart::Text { text } => ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartText { text: text.clone() },
        ),
        ContentPart::Image { image } => ChatCompletionRequestUserMessageContentPart::ImageUrl(
            ChatCompletionRequestMessageContentPartImage {
                image_url: ImageUrl {
                    url: image.to_data_url(),
                    detail: Some(ImageDetail::Auto),
                },
            },
        ),
    }
}

#[async_trait]
impl LlmBackend for OpenAIBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let messages = self.to_openai_messages(request)?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.config.model)
            .messages(messages)
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens);

        if !request.tools.is_empty() {
            args.tools(self.to_openai_tools(&request.tools)?);
        }

        let chat_request = args.build().map_err(|e| LlmError::Api(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(LlmError::EmptyResponse)?;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect::<Vec<_>>();

        if message.content.is_none() && tool_calls.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(Completion {
            text: message.content,
            tool_calls,
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Thread-safe reference to an LLM backend, shared by every agent
pub type SharedBackend = Arc<dyn LlmBackend>;

/// Create a shared OpenAI-compatible backend
pub fn create_backend(config: OpenAIBackendConfig) -> Result<SharedBackend, LlmError> {
    Ok(Arc::new(OpenAIBackend::new(config)?))
}
