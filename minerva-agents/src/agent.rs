//! Agent - one pipeline role bound to a reasoning backend
//!
//! An agent is stateless across runs: given the seed message and the
//! transcript so far it produces exactly one turn. When the backend asks
//! for tools, they run in the order requested and their results are fed back
//! into the same turn, for at most `max_tool_rounds` round-trips.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use minerva_core::{ChatMessage, ToolExecution, Transcript, Turn, TurnContent, DEFAULT_MAX_TOOL_ROUNDS};

use crate::{
    AgentRole, BackendMessage, CompletionRequest, ConfigError, LlmError, RoleConfig,
    SharedBackend, SharedTool, ToolCallRequest, ToolError,
};

/// Errors from agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool '{tool}' failed: {source}")]
    Tool {
        tool: String,
        #[source]
        source: ToolError,
    },
}

/// A reasoning unit with fixed instructions and optional tools
pub struct Agent {
    id: String,
    description: String,
    instructions: String,
    tools: Vec<SharedTool>,
    backend: SharedBackend,
    max_tool_rounds: u32,
}

impl Agent {
    pub fn new(id: &str, description: &str, instructions: &str, backend: SharedBackend) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            instructions: instructions.to_string(),
            tools: Vec::new(),
            backend,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Build the agent for a pipeline role from its configured instructions
    pub fn for_role(
        role: AgentRole,
        config: &RoleConfig,
        backend: SharedBackend,
    ) -> Result<Self, ConfigError> {
        let instructions = config.instructions(role)?;
        Ok(Self::new(role.agent_id(), role.description(), instructions, backend))
    }

    pub fn with_tool(mut self, tool: SharedTool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Produce this agent's turn for the current transcript
    pub async fn take_turn(
        &self,
        task: &ChatMessage,
        transcript: &Transcript,
        sequence_number: u32,
    ) -> Result<Turn, AgentError> {
        let mut request = CompletionRequest {
            system: self.instructions.clone(),
            messages: self.history(task, transcript),
            tools: self.tools.iter().map(|t| t.spec()).collect(),
        };

        let mut executions: Vec<ToolExecution> = Vec::new();
        let mut rounds = 0;

        loop {
            let completion = self.backend.complete(&request).await?;

            if !completion.wants_tools() || self.tools.is_empty() {
                let text = completion.text.unwrap_or_default();
                debug!("{} produced {} chars after {} tool round(s)", self.id, text.len(), rounds);
                return Ok(Turn::new(&self.id, TurnContent::text(text), sequence_number)
                    .with_tool_calls(executions));
            }

            if rounds >= self.max_tool_rounds {
                warn!(
                    "{} hit the tool round ceiling ({}), ending turn on tool results",
                    self.id, self.max_tool_rounds
                );
                return Ok(Turn::new(
                    &self.id,
                    TurnContent::ToolSummary {
                        executions: executions.clone(),
                    },
                    sequence_number,
                )
                .with_tool_calls(executions));
            }
            rounds += 1;

            request.messages.push(BackendMessage::Assistant {
                content: completion.text.clone(),
                tool_calls: completion.tool_calls.clone(),
            });

            for call in completion.tool_calls {
                let output = self.execute(&call).await?;
                request.messages.push(BackendMessage::ToolResult {
                    call_id: call.id.clone(),
                    content: output.clone(),
                });
                executions.push(ToolExecution {
                    call_id: call.id,
                    tool_name: call.name,
                    arguments: parse_arguments(&call.arguments).unwrap_or(Value::Null),
                    output,
                });
            }
        }
    }

    /// Seed message, then prior turns: own turns as assistant, others as named input
    fn history(&self, task: &ChatMessage, transcript: &Transcript) -> Vec<BackendMessage> {
        let mut messages = vec![BackendMessage::User {
            name: Some(task.source.clone()),
            parts: task.parts.clone(),
        }];

        for turn in transcript.turns().iter().filter(|t| !t.is_empty()) {
            let text = turn.text();
            if turn.author == self.id {
                messages.push(BackendMessage::assistant_text(&text));
            } else {
                messages.push(BackendMessage::user_text(Some(&turn.author), &text));
            }
        }

        messages
    }

    /// Run one requested tool; non-fatal failures become output for the backend
    async fn execute(&self, call: &ToolCallRequest) -> Result<String, AgentError> {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            warn!("{} requested unknown tool '{}'", self.id, call.name);
            return Ok(format!("Error: unknown tool '{}'", call.name));
        };

        let arguments = match parse_arguments(&call.arguments) {
            Ok(arguments) => arguments,
            Err(e) => return Ok(format!("Error: invalid arguments: {}", e)),
        };

        info!("{} calling tool {}", self.id, call.name);

        match tool.call(arguments).await {
            Ok(output) => Ok(output),
            Err(e) if e.is_fatal() => Err(AgentError::Tool {
                tool: call.name.clone(),
                source: e,
            }),
            Err(e) => {
                debug!("Tool {} rejected call: {}", call.name, e);
                Ok(format!("Error: {}", e))
            }
        }
    }
}

fn parse_arguments(raw: &str) -> Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Completion, LlmBackend, Tool};
    use async_trait::async_trait;
    use minerva_core::ImageInput;
    use minerva_safety::SafetyError;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays scripted completions and records every request
    struct MockBackend {
        script: Mutex<VecDeque<Result<Completion, LlmError>>>,
        fallback: Completion,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl MockBackend {
        fn new(script: Vec<Result<Completion, LlmError>>) -> Arc<Self> {
            Self::with_fallback(script, Completion::text("done"))
        }

        fn with_fallback(script: Vec<Result<Completion, LlmError>>, fallback: Completion) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                fallback,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmBackend for MockBackend {
        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(self.fallback.clone()))
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "is_url_safe"
        }

        fn description(&self) -> &str {
            "Checks if a URL is safe"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn call(&self, arguments: Value) -> Result<String, ToolError> {
            Ok(format!("checked {}", arguments["url"].as_str().unwrap_or("?")))
        }
    }

    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            "is_url_safe"
        }

        fn description(&self) -> &str {
            "Checks if a URL is safe"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn call(&self, _arguments: Value) -> Result<String, ToolError> {
            Err(ToolError::Safety(SafetyError::Service("connection refused".to_string())))
        }
    }

    fn url_call(id: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: "is_url_safe".to_string(),
            arguments: r#"{"url": "http://bit.ly/xyz"}"#.to_string(),
        }
    }

    fn task() -> ChatMessage {
        ChatMessage::image(ImageInput::new("image/png", vec![1, 2, 3]))
    }

    #[tokio::test]
    async fn test_plain_turn() {
        let backend = MockBackend::new(vec![Ok(Completion::text("You won a gift card! Click http://bit.ly/xyz"))]);
        let agent = Agent::new("OCR_Specialist", "Extracts text", "Transcribe the image", backend.clone());

        let turn = agent.take_turn(&task(), &Transcript::new(), 1).await.unwrap();

        assert_eq!(turn.author, "OCR_Specialist");
        assert_eq!(turn.sequence_number, 1);
        assert!(turn.text().contains("http://bit.ly/xyz"));
        assert!(turn.tool_calls.is_empty());

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system, "Transcribe the image");
        assert!(requests[0].tools.is_empty());
        assert!(matches!(
            &requests[0].messages[0],
            BackendMessage::User { name: Some(n), .. } if n == "User"
        ));
    }

    #[tokio::test]
    async fn test_history_roles() {
        let backend = MockBackend::new(vec![]);
        let agent = Agent::new("Decision_Maker", "d", "decide", backend.clone());

        let mut transcript = Transcript::new();
        transcript.append(Turn::new("OCR_Specialist", TurnContent::text("text"), 1));
        transcript.append(Turn::new("Decision_Maker", TurnContent::text("earlier"), 2));
        transcript.append(Turn::new("Summary_Agent", TurnContent::text(""), 3));

        agent.take_turn(&task(), &transcript, 4).await.unwrap();

        let messages = &backend.requests()[0].messages;
        // Empty turns are not replayed
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], BackendMessage::user_text(Some("OCR_Specialist"), "text"));
        assert_eq!(messages[2], BackendMessage::assistant_text("earlier"));
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let backend = MockBackend::new(vec![
            Ok(Completion::tool_calls(vec![url_call("call_1")])),
            Ok(Completion::text("http://bit.ly/xyz is flagged")),
        ]);
        let agent = Agent::new("URL_Checker", "c", "check links", backend.clone())
            .with_tool(Arc::new(EchoTool));

        let turn = agent.take_turn(&task(), &Transcript::new(), 2).await.unwrap();

        assert_eq!(turn.text(), "http://bit.ly/xyz is flagged");
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].arguments["url"], "http://bit.ly/xyz");
        assert_eq!(turn.tool_calls[0].output, "checked http://bit.ly/xyz");

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools[0].name, "is_url_safe");
        let follow_up = &requests[1].messages;
        assert!(matches!(follow_up[follow_up.len() - 2], BackendMessage::Assistant { .. }));
        assert_eq!(
            follow_up[follow_up.len() - 1],
            BackendMessage::ToolResult {
                call_id: "call_1".to_string(),
                content: "checked http://bit.ly/xyz".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_tool_rounds_are_bounded() {
        let backend = MockBackend::with_fallback(vec![], Completion::tool_calls(vec![url_call("again")]));
        let agent = Agent::new("URL_Checker", "c", "check links", backend.clone())
            .with_tool(Arc::new(EchoTool))
            .with_max_tool_rounds(2);

        let turn = agent.take_turn(&task(), &Transcript::new(), 2).await.unwrap();

        assert_eq!(backend.requests().len(), 3);
        assert_eq!(turn.tool_calls.len(), 2);
        match &turn.content {
            TurnContent::ToolSummary { executions } => assert_eq!(executions.len(), 2),
            other => panic!("expected tool summary, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_reported_to_backend() {
        let backend = MockBackend::new(vec![
            Ok(Completion::tool_calls(vec![ToolCallRequest {
                id: "call_1".to_string(),
                name: "ocr".to_string(),
                arguments: "{}".to_string(),
            }])),
            Ok(Completion::text("ok")),
        ]);
        let agent = Agent::new("URL_Checker", "c", "check", backend.clone()).with_tool(Arc::new(EchoTool));

        let turn = agent.take_turn(&task(), &Transcript::new(), 1).await.unwrap();
        assert!(turn.tool_calls[0].output.contains("unknown tool"));
        assert_eq!(turn.text(), "ok");
    }

    #[tokio::test]
    async fn test_fatal_tool_error_aborts_turn() {
        let backend = MockBackend::new(vec![Ok(Completion::tool_calls(vec![url_call("call_1")]))]);
        let agent = Agent::new("URL_Checker", "c", "check", backend).with_tool(Arc::new(BrokenTool));

        let err = agent.take_turn(&task(), &Transcript::new(), 2).await.unwrap_err();
        assert!(matches!(err, AgentError::Tool { ref tool, .. } if tool == "is_url_safe"));
    }

    #[tokio::test]
    async fn test_backend_failure() {
        let backend = MockBackend::new(vec![Err(LlmError::Api("timeout".to_string()))]);
        let agent = Agent::new("Content_Analyst", "a", "analyze", backend);

        let err = agent.take_turn(&task(), &Transcript::new(), 3).await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(LlmError::Api(_))));
    }

    #[test]
    fn test_for_role() {
        let config = RoleConfig::load_embedded().unwrap();
        let backend = MockBackend::new(vec![]);
        let agent = Agent::for_role(AgentRole::SummaryAgent, &config, backend).unwrap();
        assert_eq!(agent.id(), "Summary_Agent");
        assert!(!agent.instructions().is_empty());
    }
}
