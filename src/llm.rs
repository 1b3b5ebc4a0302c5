use std::{num::NonZeroU32, sync::Arc};

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::semantic::Tool;

const ROUTING_KEYWORDS: &[&str] = &["recommend", "suggest", "similar"];

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("chat completion request failed")]
    Http(#[from] wreq::Error),
    #[error("chat completion returned no choices")]
    NoChoices,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: Some(content.into()), tool_calls: None, tool_call_id: None }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { tool_call_id: Some(call_id.into()), ..Self::text(Role::Tool, content) }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, as produced by the model.
    pub arguments: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    tools: Vec<serde_json::Value>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Function schema for a tool taking one string argument.
pub fn tool_definition(tool: Tool) -> serde_json::Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name(),
            "description": tool.description(),
            "parameters": {
                "type": "object",
                "properties": {
                    tool.argument(): {
                        "type": "string",
                        "description": tool.argument_description(),
                    }
                },
                "required": [tool.argument()],
            }
        }
    })
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct LlmClient {
    client: wreq::Client,
    api_key: String,
    base_url: String,
    model: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl LlmClient {
    pub fn new(client: wreq::Client, api_key: String, base_url: String, model: String, rps: u32) -> Self {
        if api_key.trim().is_empty() {
            tracing::warn!("Using mock LLM replies - no LLM_API_KEY provided");
        }

        let quota = Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN));
        let limiter = Arc::new(RateLimiter::direct(quota));
        Self { client, api_key, base_url, model, limiter }
    }

    pub fn is_mock(&self) -> bool {
        self.api_key.trim().is_empty()
    }

    pub async fn complete(&self, messages: &[ChatMessage], tools: &[Tool]) -> Result<ChatMessage, LlmError> {
        if self.is_mock() {
            return Ok(mock_reply(messages));
        }

        self.limiter.until_ready().await;

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.model,
            messages,
            tools: tools.iter().copied().map(tool_definition).collect(),
            temperature: 0.0,
        };

        let resp: ChatResponse = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let choice = resp.choices.into_iter().next().ok_or(LlmError::NoChoices)?;
        debug!(
            finish_reason = ?choice.finish_reason,
            tool_calls = choice.message.tool_calls.as_ref().map_or(0, Vec::len),
            "chat completion"
        );
        Ok(choice.message)
    }
}

/// Deterministic stand-in for the model: routes the latest question to a
/// tool by keyword, then answers with whatever the tool returned.
fn mock_reply(messages: &[ChatMessage]) -> ChatMessage {
    let Some(last) = messages.last() else {
        return ChatMessage::assistant("");
    };

    if last.role == Role::Tool {
        return ChatMessage::assistant(last.content.clone().unwrap_or_default());
    }

    let question = last.content.clone().unwrap_or_default();
    let lowered = question.to_lowercase();
    let tool = if ROUTING_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        Tool::Recommender
    } else {
        Tool::Search
    };

    let subject = quoted(&question).unwrap_or(question.as_str());
    let call_no = messages.iter().filter(|m| m.role == Role::Tool).count();

    ChatMessage {
        role: Role::Assistant,
        content: None,
        tool_calls: Some(vec![ToolCall {
            id: format!("call_{call_no}"),
            kind: function_kind(),
            function: FunctionCall {
                name: tool.name().to_string(),
                arguments: json!({ tool.argument(): subject }).to_string(),
            },
        }]),
        tool_call_id: None,
    }
}

fn quoted(text: &str) -> Option<&str> {
    let start = text.find('"')? + 1;
    let len = text[start..].find('"')?;
    Some(&text[start..start + len]).filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_call_response() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "Recommender", "arguments": "{\"movie\":\"Casino\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;

        let resp: ChatResponse = serde_json::from_str(body).unwrap();
        let msg = &resp.choices[0].message;
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.content.is_none());
        let calls = msg.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "Recommender");
        assert_eq!(calls[0].function.arguments, r#"{"movie":"Casino"}"#);
    }

    #[test]
    fn tool_result_messages_carry_call_id() {
        let value = serde_json::to_value(ChatMessage::tool_result("call_1", "Heat")).unwrap();
        assert_eq!(value, json!({"role": "tool", "content": "Heat", "tool_call_id": "call_1"}));
    }

    #[test]
    fn tool_definitions_name_their_argument() {
        let def = tool_definition(Tool::Search);
        assert_eq!(def["function"]["name"], "Search");
        assert_eq!(def["function"]["parameters"]["required"][0], "entity");
        assert_eq!(def["function"]["parameters"]["properties"]["entity"]["type"], "string");
    }

    #[test]
    fn mock_routes_by_keyword_and_quotes() {
        let reply = mock_reply(&[ChatMessage::user("Can you recommend something like \"Casino\"?")]);
        let call = &reply.tool_calls.unwrap()[0];
        assert_eq!(call.function.name, "Recommender");
        assert_eq!(call.function.arguments, r#"{"movie":"Casino"}"#);

        let reply = mock_reply(&[ChatMessage::user("Who is Tom Hanks?")]);
        let call = &reply.tool_calls.unwrap()[0];
        assert_eq!(call.function.name, "Search");
    }

    #[test]
    fn mock_answers_with_tool_output() {
        let reply = mock_reply(&[
            ChatMessage::user("Who is Tom Hanks?"),
            ChatMessage::tool_result("call_0", "type:Person"),
        ]);
        assert_eq!(reply.content.as_deref(), Some("type:Person"));
        assert!(reply.tool_calls.is_none());
    }
}
