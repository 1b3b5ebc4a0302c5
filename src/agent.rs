use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    error::AppResult,
    llm::{ChatMessage, LlmClient, ToolCall},
    models::ChatTurn,
    semantic::{SemanticLayer, Tool},
};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that finds information about movies \
and recommends them. If a tool needs more details, ask the user a follow-up question and list the \
options they can choose from. Only do what the user asked for.";

pub const STEP_LIMIT_ANSWER: &str =
    "I could not finish answering that question. Please try asking it differently.";

#[derive(Clone, Debug, Serialize)]
pub struct ToolStep {
    pub tool: Tool,
    pub input: String,
    pub output: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct AgentReply {
    pub answer: String,
    pub steps: Vec<ToolStep>,
}

/// Function-calling loop: the model picks tools, the semantic layer runs them.
#[derive(Clone)]
pub struct Agent {
    llm: Arc<LlmClient>,
    layer: SemanticLayer,
    max_steps: usize,
}

impl Agent {
    pub fn new(llm: Arc<LlmClient>, layer: SemanticLayer, max_steps: usize) -> Self {
        Self { llm, layer, max_steps: max_steps.max(1) }
    }

    pub async fn run(&self, history: &[ChatTurn], question: &str) -> AppResult<AgentReply> {
        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        for turn in history {
            messages.push(ChatMessage::user(&turn.question));
            messages.push(ChatMessage::assistant(&turn.answer));
        }
        messages.push(ChatMessage::user(question));

        let mut steps = Vec::new();

        for round in 0..self.max_steps {
            let reply = self.llm.complete(&messages, &Tool::ALL).await?;
            let calls = reply.tool_calls.clone().unwrap_or_default();

            if calls.is_empty() {
                debug!(round = round, steps = steps.len(), "agent answered");
                return Ok(AgentReply { answer: reply.content.unwrap_or_default(), steps });
            }

            messages.push(reply);
            messages.extend(self.run_tools(calls, &mut steps).await?);
        }

        warn!(max_steps = self.max_steps, "agent hit step limit");
        Ok(AgentReply { answer: STEP_LIMIT_ANSWER.to_string(), steps })
    }

    /// Runs each call and answers it with a `tool` message, successful or not.
    async fn run_tools(&self, calls: Vec<ToolCall>, steps: &mut Vec<ToolStep>) -> AppResult<Vec<ChatMessage>> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let output = match self.dispatch(&call).await? {
                Ok(step) => {
                    let output = step.output.clone();
                    steps.push(step);
                    output
                },
                Err(message) => message,
            };
            results.push(ChatMessage::tool_result(call.id, output));
        }
        Ok(results)
    }

    /// The inner `Err` is fed back to the model as the tool result.
    async fn dispatch(&self, call: &ToolCall) -> AppResult<Result<ToolStep, String>> {
        let Some(tool) = Tool::from_name(&call.function.name) else {
            warn!(tool = %call.function.name, "model requested unknown tool");
            return Ok(Err(format!("Unknown tool: {}", call.function.name)));
        };

        let Some(input) = tool_argument(tool, &call.function.arguments) else {
            warn!(tool = tool.name(), arguments = %call.function.arguments, "malformed tool arguments");
            return Ok(Err(format!(
                "Invalid arguments for {}: expected a JSON object with a \"{}\" string",
                tool.name(),
                tool.argument()
            )));
        };

        let output = self.layer.invoke(tool, &input).await?;
        Ok(Ok(ToolStep { tool, input, output }))
    }
}

/// Extracts the single string argument from the model's JSON arguments.
fn tool_argument(tool: Tool, raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Object(map) => {
            if let Some(s) = map.get(tool.argument()).and_then(|v| v.as_str()) {
                return Some(s.to_string());
            }
            let mut strings = map.values().filter_map(|v| v.as_str());
            match (strings.next(), strings.next()) {
                (Some(only), None) => Some(only.to_string()),
                _ => None,
            }
        },
        _ => None,
    }
}
