use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{GatewayError, Generation, GenerationRequest, TextGenerator};
use crate::analysis::{analyze_entries, Taxonomy, DEFAULT_LOOKBACK};
use crate::models::EntrySummary;

const ANALYZE_TOOL: &str = "analyze_entries";
const MAX_TOOL_ROUNDS: usize = 3;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyzeArgs {
    lookback: Option<usize>,
}

fn analyze_tool_definition() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": ANALYZE_TOOL,
            "description": "Analyze the user's recent journal entries to identify themes, reflection gaps, writing patterns and recent topics",
            "parameters": {
                "type": "object",
                "properties": {
                    "lookback": {
                        "type": "integer",
                        "description": "Number of recent entries to analyze (default: 5)"
                    }
                }
            }
        }
    })
}

/// Chat-completions client for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiGenerator {
    client: Client,
    config: OpenAiConfig,
    taxonomy: Arc<Taxonomy>,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiConfig, taxonomy: Arc<Taxonomy>) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            taxonomy,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn send(&self, messages: &[Value], offer_tools: bool) -> Result<ChatResponse, GatewayError> {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
        });
        if offer_tools {
            body["tools"] = json!([analyze_tool_definition()]);
            body["tool_choice"] = json!("auto");
        }

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| GatewayError::Malformed(e.to_string()))
    }

    fn run_tool(&self, call: &ToolCall, entries: &[EntrySummary]) -> String {
        if call.function.name != ANALYZE_TOOL {
            warn!(tool = %call.function.name, "Generator requested an unknown tool");
            return json!({ "error": format!("unknown tool '{}'", call.function.name) }).to_string();
        }
        let args: AnalyzeArgs = serde_json::from_str(&call.function.arguments).unwrap_or_default();
        let lookback = args.lookback.unwrap_or(DEFAULT_LOOKBACK);
        let analysis = analyze_entries(&self.taxonomy, entries, lookback);
        debug!(lookback, themes = analysis.themes.len(), gaps = analysis.gaps.len(), "Answered entry analysis tool call");
        json!(analysis).to_string()
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    #[instrument(skip(self, request), fields(model = %self.config.model, messages = request.messages.len()))]
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GatewayError> {
        let mut messages: Vec<Value> = request.messages.iter().map(|m| json!(m)).collect();
        let mut tokens_used = 0u32;
        let mut model = self.config.model.clone();

        for round in 0..=MAX_TOOL_ROUNDS {
            let offer_tools = request.analysis.is_some() && round < MAX_TOOL_ROUNDS;
            let response = self.send(&messages, offer_tools).await?;

            tokens_used += response.usage.map(|u| u.total_tokens).unwrap_or(0);
            if let Some(m) = response.model {
                model = m;
            }
            let message = response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| GatewayError::Malformed("response has no choices".to_string()))?
                .message;

            if !message.tool_calls.is_empty() {
                let entries = request
                    .analysis
                    .as_deref()
                    .ok_or_else(|| GatewayError::Malformed("tool call without a declared tool".to_string()))?;
                messages.push(json!({
                    "role": "assistant",
                    "content": message.content,
                    "tool_calls": message.tool_calls,
                }));
                for call in &message.tool_calls {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": call.id,
                        "content": self.run_tool(call, entries),
                    }));
                }
                continue;
            }

            let text = message.content.unwrap_or_default();
            if text.trim().is_empty() {
                return Err(GatewayError::Empty);
            }
            return Ok(Generation {
                text,
                model,
                tokens_used,
            });
        }

        Err(GatewayError::Malformed(format!(
            "no answer after {} tool rounds",
            MAX_TOOL_ROUNDS
        )))
    }
}
