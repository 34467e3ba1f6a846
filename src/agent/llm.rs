// ABOUTME: LLM backend abstraction — streaming text + tool-use events over one provider seam
// ABOUTME: A backend-agnostic LlmProvider SPI; ships one concrete AnthropicProvider
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! LLM backend.
//!
//! Unlike a provider whose `complete_stream` yields
//! plain text deltas, this system's loop must interleave tool calls
//! mid-stream, so `complete_stream` yields a
//! [`StreamEvent`] enum instead. One concrete backend ships —
//! [`AnthropicProvider`], built against the Messages API in the same
//! `OpenAiCompatibleProvider`-style struct usable for other
//! HTTP-backed providers — but any other backend need only implement
//! [`LlmProvider`] to be a drop-in replacement, a configuration change,
//! for backend portability.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::unfold;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AppError, AppResult};

/// One message in the conversation sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    User,
    Assistant,
}

/// A content block within an [`LlmMessage`]. Anthropic's Messages API (and
/// every OpenAI-compatible tool-calling API) represents a turn as a list
/// of typed blocks rather than a bare string once tool use is involved.
#[derive(Debug, Clone)]
pub enum LlmContentBlock {
    Text(String),
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String, is_error: bool },
}

#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: Vec<LlmContentBlock>,
}

impl LlmMessage {
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: LlmRole::User,
            content: vec![LlmContentBlock::Text(text.into())],
        }
    }
}

/// Declares one tool's name, description, and `JSON` Schema for the
/// model's function-calling surface.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// One turn's worth of input to the model.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<LlmMessage>,
    pub tools: Vec<ToolDefinition>,
    pub model: String,
    pub max_tokens: u32,
}

/// A stable stop-reason enum, independent of any one provider's wire
/// vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Other,
}

/// One event in a streamed completion.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A chunk of assistant text.
    Token(String),
    /// The model wants to invoke a tool with fully-materialized arguments.
    ToolCall { id: String, name: String, arguments: Value },
    /// Terminal event for the stream.
    StopReason(StopReason),
}

pub type ChatStream = Pin<Box<dyn Stream<Item = AppResult<StreamEvent>> + Send>>;

/// Backend SPI every model provider must satisfy: streaming text and tool-use events, per-tool schema
/// validation (enforced by the provider's own API, not this trait), and
/// the stable stop-reason enum above.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run a streaming completion.
    ///
    /// # Errors
    ///
    /// Returns `ModelError` for any transport or protocol failure.
    async fn complete_stream(&self, request: &ChatRequest) -> AppResult<ChatStream>;
}

// ============================================================================
// Anthropic Messages API provider
// ============================================================================

const DEFAULT_API_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDefinition>,
    stream: bool,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<AnthropicBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum AnthropicBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String, input: Value },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

fn to_anthropic_messages(messages: &[LlmMessage]) -> Vec<AnthropicMessage> {
    messages
        .iter()
        .map(|m| AnthropicMessage {
            role: match m.role {
                LlmRole::User => "user",
                LlmRole::Assistant => "assistant",
            },
            content: m
                .content
                .iter()
                .map(|block| match block {
                    LlmContentBlock::Text(text) => AnthropicBlock::Text { text: text.clone() },
                    LlmContentBlock::ToolUse { id, name, input } => AnthropicBlock::ToolUse {
                        id: id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                    },
                    LlmContentBlock::ToolResult { tool_use_id, content, is_error } => {
                        AnthropicBlock::ToolResult {
                            tool_use_id: tool_use_id.clone(),
                            content: content.clone(),
                            is_error: *is_error,
                        }
                    }
                })
                .collect(),
        })
        .collect()
}

/// Provider for Anthropic's Messages API (`POST /v1/messages`,
/// `stream: true`). The only concrete `LlmProvider` this core ships; the
/// trait above is the seam for swapping backends out.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    #[must_use]
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete_stream(&self, request: &ChatRequest) -> AppResult<ChatStream> {
        let body = AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            messages: to_anthropic_messages(&request.messages),
            tools: request.tools.clone(),
            stream: true,
        };

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", DEFAULT_API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::model(format!("failed to reach Anthropic API: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::model(format!("Anthropic API error ({status}): {text}")));
        }

        Ok(sse_to_events(response.bytes_stream()))
    }
}

// ============================================================================
// SSE framing — line-buffered incremental parser
// ============================================================================

/// In-flight state of one streamed content block, keyed by its index in
/// the Anthropic event stream.
enum BlockState {
    Text,
    ToolUse { id: String, name: String, json_buf: String },
}

/// Line-buffering SSE reader. Handles partial lines/`JSON` payloads split
/// across TCP chunk boundaries, same rationale as any line-buffered
/// `SseLineBuffer`: network buffering gives no guarantee that one chunk
/// equals one event.
#[derive(Default)]
struct SseLineBuffer {
    buffer: String,
}

impl SseLineBuffer {
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line = self.buffer[..pos].trim_end_matches('\r').to_owned();
            self.buffer = self.buffer[pos + 1..].to_owned();
            let trimmed = line.trim();
            if let Some(data) = trimmed.strip_prefix("data: ") {
                if !data.trim().is_empty() {
                    events.push(data.to_owned());
                }
            }
            // `event:`/`id:`/blank lines carry no information we need:
            // Anthropic's JSON payload repeats the event type in its own
            // `type` field.
        }
        events
    }
}

/// Parse one decoded event payload into zero or more [`StreamEvent`]s,
/// given the in-flight block-state map.
fn parse_anthropic_event(json_str: &str, blocks: &mut HashMap<u64, BlockState>) -> Vec<AppResult<StreamEvent>> {
    let value: Value = match serde_json::from_str(json_str) {
        Ok(v) => v,
        Err(e) => return vec![Err(AppError::model(format!("malformed Anthropic stream event: {e}")))],
    };

    let event_type = value.get("type").and_then(Value::as_str).unwrap_or_default();
    let index = value.get("index").and_then(Value::as_u64).unwrap_or(0);

    match event_type {
        "content_block_start" => {
            let block = value.get("content_block");
            let block_type = block.and_then(|b| b.get("type")).and_then(Value::as_str).unwrap_or_default();
            if block_type == "tool_use" {
                let id = block.and_then(|b| b.get("id")).and_then(Value::as_str).unwrap_or_default().to_owned();
                let name = block.and_then(|b| b.get("name")).and_then(Value::as_str).unwrap_or_default().to_owned();
                blocks.insert(index, BlockState::ToolUse { id, name, json_buf: String::new() });
            } else {
                blocks.insert(index, BlockState::Text);
            }
            Vec::new()
        }
        "content_block_delta" => {
            let delta = value.get("delta");
            let delta_type = delta.and_then(|d| d.get("type")).and_then(Value::as_str).unwrap_or_default();
            match (delta_type, blocks.get_mut(&index)) {
                ("text_delta", Some(BlockState::Text)) => {
                    let text = delta.and_then(|d| d.get("text")).and_then(Value::as_str).unwrap_or_default();
                    vec![Ok(StreamEvent::Token(text.to_owned()))]
                }
                ("input_json_delta", Some(BlockState::ToolUse { json_buf, .. })) => {
                    let partial = delta.and_then(|d| d.get("partial_json")).and_then(Value::as_str).unwrap_or_default();
                    json_buf.push_str(partial);
                    Vec::new()
                }
                _ => Vec::new(),
            }
        }
        "content_block_stop" => match blocks.remove(&index) {
            Some(BlockState::ToolUse { id, name, json_buf }) => {
                let arguments = if json_buf.trim().is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(&json_buf).unwrap_or(Value::Null)
                };
                vec![Ok(StreamEvent::ToolCall { id, name, arguments })]
            }
            _ => Vec::new(),
        },
        "message_delta" => {
            let stop_reason = value
                .get("delta")
                .and_then(|d| d.get("stop_reason"))
                .and_then(Value::as_str);
            match stop_reason {
                Some("end_turn") | Some("stop_sequence") => vec![Ok(StreamEvent::StopReason(StopReason::EndTurn))],
                Some("tool_use") => vec![Ok(StreamEvent::StopReason(StopReason::ToolUse))],
                Some("max_tokens") => vec![Ok(StreamEvent::StopReason(StopReason::MaxTokens))],
                Some(_) => vec![Ok(StreamEvent::StopReason(StopReason::Other))],
                None => Vec::new(),
            }
        }
        "error" => {
            let message = value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown Anthropic stream error");
            vec![Err(AppError::model(message.to_owned()))]
        }
        _ => Vec::new(),
    }
}

/// Adapt a raw byte stream from `reqwest::Response::bytes_stream()` into a
/// [`ChatStream`] of [`StreamEvent`]s.
fn sse_to_events<S>(byte_stream: S) -> ChatStream
where
    S: Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
{
    let state = (
        Box::pin(byte_stream) as Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
        SseLineBuffer::default(),
        HashMap::<u64, BlockState>::new(),
        std::collections::VecDeque::<AppResult<StreamEvent>>::new(),
    );

    let stream = unfold(state, |(mut byte_stream, mut parser, mut blocks, mut pending)| async move {
        loop {
            if let Some(item) = pending.pop_front() {
                return Some((item, (byte_stream, parser, blocks, pending)));
            }
            match byte_stream.next().await {
                Some(Ok(chunk)) => {
                    for line in parser.feed(&chunk) {
                        pending.extend(parse_anthropic_event(&line, &mut blocks));
                    }
                }
                Some(Err(e)) => {
                    return Some((
                        Err(AppError::model(format!("Anthropic stream read error: {e}"))),
                        (byte_stream, parser, blocks, pending),
                    ));
                }
                None => return None,
            }
        }
    });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_delta_emits_token() {
        let mut blocks = HashMap::new();
        blocks.insert(0, BlockState::Text);
        let events = parse_anthropic_event(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}"#,
            &mut blocks,
        );
        assert_eq!(events.len(), 1);
        match events.into_iter().next().unwrap() {
            Ok(StreamEvent::Token(t)) => assert_eq!(t, "hi"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn tool_use_block_assembles_arguments_across_deltas() {
        let mut blocks = HashMap::new();
        parse_anthropic_event(
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"abc","name":"nutrition_summary"}}"#,
            &mut blocks,
        );
        parse_anthropic_event(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"scenario\""}}"#,
            &mut blocks,
        );
        parse_anthropic_event(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":":\"default\"}"}}"#,
            &mut blocks,
        );
        let events = parse_anthropic_event(r#"{"type":"content_block_stop","index":0}"#, &mut blocks);
        assert_eq!(events.len(), 1);
        match events.into_iter().next().unwrap() {
            Ok(StreamEvent::ToolCall { name, arguments, .. }) => {
                assert_eq!(name, "nutrition_summary");
                assert_eq!(arguments["scenario"], "default");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn message_delta_maps_stop_reasons() {
        let mut blocks = HashMap::new();
        let events = parse_anthropic_event(
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"}}"#,
            &mut blocks,
        );
        match events.into_iter().next().unwrap() {
            Ok(StreamEvent::StopReason(StopReason::ToolUse)) => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn sse_line_buffer_handles_split_lines() {
        let mut buf = SseLineBuffer::default();
        let mut events = buf.feed(b"data: {\"type\":\"pi");
        assert!(events.is_empty());
        events = buf.feed(b"ng\"}\n");
        assert_eq!(events, vec!["{\"type\":\"ping\"}".to_owned()]);
    }
}
