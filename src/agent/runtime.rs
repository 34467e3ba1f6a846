// ABOUTME: Agent turn execution loop — the state machine driving one chat turn to completion
// ABOUTME: Drives a tool-call-interleaved loop around the LLM backend
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Agent execution loop.
//!
//! One call to [`AgentRuntime::run_turn`] carries out the full contract:
//! write the user's message before the model is ever invoked, stream the
//! model's reply, suspend to dispatch any tool calls the model requests,
//! resume with the tool results, and keep going until the model reaches a
//! terminal stop reason — then persist exactly one assistant row,
//! regardless of how many tool round-trips the turn took.
//!
//! States: `AwaitingModel -> Streaming -> (ToolDispatch
//! -> ToolAwaiting -> AwaitingModel)* -> Finalizing -> Persisted`, with
//! `Aborted` reachable from `Streaming` on a transport error.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::chat;
use crate::errors::AppResult;
use crate::models::{ChatMessage, MessageRole, ToolCallRecord};
use crate::storage::Database;
use crate::tracker_client::TrackerClient;

use super::llm::{ChatRequest, LlmContentBlock, LlmMessage, LlmProvider, LlmRole, StopReason, StreamEvent};
use super::prompts::get_system_prompt;
use super::tools::{digest_result, invoke_tracker_tool, RunContext, Tool, ToolRegistry, ToolRoute};

/// Upper bound on model/tool round-trips within a single turn, guarding
/// against a model that never reaches a terminal stop reason.
const MAX_TOOL_ROUNDS: usize = 8;

/// Very rough token estimate (no tokenizer dependency in this core):
/// English averages roughly 4 characters per token. Used only to
/// populate `ChatMessage::token_count`, which is informational.
fn estimate_tokens(text: &str) -> i32 {
    ((text.chars().count() as f64) / 4.0).ceil() as i32
}

fn history_to_llm_messages(history: &[ChatMessage]) -> Vec<LlmMessage> {
    history
        .iter()
        .filter_map(|m| match m.role {
            MessageRole::User => Some(LlmMessage {
                role: LlmRole::User,
                content: vec![LlmContentBlock::Text(m.content.clone())],
            }),
            MessageRole::Assistant => Some(LlmMessage {
                role: LlmRole::Assistant,
                content: vec![LlmContentBlock::Text(m.content.clone())],
            }),
            MessageRole::System => None,
        })
        .collect()
}

/// Drives one chat turn end to end.
pub struct AgentRuntime {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    model: String,
    max_tokens: u32,
    history_window: i64,
    tool_timeout: Duration,
}

impl AgentRuntime {
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        model: String,
        max_tokens: u32,
        history_window: usize,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            tools,
            model,
            max_tokens,
            history_window: history_window as i64,
            tool_timeout,
        }
    }

    /// Run a full turn: persist the user message, call the model, dispatch
    /// any requested tools, and persist the finalized assistant message.
    ///
    /// `token_sink`, if given, receives each text token as it streams in —
    /// the `/chat/stream` handler wires this to the `HTTP` response body;
    /// `/chat` passes `None` and reads the accumulated text from the
    /// returned [`ChatMessage`] instead.
    ///
    /// # Errors
    ///
    /// Returns `ModelError` if the model transport fails mid-stream.
    /// On a transport error mid-stream, this discards the streamed tokens and
    /// never writes an assistant row — the user's message written at the
    /// start of the turn is the only durable effect. Tool failures do not
    /// abort the turn: they are reported back to the model as an error
    /// tool result and the turn continues.
    pub async fn run_turn(
        &self,
        db: &Database,
        tracker: &TrackerClient,
        user_id: Uuid,
        session_id: Uuid,
        user_message: &str,
        token_sink: Option<UnboundedSender<String>>,
    ) -> AppResult<ChatMessage> {
        chat::record_user_message(db, session_id, user_message).await?;

        let history = chat::recent_messages(db, session_id, self.history_window).await?;
        let mut messages = history_to_llm_messages(&history);

        let run_ctx = RunContext {
            db: db.clone(),
            tracker: tracker.clone(),
            user_id,
            session_id,
        };

        let system = get_system_prompt();
        let tool_defs = self.tools.definitions();

        let mut assistant_text = String::new();
        let mut tool_call_log: Vec<ToolCallRecord> = Vec::new();

        for _round in 0..MAX_TOOL_ROUNDS {
            let request = ChatRequest {
                system: system.clone(),
                messages: messages.clone(),
                tools: tool_defs.clone(),
                model: self.model.clone(),
                max_tokens: self.max_tokens,
            };

            let mut stream = self.provider.complete_stream(&request).await?;

            let mut round_text = String::new();
            let mut pending_tool_calls: Vec<(String, String, serde_json::Value)> = Vec::new();
            let mut stop_reason = None;

            while let Some(event) = stream.next().await {
                match event? {
                    StreamEvent::Token(token) => {
                        round_text.push_str(&token);
                        if let Some(sink) = &token_sink {
                            // A dropped receiver just means the client disconnected
                            // mid-stream; the turn still finishes and persists.
                            let _ = sink.send(token);
                        }
                    }
                    StreamEvent::ToolCall { id, name, arguments } => {
                        pending_tool_calls.push((id, name, arguments));
                    }
                    StreamEvent::StopReason(reason) => stop_reason = Some(reason),
                }
            }

            assistant_text.push_str(&round_text);

            if pending_tool_calls.is_empty() || stop_reason != Some(StopReason::ToolUse) {
                break;
            }

            let mut assistant_blocks = Vec::new();
            if !round_text.is_empty() {
                assistant_blocks.push(LlmContentBlock::Text(round_text));
            }
            for (id, name, arguments) in &pending_tool_calls {
                assistant_blocks.push(LlmContentBlock::ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: arguments.clone(),
                });
            }
            messages.push(LlmMessage {
                role: LlmRole::Assistant,
                content: assistant_blocks,
            });

            // The model may request several tool calls in one step; run them
            // concurrently (each against its own DB session via `run_ctx`'s
            // pool handle) and feed results back in the order requested,
            // independent of completion order.
            let outcomes = futures_util::future::join_all(
                pending_tool_calls
                    .iter()
                    .map(|(_, name, arguments)| self.dispatch_tool(&run_ctx, name, arguments.clone())),
            )
            .await;

            let mut result_blocks = Vec::with_capacity(pending_tool_calls.len());
            for ((id, name, arguments), outcome) in pending_tool_calls.into_iter().zip(outcomes) {
                match outcome {
                    Ok(value) => {
                        tool_call_log.push(ToolCallRecord {
                            tool_name: name,
                            arguments,
                            result_digest: digest_result(&value),
                        });
                        result_blocks.push(LlmContentBlock::ToolResult {
                            tool_use_id: id,
                            content: value.to_string(),
                            is_error: false,
                        });
                    }
                    Err(err) => {
                        tool_call_log.push(ToolCallRecord {
                            tool_name: name,
                            arguments,
                            result_digest: format!("error: {}", err.message),
                        });
                        result_blocks.push(LlmContentBlock::ToolResult {
                            tool_use_id: id,
                            content: err.message,
                            is_error: true,
                        });
                    }
                }
            }
            messages.push(LlmMessage {
                role: LlmRole::User,
                content: result_blocks,
            });
        }

        let token_count = estimate_tokens(&assistant_text);
        chat::finalize_assistant_turn(db, session_id, &assistant_text, token_count, tool_call_log).await
    }

    /// Dispatch one tool call to either a local [`Tool`] or the tracker's
    /// MCP tool-server, enforcing the configured per-tool timeout on local
    /// tools (the tracker client carries its own timeout internally).
    async fn dispatch_tool(
        &self,
        ctx: &RunContext,
        name: &str,
        arguments: serde_json::Value,
    ) -> AppResult<serde_json::Value> {
        match self.tools.route(name) {
            Some(ToolRoute::Local(tool)) => self.invoke_local(tool.as_ref(), ctx, arguments).await,
            Some(ToolRoute::McpTracker(tracker_name)) => invoke_tracker_tool(ctx, &tracker_name, arguments).await,
            None => Err(crate::errors::AppError::tool(format!("unknown tool '{name}'"))),
        }
    }

    async fn invoke_local(
        &self,
        tool: &dyn Tool,
        ctx: &RunContext,
        arguments: serde_json::Value,
    ) -> AppResult<serde_json::Value> {
        match tokio::time::timeout(self.tool_timeout, tool.invoke(ctx, arguments)).await {
            Ok(result) => result,
            Err(_) => Err(crate::errors::AppError::timeout(format!("tool '{}' timed out", tool.name()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(role: MessageRole, content: &str) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
            token_count: 0,
            tool_calls: None,
            embedding: None,
        }
    }

    #[test]
    fn history_conversion_drops_system_rows_and_preserves_order() {
        let history = vec![
            message(MessageRole::User, "hi"),
            message(MessageRole::System, "ignored"),
            message(MessageRole::Assistant, "hello"),
        ];
        let converted = history_to_llm_messages(&history);
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role, LlmRole::User);
        assert_eq!(converted[1].role, LlmRole::Assistant);
    }

    #[test]
    fn token_estimate_scales_with_length() {
        assert!(estimate_tokens("a") <= estimate_tokens(&"a".repeat(100)));
        assert_eq!(estimate_tokens(""), 0);
    }
}
