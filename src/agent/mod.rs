// ABOUTME: Agent module root — system prompt, LLM backend seam, tool surface, execution loop
// ABOUTME: The coaching agent: system prompt, LLM backend seam, tool surface, execution loop
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Coaching agent.

pub mod llm;
pub mod prompts;
pub mod runtime;
pub mod tools;

pub use llm::{AnthropicProvider, ChatRequest, LlmProvider, StreamEvent};
pub use runtime::AgentRuntime;
pub use tools::{RunContext, Tool, ToolRegistry};
