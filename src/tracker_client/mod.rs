// ABOUTME: Ephemeral-session-per-call MCP client for the external workout tracker
// ABOUTME: Built on rmcp in its client role
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 fitcoach-server contributors

//! Tracker tool-server client.
//!
//! Every call spawns the tracker's MCP tool-server as a child process,
//! performs the `initialize` handshake, invokes exactly one tool, and
//! tears the session down — no connection pooling, no session reuse
//! across calls. State machine: `spawn →
//! initialize → call_tool → close`. The cost of re-spawning per call is
//! accepted deliberately; this system's call volume (a handful of tool
//! invocations per chat turn) does not justify the complexity of
//! keeping a long-lived child process supervised and healthy.

use std::time::Duration;

use rmcp::model::CallToolRequestParam;
use rmcp::transport::TokioChildProcess;
use rmcp::ServiceExt;
use serde_json::Value;
use tokio::process::Command;

use crate::config::environment::TrackerConfig;
use crate::errors::{AppError, AppResult};

/// Client for the tracker's MCP tool-server.
#[derive(Clone)]
pub struct TrackerClient {
    command: String,
    args: Vec<String>,
    api_key: String,
    call_timeout: Duration,
}

impl TrackerClient {
    #[must_use]
    pub fn new(config: &TrackerConfig, call_timeout: Duration) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            api_key: config.api_key.clone(),
            call_timeout,
        }
    }

    /// Invoke a single named tool with `arguments`, returning its decoded
    /// `JSON` result.
    ///
    /// # Errors
    ///
    /// Returns `ToolError` for any spawn/handshake/call failure, or
    /// `TimeoutError` if `call_timeout` elapses first.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> AppResult<Value> {
        match tokio::time::timeout(self.call_timeout, self.call_tool_inner(name, arguments)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::timeout(format!("tracker tool '{name}' timed out"))),
        }
    }

    async fn call_tool_inner(&self, name: &str, arguments: Value) -> AppResult<Value> {
        let mut command = Command::new(&self.command);
        command.args(&self.args);
        command.env("TRACKER_API_KEY", &self.api_key);
        command.stderr(std::process::Stdio::null());

        let transport = TokioChildProcess::new(command)
            .map_err(|e| AppError::tool(format!("failed to spawn tracker process: {e}")))?;

        let session = ()
            .serve(transport)
            .await
            .map_err(|e| AppError::tool(format!("tracker MCP handshake failed: {e}")))?;

        let call_result = session
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: value_to_arguments(arguments),
            })
            .await;

        // Close the child process regardless of call outcome.
        let _ = session.cancel().await;

        let result = call_result.map_err(|e| AppError::tool(format!("tracker tool '{name}' failed: {e}")))?;

        if result.is_error.unwrap_or(false) {
            return Err(AppError::tool(format!("tracker tool '{name}' returned an error result")));
        }

        let joined: String = result
            .content
            .iter()
            .filter_map(|c| c.as_text())
            .map(|t| t.text.clone())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(serde_json::from_str(&joined).unwrap_or(Value::String(joined)))
    }

    /// Fetch workouts recorded at or after `since`.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::call_tool`] errors, plus `ToolError` if the
    /// result is not a `JSON` array (or `{"workouts": [...]}`).
    pub async fn get_workouts(&self, since: chrono::DateTime<chrono::Utc>) -> AppResult<Vec<Value>> {
        let result = self
            .call_tool("get_workouts", serde_json::json!({ "since": since.to_rfc3339() }))
            .await?;
        extract_array(result, "workouts")
    }

    /// Fetch a single workout by the tracker's own id.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::call_tool`] errors.
    pub async fn get_workout(&self, external_id: &str) -> AppResult<Value> {
        self.call_tool("get_workout", serde_json::json!({ "id": external_id })).await
    }
}

fn value_to_arguments(value: Value) -> Option<serde_json::Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::Null => None,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("value".to_string(), other);
            Some(map)
        }
    }
}

fn extract_array(value: Value, wrapper_key: &str) -> AppResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => map
            .remove(wrapper_key)
            .and_then(|v| v.as_array().cloned())
            .ok_or_else(|| AppError::tool(format!("tracker result missing '{wrapper_key}' array"))),
        other => Err(AppError::tool(format!("unexpected tracker result shape: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_array_accepts_bare_array() {
        let value = serde_json::json!([{"id": "1"}]);
        let items = extract_array(value, "workouts").unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn extract_array_accepts_wrapped_object() {
        let value = serde_json::json!({"workouts": [{"id": "1"}, {"id": "2"}]});
        let items = extract_array(value, "workouts").unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn extract_array_rejects_scalar() {
        let value = serde_json::json!("not an array");
        assert!(extract_array(value, "workouts").is_err());
    }

    #[test]
    fn value_to_arguments_wraps_non_object_scalars() {
        let wrapped = value_to_arguments(serde_json::json!(42)).unwrap();
        assert_eq!(wrapped.get("value"), Some(&serde_json::json!(42)));
    }
}
