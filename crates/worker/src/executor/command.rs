//! Command executor: turns a leased queue item into a tool dispatch.
//!
//! All event emission now happens broker-side (`action_started` at
//! lease time, `action_completed`/`action_error` at complete/fail
//! time) - the executor's only job is to render nothing further (the
//! broker already rendered the tool config) and run the tool.

use anyhow::{Context, Result};
use noetl_tools::registry::{AuthConfig, ToolConfig, ToolRegistry};
use noetl_tools::tools::create_default_registry;
use noetl_tools::{ExecutionContext, ToolResult};

use crate::client::LeasedItem;

/// Runs tools against leased queue items.
pub struct CommandExecutor {
    tool_registry: ToolRegistry,
    worker_id: String,
}

impl CommandExecutor {
    /// Create a new command executor.
    pub fn new(worker_id: String) -> Self {
        Self {
            tool_registry: create_default_registry(),
            worker_id,
        }
    }

    /// Execute the tool named by `item.action.kind`, rendered context
    /// supplied by the broker, and return the raw tool result. The
    /// caller reports the outcome via `/queue/complete` or
    /// `/queue/fail`.
    pub async fn execute(&self, item: &LeasedItem) -> Result<ToolResult> {
        let execution_id: i64 = item
            .execution_id
            .parse()
            .context("leased item execution_id is not numeric")?;

        let tool_config = build_tool_config(&item.action)?;

        let mut ctx = ExecutionContext::new(execution_id, item.node_id.clone(), "")
            .with_worker_id(&self.worker_id)
            .with_command_id(item.queue_id.clone());

        if let serde_json::Value::Object(map) = &item.context {
            for (k, v) in map {
                ctx.set_variable(k.clone(), v.clone());
            }
        }

        tracing::debug!(
            execution_id,
            node_id = %item.node_id,
            tool = %tool_config.kind,
            "executing tool"
        );

        Ok(self.tool_registry.execute_from_config(&tool_config, &ctx).await?)
    }
}

/// Adapt the broker's `ToolCommand` JSON (`{kind, config, timeout}`,
/// where `config` is the tool spec serialized whole, `kind` included)
/// into `noetl_tools::ToolConfig` (`kind` lifted to the top level,
/// `auth` pulled out of the nested config if present).
fn build_tool_config(action: &serde_json::Value) -> Result<ToolConfig> {
    let kind = action
        .get("kind")
        .and_then(|v| v.as_str())
        .context("queue item action missing 'kind'")?
        .to_string();

    let config = action.get("config").cloned().unwrap_or(serde_json::json!({}));

    let auth = config
        .get("auth")
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value::<AuthConfig>(v.clone()).ok());

    let timeout = action
        .get("timeout")
        .and_then(|v| v.as_i64())
        .map(|t| t.max(0) as u64);

    Ok(ToolConfig {
        kind,
        config,
        timeout,
        retry: None,
        auth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_tool_config_extracts_kind_and_auth() {
        let action = serde_json::json!({
            "kind": "http",
            "config": {
                "url": "https://example.com",
                "auth": {"type": "bearer", "token": "abc"},
            },
            "timeout": 30,
        });

        let config = build_tool_config(&action).unwrap();
        assert_eq!(config.kind, "http");
        assert_eq!(config.timeout, Some(30));
        assert!(config.auth.is_some());
    }

    #[test]
    fn test_build_tool_config_missing_config_defaults_empty() {
        let action = serde_json::json!({"kind": "noop"});
        let config = build_tool_config(&action).unwrap();
        assert_eq!(config.kind, "noop");
        assert_eq!(config.config, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_executor_runs_shell_tool() {
        let executor = CommandExecutor::new("worker-1".to_string());
        let item = LeasedItem {
            queue_id: "1".to_string(),
            execution_id: "100".to_string(),
            catalog_id: "7".to_string(),
            node_id: "step1".to_string(),
            parent_event_id: "5".to_string(),
            action: serde_json::json!({
                "kind": "shell",
                "config": {"command": "echo hello"},
            }),
            context: serde_json::json!({}),
            iterator: None,
            attempt: 1,
            lease_deadline: chrono::Utc::now(),
        };

        let result = executor.execute(&item).await.unwrap();
        assert!(result.is_success());
    }
}
