//! No-op and save tools: pure pass-through / context-store plugins.
//!
//! Steps without a connector (`kind=noop`) or steps that only want to
//! stash a rendered value into the event log for later steps to read
//! back out of context (`kind=save`) never touch the outside world -
//! both render their config against the step context and hand it back
//! as the result.

use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::error::ToolError;
use crate::registry::{Tool, ToolConfig};
use crate::result::ToolResult;
use crate::template::TemplateEngine;

/// `kind=noop`: renders and returns its config, touching nothing else.
pub struct NoopTool {
    template_engine: TemplateEngine,
}

impl NoopTool {
    pub fn new() -> Self {
        Self {
            template_engine: TemplateEngine::new(),
        }
    }
}

impl Default for NoopTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for NoopTool {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn execute(
        &self,
        config: &ToolConfig,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult, ToolError> {
        let template_ctx = ctx.to_template_context();
        let rendered = self.template_engine.render_value(&config.config, &template_ctx)?;
        Ok(ToolResult::success(rendered))
    }
}

/// `kind=save`: same pass-through as `noop`, named separately so a
/// playbook can express "store this value" without implying the step
/// does nothing.
pub struct SaveTool {
    template_engine: TemplateEngine,
}

impl SaveTool {
    pub fn new() -> Self {
        Self {
            template_engine: TemplateEngine::new(),
        }
    }
}

impl Default for SaveTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SaveTool {
    fn name(&self) -> &'static str {
        "save"
    }

    async fn execute(
        &self,
        config: &ToolConfig,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult, ToolError> {
        let template_ctx = ctx.to_template_context();
        let rendered = self.template_engine.render_value(&config.config, &template_ctx)?;
        Ok(ToolResult::success(rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_returns_rendered_config() {
        let tool = NoopTool::new();
        let config = ToolConfig {
            kind: "noop".to_string(),
            config: serde_json::json!({"marker": "{{ label }}"}),
            timeout: None,
            retry: None,
            auth: None,
        };
        let mut ctx = ExecutionContext::default();
        ctx.set_variable("label", serde_json::json!("done"));

        let result = tool.execute(&config, &ctx).await.unwrap();
        assert!(result.is_success());
        assert_eq!(
            result.data.unwrap().get("marker").unwrap(),
            "done"
        );
    }

    #[tokio::test]
    async fn test_save_tool_interface() {
        let tool = SaveTool::new();
        assert_eq!(tool.name(), "save");

        let config = ToolConfig {
            kind: "save".to_string(),
            config: serde_json::json!({"value": 1}),
            timeout: None,
            retry: None,
            auth: None,
        };
        let ctx = ExecutionContext::default();
        let result = tool.execute(&config, &ctx).await.unwrap();
        assert!(result.is_success());
    }
}
