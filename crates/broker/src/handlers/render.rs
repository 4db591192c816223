//! Template rendering helper for workers.
//!
//! Exposes the same renderer the broker uses when building commands,
//! so a worker can resolve `{{ ... }}` expressions in task fields it
//! received unrendered (e.g. inside a `task_sequence` pipeline step).

use std::collections::HashMap;

use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::template::TemplateRenderer;

#[derive(Debug, Clone, Deserialize)]
pub struct RenderRequest {
    /// Template value: a string, or a nested object/array of strings.
    pub template: serde_json::Value,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderResponse {
    pub rendered: serde_json::Value,
}

/// `POST /context/render`
pub async fn render(Json(request): Json<RenderRequest>) -> AppResult<Json<RenderResponse>> {
    let renderer = TemplateRenderer::new();
    let rendered = renderer.render_value(&request.template, &request.context)?;
    Ok(Json(RenderResponse { rendered }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_render_simple_template() {
        let mut context = HashMap::new();
        context.insert("name".to_string(), serde_json::json!("world"));

        let response = render(Json(RenderRequest {
            template: serde_json::json!("hello {{ name }}"),
            context,
        }))
        .await
        .unwrap();

        assert_eq!(response.0.rendered, serde_json::json!("hello world"));
    }

    #[tokio::test]
    async fn test_render_nested_object() {
        let mut context = HashMap::new();
        context.insert("host".to_string(), serde_json::json!("example.com"));

        let response = render(Json(RenderRequest {
            template: serde_json::json!({"url": "https://{{ host }}/api"}),
            context,
        }))
        .await
        .unwrap();

        assert_eq!(
            response.0.rendered.get("url").and_then(|v| v.as_str()),
            Some("https://example.com/api")
        );
    }
}
