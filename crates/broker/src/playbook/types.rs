//! Playbook AST (canonical format).
//!
//! - `step.when` is the step's enable guard.
//! - `next[].when` is conditional routing, exclusive selection with an
//!   optional `else` fallback arm.
//! - `loop.spec.mode` controls iterator fan-out (`sequential` |
//!   `parallel` | `chunked`).
//! - `tool` is either a single task or a labeled pipeline
//!   (`- label: {kind: ...}` entries executed in order).
//! - No `case`/`when`/`then` blocks — rejected by the parser.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tool kinds dispatched by the worker runtime. A representative,
/// non-exhaustive set: the dispatch contract (kind -> pure function)
/// is the thing under specification, not a connector matrix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Http,
    Postgres,
    Duckdb,
    Snowflake,
    Python,
    Shell,
    Container,
    Playbook,
    Noop,
    Save,
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ToolKind::Http => "http",
            ToolKind::Postgres => "postgres",
            ToolKind::Duckdb => "duckdb",
            ToolKind::Snowflake => "snowflake",
            ToolKind::Python => "python",
            ToolKind::Shell => "shell",
            ToolKind::Container => "container",
            ToolKind::Playbook => "playbook",
            ToolKind::Noop => "noop",
            ToolKind::Save => "save",
        };
        write!(f, "{}", s)
    }
}

/// Tool specification. All execution-specific fields live under `tool`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub kind: ToolKind,

    #[serde(default)]
    pub auth: Option<serde_json::Value>,

    #[serde(default)]
    pub args: Option<serde_json::Value>,

    /// Inline code (python tool).
    #[serde(default)]
    pub code: Option<String>,

    /// Request URL (http tool).
    #[serde(default)]
    pub url: Option<String>,

    /// HTTP method (http tool).
    #[serde(default)]
    pub method: Option<String>,

    /// SQL text (postgres/duckdb/snowflake tools).
    #[serde(default)]
    pub query: Option<String>,

    /// Connection string or credential reference.
    #[serde(default)]
    pub connection: Option<String>,

    /// Sub-playbook path (playbook tool).
    #[serde(default)]
    pub path: Option<String>,

    /// Step in the child playbook whose result becomes this step's
    /// result (playbook tool); defaults to the child's `end` step.
    #[serde(default)]
    pub return_step: Option<String>,

    /// Per-task flow-control evaluated against the task's own result,
    /// independent of the step-level `next` routing.
    #[serde(default)]
    pub eval: Option<Vec<EvalEntry>>,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A single flow-control condition evaluated after a task runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvalEntry {
    Condition(EvalCondition),
    Else { r#else: EvalAction },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCondition {
    #[serde(default)]
    pub expr: Option<String>,
    pub action: String,
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalAction {
    pub action: String,
    #[serde(default)]
    pub target: Option<String>,
}

/// A step's tool definition: a single task or a labeled pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolDefinition {
    Single(ToolSpec),
    Pipeline(Vec<HashMap<String, ToolSpec>>),
}

/// Iterator fan-out mode.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    #[default]
    Sequential,
    Parallel,
    Chunked,
}

/// Nested iterator execution parameters.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoopSpec {
    #[serde(default)]
    pub mode: LoopMode,

    /// Concurrency cap for `parallel` mode; bucket size for `chunked`.
    #[serde(default)]
    pub max_in_flight: Option<usize>,

    /// Failure policy: `fail_fast` (default) cancels outstanding items
    /// on the first failure; `collect_errors` runs every item to
    /// completion and aggregates partial failures.
    #[serde(default)]
    pub on_error: Option<String>,
}

/// Step-level loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loop {
    /// Jinja expression for the collection to iterate over.
    #[serde(rename = "in")]
    pub in_expr: String,

    /// Variable name bound to each item.
    pub iterator: String,

    #[serde(default)]
    pub spec: LoopSpec,
}

/// Retry policy attached to a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    #[serde(default = "default_initial_delay")]
    pub initial_delay: f64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay: f64,
    /// Must evaluate truthy for a retryable error to actually retry.
    #[serde(default)]
    pub retry_when: Option<String>,
    /// Evaluating truthy forces a terminal failure even under max_attempts.
    #[serde(default)]
    pub stop_when: Option<String>,
}

fn default_max_attempts() -> i32 {
    1
}
fn default_initial_delay() -> f64 {
    1.0
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_max_delay() -> f64 {
    60.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay: default_max_delay(),
            retry_when: None,
            stop_when: None,
        }
    }
}

/// A single conditional/unconditional successor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextTarget {
    pub step: String,

    /// Guard expression; absent means unconditional.
    #[serde(default)]
    pub when: Option<String>,

    /// Marks the fallback arm taken when no other guard matched.
    #[serde(default)]
    pub r#else: bool,

    /// Overlay merged into the successor's context (overlay > step data).
    #[serde(default)]
    pub data: Option<HashMap<String, serde_json::Value>>,
}

/// A single routing arc in a `next.arcs` router block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arc {
    pub step: String,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub data: Option<HashMap<String, serde_json::Value>>,
}

/// Router form of `next`: an explicit `arcs` list, each independently
/// guarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSpec {
    pub arcs: Vec<Arc>,
}

/// `next` is a list of targets (unconditional and/or guarded, evaluated
/// in list order; every matching guard is taken; falls back to any
/// `else` target if none match).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NextSpec {
    Single(String),
    List(Vec<String>),
    Router(RouterSpec),
    Targets(Vec<NextTarget>),
}

/// Workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Unique step id. `start` and `end` are reserved.
    pub step: String,

    #[serde(default)]
    pub desc: Option<String>,

    /// Enable guard; the step is skipped (no `step_started`) when this
    /// evaluates falsy. Absent means always enabled.
    #[serde(default)]
    pub when: Option<String>,

    #[serde(default)]
    pub data: Option<HashMap<String, serde_json::Value>>,

    #[serde(default)]
    pub r#loop: Option<Loop>,

    pub tool: ToolDefinition,

    #[serde(default)]
    pub retry: Option<RetryPolicy>,

    #[serde(default)]
    pub next: Option<NextSpec>,
}

impl Step {
    /// Resolve the retry policy, defaulting to a single attempt (no retry).
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default()
    }
}

/// Reusable task definition in a workbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkbookTask {
    pub name: String,
    pub tool: ToolSpec,
}

/// Playbook metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
}

/// Complete workflow definition (canonical v2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playbook {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub workload: Option<serde_json::Value>,
    #[serde(default)]
    pub workbook: Option<Vec<WorkbookTask>>,
    pub workflow: Vec<Step>,
}

impl Playbook {
    pub fn has_start_step(&self) -> bool {
        self.workflow.iter().any(|s| s.step == "start")
    }

    pub fn get_step(&self, name: &str) -> Option<&Step> {
        self.workflow.iter().find(|s| s.step == name)
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.workflow.iter().map(|s| s.step.as_str()).collect()
    }

    pub fn path(&self) -> Option<&str> {
        self.metadata.path.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_playbook() {
        let yaml = r#"
apiVersion: noetl.io/v2
kind: Playbook
metadata:
  name: test_playbook
  path: test/simple
workflow:
  - step: start
    tool:
      kind: python
      code: "result = {\"status\": \"ok\"}"
    next:
      - step: end
  - step: end
    tool:
      kind: noop
"#;
        let playbook: Playbook = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(playbook.api_version, "noetl.io/v2");
        assert!(playbook.has_start_step());
        assert_eq!(playbook.workflow.len(), 2);
    }

    #[test]
    fn test_parse_pipeline_tool() {
        let yaml = r#"
apiVersion: noetl.io/v2
kind: Playbook
metadata:
  name: test
workflow:
  - step: start
    tool:
      - fetch:
          kind: http
          url: "https://api.example.com"
          method: GET
      - transform:
          kind: python
          code: "result = {}"
"#;
        let playbook: Playbook = serde_yaml::from_str(yaml).unwrap();
        let step = playbook.get_step("start").unwrap();
        assert!(matches!(step.tool, ToolDefinition::Pipeline(_)));
    }

    #[test]
    fn test_parse_loop_spec() {
        let yaml = r#"
apiVersion: noetl.io/v2
kind: Playbook
metadata:
  name: test
workflow:
  - step: start
    loop:
      in: "{{ workload.items }}"
      iterator: item
      spec:
        mode: parallel
        max_in_flight: 5
    tool:
      kind: noop
"#;
        let playbook: Playbook = serde_yaml::from_str(yaml).unwrap();
        let step = playbook.get_step("start").unwrap();
        let loop_config = step.r#loop.as_ref().unwrap();
        assert_eq!(loop_config.spec.mode, LoopMode::Parallel);
        assert_eq!(loop_config.spec.max_in_flight, Some(5));
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_next_targets_with_else() {
        let yaml = r#"
apiVersion: noetl.io/v2
kind: Playbook
metadata:
  name: test
workflow:
  - step: decide
    tool:
      kind: noop
    next:
      - step: hot
        when: "{{ t >= 25 }}"
      - step: cold
        else: true
  - step: hot
    tool:
      kind: noop
  - step: cold
    tool:
      kind: noop
"#;
        let playbook: Playbook = serde_yaml::from_str(yaml).unwrap();
        let step = playbook.get_step("decide").unwrap();
        match step.next.as_ref().unwrap() {
            NextSpec::Targets(targets) => {
                assert_eq!(targets.len(), 2);
                assert!(targets[1].r#else);
            }
            _ => panic!("expected Targets"),
        }
    }
}
