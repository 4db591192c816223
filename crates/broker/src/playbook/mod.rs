//! NoETL Playbook DSL v2.
//!
//! This module provides playbook parsing and validation:
//! - Type definitions for playbook structure
//! - YAML parsing
//! - Validation

pub mod parser;
pub mod types;

pub use parser::{extract_kind, extract_metadata, parse_playbook, validate_playbook};
pub use types::{
    Arc, EvalAction, EvalCondition, EvalEntry, Loop, LoopMode, LoopSpec, Metadata, NextSpec,
    NextTarget, Playbook, RetryPolicy, RouterSpec, Step, ToolDefinition, ToolKind, ToolSpec,
    WorkbookTask,
};
