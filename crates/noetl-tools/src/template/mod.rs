//! Template engine module.
//!
//! Provides Jinja2-compatible template rendering using minijinja.

mod engine;

pub use engine::TemplateEngine;
