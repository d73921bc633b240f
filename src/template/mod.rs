//! Prompt templates: registry, option precedence and resolution.
//!
//! This module provides:
//! * [`TemplateRegistry`] / [`PromptTemplate`] — configured prompts loaded
//!   from `templates.json` (or the built-in set).
//! * [`CallOverrides`] / [`CallOptions`] — sparse overrides and their
//!   deterministic call > template > global merge.
//! * [`TemplateResolver`] — binds a template against live variables into a
//!   [`BoundRequest`].
//! * [`TemplateError`] — unknown-template / missing-variable failures.

pub mod options;
pub mod registry;
pub mod resolver;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use options::{CallOptions, CallOverrides};
pub use registry::{ExampleTurn, PromptTemplate, RequestKind, TemplateRegistry};
pub use resolver::{BoundRequest, TemplateError, TemplateResolver};
