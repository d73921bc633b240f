//! Multi-step card generation.
//!
//! * [`PipelineSpec`] — validated step list plus field assignment.
//! * [`PipelineRunner`] — sequential execution with skip propagation.
//! * [`Scrubber`] / [`strip_code_fence`] — reply cleanup between steps.

pub mod runner;
pub mod scrub;
pub mod spec;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{FieldMap, PipelineRun, PipelineRunner, RunStatus, StepResult, StepStatus};
pub use scrub::{strip_code_fence, Scrubber};
pub use spec::{Binding, PipelineSpec, PipelineSpecError, StepSpec};
