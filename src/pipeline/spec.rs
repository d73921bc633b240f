//! Declarative description of a card-generation pipeline.
//!
//! A [`PipelineSpec`] is an ordered list of [`StepSpec`]s plus a mapping
//! from step names to editor field indices.  Each step names the prompt
//! template it runs and binds that template's placeholders to either the
//! source expression or an earlier step's output.  Validation happens at
//! construction, so a spec that exists is a spec that can run.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// Source of a placeholder value inside a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// The expression the pipeline was started with.
    Expression,
    /// The cleaned output of the named earlier step.
    StepOutput(String),
}

// ---------------------------------------------------------------------------
// StepSpec
// ---------------------------------------------------------------------------

/// One step: a template to run and where its placeholder values come from.
#[derive(Debug, Clone)]
pub struct StepSpec {
    pub name: String,
    pub template_id: String,
    /// Placeholder name paired with the binding that fills it.  Ambient
    /// variables (target language, context tags) are supplied by the runner
    /// and do not appear here.
    pub inputs: Vec<(String, Binding)>,
}

impl StepSpec {
    pub fn new(
        name: impl Into<String>,
        template_id: impl Into<String>,
        inputs: Vec<(String, Binding)>,
    ) -> Self {
        Self {
            name: name.into(),
            template_id: template_id.into(),
            inputs,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineSpecError
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineSpecError {
    #[error("duplicate step name '{0}'")]
    DuplicateStep(String),

    /// A binding may only reference a step defined before it, which rules
    /// out cycles by construction.
    #[error("step '{step}' reads output of '{dependency}', which is not an earlier step")]
    UnknownDependency { step: String, dependency: String },

    #[error("field {index} is assigned to unknown step '{step}'")]
    UnknownMappedStep { step: String, index: usize },
}

// ---------------------------------------------------------------------------
// PipelineSpec
// ---------------------------------------------------------------------------

/// Validated pipeline description.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    steps: Vec<StepSpec>,
    field_assignment: Vec<(String, usize)>,
}

impl PipelineSpec {
    /// Validate and build a spec.
    ///
    /// `field_assignment` maps step names to editor field indices; steps
    /// without an entry run for their dependents but never write a field.
    pub fn new(
        steps: Vec<StepSpec>,
        field_assignment: Vec<(String, usize)>,
    ) -> Result<Self, PipelineSpecError> {
        let mut seen: Vec<&str> = Vec::with_capacity(steps.len());
        for step in &steps {
            if seen.contains(&step.name.as_str()) {
                return Err(PipelineSpecError::DuplicateStep(step.name.clone()));
            }
            for (_, binding) in &step.inputs {
                if let Binding::StepOutput(dep) = binding {
                    if !seen.contains(&dep.as_str()) {
                        return Err(PipelineSpecError::UnknownDependency {
                            step: step.name.clone(),
                            dependency: dep.clone(),
                        });
                    }
                }
            }
            seen.push(&step.name);
        }

        for (name, index) in &field_assignment {
            if !steps.iter().any(|s| &s.name == name) {
                return Err(PipelineSpecError::UnknownMappedStep {
                    step: name.clone(),
                    index: *index,
                });
            }
        }

        Ok(Self {
            steps,
            field_assignment,
        })
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    /// The editor field index the named step writes, if mapped.
    pub fn field_index(&self, step: &str) -> Option<usize> {
        self.field_assignment
            .iter()
            .find(|(name, _)| name == step)
            .map(|(_, index)| *index)
    }

    /// Names of steps that write an editor field.
    pub fn mapped_steps(&self) -> impl Iterator<Item = &str> {
        self.field_assignment.iter().map(|(name, _)| name.as_str())
    }

    /// The standard card pipeline: a word-stack analysis step feeding
    /// definition, example-sentence and translation steps, written to
    /// fields 1 through 4.
    pub fn card_default() -> Self {
        let steps = vec![
            StepSpec::new(
                "word-stack",
                "word_stack",
                vec![("expression".into(), Binding::Expression)],
            ),
            StepSpec::new(
                "definition",
                "word_stack_description",
                vec![(
                    "word_stack_json".into(),
                    Binding::StepOutput("word-stack".into()),
                )],
            ),
            StepSpec::new(
                "examples",
                "word_stack_examples",
                vec![(
                    "word_stack_json".into(),
                    Binding::StepOutput("word-stack".into()),
                )],
            ),
            StepSpec::new(
                "translation",
                "word_stack_translation",
                vec![(
                    "word_stack_json".into(),
                    Binding::StepOutput("word-stack".into()),
                )],
            ),
        ];
        let assignment = vec![
            ("word-stack".into(), 1),
            ("definition".into(), 2),
            ("examples".into(), 3),
            ("translation".into(), 4),
        ];
        Self::new(steps, assignment).expect("default card pipeline is valid")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_card_pipeline_validates() {
        let spec = PipelineSpec::card_default();
        assert_eq!(spec.steps().len(), 4);
        assert_eq!(spec.field_index("word-stack"), Some(1));
        assert_eq!(spec.field_index("translation"), Some(4));
        assert_eq!(spec.mapped_steps().count(), 4);
    }

    #[test]
    fn duplicate_step_names_are_rejected() {
        let steps = vec![
            StepSpec::new("a", "word_stack", vec![]),
            StepSpec::new("a", "word_stack", vec![]),
        ];
        let err = PipelineSpec::new(steps, vec![]).unwrap_err();
        assert_eq!(err, PipelineSpecError::DuplicateStep("a".into()));
    }

    #[test]
    fn forward_references_are_rejected() {
        // "a" reads "b" which is defined after it.
        let steps = vec![
            StepSpec::new(
                "a",
                "word_stack_description",
                vec![("word_stack_json".into(), Binding::StepOutput("b".into()))],
            ),
            StepSpec::new("b", "word_stack", vec![]),
        ];
        let err = PipelineSpec::new(steps, vec![]).unwrap_err();
        assert_eq!(
            err,
            PipelineSpecError::UnknownDependency {
                step: "a".into(),
                dependency: "b".into(),
            }
        );
    }

    #[test]
    fn self_reference_is_rejected() {
        let steps = vec![StepSpec::new(
            "a",
            "word_stack",
            vec![("word_stack_json".into(), Binding::StepOutput("a".into()))],
        )];
        assert!(matches!(
            PipelineSpec::new(steps, vec![]),
            Err(PipelineSpecError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn assignment_must_reference_existing_steps() {
        let steps = vec![StepSpec::new("a", "word_stack", vec![])];
        let err = PipelineSpec::new(steps, vec![("ghost".into(), 2)]).unwrap_err();
        assert_eq!(
            err,
            PipelineSpecError::UnknownMappedStep {
                step: "ghost".into(),
                index: 2,
            }
        );
    }

    #[test]
    fn unmapped_steps_are_allowed() {
        let steps = vec![
            StepSpec::new("hidden", "word_stack", vec![]),
            StepSpec::new(
                "shown",
                "word_stack_description",
                vec![(
                    "word_stack_json".into(),
                    Binding::StepOutput("hidden".into()),
                )],
            ),
        ];
        let spec = PipelineSpec::new(steps, vec![("shown".into(), 1)]).unwrap();
        assert_eq!(spec.field_index("hidden"), None);
        assert_eq!(spec.field_index("shown"), Some(1));
    }
}
