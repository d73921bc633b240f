//! Sequential pipeline execution with skip propagation.
//!
//! Steps run in spec order.  A step whose dependency did not succeed is
//! marked [`StepStatus::Skipped`] without resolving or dispatching anything;
//! a step whose own call fails is [`StepStatus::Failed`].  Either way the
//! remaining independent steps still run, so a single provider hiccup
//! degrades one field instead of the whole card.

use std::collections::{BTreeMap, HashMap};

use crate::dispatch::{DispatchError, Dispatcher, Reply};
use crate::template::{CallOverrides, TemplateResolver};

use super::scrub::{strip_code_fence, Scrubber};
use super::spec::{Binding, PipelineSpec, StepSpec};

// ---------------------------------------------------------------------------
// Step and run outcomes
// ---------------------------------------------------------------------------

/// Terminal state of one executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Success,
    Failed,
    /// Not attempted: a dependency did not succeed.
    Skipped,
}

/// What happened to one step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub name: String,
    pub status: StepStatus,
    /// Cleaned output text; present only on success.
    pub output: Option<String>,
    /// Failure or skip reason, for logging and UI display.
    pub error: Option<String>,
}

/// Aggregate outcome over the field-mapped steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every mapped step succeeded.
    Success,
    /// At least one mapped step succeeded.
    Partial,
    /// No mapped step succeeded.
    Failed,
}

/// Field index to cleaned output text, for every mapped step that succeeded.
pub type FieldMap = BTreeMap<usize, String>;

/// Complete record of one pipeline execution.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub expression: String,
    pub steps: Vec<StepResult>,
    pub fields: FieldMap,
    pub status: RunStatus,
}

// ---------------------------------------------------------------------------
// PipelineRunner
// ---------------------------------------------------------------------------

/// Executes a [`PipelineSpec`] against the resolver and dispatcher.
pub struct PipelineRunner<'a> {
    resolver: &'a TemplateResolver,
    dispatcher: &'a Dispatcher,
    /// Variables available to every step (target language, context tags).
    ambient: HashMap<String, String>,
    scrubber: Scrubber,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(
        resolver: &'a TemplateResolver,
        dispatcher: &'a Dispatcher,
        ambient: HashMap<String, String>,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            ambient,
            scrubber: Scrubber::new(),
        }
    }

    /// Run every step of `spec` for `expression`.
    ///
    /// Never returns an error: per-step failures are recorded in the run and
    /// reflected in the aggregate [`RunStatus`].  Re-running with the same
    /// inputs and provider replies produces the same field map.
    pub async fn run(&self, spec: &PipelineSpec, expression: &str) -> PipelineRun {
        let mut outputs: HashMap<String, String> = HashMap::new();
        let mut results: Vec<StepResult> = Vec::with_capacity(spec.steps().len());

        for step in spec.steps() {
            let result = self.run_step(step, expression, &outputs).await;
            if let (StepStatus::Success, Some(output)) = (result.status, &result.output) {
                outputs.insert(step.name.clone(), output.clone());
            }
            match result.status {
                StepStatus::Success => log::info!("step '{}' succeeded", step.name),
                StepStatus::Failed => log::warn!(
                    "step '{}' failed: {}",
                    step.name,
                    result.error.as_deref().unwrap_or("unknown")
                ),
                StepStatus::Skipped => log::info!(
                    "step '{}' skipped: {}",
                    step.name,
                    result.error.as_deref().unwrap_or("dependency missing")
                ),
            }
            results.push(result);
        }

        let mut fields = FieldMap::new();
        for name in spec.mapped_steps() {
            if let Some(output) = outputs.get(name) {
                if let Some(index) = spec.field_index(name) {
                    fields.insert(index, output.clone());
                }
            }
        }

        let status = aggregate_status(spec, &results);
        PipelineRun {
            expression: expression.to_string(),
            steps: results,
            fields,
            status,
        }
    }

    async fn run_step(
        &self,
        step: &StepSpec,
        expression: &str,
        outputs: &HashMap<String, String>,
    ) -> StepResult {
        let mut vars = self.ambient.clone();
        for (placeholder, binding) in &step.inputs {
            match binding {
                Binding::Expression => {
                    vars.insert(placeholder.clone(), expression.to_string());
                }
                Binding::StepOutput(dep) => match outputs.get(dep) {
                    Some(output) => {
                        vars.insert(placeholder.clone(), output.clone());
                    }
                    None => {
                        return StepResult {
                            name: step.name.clone(),
                            status: StepStatus::Skipped,
                            output: None,
                            error: Some(format!("dependency '{dep}' did not succeed")),
                        };
                    }
                },
            }
        }

        let request = match self
            .resolver
            .resolve(&step.template_id, &vars, &CallOverrides::default())
        {
            Ok(request) => request,
            Err(e) => {
                return StepResult {
                    name: step.name.clone(),
                    status: StepStatus::Failed,
                    output: None,
                    error: Some(e.to_string()),
                };
            }
        };

        match self.dispatcher.dispatch(&request).await {
            Ok(Reply::Text(text)) => {
                let cleaned = self.scrubber.scrub(&strip_code_fence(&text));
                if cleaned.is_empty() {
                    return StepResult {
                        name: step.name.clone(),
                        status: StepStatus::Failed,
                        output: None,
                        error: Some(DispatchError::EmptyReply.to_string()),
                    };
                }
                StepResult {
                    name: step.name.clone(),
                    status: StepStatus::Success,
                    output: Some(cleaned),
                    error: None,
                }
            }
            Ok(Reply::Audio(_)) => StepResult {
                name: step.name.clone(),
                status: StepStatus::Failed,
                output: None,
                error: Some("step template produced audio, expected text".into()),
            },
            Err(e) => StepResult {
                name: step.name.clone(),
                status: StepStatus::Failed,
                output: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Aggregate over field-mapped steps only; helper steps never count.
/// A spec with no mapped steps aggregates to `Success`.
fn aggregate_status(spec: &PipelineSpec, results: &[StepResult]) -> RunStatus {
    let mut mapped = 0usize;
    let mut succeeded = 0usize;
    for name in spec.mapped_steps() {
        mapped += 1;
        if results
            .iter()
            .any(|r| r.name == name && r.status == StepStatus::Success)
        {
            succeeded += 1;
        }
    }

    if succeeded == mapped {
        RunStatus::Success
    } else if succeeded > 0 {
        RunStatus::Partial
    } else {
        RunStatus::Failed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::config::{LlmConfig, TtsConfig};
    use crate::dispatch::{ChatTransport, SpeechTransport, WireMessage};
    use crate::template::{CallOptions, TemplateRegistry, TemplateResolver};

    const STACK_JSON: &str =
        "{\"substantiv\": \"en huske < husken\", \"verb\": \"å huske < husker\"}";

    /// Routes on a marker in the last user message; each route either
    /// replies with fixed text or fails with the configured error.
    struct RoutedChat {
        routes: Vec<(&'static str, Result<String, DispatchError>)>,
        calls: AtomicUsize,
    }

    impl RoutedChat {
        fn new(routes: Vec<(&'static str, Result<String, DispatchError>)>) -> Arc<Self> {
            Arc::new(Self {
                routes,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChatTransport for RoutedChat {
        async fn complete(
            &self,
            messages: &[WireMessage],
            _options: &CallOptions,
        ) -> Result<String, DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
            for (marker, reply) in &self.routes {
                if last.contains(marker) {
                    return reply.clone();
                }
            }
            Err(DispatchError::Provider {
                code: 400,
                detail: format!("no route for: {last}"),
                transient: false,
            })
        }
    }

    struct NoSpeech;

    #[async_trait]
    impl SpeechTransport for NoSpeech {
        async fn synthesize(&self, _: &str, _: &str) -> Result<Vec<u8>, DispatchError> {
            Err(DispatchError::EmptyReply)
        }
    }

    fn resolver() -> TemplateResolver {
        TemplateResolver::new(
            TemplateRegistry::builtin(),
            LlmConfig::default(),
            TtsConfig::default(),
        )
    }

    fn dispatcher(chat: Arc<dyn ChatTransport>) -> Dispatcher {
        Dispatcher::new(chat, Arc::new(NoSpeech))
            .with_retry_policy(1, Duration::from_millis(1))
    }

    fn ambient() -> HashMap<String, String> {
        [
            ("target_language".to_string(), "English".to_string()),
            ("context_tags".to_string(), "travel, work".to_string()),
        ]
        .into()
    }

    fn all_ok() -> Vec<(&'static str, Result<String, DispatchError>)> {
        vec![
            ("Analyser ordet", Ok(STACK_JSON.to_string())),
            ("Forklar kjernebegrepet", Ok("🔸 Å huske betyr å minnes.".to_string())),
            ("Lag eksempelsetninger", Ok("Jeg husker deg.".to_string())),
            ("Oversett til", Ok("{\"verb\": \"to remember\"}".to_string())),
        ]
    }

    #[tokio::test]
    async fn full_card_run_populates_all_fields() {
        let chat = RoutedChat::new(all_ok());
        let d = dispatcher(chat.clone());
        let r = resolver();
        let runner = PipelineRunner::new(&r, &d, ambient());

        let run = runner.run(&PipelineSpec::card_default(), "huske").await;

        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.fields.len(), 4);
        assert_eq!(run.fields[&1], STACK_JSON);
        assert!(run.fields[&2].contains("minnes"));
        assert_eq!(run.fields[&3], "Jeg husker deg.");
        assert!(run.fields[&4].contains("to remember"));
        // One call per step.
        assert_eq!(chat.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn failed_translation_yields_partial_run() {
        let mut routes = all_ok();
        routes.retain(|(marker, _)| *marker != "Oversett til");
        routes.push((
            "Oversett til",
            Err(DispatchError::Network("connection reset".into())),
        ));
        let d = dispatcher(RoutedChat::new(routes));
        let r = resolver();
        let runner = PipelineRunner::new(&r, &d, ambient());

        let run = runner.run(&PipelineSpec::card_default(), "huske").await;

        assert_eq!(run.status, RunStatus::Partial);
        assert!(run.fields.contains_key(&1));
        assert!(run.fields.contains_key(&2));
        assert!(run.fields.contains_key(&3));
        assert!(!run.fields.contains_key(&4));

        let translation = run.steps.iter().find(|s| s.name == "translation").unwrap();
        assert_eq!(translation.status, StepStatus::Failed);
        assert!(translation.error.as_deref().unwrap().contains("network"));
    }

    #[tokio::test]
    async fn failed_root_step_skips_all_dependents() {
        let routes = vec![(
            "Analyser ordet",
            Err(DispatchError::Provider {
                code: 500,
                detail: "overloaded".into(),
                transient: true,
            }),
        )];
        let chat = RoutedChat::new(routes);
        let d = dispatcher(chat.clone());
        let r = resolver();
        let runner = PipelineRunner::new(&r, &d, ambient());

        let run = runner.run(&PipelineSpec::card_default(), "huske").await;

        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.fields.is_empty());
        assert_eq!(run.steps[0].status, StepStatus::Failed);
        for step in &run.steps[1..] {
            assert_eq!(step.status, StepStatus::Skipped);
            assert!(step.error.as_deref().unwrap().contains("word-stack"));
        }
        // Skipped steps never reach the transport.
        assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn independent_steps_survive_a_sibling_failure() {
        // a → b, with c independent; a fails, b skips, c still runs.
        let steps = vec![
            StepSpec::new(
                "a",
                "word_stack",
                vec![("expression".into(), Binding::Expression)],
            ),
            StepSpec::new(
                "b",
                "word_stack_description",
                vec![("word_stack_json".into(), Binding::StepOutput("a".into()))],
            ),
            StepSpec::new(
                "c",
                "examples",
                vec![("expression".into(), Binding::Expression)],
            ),
        ];
        let spec = PipelineSpec::new(
            steps,
            vec![("a".into(), 1), ("b".into(), 2), ("c".into(), 3)],
        )
        .unwrap();

        let routes = vec![
            (
                "Analyser ordet",
                Err(DispatchError::Network("reset".into())),
            ),
            ("Expression:", Ok("Jeg husker deg. (I remember you.)".to_string())),
        ];
        let d = dispatcher(RoutedChat::new(routes));
        let r = resolver();
        let mut ambient = ambient();
        ambient.insert("user_lang".into(), "English".into());
        let runner = PipelineRunner::new(&r, &d, ambient);

        let run = runner.run(&spec, "huske").await;

        assert_eq!(run.status, RunStatus::Partial);
        assert!(!run.fields.contains_key(&1));
        assert!(!run.fields.contains_key(&2));
        assert_eq!(run.fields[&3], "Jeg husker deg. (I remember you.)");
    }

    #[tokio::test]
    async fn fenced_output_is_unwrapped_before_reuse() {
        let mut routes = all_ok();
        routes.retain(|(marker, _)| *marker != "Analyser ordet");
        routes.push((
            "Analyser ordet",
            Ok(format!("```json\n{STACK_JSON}\n```")),
        ));
        let d = dispatcher(RoutedChat::new(routes));
        let r = resolver();
        let runner = PipelineRunner::new(&r, &d, ambient());

        let run = runner.run(&PipelineSpec::card_default(), "huske").await;

        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.fields[&1], STACK_JSON);
    }

    #[tokio::test]
    async fn unmapped_helper_steps_do_not_affect_status() {
        let steps = vec![StepSpec::new(
            "helper",
            "word_stack",
            vec![("expression".into(), Binding::Expression)],
        )];
        let spec = PipelineSpec::new(steps, vec![]).unwrap();
        let d = dispatcher(RoutedChat::new(vec![(
            "Analyser ordet",
            Err(DispatchError::Auth),
        )]));
        let r = resolver();
        let runner = PipelineRunner::new(&r, &d, ambient());

        let run = runner.run(&spec, "huske").await;
        // No mapped steps: vacuously successful, fields empty.
        assert_eq!(run.status, RunStatus::Success);
        assert!(run.fields.is_empty());
    }
}
