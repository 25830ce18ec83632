//! Record pipeline and plugins
//!
//! A [`Plugin`] is a named installer that registers ordered
//! [`PipelineStep`]s and base bindings on a [`PipelineContext`]. Every
//! record that passes the level gate runs through the steps in
//! registration order before it is dispatched; a step may rewrite the
//! draft or drop it.

use super::log_context::{merge_missing, FieldValue, Fields};
use super::log_record::RecordDraft;
use super::redact::redact_in_place;
use super::sampling::{LogSampler, SamplingConfig};
use std::fmt;
use std::sync::Arc;

/// What happens to a draft after a step ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// Discard the record; later steps and sinks never see it
    Drop,
}

type StepFn = dyn Fn(&mut RecordDraft) -> StepOutcome + Send + Sync;

/// One named transformation of a record under construction
#[derive(Clone)]
pub struct PipelineStep {
    name: String,
    run: Arc<StepFn>,
}

impl PipelineStep {
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&mut RecordDraft) -> StepOutcome + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            run: Arc::new(run),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, draft: &mut RecordDraft) -> StepOutcome {
        (self.run)(draft)
    }
}

impl fmt::Debug for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineStep")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registration surface handed to each plugin's installer
#[derive(Debug, Default)]
pub struct PipelineContext {
    steps: Vec<PipelineStep>,
    bindings: Fields,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step; steps run in registration order
    pub fn add_step<F>(&mut self, name: impl Into<String>, run: F)
    where
        F: Fn(&mut RecordDraft) -> StepOutcome + Send + Sync + 'static,
    {
        self.steps.push(PipelineStep::new(name, run));
    }

    /// Add a binding merged into every record of the logger
    pub fn bind<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.bindings.insert(key.into(), value.into());
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn bindings(&self) -> &Fields {
        &self.bindings
    }

    pub(crate) fn into_parts(self) -> (Pipeline, Fields) {
        (
            Pipeline {
                steps: self.steps.into(),
            },
            self.bindings,
        )
    }
}

/// A named extension installed when the logger is built
///
/// # Example
///
/// ```
/// use rust_log_dispatch::prelude::*;
///
/// let tag_env = Plugin::new("env", |ctx| {
///     ctx.bind("env", "staging");
///     ctx.add_step("drop-healthchecks", |draft| {
///         if draft.message.starts_with("GET /health") {
///             StepOutcome::Drop
///         } else {
///             StepOutcome::Continue
///         }
///     });
/// });
///
/// let logger = Logger::builder().plugin(tag_env).build().unwrap();
/// logger.info("GET /health 200");
/// ```
pub struct Plugin {
    name: String,
    install: Box<dyn FnOnce(&mut PipelineContext) + Send>,
}

impl Plugin {
    pub fn new<F>(name: impl Into<String>, install: F) -> Self
    where
        F: FnOnce(&mut PipelineContext) + Send + 'static,
    {
        Self {
            name: name.into(),
            install: Box::new(install),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn install(self, context: &mut PipelineContext) {
        (self.install)(context);
    }

    /// Mask the values at `paths` (see [`redact`](crate::core::redact))
    pub fn redact<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        Self::new("redact", move |ctx| {
            ctx.add_step("redact", move |draft| {
                redact_in_place(&mut draft.fields, &paths);
                StepOutcome::Continue
            });
        })
    }

    /// Keep a random share of records; see [`SamplingConfig`]
    pub fn sampling(config: SamplingConfig) -> Self {
        Self::sampler(Arc::new(LogSampler::new(config)))
    }

    /// Sampling through a shared sampler, so its metrics stay observable
    pub fn sampler(sampler: Arc<LogSampler>) -> Self {
        Self::new("sampling", move |ctx| {
            ctx.add_step("sampling", move |draft| {
                if sampler.should_sample_fields(draft.level(), &draft.fields) {
                    StepOutcome::Continue
                } else {
                    StepOutcome::Drop
                }
            });
        })
    }

    /// Add static fields to every record; call-site fields take precedence
    pub fn enrich(fields: Fields) -> Self {
        Self::new("enrich", move |ctx| {
            ctx.add_step("enrich", move |draft| {
                merge_missing(&mut draft.fields, &fields);
                StepOutcome::Continue
            });
        })
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Frozen, shareable list of steps
#[derive(Debug, Clone)]
pub(crate) struct Pipeline {
    steps: Arc<[PipelineStep]>,
}

impl Pipeline {
    /// Run every step; `Drop` short-circuits
    pub(crate) fn run(&self, draft: &mut RecordDraft) -> StepOutcome {
        for step in self.steps.iter() {
            if step.apply(draft) == StepOutcome::Drop {
                return StepOutcome::Drop;
            }
        }
        StepOutcome::Continue
    }

    pub(crate) fn len(&self) -> usize {
        self.steps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;

    fn build(plugins: Vec<Plugin>) -> (Pipeline, Fields) {
        let mut ctx = PipelineContext::new();
        for plugin in plugins {
            plugin.install(&mut ctx);
        }
        ctx.into_parts()
    }

    #[test]
    fn test_steps_run_in_order() {
        let (pipeline, _) = build(vec![
            Plugin::new("first", |ctx| {
                ctx.add_step("append-a", |draft| {
                    draft.message.push('a');
                    StepOutcome::Continue
                });
            }),
            Plugin::new("second", |ctx| {
                ctx.add_step("append-b", |draft| {
                    draft.message.push('b');
                    StepOutcome::Continue
                });
            }),
        ]);

        let mut draft = RecordDraft::new(LogLevel::Info, "");
        assert_eq!(pipeline.run(&mut draft), StepOutcome::Continue);
        assert_eq!(draft.message, "ab");
        assert_eq!(pipeline.len(), 2);
    }

    #[test]
    fn test_drop_short_circuits() {
        let (pipeline, _) = build(vec![
            Plugin::sampling(SamplingConfig::new(0.0)),
            Plugin::new("marker", |ctx| {
                ctx.add_step("never", |_| panic!("ran after a drop"));
            }),
        ]);

        let mut debug = RecordDraft::new(LogLevel::Debug, "noise");
        assert_eq!(pipeline.run(&mut debug), StepOutcome::Drop);

        // error is always sampled, so the next step does run
        let mut error = RecordDraft::new(LogLevel::Error, "kept");
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pipeline.run(&mut error)
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_redact_and_enrich() {
        let mut static_fields = Fields::new();
        static_fields.insert("service".into(), "checkout".into());
        static_fields.insert("token".into(), "from-enrich".into());

        let (pipeline, bindings) = build(vec![
            Plugin::enrich(static_fields),
            Plugin::redact(["token"]),
            Plugin::new("bindings", |ctx| ctx.bind("region", "eu-west-1")),
        ]);

        let mut draft = RecordDraft::new(LogLevel::Info, "paid").with_field("token", "secret");
        pipeline.run(&mut draft);

        assert_eq!(draft.fields["token"], FieldValue::from("[REDACTED]"));
        assert_eq!(draft.fields["service"], FieldValue::from("checkout"));
        assert_eq!(bindings["region"], FieldValue::from("eu-west-1"));
    }
}
