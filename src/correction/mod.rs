//! The closed correction loop: generate, validate, feed the diagnostic back.
//!
//! One run makes at most `max_correction + 1` generation calls and records at
//! most `max_correction` correction rounds. An artifact that passes on the
//! first try produces an empty trace; a run that exhausts its rounds is a
//! normal outcome with no artifact, not an error. Backend failures propagate.

pub mod prompt;

pub use prompt::{DomainFeedback, FeedbackRenderer, InterfaceFeedback};

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::extract::Extractor;
use crate::llm::{GenerateRequest, LlmBackend, LlmError};
use crate::scratch::ScratchHandle;
use crate::validate::{ArtifactValidator, ValidationResult};

/// Where a loop run currently is; logged for traceability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Generating,
    Validating,
    Succeeded,
    Retrying,
    Exhausted,
}

impl LoopPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopPhase::Generating => "generating",
            LoopPhase::Validating => "validating",
            LoopPhase::Succeeded => "succeeded",
            LoopPhase::Retrying => "retrying",
            LoopPhase::Exhausted => "exhausted",
        }
    }
}

impl std::fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One failed round: what was wrong, what the validator said, and what came
/// back after the feedback prompt. Persisted verbatim into the dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionRecord {
    pub round: usize,
    pub incorrect: String,
    pub error_info: String,
    pub corrected: Option<String>,
    pub gpt_response: String,
    pub prompt: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of one loop run.
#[derive(Debug, Clone)]
pub struct LoopReport<A> {
    /// The validated artifact, or `None` when the rounds ran out
    pub artifact: Option<A>,
    pub trace: Vec<CorrectionRecord>,
    /// Total tokens spent across every generation call
    pub token: u64,
    /// Wall-clock seconds for the whole run
    pub time: f64,
}

impl<A> LoopReport<A> {
    pub fn succeeded(&self) -> bool {
        self.artifact.is_some()
    }
}

/// Knobs for one loop run.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub model: String,
    pub max_correction: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LoopConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_correction: 3,
            temperature: 0.0,
            max_tokens: 2048,
        }
    }

    pub fn max_correction(mut self, max_correction: usize) -> Self {
        self.max_correction = max_correction;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Drives one artifact through generate-validate-correct until it passes or
/// the correction budget runs out.
pub struct CorrectionLoop<E: Extractor> {
    backend: Arc<dyn LlmBackend>,
    validator: Arc<dyn ArtifactValidator<E::Artifact>>,
    extractor: E,
    feedback: Box<dyn FeedbackRenderer>,
    config: LoopConfig,
}

impl<E: Extractor> CorrectionLoop<E> {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        validator: Arc<dyn ArtifactValidator<E::Artifact>>,
        extractor: E,
        feedback: Box<dyn FeedbackRenderer>,
        config: LoopConfig,
    ) -> Self {
        Self {
            backend,
            validator,
            extractor,
            feedback,
            config,
        }
    }

    fn enter(&self, phase: LoopPhase, round: usize) {
        debug!("loop phase {phase}, round {round}");
    }

    async fn generate(&self, prompt: &str, temperature: f32, token: &mut u64) -> Result<String> {
        let req = GenerateRequest::new(prompt, &self.config.model)
            .temperature(temperature)
            .max_tokens(self.config.max_tokens);
        let generation = self.backend.generate(&req).await?;
        *token += generation.usage.total;
        let first = generation
            .first()
            .ok_or_else(|| LlmError::InvalidResponse("backend returned no candidates".to_string()))?;
        Ok(first.to_string())
    }

    /// Run the loop from `seed_prompt`. Returns a report even when the rounds
    /// run out; only backend or I/O failures are `Err`.
    pub async fn run(
        &self,
        seed_prompt: &str,
        scratch: &ScratchHandle,
    ) -> Result<LoopReport<E::Artifact>> {
        let start = Instant::now();
        let mut token = 0u64;
        let mut trace = Vec::new();
        let mut prompt = seed_prompt.to_string();

        self.enter(LoopPhase::Generating, 0);
        let mut response = self.generate(&prompt, self.config.temperature, &mut token).await?;
        let mut extracted = self.extractor.extract(&response);

        let mut round = 0usize;
        loop {
            self.enter(LoopPhase::Validating, round);
            // A response the extractor cannot read fails validation like any
            // other bad artifact; its error text is the diagnostic.
            let verdict = match &extracted {
                Ok(e) => self.validator.check(&e.value, scratch).await?,
                Err(e) => ValidationResult::fail(e.to_string()),
            };

            if verdict.passed {
                self.enter(LoopPhase::Succeeded, round);
                info!("artifact passed after {round} correction round(s)");
                return Ok(LoopReport {
                    artifact: extracted.ok().map(|e| e.value),
                    trace,
                    token,
                    time: start.elapsed().as_secs_f64(),
                });
            }

            if round == self.config.max_correction {
                self.enter(LoopPhase::Exhausted, round);
                info!("correction budget exhausted after {round} round(s)");
                return Ok(LoopReport {
                    artifact: None,
                    trace,
                    token,
                    time: start.elapsed().as_secs_f64(),
                });
            }

            self.enter(LoopPhase::Retrying, round);
            let failed = extracted
                .as_ref()
                .map(|e| e.raw.clone())
                .unwrap_or_default();
            prompt = self
                .feedback
                .extend(&prompt, &trace, &failed, &verdict.diagnostic);

            // Corrections are always deterministic regardless of the seed
            // temperature.
            response = self.generate(&prompt, 0.0, &mut token).await?;
            extracted = self.extractor.extract(&response);

            trace.push(CorrectionRecord {
                round,
                incorrect: failed,
                error_info: verdict.diagnostic,
                corrected: extracted.as_ref().ok().map(|e| e.raw.clone()),
                gpt_response: response.clone(),
                prompt: prompt.clone(),
                timestamp: Utc::now(),
            });
            round += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::fence::PddlExtractor;
    use crate::llm::{Generation, Usage};
    use crate::scratch::WorkerId;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedBackend {
        responses: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<&str>) -> Self {
            let mut responses: Vec<String> = responses.iter().map(|s| s.to_string()).collect();
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn generate(
            &self,
            _req: &GenerateRequest,
        ) -> std::result::Result<Generation, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.responses.lock().unwrap().pop().unwrap_or_default();
            Ok(Generation {
                candidates: vec![next],
                usage: Usage {
                    prompt: 0,
                    completion: 0,
                    total: 7,
                },
            })
        }
    }

    struct AcceptContaining(&'static str);

    #[async_trait]
    impl ArtifactValidator<String> for AcceptContaining {
        async fn check(
            &self,
            artifact: &String,
            _scratch: &ScratchHandle,
        ) -> Result<ValidationResult> {
            if artifact.contains(self.0) {
                Ok(ValidationResult::pass())
            } else {
                Ok(ValidationResult::fail("marker missing"))
            }
        }
    }

    fn make_loop(
        backend: Arc<ScriptedBackend>,
        validator: AcceptContaining,
        max_correction: usize,
    ) -> CorrectionLoop<PddlExtractor> {
        CorrectionLoop::new(
            backend,
            Arc::new(validator),
            PddlExtractor,
            Box::new(DomainFeedback),
            LoopConfig::new("test-model").max_correction(max_correction),
        )
    }

    #[tokio::test]
    async fn test_first_try_success_has_empty_trace() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchHandle::new(dir.path(), WorkerId(0));
        let backend = Arc::new(ScriptedBackend::new(vec![
            "```pddl\n(define (domain good))\n```",
        ]));
        let looped = make_loop(Arc::clone(&backend), AcceptContaining("good"), 3);

        let report = looped.run("seed", &scratch).await.unwrap();
        assert!(report.succeeded());
        assert_eq!(report.artifact.as_deref(), Some("(define (domain good))"));
        assert!(report.trace.is_empty());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.token, 7);
    }

    #[tokio::test]
    async fn test_success_after_one_correction() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchHandle::new(dir.path(), WorkerId(0));
        let backend = Arc::new(ScriptedBackend::new(vec![
            "```pddl\n(define (domain bad))\n```",
            "```pddl\n(define (domain good))\n```",
        ]));
        let looped = make_loop(Arc::clone(&backend), AcceptContaining("good"), 3);

        let report = looped.run("seed", &scratch).await.unwrap();
        assert!(report.succeeded());
        assert_eq!(report.trace.len(), 1);
        let record = &report.trace[0];
        assert_eq!(record.round, 0);
        assert!(record.incorrect.contains("bad"));
        assert_eq!(record.error_info, "marker missing");
        assert!(record.corrected.as_deref().unwrap().contains("good"));
        assert!(record.prompt.contains("marker missing"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.token, 14);
    }

    #[tokio::test]
    async fn test_budget_bounds_calls_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchHandle::new(dir.path(), WorkerId(0));
        let backend = Arc::new(ScriptedBackend::new(vec![
            "```pddl\nbad0\n```",
            "```pddl\nbad1\n```",
            "```pddl\nbad2\n```",
            "```pddl\nbad3\n```",
        ]));
        let looped = make_loop(Arc::clone(&backend), AcceptContaining("never"), 3);

        let report = looped.run("seed", &scratch).await.unwrap();
        assert!(!report.succeeded());
        assert!(report.artifact.is_none());
        assert_eq!(report.trace.len(), 3);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
        for (idx, record) in report.trace.iter().enumerate() {
            assert_eq!(record.round, idx);
        }
    }

    #[tokio::test]
    async fn test_extraction_failure_is_validation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchHandle::new(dir.path(), WorkerId(0));
        let backend = Arc::new(ScriptedBackend::new(vec![
            "no fenced block here",
            "```pddl\n(define (domain good))\n```",
        ]));
        let looped = make_loop(Arc::clone(&backend), AcceptContaining("good"), 3);

        let report = looped.run("seed", &scratch).await.unwrap();
        assert!(report.succeeded());
        assert_eq!(report.trace.len(), 1);
        assert!(report.trace[0].incorrect.is_empty());
        assert!(report.trace[0].error_info.contains("pddl"));
    }

    #[tokio::test]
    async fn test_zero_budget_means_single_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchHandle::new(dir.path(), WorkerId(0));
        let backend = Arc::new(ScriptedBackend::new(vec!["```pddl\nbad\n```"]));
        let looped = make_loop(Arc::clone(&backend), AcceptContaining("never"), 0);

        let report = looped.run("seed", &scratch).await.unwrap();
        assert!(!report.succeeded());
        assert!(report.trace.is_empty());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }
}
