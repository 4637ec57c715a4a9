//! Domain generation stage: description in, validated PDDL domain out.

use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use serde_json::json;

use super::StageSummary;
use crate::Result;
use crate::config::{ApiType, LlmSettings};
use crate::correction::{CorrectionLoop, DomainFeedback, LoopConfig};
use crate::dataset::{self, Item};
use crate::extract::PddlExtractor;
use crate::llm;
use crate::pddl::CommandParser;
use crate::pool::WorkerPool;
use crate::prompt;
use crate::validate::DomainValidator;

pub struct DomainStage {
    pub data_path: PathBuf,
    pub output_path: PathBuf,
    pub prompt_file: PathBuf,
    pub api_type: ApiType,
    pub api_keys_file: PathBuf,
    pub parser_cmd: String,
    pub llm: LlmSettings,
    pub max_correction: usize,
    pub workers: usize,
    pub scratch_dir: Option<PathBuf>,
}

impl DomainStage {
    /// Run the stage. Items whose correction budget runs out are dropped
    /// from the output; items that pass carry the domain, the correction
    /// trace, and the spend.
    pub async fn run(&self) -> Result<StageSummary> {
        let items = dataset::load_items(&self.data_path)?;
        let total = items.len();
        let template = Arc::new(prompt::read_template(&self.prompt_file)?);

        let backend = llm::build_backend(self.api_type, &self.api_keys_file, &self.llm)?;
        let parser = Arc::new(CommandParser::new(&self.parser_cmd).timeout_ms(self.llm.timeout_ms));
        let looped = Arc::new(CorrectionLoop::new(
            backend,
            Arc::new(DomainValidator::new(parser)),
            PddlExtractor,
            Box::new(DomainFeedback),
            LoopConfig::new(&self.llm.model)
                .max_correction(self.max_correction)
                .max_tokens(self.llm.max_tokens),
        ));

        let mut pool = WorkerPool::new(self.workers);
        if let Some(dir) = &self.scratch_dir {
            pool = pool.with_scratch_dir(dir);
        }

        let outcomes = pool
            .run_batch(items, move |mut item: Item, scratch| {
                let looped = Arc::clone(&looped);
                let template = Arc::clone(&template);
                async move {
                    let description = dataset::require_str(&item, "description")?.to_string();
                    let seed = prompt::fill(&template, &[("Description", &description)]);
                    let report = looped.run(&seed, &scratch).await?;

                    // Seed prompts from earlier stages are not worth keeping
                    // once the domain exists.
                    item.remove("prompt");
                    item.insert("correct_trace".to_string(), serde_json::to_value(&report.trace)?);
                    item.insert("time".to_string(), json!(report.time));
                    item.insert("token".to_string(), json!(report.token));
                    match report.artifact {
                        Some(domain) => {
                            let name = crate::extract::fence::domain_name(&domain)
                                .unwrap_or_else(|| "<unnamed>".to_string());
                            info!("domain {name} passed after {} round(s)", report.trace.len());
                            item.insert("domain".to_string(), json!(domain));
                            Ok(Some(item))
                        }
                        None => Ok(None),
                    }
                }
            })
            .await;

        let mut result = Vec::new();
        for outcome in outcomes {
            match outcome {
                crate::pool::TaskOutcome::Completed(Some(item)) => result.push(item),
                crate::pool::TaskOutcome::Completed(None) => {
                    info!("domain dropped: correction budget exhausted");
                }
                crate::pool::TaskOutcome::Failed(reason) => {
                    warn!("domain task failed: {reason}");
                }
            }
        }

        dataset::save_items(&self.output_path, &result)?;
        Ok(StageSummary::new(total, result.len()))
    }
}
