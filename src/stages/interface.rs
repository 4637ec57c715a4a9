//! NL-interface generation stage.
//!
//! Every input item survives to the output: an item whose interface could
//! not be produced keeps its place with an empty mapping, so the dataset
//! stays aligned with the domain stage's output.

use std::path::PathBuf;
use std::sync::Arc;

use log::warn;
use serde_json::json;

use super::StageSummary;
use crate::Result;
use crate::config::{ApiType, LlmSettings};
use crate::correction::{CorrectionLoop, InterfaceFeedback, LoopConfig};
use crate::dataset::{self, Item};
use crate::extract::MappingExtractor;
use crate::llm::{self, LlmBackend};
use crate::pddl::{CommandParser, DomainParser};
use crate::pool::{TaskOutcome, WorkerPool};
use crate::prompt::PromptLoader;
use crate::scratch::ScratchHandle;
use crate::validate::InterfaceValidator;

const TEMPLATE_NAME: &str = "nl_interface_generation_trimmed";

pub struct InterfaceStage {
    pub data_path: PathBuf,
    pub output_path: PathBuf,
    pub prompt_dir: PathBuf,
    pub api_type: ApiType,
    pub api_keys_file: PathBuf,
    pub parser_cmd: String,
    pub llm: LlmSettings,
    pub max_correction: usize,
    pub workers: usize,
    pub scratch_dir: Option<PathBuf>,
}

impl InterfaceStage {
    pub async fn run(&self) -> Result<StageSummary> {
        let items = dataset::load_items(&self.data_path)?;
        let total = items.len();
        let template = Arc::new(PromptLoader::new(&self.prompt_dir).load(TEMPLATE_NAME)?);

        let backend = llm::build_backend(self.api_type, &self.api_keys_file, &self.llm)?;
        let parser: Arc<dyn DomainParser> =
            Arc::new(CommandParser::new(&self.parser_cmd).timeout_ms(self.llm.timeout_ms));
        let config = LoopConfig::new(&self.llm.model)
            .max_correction(self.max_correction)
            .max_tokens(self.llm.max_tokens);

        let mut pool = WorkerPool::new(self.workers);
        if let Some(dir) = &self.scratch_dir {
            pool = pool.with_scratch_dir(dir);
        }

        let outcomes = pool
            .run_batch(items, move |item: Item, scratch| {
                let backend = Arc::clone(&backend);
                let parser = Arc::clone(&parser);
                let template = Arc::clone(&template);
                let config = config.clone();
                async move {
                    Ok(annotate(item, scratch, backend, parser, &template, config).await)
                }
            })
            .await;

        let mut result = Vec::new();
        let mut succeeded = 0usize;
        for outcome in outcomes {
            match outcome {
                TaskOutcome::Completed(item) => {
                    let empty = item
                        .get("nl_interface")
                        .and_then(|v| v.as_object())
                        .is_none_or(|m| m.is_empty());
                    if !empty {
                        succeeded += 1;
                    }
                    result.push(item);
                }
                TaskOutcome::Failed(reason) => {
                    warn!("interface task aborted, item lost: {reason}");
                }
            }
        }

        dataset::save_items(&self.output_path, &result)?;
        Ok(StageSummary::new(total, succeeded))
    }
}

/// Annotate one item. Infallible by construction: any failure, backend
/// included, degrades to an empty interface on the retained item.
async fn annotate(
    mut item: Item,
    scratch: ScratchHandle,
    backend: Arc<dyn LlmBackend>,
    parser: Arc<dyn DomainParser>,
    template: &str,
    config: LoopConfig,
) -> Item {
    let seeded = match seed_prompt(&item, template) {
        Ok(seeded) => seeded,
        Err(e) => {
            warn!("interface skipped: {e}");
            item.insert("nl_interface".to_string(), json!({}));
            item.insert("nl_interface_debug".to_string(), json!([]));
            return item;
        }
    };
    let domain = item
        .get("domain")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let looped = CorrectionLoop::new(
        backend,
        Arc::new(InterfaceValidator::new(parser, domain)),
        MappingExtractor,
        Box::new(InterfaceFeedback),
        config,
    );

    match looped.run(&seeded, &scratch).await {
        Ok(report) => {
            let mapping = report.artifact.unwrap_or_default();
            item.insert("nl_interface".to_string(), json!(mapping));
            item.insert(
                "nl_interface_debug".to_string(),
                serde_json::to_value(&report.trace).unwrap_or_else(|_| json!([])),
            );
            item.insert("time".to_string(), json!(report.time));
            item.insert("token".to_string(), json!(report.token));
        }
        Err(e) => {
            warn!("interface generation failed: {e}");
            item.insert("nl_interface".to_string(), json!({}));
            item.insert("nl_interface_debug".to_string(), json!([]));
        }
    }
    item
}

fn seed_prompt(item: &Item, template: &str) -> Result<String> {
    let domain = dataset::require_str(item, "domain")?;
    let description = dataset::require_str(item, "description")?;
    Ok(crate::prompt::fill(
        template,
        &[("PDDL_Domain", domain), ("PDDL_Description", description)],
    ))
}
