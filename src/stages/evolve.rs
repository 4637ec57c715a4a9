//! Description evolution stage: seed descriptions plus instruction contexts
//! in, evolved task descriptions out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use log::warn;
use rand::seq::SliceRandom;
use serde_json::{Value, json};

use super::StageSummary;
use crate::Result;
use crate::config::{ApiType, LlmSettings};
use crate::dataset::{self, Item};
use crate::error::ForgeError;
use crate::llm::{self, GenerateRequest};
use crate::pool::{TaskOutcome, WorkerPool};
use crate::prompt;

pub struct EvolveStage {
    pub data_path: PathBuf,
    pub context_path: PathBuf,
    pub output_path: PathBuf,
    pub prompt_file: PathBuf,
    pub api_type: ApiType,
    pub api_keys_file: PathBuf,
    pub llm: LlmSettings,
    pub example_num: usize,
    pub workers: usize,
    pub verbose: bool,
}

impl EvolveStage {
    /// Run the stage: one generation per context, each seeded with randomly
    /// sampled example descriptions. Contexts whose generation fails are
    /// dropped from the output.
    pub async fn run(&self) -> Result<StageSummary> {
        let data = dataset::load_items(&self.data_path)?;
        let contexts = dataset::load_items(&self.context_path)?;
        let total = contexts.len();
        let template = prompt::read_template(&self.prompt_file)?;

        let descriptions: Vec<String> = data
            .iter()
            .map(|item| dataset::require_str(item, "description").map(str::to_string))
            .collect::<Result<_>>()?;
        if descriptions.len() < self.example_num {
            return Err(ForgeError::Config(format!(
                "need {} example description(s) but the dataset has {}",
                self.example_num,
                descriptions.len()
            )));
        }

        // Sampling happens up front so the tasks themselves stay Send.
        let seeded: Vec<(Item, String)> = {
            let mut rng = rand::thread_rng();
            contexts
                .into_iter()
                .map(|context| {
                    let examples: Vec<&String> = descriptions
                        .choose_multiple(&mut rng, self.example_num)
                        .collect();
                    let instruction = dataset::require_str(&context, "instruction")?.to_string();
                    let seed = seed_text(&examples);
                    let filled = prompt::fill(
                        &template,
                        &[("Context", &instruction), ("SEED", &seed)],
                    );
                    Ok((context, filled))
                })
                .collect::<Result<_>>()?
        };

        let backend = llm::build_backend(self.api_type, &self.api_keys_file, &self.llm)?;
        let model = Arc::new(self.llm.model.clone());
        let max_tokens = self.llm.max_tokens;
        let verbose = self.verbose;

        let pool = WorkerPool::new(self.workers);
        let outcomes = pool
            .run_batch(seeded, move |(context, filled), _scratch| {
                let backend = Arc::clone(&backend);
                let model = Arc::clone(&model);
                async move {
                    let start = Instant::now();
                    let req = GenerateRequest::new(&filled, model.as_str()).max_tokens(max_tokens);
                    let generation = backend.generate(&req).await?;
                    let description = generation
                        .first()
                        .ok_or_else(|| {
                            ForgeError::Llm(crate::llm::LlmError::InvalidResponse(
                                "backend returned no candidates".to_string(),
                            ))
                        })?
                        .to_string();

                    let mut item = Item::new();
                    item.insert("description".to_string(), json!(description));
                    item.insert("time".to_string(), json!(start.elapsed().as_secs_f64()));
                    item.insert("token".to_string(), json!(generation.usage.total));
                    item.insert("evol_from".to_string(), Value::Object(context));
                    if verbose {
                        item.insert("prompt".to_string(), json!(filled));
                    }
                    Ok(item)
                }
            })
            .await;

        let mut result = Vec::new();
        for outcome in outcomes {
            match outcome {
                TaskOutcome::Completed(item) => result.push(item),
                TaskOutcome::Failed(reason) => warn!("evolution dropped: {reason}"),
            }
        }

        dataset::save_items(&self.output_path, &result)?;
        Ok(StageSummary::new(total, result.len()))
    }
}

/// Single example verbatim; several examples numbered `##ExampleN##`.
fn seed_text(examples: &[&String]) -> String {
    if examples.len() == 1 {
        return examples[0].clone();
    }
    examples
        .iter()
        .enumerate()
        .map(|(idx, example)| format!("##Example{}##\n{}", idx + 1, example))
        .collect::<Vec<_>>()
        .join("\n\n")
}
