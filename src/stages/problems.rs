//! Problem generation stage: a validated domain fans out into a set of
//! problem files, first zero-shot, then by evolving the zero-shot seeds.

use std::path::PathBuf;
use std::sync::Arc;

use log::warn;
use rand::seq::SliceRandom;
use serde_json::json;

use super::StageSummary;
use crate::Result;
use crate::config::{ApiType, LlmSettings};
use crate::dataset::{self, Item};
use crate::error::ForgeError;
use crate::extract::fence;
use crate::llm::{self, GenerateRequest, LlmBackend};
use crate::pool::{TaskOutcome, WorkerPool};
use crate::prompt::{self, PromptLoader};

const ZERO_SHOT_TEMPLATE: &str = "problem_generation_zero_shot";
const EVOL_TEMPLATE: &str = "problem_generation_evol";

/// Ways a seed problem can be evolved into a new one.
static EVOLUTION_METHODS: [&str; 9] = [
    // Harder
    "Increase the number of objects",
    "Modify the goal conditions to make it harder",
    // Easier
    "Decrease the number of objects to make it easier",
    "Modify the goal conditions to make it easier",
    // Others
    "Modify the initial state or properties of objects",
    "Change the initial placement or locations of objects",
    "Change the constraints in the problem file",
    "Adjust the object requirements in the initial state",
    "Modify the allowed object combinations or configurations",
];

pub struct ProblemsStage {
    pub data_path: PathBuf,
    pub output_path: PathBuf,
    pub prompt_dir: PathBuf,
    pub api_type: ApiType,
    pub api_keys_file: PathBuf,
    pub llm: LlmSettings,
    pub prob_num: usize,
    pub workers: usize,
}

impl ProblemsStage {
    pub async fn run(&self) -> Result<StageSummary> {
        let items = dataset::load_items(&self.data_path)?;
        let total = items.len();

        let loader = PromptLoader::new(&self.prompt_dir);
        let zero_shot = Arc::new(loader.load(ZERO_SHOT_TEMPLATE)?);
        let evol = Arc::new(loader.load(EVOL_TEMPLATE)?);

        let backend = llm::build_backend(self.api_type, &self.api_keys_file, &self.llm)?;
        let model = Arc::new(self.llm.model.clone());
        let max_tokens = self.llm.max_tokens;
        let prob_num = self.prob_num;

        let pool = WorkerPool::new(self.workers);
        let outcomes = pool
            .run_batch(items, move |mut item: Item, _scratch| {
                let backend = Arc::clone(&backend);
                let model = Arc::clone(&model);
                let zero_shot = Arc::clone(&zero_shot);
                let evol = Arc::clone(&evol);
                async move {
                    let domain = dataset::require_str(&item, "domain")?.to_string();
                    let seeds = zero_shot_problems(
                        &backend, &zero_shot, &domain, &model, max_tokens, prob_num,
                    )
                    .await?;
                    if seeds.is_empty() {
                        return Err(ForgeError::Llm(crate::llm::LlmError::InvalidResponse(
                            "no usable zero-shot problems".to_string(),
                        )));
                    }

                    let mut problems = seeds.clone();
                    for _ in 0..prob_num {
                        // rng stays inside this block so the future is Send
                        let (seed, method) = {
                            let mut rng = rand::thread_rng();
                            let seed = seeds
                                .choose(&mut rng)
                                .expect("seeds checked non-empty")
                                .clone();
                            let method = EVOLUTION_METHODS
                                .choose(&mut rng)
                                .expect("methods list is non-empty");
                            (seed, *method)
                        };
                        match evolve_problem(
                            &backend, &evol, &domain, &seed, method, &model, max_tokens,
                        )
                        .await
                        {
                            Ok(Some(problem)) => {
                                if !problems.contains(&problem) {
                                    problems.push(problem);
                                }
                            }
                            Ok(None) => warn!("evolved problem had no pddl block, skipping"),
                            Err(e) => return Err(e),
                        }
                    }

                    item.insert("problems".to_string(), json!(problems));
                    Ok(item)
                }
            })
            .await;

        let mut result = Vec::new();
        for outcome in outcomes {
            match outcome {
                TaskOutcome::Completed(item) => result.push(item),
                TaskOutcome::Failed(reason) => warn!("problems dropped for one item: {reason}"),
            }
        }

        dataset::save_items(&self.output_path, &result)?;
        Ok(StageSummary::new(total, result.len()))
    }
}

/// Ask for `prob_num` candidates in one call; keep the distinct extractable
/// ones in first-seen order.
async fn zero_shot_problems(
    backend: &Arc<dyn LlmBackend>,
    template: &str,
    domain: &str,
    model: &str,
    max_tokens: u32,
    prob_num: usize,
) -> Result<Vec<String>> {
    let filled = prompt::fill(template, &[("Domain", domain)]);
    let req = GenerateRequest::new(&filled, model)
        .n(prob_num as u32)
        .temperature(0.5)
        .max_tokens(max_tokens);
    let generation = backend.generate(&req).await?;

    let mut seen = std::collections::BTreeSet::new();
    let mut problems = Vec::new();
    for candidate in &generation.candidates {
        match fence::extract_pddl(candidate.trim()) {
            Ok(problem) => {
                if seen.insert(problem.clone()) {
                    problems.push(problem);
                }
            }
            Err(e) => warn!("zero-shot candidate skipped: {e}"),
        }
    }
    Ok(problems)
}

async fn evolve_problem(
    backend: &Arc<dyn LlmBackend>,
    template: &str,
    domain: &str,
    seed: &str,
    method: &str,
    model: &str,
    max_tokens: u32,
) -> Result<Option<String>> {
    let filled = prompt::fill(
        template,
        &[
            ("Domain", domain),
            ("Example_Problem", seed),
            ("Method", method),
        ],
    );
    let req = GenerateRequest::new(&filled, model)
        .temperature(0.5)
        .max_tokens(max_tokens);
    let generation = backend.generate(&req).await?;
    let Some(candidate) = generation.first() else {
        return Ok(None);
    };
    Ok(fence::extract_pddl(candidate.trim()).ok())
}
