//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - evolve: grow new task descriptions from seeds and contexts
//! - domain: generate validated PDDL domains from descriptions
//! - interface: generate natural language interfaces for domains
//! - problems: generate problem files for each domain

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use planforge::config::ApiType;

/// Planforge - closed-loop synthesis of planning-agent training data
#[derive(Parser, Debug)]
#[command(name = "planforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Arguments shared by every stage
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// File with one API key per line
    #[arg(long, default_value = "key.txt")]
    pub api_keys_file: PathBuf,

    /// Backend family to call
    #[arg(long, value_enum, default_value = "openai")]
    pub api_type: ApiType,

    /// Model name, overrides the config file
    #[arg(long)]
    pub model: Option<String>,

    /// Concurrent workers, overrides the config file
    #[arg(long)]
    pub workers: Option<usize>,

    /// Input dataset (JSON array)
    #[arg(long)]
    pub data_path: PathBuf,

    /// Output dataset (JSON array)
    #[arg(long)]
    pub output_path: PathBuf,
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evolve new task descriptions from seed descriptions and contexts
    Evolve {
        #[command(flatten)]
        common: CommonArgs,

        /// JSON array of contexts, each with an "instruction" field
        #[arg(long)]
        context_path: PathBuf,

        /// Evolution prompt template
        #[arg(long, default_value = "prompt/desc_evol")]
        prompt_file: PathBuf,

        /// Seed descriptions sampled into each prompt
        #[arg(long, default_value_t = 1)]
        example_num: usize,
    },

    /// Generate a validated PDDL domain for each description
    Domain {
        #[command(flatten)]
        common: CommonArgs,

        /// Domain generation prompt template
        #[arg(long, default_value = "prompt/domain_generation")]
        prompt_file: PathBuf,

        /// Correction rounds after the initial generation
        #[arg(long)]
        max_correction: Option<usize>,

        /// External grammar parser command
        #[arg(long)]
        parser_cmd: Option<String>,
    },

    /// Generate a natural language interface for each domain
    Interface {
        #[command(flatten)]
        common: CommonArgs,

        /// Directory holding the prompt templates
        #[arg(long, default_value = "prompt")]
        prompt_dir: PathBuf,

        /// Correction rounds after the initial generation
        #[arg(long)]
        max_correction: Option<usize>,

        /// External grammar parser command
        #[arg(long)]
        parser_cmd: Option<String>,
    },

    /// Generate problem files for each domain
    Problems {
        #[command(flatten)]
        common: CommonArgs,

        /// Directory holding the prompt templates
        #[arg(long, default_value = "prompt")]
        prompt_dir: PathBuf,

        /// Zero-shot problems per domain, also the evolution count
        #[arg(long, default_value_t = 5)]
        prob_num: usize,
    },
}
