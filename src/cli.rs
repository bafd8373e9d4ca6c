use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::evaluation::DEFAULT_TOP_N;

#[derive(Parser, Debug)]
#[command(
    name = "fieldeval",
    version,
    about = "Field-level evaluation of extracted records against ground truth"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build ground-truth records from workbook cell dumps.
    Extract(ExtractArgs),
    /// Score predictions against ground truth and write the accuracy report.
    Evaluate(EvaluateArgs),
    /// Write one side-by-side comparison CSV per document.
    Compare(CompareArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Directory of workbook cell dumps (`*.json`), searched recursively.
    #[arg(long, default_value = "data/raw")]
    pub input: PathBuf,

    #[arg(long, default_value = "configs/extraction_mapping.json")]
    pub mapping: PathBuf,

    #[arg(long, default_value = "data/interim")]
    pub output: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long, default_value = "data/interim")]
    pub ground_truth: PathBuf,

    #[arg(long)]
    pub predictions: PathBuf,

    #[arg(long, default_value = "configs/fields_config.yaml")]
    pub config: PathBuf,

    #[arg(long, default_value = "results/evaluation.csv")]
    pub output: PathBuf,

    /// Defaults to the report path with a `.txt` extension.
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Defaults to the report path with a `.manifest.json` extension.
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    pub top_n: usize,

    /// Worker threads; all cores when omitted.
    #[arg(long)]
    pub threads: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[arg(long, default_value = "data/interim")]
    pub ground_truth: PathBuf,

    #[arg(long)]
    pub predictions: PathBuf,

    #[arg(long, default_value = "configs/fields_config.yaml")]
    pub config: PathBuf,

    #[arg(long, default_value = "results/comparisons")]
    pub output: PathBuf,

    /// Limit output to these documents.
    #[arg(long = "document")]
    pub documents: Vec<String>,
}
