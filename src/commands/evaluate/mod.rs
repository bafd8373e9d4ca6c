use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::cli::EvaluateArgs;
use crate::commands::corpus::{DocumentPaths, discover_documents, load_record};
use crate::config::FieldsConfig;
use crate::evaluation::{
    EvaluationAccumulator, EvaluationSummary, evaluate_document, render_summary,
};
use crate::model::{EvaluationPaths, EvaluationRunManifest, SkippedDocument};
use crate::util::{
    now_utc_string, sha256_file, utc_compact_string, write_json_pretty, write_text,
};

const MANIFEST_VERSION: u32 = 1;

mod report;
mod run;
#[cfg(test)]
mod tests;

pub use run::run;

use report::*;
