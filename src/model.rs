use serde::{Deserialize, Serialize};

use crate::evaluation::EvaluationSummary;

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationPaths {
    pub ground_truth: String,
    pub predictions: String,
    pub config: String,
    pub report_csv: String,
    pub summary: String,
    pub manifest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedDocument {
    pub document_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub completed_at: String,
    pub command: String,
    pub config_sha256: String,
    pub fields_configured: usize,
    pub documents_discovered: usize,
    pub paths: EvaluationPaths,
    pub skipped: Vec<SkippedDocument>,
    pub summary: EvaluationSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub source: String,
    pub source_sha256: String,
    pub output: String,
    pub sheets: usize,
    pub static_fields: usize,
    pub tables: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub input_directory: String,
    pub mapping: String,
    pub mapping_sha256: String,
    pub document_count: usize,
    pub documents: Vec<ExtractedDocument>,
    pub failures: Vec<SkippedDocument>,
}
