use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::cli::ExtractArgs;
use crate::model::{ExtractedDocument, ExtractionManifest, SkippedDocument};
use crate::record::{Record, SheetBlock};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

const MANIFEST_VERSION: u32 = 1;
const MANIFEST_FILE: &str = "extraction_manifest.json";

mod cells;
mod rules;
mod run;

pub use run::run;

use cells::*;
use rules::*;
