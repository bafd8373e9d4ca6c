//! Document discovery shared by `evaluate` and `compare`.
//!
//! Every non-hidden sub-directory of the ground-truth root is one document. Its record is a
//! `*.json` file in that directory (metadata sidecars excluded); the prediction lives at
//! `<predictions>/<document>/predicted_fields.json`.

use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, info};

use crate::record::Record;

pub const PREDICTION_FILE: &str = "predicted_fields.json";
const META_SUFFIX: &str = "_meta.json";

/// Year-first patterns are tried before month-first ones; compact forms last.
static FILENAME_DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(\d{4})[-_](\d{2})[-_](\d{2})",
        r"(\d{2})[-_](\d{2})[-_](\d{4})",
        r"(\d{4})(\d{2})(\d{2})",
        r"(\d{2})(\d{2})(\d{4})",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("valid filename date regex"))
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPaths {
    pub document_id: String,
    pub ground_truth: Option<PathBuf>,
    pub prediction: Option<PathBuf>,
}

impl DocumentPaths {
    /// Both sides exist on disk.
    pub fn is_paired(&self) -> bool {
        self.ground_truth.is_some() && self.prediction.is_some()
    }

    pub fn skip_reason(&self) -> Option<&'static str> {
        match (&self.ground_truth, &self.prediction) {
            (None, _) => Some("no ground truth json"),
            (_, None) => Some("no prediction json"),
            _ => None,
        }
    }
}

/// Lists documents under `ground_truth_root`, sorted by document id.
pub fn discover_documents(
    ground_truth_root: &Path,
    predictions_root: &Path,
) -> Result<Vec<DocumentPaths>> {
    if !ground_truth_root.is_dir() {
        bail!(
            "ground truth directory does not exist: {}",
            ground_truth_root.display()
        );
    }

    let mut folders = Vec::new();
    let entries = fs::read_dir(ground_truth_root)
        .with_context(|| format!("failed to read {}", ground_truth_root.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| {
            format!("failed to read entry in {}", ground_truth_root.display())
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let is_dir = entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", entry.path().display()))?
            .is_dir();
        if is_dir {
            folders.push((name, entry.path()));
        }
    }
    folders.sort();

    let mut documents = Vec::with_capacity(folders.len());
    for (document_id, folder) in folders {
        let ground_truth = select_ground_truth(&folder)?;
        let prediction_path = predictions_root.join(&document_id).join(PREDICTION_FILE);
        let prediction = prediction_path.is_file().then_some(prediction_path);
        documents.push(DocumentPaths {
            document_id,
            ground_truth,
            prediction,
        });
    }

    info!(
        ground_truth = %ground_truth_root.display(),
        predictions = %predictions_root.display(),
        documents = documents.len(),
        "discovered documents"
    );
    Ok(documents)
}

/// Picks the record file of one document folder: latest filename date, then newest mtime,
/// then file name.
pub fn select_ground_truth(folder: &Path) -> Result<Option<PathBuf>> {
    let mut candidates = Vec::new();
    let entries =
        fs::read_dir(folder).with_context(|| format!("failed to read {}", folder.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", folder.display()))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_record = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            && !name.ends_with(META_SUFFIX);
        if !is_record || !path.is_file() {
            continue;
        }

        let modified = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        candidates.push((date_in_filename(&name), modified, name, path));
    }

    candidates.sort_by(|left, right| {
        Reverse(&left.0)
            .cmp(&Reverse(&right.0))
            .then_with(|| right.1.cmp(&left.1))
            .then_with(|| left.2.cmp(&right.2))
    });

    if candidates.len() > 1 {
        debug!(
            folder = %folder.display(),
            candidates = candidates.len(),
            selected = %candidates[0].2,
            "several ground truth files; picked most recent"
        );
    }
    Ok(candidates.into_iter().next().map(|candidate| candidate.3))
}

/// First calendar date embedded in a file name, if any.
pub fn date_in_filename(name: &str) -> Option<NaiveDate> {
    FILENAME_DATE_PATTERNS.iter().find_map(|pattern| {
        pattern.captures_iter(name).find_map(|captures| {
            let first = &captures[1];
            let (year, month, day) = if first.len() == 4 {
                (first, &captures[2], &captures[3])
            } else {
                (&captures[3], first, &captures[2])
            };
            NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
        })
    })
}

/// Reads and validates one record file.
pub fn load_record(path: &Path) -> Result<Record> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Record::from_json_slice(&raw).with_context(|| format!("invalid record json: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::NaiveDate;

    use super::{PREDICTION_FILE, date_in_filename, discover_documents, select_ground_truth};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn filename_dates_follow_common_layouts() {
        assert_eq!(date_in_filename("lease_2024-03-15.json"), Some(date(2024, 3, 15)));
        assert_eq!(date_in_filename("lease_2024_03_15.json"), Some(date(2024, 3, 15)));
        assert_eq!(date_in_filename("abstract 03-15-2024.json"), Some(date(2024, 3, 15)));
        assert_eq!(date_in_filename("abstract_20240315.json"), Some(date(2024, 3, 15)));
        assert_eq!(date_in_filename("abstract_03152024.json"), Some(date(2024, 3, 15)));
        assert_eq!(date_in_filename("abstract.json"), None);
        assert_eq!(date_in_filename("abstract_2024-13-45.json"), None);
    }

    #[test]
    fn latest_dated_file_wins_and_meta_files_are_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in [
            "abstract_2023-01-10.json",
            "abstract_2024-06-01.json",
            "abstract_2025-01-01_meta.json",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "{}").expect("write fixture");
        }

        let selected = select_ground_truth(dir.path())
            .expect("selection should succeed")
            .expect("a record should be selected");
        assert_eq!(
            selected.file_name().and_then(|name| name.to_str()),
            Some("abstract_2024-06-01.json")
        );
    }

    #[test]
    fn documents_pair_ground_truth_with_predictions() {
        let root = tempfile::tempdir().expect("tempdir");
        let gt = root.path().join("gt");
        let pred = root.path().join("pred");
        for document in ["lease-a", "lease-b", "lease-c", ".hidden"] {
            fs::create_dir_all(gt.join(document)).expect("create gt folder");
        }
        fs::write(gt.join("lease-a").join("abstract.json"), "{}").expect("write gt");
        fs::write(gt.join("lease-b").join("abstract.json"), "{}").expect("write gt");
        fs::create_dir_all(pred.join("lease-a")).expect("create pred folder");
        fs::write(pred.join("lease-a").join(PREDICTION_FILE), "{}").expect("write pred");
        fs::create_dir_all(pred.join("lease-c")).expect("create pred folder");
        fs::write(pred.join("lease-c").join(PREDICTION_FILE), "{}").expect("write pred");

        let documents = discover_documents(&gt, &pred).expect("discovery should succeed");
        let ids = documents
            .iter()
            .map(|document| document.document_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["lease-a", "lease-b", "lease-c"]);

        assert!(documents[0].is_paired());
        assert_eq!(documents[1].skip_reason(), Some("no prediction json"));
        assert_eq!(documents[2].skip_reason(), Some("no ground truth json"));
    }

    #[test]
    fn missing_ground_truth_root_is_fatal() {
        let root = tempfile::tempdir().expect("tempdir");
        let missing = root.path().join("nope");
        assert!(discover_documents(&missing, root.path()).is_err());
    }
}
