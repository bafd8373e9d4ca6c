use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{ExactMatcher, Matcher, MatcherKind, parse_params, row_similarity};
use crate::alignment::{
    self, Alignment, AlignmentOptions, AlignmentStrategy, DEFAULT_MAX_ALIGNMENT_CELLS,
};
use crate::record::{Row, Scalar};

const WORST_COLUMNS_SHOWN: usize = 8;
const FAILING_COLUMN_SCORE: f64 = 0.8;

/// Columns without a configured matcher compare exactly.
static UNCONFIGURED_COLUMN: Matcher = Matcher::Exact(ExactMatcher {});

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableParams {
    #[serde(default)]
    columns: BTreeMap<String, ColumnParams>,
    #[serde(default)]
    min_pair_score: f64,
    #[serde(default)]
    strategy: AlignmentStrategy,
    #[serde(default = "default_max_cells")]
    max_alignment_cells: usize,
}

fn default_max_cells() -> usize {
    DEFAULT_MAX_ALIGNMENT_CELLS
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ColumnParams {
    matcher: String,
    #[serde(default)]
    params: Value,
}

/// Scores repeating structures: rows are aligned first, then cells are scored column by column.
#[derive(Debug, Clone, Default)]
pub struct TableMatcher {
    columns: BTreeMap<String, Matcher>,
    options: AlignmentOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableScore {
    pub score: f64,
    pub alignment: Alignment,
    /// Mean cell score per column over the matched pairs.
    pub column_scores: BTreeMap<String, f64>,
    pub gold_rows: usize,
    pub predicted_rows: usize,
    pub detail: String,
}

impl TableMatcher {
    pub fn from_params(params: &Value) -> Result<Self, String> {
        let params: TableParams = parse_params(params)?;
        if !(0.0..=1.0).contains(&params.min_pair_score) {
            return Err(format!(
                "min_pair_score must be within [0, 1], got {}",
                params.min_pair_score
            ));
        }
        if params.max_alignment_cells == 0 {
            return Err("max_alignment_cells must be positive".to_string());
        }

        let mut columns = BTreeMap::new();
        for (column, spec) in params.columns {
            let kind = MatcherKind::from_name(&spec.matcher)
                .ok_or_else(|| format!("column `{column}`: unknown matcher `{}`", spec.matcher))?;
            if kind == MatcherKind::Table {
                return Err(format!("column `{column}`: tables cannot nest"));
            }
            let matcher = Matcher::build(kind, &spec.params)
                .map_err(|reason| format!("column `{column}`: {reason}"))?;
            columns.insert(column, matcher);
        }

        Ok(Self {
            columns,
            options: AlignmentOptions {
                min_pair_score: params.min_pair_score,
                strategy: params.strategy,
                max_cells: params.max_alignment_cells,
            },
        })
    }

    fn matcher_for(&self, column: &str) -> &Matcher {
        self.columns.get(column).unwrap_or(&UNCONFIGURED_COLUMN)
    }

    fn row_weight(&self, gold: &Row, predicted: &Row) -> f64 {
        row_similarity(gold, predicted, |column| self.matcher_for(column))
    }

    /// Aligns the row sets and averages pair weights, unmatched rows scoring 0.0.
    pub fn score_rows(&self, gold: &[Row], predicted: &[Row]) -> TableScore {
        let aligned = alignment::align(
            gold.len(),
            predicted.len(),
            |g, p| self.row_weight(&gold[g], &predicted[p]),
            &self.options,
        );

        match aligned {
            Ok(aligned) => {
                let column_scores = self.column_scores(gold, predicted, &aligned);
                let score = aligned.score();
                let detail = describe(gold.len(), predicted.len(), &aligned, &column_scores);
                TableScore {
                    score,
                    alignment: aligned,
                    column_scores,
                    gold_rows: gold.len(),
                    predicted_rows: predicted.len(),
                    detail,
                }
            }
            Err(overflow) => {
                warn!(
                    gold_rows = overflow.gold_rows,
                    predicted_rows = overflow.predicted_rows,
                    limit = overflow.limit,
                    "table alignment overflow; scoring as mismatch"
                );
                TableScore {
                    score: 0.0,
                    alignment: Alignment::default(),
                    column_scores: BTreeMap::new(),
                    gold_rows: gold.len(),
                    predicted_rows: predicted.len(),
                    detail: overflow.to_string(),
                }
            }
        }
    }

    fn column_scores(
        &self,
        gold: &[Row],
        predicted: &[Row],
        aligned: &Alignment,
    ) -> BTreeMap<String, f64> {
        let mut sums = BTreeMap::<String, (f64, usize)>::new();
        for pair in &aligned.pairs {
            let gold_row = &gold[pair.gold];
            let predicted_row = &predicted[pair.predicted];
            let columns = gold_row
                .keys()
                .chain(predicted_row.keys())
                .collect::<BTreeSet<_>>();
            for column in columns {
                let gold_value = gold_row.get(column).unwrap_or(&Scalar::Null);
                let predicted_value = predicted_row.get(column).unwrap_or(&Scalar::Null);
                let score = self
                    .matcher_for(column)
                    .score_scalars(gold_value, predicted_value)
                    .score;
                let entry = sums.entry(column.clone()).or_insert((0.0, 0));
                entry.0 += score;
                entry.1 += 1;
            }
        }

        sums.into_iter()
            .map(|(column, (total, count))| (column, total / count as f64))
            .collect()
    }
}

fn describe(
    gold_rows: usize,
    predicted_rows: usize,
    aligned: &Alignment,
    column_scores: &BTreeMap<String, f64>,
) -> String {
    let mut lines = vec![format!(
        "records: {gold_rows} expected, {predicted_rows} extracted, {} matched",
        aligned.pairs.len()
    )];

    if !aligned.unmatched_gold.is_empty() {
        lines.push(format!(
            "unmatched ground-truth rows (missing): {}",
            aligned.unmatched_gold.len()
        ));
    }
    if !aligned.unmatched_predicted.is_empty() {
        lines.push(format!(
            "unmatched predicted rows (hallucinated): {}",
            aligned.unmatched_predicted.len()
        ));
    }

    let mut failing = column_scores
        .iter()
        .filter(|(_, score)| **score < FAILING_COLUMN_SCORE)
        .collect::<Vec<_>>();
    failing.sort_by(|left, right| left.1.total_cmp(right.1).then(left.0.cmp(right.0)));
    if !failing.is_empty() {
        let shown = failing
            .iter()
            .take(WORST_COLUMNS_SHOWN)
            .map(|(column, score)| format!("{column} {score:.2}"))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!(
            "failing columns ({}/{}): {shown}",
            failing.len(),
            column_scores.len()
        ));
    }

    lines.join("; ")
}
