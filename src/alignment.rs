//! Row alignment between a ground-truth row set and a predicted row set.
//!
//! The full `|gold| x |predicted|` weight matrix is built once, then solved either exactly
//! (Hungarian assignment) or greedily by descending weight. Pairs whose weight falls below the
//! configured floor are never kept; those rows stay unmatched instead.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::AlignmentOverflow;

/// Upper bound on `|gold| x |predicted|` cells for one alignment.
pub const DEFAULT_MAX_ALIGNMENT_CELLS: usize = 1_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStrategy {
    #[default]
    Optimal,
    Greedy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentOptions {
    pub min_pair_score: f64,
    pub strategy: AlignmentStrategy,
    pub max_cells: usize,
}

impl Default for AlignmentOptions {
    fn default() -> Self {
        Self {
            min_pair_score: 0.0,
            strategy: AlignmentStrategy::Optimal,
            max_cells: DEFAULT_MAX_ALIGNMENT_CELLS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RowPair {
    pub gold: usize,
    pub predicted: usize,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Alignment {
    /// Sorted by ground-truth index.
    pub pairs: Vec<RowPair>,
    pub unmatched_gold: Vec<usize>,
    pub unmatched_predicted: Vec<usize>,
}

impl Alignment {
    /// Mean pair weight where every unmatched row on either side contributes 0.0.
    pub fn score(&self) -> f64 {
        let slots = self.pairs.len() + self.unmatched_gold.len() + self.unmatched_predicted.len();
        if slots == 0 {
            return 1.0;
        }
        let total = self.pairs.iter().map(|pair| pair.weight).sum::<f64>();
        total / slots as f64
    }
}

/// Aligns `gold_len` rows against `predicted_len` rows using `weight(gold, predicted)` in [0, 1].
pub fn align<F>(
    gold_len: usize,
    predicted_len: usize,
    weight: F,
    options: &AlignmentOptions,
) -> Result<Alignment, AlignmentOverflow>
where
    F: Fn(usize, usize) -> f64,
{
    if gold_len.saturating_mul(predicted_len) > options.max_cells {
        return Err(AlignmentOverflow {
            gold_rows: gold_len,
            predicted_rows: predicted_len,
            limit: options.max_cells,
        });
    }

    let floor = options.min_pair_score;
    let matrix = (0..gold_len)
        .map(|g| {
            (0..predicted_len)
                .map(|p| {
                    let value = weight(g, p);
                    if value.is_finite() {
                        value.clamp(0.0, 1.0)
                    } else {
                        0.0
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let assignment = if gold_len == 0 || predicted_len == 0 {
        Vec::new()
    } else {
        match options.strategy {
            AlignmentStrategy::Optimal => optimal_assignment(&matrix, floor),
            AlignmentStrategy::Greedy => greedy_assignment(&matrix, floor),
        }
    };

    let mut pairs = assignment
        .into_iter()
        .map(|(gold, predicted)| RowPair {
            gold,
            predicted,
            weight: matrix[gold][predicted],
        })
        .filter(|pair| pair.weight >= floor)
        .collect::<Vec<_>>();
    pairs.sort_by_key(|pair| pair.gold);

    let mut gold_used = vec![false; gold_len];
    let mut predicted_used = vec![false; predicted_len];
    for pair in &pairs {
        gold_used[pair.gold] = true;
        predicted_used[pair.predicted] = true;
    }

    Ok(Alignment {
        pairs,
        unmatched_gold: unused_indices(&gold_used),
        unmatched_predicted: unused_indices(&predicted_used),
    })
}

fn unused_indices(used: &[bool]) -> Vec<usize> {
    used.iter()
        .enumerate()
        .filter(|(_, used)| !**used)
        .map(|(index, _)| index)
        .collect()
}

/// Candidate pairs by descending weight; ties go to the lowest gold index, then predicted index.
fn greedy_assignment(matrix: &[Vec<f64>], floor: f64) -> Vec<(usize, usize)> {
    let mut candidates = Vec::new();
    for (g, row) in matrix.iter().enumerate() {
        for (p, weight) in row.iter().enumerate() {
            if *weight >= floor {
                candidates.push((*weight, g, p));
            }
        }
    }
    candidates.sort_by(|left, right| {
        right
            .0
            .total_cmp(&left.0)
            .then(left.1.cmp(&right.1))
            .then(left.2.cmp(&right.2))
    });

    let predicted_len = matrix.first().map_or(0, Vec::len);
    let mut gold_used = vec![false; matrix.len()];
    let mut predicted_used = vec![false; predicted_len];
    let mut assignment = Vec::new();
    for (_, g, p) in candidates {
        if gold_used[g] || predicted_used[p] {
            continue;
        }
        gold_used[g] = true;
        predicted_used[p] = true;
        assignment.push((g, p));
    }
    assignment
}

/// Maximum-weight assignment; below-floor cells carry no weight so they never displace a
/// kept pair.
fn optimal_assignment(matrix: &[Vec<f64>], floor: f64) -> Vec<(usize, usize)> {
    let rows = matrix.len();
    let cols = matrix.first().map_or(0, Vec::len);
    let cost = |g: usize, p: usize| {
        let weight = matrix[g][p];
        if weight >= floor { 1.0 - weight } else { 1.0 }
    };

    if rows <= cols {
        let costs = (0..rows)
            .map(|g| (0..cols).map(|p| cost(g, p)).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        hungarian(&costs)
            .into_iter()
            .enumerate()
            .collect::<Vec<_>>()
    } else {
        let costs = (0..cols)
            .map(|p| (0..rows).map(|g| cost(g, p)).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        hungarian(&costs)
            .into_iter()
            .enumerate()
            .map(|(p, g)| (g, p))
            .collect::<Vec<_>>()
    }
}

/// Minimum-cost assignment for an `n x m` cost matrix with `n <= m`.
///
/// Returns the assigned column of every row. Shortest augmenting paths with row/column
/// potentials, O(n^2 m).
fn hungarian(cost: &[Vec<f64>]) -> Vec<usize> {
    let n = cost.len();
    let m = cost.first().map_or(0, Vec::len);
    debug_assert!(n <= m);

    // 1-based with index 0 as the virtual source column.
    let mut u = vec![0.0_f64; n + 1];
    let mut v = vec![0.0_f64; m + 1];
    let mut owner = vec![0_usize; m + 1];
    let mut way = vec![0_usize; m + 1];

    for row in 1..=n {
        owner[0] = row;
        let mut current = 0_usize;
        let mut min_slack = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[current] = true;
            let owner_row = owner[current];
            let mut delta = f64::INFINITY;
            let mut next = 0_usize;

            for col in 1..=m {
                if used[col] {
                    continue;
                }
                let reduced = cost[owner_row - 1][col - 1] - u[owner_row] - v[col];
                if reduced < min_slack[col] {
                    min_slack[col] = reduced;
                    way[col] = current;
                }
                if min_slack[col].partial_cmp(&delta) == Some(Ordering::Less) {
                    delta = min_slack[col];
                    next = col;
                }
            }

            for col in 0..=m {
                if used[col] {
                    u[owner[col]] += delta;
                    v[col] -= delta;
                } else {
                    min_slack[col] -= delta;
                }
            }

            current = next;
            if owner[current] == 0 {
                break;
            }
        }

        loop {
            let previous = way[current];
            owner[current] = owner[previous];
            current = previous;
            if current == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![0_usize; n];
    for col in 1..=m {
        if owner[col] != 0 {
            assignment[owner[col] - 1] = col - 1;
        }
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::{AlignmentOptions, AlignmentStrategy, align};

    fn weights<'a>(matrix: &'a [&'a [f64]]) -> impl Fn(usize, usize) -> f64 + 'a {
        move |g, p| matrix[g][p]
    }

    fn pairs_of(alignment: &super::Alignment) -> Vec<(usize, usize)> {
        alignment
            .pairs
            .iter()
            .map(|pair| (pair.gold, pair.predicted))
            .collect()
    }

    #[test]
    fn optimal_beats_greedy_on_crossed_weights() {
        let matrix: &[&[f64]] = &[&[0.9, 0.8], &[0.8, 0.0]];
        let optimal = align(2, 2, weights(matrix), &AlignmentOptions::default())
            .expect("alignment should fit");
        assert_eq!(pairs_of(&optimal), vec![(0, 1), (1, 0)]);
        assert!((optimal.score() - 0.8).abs() < 1e-9);

        let greedy_options = AlignmentOptions {
            strategy: AlignmentStrategy::Greedy,
            ..AlignmentOptions::default()
        };
        let greedy = align(2, 2, weights(matrix), &greedy_options).expect("alignment should fit");
        assert_eq!(pairs_of(&greedy), vec![(0, 0), (1, 1)]);
        assert!((greedy.score() - 0.45).abs() < 1e-9);
    }

    #[test]
    fn rectangular_inputs_leave_leftovers_unmatched() {
        let matrix: &[&[f64]] = &[&[0.1, 1.0, 0.2], &[0.9, 0.0, 0.3]];
        let alignment = align(2, 3, weights(matrix), &AlignmentOptions::default())
            .expect("alignment should fit");
        assert_eq!(pairs_of(&alignment), vec![(0, 1), (1, 0)]);
        assert!(alignment.unmatched_gold.is_empty());
        assert_eq!(alignment.unmatched_predicted, vec![2]);
        assert!((alignment.score() - (1.0 + 0.9) / 3.0).abs() < 1e-9);

        let transposed: &[&[f64]] = &[&[0.1, 0.9], &[1.0, 0.0], &[0.2, 0.3]];
        let alignment = align(3, 2, weights(transposed), &AlignmentOptions::default())
            .expect("alignment should fit");
        assert_eq!(pairs_of(&alignment), vec![(0, 1), (1, 0)]);
        assert_eq!(alignment.unmatched_gold, vec![2]);
    }

    #[test]
    fn floor_leaves_weak_pairs_unmatched() {
        let matrix: &[&[f64]] = &[&[1.0, 0.0], &[0.0, 0.2]];
        let options = AlignmentOptions {
            min_pair_score: 0.5,
            ..AlignmentOptions::default()
        };
        let alignment = align(2, 2, weights(matrix), &options).expect("alignment should fit");
        assert_eq!(pairs_of(&alignment), vec![(0, 0)]);
        assert_eq!(alignment.unmatched_gold, vec![1]);
        assert_eq!(alignment.unmatched_predicted, vec![1]);
        assert!((alignment.score() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_sides_produce_only_leftovers() {
        let alignment = align(0, 2, |_, _| 1.0, &AlignmentOptions::default())
            .expect("alignment should fit");
        assert!(alignment.pairs.is_empty());
        assert_eq!(alignment.unmatched_predicted, vec![0, 1]);
        assert_eq!(alignment.score(), 0.0);

        let nothing = align(0, 0, |_, _| 1.0, &AlignmentOptions::default())
            .expect("alignment should fit");
        assert_eq!(nothing.score(), 1.0);
    }

    #[test]
    fn greedy_ties_go_to_lowest_gold_index() {
        let options = AlignmentOptions {
            strategy: AlignmentStrategy::Greedy,
            ..AlignmentOptions::default()
        };
        let alignment = align(2, 1, |_, _| 0.5, &options).expect("alignment should fit");
        assert_eq!(pairs_of(&alignment), vec![(0, 0)]);
        assert_eq!(alignment.unmatched_gold, vec![1]);
    }

    #[test]
    fn oversized_inputs_overflow() {
        let options = AlignmentOptions {
            max_cells: 100,
            ..AlignmentOptions::default()
        };
        let error = align(20, 10, |_, _| 1.0, &options).expect_err("alignment should overflow");
        assert_eq!(error.gold_rows, 20);
        assert_eq!(error.predicted_rows, 10);
        assert_eq!(error.limit, 100);
    }
}
