use super::summary::FieldStatistic;

pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Ranking<'a> {
    /// Highest accuracy first.
    pub best: Vec<&'a FieldStatistic>,
    /// Lowest accuracy first.
    pub worst: Vec<&'a FieldStatistic>,
}

/// Top-N and bottom-N fields by accuracy; equal accuracies order by field name ascending.
pub fn rank_fields(fields: &[FieldStatistic], n: usize) -> Ranking<'_> {
    let mut best = fields.iter().collect::<Vec<_>>();
    best.sort_by(|left, right| {
        right
            .accuracy
            .total_cmp(&left.accuracy)
            .then_with(|| left.field_name.cmp(&right.field_name))
    });

    let mut worst = fields.iter().collect::<Vec<_>>();
    worst.sort_by(|left, right| {
        left.accuracy
            .total_cmp(&right.accuracy)
            .then_with(|| left.field_name.cmp(&right.field_name))
    });

    best.truncate(n);
    worst.truncate(n);
    Ranking { best, worst }
}
