//! Route adherence statistics over deviation rows.

use serde::Serialize;

use crate::deviation::DeviationRecord;

/// Counts and percentages of samples within / outside the adherence threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AdherenceSummary {
    pub within: usize,
    pub outside: usize,
    pub within_percent: f64,
    pub outside_percent: f64,
}

impl AdherenceSummary {
    /// Summarise `records`. Percentages are rounded to two decimals and are
    /// zero when there are no records.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a DeviationRecord>) -> Self {
        let (within, outside) = records
            .into_iter()
            .fold((0usize, 0usize), |(w, o), r| if r.adherent { (w + 1, o) } else { (w, o + 1) });

        let total = within + outside;
        if total == 0 {
            return Self::default();
        }
        Self {
            within,
            outside,
            within_percent: round2(within as f64 * 100.0 / total as f64),
            outside_percent: round2(outside as f64 * 100.0 / total as f64),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
