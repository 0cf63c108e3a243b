use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};

use super::views::{BandCount, DayAmount, DayCount, LabelCount};

/// Four-hour bands of the local day, in display order.
pub const HOUR_BANDS: [&str; 6] = [
    "00H-03H", "04H-07H", "08H-11H", "12H-15H", "16H-19H", "20H-23H",
];

pub fn local_day(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

pub fn band_index(at: DateTime<Utc>, offset: FixedOffset) -> usize {
    (at.with_timezone(&offset).hour() / 4) as usize
}

/// Counts per hour band; all six bands are always present.
pub fn count_by_band<I>(instants: I, offset: FixedOffset) -> Vec<BandCount>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut counts = [0usize; HOUR_BANDS.len()];
    for at in instants {
        counts[band_index(at, offset)] += 1;
    }
    HOUR_BANDS
        .iter()
        .zip(counts)
        .map(|(label, count)| BandCount {
            label: (*label).to_string(),
            count,
        })
        .collect()
}

/// Counts per local day, ascending.
pub fn count_by_day<I>(instants: I, offset: FixedOffset) -> Vec<DayCount>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut days: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for at in instants {
        *days.entry(local_day(at, offset)).or_default() += 1;
    }
    days.into_iter()
        .map(|(day, count)| DayCount { day, count })
        .collect()
}

/// Sums per local day, ascending.
pub fn sum_by_day<I>(entries: I, offset: FixedOffset) -> Vec<DayAmount>
where
    I: IntoIterator<Item = (DateTime<Utc>, f64)>,
{
    let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (at, amount) in entries {
        *days.entry(local_day(at, offset)).or_default() += amount;
    }
    days.into_iter()
        .map(|(day, amount)| DayAmount {
            day,
            amount: round_cents(amount),
        })
        .collect()
}

/// Counts per label, substituting `fallback` for missing or blank labels.
/// Sorted by descending count, then label.
pub fn count_by_label<'a, I>(labels: I, fallback: &str) -> Vec<LabelCount>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for label in labels {
        let label = label
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .unwrap_or(fallback);
        *counts.entry(label.to_string()).or_default() += 1;
    }
    let mut rows: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, count)| LabelCount { label, count })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    rows
}

pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
