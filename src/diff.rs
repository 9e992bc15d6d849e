//! Rate change extraction
//!
//! Rate history rows are grouped per service code and state, ordered by effective date, and
//! every consecutive pair whose rate text differs becomes a [`RateChange`].

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::record::{self, Row};

/// Column order of the rate change dataset.
pub const RATE_CHANGE_COLUMNS: [&str; 13] = [
    "service_code",
    "service_description",
    "state_name",
    "service_category",
    "old_rate",
    "new_rate",
    "percentage_change",
    "effective_date",
    "modifiers",
    "provider_type",
    "program",
    "location_region",
    "duration_unit",
];

const MODIFIER_COLUMNS: [&str; 4] = ["modifier_1", "modifier_2", "modifier_3", "modifier_4"];

static NON_NUMERIC: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"[^0-9.\-]").unwrap());
static LEADING_NUMBER: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^-?(\d+\.?\d*|\.\d+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateChange {
    pub service_code: String,
    pub service_description: String,
    pub state_name: String,
    pub service_category: String,
    pub old_rate: String,
    pub new_rate: String,
    pub percentage_change: String,
    pub effective_date: String,
    /// Modifiers of the older observation.
    pub modifiers: Vec<String>,
    pub provider_type: String,
    pub program: String,
    pub location_region: String,
    pub duration_unit: String,
}

impl From<&RateChange> for Row {
    fn from(change: &RateChange) -> Self {
        let text = |s: &String| Value::String(s.clone());
        Row::from_iter([
            ("service_code".to_owned(), text(&change.service_code)),
            (
                "service_description".to_owned(),
                text(&change.service_description),
            ),
            ("state_name".to_owned(), text(&change.state_name)),
            ("service_category".to_owned(), text(&change.service_category)),
            ("old_rate".to_owned(), text(&change.old_rate)),
            ("new_rate".to_owned(), text(&change.new_rate)),
            ("percentage_change".to_owned(), text(&change.percentage_change)),
            ("effective_date".to_owned(), text(&change.effective_date)),
            (
                "modifiers".to_owned(),
                Value::Array(change.modifiers.iter().map(text).collect()),
            ),
            ("provider_type".to_owned(), text(&change.provider_type)),
            ("program".to_owned(), text(&change.program)),
            ("location_region".to_owned(), text(&change.location_region)),
            ("duration_unit".to_owned(), text(&change.duration_unit)),
        ])
    }
}

/// Numeric value of a rate string such as `"$1,250.50"`.
///
/// Only the leading number of the stripped text counts, so a range `"$10.00 - $12.00"` reads as
/// `10`. Text without a leading number is `0`.
pub fn parse_rate(rate: &str) -> f64 {
    let stripped = NON_NUMERIC.replace_all(rate, "");
    LEADING_NUMBER
        .find(&stripped)
        .and_then(|number| number.as_str().parse().ok())
        .unwrap_or(0.0)
}

/// Percentage change from `old` to `new`, two decimals. `"0.00"` when `old` is not positive.
///
/// Ties round away from zero (`0.125` is `"0.13"`).
pub fn percentage_change(old: &str, new: &str) -> String {
    let old = parse_rate(old);
    let new = parse_rate(new);
    let change = if old > 0.0 {
        (new - old) / old * 100.0
    } else {
        0.0
    };
    format!("{:.2}", (change * 100.0).round() / 100.0)
}

/// Parse an effective date. `None` sorts before every parsed date.
pub fn parse_effective_date(date: &str) -> Option<NaiveDateTime> {
    let date = date.trim();
    if date.is_empty() {
        return None;
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(date) {
        return Some(datetime.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(date, format) {
            return Some(datetime);
        }
    }
    ["%Y-%m-%d", "%m/%d/%Y"]
        .into_iter()
        .find_map(|format| NaiveDate::parse_from_str(date, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn group_key(row: &Row) -> String {
    format!(
        "{}-{}",
        record::text(row, "service_code"),
        record::text(row, "state_name")
    )
}

fn rate_change(older: &Row, newer: &Row) -> Option<RateChange> {
    let old_rate = record::text(older, "rate");
    let new_rate = record::text(newer, "rate");
    if old_rate.is_empty() || new_rate.is_empty() || old_rate == new_rate {
        return None;
    }
    Some(RateChange {
        service_code: record::text(newer, "service_code"),
        service_description: record::text(newer, "service_description"),
        state_name: record::text(newer, "state_name"),
        service_category: record::text(newer, "service_category"),
        percentage_change: percentage_change(&old_rate, &new_rate),
        old_rate,
        new_rate,
        effective_date: record::text(newer, "rate_effective_date"),
        modifiers: MODIFIER_COLUMNS
            .iter()
            .filter_map(|column| record::dictionary_key(older.get(*column)))
            .collect(),
        provider_type: record::text(newer, "provider_type"),
        program: record::text(newer, "program"),
        location_region: record::text(newer, "location_region"),
        duration_unit: record::text(newer, "duration_unit"),
    })
}

/// Rate changes in first-seen group order, chronological within a group.
pub fn extract_rate_changes(records: &[Row]) -> Vec<RateChange> {
    let mut groups = IndexMap::<String, Vec<&Row>>::new();
    for row in records {
        groups.entry(group_key(row)).or_default().push(row);
    }
    groups
        .into_values()
        .filter(|group| group.len() >= 2)
        .flat_map(|mut group| {
            group.sort_by_cached_key(|row| {
                parse_effective_date(&record::text(row, "rate_effective_date"))
            });
            group
                .windows(2)
                .filter_map(|pair| rate_change(pair[0], pair[1]))
                .collect::<Vec<_>>()
        })
        .collect()
}
