//! Input validation for CLI arguments.
//!
//! Category names resolve in three tiers: exact match → synonym lookup →
//! error with the closest suggestion. Time arguments accept RFC 3339,
//! plain dates and relative offsets such as `6h`.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::error::{Error, Result};
use crate::model::ProcessorCategory;

// ── Synonym map ──────────────────────────────────────────────

pub static CATEGORY_SYNONYMS: LazyLock<HashMap<&str, ProcessorCategory>> = LazyLock::new(|| {
    [
        ("cgm", ProcessorCategory::CgmReading),
        ("sgv", ProcessorCategory::CgmReading),
        ("glucose", ProcessorCategory::CgmReading),
        ("readings", ProcessorCategory::CgmReading),
        ("bg", ProcessorCategory::CgmReading),
        ("boluses", ProcessorCategory::Bolus),
        ("insulin", ProcessorCategory::Bolus),
        ("temp_basal", ProcessorCategory::Basal),
        ("basal_rate", ProcessorCategory::Basal),
        ("suspend", ProcessorCategory::BasalSuspension),
        ("suspension", ProcessorCategory::BasalSuspension),
        ("resume", ProcessorCategory::BasalResume),
        ("alarms", ProcessorCategory::Alarm),
        ("alerts", ProcessorCategory::Alarm),
        ("cgm_alerts", ProcessorCategory::CgmAlert),
        ("mode", ProcessorCategory::UserMode),
        ("exercise", ProcessorCategory::UserMode),
        ("sleep", ProcessorCategory::UserMode),
        ("site", ProcessorCategory::Cartridge),
        ("site_change", ProcessorCategory::Cartridge),
        ("reservoir", ProcessorCategory::Cartridge),
        ("status", ProcessorCategory::DeviceStatus),
        ("devicestatus", ProcessorCategory::DeviceStatus),
        ("battery", ProcessorCategory::DeviceStatus),
        ("iob", ProcessorCategory::DeviceStatus),
    ]
    .into_iter()
    .collect()
});

/// Normalize a category name via exact match or synonym lookup.
///
/// Returns the category, or an error with the original input and an
/// optional suggestion.
pub fn normalize_category(input: &str) -> std::result::Result<ProcessorCategory, (String, Option<String>)> {
    if let Ok(category) = input.parse::<ProcessorCategory>() {
        return Ok(category);
    }

    let lower = input.trim().to_lowercase().replace('-', "_");
    if let Some(&category) = CATEGORY_SYNONYMS.get(lower.as_str()) {
        return Ok(category);
    }

    Err((input.to_string(), find_closest_category(&lower)))
}

/// Parse a comma-separated category list. `all` selects every category.
///
/// # Errors
///
/// Returns [`Error::InvalidCategory`] for the first name that cannot be
/// resolved.
pub fn parse_category_list(input: &str) -> Result<BTreeSet<ProcessorCategory>> {
    let mut categories = BTreeSet::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part.eq_ignore_ascii_case("all") {
            categories.extend(ProcessorCategory::ALL);
            continue;
        }
        let category = normalize_category(part)
            .map_err(|(input, suggestion)| Error::InvalidCategory { input, suggestion })?;
        categories.insert(category);
    }
    Ok(categories)
}

/// Find the closest category name across canonical names and synonyms.
fn find_closest_category(input: &str) -> Option<String> {
    let mut best: Option<(ProcessorCategory, usize)> = None;

    let canonical = ProcessorCategory::ALL.iter().map(|c| (c.as_str(), *c));
    let synonyms = CATEGORY_SYNONYMS.iter().map(|(k, v)| (*k, *v));

    for (name, category) in canonical.chain(synonyms) {
        let dist = levenshtein_distance(input, name);
        if dist <= 3 && best.is_none_or(|(_, d)| dist < d) {
            best = Some((category, dist));
        }
    }

    best.map(|(c, _)| c.as_str().to_string())
}

// ── Time arguments ───────────────────────────────────────────

/// Parse a point in time given on the command line.
///
/// Accepts RFC 3339 (`2024-05-01T10:00:00Z`), `YYYY-MM-DD HH:MM[:SS]` and
/// `YYYY-MM-DD` (both read as UTC), `now`, and relative offsets into the
/// past: `90m`, `6h`, `2d`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] when the input matches none of the
/// accepted forms, or when a relative offset reaches past the representable
/// time range.
pub fn parse_time_arg(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();

    if trimmed.eq_ignore_ascii_case("now") {
        return Ok(now);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(t.and_utc());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(t) = d.and_hms_opt(0, 0, 0) {
            return Ok(t.and_utc());
        }
    }
    if let Some(offset) = parse_relative(trimmed) {
        return offset
            .and_then(|d| now.checked_sub_signed(d))
            .ok_or_else(|| Error::InvalidArgument(format!("Time offset '{input}' is out of range")));
    }

    Err(Error::InvalidArgument(format!(
        "Unrecognized time '{input}'. Use RFC 3339, YYYY-MM-DD, or a relative offset like 6h"
    )))
}

/// `None` if `input` is not a relative offset, `Some(None)` if it is one
/// that does not fit in a [`Duration`].
fn parse_relative(input: &str) -> Option<Option<Duration>> {
    let split = input.len().checked_sub(1)?;
    if !input.is_char_boundary(split) {
        return None;
    }
    let (amount, unit) = input.split_at(split);
    let amount: i64 = amount.parse().ok()?;
    if amount < 0 {
        return None;
    }
    match unit {
        "m" => Some(Duration::try_minutes(amount)),
        "h" => Some(Duration::try_hours(amount)),
        "d" => Some(Duration::try_days(amount)),
        _ => None,
    }
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let a_len = a.len();
    let b_len = b.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for i in 1..=a_len {
        curr[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1) // deletion
                .min(curr[j - 1] + 1) // insertion
                .min(prev[j - 1] + cost); // substitution
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category("bolus"), Ok(ProcessorCategory::Bolus));
        assert_eq!(normalize_category("CGM-READING"), Ok(ProcessorCategory::CgmReading));
        assert_eq!(normalize_category("glucose"), Ok(ProcessorCategory::CgmReading));
        assert_eq!(normalize_category("suspend"), Ok(ProcessorCategory::BasalSuspension));
        assert!(normalize_category("nonsense").is_err());
    }

    #[test]
    fn test_normalize_category_suggests_closest() {
        let (input, suggestion) = normalize_category("bolsu").unwrap_err();
        assert_eq!(input, "bolsu");
        assert_eq!(suggestion.as_deref(), Some("bolus"));
    }

    #[test]
    fn test_parse_category_list() {
        let set = parse_category_list("bolus, cgm ,basal").unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains(&ProcessorCategory::CgmReading));

        assert_eq!(parse_category_list("all").unwrap().len(), 10);
        assert!(parse_category_list("").unwrap().is_empty());
        assert!(matches!(
            parse_category_list("bolus,carbs"),
            Err(Error::InvalidCategory { .. })
        ));
    }

    #[test]
    fn test_parse_time_arg() {
        let now = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(parse_time_arg("now", now).unwrap(), now);
        assert_eq!(parse_time_arg("6h", now).unwrap(), now - Duration::hours(6));
        assert_eq!(parse_time_arg("2d", now).unwrap(), now - Duration::days(2));
        assert_eq!(
            parse_time_arg("2024-04-30", now).unwrap(),
            DateTime::parse_from_rfc3339("2024-04-30T00:00:00Z").unwrap()
        );
        assert_eq!(
            parse_time_arg("2024-04-30 08:15", now).unwrap(),
            DateTime::parse_from_rfc3339("2024-04-30T08:15:00Z").unwrap()
        );
        assert_eq!(
            parse_time_arg("2024-04-30T08:15:00+02:00", now).unwrap(),
            DateTime::parse_from_rfc3339("2024-04-30T06:15:00Z").unwrap()
        );
        assert!(parse_time_arg("yesterday-ish", now).is_err());
        assert!(parse_time_arg("h", now).is_err());
    }

    #[test]
    fn test_parse_time_arg_rejects_out_of_range_offsets() {
        let now = Utc::now();
        for input in ["99999999999d", "9223372036854775807h", "9000000000000000m"] {
            let err = parse_time_arg(input, now).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{input}: {err:?}");
        }
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", "abc"), 0);
        assert_eq!(levenshtein_distance("abc", "abd"), 1);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }
}
