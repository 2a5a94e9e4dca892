//! Record normalization
//!
//! Turns a loosely-typed [`RawRecord`] into a [`CanonicalRecord`] for one
//! partition year, or explains why it cannot be stored.

use chrono::{Datelike, NaiveDateTime};
use ransomsync_common::date::parse_optional;
use ransomsync_common::record::OTHER;
use ransomsync_common::{CanonicalRecord, RawRecord};
use std::fmt;

/// Sector values the feed uses when it has nothing better.
const PLACEHOLDER_SECTORS: [&str; 4] = ["", "not found", "unknown", "nan"];

/// Why a raw record was not turned into a canonical one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Discard {
    /// `discovered` was absent or in no supported format
    MissingDiscovered,
    /// `discovered` belongs to another year than the partition being loaded
    YearMismatch { year: i32 },
}

impl fmt::Display for Discard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discard::MissingDiscovered => write!(f, "missing or unparseable discovered date"),
            Discard::YearMismatch { year } => write!(f, "discovered in {}", year),
        }
    }
}

/// Normalize `raw` for the partition holding `target_year`.
pub fn normalize(raw: &RawRecord, target_year: i32) -> Result<CanonicalRecord, Discard> {
    let discovered_date =
        parse_optional(raw.discovered.as_deref()).ok_or(Discard::MissingDiscovered)?;

    if discovered_date.year() != target_year {
        return Err(Discard::YearMismatch {
            year: discovered_date.year(),
        });
    }

    Ok(CanonicalRecord {
        sector: clean_sector(raw.activity.as_deref()),
        country: clean_country(raw.country.as_deref()),
        post_title: trimmed(raw.post_title.as_deref()),
        group_name: clean_group_name(raw.group_name.as_deref()),
        discovered_date,
        attack_date: parse_optional(raw.published.as_deref()),
        month: month_of(discovered_date),
    })
}

/// Sector, with placeholders collapsed to "Other"
pub fn clean_sector(activity: Option<&str>) -> String {
    let value = activity.unwrap_or_default().trim();
    let lowered = value.to_lowercase();
    if PLACEHOLDER_SECTORS.contains(&lowered.as_str()) {
        OTHER.to_string()
    } else {
        value.to_string()
    }
}

/// Group name, with blanks collapsed to "Other"
pub fn clean_group_name(group_name: Option<&str>) -> String {
    let value = group_name.unwrap_or_default().trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        OTHER.to_string()
    } else {
        value.to_string()
    }
}

/// Country, which is allowed to stay empty
pub fn clean_country(country: Option<&str>) -> String {
    let value = country.unwrap_or_default().trim();
    if value.eq_ignore_ascii_case("nan") {
        String::new()
    } else {
        value.to_string()
    }
}

fn trimmed(value: Option<&str>) -> String {
    value.unwrap_or_default().trim().to_string()
}

fn month_of(date: NaiveDateTime) -> i32 {
    // month() is 1..=12
    date.month() as i32
}

/// Tally of normalization results for one batch
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NormalizeReport {
    pub accepted: usize,
    pub missing_discovered: usize,
    pub other_year: usize,
    pub not_newer: usize,
}

impl NormalizeReport {
    pub fn discarded(&self) -> usize {
        self.missing_discovered + self.other_year + self.not_newer
    }

    fn record_discard(&mut self, discard: Discard) {
        match discard {
            Discard::MissingDiscovered => self.missing_discovered += 1,
            Discard::YearMismatch { .. } => self.other_year += 1,
        }
    }
}

/// Normalize a batch for `target_year`, keeping records `keep` accepts.
pub fn normalize_batch<F>(
    raws: &[RawRecord],
    target_year: i32,
    keep: F,
) -> (Vec<CanonicalRecord>, NormalizeReport)
where
    F: Fn(&CanonicalRecord) -> bool,
{
    let mut report = NormalizeReport::default();
    let mut records = Vec::with_capacity(raws.len());

    for raw in raws {
        match normalize(raw, target_year) {
            Ok(record) if keep(&record) => {
                report.accepted += 1;
                records.push(record);
            },
            Ok(_) => report.not_newer += 1,
            Err(discard) => report.record_discard(discard),
        }
    }

    (records, report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn raw(discovered: &str) -> RawRecord {
        RawRecord {
            discovered: Some(discovered.to_string()),
            ..RawRecord::default()
        }
    }

    #[test]
    fn test_bare_date_normalizes_to_midnight() {
        let record = normalize(&raw("2024-06-15"), 2024).unwrap();
        let midnight = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        assert_eq!(record.discovered_date, midnight);
        assert_eq!(record.month, 6);
    }

    #[test]
    fn test_full_record() {
        let input = RawRecord {
            activity: Some("  Healthcare ".to_string()),
            country: Some(" DE ".to_string()),
            post_title: Some(" Klinikum Example ".to_string()),
            group_name: Some(" blackbasta ".to_string()),
            discovered: Some("2024-11-03 07:08:09.101112".to_string()),
            published: Some("2024-11-01".to_string()),
        };

        let record = normalize(&input, 2024).unwrap();
        assert_eq!(record.sector, "Healthcare");
        assert_eq!(record.country, "DE");
        assert_eq!(record.post_title, "Klinikum Example");
        assert_eq!(record.group_name, "blackbasta");
        assert_eq!(record.month, 11);
        assert_eq!(
            record.attack_date,
            NaiveDate::from_ymd_opt(2024, 11, 1).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn test_missing_or_bad_discovered_is_discarded() {
        assert_eq!(
            normalize(&RawRecord::default(), 2024),
            Err(Discard::MissingDiscovered)
        );
        assert_eq!(normalize(&raw(""), 2024), Err(Discard::MissingDiscovered));
        assert_eq!(
            normalize(&raw("03/14/2024"), 2024),
            Err(Discard::MissingDiscovered)
        );
    }

    #[test]
    fn test_cross_year_record_is_discarded() {
        assert_eq!(
            normalize(&raw("2023-12-31 23:59:59"), 2024),
            Err(Discard::YearMismatch { year: 2023 })
        );
    }

    #[test]
    fn test_unparseable_published_is_null() {
        let mut input = raw("2024-01-05");
        input.published = Some("yesterday".to_string());
        assert_eq!(normalize(&input, 2024).unwrap().attack_date, None);
    }

    #[test]
    fn test_placeholder_sectors() {
        for activity in [None, Some(""), Some("Not Found"), Some("NOT FOUND"), Some("unknown")] {
            assert_eq!(clean_sector(activity), "Other", "activity {:?}", activity);
        }
        assert_eq!(clean_sector(Some(" Unknown ")), "Other");
        assert_eq!(clean_sector(Some("nan")), "Other");
        assert_eq!(clean_sector(Some("Finance")), "Finance");
    }

    #[test]
    fn test_blank_group_name_is_other() {
        assert_eq!(clean_group_name(None), "Other");
        assert_eq!(clean_group_name(Some("   ")), "Other");
        assert_eq!(clean_group_name(Some("NaN")), "Other");
        assert_eq!(clean_group_name(Some("qilin")), "qilin");
    }

    #[test]
    fn test_country_may_be_empty() {
        assert_eq!(clean_country(None), "");
        assert_eq!(clean_country(Some(" nan ")), "");
        assert_eq!(clean_country(Some(" US")), "US");
    }

    #[test]
    fn test_watermark_filter_is_strict() {
        let raws = vec![
            raw("2025-02-28"),
            raw("2025-03-01"),
            raw("2025-03-02"),
            raw("2024-12-31"),
            raw("bogus"),
        ];
        let watermark = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        let (records, report) =
            normalize_batch(&raws, 2025, |record| record.discovered_date > watermark);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].discovered_date.date(), NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        assert_eq!(
            report,
            NormalizeReport {
                accepted: 1,
                missing_discovered: 1,
                other_year: 1,
                not_newer: 2,
            }
        );
        assert_eq!(report.discarded(), 4);
    }

    proptest! {
        #[test]
        fn prop_sector_and_group_never_blank(
            activity in proptest::option::of("\\PC{0,12}"),
            group in proptest::option::of("[ \\t]{0,3}\\PC{0,8}[ \\t]{0,3}"),
        ) {
            let input = RawRecord {
                activity,
                group_name: group,
                discovered: Some("2024-05-05".to_string()),
                ..RawRecord::default()
            };
            let record = normalize(&input, 2024).unwrap();

            prop_assert!(!record.sector.trim().is_empty());
            prop_assert!(!record.group_name.trim().is_empty());
            prop_assert!(!record.sector.eq_ignore_ascii_case("nan"));
            prop_assert!(!record.group_name.eq_ignore_ascii_case("nan"));
        }

        #[test]
        fn prop_accepted_records_match_target_year(
            year in 2000i32..2100,
            month in 1u32..=12,
            day in 1u32..=28,
            target in 2000i32..2100,
        ) {
            let input = raw(&format!("{:04}-{:02}-{:02} 12:00:00", year, month, day));
            match normalize(&input, target) {
                Ok(record) => {
                    prop_assert_eq!(target, year);
                    prop_assert_eq!(record.discovered_date.year(), target);
                    prop_assert_eq!(record.month, month as i32);
                },
                Err(discard) => {
                    prop_assert_ne!(target, year);
                    prop_assert_eq!(discard, Discard::YearMismatch { year });
                },
            }
        }
    }
}
