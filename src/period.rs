//! Period partitioning for incremental evidence gathering
//!
//! Splits a target year into quarter sub-periods so each external search is
//! bounded to a small date window. When the target year is still in
//! progress, the partition never extends past today: future quarters are
//! omitted and the current quarter is truncated to "now".

use crate::error::{DossierError, Result};
use chrono::{Datelike, NaiveDate};

/// Earliest target year accepted; a sanity bound, not a business rule.
const MIN_TARGET_YEAR: i32 = 2000;

/// One non-overlapping slice of the target year
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
}

impl Period {
    /// Single period covering the whole target year (year granularity)
    pub fn whole_year(year: i32) -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1).expect("Jan 1 is always valid"),
            end: NaiveDate::from_ymd_opt(year, 12, 31).expect("Dec 31 is always valid"),
            label: year.to_string(),
        }
    }

    /// Start date formatted for provider query languages (YYYY-MM-DD)
    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    /// End date formatted for provider query languages (YYYY-MM-DD)
    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} to {})", self.label, self.start_str(), self.end_str())
    }
}

/// Granularity of the partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Granularity {
    /// Four quarter sub-periods (default)
    #[default]
    Quarter,
    /// One period spanning the whole year
    Year,
}

/// Partition a target year into sub-periods, oldest first.
///
/// `today` bounds the partition for in-progress years and anchors the
/// year sanity check; callers pass `Utc::now().date_naive()`.
pub fn partition_year(year: i32, granularity: Granularity, today: NaiveDate) -> Result<Vec<Period>> {
    if year < MIN_TARGET_YEAR || year > today.year() + 1 {
        return Err(DossierError::Configuration(format!(
            "target year {} is outside the supported range {}..={}",
            year,
            MIN_TARGET_YEAR,
            today.year() + 1
        )));
    }

    let periods = match granularity {
        Granularity::Year => vec![Period::whole_year(year)],
        Granularity::Quarter => (1..=4).map(|q| quarter(year, q)).collect(),
    };

    // Never query into the future: drop not-yet-started periods and
    // truncate the in-progress one to today.
    let truncated = periods
        .into_iter()
        .filter(|p| p.start <= today)
        .map(|mut p| {
            if p.end > today {
                p.end = today;
            }
            p
        })
        .collect();

    Ok(truncated)
}

fn quarter(year: i32, number: u32) -> Period {
    let start_month = (number - 1) * 3 + 1;
    let start = NaiveDate::from_ymd_opt(year, start_month, 1).expect("quarter start is valid");
    // End is the day before the next quarter starts; Q4 ends Dec 31.
    let end = if number < 4 {
        NaiveDate::from_ymd_opt(year, start_month + 3, 1)
            .expect("next quarter start is valid")
            .pred_opt()
            .expect("day before a month start exists")
    } else {
        NaiveDate::from_ymd_opt(year, 12, 31).expect("Dec 31 is always valid")
    };

    Period {
        start,
        end,
        label: format!("{}-Q{}", year, number),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_past_year_has_four_covering_quarters() {
        let periods = partition_year(2024, Granularity::Quarter, date(2026, 8, 30)).unwrap();
        assert_eq!(periods.len(), 4);

        assert_eq!(periods[0].start, date(2024, 1, 1));
        assert_eq!(periods[3].end, date(2024, 12, 31));
        assert_eq!(periods[1].label, "2024-Q2");

        // Non-overlapping and contiguous: each quarter starts the day
        // after the previous one ends.
        for pair in periods.windows(2) {
            assert_eq!(pair[0].end.succ_opt().unwrap(), pair[1].start);
        }
    }

    #[test]
    fn test_quarter_boundaries() {
        let periods = partition_year(2023, Granularity::Quarter, date(2026, 1, 1)).unwrap();
        assert_eq!(periods[0].end, date(2023, 3, 31));
        assert_eq!(periods[1].start, date(2023, 4, 1));
        assert_eq!(periods[1].end, date(2023, 6, 30));
        assert_eq!(periods[2].end, date(2023, 9, 30));
    }

    #[test]
    fn test_current_year_truncates_to_today() {
        let today = date(2025, 8, 15);
        let periods = partition_year(2025, Granularity::Quarter, today).unwrap();

        // Q4 has not started; Q3 is cut short at today.
        assert_eq!(periods.len(), 3);
        assert_eq!(periods[2].label, "2025-Q3");
        assert_eq!(periods[2].end, today);
        assert_eq!(periods[1].end, date(2025, 6, 30));
    }

    #[test]
    fn test_current_year_first_day() {
        let today = date(2025, 1, 1);
        let periods = partition_year(2025, Granularity::Quarter, today).unwrap();
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].start, today);
        assert_eq!(periods[0].end, today);
    }

    #[test]
    fn test_year_granularity() {
        let periods = partition_year(2024, Granularity::Year, date(2026, 1, 1)).unwrap();
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].label, "2024");
        assert_eq!(periods[0].start, date(2024, 1, 1));
        assert_eq!(periods[0].end, date(2024, 12, 31));
    }

    #[test]
    fn test_year_granularity_truncates_in_progress_year() {
        let today = date(2025, 5, 2);
        let periods = partition_year(2025, Granularity::Year, today).unwrap();
        assert_eq!(periods[0].end, today);
    }

    #[test]
    fn test_out_of_range_years_rejected() {
        let today = date(2025, 6, 1);
        assert!(matches!(
            partition_year(1999, Granularity::Quarter, today),
            Err(DossierError::Configuration(_))
        ));
        assert!(matches!(
            partition_year(2027, Granularity::Quarter, today),
            Err(DossierError::Configuration(_))
        ));
        // Next year is allowed by the sanity bound but yields no periods.
        assert!(partition_year(2026, Granularity::Quarter, today)
            .unwrap()
            .is_empty());
    }
}
