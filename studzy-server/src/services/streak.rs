//! Study streaks from the set of active UTC days

use chrono::{Days, NaiveDate};
use serde::Serialize;
use studzy_common::time::parse_day_key;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Streaks {
    pub current: u32,
    pub longest: u32,
}

/// Compute streaks from `YYYY-MM-DD` keys
///
/// The current streak ends today, or yesterday when nothing has been logged
/// yet today. Unparseable keys are ignored.
///
/// ```
/// use chrono::NaiveDate;
/// use studzy_server::services::streak::compute_streaks;
///
/// let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
/// let days = ["2024-03-08", "2024-03-09", "2024-03-10"];
/// let streaks = compute_streaks(days.iter().copied(), today);
/// assert_eq!(streaks.current, 3);
/// ```
pub fn compute_streaks<'a, I>(day_keys: I, today: NaiveDate) -> Streaks
where
    I: IntoIterator<Item = &'a str>,
{
    let mut days: Vec<NaiveDate> = day_keys
        .into_iter()
        .filter_map(parse_day_key)
        .filter(|d| *d <= today)
        .collect();
    days.sort_unstable();
    days.dedup();

    let mut longest = 0u32;
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;
    for day in &days {
        run = match previous {
            Some(prev) if prev.checked_add_days(Days::new(1)) == Some(*day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }

    let yesterday = today.checked_sub_days(Days::new(1));
    let current = match days.last() {
        Some(last) if *last == today || Some(*last) == yesterday => run,
        _ => 0,
    };

    Streaks { current, longest }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_day_key(s).unwrap()
    }

    #[test]
    fn test_no_activity() {
        let streaks = compute_streaks(std::iter::empty(), date("2024-03-10"));
        assert_eq!(streaks, Streaks::default());
    }

    #[test]
    fn test_streak_survives_until_end_of_next_day() {
        let days = ["2024-03-07", "2024-03-08", "2024-03-09"];
        let streaks = compute_streaks(days.iter().copied(), date("2024-03-10"));
        assert_eq!(streaks.current, 3);
        assert_eq!(streaks.longest, 3);
    }

    #[test]
    fn test_gap_breaks_current_but_keeps_longest() {
        let days = [
            "2024-02-01", "2024-02-02", "2024-02-03", "2024-02-04", "2024-03-09",
        ];
        let streaks = compute_streaks(days.iter().copied(), date("2024-03-12"));
        assert_eq!(streaks.current, 0);
        assert_eq!(streaks.longest, 4);
    }

    #[test]
    fn test_duplicates_and_month_boundary() {
        let days = ["2024-02-28", "2024-02-29", "2024-02-29", "2024-03-01", "garbage"];
        let streaks = compute_streaks(days.iter().copied(), date("2024-03-01"));
        assert_eq!(streaks.current, 3);
        assert_eq!(streaks.longest, 3);
    }

    #[test]
    fn test_future_days_ignored() {
        let days = ["2024-03-10", "2024-03-11"];
        let streaks = compute_streaks(days.iter().copied(), date("2024-03-10"));
        assert_eq!(streaks.current, 1);
    }
}
