//! Derived market-structure calendar: OPEX weeks, quad witching and
//! month-end rebalancing are computable from the date alone.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub date: NaiveDate,
    pub name: String,
    pub importance: String,
}

/// Third Friday of a month (monthly options expiration).
pub fn third_friday(year: i32, month: u32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid month start");
    let offset = (Weekday::Fri.num_days_from_monday() + 7
        - first.weekday().num_days_from_monday())
        % 7;
    first + Duration::days(offset as i64 + 14)
}

/// True when `date` falls in the Monday-Friday week containing the third
/// Friday of its month.
pub fn is_opex_week(date: NaiveDate) -> bool {
    let opex = third_friday(date.year(), date.month());
    let monday = opex - Duration::days(4);
    date >= monday && date <= opex
}

fn is_quad_witching_month(month: u32) -> bool {
    matches!(month, 3 | 6 | 9 | 12)
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).expect("valid month") - Duration::days(1)
}

/// Structural events inside the horizon, sorted by date.
pub fn upcoming_events(from: NaiveDate, horizon_days: i64) -> Vec<CalendarEvent> {
    let until = from + Duration::days(horizon_days);
    let mut events = Vec::new();

    let mut year = from.year();
    let mut month = from.month();
    loop {
        let opex = third_friday(year, month);
        if opex > until {
            break;
        }
        if opex >= from {
            if is_quad_witching_month(month) {
                events.push(CalendarEvent {
                    date: opex,
                    name: "Quad witching expiration".to_string(),
                    importance: "high".to_string(),
                });
            } else {
                events.push(CalendarEvent {
                    date: opex,
                    name: "Monthly options expiration".to_string(),
                    importance: "medium".to_string(),
                });
            }
        }

        let month_end = last_day_of_month(year, month);
        if month_end >= from && month_end <= until {
            events.push(CalendarEvent {
                date: month_end,
                name: "Month-end rebalancing".to_string(),
                importance: "low".to_string(),
            });
        }

        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }

    events.sort_by_key(|e| e.date);
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_third_friday_known_months() {
        // July 2026: the 1st is a Wednesday, first Friday the 3rd
        assert_eq!(
            third_friday(2026, 7),
            NaiveDate::from_ymd_opt(2026, 7, 17).unwrap()
        );
        // September 2026 quad witching
        assert_eq!(
            third_friday(2026, 9),
            NaiveDate::from_ymd_opt(2026, 9, 18).unwrap()
        );
    }

    #[test]
    fn test_opex_week_bounds() {
        let opex = third_friday(2026, 7);
        assert!(is_opex_week(opex));
        assert!(is_opex_week(opex - Duration::days(4)));
        assert!(!is_opex_week(opex - Duration::days(5)));
        assert!(!is_opex_week(opex + Duration::days(1)));
    }

    #[test]
    fn test_upcoming_events_sorted_and_bounded() {
        let from = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let events = upcoming_events(from, 60);
        assert!(!events.is_empty());
        for pair in events.windows(2) {
            assert!(pair[0].date <= pair[1].date);
        }
        assert!(events.iter().all(|e| e.date >= from));
        // September expiration inside the horizon is quad witching
        assert!(events
            .iter()
            .any(|e| e.name.contains("Quad witching")));
    }
}
