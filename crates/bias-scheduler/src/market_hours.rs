//! America/New_York market session math.

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;

pub fn eastern_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&New_York)
}

pub fn to_eastern(utc: DateTime<Utc>) -> DateTime<Tz> {
    utc.with_timezone(&New_York)
}

/// Monday-Friday. Exchange holidays are not modeled; a holiday tick just
/// finds no fresh data.
pub fn is_trading_day(et: &DateTime<Tz>) -> bool {
    et.weekday().num_days_from_monday() < 5
}

/// Regular session: 9:30 AM - 4:00 PM ET on trading days.
pub fn is_market_hours(et: &DateTime<Tz>) -> bool {
    if !is_trading_day(et) {
        return false;
    }
    let minutes = et.hour() * 60 + et.minute();
    (9 * 60 + 30..16 * 60).contains(&minutes)
}

/// Scanner cadence: 15 min during the volatile first and last hour,
/// 30 min mid-session.
pub fn scanner_interval_minutes(et: &DateTime<Tz>) -> i64 {
    let minutes = et.hour() * 60 + et.minute();
    let first_hour = (9 * 60 + 30..10 * 60 + 30).contains(&minutes);
    let last_hour = (15 * 60..16 * 60).contains(&minutes);
    if first_hour || last_hour {
        15
    } else {
        30
    }
}

/// True once per day at or after 9:45 ET on trading days.
pub fn is_daily_refresh_window(et: &DateTime<Tz>) -> bool {
    is_trading_day(et) && (et.hour() > 9 || (et.hour() == 9 && et.minute() >= 45))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn eastern(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        New_York
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn test_market_hours_bounds() {
        // Wednesday July 29 2026
        assert!(!is_market_hours(&eastern(2026, 7, 29, 9, 29)));
        assert!(is_market_hours(&eastern(2026, 7, 29, 9, 30)));
        assert!(is_market_hours(&eastern(2026, 7, 29, 15, 59)));
        assert!(!is_market_hours(&eastern(2026, 7, 29, 16, 0)));
    }

    #[test]
    fn test_weekend_closed() {
        // Saturday August 1 2026
        assert!(!is_market_hours(&eastern(2026, 8, 1, 11, 0)));
        assert!(!is_trading_day(&eastern(2026, 8, 1, 11, 0)));
    }

    #[test]
    fn test_scanner_cadence() {
        assert_eq!(scanner_interval_minutes(&eastern(2026, 7, 29, 9, 45)), 15);
        assert_eq!(scanner_interval_minutes(&eastern(2026, 7, 29, 12, 0)), 30);
        assert_eq!(scanner_interval_minutes(&eastern(2026, 7, 29, 15, 10)), 15);
    }

    #[test]
    fn test_daily_refresh_window() {
        assert!(!is_daily_refresh_window(&eastern(2026, 7, 29, 9, 44)));
        assert!(is_daily_refresh_window(&eastern(2026, 7, 29, 9, 45)));
        assert!(is_daily_refresh_window(&eastern(2026, 7, 29, 14, 0)));
        // Weekend never qualifies
        assert!(!is_daily_refresh_window(&eastern(2026, 8, 1, 10, 0)));
    }
}
