//! Check-in eligibility: the once-per-hour and clock-skew rules
//!
//! Pure function over wall-clock timestamps. Same-date comparisons look at
//! hour-of-day (and minute when the hours are adjacent), not at elapsed
//! duration, so 14:50 → 15:10 is still `TooSoon` while 14:59 → 16:00 is
//! `Eligible`. This edge is kept exactly as the kiosk has always enforced it.

use chrono::{NaiveDateTime, Timelike};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    /// Less than one wall-clock hour since the last check-in
    TooSoon,
    /// Stored check-in is later than the local clock
    FutureSkew,
}

/// Decide whether a check-in at `now` is allowed after `last_check_in`
pub fn evaluate(
    now: NaiveDateTime,
    last_check_in: Option<NaiveDateTime>,
    allow_within_hour: bool,
) -> Eligibility {
    if allow_within_hour {
        return Eligibility::Eligible;
    }

    // Never checked in, or a row that predates timestamp tracking
    let Some(last) = last_check_in else {
        return Eligibility::Eligible;
    };

    let (now_date, last_date) = (now.date(), last.date());

    if now_date == last_date {
        let same_hour = now.hour() == last.hour();
        let next_hour_early_minute =
            now.hour() == last.hour() + 1 && now.minute() < last.minute();

        if same_hour || next_hour_early_minute {
            Eligibility::TooSoon
        } else if now.hour() < last.hour() {
            Eligibility::FutureSkew
        } else {
            Eligibility::Eligible
        }
    } else if now_date < last_date {
        Eligibility::FutureSkew
    } else {
        Eligibility::Eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_no_previous_check_in_is_eligible() {
        for (h, m) in [(0, 0), (9, 30), (23, 59)] {
            assert_eq!(evaluate(at(10, h, m), None, false), Eligibility::Eligible);
        }
    }

    #[test]
    fn test_same_hour_is_too_soon() {
        for hour in 0..24 {
            for (last_min, now_min) in [(0, 0), (0, 59), (30, 31), (59, 59)] {
                assert_eq!(
                    evaluate(at(10, hour, now_min), Some(at(10, hour, last_min)), false),
                    Eligibility::TooSoon,
                    "hour {} {}->{}",
                    hour,
                    last_min,
                    now_min
                );
            }
        }
    }

    #[test]
    fn test_same_hour_earlier_minute_is_too_soon_not_skew() {
        // Minute-level skew inside one hour is not detected
        assert_eq!(evaluate(at(10, 14, 5), Some(at(10, 14, 40)), false), Eligibility::TooSoon);
    }

    #[test]
    fn test_next_hour_earlier_minute_is_too_soon() {
        assert_eq!(evaluate(at(10, 15, 10), Some(at(10, 14, 50)), false), Eligibility::TooSoon);
        assert_eq!(evaluate(at(10, 15, 29), Some(at(10, 14, 30)), false), Eligibility::TooSoon);
    }

    #[test]
    fn test_next_hour_same_or_later_minute_is_eligible() {
        assert_eq!(evaluate(at(10, 15, 30), Some(at(10, 14, 30)), false), Eligibility::Eligible);
        assert_eq!(evaluate(at(10, 15, 45), Some(at(10, 14, 30)), false), Eligibility::Eligible);
    }

    #[test]
    fn test_two_hours_later_ignores_minutes() {
        // 14:59 -> 16:00 is only 61 minutes but passes on hour-of-day alone
        assert_eq!(evaluate(at(10, 16, 0), Some(at(10, 14, 59)), false), Eligibility::Eligible);
    }

    #[test]
    fn test_earlier_hour_same_day_is_future_skew() {
        assert_eq!(evaluate(at(10, 9, 0), Some(at(10, 14, 0)), false), Eligibility::FutureSkew);
        assert_eq!(evaluate(at(10, 13, 59), Some(at(10, 14, 0)), false), Eligibility::FutureSkew);
    }

    #[test]
    fn test_earlier_date_is_future_skew() {
        for (h, m) in [(0, 0), (14, 0), (23, 59)] {
            assert_eq!(
                evaluate(at(9, h, m), Some(at(10, 8, 0)), false),
                Eligibility::FutureSkew
            );
        }
        assert_eq!(evaluate(at(1, 23, 0), Some(at(28, 1, 0)), false), Eligibility::FutureSkew);
    }

    #[test]
    fn test_later_date_is_eligible() {
        // Yesterday 10:00 -> today 09:00
        assert_eq!(evaluate(at(11, 9, 0), Some(at(10, 10, 0)), false), Eligibility::Eligible);
        // Across midnight, only minutes apart
        assert_eq!(evaluate(at(11, 0, 1), Some(at(10, 23, 59)), false), Eligibility::Eligible);
    }

    #[test]
    fn test_override_always_eligible() {
        let last = at(10, 14, 0);
        for now in [at(10, 14, 0), at(10, 14, 30), at(10, 9, 0), at(2, 12, 0), at(20, 1, 0)] {
            assert_eq!(evaluate(now, Some(last), true), Eligibility::Eligible);
        }
        assert_eq!(evaluate(at(10, 14, 0), None, true), Eligibility::Eligible);
    }
}
