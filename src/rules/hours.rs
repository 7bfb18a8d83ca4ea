use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::{PayPolicy, round2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKind {
    Weekday,
    Saturday,
    SundayOrHoliday,
}

impl DayKind {
    pub fn of(date: NaiveDate, is_public_holiday: bool) -> Self {
        if is_public_holiday || date.weekday() == Weekday::Sun {
            DayKind::SundayOrHoliday
        } else if date.weekday() == Weekday::Sat {
            DayKind::Saturday
        } else {
            DayKind::Weekday
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ShiftHours {
    pub worked: Decimal,
    pub normal: Decimal,
    pub ot: Decimal,
    pub sunday: Decimal,
}

/// A break as stored; `end == None` means the worker is still on it.
#[derive(Debug, Clone, Copy)]
pub struct BreakSpan {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

/// Minutes between `entry` and `leave` not covered by any break.
///
/// Breaks are clipped to the shift window and merged, so overlapping or
/// duplicated breaks are only subtracted once.
pub fn net_worked_minutes(entry: DateTime<Utc>, leave: DateTime<Utc>, breaks: &[BreakSpan]) -> i64 {
    if leave <= entry {
        return 0;
    }

    let mut spans: Vec<(DateTime<Utc>, DateTime<Utc>)> = breaks
        .iter()
        .map(|b| (b.start.max(entry), b.end.unwrap_or(leave).min(leave)))
        .filter(|(s, e)| s < e)
        .collect();
    spans.sort_by_key(|(s, _)| *s);

    let mut on_break = 0i64;
    let mut current: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    for (start, end) in spans {
        match current {
            Some((cs, ce)) if start <= ce => current = Some((cs, ce.max(end))),
            Some((cs, ce)) => {
                on_break += (ce - cs).num_seconds();
                current = Some((start, end));
            }
            None => current = Some((start, end)),
        }
    }
    if let Some((cs, ce)) = current {
        on_break += (ce - cs).num_seconds();
    }

    // Whole minutes only once the seconds are netted out.
    ((leave - entry).num_seconds() - on_break).max(0) / 60
}

/// True while a second scan is too close to clock-in to count as clock-out.
pub fn within_scan_debounce(entry: DateTime<Utc>, now: DateTime<Utc>, debounce_secs: i64) -> bool {
    (now - entry).num_seconds() < debounce_secs
}

/// True when a shift from `entry` to `leave` runs past `max_hours`.
///
/// Such a shift is not closed by a scan; a supervisor corrects its times.
pub fn exceeds_max_shift(entry: DateTime<Utc>, leave: DateTime<Utc>, max_hours: i64) -> bool {
    (leave - entry).num_seconds() > max_hours.saturating_mul(3600)
}

/// Splits worked minutes into normal, overtime and Sun/PH hours.
pub fn classify(minutes: i64, kind: DayKind, policy: &PayPolicy) -> ShiftHours {
    let worked = round2(Decimal::from(minutes.max(0)) / Decimal::from(60));

    match kind {
        DayKind::SundayOrHoliday => ShiftHours {
            worked,
            sunday: worked,
            ..ShiftHours::default()
        },
        DayKind::Weekday | DayKind::Saturday => {
            let limit = if kind == DayKind::Saturday {
                policy.normal_hours_saturday
            } else {
                policy.normal_hours_weekday
            };
            let normal = worked.min(limit);
            ShiftHours {
                worked,
                normal,
                ot: worked - normal,
                sunday: Decimal::ZERO,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    #[test]
    fn day_kind_detects_sunday_saturday_and_holiday() {
        let sunday = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();

        assert_eq!(DayKind::of(sunday, false), DayKind::SundayOrHoliday);
        assert_eq!(DayKind::of(monday, false), DayKind::Weekday);
        assert_eq!(DayKind::of(monday, true), DayKind::SundayOrHoliday);
        assert_eq!(DayKind::of(saturday, false), DayKind::Saturday);
    }

    #[test]
    fn breaks_are_subtracted_once_even_when_overlapping() {
        let breaks = [
            BreakSpan { start: at(12, 0), end: Some(at(13, 0)) },
            BreakSpan { start: at(12, 30), end: Some(at(13, 15)) },
            BreakSpan { start: at(15, 0), end: Some(at(15, 15)) },
        ];
        // 08:00-18:00 = 600 min, breaks cover 75 + 15 min
        assert_eq!(net_worked_minutes(at(8, 0), at(18, 0), &breaks), 510);
    }

    #[test]
    fn open_break_runs_to_shift_end_and_outside_breaks_are_ignored() {
        let breaks = [
            BreakSpan { start: at(6, 0), end: Some(at(7, 0)) },
            BreakSpan { start: at(17, 0), end: None },
        ];
        assert_eq!(net_worked_minutes(at(8, 0), at(18, 0), &breaks), 540);
    }

    #[test]
    fn seconds_are_netted_before_rounding_down() {
        let hms = |h, m, s| Utc.with_ymd_and_hms(2026, 3, 2, h, m, s).unwrap();
        let breaks = [BreakSpan { start: hms(8, 10, 40), end: Some(hms(8, 20, 20)) }];
        // 30m30s on site less a 9m40s break is 20m50s
        assert_eq!(net_worked_minutes(hms(8, 0, 0), hms(8, 30, 30), &breaks), 20);
    }

    #[test]
    fn scan_debounce_boundary() {
        let entry = at(8, 0);
        let cases = [(0, true), (59, true), (60, false), (61, false), (3600, false)];
        for (elapsed, blocked) in cases {
            let now = entry + chrono::Duration::seconds(elapsed);
            assert_eq!(within_scan_debounce(entry, now, 60), blocked, "elapsed {elapsed}s");
        }
        assert!(!within_scan_debounce(entry, entry, 0));
    }

    #[test]
    fn overlong_shift_is_detected() {
        let entry = at(8, 0);
        let hours = |h: i64| entry + chrono::Duration::hours(h);
        assert!(!exceeds_max_shift(entry, hours(24), 24));
        assert!(exceeds_max_shift(entry, hours(24) + chrono::Duration::seconds(1), 24));
        assert!(exceeds_max_shift(entry, hours(42 * 24), 24));
        assert!(!exceeds_max_shift(entry, hours(10), 12));
    }

    #[test]
    fn inverted_shift_counts_as_zero() {
        assert_eq!(net_worked_minutes(at(18, 0), at(8, 0), &[]), 0);
        assert_eq!(net_worked_minutes(at(8, 0), at(8, 0), &[]), 0);
    }

    #[test]
    fn weekday_hours_split_into_normal_and_overtime() {
        let policy = PayPolicy::default();
        let hours = classify(10 * 60 + 30, DayKind::Weekday, &policy);
        assert_eq!(hours.worked, dec!(10.5));
        assert_eq!(hours.normal, dec!(8));
        assert_eq!(hours.ot, dec!(2.5));
        assert_eq!(hours.sunday, Decimal::ZERO);
    }

    #[test]
    fn saturday_uses_shorter_normal_day() {
        let policy = PayPolicy::default();
        let hours = classify(7 * 60, DayKind::Saturday, &policy);
        assert_eq!(hours.normal, dec!(5));
        assert_eq!(hours.ot, dec!(2));
    }

    #[test]
    fn sunday_hours_are_all_premium() {
        let policy = PayPolicy::default();
        let hours = classify(9 * 60, DayKind::SundayOrHoliday, &policy);
        assert_eq!(hours.sunday, dec!(9));
        assert_eq!(hours.normal, Decimal::ZERO);
        assert_eq!(hours.ot, Decimal::ZERO);
    }

    #[test]
    fn short_shift_has_no_overtime() {
        let hours = classify(200, DayKind::Weekday, &PayPolicy::default());
        assert_eq!(hours.worked, dec!(3.33));
        assert_eq!(hours.normal, dec!(3.33));
        assert_eq!(hours.ot, Decimal::ZERO);
    }
}
