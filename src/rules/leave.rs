use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Medical,
    Unpaid,
}

impl LeaveType {
    /// Annual and medical leave are paid and come out of a balance.
    pub fn draws_balance(self) -> bool {
        matches!(self, LeaveType::Annual | LeaveType::Medical)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LeaveError {
    #[error("start_date cannot be after end_date")]
    InvertedRange,
    #[error("half-day leave must start and end on the same day")]
    HalfDaySpansDays,
    #[error("leave covers no working days")]
    NoWorkingDays,
    #[error("insufficient {kind} leave balance: requested {requested}, available {available}")]
    InsufficientBalance {
        kind: LeaveType,
        requested: Decimal,
        available: Decimal,
    },
    #[error("cannot move leave from {from} to {to}")]
    InvalidTransition { from: LeaveStatus, to: LeaveStatus },
    #[error("worker already has a shift on {0}; correct the shift before approving leave for it")]
    WorkedOnLeaveDay(NaiveDate),
}

impl LeaveStatus {
    /// Checks a status change; returns whether a balance restore is due.
    pub fn transition(self, to: LeaveStatus) -> Result<bool, LeaveError> {
        use LeaveStatus::*;
        match (self, to) {
            (Pending, Approved) | (Pending, Rejected) | (Pending, Cancelled) => Ok(false),
            (Approved, Cancelled) => Ok(true),
            (from, to) => Err(LeaveError::InvalidTransition { from, to }),
        }
    }
}

/// Dates in `[start, end]` that cost a leave day: Sundays and public
/// holidays are skipped.
pub fn chargeable_dates(start: NaiveDate, end: NaiveDate, holidays: &HashSet<NaiveDate>) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| d.weekday() != Weekday::Sun && !holidays.contains(d))
        .collect()
}

pub fn count_days(
    start: NaiveDate,
    end: NaiveDate,
    half_day: bool,
    holidays: &HashSet<NaiveDate>,
) -> Result<Decimal, LeaveError> {
    if start > end {
        return Err(LeaveError::InvertedRange);
    }
    if half_day && start != end {
        return Err(LeaveError::HalfDaySpansDays);
    }

    let full_days = chargeable_dates(start, end, holidays).len();
    let days = if half_day && full_days == 1 {
        dec!(0.5)
    } else {
        Decimal::from(full_days as u64)
    };
    Ok(days)
}

/// What approving a leave costs under the calendar at approval time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveCharge {
    pub dates: Vec<NaiveDate>,
    pub days: Decimal,
}

pub fn charge_for(
    start: NaiveDate,
    end: NaiveDate,
    half_day: bool,
    holidays: &HashSet<NaiveDate>,
) -> Result<LeaveCharge, LeaveError> {
    let days = count_days(start, end, half_day, holidays)?;
    if days.is_zero() {
        return Err(LeaveError::NoWorkingDays);
    }
    Ok(LeaveCharge {
        dates: chargeable_dates(start, end, holidays),
        days,
    })
}

/// Refuses leave on a date the worker already has a shift for.
pub fn ensure_not_worked(dates: &[NaiveDate], worked: &HashSet<NaiveDate>) -> Result<(), LeaveError> {
    match dates.iter().find(|d| worked.contains(d)) {
        Some(date) => Err(LeaveError::WorkedOnLeaveDay(*date)),
        None => Ok(()),
    }
}

/// Chargeable days of a leave range that fall in the given month.
pub fn days_within_month(
    start: NaiveDate,
    end: NaiveDate,
    half_day: bool,
    year: i32,
    month: u32,
    holidays: &HashSet<NaiveDate>,
) -> Decimal {
    let in_month = chargeable_dates(start, end, holidays)
        .into_iter()
        .filter(|d| d.year() == year && d.month() == month)
        .count();

    if half_day && in_month == 1 {
        dec!(0.5)
    } else {
        Decimal::from(in_month as u64)
    }
}

pub fn ranges_overlap(a: (NaiveDate, NaiveDate), b: (NaiveDate, NaiveDate)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveBalances {
    pub annual: Decimal,
    pub medical: Decimal,
}

impl LeaveBalances {
    fn slot(&mut self, kind: LeaveType) -> Option<&mut Decimal> {
        match kind {
            LeaveType::Annual => Some(&mut self.annual),
            LeaveType::Medical => Some(&mut self.medical),
            LeaveType::Unpaid => None,
        }
    }

    pub fn ensure_available(&self, kind: LeaveType, days: Decimal) -> Result<(), LeaveError> {
        let mut copy = *self;
        copy.deduct(kind, days)
    }

    pub fn deduct(&mut self, kind: LeaveType, days: Decimal) -> Result<(), LeaveError> {
        if let Some(balance) = self.slot(kind) {
            if *balance < days {
                return Err(LeaveError::InsufficientBalance {
                    kind,
                    requested: days,
                    available: *balance,
                });
            }
            *balance -= days;
        }
        Ok(())
    }

    pub fn restore(&mut self, kind: LeaveType, days: Decimal) {
        if let Some(balance) = self.slot(kind) {
            *balance += days;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn sundays_and_holidays_are_not_charged() {
        // Fri 2026-04-03 (Good Friday) .. Tue 2026-04-07
        let holidays: HashSet<_> = [d(2026, 4, 3)].into_iter().collect();
        let dates = chargeable_dates(d(2026, 4, 3), d(2026, 4, 7), &holidays);
        assert_eq!(dates, vec![d(2026, 4, 4), d(2026, 4, 6), d(2026, 4, 7)]);
        assert_eq!(
            count_days(d(2026, 4, 3), d(2026, 4, 7), false, &holidays),
            Ok(dec!(3))
        );
    }

    #[test]
    fn charge_follows_the_calendar_at_approval() {
        // Mon 2026-04-06 .. Wed 2026-04-08 was three days when requested
        let none = HashSet::new();
        let before = charge_for(d(2026, 4, 6), d(2026, 4, 8), false, &none).unwrap();
        assert_eq!(before.days, dec!(3));

        let holidays: HashSet<_> = [d(2026, 4, 7)].into_iter().collect();
        let after = charge_for(d(2026, 4, 6), d(2026, 4, 8), false, &holidays).unwrap();
        assert_eq!(after.days, dec!(2));
        assert_eq!(after.dates, vec![d(2026, 4, 6), d(2026, 4, 8)]);
        assert_eq!(Decimal::from(after.dates.len() as u64), after.days);

        let half = charge_for(d(2026, 4, 6), d(2026, 4, 6), true, &none).unwrap();
        assert_eq!((half.days, half.dates.len()), (dec!(0.5), 1));
    }

    #[test]
    fn charge_refuses_a_range_the_calendar_now_covers() {
        let holidays: HashSet<_> = [d(2026, 4, 6)].into_iter().collect();
        assert_eq!(
            charge_for(d(2026, 4, 6), d(2026, 4, 6), false, &holidays),
            Err(LeaveError::NoWorkingDays)
        );
    }

    #[test]
    fn leave_cannot_cover_a_worked_date() {
        let dates = [d(2026, 4, 6), d(2026, 4, 7), d(2026, 4, 8)];
        let worked: HashSet<_> = [d(2026, 4, 2), d(2026, 4, 7)].into_iter().collect();
        assert_eq!(
            ensure_not_worked(&dates, &worked),
            Err(LeaveError::WorkedOnLeaveDay(d(2026, 4, 7)))
        );
        assert_eq!(ensure_not_worked(&dates, &HashSet::new()), Ok(()));
    }

    #[test]
    fn half_day_rules() {
        let none = HashSet::new();
        assert_eq!(count_days(d(2026, 4, 6), d(2026, 4, 6), true, &none), Ok(dec!(0.5)));
        assert_eq!(
            count_days(d(2026, 4, 6), d(2026, 4, 7), true, &none),
            Err(LeaveError::HalfDaySpansDays)
        );
        // half day on a Sunday costs nothing
        assert_eq!(count_days(d(2026, 4, 5), d(2026, 4, 5), true, &none), Ok(Decimal::ZERO));
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert_eq!(
            count_days(d(2026, 4, 7), d(2026, 4, 6), false, &HashSet::new()),
            Err(LeaveError::InvertedRange)
        );
    }

    #[test]
    fn month_split_counts_only_days_inside_the_month() {
        let none = HashSet::new();
        // Thu 2026-04-30 .. Sat 2026-05-02
        assert_eq!(days_within_month(d(2026, 4, 30), d(2026, 5, 2), false, 2026, 4, &none), dec!(1));
        assert_eq!(days_within_month(d(2026, 4, 30), d(2026, 5, 2), false, 2026, 5, &none), dec!(2));
    }

    #[test]
    fn deduct_and_restore_balances() {
        let mut balances = LeaveBalances { annual: dec!(5), medical: dec!(2) };
        balances.deduct(LeaveType::Annual, dec!(3.5)).unwrap();
        assert_eq!(balances.annual, dec!(1.5));

        let err = balances.deduct(LeaveType::Medical, dec!(3)).unwrap_err();
        assert!(matches!(err, LeaveError::InsufficientBalance { kind: LeaveType::Medical, .. }));
        assert_eq!(balances.medical, dec!(2));

        balances.deduct(LeaveType::Unpaid, dec!(30)).unwrap();
        balances.restore(LeaveType::Annual, dec!(3.5));
        assert_eq!(balances, LeaveBalances { annual: dec!(5), medical: dec!(2) });
    }

    #[test]
    fn status_transitions() {
        assert_eq!(LeaveStatus::Pending.transition(LeaveStatus::Approved), Ok(false));
        assert_eq!(LeaveStatus::Approved.transition(LeaveStatus::Cancelled), Ok(true));
        assert!(LeaveStatus::Rejected.transition(LeaveStatus::Approved).is_err());
        assert!(LeaveStatus::Approved.transition(LeaveStatus::Rejected).is_err());
    }

    #[test]
    fn overlap_is_inclusive() {
        assert!(ranges_overlap((d(2026, 1, 1), d(2026, 1, 3)), (d(2026, 1, 3), d(2026, 1, 5))));
        assert!(!ranges_overlap((d(2026, 1, 1), d(2026, 1, 2)), (d(2026, 1, 3), d(2026, 1, 5))));
    }

    #[test]
    fn leave_type_parses_from_column_text() {
        assert_eq!("annual".parse::<LeaveType>().unwrap(), LeaveType::Annual);
        assert_eq!(LeaveType::Medical.as_ref(), "medical");
        assert!(!LeaveType::Unpaid.draws_balance());
    }
}
