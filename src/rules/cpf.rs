//! Central Provident Fund contributions for citizens and permanent
//! residents.
//!
//! Rates follow the 2025 schedule. Wages are treated as ordinary wages and
//! capped at the configured monthly ceiling.

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RateRow {
    max_age: Option<u32>,
    employer: Decimal,
    employee: Decimal,
    /// Employee share multiplier for wages between $500 and $750.
    phase_in: Decimal,
}

const RATE_TABLE: [RateRow; 5] = [
    RateRow { max_age: Some(55), employer: dec!(0.17), employee: dec!(0.20), phase_in: dec!(0.60) },
    RateRow { max_age: Some(60), employer: dec!(0.155), employee: dec!(0.17), phase_in: dec!(0.51) },
    RateRow { max_age: Some(65), employer: dec!(0.12), employee: dec!(0.115), phase_in: dec!(0.345) },
    RateRow { max_age: Some(70), employer: dec!(0.09), employee: dec!(0.075), phase_in: dec!(0.225) },
    RateRow { max_age: None, employer: dec!(0.075), employee: dec!(0.05), phase_in: dec!(0.15) },
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct CpfContribution {
    pub employee: Decimal,
    pub employer: Decimal,
    pub total: Decimal,
}

/// Age used for the contribution month. A birthday changes the rate only
/// from the month after it, so this is the age on the last day of the
/// previous month.
pub fn contribution_age(date_of_birth: NaiveDate, year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let Some(reference) = first.pred_opt() else {
        return 0;
    };

    let mut age = reference.year() - date_of_birth.year();
    if (reference.month(), reference.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

fn rates_for(age: u32) -> RateRow {
    RATE_TABLE
        .iter()
        .copied()
        .find(|row| row.max_age.is_none_or(|max| age <= max))
        .unwrap_or(RATE_TABLE[RATE_TABLE.len() - 1])
}

/// Contribution on a month's total wages.
pub fn contribution(wages: Decimal, age: u32, ceiling: Decimal) -> CpfContribution {
    let wages = wages.min(ceiling);
    if wages <= dec!(50) {
        return CpfContribution::default();
    }

    let rates = rates_for(age);
    let (total, employee) = if wages <= dec!(500) {
        (wages * rates.employer, Decimal::ZERO)
    } else if wages <= dec!(750) {
        let phased = rates.phase_in * (wages - dec!(500));
        (wages * rates.employer + phased, phased)
    } else {
        (wages * (rates.employer + rates.employee), wages * rates.employee)
    };

    let total = total.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let employee = employee.trunc().min(total);
    CpfContribution {
        employee,
        employer: total - employee,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CEILING: Decimal = dec!(8000);

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn age_changes_the_month_after_the_birthday() {
        let dob = d(1971, 6, 15);
        assert_eq!(contribution_age(dob, 2026, 6), 54);
        assert_eq!(contribution_age(dob, 2026, 7), 55);
        // born on the first: birthday month still uses the old age
        let dob = d(1971, 6, 1);
        assert_eq!(contribution_age(dob, 2026, 6), 54);
        assert_eq!(contribution_age(dob, 2026, 7), 55);
    }

    #[test]
    fn tiny_wages_attract_nothing() {
        assert_eq!(contribution(dec!(50), 30, CEILING), CpfContribution::default());
    }

    #[test]
    fn employer_only_band() {
        let c = contribution(dec!(400), 30, CEILING);
        assert_eq!(c.total, dec!(68));
        assert_eq!(c.employee, Decimal::ZERO);
        assert_eq!(c.employer, dec!(68));
    }

    #[test]
    fn phase_in_band() {
        // 0.17 * 600 + 0.6 * 100 = 102 + 60
        let c = contribution(dec!(600), 30, CEILING);
        assert_eq!(c.total, dec!(162));
        assert_eq!(c.employee, dec!(60));
        assert_eq!(c.employer, dec!(102));
    }

    #[test]
    fn full_rate_with_rounding() {
        // total 0.37 * 2345.67 = 867.8979 -> 868, employee 469.134 -> 469
        let c = contribution(dec!(2345.67), 40, CEILING);
        assert_eq!(c.total, dec!(868));
        assert_eq!(c.employee, dec!(469));
        assert_eq!(c.employer, dec!(399));
    }

    #[test]
    fn older_workers_use_lower_rates() {
        // 56 years: 0.325 * 3000 = 975, employee 510
        let c = contribution(dec!(3000), 56, CEILING);
        assert_eq!(c.total, dec!(975));
        assert_eq!(c.employee, dec!(510));

        // 72 years: 0.125 * 3000 = 375, employee 150
        let c = contribution(dec!(3000), 72, CEILING);
        assert_eq!(c.total, dec!(375));
        assert_eq!(c.employee, dec!(150));
    }

    #[test]
    fn wages_are_capped_at_the_ceiling() {
        let capped = contribution(dec!(12000), 30, CEILING);
        let at_ceiling = contribution(CEILING, 30, CEILING);
        assert_eq!(capped, at_ceiling);
        assert_eq!(capped.total, dec!(2960));
        assert_eq!(capped.employee, dec!(1600));
    }
}
