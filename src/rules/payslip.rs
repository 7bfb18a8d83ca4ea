use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::{PayPolicy, cpf, levy, round2};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayBasis {
    /// `base_rate` is the monthly basic salary.
    Monthly,
    /// `base_rate` is the daily rate.
    Daily,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Residency {
    Citizen,
    Pr,
    Foreign,
}

impl Residency {
    /// Citizens and PRs pay CPF.
    pub fn is_local(self) -> bool {
        !matches!(self, Residency::Foreign)
    }
}

#[derive(Debug, Clone)]
pub struct PayProfile {
    pub pay_basis: PayBasis,
    pub base_rate: Decimal,
    pub fixed_allowance: Decimal,
    pub residency: Residency,
    pub date_of_birth: Option<NaiveDate>,
    pub sinda_contributor: bool,
}

/// Timesheet and leave totals for one worker and one month.
#[derive(Debug, Clone, Default)]
pub struct MonthTotals {
    pub days_worked: u32,
    pub normal_hours: Decimal,
    pub ot_hours: Decimal,
    pub sunday_hours: Decimal,
    pub paid_leave_days: Decimal,
    pub unpaid_leave_days: Decimal,
}

#[derive(Debug, Clone)]
pub struct PayslipInputs {
    pub year: i32,
    pub month: u32,
    pub profile: PayProfile,
    pub totals: MonthTotals,
    pub working_days: Decimal,
    pub allowances: Decimal,
    pub other_deductions: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PayslipBreakdown {
    pub days_worked: u32,
    pub normal_hours: Decimal,
    pub ot_hours: Decimal,
    pub ot_hours_excess: Decimal,
    pub sunday_hours: Decimal,
    pub paid_leave_days: Decimal,
    pub unpaid_leave_days: Decimal,
    pub hourly_rate: Decimal,
    pub basic_pay: Decimal,
    pub ot_pay: Decimal,
    pub sun_ph_pay: Decimal,
    pub allowances: Decimal,
    pub gross_pay: Decimal,
    pub cpf_employee: Decimal,
    pub cpf_employer: Decimal,
    pub sinda: Decimal,
    pub sdl: Decimal,
    pub other_deductions: Decimal,
    pub total_deductions: Decimal,
    pub net_pay: Decimal,
    pub employer_cost: Decimal,
}

/// Hourly rate used for OT and Sun/PH pay.
///
/// Monthly-rated: `12 x basic / (52 x 44)`. Daily-rated: the daily rate
/// spread over a normal weekday.
pub fn hourly_rate(profile: &PayProfile, policy: &PayPolicy) -> Decimal {
    let rate = match profile.pay_basis {
        PayBasis::Monthly => profile.base_rate * Decimal::from(12) / Decimal::from(52 * 44),
        PayBasis::Daily if policy.normal_hours_weekday > Decimal::ZERO => {
            profile.base_rate / policy.normal_hours_weekday
        }
        PayBasis::Daily => Decimal::ZERO,
    };
    rate.round_dp(4)
}

/// Days of the month that are neither Sundays nor public holidays.
pub fn default_working_days(year: i32, month: u32, holidays: &HashSet<NaiveDate>) -> Decimal {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Decimal::ZERO;
    };
    let count = first
        .iter_days()
        .take_while(|d| d.month() == month)
        .filter(|d| d.weekday() != Weekday::Sun && !holidays.contains(d))
        .count();
    Decimal::from(count as u64)
}

pub fn compute(inputs: &PayslipInputs, policy: &PayPolicy) -> PayslipBreakdown {
    let profile = &inputs.profile;
    let totals = &inputs.totals;
    let hourly = hourly_rate(profile, policy);

    let basic_pay = match profile.pay_basis {
        PayBasis::Monthly => {
            let deduction = if inputs.working_days > Decimal::ZERO {
                profile.base_rate * totals.unpaid_leave_days.min(inputs.working_days) / inputs.working_days
            } else {
                Decimal::ZERO
            };
            (profile.base_rate - deduction).max(Decimal::ZERO)
        }
        PayBasis::Daily => totals.normal_hours * hourly + totals.paid_leave_days * profile.base_rate,
    };
    let basic_pay = round2(basic_pay);

    let ot_paid = totals.ot_hours.min(policy.monthly_ot_cap_hours);
    let ot_excess = totals.ot_hours - ot_paid;
    if ot_excess > Decimal::ZERO {
        tracing::warn!(
            year = inputs.year,
            month = inputs.month,
            ot_hours = %totals.ot_hours,
            cap = %policy.monthly_ot_cap_hours,
            "Overtime above monthly cap is not paid"
        );
    }
    let ot_pay = round2(ot_paid * hourly * policy.ot_multiplier);
    let sun_ph_pay = round2(totals.sunday_hours * hourly * policy.sun_ph_multiplier);
    let allowances = round2(profile.fixed_allowance + inputs.allowances);
    let gross_pay = basic_pay + ot_pay + sun_ph_pay + allowances;

    let cpf = if profile.residency.is_local() {
        let age = match profile.date_of_birth {
            Some(dob) => cpf::contribution_age(dob, inputs.year, inputs.month),
            None => {
                tracing::warn!("Local worker without date of birth; using the youngest CPF bracket");
                0
            }
        };
        cpf::contribution(gross_pay, age, policy.cpf_ow_ceiling)
    } else {
        cpf::CpfContribution::default()
    };

    let sinda = if profile.sinda_contributor {
        levy::sinda(gross_pay)
    } else {
        Decimal::ZERO
    };
    let sdl = levy::sdl(gross_pay);
    let other_deductions = round2(inputs.other_deductions);
    let total_deductions = cpf.employee + sinda + other_deductions;

    PayslipBreakdown {
        days_worked: totals.days_worked,
        normal_hours: totals.normal_hours,
        ot_hours: ot_paid,
        ot_hours_excess: ot_excess,
        sunday_hours: totals.sunday_hours,
        paid_leave_days: totals.paid_leave_days,
        unpaid_leave_days: totals.unpaid_leave_days,
        hourly_rate: hourly,
        basic_pay,
        ot_pay,
        sun_ph_pay,
        allowances,
        gross_pay,
        cpf_employee: cpf.employee,
        cpf_employer: cpf.employer,
        sinda,
        sdl,
        other_deductions,
        total_deductions,
        net_pay: gross_pay - total_deductions,
        employer_cost: gross_pay + cpf.employer + sdl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn monthly_citizen() -> PayProfile {
        PayProfile {
            pay_basis: PayBasis::Monthly,
            base_rate: dec!(3000),
            fixed_allowance: dec!(200),
            residency: Residency::Citizen,
            date_of_birth: NaiveDate::from_ymd_opt(1986, 1, 10),
            sinda_contributor: true,
        }
    }

    #[test]
    fn monthly_local_worker_payslip() {
        let inputs = PayslipInputs {
            year: 2026,
            month: 3,
            profile: monthly_citizen(),
            totals: MonthTotals {
                days_worked: 24,
                normal_hours: dec!(190),
                ot_hours: dec!(10),
                sunday_hours: dec!(8),
                paid_leave_days: Decimal::ZERO,
                unpaid_leave_days: dec!(1),
            },
            working_days: dec!(26),
            allowances: dec!(100),
            other_deductions: dec!(50),
        };

        let slip = compute(&inputs, &PayPolicy::default());
        assert_eq!(slip.hourly_rate, dec!(15.7343));
        assert_eq!(slip.basic_pay, dec!(2884.62));
        assert_eq!(slip.ot_pay, dec!(236.01));
        assert_eq!(slip.sun_ph_pay, dec!(251.75));
        assert_eq!(slip.allowances, dec!(300));
        assert_eq!(slip.gross_pay, dec!(3672.38));
        assert_eq!(slip.cpf_employee, dec!(734));
        assert_eq!(slip.cpf_employer, dec!(625));
        assert_eq!(slip.sinda, dec!(7));
        assert_eq!(slip.sdl, dec!(9.18));
        assert_eq!(slip.total_deductions, dec!(791));
        assert_eq!(slip.net_pay, dec!(2881.38));
        assert_eq!(slip.employer_cost, dec!(4306.56));
    }

    #[test]
    fn daily_foreign_worker_with_overtime_above_cap() {
        let inputs = PayslipInputs {
            year: 2026,
            month: 3,
            profile: PayProfile {
                pay_basis: PayBasis::Daily,
                base_rate: dec!(80),
                fixed_allowance: Decimal::ZERO,
                residency: Residency::Foreign,
                date_of_birth: None,
                sinda_contributor: false,
            },
            totals: MonthTotals {
                days_worked: 20,
                normal_hours: dec!(160),
                ot_hours: dec!(90),
                sunday_hours: Decimal::ZERO,
                paid_leave_days: dec!(1),
                unpaid_leave_days: Decimal::ZERO,
            },
            working_days: dec!(26),
            allowances: Decimal::ZERO,
            other_deductions: Decimal::ZERO,
        };

        let slip = compute(&inputs, &PayPolicy::default());
        assert_eq!(slip.hourly_rate, dec!(10));
        assert_eq!(slip.basic_pay, dec!(1680));
        assert_eq!(slip.ot_hours, dec!(72));
        assert_eq!(slip.ot_hours_excess, dec!(18));
        assert_eq!(slip.ot_pay, dec!(1080));
        assert_eq!(slip.gross_pay, dec!(2760));
        assert_eq!(slip.cpf_employee, Decimal::ZERO);
        assert_eq!(slip.cpf_employer, Decimal::ZERO);
        assert_eq!(slip.sdl, dec!(6.90));
        assert_eq!(slip.net_pay, dec!(2760));
        assert_eq!(slip.employer_cost, dec!(2766.90));
    }

    #[test]
    fn unpaid_leave_never_drives_basic_negative() {
        let inputs = PayslipInputs {
            year: 2026,
            month: 3,
            profile: monthly_citizen(),
            totals: MonthTotals {
                unpaid_leave_days: dec!(40),
                ..MonthTotals::default()
            },
            working_days: dec!(26),
            allowances: Decimal::ZERO,
            other_deductions: Decimal::ZERO,
        };
        let slip = compute(&inputs, &PayPolicy::default());
        assert_eq!(slip.basic_pay, Decimal::ZERO);
    }

    #[test]
    fn working_days_skip_sundays_and_holidays() {
        // March 2026 has five Sundays
        assert_eq!(default_working_days(2026, 3, &HashSet::new()), dec!(26));
        let holidays: HashSet<_> = NaiveDate::from_ymd_opt(2026, 3, 20).into_iter().collect();
        assert_eq!(default_working_days(2026, 3, &holidays), dec!(25));
        assert_eq!(default_working_days(2026, 13, &HashSet::new()), Decimal::ZERO);
    }
}
