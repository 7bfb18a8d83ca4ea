//! Attendance, leave and payroll rules.
//!
//! Everything in here is pure: handlers load rows, hand them to these
//! functions and persist whatever comes back.

pub mod cpf;
pub mod geo;
pub mod hours;
pub mod leave;
pub mod levy;
pub mod payslip;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Company pay policy knobs, loaded from configuration.
#[derive(Debug, Clone)]
pub struct PayPolicy {
    pub normal_hours_weekday: Decimal,
    pub normal_hours_saturday: Decimal,
    pub ot_multiplier: Decimal,
    pub sun_ph_multiplier: Decimal,
    pub monthly_ot_cap_hours: Decimal,
    pub cpf_ow_ceiling: Decimal,
}

impl Default for PayPolicy {
    fn default() -> Self {
        Self {
            normal_hours_weekday: dec!(8),
            normal_hours_saturday: dec!(5),
            ot_multiplier: dec!(1.5),
            sun_ph_multiplier: dec!(2.0),
            monthly_ot_cap_hours: dec!(72),
            cpf_ow_ceiling: dec!(8000),
        }
    }
}

/// Money and hours are kept to cents, half away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
