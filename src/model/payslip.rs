use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const PAYSLIP_COLUMNS: &str = "id, worker_id, year, month, days_worked, normal_hours, ot_hours, \
    ot_hours_excess, sunday_hours, paid_leave_days, unpaid_leave_days, hourly_rate, basic_pay, \
    ot_pay, sun_ph_pay, allowances, gross_pay, cpf_employee, cpf_employer, sinda, sdl, \
    other_deductions, total_deductions, net_pay, employer_cost, remarks, generated_by, generated_at";

/// Stored monthly payslip totals.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PayslipRecord {
    pub id: u64,
    pub worker_id: u64,
    pub year: u16,
    pub month: u8,
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
    pub remarks: Option<String>,
    pub generated_by: Option<u64>,
    pub generated_at: DateTime<Utc>,
}
