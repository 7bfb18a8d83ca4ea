use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::rules::leave::LeaveBalances;
use crate::rules::payslip::{PayBasis, PayProfile, Residency};

pub const WORKER_COLUMNS: &str = "id, employee_id, full_name, residency, date_of_birth, \
    sinda_contributor, pay_basis, base_rate, fixed_allowance, annual_leave_balance, \
    medical_leave_balance, active, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_id": "W-0042",
        "full_name": "Ravi Kumar",
        "residency": "foreign",
        "date_of_birth": "1990-05-14",
        "sinda_contributor": false,
        "pay_basis": "daily",
        "base_rate": "80.00",
        "fixed_allowance": "0.00",
        "annual_leave_balance": "14.0",
        "medical_leave_balance": "14.0",
        "active": true,
        "created_at": "2026-01-01T00:00:00Z"
    })
)]
pub struct Worker {
    pub id: u64,
    pub employee_id: String,
    pub full_name: String,
    #[schema(example = "citizen")]
    pub residency: String,
    pub date_of_birth: Option<NaiveDate>,
    pub sinda_contributor: bool,
    #[schema(example = "monthly")]
    pub pay_basis: String,
    /// Monthly basic salary or daily rate, depending on `pay_basis`
    pub base_rate: Decimal,
    pub fixed_allowance: Decimal,
    pub annual_leave_balance: Decimal,
    pub medical_leave_balance: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Worker {
    pub fn pay_profile(&self) -> Result<PayProfile, AppError> {
        let pay_basis: PayBasis = self.pay_basis.parse().map_err(|_| {
            AppError::Internal(format!("worker {} has unknown pay_basis {:?}", self.id, self.pay_basis))
        })?;
        let residency: Residency = self.residency.parse().map_err(|_| {
            AppError::Internal(format!("worker {} has unknown residency {:?}", self.id, self.residency))
        })?;

        Ok(PayProfile {
            pay_basis,
            base_rate: self.base_rate,
            fixed_allowance: self.fixed_allowance,
            residency,
            date_of_birth: self.date_of_birth,
            sinda_contributor: self.sinda_contributor,
        })
    }

    pub fn balances(&self) -> LeaveBalances {
        LeaveBalances {
            annual: self.annual_leave_balance,
            medical: self.medical_leave_balance,
        }
    }
}
