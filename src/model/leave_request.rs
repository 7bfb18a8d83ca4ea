use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::rules::leave::{LeaveStatus, LeaveType};

pub const LEAVE_COLUMNS: &str = "id, worker_id, leave_type, start_date, end_date, half_day, days, \
    status, reason, reviewed_by, reviewed_at, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequest {
    pub id: u64,
    pub worker_id: u64,
    #[schema(example = "annual")]
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub half_day: bool,
    /// Chargeable days (Sundays and public holidays excluded)
    pub days: Decimal,
    #[schema(example = "pending")]
    pub status: String,
    pub reason: Option<String>,
    pub reviewed_by: Option<u64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LeaveRequest {
    pub fn kind(&self) -> Result<LeaveType, AppError> {
        self.leave_type
            .parse()
            .map_err(|_| AppError::Internal(format!("leave {} has unknown type {:?}", self.id, self.leave_type)))
    }

    pub fn state(&self) -> Result<LeaveStatus, AppError> {
        self.status
            .parse()
            .map_err(|_| AppError::Internal(format!("leave {} has unknown status {:?}", self.id, self.status)))
    }
}
