use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::rules::hours::BreakSpan;

pub const SHIFT_COLUMNS: &str = "id, worker_id, site_id, shift_date, entry_time, leave_time, \
    entry_latitude, entry_longitude, leave_latitude, leave_longitude, worked_hours, \
    normal_hours, ot_hours, sunday_hours, leave_type, leave_request_id, created_at";

/// A worked shift, or a leave marker when `leave_type` is set.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Shift {
    pub id: u64,
    pub worker_id: u64,
    pub site_id: Option<u64>,
    pub shift_date: NaiveDate,
    pub entry_time: Option<DateTime<Utc>>,
    pub leave_time: Option<DateTime<Utc>>,
    pub entry_latitude: Option<f64>,
    pub entry_longitude: Option<f64>,
    pub leave_latitude: Option<f64>,
    pub leave_longitude: Option<f64>,
    pub worked_hours: Decimal,
    pub normal_hours: Decimal,
    pub ot_hours: Decimal,
    pub sunday_hours: Decimal,
    #[schema(example = "annual", nullable = true)]
    pub leave_type: Option<String>,
    pub leave_request_id: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl Shift {
    pub fn is_leave_marker(&self) -> bool {
        self.leave_type.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Break {
    pub id: u64,
    pub shift_id: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl From<&Break> for BreakSpan {
    fn from(b: &Break) -> Self {
        BreakSpan {
            start: b.start_time,
            end: b.end_time,
        }
    }
}
