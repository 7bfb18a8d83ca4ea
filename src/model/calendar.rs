use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PublicHoliday {
    pub holiday_date: NaiveDate,
    #[schema(example = "National Day")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct WorkingDays {
    pub year: u16,
    pub month: u8,
    #[schema(example = "26")]
    pub working_days: Decimal,
}
