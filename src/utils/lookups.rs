//! Small queries shared by the attendance, leave and payroll handlers.

use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, MySql};

use crate::errors::AppError;
use crate::model::worker::{WORKER_COLUMNS, Worker};

pub async fn holidays_between<'e, E>(
    executor: E,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<HashSet<NaiveDate>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let rows = sqlx::query_scalar::<_, NaiveDate>(
        "SELECT holiday_date FROM public_holidays WHERE holiday_date BETWEEN ? AND ?",
    )
    .bind(from)
    .bind(to)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().collect())
}

pub async fn is_holiday<'e, E>(executor: E, date: NaiveDate) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM public_holidays WHERE holiday_date = ?",
    )
    .bind(date)
    .fetch_one(executor)
    .await?;
    Ok(count > 0)
}

/// Configured working days for the month, if an admin set one.
pub async fn configured_working_days<'e, E>(
    executor: E,
    year: i32,
    month: u32,
) -> Result<Option<Decimal>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_scalar::<_, Decimal>(
        "SELECT working_days FROM working_days_config WHERE year = ? AND month = ?",
    )
    .bind(year)
    .bind(month)
    .fetch_optional(executor)
    .await
}

pub async fn fetch_worker<'e, E>(executor: E, worker_id: u64) -> Result<Worker, AppError>
where
    E: Executor<'e, Database = MySql>,
{
    let sql = format!("SELECT {WORKER_COLUMNS} FROM workers WHERE id = ?");
    sqlx::query_as::<_, Worker>(&sql)
        .bind(worker_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found("Worker not found"))
}

/// Row-locks the worker for the rest of the transaction. Every write that
/// touches a worker's shifts, breaks or leave balances takes this lock
/// first, which serialises concurrent scans and approvals.
pub async fn lock_worker<'e, E>(executor: E, worker_id: u64) -> Result<Worker, AppError>
where
    E: Executor<'e, Database = MySql>,
{
    let sql = format!("SELECT {WORKER_COLUMNS} FROM workers WHERE id = ? FOR UPDATE");
    sqlx::query_as::<_, Worker>(&sql)
        .bind(worker_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found("Worker not found"))
}
