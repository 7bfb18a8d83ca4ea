use crate::{
    auth::auth::AuthUser,
    errors::AppError,
    model::leave_request::{LEAVE_COLUMNS, LeaveRequest},
    rules::leave::{
        LeaveError, LeaveStatus, LeaveType, charge_for, count_days, ensure_not_worked, ranges_overlap,
    },
    utils::{lookups, pagination::PageWindow},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use std::collections::HashSet;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-07", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub leave_type: LeaveType, // enum ensures Swagger dropdown
    /// Half a day; only for single-day requests
    #[serde(default)]
    pub half_day: bool,
    pub reason: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LeaveFilter {
    /// Filter by worker ID
    pub worker_id: Option<u64>,
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    /// Filter by leave type
    pub leave_type: Option<LeaveType>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    /// Pagination per page number
    pub per_page: Option<u32>,
}

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Str(String),
}

async fn fetch_leave(
    conn: &mut MySqlConnection,
    leave_id: u64,
    for_update: bool,
) -> Result<LeaveRequest, AppError> {
    let sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(leave_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Leave request not found"))
}

/// Loads the request, locks its worker, then re-reads the request under
/// that lock. Worker first, leave second, same order as every other writer.
async fn lock_leave(conn: &mut MySqlConnection, leave_id: u64) -> Result<LeaveRequest, AppError> {
    let peek = fetch_leave(&mut *conn, leave_id, false).await?;
    lookups::lock_worker(&mut *conn, peek.worker_id).await?;
    fetch_leave(&mut *conn, leave_id, true).await
}

async fn set_status(
    conn: &mut MySqlConnection,
    leave_id: u64,
    status: LeaveStatus,
    reviewer: u64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?, reviewed_by = ?, reviewed_at = NOW()
        WHERE id = ?
        "#,
    )
    .bind(status.as_ref())
    .bind(reviewer)
    .bind(leave_id)
    .execute(conn)
    .await
    .map(|_| ())
}

async fn save_balances(
    conn: &mut MySqlConnection,
    worker_id: u64,
    annual: Decimal,
    medical: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE workers SET annual_leave_balance = ?, medical_leave_balance = ? WHERE id = ?",
    )
    .bind(annual)
    .bind(medical)
    .bind(worker_id)
    .execute(conn)
    .await
    .map(|_| ())
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveRequest),
        (status = 400, description = "Invalid range, half-day misuse or no working days"),
        (status = 403, description = "No worker profile"),
        (status = 409, description = "Overlapping request or insufficient balance")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(name = "leave_create", skip(auth, pool, payload), fields(worker_id = auth.worker_id))]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, AppError> {
    let worker_id = auth.worker_id()?;
    let kind = payload.leave_type;

    let mut tx = pool.begin().await?;
    let worker = lookups::lock_worker(&mut *tx, worker_id).await?;

    let holidays = lookups::holidays_between(&mut *tx, payload.start_date, payload.end_date).await?;
    let days = count_days(payload.start_date, payload.end_date, payload.half_day, &holidays)?;
    if days.is_zero() {
        return Err(LeaveError::NoWorkingDays.into());
    }

    let active_ranges = sqlx::query_as::<_, (NaiveDate, NaiveDate)>(
        r#"
        SELECT start_date, end_date FROM leave_requests
        WHERE worker_id = ? AND status IN ('pending', 'approved')
        "#,
    )
    .bind(worker_id)
    .fetch_all(&mut *tx)
    .await?;
    let requested = (payload.start_date, payload.end_date);
    if active_ranges.into_iter().any(|r| ranges_overlap(r, requested)) {
        return Err(AppError::conflict("Overlaps an existing leave request"));
    }

    if kind.draws_balance() {
        // pending requests already spoken for
        let pending = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(days), 0) FROM leave_requests
            WHERE worker_id = ? AND leave_type = ? AND status = 'pending'
            "#,
        )
        .bind(worker_id)
        .bind(kind.as_ref())
        .fetch_one(&mut *tx)
        .await?;
        worker.balances().ensure_available(kind, days + pending)?;
    }

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (worker_id, leave_type, start_date, end_date, half_day, days, reason)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(worker_id)
    .bind(kind.as_ref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.half_day)
    .bind(days)
    .bind(payload.reason.as_deref().map(str::trim))
    .execute(&mut *tx)
    .await?;

    let leave = fetch_leave(&mut tx, result.last_insert_id(), false).await?;
    tx.commit().await?;

    info!(leave_id = leave.id, %days, leave_type = %kind, "Leave request submitted");
    Ok(HttpResponse::Created().json(leave))
}

/* =========================
Approve leave (Supervisor/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved, balance deducted", body = LeaveRequest),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Already processed, insufficient balance, a worked date in range or no working day left")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(name = "leave_approve", skip(auth, pool), fields(reviewer = auth.user_id))]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_supervisor_or_admin()?;
    let leave_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let leave = lock_leave(&mut tx, leave_id).await?;
    leave.state()?.transition(LeaveStatus::Approved)?;
    let kind = leave.kind()?;

    let holidays = lookups::holidays_between(&mut *tx, leave.start_date, leave.end_date).await?;
    let charge = charge_for(leave.start_date, leave.end_date, leave.half_day, &holidays)
        .map_err(|e| match e {
            LeaveError::NoWorkingDays => AppError::conflict("Leave no longer covers any working day"),
            e => e.into(),
        })?;

    let worked: HashSet<NaiveDate> = sqlx::query_scalar::<_, NaiveDate>(
        r#"
        SELECT DISTINCT shift_date FROM shifts
        WHERE worker_id = ? AND shift_date BETWEEN ? AND ?
          AND leave_type IS NULL AND entry_time IS NOT NULL
        "#,
    )
    .bind(leave.worker_id)
    .bind(leave.start_date)
    .bind(leave.end_date)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .collect();
    ensure_not_worked(&charge.dates, &worked)?;

    let worker = lookups::fetch_worker(&mut *tx, leave.worker_id).await?;
    let mut balances = worker.balances();
    balances.deduct(kind, charge.days)?;
    save_balances(&mut tx, worker.id, balances.annual, balances.medical).await?;

    if charge.days != leave.days {
        // calendar changed since the request
        sqlx::query("UPDATE leave_requests SET days = ? WHERE id = ?")
            .bind(charge.days)
            .bind(leave_id)
            .execute(&mut *tx)
            .await?;
        info!(leave_id, requested = %leave.days, charged = %charge.days, "Leave days recounted");
    }

    for &date in &charge.dates {
        sqlx::query(
            r#"
            INSERT INTO shifts (worker_id, shift_date, leave_type, leave_request_id)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(leave.worker_id)
        .bind(date)
        .bind(kind.as_ref())
        .bind(leave.id)
        .execute(&mut *tx)
        .await?;
    }

    set_status(&mut tx, leave_id, LeaveStatus::Approved, auth.user_id).await?;
    let updated = fetch_leave(&mut tx, leave_id, false).await?;
    tx.commit().await?;

    info!(leave_id, worker_id = leave.worker_id, days = %charge.days, "Leave approved");
    Ok(HttpResponse::Ok().json(updated))
}

/* =========================
Reject leave (Supervisor/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    responses(
        (status = 200, description = "Leave rejected", body = LeaveRequest),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already processed")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_supervisor_or_admin()?;
    let leave_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let leave = lock_leave(&mut tx, leave_id).await?;
    leave.state()?.transition(LeaveStatus::Rejected)?;

    set_status(&mut tx, leave_id, LeaveStatus::Rejected, auth.user_id).await?;
    let updated = fetch_leave(&mut tx, leave_id, false).await?;
    tx.commit().await?;

    info!(leave_id, reviewer = auth.user_id, "Leave rejected");
    Ok(HttpResponse::Ok().json(updated))
}

/* =========================
Cancel leave (owner while pending, staff any time)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/cancel",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to cancel")
    ),
    responses(
        (status = 200, description = "Leave cancelled; approved days restored", body = LeaveRequest),
        (status = 403, description = "Workers may only cancel their own pending requests"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request cannot be cancelled")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
#[instrument(name = "leave_cancel", skip(auth, pool), fields(user_id = auth.user_id))]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let leave_id = path.into_inner();

    let mut tx = pool.begin().await?;
    let leave = lock_leave(&mut tx, leave_id).await?;
    if !auth.can_view_worker(leave.worker_id) {
        return Err(AppError::not_found("Leave request not found"));
    }

    let status = leave.state()?;
    if auth.is_worker() && status != LeaveStatus::Pending {
        return Err(AppError::forbidden(
            "Approved leave can only be cancelled by a supervisor",
        ));
    }
    let restore = status.transition(LeaveStatus::Cancelled)?;

    if restore {
        let kind = leave.kind()?;
        let worker = lookups::fetch_worker(&mut *tx, leave.worker_id).await?;
        let mut balances = worker.balances();
        balances.restore(kind, leave.days);
        save_balances(&mut tx, worker.id, balances.annual, balances.medical).await?;

        let removed = sqlx::query("DELETE FROM shifts WHERE leave_request_id = ? AND leave_type IS NOT NULL")
            .bind(leave_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        info!(leave_id, markers = removed, days = %leave.days, "Approved leave cancelled, balance restored");
    }

    set_status(&mut tx, leave_id, LeaveStatus::Cancelled, auth.user_id).await?;
    let updated = fetch_leave(&mut tx, leave_id, false).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(updated))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let leave_id = path.into_inner();
    let mut conn = pool.acquire().await?;

    let leave = fetch_leave(&mut conn, leave_id, false).await?;
    if !auth.can_view_worker(leave.worker_id) {
        return Err(AppError::not_found("Leave request not found"));
    }
    Ok(HttpResponse::Ok().json(leave))
}

async fn query_leaves(
    pool: &MySqlPool,
    worker_id: Option<u64>,
    status: Option<LeaveStatus>,
    leave_type: Option<LeaveType>,
    window: PageWindow,
) -> Result<LeaveListResponse, AppError> {
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(worker_id) = worker_id {
        where_sql.push_str(" AND worker_id = ?");
        args.push(FilterValue::U64(worker_id));
    }
    if let Some(status) = status {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status.to_string()));
    }
    if let Some(kind) = leave_type {
        where_sql.push_str(" AND leave_type = ?");
        args.push(FilterValue::Str(kind.to_string()));
    }

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(s.as_str()),
        };
    }
    let total = count_q.fetch_one(pool).await?;

    let data_sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        where_sql
    );
    let mut data_q = sqlx::query_as::<_, LeaveRequest>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }
    let data = data_q
        .bind(window.per_page)
        .bind(window.offset)
        .fetch_all(pool)
        .await?;

    Ok(LeaveListResponse {
        data,
        page: window.page,
        per_page: window.per_page,
        total,
    })
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> Result<HttpResponse, AppError> {
    auth.require_supervisor_or_admin()?;

    let window = PageWindow::new(query.page, query.per_page, 10);
    let response = query_leaves(
        pool.get_ref(),
        query.worker_id,
        query.status,
        query.leave_type,
        window,
    )
    .await?;

    Ok(HttpResponse::Ok().json(response))
}

/// The caller's own leave requests
#[utoipa::path(
    get,
    path = "/api/leave/me",
    params(LeaveFilter),
    responses((status = 200, description = "Paginated leave list", body = LeaveListResponse)),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn my_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> Result<HttpResponse, AppError> {
    let worker_id = auth.worker_id()?;

    let window = PageWindow::new(query.page, query.per_page, 10);
    let response = query_leaves(
        pool.get_ref(),
        Some(worker_id),
        query.status,
        query.leave_type,
        window,
    )
    .await?;

    Ok(HttpResponse::Ok().json(response))
}
