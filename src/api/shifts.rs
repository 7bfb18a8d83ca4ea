use crate::{
    api::attendance::{
        close_open_breaks, compute_shift_hours, fetch_breaks, fetch_shift, store_shift_hours,
    },
    auth::auth::AuthUser,
    config::Config,
    errors::AppError,
    model::shift::{Break, SHIFT_COLUMNS, Shift},
    rules::hours::{ShiftHours, exceeds_max_shift},
    utils::{lookups, pagination::PageWindow},
};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ShiftFilter {
    pub worker_id: Option<u64>,
    pub site_id: Option<u64>,
    /// Earliest shift date (inclusive)
    pub from: Option<NaiveDate>,
    /// Latest shift date (inclusive)
    pub to: Option<NaiveDate>,
    /// Only shifts still waiting for a clock-out
    pub open_only: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct ShiftListResponse {
    pub data: Vec<Shift>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct ShiftDetail {
    #[serde(flatten)]
    pub shift: Shift,
    pub breaks: Vec<Break>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateShiftTimes {
    pub entry_time: Option<DateTime<Utc>>,
    pub leave_time: Option<DateTime<Utc>>,
}

enum FilterValue {
    U64(u64),
    Date(NaiveDate),
}

/// Shift review list for supervisors and admins
#[utoipa::path(
    get,
    path = "/api/shifts",
    params(ShiftFilter),
    responses(
        (status = 200, description = "Paginated shift list", body = ShiftListResponse),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn list_shifts(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ShiftFilter>,
) -> Result<HttpResponse, AppError> {
    auth.require_supervisor_or_admin()?;

    let window = PageWindow::new(query.page, query.per_page, 20);

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(worker_id) = query.worker_id {
        where_sql.push_str(" AND worker_id = ?");
        args.push(FilterValue::U64(worker_id));
    }
    if let Some(site_id) = query.site_id {
        where_sql.push_str(" AND site_id = ?");
        args.push(FilterValue::U64(site_id));
    }
    if let Some(from) = query.from {
        where_sql.push_str(" AND shift_date >= ?");
        args.push(FilterValue::Date(from));
    }
    if let Some(to) = query.to {
        where_sql.push_str(" AND shift_date <= ?");
        args.push(FilterValue::Date(to));
    }
    if query.open_only.unwrap_or(false) {
        where_sql.push_str(" AND leave_type IS NULL AND leave_time IS NULL");
    }

    let count_sql = format!("SELECT COUNT(*) FROM shifts{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Date(d) => count_q.bind(*d),
        };
    }
    let total = count_q.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {SHIFT_COLUMNS} FROM shifts{} ORDER BY shift_date DESC, id DESC LIMIT ? OFFSET ?",
        where_sql
    );
    debug!(sql = %data_sql, page = window.page, "Fetching shifts");

    let mut data_q = sqlx::query_as::<_, Shift>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Date(d) => data_q.bind(d),
        };
    }
    let data = data_q
        .bind(window.per_page)
        .bind(window.offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(ShiftListResponse {
        data,
        page: window.page,
        per_page: window.per_page,
        total,
    }))
}

/// Shift with its breaks
#[utoipa::path(
    get,
    path = "/api/shifts/{shift_id}",
    params(("shift_id" = u64, Path, description = "Shift ID")),
    responses(
        (status = 200, description = "Shift found", body = ShiftDetail),
        (status = 404, description = "Shift not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn get_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let shift_id = path.into_inner();
    let mut conn = pool.acquire().await?;

    let shift = fetch_shift(&mut conn, shift_id).await?;
    if !auth.can_view_worker(shift.worker_id) {
        return Err(AppError::not_found("Shift not found"));
    }
    let breaks = fetch_breaks(&mut conn, shift_id).await?;

    Ok(HttpResponse::Ok().json(ShiftDetail { shift, breaks }))
}

/// Correct a shift's clock-in/clock-out times (admin)
#[utoipa::path(
    put,
    path = "/api/shifts/{shift_id}",
    params(("shift_id" = u64, Path, description = "Shift ID")),
    request_body = UpdateShiftTimes,
    responses(
        (status = 200, description = "Shift updated and hours recomputed", body = Shift),
        (status = 400, description = "Invalid times"),
        (status = 404, description = "Shift not found"),
        (status = 409, description = "Leave markers cannot be edited")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn update_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    body: web::Json<UpdateShiftTimes>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let shift_id = path.into_inner();

    if body.entry_time.is_none() && body.leave_time.is_none() {
        return Err(AppError::bad_request("No fields provided for update"));
    }

    let mut tx = pool.begin().await?;
    let current = fetch_shift(&mut tx, shift_id).await?;
    lookups::lock_worker(&mut *tx, current.worker_id).await?;
    // re-read under the worker lock
    let current = fetch_shift(&mut tx, shift_id).await?;

    if current.is_leave_marker() {
        return Err(AppError::conflict(
            "Leave markers change only through their leave request",
        ));
    }

    let entry = body
        .entry_time
        .or(current.entry_time)
        .ok_or_else(|| AppError::bad_request("entry_time is required"))?;
    let leave = body.leave_time.or(current.leave_time);

    if let Some(leave) = leave {
        if leave <= entry {
            return Err(AppError::bad_request("leave_time must be after entry_time"));
        }
        if exceeds_max_shift(entry, leave, config.max_shift_hours) {
            return Err(AppError::bad_request(format!(
                "A shift cannot be longer than {} hours",
                config.max_shift_hours
            )));
        }
    }

    let shift_date = entry.with_timezone(&config.tz_offset).date_naive();

    sqlx::query("UPDATE shifts SET entry_time = ?, leave_time = ?, shift_date = ? WHERE id = ?")
        .bind(entry)
        .bind(leave)
        .bind(shift_date)
        .bind(shift_id)
        .execute(&mut *tx)
        .await?;

    let hours = match leave {
        Some(leave) => {
            close_open_breaks(&mut tx, shift_id, leave).await?;
            compute_shift_hours(&mut tx, shift_id, shift_date, entry, leave, &config.pay_policy).await?
        }
        None => ShiftHours::default(),
    };
    store_shift_hours(&mut tx, shift_id, &hours).await?;

    let updated = fetch_shift(&mut tx, shift_id).await?;
    tx.commit().await?;

    info!(shift_id, admin = auth.user_id, "Shift times corrected");
    Ok(HttpResponse::Ok().json(updated))
}

/// Delete a worked shift (admin)
#[utoipa::path(
    delete,
    path = "/api/shifts/{shift_id}",
    params(("shift_id" = u64, Path, description = "Shift ID")),
    responses(
        (status = 200, description = "Shift deleted"),
        (status = 404, description = "Shift not found"),
        (status = 409, description = "Leave markers are removed by cancelling the leave")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn delete_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let shift_id = path.into_inner();

    let result = sqlx::query("DELETE FROM shifts WHERE id = ? AND leave_type IS NULL")
        .bind(shift_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        let mut conn = pool.acquire().await?;
        // tell "missing" apart from "leave marker"
        fetch_shift(&mut conn, shift_id).await?;
        return Err(AppError::conflict(
            "Leave markers are removed by cancelling the leave request",
        ));
    }

    info!(shift_id, admin = auth.user_id, "Shift deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Shift deleted" })))
}
