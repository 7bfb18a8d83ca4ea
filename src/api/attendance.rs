use crate::{
    auth::auth::AuthUser,
    config::Config,
    errors::AppError,
    model::shift::{Break, SHIFT_COLUMNS, Shift},
    rules::{
        PayPolicy,
        geo::{GeoPoint, within_geofence},
        hours::{
            BreakSpan, DayKind, ShiftHours, classify, exceeds_max_shift, net_worked_minutes,
            within_scan_debounce,
        },
    },
    utils::{lookups, site_cache},
};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct ScanRequest {
    /// Token decoded from the site QR code
    #[schema(example = "5f0c2d8e9a7b4c1d8e2f3a4b5c6d7e8f")]
    pub qr_token: String,
    #[schema(example = 1.3329)]
    pub latitude: f64,
    #[schema(example = 103.7436)]
    pub longitude: f64,
}

#[derive(Serialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanAction {
    ClockIn,
    ClockOut,
}

#[derive(Serialize, ToSchema)]
pub struct ScanResponse {
    pub action: ScanAction,
    pub site_id: u64,
    pub site_name: String,
    /// Distance from the site centre in metres
    pub distance_m: f64,
    pub shift: Shift,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRange {
    /// First day (inclusive); defaults to the first of the current month
    pub from: Option<NaiveDate>,
    /// Last day (inclusive); defaults to today
    pub to: Option<NaiveDate>,
}

pub(crate) async fn fetch_shift(conn: &mut MySqlConnection, shift_id: u64) -> Result<Shift, AppError> {
    let sql = format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?");
    sqlx::query_as::<_, Shift>(&sql)
        .bind(shift_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Shift not found"))
}

pub(crate) async fn fetch_open_shift(
    conn: &mut MySqlConnection,
    worker_id: u64,
) -> Result<Option<Shift>, sqlx::Error> {
    let sql = format!(
        "SELECT {SHIFT_COLUMNS} FROM shifts \
         WHERE worker_id = ? AND leave_type IS NULL AND entry_time IS NOT NULL AND leave_time IS NULL \
         ORDER BY entry_time DESC LIMIT 1"
    );
    sqlx::query_as::<_, Shift>(&sql)
        .bind(worker_id)
        .fetch_optional(conn)
        .await
}

pub(crate) async fn fetch_breaks(conn: &mut MySqlConnection, shift_id: u64) -> Result<Vec<Break>, sqlx::Error> {
    sqlx::query_as::<_, Break>(
        "SELECT id, shift_id, start_time, end_time FROM breaks WHERE shift_id = ? ORDER BY start_time",
    )
    .bind(shift_id)
    .fetch_all(conn)
    .await
}

/// Hours for a closed shift, from its breaks and the day's pay category.
pub(crate) async fn compute_shift_hours(
    conn: &mut MySqlConnection,
    shift_id: u64,
    shift_date: NaiveDate,
    entry: DateTime<Utc>,
    leave: DateTime<Utc>,
    policy: &PayPolicy,
) -> Result<ShiftHours, AppError> {
    let breaks = fetch_breaks(&mut *conn, shift_id).await?;
    let spans: Vec<BreakSpan> = breaks.iter().map(BreakSpan::from).collect();
    let holiday = lookups::is_holiday(&mut *conn, shift_date).await?;

    let minutes = net_worked_minutes(entry, leave, &spans);
    Ok(classify(minutes, DayKind::of(shift_date, holiday), policy))
}

pub(crate) async fn store_shift_hours(
    conn: &mut MySqlConnection,
    shift_id: u64,
    hours: &ShiftHours,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE shifts
        SET worked_hours = ?, normal_hours = ?, ot_hours = ?, sunday_hours = ?
        WHERE id = ?
        "#,
    )
    .bind(hours.worked)
    .bind(hours.normal)
    .bind(hours.ot)
    .bind(hours.sunday)
    .bind(shift_id)
    .execute(conn)
    .await
    .map(|_| ())
}

pub(crate) async fn close_open_breaks(
    conn: &mut MySqlConnection,
    shift_id: u64,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE breaks SET end_time = ? WHERE shift_id = ? AND end_time IS NULL")
        .bind(at)
        .bind(shift_id)
        .execute(conn)
        .await
        .map(|_| ())
}

/// Leave marker rows for a worker on one date.
pub(crate) async fn leave_markers_on(
    conn: &mut MySqlConnection,
    worker_id: u64,
    date: NaiveDate,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM shifts WHERE worker_id = ? AND shift_date = ? AND leave_type IS NOT NULL",
    )
    .bind(worker_id)
    .bind(date)
    .fetch_one(conn)
    .await
}

/// QR + GPS attendance scan: clocks in when no shift is open, otherwise out.
#[utoipa::path(
    post,
    path = "/api/attendance/scan",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Clocked in or out", body = ScanResponse),
        (status = 400, description = "Invalid coordinates"),
        (status = 403, description = "Outside the site geofence or no worker profile"),
        (status = 404, description = "Unknown or inactive site QR code"),
        (status = 409, description = "On leave today, scanned again too soon or shift open too long")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "attendance_scan", skip(auth, pool, config, payload), fields(worker_id = auth.worker_id))]
pub async fn scan(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<ScanRequest>,
) -> Result<HttpResponse, AppError> {
    let worker_id = auth.worker_id()?;

    let point = GeoPoint::new(payload.latitude, payload.longitude);
    point.validate().map_err(AppError::bad_request)?;

    let site = site_cache::resolve(pool.get_ref(), &payload.qr_token)
        .await?
        .ok_or_else(|| AppError::not_found("Unknown or inactive site QR code"))?;

    let distance_m = within_geofence(site.location(), site.radius_m, point).map_err(|distance| {
        warn!(site_id = site.id, distance_m = distance, "Scan outside geofence");
        AppError::forbidden(format!(
            "Outside site geofence: {:.0} m from {}, allowed {:.0} m",
            distance, site.name, site.radius_m
        ))
    })?;

    let now = Utc::now();
    let today = now.with_timezone(&config.tz_offset).date_naive();

    let mut tx = pool.begin().await?;
    let worker = lookups::lock_worker(&mut *tx, worker_id).await?;
    if !worker.active {
        return Err(AppError::forbidden("Worker is inactive"));
    }

    let (action, shift_id) = match fetch_open_shift(&mut tx, worker_id).await? {
        None => {
            if leave_markers_on(&mut tx, worker_id, today).await? > 0 {
                return Err(AppError::conflict("On approved leave today"));
            }

            let result = sqlx::query(
                r#"
                INSERT INTO shifts (worker_id, site_id, shift_date, entry_time, entry_latitude, entry_longitude)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(worker_id)
            .bind(site.id)
            .bind(today)
            .bind(now)
            .bind(point.latitude)
            .bind(point.longitude)
            .execute(&mut *tx)
            .await?;

            (ScanAction::ClockIn, result.last_insert_id())
        }
        Some(open) => {
            let entry = open
                .entry_time
                .ok_or_else(|| AppError::Internal(format!("open shift {} has no entry time", open.id)))?;

            if within_scan_debounce(entry, now, config.scan_debounce_secs) {
                return Err(AppError::conflict(
                    "Already clocked in; scan again later to clock out",
                ));
            }
            if exceeds_max_shift(entry, now, config.max_shift_hours) {
                warn!(shift_id = open.id, "Open shift exceeds maximum length");
                return Err(AppError::conflict(format!(
                    "Shift {} has been open longer than {} hours; ask a supervisor to correct it",
                    open.id, config.max_shift_hours
                )));
            }

            close_open_breaks(&mut tx, open.id, now).await?;
            let hours =
                compute_shift_hours(&mut tx, open.id, open.shift_date, entry, now, &config.pay_policy).await?;

            sqlx::query(
                r#"
                UPDATE shifts
                SET leave_time = ?, leave_latitude = ?, leave_longitude = ?
                WHERE id = ?
                "#,
            )
            .bind(now)
            .bind(point.latitude)
            .bind(point.longitude)
            .bind(open.id)
            .execute(&mut *tx)
            .await?;
            store_shift_hours(&mut tx, open.id, &hours).await?;

            (ScanAction::ClockOut, open.id)
        }
    };

    let shift = fetch_shift(&mut tx, shift_id).await?;
    tx.commit().await?;

    info!(site_id = site.id, shift_id, ?action, "Attendance scan accepted");

    Ok(HttpResponse::Ok().json(ScanResponse {
        action,
        site_id: site.id,
        site_name: site.name,
        distance_m,
        shift,
    }))
}

/// Start a break on the current open shift
#[utoipa::path(
    post,
    path = "/api/attendance/break/start",
    responses(
        (status = 201, description = "Break started", body = Break),
        (status = 409, description = "Not clocked in or already on a break")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn start_break(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let worker_id = auth.worker_id()?;
    let mut tx = pool.begin().await?;
    lookups::lock_worker(&mut *tx, worker_id).await?;

    let open = fetch_open_shift(&mut tx, worker_id)
        .await?
        .ok_or_else(|| AppError::conflict("Not clocked in"))?;

    let breaks = fetch_breaks(&mut tx, open.id).await?;
    if breaks.iter().any(|b| b.end_time.is_none()) {
        return Err(AppError::conflict("Already on a break"));
    }

    let now = Utc::now();
    let result = sqlx::query("INSERT INTO breaks (shift_id, start_time) VALUES (?, ?)")
        .bind(open.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(HttpResponse::Created().json(Break {
        id: result.last_insert_id(),
        shift_id: open.id,
        start_time: now,
        end_time: None,
    }))
}

/// End the running break
#[utoipa::path(
    post,
    path = "/api/attendance/break/end",
    responses(
        (status = 200, description = "Break ended", body = Break),
        (status = 409, description = "No break in progress")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn end_break(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let worker_id = auth.worker_id()?;
    let mut tx = pool.begin().await?;
    lookups::lock_worker(&mut *tx, worker_id).await?;

    let open = fetch_open_shift(&mut tx, worker_id)
        .await?
        .ok_or_else(|| AppError::conflict("Not clocked in"))?;

    let running = fetch_breaks(&mut tx, open.id)
        .await?
        .into_iter()
        .find(|b| b.end_time.is_none())
        .ok_or_else(|| AppError::conflict("No break in progress"))?;

    let now = Utc::now();
    sqlx::query("UPDATE breaks SET end_time = ? WHERE id = ?")
        .bind(now)
        .bind(running.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(Break {
        end_time: Some(now),
        ..running
    }))
}

/// Own shifts and leave markers for a date range
#[utoipa::path(
    get,
    path = "/api/attendance/me",
    params(DateRange),
    responses((status = 200, description = "Shifts in range", body = [Shift])),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_shifts(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<DateRange>,
) -> Result<HttpResponse, AppError> {
    let worker_id = auth.worker_id()?;

    let today = Utc::now().with_timezone(&config.tz_offset).date_naive();
    let to = query.to.unwrap_or(today);
    let from = query.from.unwrap_or_else(|| to.with_day(1).unwrap_or(to));
    if from > to {
        return Err(AppError::bad_request("from cannot be after to"));
    }

    let sql = format!(
        "SELECT {SHIFT_COLUMNS} FROM shifts \
         WHERE worker_id = ? AND shift_date BETWEEN ? AND ? \
         ORDER BY shift_date DESC, entry_time DESC"
    );
    let shifts = sqlx::query_as::<_, Shift>(&sql)
        .bind(worker_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(shifts))
}

/// The caller's open shift, if any
#[utoipa::path(
    get,
    path = "/api/attendance/open",
    responses(
        (status = 200, description = "Open shift", body = Shift),
        (status = 404, description = "Not clocked in")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn open_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let worker_id = auth.worker_id()?;
    let mut conn = pool.acquire().await?;

    match fetch_open_shift(&mut conn, worker_id).await? {
        Some(shift) => Ok(HttpResponse::Ok().json(shift)),
        None => Err(AppError::not_found("Not clocked in")),
    }
}
