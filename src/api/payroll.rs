use std::collections::HashSet;

use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    config::Config,
    errors::AppError,
    model::{
        leave_request::{LEAVE_COLUMNS, LeaveRequest},
        payslip::{PAYSLIP_COLUMNS, PayslipRecord},
    },
    rules::{
        leave::{LeaveType, days_within_month},
        payslip::{MonthTotals, PayslipBreakdown, PayslipInputs, compute, default_working_days},
    },
    utils::{lookups, pagination::PageWindow},
};

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PreviewQuery {
    #[schema(example = 1)]
    pub worker_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 1)]
    pub month: u32,
}

#[derive(Deserialize, ToSchema)]
pub struct GeneratePayslip {
    #[schema(example = 1)]
    pub worker_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 1)]
    pub month: u32,
    /// One-off allowances on top of the worker's fixed allowance
    #[serde(default)]
    #[schema(example = "50.00", value_type = String)]
    pub allowances: Decimal,
    #[serde(default)]
    #[schema(example = "0.00", value_type = String)]
    pub other_deductions: Decimal,
    #[schema(example = "Site transport reimbursed")]
    pub remarks: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PayslipPreview {
    pub worker_id: u64,
    pub year: i32,
    pub month: u32,
    /// Divisor for unpaid-leave deductions
    #[schema(value_type = String)]
    pub working_days: Decimal,
    pub breakdown: PayslipBreakdown,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PayrollQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 10)]
    pub per_page: Option<u32>,
    pub worker_id: Option<u64>,
    pub year: Option<u16>,
    pub month: Option<u8>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayslipResponse {
    pub data: Vec<PayslipRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), AppError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::bad_request("Invalid year or month"))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| AppError::bad_request("Invalid year or month"))?;
    Ok((first, last))
}

/// Paid and unpaid leave days of approved requests falling in the month.
fn leave_days_in_month(
    leaves: &[LeaveRequest],
    year: i32,
    month: u32,
    holidays: &HashSet<NaiveDate>,
) -> Result<(Decimal, Decimal), AppError> {
    let mut paid = Decimal::ZERO;
    let mut unpaid = Decimal::ZERO;

    for leave in leaves {
        let days = days_within_month(
            leave.start_date,
            leave.end_date,
            leave.half_day,
            year,
            month,
            holidays,
        );
        match leave.kind()? {
            LeaveType::Unpaid => unpaid += days,
            LeaveType::Annual | LeaveType::Medical => paid += days,
        }
    }
    Ok((paid, unpaid))
}

/// Gathers one worker's month from the database and runs the payslip rules.
async fn assemble(
    conn: &mut MySqlConnection,
    config: &Config,
    worker_id: u64,
    year: i32,
    month: u32,
    allowances: Decimal,
    other_deductions: Decimal,
) -> Result<PayslipPreview, AppError> {
    let (first, last) = month_bounds(year, month)?;
    let worker = lookups::fetch_worker(&mut *conn, worker_id).await?;
    let profile = worker.pay_profile()?;

    let (days_worked, normal_hours, ot_hours, sunday_hours) =
        sqlx::query_as::<_, (i64, Decimal, Decimal, Decimal)>(
            r#"
            SELECT
                COUNT(DISTINCT shift_date),
                COALESCE(SUM(normal_hours), 0),
                COALESCE(SUM(ot_hours), 0),
                COALESCE(SUM(sunday_hours), 0)
            FROM shifts
            WHERE worker_id = ?
              AND shift_date BETWEEN ? AND ?
              AND leave_type IS NULL
              AND leave_time IS NOT NULL
            "#,
        )
        .bind(worker_id)
        .bind(first)
        .bind(last)
        .fetch_one(&mut *conn)
        .await?;

    let leave_sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests \
         WHERE worker_id = ? AND status = 'approved' AND start_date <= ? AND end_date >= ?"
    );
    let leaves = sqlx::query_as::<_, LeaveRequest>(&leave_sql)
        .bind(worker_id)
        .bind(last)
        .bind(first)
        .fetch_all(&mut *conn)
        .await?;

    let holidays = lookups::holidays_between(&mut *conn, first, last).await?;
    let (paid_leave_days, unpaid_leave_days) = leave_days_in_month(&leaves, year, month, &holidays)?;

    let working_days = match lookups::configured_working_days(&mut *conn, year, month).await? {
        Some(days) => days,
        None => default_working_days(year, month, &holidays),
    };

    let inputs = PayslipInputs {
        year,
        month,
        profile,
        totals: MonthTotals {
            days_worked: u32::try_from(days_worked).unwrap_or(u32::MAX),
            normal_hours,
            ot_hours,
            sunday_hours,
            paid_leave_days,
            unpaid_leave_days,
        },
        working_days,
        allowances,
        other_deductions,
    };

    Ok(PayslipPreview {
        worker_id,
        year,
        month,
        working_days,
        breakdown: compute(&inputs, &config.pay_policy),
    })
}

async fn fetch_payslip(conn: &mut MySqlConnection, payslip_id: u64) -> Result<PayslipRecord, AppError> {
    let sql = format!("SELECT {PAYSLIP_COLUMNS} FROM payslip_history WHERE id = ?");
    sqlx::query_as::<_, PayslipRecord>(&sql)
        .bind(payslip_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Payslip not found"))
}

#[utoipa::path(
    get,
    path = "/api/payroll/preview",
    params(PreviewQuery),
    responses(
        (status = 200, description = "Payslip computed, nothing saved", body = PayslipPreview),
        (status = 400, description = "Invalid year or month"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Worker not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn preview_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<PreviewQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let mut conn = pool.acquire().await?;
    let preview = assemble(
        &mut conn,
        &config,
        query.worker_id,
        query.year,
        query.month,
        Decimal::ZERO,
        Decimal::ZERO,
    )
    .await?;

    Ok(HttpResponse::Ok().json(preview))
}

#[utoipa::path(
    post,
    path = "/api/payroll/generate",
    request_body = GeneratePayslip,
    responses(
        (status = 201, description = "Payslip generated (replaces an earlier run for the month)", body = PayslipRecord),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Worker not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
#[instrument(
    name = "payroll_generate",
    skip(auth, pool, config, payload),
    fields(worker_id = payload.worker_id, year = payload.year, month = payload.month)
)]
pub async fn generate_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<GeneratePayslip>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    if payload.allowances.is_sign_negative() || payload.other_deductions.is_sign_negative() {
        return Err(AppError::bad_request(
            "allowances and other_deductions cannot be negative",
        ));
    }

    let mut tx = pool.begin().await?;
    // no scan or leave approval may change the month underneath us
    lookups::lock_worker(&mut *tx, payload.worker_id).await?;

    let preview = assemble(
        &mut tx,
        &config,
        payload.worker_id,
        payload.year,
        payload.month,
        payload.allowances,
        payload.other_deductions,
    )
    .await?;
    let b = &preview.breakdown;

    sqlx::query(
        r#"
        INSERT INTO payslip_history
            (worker_id, year, month, days_worked, normal_hours, ot_hours, ot_hours_excess,
             sunday_hours, paid_leave_days, unpaid_leave_days, hourly_rate, basic_pay, ot_pay,
             sun_ph_pay, allowances, gross_pay, cpf_employee, cpf_employer, sinda, sdl,
             other_deductions, total_deductions, net_pay, employer_cost, remarks, generated_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            days_worked = VALUES(days_worked),
            normal_hours = VALUES(normal_hours),
            ot_hours = VALUES(ot_hours),
            ot_hours_excess = VALUES(ot_hours_excess),
            sunday_hours = VALUES(sunday_hours),
            paid_leave_days = VALUES(paid_leave_days),
            unpaid_leave_days = VALUES(unpaid_leave_days),
            hourly_rate = VALUES(hourly_rate),
            basic_pay = VALUES(basic_pay),
            ot_pay = VALUES(ot_pay),
            sun_ph_pay = VALUES(sun_ph_pay),
            allowances = VALUES(allowances),
            gross_pay = VALUES(gross_pay),
            cpf_employee = VALUES(cpf_employee),
            cpf_employer = VALUES(cpf_employer),
            sinda = VALUES(sinda),
            sdl = VALUES(sdl),
            other_deductions = VALUES(other_deductions),
            total_deductions = VALUES(total_deductions),
            net_pay = VALUES(net_pay),
            employer_cost = VALUES(employer_cost),
            remarks = VALUES(remarks),
            generated_by = VALUES(generated_by),
            generated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(payload.worker_id)
    .bind(payload.year)
    .bind(payload.month)
    .bind(b.days_worked)
    .bind(b.normal_hours)
    .bind(b.ot_hours)
    .bind(b.ot_hours_excess)
    .bind(b.sunday_hours)
    .bind(b.paid_leave_days)
    .bind(b.unpaid_leave_days)
    .bind(b.hourly_rate)
    .bind(b.basic_pay)
    .bind(b.ot_pay)
    .bind(b.sun_ph_pay)
    .bind(b.allowances)
    .bind(b.gross_pay)
    .bind(b.cpf_employee)
    .bind(b.cpf_employer)
    .bind(b.sinda)
    .bind(b.sdl)
    .bind(b.other_deductions)
    .bind(b.total_deductions)
    .bind(b.net_pay)
    .bind(b.employer_cost)
    .bind(payload.remarks.as_deref().map(str::trim))
    .bind(auth.user_id)
    .execute(&mut *tx)
    .await?;

    // last_insert_id is unreliable on the update branch
    let payslip_id = sqlx::query_scalar::<_, u64>(
        "SELECT id FROM payslip_history WHERE worker_id = ? AND year = ? AND month = ?",
    )
    .bind(payload.worker_id)
    .bind(payload.year)
    .bind(payload.month)
    .fetch_one(&mut *tx)
    .await?;
    let record = fetch_payslip(&mut tx, payslip_id).await?;
    tx.commit().await?;

    info!(
        payslip_id,
        gross = %record.gross_pay,
        net = %record.net_pay,
        "Payslip generated"
    );
    Ok(HttpResponse::Created().json(record))
}

async fn query_payslips(
    pool: &MySqlPool,
    worker_id: Option<u64>,
    year: Option<u16>,
    month: Option<u8>,
    window: PageWindow,
) -> Result<PaginatedPayslipResponse, AppError> {
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<u64> = Vec::new();

    if let Some(worker_id) = worker_id {
        where_sql.push_str(" AND worker_id = ?");
        args.push(worker_id);
    }
    if let Some(year) = year {
        where_sql.push_str(" AND year = ?");
        args.push(u64::from(year));
    }
    if let Some(month) = month {
        where_sql.push_str(" AND month = ?");
        args.push(u64::from(month));
    }

    let count_sql = format!("SELECT COUNT(*) FROM payslip_history{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = count_q.bind(*arg);
    }
    let total = count_q.fetch_one(pool).await?;

    let data_sql = format!(
        "SELECT {PAYSLIP_COLUMNS} FROM payslip_history{} \
         ORDER BY year DESC, month DESC, worker_id LIMIT ? OFFSET ?",
        where_sql
    );
    let mut data_q = sqlx::query_as::<_, PayslipRecord>(&data_sql);
    for arg in args {
        data_q = data_q.bind(arg);
    }
    let data = data_q
        .bind(window.per_page)
        .bind(window.offset)
        .fetch_all(pool)
        .await?;

    Ok(PaginatedPayslipResponse {
        data,
        page: window.page,
        per_page: window.per_page,
        total,
    })
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, description = "Paginated payslip history", body = PaginatedPayslipResponse),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payslips(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let window = PageWindow::new(query.page, query.per_page, 10);
    let response = query_payslips(pool.get_ref(), query.worker_id, query.year, query.month, window).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{payslip_id}",
    params(("payslip_id" = u64, Path, description = "Payslip ID")),
    responses(
        (status = 200, description = "Payslip found", body = PayslipRecord),
        (status = 404, description = "Payslip not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let record = fetch_payslip(&mut conn, path.into_inner()).await?;

    // supervisors review timesheets, not pay
    let allowed = match auth.worker_id {
        Some(own) if auth.is_worker() => own == record.worker_id,
        _ => auth.require_admin().is_ok(),
    };
    if !allowed {
        return Err(AppError::not_found("Payslip not found"));
    }

    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    get,
    path = "/api/payroll/me",
    params(PayrollQuery),
    responses((status = 200, description = "The caller's payslips", body = PaginatedPayslipResponse)),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn my_payslips(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> Result<HttpResponse, AppError> {
    let worker_id = auth.worker_id()?;

    let window = PageWindow::new(query.page, query.per_page, 12);
    let response = query_payslips(pool.get_ref(), Some(worker_id), query.year, query.month, window).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn leave(kind: &str, start: NaiveDate, end: NaiveDate, half_day: bool) -> LeaveRequest {
        LeaveRequest {
            id: 1,
            worker_id: 7,
            leave_type: kind.into(),
            start_date: start,
            end_date: end,
            half_day,
            days: Decimal::ZERO,
            status: "approved".into(),
            reason: None,
            reviewed_by: Some(1),
            reviewed_at: None,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn month_bounds_handle_year_end_and_leap_years() {
        assert_eq!(month_bounds(2026, 12).unwrap(), (date(2026, 12, 1), date(2026, 12, 31)));
        assert_eq!(month_bounds(2028, 2).unwrap(), (date(2028, 2, 1), date(2028, 2, 29)));
        assert!(month_bounds(2026, 13).is_err());
        assert!(month_bounds(2026, 0).is_err());
    }

    #[test]
    fn leave_days_split_by_type_and_month() {
        let holidays = HashSet::new();
        // Thu 29 Jan .. Tue 3 Feb 2026: Jan 29, 30, 31 in January; Sun 1 Feb skipped
        let leaves = vec![
            leave("annual", date(2026, 1, 29), date(2026, 2, 3), false),
            leave("unpaid", date(2026, 1, 12), date(2026, 1, 12), true),
        ];

        let (paid, unpaid) = leave_days_in_month(&leaves, 2026, 1, &holidays).unwrap();
        assert_eq!(paid, dec!(3));
        assert_eq!(unpaid, dec!(0.5));

        let (paid, unpaid) = leave_days_in_month(&leaves, 2026, 2, &holidays).unwrap();
        assert_eq!(paid, dec!(2));
        assert_eq!(unpaid, Decimal::ZERO);
    }

    #[test]
    fn unknown_leave_type_is_an_error() {
        let leaves = vec![leave("sabbatical", date(2026, 1, 5), date(2026, 1, 5), false)];
        assert!(leave_days_in_month(&leaves, 2026, 1, &HashSet::new()).is_err());
    }
}
