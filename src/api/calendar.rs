use crate::{
    auth::auth::AuthUser,
    errors::{AppError, is_duplicate_key},
    model::calendar::{PublicHoliday, WorkingDays},
    rules::payslip::default_working_days,
    utils::lookups,
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct YearQuery {
    /// Defaults to the current year
    pub year: Option<i32>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateHoliday {
    #[schema(example = "2026-08-09", format = "date", value_type = String)]
    pub holiday_date: NaiveDate,
    #[schema(example = "National Day")]
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SetWorkingDays {
    #[schema(example = 2026)]
    pub year: u16,
    #[schema(example = 2)]
    pub month: u8,
    #[schema(example = "23", value_type = String)]
    pub working_days: Decimal,
}

/// Working days for one month: the admin override if any, else the
/// calendar default (days that are neither Sunday nor a public holiday).
#[derive(Serialize, ToSchema)]
pub struct MonthWorkingDays {
    pub month: u32,
    #[schema(value_type = Option<String>)]
    pub configured: Option<Decimal>,
    #[schema(value_type = String)]
    pub effective: Decimal,
}

fn resolve_year(query: &YearQuery) -> Result<i32, AppError> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    if !(2000..=2100).contains(&year) {
        return Err(AppError::bad_request("year out of range"));
    }
    Ok(year)
}

fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate), AppError> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1);
    let last = NaiveDate::from_ymd_opt(year, 12, 31);
    first
        .zip(last)
        .ok_or_else(|| AppError::bad_request("year out of range"))
}

fn validate_working_days(body: &SetWorkingDays) -> Result<(), AppError> {
    if !(1..=12).contains(&body.month) {
        return Err(AppError::bad_request("month must be between 1 and 12"));
    }
    if body.working_days <= Decimal::ZERO || body.working_days > dec!(31) {
        return Err(AppError::bad_request("working_days must be between 0 and 31"));
    }
    // DECIMAL(4,1) column: whole or half days only
    if (body.working_days * dec!(2)).fract() != Decimal::ZERO {
        return Err(AppError::bad_request("working_days must be a whole or half day"));
    }
    Ok(())
}

/// Public holidays of a year
#[utoipa::path(
    get,
    path = "/api/calendar/holidays",
    params(YearQuery),
    responses((status = 200, description = "Holidays in date order", body = [PublicHoliday])),
    tag = "Calendar",
    security(("bearer_auth" = []))
)]
pub async fn list_holidays(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<YearQuery>,
) -> Result<HttpResponse, AppError> {
    let (first, last) = year_bounds(resolve_year(&query)?)?;

    let holidays = sqlx::query_as::<_, PublicHoliday>(
        r#"
        SELECT holiday_date, name
        FROM public_holidays
        WHERE holiday_date BETWEEN ? AND ?
        ORDER BY holiday_date
        "#,
    )
    .bind(first)
    .bind(last)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(holidays))
}

/// Add a public holiday
#[utoipa::path(
    post,
    path = "/api/calendar/holidays",
    request_body = CreateHoliday,
    responses(
        (status = 201, description = "Holiday added", body = PublicHoliday),
        (status = 409, description = "Date already a holiday")
    ),
    tag = "Calendar",
    security(("bearer_auth" = []))
)]
pub async fn add_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<CreateHoliday>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }

    let result = sqlx::query("INSERT INTO public_holidays (holiday_date, name) VALUES (?, ?)")
        .bind(body.holiday_date)
        .bind(name)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(_) => {
            info!(date = %body.holiday_date, name, "Public holiday added");
            Ok(HttpResponse::Created().json(PublicHoliday {
                holiday_date: body.holiday_date,
                name: name.to_string(),
            }))
        }
        Err(e) if is_duplicate_key(&e) => Err(AppError::conflict("Date is already a public holiday")),
        Err(e) => Err(e.into()),
    }
}

/// Remove a public holiday
#[utoipa::path(
    delete,
    path = "/api/calendar/holidays/{date}",
    params(("date" = String, Path, description = "Holiday date (YYYY-MM-DD)")),
    responses(
        (status = 200, description = "Holiday removed"),
        (status = 404, description = "No holiday on that date")
    ),
    tag = "Calendar",
    security(("bearer_auth" = []))
)]
pub async fn delete_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<NaiveDate>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let date = path.into_inner();

    let result = sqlx::query("DELETE FROM public_holidays WHERE holiday_date = ?")
        .bind(date)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("No public holiday on that date"));
    }

    info!(%date, admin = auth.user_id, "Public holiday removed");
    Ok(HttpResponse::Ok().json(json!({ "message": "Holiday removed" })))
}

/// Working days per month of a year
#[utoipa::path(
    get,
    path = "/api/calendar/working-days",
    params(YearQuery),
    responses((status = 200, description = "Twelve months, January first", body = [MonthWorkingDays])),
    tag = "Calendar",
    security(("bearer_auth" = []))
)]
pub async fn list_working_days(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<YearQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_supervisor_or_admin()?;
    let year = resolve_year(&query)?;
    let (first, last) = year_bounds(year)?;

    let configured = sqlx::query_as::<_, WorkingDays>(
        "SELECT year, month, working_days FROM working_days_config WHERE year = ?",
    )
    .bind(year)
    .fetch_all(pool.get_ref())
    .await?;
    let holidays = lookups::holidays_between(pool.get_ref(), first, last).await?;

    let months: Vec<MonthWorkingDays> = (1..=12u32)
        .map(|month| {
            let configured = configured
                .iter()
                .find(|c| u32::from(c.month) == month)
                .map(|c| c.working_days);
            MonthWorkingDays {
                month,
                configured,
                effective: configured
                    .unwrap_or_else(|| default_working_days(year, month, &holidays)),
            }
        })
        .collect();

    Ok(HttpResponse::Ok().json(months))
}

/// Set the working days used for unpaid-leave deductions
#[utoipa::path(
    put,
    path = "/api/calendar/working-days",
    request_body = SetWorkingDays,
    responses(
        (status = 200, description = "Working days saved", body = WorkingDays),
        (status = 400, description = "Invalid month or day count")
    ),
    tag = "Calendar",
    security(("bearer_auth" = []))
)]
pub async fn set_working_days(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<SetWorkingDays>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    validate_working_days(&body)?;

    sqlx::query(
        r#"
        INSERT INTO working_days_config (year, month, working_days)
        VALUES (?, ?, ?)
        ON DUPLICATE KEY UPDATE working_days = VALUES(working_days)
        "#,
    )
    .bind(body.year)
    .bind(body.month)
    .bind(body.working_days)
    .execute(pool.get_ref())
    .await?;

    info!(year = body.year, month = body.month, days = %body.working_days, "Working days configured");
    Ok(HttpResponse::Ok().json(WorkingDays {
        year: body.year,
        month: body.month,
        working_days: body.working_days,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(month: u8, working_days: Decimal) -> SetWorkingDays {
        SetWorkingDays {
            year: 2026,
            month,
            working_days,
        }
    }

    #[test]
    fn working_days_validation() {
        assert!(validate_working_days(&body(2, dec!(23))).is_ok());
        assert!(validate_working_days(&body(2, dec!(22.5))).is_ok());
        assert!(validate_working_days(&body(0, dec!(23))).is_err());
        assert!(validate_working_days(&body(13, dec!(23))).is_err());
        assert!(validate_working_days(&body(2, dec!(0))).is_err());
        assert!(validate_working_days(&body(2, dec!(32))).is_err());
        assert!(validate_working_days(&body(2, dec!(22.3))).is_err());
    }

    #[test]
    fn year_defaults_and_bounds() {
        assert!(resolve_year(&YearQuery { year: None }).is_ok());
        assert_eq!(resolve_year(&YearQuery { year: Some(2026) }).unwrap(), 2026);
        assert!(resolve_year(&YearQuery { year: Some(1899) }).is_err());

        let (first, last) = year_bounds(2026).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());
    }
}
