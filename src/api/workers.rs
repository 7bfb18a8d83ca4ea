use crate::{
    auth::auth::AuthUser,
    errors::{AppError, is_duplicate_key},
    model::worker::{WORKER_COLUMNS, Worker},
    rules::payslip::{PayBasis, Residency},
    utils::{
        db_utils::{build_update_sql, execute_update},
        lookups,
        pagination::PageWindow,
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use std::str::FromStr;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

/// Columns an admin may change through `PUT /api/workers/{id}`.
const UPDATABLE_COLUMNS: &[&str] = &[
    "full_name",
    "residency",
    "date_of_birth",
    "sinda_contributor",
    "pay_basis",
    "base_rate",
    "fixed_allowance",
    "annual_leave_balance",
    "medical_leave_balance",
    "active",
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateWorker {
    #[schema(example = "W-0042")]
    pub employee_id: String,
    #[schema(example = "Ravi Kumar")]
    pub full_name: String,
    pub residency: Residency,
    #[schema(example = "1990-05-14", format = "date", value_type = Option<String>)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub sinda_contributor: bool,
    pub pay_basis: PayBasis,
    /// Monthly basic salary or daily rate
    #[schema(example = "80.00", value_type = String)]
    pub base_rate: Decimal,
    #[serde(default)]
    #[schema(example = "0.00", value_type = String)]
    pub fixed_allowance: Decimal,
    #[serde(default)]
    #[schema(example = "14.0", value_type = String)]
    pub annual_leave_balance: Decimal,
    #[serde(default)]
    #[schema(example = "14.0", value_type = String)]
    pub medical_leave_balance: Decimal,
}

impl CreateWorker {
    fn validate(&self) -> Result<(), AppError> {
        if self.employee_id.trim().is_empty() || self.full_name.trim().is_empty() {
            return Err(AppError::bad_request("employee_id and full_name are required"));
        }
        if self.base_rate.is_sign_negative() || self.fixed_allowance.is_sign_negative() {
            return Err(AppError::bad_request("Rates cannot be negative"));
        }
        if self.annual_leave_balance.is_sign_negative() || self.medical_leave_balance.is_sign_negative() {
            return Err(AppError::bad_request("Leave balances cannot be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct WorkerQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub residency: Option<Residency>,
    pub active: Option<bool>,
    /// Search by name or employee ID
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct WorkerListResponse {
    pub data: Vec<Worker>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

/// Checks the values of a partial update that the column types alone
/// would not catch.
fn validate_update(payload: &Value) -> Result<(), AppError> {
    let Some(obj) = payload.as_object() else {
        return Err(AppError::bad_request("Payload must be a JSON object"));
    };

    if let Some(v) = obj.get("residency") {
        v.as_str()
            .and_then(|s| Residency::from_str(s).ok())
            .ok_or_else(|| AppError::bad_request("residency must be citizen, pr or foreign"))?;
    }
    if let Some(v) = obj.get("pay_basis") {
        v.as_str()
            .and_then(|s| PayBasis::from_str(s).ok())
            .ok_or_else(|| AppError::bad_request("pay_basis must be monthly or daily"))?;
    }
    if let Some(v) = obj.get("full_name") {
        if v.as_str().is_none_or(|s| s.trim().is_empty()) {
            return Err(AppError::bad_request("full_name cannot be empty"));
        }
    }
    for key in [
        "base_rate",
        "fixed_allowance",
        "annual_leave_balance",
        "medical_leave_balance",
    ] {
        if let Some(v) = obj.get(key) {
            let amount = v
                .as_f64()
                .ok_or_else(|| AppError::bad_request(format!("{key} must be a number")))?;
            if amount < 0.0 {
                return Err(AppError::bad_request(format!("{key} cannot be negative")));
            }
        }
    }
    Ok(())
}

/// Create Worker
#[utoipa::path(
    post,
    path = "/api/workers",
    request_body = CreateWorker,
    responses(
        (status = 201, description = "Worker created", body = Worker),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "employee_id already exists", body = Object, example = json!({
            "message": "employee_id already exists"
        }))
    ),
    tag = "Workers",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_worker(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateWorker>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    payload.validate()?;

    let result = sqlx::query(
        r#"
        INSERT INTO workers
        (employee_id, full_name, residency, date_of_birth, sinda_contributor, pay_basis,
         base_rate, fixed_allowance, annual_leave_balance, medical_leave_balance)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id.trim())
    .bind(payload.full_name.trim())
    .bind(payload.residency.as_ref())
    .bind(payload.date_of_birth)
    .bind(payload.sinda_contributor)
    .bind(payload.pay_basis.as_ref())
    .bind(payload.base_rate)
    .bind(payload.fixed_allowance)
    .bind(payload.annual_leave_balance)
    .bind(payload.medical_leave_balance)
    .execute(pool.get_ref())
    .await;

    let worker_id = match result {
        Ok(res) => res.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            return Err(AppError::conflict("employee_id already exists"));
        }
        Err(e) => return Err(e.into()),
    };

    let worker = lookups::fetch_worker(pool.get_ref(), worker_id).await?;
    info!(worker_id, employee_id = %worker.employee_id, "Worker created");
    Ok(HttpResponse::Created().json(worker))
}

/// List Workers
#[utoipa::path(
    get,
    path = "/api/workers",
    params(WorkerQuery),
    responses(
        (status = 200, description = "Paginated worker list", body = WorkerListResponse)
    ),
    tag = "Workers",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_workers(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<WorkerQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_supervisor_or_admin()?;

    let window = PageWindow::new(query.page, query.per_page, 20);

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();
    let mut active_filter = None;

    if let Some(residency) = query.residency {
        conditions.push("residency = ?");
        bindings.push(residency.to_string());
    }

    if let Some(search) = &query.search {
        conditions.push("(full_name LIKE ? OR employee_id LIKE ?)");
        let like = format!("%{}%", search.trim());
        bindings.push(like.clone());
        bindings.push(like);
    }

    if let Some(active) = query.active {
        conditions.push("active = ?");
        active_filter = Some(active);
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) as total FROM workers {}", where_clause);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting workers");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }
    if let Some(active) = active_filter {
        count_query = count_query.bind(active);
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT {WORKER_COLUMNS} FROM workers {} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page = window.page, per_page = window.per_page, "Fetching workers");

    let mut data_query = sqlx::query_as::<_, Worker>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    if let Some(active) = active_filter {
        data_query = data_query.bind(active);
    }
    let workers = data_query
        .bind(window.per_page)
        .bind(window.offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(WorkerListResponse {
        data: workers,
        page: window.page,
        per_page: window.per_page,
        total,
    }))
}

/// Get Worker by ID
#[utoipa::path(
    get,
    path = "/api/workers/{worker_id}",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    responses(
        (status = 200, description = "Worker found", body = Worker),
        (status = 404, description = "Worker not found", body = Object, example = json!({
            "message": "Worker not found"
        }))
    ),
    tag = "Workers",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_worker(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let worker_id = path.into_inner();
    if !auth.can_view_worker(worker_id) {
        return Err(AppError::not_found("Worker not found"));
    }

    let worker = lookups::fetch_worker(pool.get_ref(), worker_id).await?;
    Ok(HttpResponse::Ok().json(worker))
}

/// Update Worker
#[utoipa::path(
    put,
    path = "/api/workers/{worker_id}",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    request_body(content = Object, description = "Any subset of the updatable worker fields", example = json!({
        "base_rate": 85.0,
        "annual_leave_balance": 10
    })),
    responses(
        (status = 200, description = "Worker updated", body = Worker),
        (status = 400, description = "Unknown field or invalid value"),
        (status = 404, description = "Worker not found")
    ),
    tag = "Workers",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_worker(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let worker_id = path.into_inner();

    validate_update(&body)?;
    let update = build_update_sql("workers", &body, UPDATABLE_COLUMNS, "id", worker_id)?;

    let affected = execute_update(pool.get_ref(), update).await?;
    // MySQL reports 0 for a no-op update too, so confirm the row exists
    let worker = lookups::fetch_worker(pool.get_ref(), worker_id).await?;

    info!(worker_id, affected, admin = auth.user_id, "Worker updated");
    Ok(HttpResponse::Ok().json(worker))
}

/// Deactivate Worker
#[utoipa::path(
    delete,
    path = "/api/workers/{worker_id}",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    responses(
        (status = 200, description = "Worker deactivated", body = Object, example = json!({
            "message": "Worker deactivated"
        })),
        (status = 404, description = "Worker not found")
    ),
    tag = "Workers",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_worker(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let worker_id = path.into_inner();

    // history (shifts, payslips) stays attached, so never a hard delete
    let result = sqlx::query("UPDATE workers SET active = FALSE WHERE id = ?")
        .bind(worker_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        lookups::fetch_worker(pool.get_ref(), worker_id).await?;
    }

    info!(worker_id, admin = auth.user_id, "Worker deactivated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Worker deactivated" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_rejects_unknown_enum_values() {
        assert!(validate_update(&json!({ "residency": "martian" })).is_err());
        assert!(validate_update(&json!({ "pay_basis": "weekly" })).is_err());
        assert!(validate_update(&json!({ "residency": "pr", "pay_basis": "monthly" })).is_ok());
    }

    #[test]
    fn update_rejects_negative_amounts() {
        assert!(validate_update(&json!({ "annual_leave_balance": -1 })).is_err());
        assert!(validate_update(&json!({ "base_rate": "abc" })).is_err());
        assert!(validate_update(&json!({ "medical_leave_balance": 0 })).is_ok());
    }

    #[test]
    fn update_rejects_blank_name() {
        assert!(validate_update(&json!({ "full_name": "   " })).is_err());
    }

    #[test]
    fn whitelist_excludes_identity_columns() {
        assert!(!UPDATABLE_COLUMNS.contains(&"id"));
        assert!(!UPDATABLE_COLUMNS.contains(&"employee_id"));
        assert!(!UPDATABLE_COLUMNS.contains(&"created_at"));
    }
}
