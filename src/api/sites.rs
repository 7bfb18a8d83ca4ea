use crate::{
    auth::auth::AuthUser,
    errors::AppError,
    model::site::{SITE_COLUMNS, Site},
    rules::geo::GeoPoint,
    utils::{
        db_utils::{build_update_sql, execute_update},
        site_cache,
    },
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{Executor, MySql, MySqlPool};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

const DEFAULT_RADIUS_M: f64 = 200.0;

const UPDATABLE_COLUMNS: &[&str] = &["name", "latitude", "longitude", "radius_m", "active"];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateSite {
    #[schema(example = "Tuas Depot Block C")]
    pub name: String,
    #[schema(example = 1.3329)]
    pub latitude: f64,
    #[schema(example = 103.7436)]
    pub longitude: f64,
    /// Defaults to 200 m
    #[schema(example = 150.0)]
    pub radius_m: Option<f64>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct SiteQuery {
    /// Include deactivated sites
    pub include_inactive: Option<bool>,
}

fn new_qr_token() -> String {
    Uuid::new_v4().to_simple().to_string()
}

fn validate_radius(radius_m: f64) -> Result<(), AppError> {
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Err(AppError::bad_request("radius_m must be greater than zero"));
    }
    Ok(())
}

fn validate_update(payload: &Value, current: &Site) -> Result<(), AppError> {
    let Some(obj) = payload.as_object() else {
        return Err(AppError::bad_request("Payload must be a JSON object"));
    };

    if let Some(v) = obj.get("name") {
        if v.as_str().is_none_or(|s| s.trim().is_empty()) {
            return Err(AppError::bad_request("name cannot be empty"));
        }
    }
    if let Some(v) = obj.get("radius_m") {
        validate_radius(v.as_f64().unwrap_or(f64::NAN))?;
    }

    let coord = |key: &str, fallback: f64| -> Result<f64, AppError> {
        match obj.get(key) {
            Some(v) => v
                .as_f64()
                .ok_or_else(|| AppError::bad_request(format!("{key} must be a number"))),
            None => Ok(fallback),
        }
    };
    let point = GeoPoint::new(
        coord("latitude", current.latitude)?,
        coord("longitude", current.longitude)?,
    );
    point.validate().map_err(AppError::bad_request)
}

async fn fetch_site<'e, E>(executor: E, site_id: u64) -> Result<Site, AppError>
where
    E: Executor<'e, Database = MySql>,
{
    let sql = format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = ?");
    sqlx::query_as::<_, Site>(&sql)
        .bind(site_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found("Site not found"))
}

/// Create Site
#[utoipa::path(
    post,
    path = "/api/sites",
    request_body = CreateSite,
    responses(
        (status = 201, description = "Site created with a fresh QR token", body = Site),
        (status = 400, description = "Invalid coordinates or radius")
    ),
    tag = "Sites",
    security(("bearer_auth" = []))
)]
pub async fn create_site(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateSite>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    GeoPoint::new(payload.latitude, payload.longitude)
        .validate()
        .map_err(AppError::bad_request)?;
    let radius_m = payload.radius_m.unwrap_or(DEFAULT_RADIUS_M);
    validate_radius(radius_m)?;

    let result = sqlx::query(
        r#"
        INSERT INTO sites (name, qr_token, latitude, longitude, radius_m)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.name.trim())
    .bind(new_qr_token())
    .bind(payload.latitude)
    .bind(payload.longitude)
    .bind(radius_m)
    .execute(pool.get_ref())
    .await?;

    let site = fetch_site(pool.get_ref(), result.last_insert_id()).await?;
    info!(site_id = site.id, name = %site.name, "Site created");
    Ok(HttpResponse::Created().json(site))
}

/// List Sites
#[utoipa::path(
    get,
    path = "/api/sites",
    params(SiteQuery),
    responses((status = 200, description = "Sites", body = [Site])),
    tag = "Sites",
    security(("bearer_auth" = []))
)]
pub async fn list_sites(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SiteQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_supervisor_or_admin()?;

    let filter = if query.include_inactive.unwrap_or(false) {
        ""
    } else {
        " WHERE active = TRUE"
    };
    let sql = format!("SELECT {SITE_COLUMNS} FROM sites{filter} ORDER BY name");
    let sites = sqlx::query_as::<_, Site>(&sql)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(sites))
}

/// Get Site by ID
#[utoipa::path(
    get,
    path = "/api/sites/{site_id}",
    params(("site_id" = u64, Path, description = "Site ID")),
    responses(
        (status = 200, description = "Site found", body = Site),
        (status = 404, description = "Site not found")
    ),
    tag = "Sites",
    security(("bearer_auth" = []))
)]
pub async fn get_site(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_supervisor_or_admin()?;
    let site = fetch_site(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(site))
}

/// Update Site
#[utoipa::path(
    put,
    path = "/api/sites/{site_id}",
    params(("site_id" = u64, Path, description = "Site ID")),
    request_body(content = Object, description = "Any subset of name, latitude, longitude, radius_m, active", example = json!({
        "radius_m": 250.0
    })),
    responses(
        (status = 200, description = "Site updated", body = Site),
        (status = 400, description = "Unknown field or invalid value"),
        (status = 404, description = "Site not found")
    ),
    tag = "Sites",
    security(("bearer_auth" = []))
)]
pub async fn update_site(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let site_id = path.into_inner();

    let current = fetch_site(pool.get_ref(), site_id).await?;
    validate_update(&body, &current)?;

    let update = build_update_sql("sites", &body, UPDATABLE_COLUMNS, "id", site_id)?;
    execute_update(pool.get_ref(), update).await?;
    site_cache::invalidate(&current.qr_token).await;

    let site = fetch_site(pool.get_ref(), site_id).await?;
    info!(site_id, admin = auth.user_id, "Site updated");
    Ok(HttpResponse::Ok().json(site))
}

/// Issue a new QR token; the old code stops working immediately
#[utoipa::path(
    post,
    path = "/api/sites/{site_id}/rotate-token",
    params(("site_id" = u64, Path, description = "Site ID")),
    responses(
        (status = 200, description = "Token rotated", body = Site),
        (status = 404, description = "Site not found")
    ),
    tag = "Sites",
    security(("bearer_auth" = []))
)]
pub async fn rotate_token(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let site_id = path.into_inner();

    let current = fetch_site(pool.get_ref(), site_id).await?;

    sqlx::query("UPDATE sites SET qr_token = ? WHERE id = ?")
        .bind(new_qr_token())
        .bind(site_id)
        .execute(pool.get_ref())
        .await?;
    site_cache::invalidate(&current.qr_token).await;

    let site = fetch_site(pool.get_ref(), site_id).await?;
    info!(site_id, admin = auth.user_id, "Site QR token rotated");
    Ok(HttpResponse::Ok().json(site))
}

/// Deactivate Site
#[utoipa::path(
    delete,
    path = "/api/sites/{site_id}",
    params(("site_id" = u64, Path, description = "Site ID")),
    responses(
        (status = 200, description = "Site deactivated", body = Object, example = json!({
            "message": "Site deactivated"
        })),
        (status = 404, description = "Site not found")
    ),
    tag = "Sites",
    security(("bearer_auth" = []))
)]
pub async fn delete_site(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let site_id = path.into_inner();

    let current = fetch_site(pool.get_ref(), site_id).await?;

    // shifts keep their site_id, so deactivate instead of deleting
    sqlx::query("UPDATE sites SET active = FALSE WHERE id = ?")
        .bind(site_id)
        .execute(pool.get_ref())
        .await?;
    site_cache::invalidate(&current.qr_token).await;

    info!(site_id, admin = auth.user_id, "Site deactivated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Site deactivated" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn site() -> Site {
        Site {
            id: 3,
            name: "Jurong Yard".into(),
            qr_token: new_qr_token(),
            latitude: 1.33,
            longitude: 103.74,
            radius_m: 200.0,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn tokens_are_unique_and_dashless() {
        let a = new_qr_token();
        let b = new_qr_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(!a.contains('-'));
    }

    #[test]
    fn radius_must_be_positive() {
        assert!(validate_radius(0.0).is_err());
        assert!(validate_radius(-5.0).is_err());
        assert!(validate_radius(f64::NAN).is_err());
        assert!(validate_radius(50.0).is_ok());
    }

    #[test]
    fn update_checks_merged_coordinates() {
        let current = site();
        assert!(validate_update(&json!({ "latitude": 91.0 }), &current).is_err());
        assert!(validate_update(&json!({ "longitude": "east" }), &current).is_err());
        assert!(validate_update(&json!({ "latitude": 1.35 }), &current).is_ok());
    }

    #[test]
    fn update_checks_radius_and_name() {
        let current = site();
        assert!(validate_update(&json!({ "radius_m": 0 }), &current).is_err());
        assert!(validate_update(&json!({ "radius_m": "wide" }), &current).is_err());
        assert!(validate_update(&json!({ "name": "" }), &current).is_err());
        assert!(validate_update(&json!({ "name": "Yard 2", "radius_m": 80 }), &current).is_ok());
    }
}
