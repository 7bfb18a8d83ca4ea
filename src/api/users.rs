use crate::{
    auth::{auth::AuthUser, password::hash_password},
    errors::{AppError, is_duplicate_key},
    model::role::Role,
    utils::lookups,
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateUser {
    #[schema(example = "lim.supervisor")]
    pub username: String,
    pub password: String,
    /// admin, supervisor or worker
    #[schema(example = "supervisor")]
    pub role: String,
    /// Worker record behind the login; required for the worker role
    pub worker_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct CreatedUser {
    pub id: u64,
    pub username: String,
    #[schema(example = "supervisor")]
    pub role: String,
    pub worker_id: Option<u64>,
}

impl CreateUser {
    /// Normalised username and parsed role.
    fn validate(&self) -> Result<(String, Role), AppError> {
        let username = self.username.trim().to_lowercase();
        if username.is_empty() || self.password.is_empty() {
            return Err(AppError::bad_request("Username and password must not be empty"));
        }
        let role = Role::from_name(&self.role)
            .ok_or_else(|| AppError::bad_request("role must be admin, supervisor or worker"))?;
        if role == Role::Worker && self.worker_id.is_none() {
            return Err(AppError::bad_request("A worker login needs a worker_id"));
        }
        Ok((username, role))
    }
}

/// Create a login with any role (admin only)
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "Login created", body = CreatedUser),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Worker not found"),
        (status = 409, description = "Username taken or worker already has a login")
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateUser>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let (username, role) = payload.validate()?;

    if let Some(worker_id) = payload.worker_id {
        lookups::fetch_worker(pool.get_ref(), worker_id).await?;
    }

    let hashed = hash_password(&payload.password)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

    let result = sqlx::query("INSERT INTO users (username, password, role_id, worker_id) VALUES (?, ?, ?, ?)")
        .bind(&username)
        .bind(hashed)
        .bind(role.id())
        .bind(payload.worker_id)
        .execute(pool.get_ref())
        .await;

    let id = match result {
        Ok(res) => res.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            return Err(AppError::conflict(
                "Username already taken or worker already has a login",
            ));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = id, role = ?role, created_by = auth.user_id, "Login created");
    Ok(HttpResponse::Created().json(CreatedUser {
        id,
        username,
        role: role.name().to_string(),
        worker_id: payload.worker_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, role: &str, worker_id: Option<u64>) -> CreateUser {
        CreateUser {
            username: username.into(),
            password: "s3cret!".into(),
            role: role.into(),
            worker_id,
        }
    }

    #[test]
    fn supervisor_needs_no_worker_record() {
        let (username, role) = request(" Lim.Sup ", "supervisor", None).validate().unwrap();
        assert_eq!(username, "lim.sup");
        assert_eq!(role, Role::Supervisor);
    }

    #[test]
    fn worker_login_requires_worker_id() {
        assert!(request("ravi", "worker", None).validate().is_err());
        assert_eq!(request("ravi", "worker", Some(7)).validate().unwrap().1, Role::Worker);
    }

    #[test]
    fn unknown_role_and_blank_fields_are_rejected() {
        assert!(request("ravi", "owner", None).validate().is_err());
        assert!(request("  ", "admin", None).validate().is_err());

        let mut no_password = request("ravi", "admin", None);
        no_password.password.clear();
        assert!(no_password.validate().is_err());
    }
}
