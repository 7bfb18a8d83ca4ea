use crate::config::Config;
use crate::errors::AppError;
use crate::{auth::jwt::verify_token, model::role::Role, models::TokenType};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this login belongs to a worker record
    pub worker_id: Option<u64>,
}

fn from_headers(req: &HttpRequest) -> Result<AuthUser, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;

    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| AppError::Internal("Config missing".into()))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid token".into()))?;

    if claims.token_type != TokenType::Access {
        return Err(AppError::Unauthorized("Access token required".into()));
    }

    let role = Role::from_id(claims.role).ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?;

    Ok(AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role,
        worker_id: claims.worker_id,
    })
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // the auth middleware already decoded the token for protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }
        ready(from_headers(req).map_err(Into::into))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin only"))
        }
    }

    pub fn require_supervisor_or_admin(&self) -> Result<(), AppError> {
        if matches!(self.role, Role::Admin | Role::Supervisor) {
            Ok(())
        } else {
            Err(AppError::forbidden("Supervisor/Admin only"))
        }
    }

    /// Returns true if the user is a worker
    pub fn is_worker(&self) -> bool {
        self.role == Role::Worker
    }

    /// The worker record behind this login, for self-service endpoints.
    pub fn worker_id(&self) -> Result<u64, AppError> {
        self.worker_id
            .ok_or_else(|| AppError::forbidden("No worker profile"))
    }

    /// Staff may read any worker; a worker only themself.
    pub fn can_view_worker(&self, worker_id: u64) -> bool {
        !self.is_worker() || self.worker_id == Some(worker_id)
    }

    pub(crate) fn decode(req: &HttpRequest) -> Result<AuthUser, AppError> {
        from_headers(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use crate::rules::PayPolicy;
    use actix_web::test::TestRequest;
    use chrono::FixedOffset;

    fn test_config() -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: "unit-test-secret".into(),
            server_addr: "127.0.0.1:0".into(),
            access_token_ttl: 900,
            refresh_token_ttl: 3600,
            rate_login_per_min: 60,
            rate_register_per_min: 30,
            rate_refresh_per_min: 30,
            rate_scan_per_min: 20,
            rate_protected_per_min: 1000,
            api_prefix: "/api".into(),
            tz_offset: FixedOffset::east_opt(8 * 3600).unwrap(),
            scan_debounce_secs: 60,
            max_shift_hours: 24,
            site_cache_ttl_secs: 300,
            pay_policy: PayPolicy::default(),
            admin_seed: None,
        }
    }

    #[actix_web::test]
    async fn extracts_worker_from_bearer_token() {
        let config = test_config();
        let token =
            generate_access_token(5, "ravi".into(), Role::Worker.id(), Some(11), &config.jwt_secret, 900)
                .unwrap();
        let req = TestRequest::default()
            .app_data(Data::new(config))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_http_request();

        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.user_id, 5);
        assert_eq!(user.role, Role::Worker);
        assert_eq!(user.worker_id().unwrap(), 11);
        assert!(user.require_supervisor_or_admin().is_err());
        assert!(user.can_view_worker(11));
        assert!(!user.can_view_worker(12));
    }

    #[actix_web::test]
    async fn missing_header_is_unauthorized() {
        let req = TestRequest::default()
            .app_data(Data::new(test_config()))
            .to_http_request();
        let err = AuthUser::extract(&req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), 401);
    }

    #[actix_web::test]
    async fn refresh_token_cannot_call_the_api() {
        let config = test_config();
        let (token, _) =
            generate_refresh_token(1, "boss".into(), Role::Admin.id(), None, &config.jwt_secret, 900).unwrap();
        let req = TestRequest::default()
            .app_data(Data::new(config))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_http_request();
        assert!(AuthUser::extract(&req).await.is_err());
    }

    #[test]
    fn role_guards() {
        let admin = AuthUser {
            user_id: 1,
            username: "boss".into(),
            role: Role::Admin,
            worker_id: None,
        };
        assert!(admin.require_admin().is_ok());
        assert!(admin.require_supervisor_or_admin().is_ok());
        assert!(admin.worker_id().is_err());
        assert!(admin.can_view_worker(99));

        let supervisor = AuthUser { role: Role::Supervisor, ..admin };
        assert!(supervisor.require_admin().is_err());
        assert!(supervisor.require_supervisor_or_admin().is_ok());
    }
}
