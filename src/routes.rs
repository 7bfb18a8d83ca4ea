use crate::{
    api::{attendance, calendar, leave_request, payroll, shifts, sites, users, workers},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-route rate limiters, built once and shared by every worker thread.
#[derive(Clone)]
pub struct Limiters {
    login: Limiter,
    register: Limiter,
    refresh: Limiter,
    scan: Limiter,
    protected: Limiter,
}

fn build_limiter(name: &str, requests_per_min: u32) -> Result<Limiter> {
    if requests_per_min == 0 {
        return Err(anyhow!("{name}: rate limit must be at least 1 request per minute"));
    }
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("{name}: invalid rate limiter settings"))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: build_limiter("RATE_LOGIN_PER_MIN", config.rate_login_per_min)?,
            register: build_limiter("RATE_REGISTER_PER_MIN", config.rate_register_per_min)?,
            refresh: build_limiter("RATE_REFRESH_PER_MIN", config.rate_refresh_per_min)?,
            scan: build_limiter("RATE_SCAN_PER_MIN", config.rate_scan_per_min)?,
            protected: build_limiter("RATE_PROTECTED_PER_MIN", config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: Limiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limiters.protected.clone()) // rate limiting
            .service(handlers::me)
            .service(web::resource("/users").route(web::post().to(users::create_user)))
            .service(
                web::scope("/attendance")
                    // /attendance/scan, throttled harder than the rest
                    .service(
                        web::resource("/scan")
                            .wrap(limiters.scan.clone())
                            .route(web::post().to(attendance::scan)),
                    )
                    .service(web::resource("/break/start").route(web::post().to(attendance::start_break)))
                    .service(web::resource("/break/end").route(web::post().to(attendance::end_break)))
                    .service(web::resource("/me").route(web::get().to(attendance::my_shifts)))
                    .service(web::resource("/open").route(web::get().to(attendance::open_shift))),
            )
            .service(
                web::scope("/shifts")
                    .service(web::resource("").route(web::get().to(shifts::list_shifts)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(shifts::get_shift))
                            .route(web::put().to(shifts::update_shift))
                            .route(web::delete().to(shifts::delete_shift)),
                    ),
            )
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    // /leave/me before /leave/{id}
                    .service(web::resource("/me").route(web::get().to(leave_request::my_leave)))
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave)))
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    )
                    .service(
                        web::resource("/{id}/cancel")
                            .route(web::put().to(leave_request::cancel_leave)),
                    ),
            )
            .service(
                web::scope("/workers")
                    .service(
                        web::resource("")
                            .route(web::post().to(workers::create_worker))
                            .route(web::get().to(workers::list_workers)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(workers::get_worker))
                            .route(web::put().to(workers::update_worker))
                            .route(web::delete().to(workers::delete_worker)),
                    ),
            )
            .service(
                web::scope("/sites")
                    .service(
                        web::resource("")
                            .route(web::post().to(sites::create_site))
                            .route(web::get().to(sites::list_sites)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(sites::get_site))
                            .route(web::put().to(sites::update_site))
                            .route(web::delete().to(sites::delete_site)),
                    )
                    .service(
                        web::resource("/{id}/rotate-token").route(web::post().to(sites::rotate_token)),
                    ),
            )
            .service(
                web::scope("/calendar")
                    .service(
                        web::resource("/holidays")
                            .route(web::get().to(calendar::list_holidays))
                            .route(web::post().to(calendar::add_holiday)),
                    )
                    .service(
                        web::resource("/holidays/{date}")
                            .route(web::delete().to(calendar::delete_holiday)),
                    )
                    .service(
                        web::resource("/working-days")
                            .route(web::get().to(calendar::list_working_days))
                            .route(web::put().to(calendar::set_working_days)),
                    ),
            )
            .service(
                web::scope("/payroll")
                    // /payroll
                    .service(web::resource("").route(web::get().to(payroll::list_payslips)))
                    .service(web::resource("/preview").route(web::get().to(payroll::preview_payslip)))
                    .service(web::resource("/generate").route(web::post().to(payroll::generate_payslip)))
                    .service(web::resource("/me").route(web::get().to(payroll::my_payslips)))
                    // /payroll/{id}
                    .service(web::resource("/{id}").route(web::get().to(payroll::get_payslip))),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// SCAN
//  └─ POST /api/attendance/scan { qr_token, latitude, longitude }
//       ├─ no open shift  → clock in
//       └─ open shift     → clock out, hours classified

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token + rotated refresh_token
