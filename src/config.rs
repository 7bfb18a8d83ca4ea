use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::FixedOffset;
use dotenvy::dotenv;
use rust_decimal::Decimal;

use crate::rules::PayPolicy;

/// First admin login, created or reset at start-up.
#[derive(Clone)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_scan_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Local time zone of the sites; shift dates and Sundays are judged in it.
    pub tz_offset: FixedOffset,
    pub scan_debounce_secs: i64,
    /// A scan never closes a shift open longer than this.
    pub max_shift_hours: i64,
    pub site_cache_ttl_secs: u64,
    pub pay_policy: PayPolicy,

    pub admin_seed: Option<AdminSeed>,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parse_or<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    parse_value(key, &raw)
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("{key}: invalid value {raw:?}: {e}"))
}

fn offset_from_hours(hours: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(hours * 3600).ok_or_else(|| anyhow!("TZ_OFFSET_HOURS out of range: {hours}"))
}

fn admin_seed(username: Option<String>, password: Option<String>) -> Result<Option<AdminSeed>> {
    match (username, password) {
        (None, None) => Ok(None),
        (Some(username), Some(password)) => {
            let username = username.trim().to_lowercase();
            if username.is_empty() || password.is_empty() {
                return Err(anyhow!("ADMIN_USERNAME and ADMIN_PASSWORD must not be empty"));
            }
            Ok(Some(AdminSeed { username, password }))
        }
        _ => Err(anyhow!("ADMIN_USERNAME and ADMIN_PASSWORD must be set together")),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let pay_policy = PayPolicy {
            normal_hours_weekday: parse_or::<Decimal>("NORMAL_HOURS_WEEKDAY", "8")?,
            normal_hours_saturday: parse_or::<Decimal>("NORMAL_HOURS_SATURDAY", "5")?,
            ot_multiplier: parse_or::<Decimal>("OT_MULTIPLIER", "1.5")?,
            sun_ph_multiplier: parse_or::<Decimal>("SUN_PH_MULTIPLIER", "2.0")?,
            monthly_ot_cap_hours: parse_or::<Decimal>("MONTHLY_OT_CAP_HOURS", "72")?,
            cpf_ow_ceiling: parse_or::<Decimal>("CPF_OW_CEILING", "8000")?,
        };

        let max_shift_hours: i64 = parse_or("MAX_SHIFT_HOURS", "24")?;
        if max_shift_hours <= 0 {
            return Err(anyhow!("MAX_SHIFT_HOURS must be positive"));
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parse_or("ACCESS_TOKEN_TTL", "900")?, // default 15 min
            refresh_token_ttl: parse_or("REFRESH_TOKEN_TTL", "604800")?, // default 7 days

            rate_login_per_min: parse_or("RATE_LOGIN_PER_MIN", "60")?,
            rate_register_per_min: parse_or("RATE_REGISTER_PER_MIN", "30")?,
            rate_refresh_per_min: parse_or("RATE_REFRESH_PER_MIN", "30")?,
            rate_scan_per_min: parse_or("RATE_SCAN_PER_MIN", "20")?,
            rate_protected_per_min: parse_or("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            tz_offset: offset_from_hours(parse_or("TZ_OFFSET_HOURS", "8")?)?,
            scan_debounce_secs: parse_or("SCAN_DEBOUNCE_SECS", "60")?,
            max_shift_hours,
            site_cache_ttl_secs: parse_or("SITE_CACHE_TTL_SECS", "300")?,
            pay_policy,

            admin_seed: admin_seed(env::var("ADMIN_USERNAME").ok(), env::var("ADMIN_PASSWORD").ok())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_value_reports_the_key() {
        let err = parse_value::<u32>("RATE_LOGIN_PER_MIN", "lots").unwrap_err();
        assert!(err.to_string().contains("RATE_LOGIN_PER_MIN"));
    }

    #[test]
    fn parse_value_trims_and_parses_decimals() {
        let value: Decimal = parse_value("OT_MULTIPLIER", " 1.5 ").unwrap();
        assert_eq!(value, dec!(1.5));
    }

    #[test]
    fn admin_seed_needs_both_values() {
        assert!(admin_seed(None, None).unwrap().is_none());
        assert!(admin_seed(Some("root".into()), None).is_err());
        assert!(admin_seed(None, Some("pw".into())).is_err());
        assert!(admin_seed(Some("  ".into()), Some("pw".into())).is_err());

        let seed = admin_seed(Some(" Site.Admin ".into()), Some("s3cret!".into()))
            .unwrap()
            .unwrap();
        assert_eq!(seed.username, "site.admin");
        assert_eq!(seed.password, "s3cret!");
    }

    #[test]
    fn offset_is_bounded() {
        assert_eq!(offset_from_hours(8).unwrap().local_minus_utc(), 8 * 3600);
        assert!(offset_from_hours(30).is_err());
    }
}
