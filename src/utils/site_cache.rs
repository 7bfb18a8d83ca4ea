use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::OnceCell;
use sqlx::MySqlPool;
use std::time::Duration;

use crate::model::site::{SITE_COLUMNS, Site};

const DEFAULT_TTL_SECS: u64 = 300;

/// QR token => active site. Every scan goes through here.
static SITE_CACHE: OnceCell<Cache<String, Site>> = OnceCell::new();

fn build(ttl_secs: u64) -> Cache<String, Site> {
    Cache::builder()
        .max_capacity(10_000)
        .time_to_live(Duration::from_secs(ttl_secs))
        .build()
}

/// Sets the entry TTL; only the first call has an effect.
pub fn init(ttl_secs: u64) {
    let _ = SITE_CACHE.set(build(ttl_secs));
}

fn cache() -> &'static Cache<String, Site> {
    SITE_CACHE.get_or_init(|| build(DEFAULT_TTL_SECS))
}

/// Looks up an active site by the token printed in its QR code.
pub async fn resolve(pool: &MySqlPool, qr_token: &str) -> Result<Option<Site>, sqlx::Error> {
    let token = qr_token.trim();
    if token.is_empty() {
        return Ok(None);
    }

    if let Some(site) = cache().get(token).await {
        return Ok(Some(site));
    }

    let sql = format!("SELECT {SITE_COLUMNS} FROM sites WHERE qr_token = ? AND active = TRUE");
    let site = sqlx::query_as::<_, Site>(&sql)
        .bind(token)
        .fetch_optional(pool)
        .await?;

    if let Some(site) = &site {
        cache().insert(site.qr_token.clone(), site.clone()).await;
    }
    Ok(site)
}

/// Drops a token after rotation, edits or deactivation.
pub async fn invalidate(qr_token: &str) {
    cache().invalidate(qr_token).await;
}

/// Loads every active site so the first scans of the day skip the database.
pub async fn warmup_site_cache(pool: &MySqlPool) -> Result<()> {
    let sql = format!("SELECT {SITE_COLUMNS} FROM sites WHERE active = TRUE");
    let mut stream = sqlx::query_as::<_, Site>(&sql).fetch(pool);

    let mut total = 0usize;
    while let Some(row) = stream.next().await {
        let site = row?;
        cache().insert(site.qr_token.clone(), site).await;
        total += 1;
    }

    tracing::info!(sites = total, "Site cache warmup complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn site(token: &str) -> Site {
        Site {
            id: 1,
            name: "Depot".into(),
            qr_token: token.into(),
            latitude: 1.3,
            longitude: 103.8,
            radius_m: 100.0,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[actix_web::test]
    async fn invalidate_removes_cached_site() {
        cache().insert("tok-a".into(), site("tok-a")).await;
        assert!(cache().get("tok-a").await.is_some());

        invalidate("tok-a").await;
        assert!(cache().get("tok-a").await.is_none());
    }
}
