use anyhow::{Context, Result, anyhow};
use sqlx::MySqlPool;
use tracing::info;

use crate::{auth::password::hash_password, config::AdminSeed, model::role::Role};

/// Creates the configured admin login, or resets its password and role.
pub async fn ensure_admin(pool: &MySqlPool, seed: &AdminSeed) -> Result<()> {
    let hashed = hash_password(&seed.password).map_err(|e| anyhow!("hashing admin password: {e}"))?;

    sqlx::query(
        r#"
        INSERT INTO users (username, password, role_id)
        VALUES (?, ?, ?)
        ON DUPLICATE KEY UPDATE password = VALUES(password), role_id = VALUES(role_id)
        "#,
    )
    .bind(&seed.username)
    .bind(hashed)
    .bind(Role::Admin.id())
    .execute(pool)
    .await
    .context("Failed to seed admin user")?;

    info!(username = %seed.username, "Admin login ensured");
    Ok(())
}
