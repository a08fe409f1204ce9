use anyhow::Context;

use crate::database::manager::DatabaseManager;
use crate::services::auth_service::hash_password;

/// Apply migrations, optionally bootstrapping the first super admin.
pub async fn init_db(admin_name: Option<String>, admin_pass: Option<String>) -> anyhow::Result<()> {
    DatabaseManager::migrate()
        .await
        .context("failed to apply migrations")?;
    println!("migrations applied");

    if let Some(name) = admin_name {
        let pass = admin_pass.context("--admin-pass is required with --admin-name")?;
        anyhow::ensure!(pass.len() >= 8, "password must be at least 8 characters");

        let pool = DatabaseManager::pool().await?;
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT admin_id FROM admins WHERE admin_name = $1")
                .bind(&name)
                .fetch_optional(&pool)
                .await?;
        if existing.is_some() {
            println!("admin '{}' already exists, skipping bootstrap", name);
            return Ok(());
        }

        let hash = hash_password(&pass).map_err(|e| anyhow::anyhow!(e.to_string()))?;
        sqlx::query("INSERT INTO admins (admin_name, admin_pass, is_super, enable) VALUES ($1, $2, 1, 1)")
            .bind(&name)
            .bind(&hash)
            .execute(&pool)
            .await?;
        println!("created super admin '{}'", name);
    }

    Ok(())
}
