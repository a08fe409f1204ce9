use clap::Subcommand;

use crate::database::manager::DatabaseManager;
use crate::services::auth_service::hash_password;

#[derive(Subcommand)]
pub enum AdminCommand {
    /// Create an administrator account
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
        /// Grant super admin privileges
        #[arg(long, default_value_t = false)]
        superuser: bool,
    },

    /// Reset an administrator's password
    ResetPassword {
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },
}

pub async fn run(cmd: AdminCommand) -> anyhow::Result<()> {
    let pool = DatabaseManager::pool().await?;

    match cmd {
        AdminCommand::Create {
            name,
            password,
            superuser,
        } => {
            anyhow::ensure!(password.len() >= 8, "password must be at least 8 characters");

            let existing: Option<i64> =
                sqlx::query_scalar("SELECT admin_id FROM admins WHERE admin_name = $1")
                    .bind(&name)
                    .fetch_optional(&pool)
                    .await?;
            anyhow::ensure!(existing.is_none(), "admin '{}' already exists", name);

            let hash = hash_password(&password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
            sqlx::query(
                "INSERT INTO admins (admin_name, admin_pass, is_super, enable) VALUES ($1, $2, $3, 1)",
            )
            .bind(&name)
            .bind(&hash)
            .bind(if superuser { 1i16 } else { 0i16 })
            .execute(&pool)
            .await?;

            println!("created admin '{}'", name);
        }

        AdminCommand::ResetPassword { name, password } => {
            anyhow::ensure!(password.len() >= 8, "password must be at least 8 characters");

            let hash = hash_password(&password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
            let result =
                sqlx::query("UPDATE admins SET admin_pass = $2, updated_at = now() WHERE admin_name = $1")
                    .bind(&name)
                    .bind(&hash)
                    .execute(&pool)
                    .await?;

            anyhow::ensure!(result.rows_affected() == 1, "admin '{}' not found", name);
            println!("password reset for '{}'", name);
        }
    }

    Ok(())
}
