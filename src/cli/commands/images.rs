use clap::Subcommand;

use crate::database::manager::DatabaseManager;
use crate::services::image_upload_service::ImageUploadService;

#[derive(Subcommand)]
pub enum ImagesCommand {
    /// Delete unused description images older than the cutoff
    Cleanup {
        /// Age threshold in hours
        #[arg(long, default_value_t = 24)]
        older_than_hours: i64,
    },
}

pub async fn run(cmd: ImagesCommand) -> anyhow::Result<()> {
    match cmd {
        ImagesCommand::Cleanup { older_than_hours } => {
            let pool = DatabaseManager::pool().await?;
            let service = ImageUploadService::new(pool);

            // System-initiated: no acting admin on the audit record
            let report = service
                .cleanup_unused(older_than_hours, None)
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;

            println!(
                "deleted {} unused image(s) older than {}h",
                report.deleted_count, older_than_hours
            );
            for filename in report.deleted_files {
                println!("  removed {}", filename);
            }
        }
    }

    Ok(())
}
