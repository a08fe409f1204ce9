//! `labctl` command-line interface: server control and operational chores
//! (migrations, admin bootstrap, image cleanup).

pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "labctl", about = "Labsite API management tool", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides LABSITE_API_PORT / PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Apply database migrations
    InitDb {
        /// Also create a bootstrap super admin with this name
        #[arg(long)]
        admin_name: Option<String>,
        /// Password for the bootstrap admin (required with --admin-name)
        #[arg(long)]
        admin_pass: Option<String>,
    },

    /// Administrator account chores
    #[command(subcommand)]
    Admin(commands::admin::AdminCommand),

    /// Uploaded image chores
    #[command(subcommand)]
    Images(commands::images::ImagesCommand),
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve { port } => {
            let port = port.unwrap_or_else(crate::server::port_from_env);
            crate::server::serve(port).await
        }
        Command::InitDb {
            admin_name,
            admin_pass,
        } => commands::db::init_db(admin_name, admin_pass).await,
        Command::Admin(cmd) => commands::admin::run(cmd).await,
        Command::Images(cmd) => commands::images::run(cmd).await,
    }
}
