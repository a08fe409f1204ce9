use labsite_api::{config, server};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("starting labsite-api in {:?} mode", config.environment);

    let port = server::port_from_env();
    if let Err(e) = server::serve(port).await {
        eprintln!("server error: {}", e);
        std::process::exit(1);
    }
}
