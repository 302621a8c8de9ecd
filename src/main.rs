//! memhub server entry point.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memhub::{config::ServerConfig, server};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    server::run(config).await
}
