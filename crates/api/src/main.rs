use tracing::{info, warn};

use campushub_api::app::build_app;
use campushub_infra::RelayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    campushub_observability::init();

    let jwt_secret = match std::env::var("JWT_SECRET") {
        Ok(secret) => secret,
        Err(_) => {
            warn!("JWT_SECRET not set; using insecure development secret");
            "dev-secret".to_string()
        }
    };

    let app = build_app(jwt_secret.as_bytes(), RelayConfig::from_env())?;

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app.router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // Let the relay finish its current cycle before exiting.
    app.relay.shutdown().await;

    Ok(())
}
