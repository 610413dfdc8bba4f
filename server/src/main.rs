use axum::http::HeaderValue;
use presence_chat::config::{generate_config_template, Config};
use presence_chat::{routes, state};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("presence_chat=info"));
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(env_filter)
            .init();
    }

    tracing::info!("Presence chat server v{} starting", env!("CARGO_PKG_VERSION"));

    let origin = HeaderValue::from_str(&config.allowed_origin)?;
    tracing::info!(origin = %config.allowed_origin, "Cross-origin access restricted");

    let state = state::AppState::new().with_allowed_origin(origin.clone());
    let app = routes::build_router(state, routes::cors_layer(&origin));

    // Bind and serve
    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
