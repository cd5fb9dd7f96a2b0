mod access;
mod app;
mod claims;
mod config;
mod docs;
mod errors;
mod identity;
mod menu;
mod routes;

use std::sync::Arc;

use clap::Parser;

use app::AppState;
use config::PortalConfig;
use identity::{OidcClient, Session};

#[derive(Parser, Debug)]
#[command(author, version, about = "SSO-gated portal shell", long_about = None)]
struct Args {
    /// Port to listen on (APP_PORT overrides)
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let args = Args::parse();
    let port = std::env::var("APP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(args.port);

    let config = PortalConfig::from_env()?;
    let client = Arc::new(OidcClient::new(&config));
    let session = Session::new(client);

    // Initialization failures are logged and leave the session in the
    // blocked state; the portal still serves so consumers see a loading
    // screen instead of connection errors.
    session.initialize().await;

    let state = AppState::new(session.clone(), config);
    let app = app::create_app(state).merge(docs::swagger_routes(docs::build_openapi(port)?));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Clear the refresh timer before the process goes away.
    session.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install shutdown handler: {}", e);
    }
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
