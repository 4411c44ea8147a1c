use calpush::calendar::{CalendarProvider, GoogleCalendarClient};
use calpush::config::Config;
use calpush::db::Storage;
use calpush::google_oauth::{GoogleOauthService, TokenSource};
use calpush::router::{AppState, calpush_router};
use mimalloc::MiMalloc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    let fmt_layer = tracing_subscriber::fmt::layer().with_level(true);
    if cfg.is_development() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.compact().with_target(false))
            .init();
    }

    let public_base_url = cfg.public_base_url.as_ref().map(|u| u.as_str());
    let proxy = cfg.proxy.as_ref().map(|u| u.as_str());
    info!(
        database_url = %cfg.database_url,
        public_base_url = %public_base_url.unwrap_or("<from Host>"),
        proxy = %proxy.unwrap_or("<none>"),
        loglevel = %cfg.loglevel,
        log_environment = %cfg.log_environment,
    );

    let http = calpush::http_client::build_http_client(&cfg)?;
    let storage = Storage::connect(&cfg.database_url).await?;

    let oauth = Arc::new(GoogleOauthService::new(&cfg, http.clone()));
    let tokens: Arc<dyn TokenSource> = oauth.clone();
    let calendar: Arc<dyn CalendarProvider> = Arc::new(GoogleCalendarClient::new(
        http,
        cfg.calendar_api_base.clone(),
    ));

    let state = AppState::new(&cfg, storage, oauth, tokens, calendar);
    let app = calpush_router(state);

    let addr = cfg.listen_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
