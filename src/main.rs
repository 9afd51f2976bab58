use metrics_acl::app::{self, AppState};
use metrics_acl::config::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let config = GatewayConfig::from_env()?;
    let state = AppState::bootstrap(&config)?;
    spawn_hangup_reload(state.clone());

    let app = app::create_app(state);

    tracing::info!("listening on {}", config.listen);

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Re-read the ACL file whenever the process receives SIGHUP.
#[cfg(unix)]
fn spawn_hangup_reload(state: AppState) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(error = %err, "unable to install SIGHUP handler, reload via api only");
                return;
            }
        };

        while hangup.recv().await.is_some() {
            tracing::info!(path = %state.acl_file.display(), "SIGHUP received, reloading policy");
            let policy = state.policy.clone();
            let acl_file = state.acl_file.clone();
            // outcome is logged by the handle
            if let Err(err) = tokio::task::spawn_blocking(move || policy.reload_from_path(acl_file.as_path())).await {
                tracing::error!(error = %err, "policy reload task failed");
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_hangup_reload(_state: AppState) {}

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
