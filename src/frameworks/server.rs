use crate::domain::config::GuestAccountConfig;
use crate::domain::errors::GuestError;
use crate::domain::ports::{Clock, HostDirectory, IdentityBackend, RandomSource};
use crate::frameworks::{config, db};
use crate::interface_adapters::backends::{LocalIdentityBackend, RemoteIdentityBackend};
use crate::interface_adapters::clients::admin_http::AdminHttpClient;
use crate::interface_adapters::clients::remote_admin::RemoteIdentityAdminClient;
use crate::interface_adapters::routes::app;
use crate::interface_adapters::state::{AppState, OsRandom, SystemClock};
use crate::interface_adapters::stores::{PostgresGuestTracker, PostgresHostDirectory};
use crate::use_cases::reap_expired::{ExpiryReaper, ReaperHandle, ReaperSchedule, spawn_reaper};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run() {
    // Load .env locally; safe to ignore when not present.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config_path = config::guest_config_path();
    let guest_config = match config::load_guest_config(&config_path) {
        Ok(value) => Arc::new(value),
        Err(e) => {
            tracing::error!(path = %config_path.display(), error = %e, "invalid guest configuration");
            return;
        }
    };

    let database_url = match config::database_url() {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "missing database configuration");
            return;
        }
    };

    let pool = match db::connect_pool(&database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to database");
            return;
        }
    };

    if let Err(e) = db::run_migrations(&pool).await {
        tracing::error!(error = %e, "failed to run migrations");
        return;
    }

    let state = match build_state(pool, guest_config.clone()) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to build identity backend");
            return;
        }
    };
    tracing::info!(backend = state.backend.name(), "identity backend configured");

    let reaper = guest_config
        .enable_user_reaper
        .then(|| start_reaper(state.backend.clone(), &guest_config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config::http_port()));

    // Bind TCP listener with error handling.
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind");
            if let Some(reaper) = reaper {
                reaper.stop().await;
            }
            return;
        }
    };
    tracing::info!(%addr, "listening");

    serve(listener, state, reaper).await;
}

// Serve until Ctrl-C, then stop the reaper if one is running.
pub async fn serve(listener: TcpListener, state: AppState, reaper: Option<ReaperHandle>) {
    let result = axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = result {
        tracing::error!(error = %e, "server error");
    }

    if let Some(reaper) = reaper {
        reaper.stop().await;
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        // Keep serving rather than shutting down on a broken signal handler.
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

// Picks the backend from configuration: a `[remote]` table selects the
// remote admin service, otherwise guests live on the host directly.
fn build_state(pool: PgPool, config: Arc<GuestAccountConfig>) -> Result<AppState, GuestError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let random: Arc<dyn RandomSource> = Arc::new(OsRandom);
    let host: Arc<dyn HostDirectory> = Arc::new(PostgresHostDirectory::new(
        pool.clone(),
        config.server_name.clone(),
        clock.clone(),
        random.clone(),
    ));
    let http = AdminHttpClient::new(config::http_timeout())?;

    let backend: Arc<dyn IdentityBackend> = match &config.remote {
        Some(remote) => {
            let client = RemoteIdentityAdminClient::new(remote, http, random)?;
            Arc::new(RemoteIdentityBackend::new(
                client,
                host.clone(),
                Arc::new(PostgresGuestTracker::new(pool)),
                clock,
                config.clone(),
            ))
        }
        None => Arc::new(LocalIdentityBackend::new(
            host.clone(),
            http,
            clock,
            config.clone(),
        )),
    };

    Ok(AppState {
        config,
        backend,
        host,
    })
}

fn start_reaper(backend: Arc<dyn IdentityBackend>, config: &GuestAccountConfig) -> ReaperHandle {
    tracing::info!(
        expiration_secs = config.user_expiration.as_secs(),
        "starting guest reaper"
    );
    spawn_reaper(
        ExpiryReaper {
            backend,
            clock: SystemClock,
            user_expiration: config.user_expiration,
        },
        ReaperSchedule::default(),
    )
}
