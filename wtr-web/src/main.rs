//! WipeThatRecord web service (wtr-web) - Main entry point
//!
//! Serves the storefront and admin API, and runs the email worker and the
//! automation sweep in the background until shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wtr_common::api::auth::load_shared_secret;
use wtr_common::config::{self, ROOT_FOLDER_ENV};
use wtr_common::db::{init_database, settings};
use wtr_web::email::{LogMailer, Mailer, SmtpMailer};
use wtr_web::scheduler::EmailWorker;
use wtr_web::{automation, build_router, AppState};

/// Command-line arguments for wtr-web
#[derive(Parser, Debug)]
#[command(name = "wtr-web")]
#[command(about = "WipeThatRecord storefront, admin API and email automation")]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/wtr/config.toml, then /etc/wtr/config.toml)
    #[arg(short, long, env = "WTR_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database (overrides WTR_ROOT_FOLDER and the config file)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides [server] port)
    #[arg(short, long, env = "WTR_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides [server] bind)
    #[arg(long, env = "WTR_BIND")]
    bind: Option<String>,

    /// Payment webhook secret (overrides [webhook] secret)
    #[arg(long, env = "WTR_WEBHOOK_SECRET", hide_env_values = true)]
    webhook_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wtr_web=info,wtr_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting WipeThatRecord web service v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let file_config =
        config::load_file_config(args.config.as_deref()).context("Failed to load config file")?;
    let root_folder =
        config::resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &file_config);
    let db_path = config::database_path(&root_folder);
    info!("Root folder: {}", root_folder.display());

    let db = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to initialize database at {}", db_path.display()))?;
    info!("Database ready: {}", db_path.display());

    let shared_secret = load_shared_secret(&db)
        .await
        .context("Failed to load API shared secret")?;
    if shared_secret == 0 {
        warn!("Admin request signing is DISABLED (shared secret is 0)");
    }

    let mailer: Arc<dyn Mailer> = match &file_config.smtp {
        Some(smtp) => {
            info!("Sending email through {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpMailer::new(smtp).context("Invalid [smtp] configuration")?)
        }
        None => {
            warn!("No [smtp] section configured; emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let webhook_secret = args.webhook_secret.or(file_config.webhook.secret.clone());
    if webhook_secret.is_none() {
        warn!("No webhook secret configured; payment webhooks will be rejected");
    }

    let state = AppState::new(db, shared_secret, mailer)
        .with_site(file_config.site.clone())
        .with_webhook_secret(webhook_secret);

    let automation_settings = settings::automation_settings(&state.db)
        .await
        .context("Failed to load automation settings")?;

    let cancel = CancellationToken::new();
    let worker = tokio::spawn(
        EmailWorker::new(state.clone(), automation_settings.clone()).run(cancel.clone()),
    );
    let sweep = automation::spawn_sweep(
        state.clone(),
        automation_settings.sweep_interval,
        cancel.clone(),
    );

    let app = build_router(state);

    let bind = args.bind.unwrap_or(file_config.server.bind);
    let port = args.port.unwrap_or(file_config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", bind, port))?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    for (name, handle) in [("email worker", worker), ("automation sweep", sweep)] {
        if let Err(e) = handle.await {
            error!("{} task ended abnormally: {}", name, e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
