//! songtracker - personal song list service
//!
//! `songtracker serve` runs the HTTP API. The other subcommands are
//! maintenance tasks run against the same root folder.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use songtracker::backup;
use songtracker::db::users;
use songtracker::legacy::{import_into_database, JsonUserStore};
use songtracker::{build_router, AppSettings, AppState};
use songtracker_common::config::{
    RootFolderInitializer, RootFolderResolver, ServiceConfig, TomlConfig,
};
use songtracker_common::db::{init_database, Role};
use songtracker_common::time::{hours_to_duration, now_millis};
use sqlx::SqlitePool;
use tokio::signal;
use tracing::{error, info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "songtracker")]
#[command(about = "Track the songs you want to learn and the ones you have")]
#[command(version)]
struct Cli {
    /// Root folder holding the database and backups
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Address to bind (overrides the config file)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Write a backup snapshot now
    Backup,
    /// Replace all data with the snapshot taken at TIMESTAMP (ms)
    Restore { timestamp: i64 },
    /// Check every stored user record
    Verify,
    /// Import users from a legacy users.json file
    ImportJson { path: PathBuf },
    /// Give the user with EMAIL the admin role
    Promote { email: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    info!("songtracker v{}", env!("CARGO_PKG_VERSION"));

    let toml = TomlConfig::load();
    let root_folder = RootFolderResolver::with_config(toml.clone())
        .cli_arg(cli.root_folder)
        .resolve();
    let mut config = ServiceConfig::from_toml(root_folder, &toml);

    let initializer = RootFolderInitializer::new(config.root_folder.clone());
    initializer
        .ensure_directory_exists()
        .with_context(|| format!("Cannot create {}", config.root_folder.display()))?;
    info!("Root folder: {}", initializer.root_folder().display());

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let backup_dir = initializer.backup_dir();

    match cli.command {
        Command::Serve { port, bind } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(bind) = bind {
                config.bind = bind;
            }
            serve(pool.clone(), config).await?;
        }
        Command::Backup => {
            let created = backup::create_backup(&pool, &backup_dir).await?;
            let max_age = Duration::from_secs(config.backup_max_age_days * 24 * 60 * 60);
            let removed = backup::cleanup_old_backups(&backup_dir, max_age, now_millis()).await?;
            info!(
                "Backup written to {} ({} old backups removed)",
                created.path.display(),
                removed.len()
            );
        }
        Command::Restore { timestamp } => {
            let summary = backup::restore_backup(&pool, &backup_dir, timestamp).await?;
            info!(
                "Restored {} users, {} tracked and {} completed songs from backup {}",
                summary.users, summary.tracked_songs, summary.completed_songs, summary.timestamp
            );
        }
        Command::Verify => {
            let count = users::verify_db_integrity(&pool).await?;
            info!("All {} user records are valid", count);
        }
        Command::ImportJson { path } => {
            if !path.is_file() {
                bail!("{} does not exist", path.display());
            }
            let store = JsonUserStore::open(path);
            let report = import_into_database(&store, &pool).await?;
            for (index, reason) in &report.skipped {
                warn!("Skipped legacy user at index {}: {}", index, reason);
            }
            info!(
                "Imported {} users with {} songs",
                report.imported, report.songs
            );
        }
        Command::Promote { email } => {
            let user = users::set_role(&pool, &email, Role::Admin).await?;
            info!("{} <{}> is now an admin", user.name, user.email);
        }
    }

    pool.close().await;
    Ok(())
}

async fn serve(pool: SqlitePool, config: ServiceConfig) -> Result<()> {
    let settings = AppSettings::from_config(&config);

    let scheduler = backup::spawn_backup_scheduler(
        pool.clone(),
        settings.backup_dir.clone(),
        hours_to_duration(config.backup_interval_hours),
        settings.backup_max_age,
    );

    let state = AppState::new(pool, settings);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.bind, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("songtracker listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    scheduler.abort();
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
