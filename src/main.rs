use anyhow::{Context, Result};
use chrono::DateTime;
use scheduling_inbox::{
    SchedulingObject,
    services::sqlite_backend::{SqliteSchedulingBackend, run_migrations},
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{fs, str::FromStr, sync::Arc};
use tracing_subscriber::EnvFilter;

mod config;

use config::Command;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate, command) = config::AppConfig::from_env_and_args();

    tracing::info!("Starting scheduling-inbox with config: {:?}", cfg);

    // Create parent directory if needed
    if let Some(parent) = cfg.database_path().as_deref().and_then(|p| p.parent()) {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let options = SqliteConnectOptions::from_str(&cfg.database_url)
        .with_context(|| format!("parsing database url `{}`", cfg.database_url))?
        .create_if_missing(true);
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?,
    );

    // --- Handle migration mode ---
    if migrate {
        run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    let backend = Arc::new(SqliteSchedulingBackend::new(db));

    match command {
        Some(command) => run(backend, command).await,
        None => {
            tracing::warn!("No command given; use --help to list commands");
            Ok(())
        }
    }
}

async fn run(backend: Arc<SqliteSchedulingBackend>, command: Command) -> Result<()> {
    match command {
        Command::List { principal } => {
            for meta in backend.list_scheduling_objects(&principal).await? {
                let node = SchedulingObject::new(backend.clone(), meta)?;
                let listing = node.metadata();
                println!(
                    "{}\t{}\t{}\t{}",
                    node.get_name(),
                    listing.etag.as_deref().unwrap_or("-"),
                    listing
                        .size
                        .map_or_else(|| "-".to_string(), |size| size.to_string()),
                    format_timestamp(node.get_last_modified()),
                );
            }
        }
        Command::Show { principal, uri } => {
            let mut node = open(&backend, &principal, &uri).await?;
            let content = node.get_content().await?;
            println!("Content-Type: {}", node.get_content_type());
            println!("ETag: {}", node.get_etag().await?);
            println!("Content-Length: {}", node.get_size().await?);
            println!("Last-Modified: {}", format_timestamp(node.get_last_modified()));
            println!("Owner: {}", node.get_owner());
            println!();
            print!("{}", String::from_utf8_lossy(&content));
        }
        Command::Acl { principal, uri } => {
            let node = open(&backend, &principal, &uri).await?;
            println!("{}", serde_json::to_string_pretty(&node.get_acl())?);
        }
        Command::Delete { principal, uri } => {
            let node = open(&backend, &principal, &uri).await?;
            node.delete().await?;
            tracing::info!("Deleted {} from {}", uri, principal);
        }
        Command::Deliver {
            principal,
            uri,
            file,
        } => {
            let data = fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let stored = backend
                .create_scheduling_object(&principal, &uri, data)
                .await?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
    }

    Ok(())
}

/// Build a node from the listing entry, so the payload stays unloaded until
/// a command actually needs it.
async fn open(
    backend: &Arc<SqliteSchedulingBackend>,
    principal: &str,
    uri: &str,
) -> Result<SchedulingObject<SqliteSchedulingBackend>> {
    let meta = backend
        .list_scheduling_objects(principal)
        .await?
        .into_iter()
        .find(|meta| meta.uri.as_deref() == Some(uri))
        .with_context(|| format!("scheduling object `{}` not found for `{}`", uri, principal))?;
    Ok(SchedulingObject::new(backend.clone(), meta)?)
}

fn format_timestamp(timestamp: Option<i64>) -> String {
    timestamp
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map_or_else(|| "-".to_string(), |at| at.to_rfc2822())
}
