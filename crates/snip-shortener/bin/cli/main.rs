mod cli;
mod telemetry;

use crate::cli::{Command, StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use snip_core::{OwnerId, ShortKey, Xxh32Deriver};
use snip_shortener::{BatchItem, PipelineSettings, ServiceConfig, ShortenerService};
use snip_storage::{PostgresConfig, StoreConfig};
use tokio::io::AsyncReadExt;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    telemetry::init(config.log_format);

    info!(
        storage_backend = %config.storage,
        base_url = %config.base_url,
        delete_workers = config.delete_workers,
        "starting snip"
    );

    let store_config = store_config(&config)?;
    let store = snip_storage::open(&store_config)
        .await
        .with_context(|| format!("failed to open {store_config} storage"))?;

    let service = ShortenerService::new(
        store,
        Xxh32Deriver::new(),
        ServiceConfig::builder()
            .base_url(config.base_url.clone())
            .pipeline(
                PipelineSettings::builder()
                    .workers(config.delete_workers)
                    .build(),
            )
            .build(),
    );

    let result = run(&service, config.command).await;
    service.close().await.context("failed to close storage")?;
    result
}

fn store_config(config: &CLI) -> anyhow::Result<StoreConfig> {
    let store_config = match config.storage {
        StorageBackendArg::InMemory => StoreConfig::InMemory,
        StorageBackendArg::File => {
            let path = config
                .file_storage_path
                .clone()
                .context("file storage path is required when storage backend is file")?;
            StoreConfig::File { path }
        }
        StorageBackendArg::Postgres => {
            let dsn = config
                .database_dsn
                .clone()
                .context("database dsn is required when storage backend is postgres")?;
            StoreConfig::Postgres(
                PostgresConfig::builder()
                    .dsn(dsn)
                    .max_connections(config.db_max_connections)
                    .build(),
            )
        }
    };
    Ok(store_config)
}

async fn run(service: &ShortenerService, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Shorten { url, owner } => {
            let shortened = service.shorten(&url, &OwnerId::new(owner)).await?;
            print_json(&shortened)
        }
        Command::Batch { input, owner } => {
            let raw = read_input(&input).await?;
            let items: Vec<BatchItem> =
                serde_json::from_str(&raw).context("batch input is not a valid JSON array")?;
            let shortened = service.shorten_batch(items, &OwnerId::new(owner)).await?;
            print_json(&shortened)
        }
        Command::Resolve { key } => {
            let key = ShortKey::new(key);
            let original_url = service.resolve(&key).await?;
            print_json(&json!({ "key": key, "original_url": original_url }))
        }
        Command::List { owner } => {
            let links = service.list_by_owner(&OwnerId::new(owner)).await?;
            print_json(&links)
        }
        Command::Delete { owner, keys } => {
            let keys = keys.into_iter().map(ShortKey::new).collect();
            let report = service
                .delete_batch(keys, OwnerId::new(owner))
                .await
                .context("delete batch did not run to completion")?;
            print_json(&report)
        }
        Command::Stats => print_json(&service.stats().await?),
        Command::Ping => {
            service.ping().await?;
            print_json(&json!({ "status": "ok" }))
        }
    }
}

async fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("failed to read batch from stdin")?;
        return Ok(raw);
    }

    tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("failed to read batch file {input}"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
