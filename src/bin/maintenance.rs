use std::collections::HashSet;
use std::env;

use anyhow::{Context, Result};
use diesel::prelude::*;

use taskbox::{
    config::AppConfig,
    db, repo,
    schema::attachments,
    storage::{build_s3_client, object_key_from_path, orphaned_keys, BlobStore, S3Store},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("stats") => stats()?,
        Some("audit-orphans") => audit_orphans(false).await?,
        Some("purge-orphans") => audit_orphans(true).await?,
        Some(cmd) => {
            eprintln!(
                "Unknown command: {cmd}\nUsage: maintenance stats|audit-orphans|purge-orphans"
            );
            std::process::exit(1);
        }
        None => {
            eprintln!("Usage: maintenance stats|audit-orphans|purge-orphans");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Prints a whole-system summary across all tenants.
fn stats() -> Result<()> {
    let config = AppConfig::from_env()?;
    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let todos = repo::list_all(&mut conn).context("failed to load todos")?;
    let attachment_count: i64 = attachments::table
        .count()
        .get_result(&mut conn)
        .context("failed to count attachments")?;

    let completed = todos.iter().filter(|todo| todo.status).count();
    println!(
        "{} todos ({} completed), {} attachments",
        todos.len(),
        completed,
        attachment_count
    );
    Ok(())
}

/// Finds blobs in the bucket with no referencing attachment row. The
/// metadata side cannot go stale the other way round (attachment rows
/// cascade away with their todo), so the bucket is the only place orphans
/// accumulate. With `purge` set the orphans are deleted, best effort.
async fn audit_orphans(purge: bool) -> Result<()> {
    let config = AppConfig::from_env()?;
    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;

    let s3_client = build_s3_client(&config).await?;
    let store = S3Store::new(s3_client, config.s3_bucket.clone());

    let mut conn = pool.get().context("failed to get database connection")?;
    let paths: Vec<String> = attachments::table
        .select(attachments::path)
        .load(&mut conn)
        .context("failed to load attachment paths")?;
    let referenced: HashSet<String> = paths
        .iter()
        .map(|path| object_key_from_path(path).to_string())
        .collect();

    let stored = store.list_keys().await?;
    let orphans = orphaned_keys(stored, &referenced);

    if orphans.is_empty() {
        println!("No orphaned blobs found.");
        return Ok(());
    }

    println!("{} orphaned blobs:", orphans.len());
    for key in &orphans {
        println!("  {key}");
    }

    if !purge {
        return Ok(());
    }

    println!("Deleting {} orphaned blobs…", orphans.len());
    for key in &orphans {
        if let Err(err) = store.delete_object(key).await {
            eprintln!("Failed to delete object {key} from storage: {err}");
        }
    }

    println!("Orphaned blobs deleted.");
    Ok(())
}
