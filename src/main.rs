//! shellcache - offline application-shell cache worker.
//!
//! Pre-caches a configured site's shell into a versioned local bucket
//! and resolves URLs through the worker policy: cache-first, network
//! fallback, offline shell document for navigations. Bumping the
//! configured bucket name is a deploy; the next activation retires every
//! previous bucket.

mod app;
mod cache;
mod config;
mod models;
mod net;
mod worker;

use std::io::{self, Write};

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use config::Config;

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the stderr level (default `warn`); a full log
/// additionally rolls daily under `<cache_dir>/logs/`. The returned
/// guard flushes the file writer on drop.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match Config::cache_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir.join("logs"), "shellcache.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing();
    info!("shellcache starting");

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("precache") => precache().await,
        Some("fetch") => fetch(&args[2..]).await,
        Some("status") => status().await,
        Some("purge") => purge().await,
        Some(other) => {
            print_usage();
            anyhow::bail!("unknown command: {other}");
        }
        None => {
            print_usage();
            Ok(())
        }
    }
}

/// Install and activate the configured version: fetch the whole seed
/// manifest, then retire every stale bucket.
async fn precache() -> Result<()> {
    let mut app = App::new()?;
    let report = app.precache().await?;
    println!(
        "populated {} ({} entries, {} stale bucket(s) purged)",
        report.bucket, report.entries, report.purged
    );
    Ok(())
}

/// Resolve one URL through the worker policy. Body goes to stdout so it
/// can be piped; the resolution path goes to stderr.
async fn fetch(args: &[String]) -> Result<()> {
    let mut navigate = false;
    let mut target = None;
    for arg in args {
        match arg.as_str() {
            "--navigate" => navigate = true,
            other if target.is_none() => target = Some(other.to_string()),
            other => anyhow::bail!("unexpected argument: {other}"),
        }
    }
    let Some(target) = target else {
        anyhow::bail!("usage: shellcache fetch <url> [--navigate]");
    };

    let mut app = App::new()?;
    let resolved = app.resolve(&target, navigate).await?;

    eprintln!(
        "{} {} ({})",
        resolved.response.status,
        target,
        resolved.resolution.as_str()
    );
    io::stdout().write_all(&resolved.response.body)?;
    Ok(())
}

async fn status() -> Result<()> {
    let app = App::new()?;
    let report = app.status().await;

    println!("origin:  {}", report.origin);
    println!("current: {} ({:?})", report.current_bucket, report.state);
    if report.buckets.is_empty() {
        println!("no cache buckets");
        return Ok(());
    }
    for bucket in report.buckets {
        let marker = if bucket.name == report.current_bucket {
            "*"
        } else {
            " "
        };
        println!(
            "{} {}  {} entries, created {}",
            marker, bucket.name, bucket.entries, bucket.created
        );
    }
    Ok(())
}

async fn purge() -> Result<()> {
    let mut app = App::new()?;
    let purged = app.purge().await;
    println!("purged {} stale bucket(s)", purged);
    Ok(())
}

fn print_usage() {
    eprintln!("shellcache - offline application-shell cache worker");
    eprintln!();
    eprintln!("usage:");
    eprintln!("  shellcache precache              install + activate the configured version");
    eprintln!("  shellcache fetch <url> [--navigate]  resolve a URL through the worker policy");
    eprintln!("  shellcache status                show buckets and worker state");
    eprintln!("  shellcache purge                 delete buckets from previous versions");
}
