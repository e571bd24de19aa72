//! Drain the HubSpot and Loops outbox tables once and exit.
//!
//! Usage:
//!   cargo run --bin wsa-outbox                          # drain every configured target
//!   cargo run --bin wsa-outbox -- --target hubspot      # one target only
//!   cargo run --bin wsa-outbox -- --requeue-failed      # retry failed rows first
//!   cargo run --bin wsa-outbox -- --dry-run             # print queue stats only

use std::env;

use anyhow::{Context, bail};
use db::{DBService, models::outbox::{OutboxEntry, SyncTarget}};
use services::services::{config::AppConfig, sync::worker::SyncService};
use strum::IntoEnumIterator;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Safety net against a queue that refills as fast as it drains.
const MAX_PASSES: usize = 1000;

struct Options {
    targets: Vec<SyncTarget>,
    requeue_failed: bool,
    dry_run: bool,
}

fn print_help() {
    println!("wsa-outbox: push staged contacts to HubSpot and Loops");
    println!();
    println!("Options:");
    println!("  --target <hubspot|loops|all>  Target to drain (default: all)");
    println!("  --requeue-failed              Move failed rows back to pending first");
    println!("  --dry-run                     Print queue counts and exit");
    println!("  --help                        Show this help");
}

fn parse_args(args: &[String]) -> anyhow::Result<Option<Options>> {
    let mut options = Options {
        targets: SyncTarget::iter().collect(),
        requeue_failed: false,
        dry_run: false,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(None),
            "--requeue-failed" => options.requeue_failed = true,
            "--dry-run" => options.dry_run = true,
            "--target" => {
                let value = iter.next().context("--target needs a value")?;
                options.targets = match value.as_str() {
                    "all" => SyncTarget::iter().collect(),
                    other => vec![
                        other
                            .parse()
                            .with_context(|| format!("unknown target `{other}`"))?,
                    ],
                };
            }
            other => bail!("unknown argument `{other}`, see --help"),
        }
    }
    Ok(Some(options))
}

async fn print_stats(db: &DBService, targets: &[SyncTarget]) -> anyhow::Result<()> {
    for &target in targets {
        let stats = OutboxEntry::stats(&db.pool, target).await?;
        println!(
            "{target:<8} pending={} processing={} done={} failed={}",
            stats.pending, stats.processing, stats.done, stats.failed
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(options) = parse_args(&args)? else {
        print_help();
        return Ok(());
    };

    let config = AppConfig::from_env()?;
    let db = DBService::connect(&config.database_path).await?;

    if options.dry_run {
        print_stats(&db, &options.targets).await?;
        return Ok(());
    }

    let sync = SyncService::from_config(db.pool.clone(), &config)?;

    for &target in &options.targets {
        if !sync.is_enabled(target) {
            warn!(sync_target = %target, "No API credentials, skipping");
            continue;
        }

        if options.requeue_failed {
            let requeued = OutboxEntry::requeue_failed(&db.pool, target).await?;
            info!(sync_target = %target, requeued = requeued, "Requeued failed rows");
        }

        let mut delivered = 0;
        let mut retried = 0;
        let mut failed = 0;
        for _ in 0..MAX_PASSES {
            let report = sync.run_once(target).await?;
            delivered += report.delivered;
            retried += report.retried;
            failed += report.failed;
            if report.claimed == 0 {
                break;
            }
        }
        info!(
            sync_target = %target,
            delivered = delivered,
            retried = retried,
            failed = failed,
            "Target drained"
        );
    }

    print_stats(&db, &options.targets).await?;
    db.pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("wsa-outbox")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_to_every_target() {
        let options = parse_args(&args(&[])).unwrap().unwrap();
        assert_eq!(options.targets, vec![SyncTarget::Hubspot, SyncTarget::Loops]);
        assert!(!options.dry_run);
    }

    #[test]
    fn parses_flags() {
        let options = parse_args(&args(&["--target", "loops", "--requeue-failed", "--dry-run"]))
            .unwrap()
            .unwrap();
        assert_eq!(options.targets, vec![SyncTarget::Loops]);
        assert!(options.requeue_failed);
        assert!(options.dry_run);
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(parse_args(&args(&["--target", "mailchimp"])).is_err());
        assert!(parse_args(&args(&["--target"])).is_err());
        assert!(parse_args(&args(&["--verbose"])).is_err());
        assert!(parse_args(&args(&["--help"])).unwrap().is_none());
    }
}
