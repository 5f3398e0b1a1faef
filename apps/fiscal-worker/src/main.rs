//! # Larder Fiscal Worker
//!
//! Operator CLI for the fiscal integration.
//!
//! ## Commands
//! ```text
//! fiscal-worker sync-items                  register every ingredient without a code
//! fiscal-worker register-recipe --id 7      recipe + compositions
//! fiscal-worker send-sale --id 42           sale + stock out
//! fiscal-worker send-purchase --id 9        purchase + stock in
//! fiscal-worker retry [--kind sale] [--max-retries 5] [--entry <id>]
//! fiscal-worker reconcile [--max-age-secs 600]
//! fiscal-worker stats
//! fiscal-worker lookup codes|classes|branches [--since 20260101000000]
//! fiscal-worker init-config [--force]
//! ```
//!
//! Results are printed as JSON on stdout; logs go to stderr.

use anyhow::{anyhow, bail, Context};
use chrono::{NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;
use larder_core::codes::DATETIME_FORMAT;
use larder_core::LedgerKind;
use larder_db::{Database, DbConfig};
use larder_fiscal::{report, FiscalConfig, FiscalService, OperationReport};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fiscal-worker")]
#[command(about = "Larder tax authority integration")]
struct Cli {
    /// Fiscal configuration file (default: platform config dir).
    #[arg(long, global = true, env = "LARDER_FISCAL_CONFIG")]
    config: Option<PathBuf>,

    /// Back-office database (default: platform data dir).
    #[arg(long, global = true, env = "LARDER_DB_PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register every ingredient that has no item code yet.
    SyncItems,
    /// Register a recipe and its compositions.
    RegisterRecipe {
        #[arg(long)]
        id: i64,
    },
    /// Send a sales order, then its stock-out.
    SendSale {
        #[arg(long)]
        id: i64,
    },
    /// Send a supplier order, then its stock-in.
    SendPurchase {
        #[arg(long)]
        id: i64,
    },
    /// Replay failed ledger entries.
    Retry {
        /// Only entries of this kind.
        #[arg(long, value_parser = parse_kind)]
        kind: Option<LedgerKind>,
        /// Entries retried this many times are left alone.
        #[arg(long, default_value_t = 5)]
        max_retries: i64,
        /// Replay one entry, whatever its retry count.
        #[arg(long, conflicts_with = "kind")]
        entry: Option<String>,
    },
    /// Fail entries stuck in pending so they can be retried.
    Reconcile {
        #[arg(long, default_value_t = 600)]
        max_age_secs: u64,
    },
    /// Schema version and ledger counts by kind, status and result code.
    Stats,
    /// Read-only authority lookups.
    Lookup {
        #[arg(value_enum)]
        what: LookupKind,
        /// Only changes after this instant, yyyyMMddHHmmss.
        #[arg(long)]
        since: Option<String>,
    },
    /// Write a configuration template.
    InitConfig {
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LookupKind {
    Codes,
    Classes,
    Branches,
}

fn parse_kind(value: &str) -> Result<LedgerKind, String> {
    LedgerKind::parse(value).ok_or_else(|| {
        let known: Vec<&str> = LedgerKind::ALL.iter().map(LedgerKind::as_str).collect();
        format!("unknown kind '{value}', expected one of: {}", known.join(", "))
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let Cli {
        config: config_path,
        db,
        command,
    } = Cli::parse();

    // The template is written before anything has to validate.
    if let Command::InitConfig { force } = command {
        return init_config(config_path, force);
    }

    let config =
        FiscalConfig::load(config_path.clone()).context("Fiscal configuration is incomplete")?;
    let db_path = database_path(db)?;
    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("Opening {}", db_path.display()))?;
    info!(db = %db_path.display(), base_url = %config.authority.base_url, "Fiscal worker ready");

    let service = FiscalService::new(db, Arc::new(config))?;

    match command {
        Command::SyncItems => print(&service.sync_all_items().await?),
        Command::RegisterRecipe { id } => {
            let recipe = service
                .database()
                .recipes()
                .get_by_id(id)
                .await?
                .ok_or_else(|| anyhow!("Recipe {id} not found"))?;
            print_report(report(&service.register_recipe(&recipe).await))
        }
        Command::SendSale { id } => {
            let order = service
                .database()
                .sales_orders()
                .get_by_id(id)
                .await?
                .ok_or_else(|| anyhow!("Sales order {id} not found"))?;
            print_report(report(&service.complete_sale(&order).await))
        }
        Command::SendPurchase { id } => {
            let order = service
                .database()
                .supplier_orders()
                .get_by_id(id)
                .await?
                .ok_or_else(|| anyhow!("Supplier order {id} not found"))?;
            print_report(report(&service.receive_purchase(&order).await))
        }
        Command::Retry {
            kind,
            max_retries,
            entry,
        } => match entry {
            Some(id) => print_report(report(&service.retry_entry(&id).await)),
            None => print(&service.retry_failed(kind, max_retries).await?),
        },
        Command::Reconcile { max_age_secs } => {
            let failed = service
                .reconcile_abandoned(Duration::from_secs(max_age_secs))
                .await?;
            print(&serde_json::json!({ "failed": failed }))
        }
        Command::Stats => {
            let db = service.database();
            print(&serde_json::json!({
                "schema_version": db.schema_version().await?,
                "ledger": db.ledger().statistics().await?,
            }))
        }
        Command::Lookup { what, since } => {
            let since = since.as_deref().map(parse_since).transpose()?;
            let data = match what {
                LookupKind::Codes => service.fetch_codes(since).await?,
                LookupKind::Classes => service.fetch_item_classes(since).await?,
                LookupKind::Branches => service.fetch_branches(since).await?,
            };
            print(&data)
        }
        Command::InitConfig { force } => init_config(config_path, force),
    }
}

/// Initializes the tracing subscriber. Logs go to stderr so stdout stays JSON.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=larder=trace` - Show trace for larder crates only
/// - Default: `info,larder=debug,sqlx=warn`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,larder=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `--db`, else `LARDER_DB_PATH`, else the platform data directory.
fn database_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    let dirs = ProjectDirs::from("com", "larder", "fiscal")
        .context("Could not determine app data directory")?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;

    Ok(data_dir.join("larder.db"))
}

fn init_config(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let target = path
        .or_else(FiscalConfig::default_config_path)
        .context("No config path available")?;
    if target.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", target.display());
    }

    let written = FiscalConfig::default().save(Some(target))?;
    println!("{}", written.display());
    Ok(())
}

fn parse_since(value: &str) -> anyhow::Result<chrono::DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .with_context(|| format!("--since must be {DATETIME_FORMAT}"))?;
    Ok(Utc.from_utc_datetime(&naive))
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_report(report: OperationReport) -> anyhow::Result<()> {
    print(&report)?;
    if !report.outcome.is_accepted() {
        bail!("{}", report.message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_retry_kind() {
        let cli = Cli::try_parse_from(["fiscal-worker", "retry", "--kind", "stock_out"]).unwrap();
        match cli.command {
            Command::Retry { kind, max_retries, .. } => {
                assert_eq!(kind, Some(LedgerKind::StockOut));
                assert_eq!(max_retries, 5);
            }
            _ => panic!("expected retry"),
        }

        assert!(Cli::try_parse_from(["fiscal-worker", "retry", "--kind", "refund"]).is_err());
    }

    #[test]
    fn test_parse_since() {
        let at = parse_since("20260101083000").unwrap();
        assert_eq!(at.to_rfc3339(), "2026-01-01T08:30:00+00:00");
        assert!(parse_since("2026-01-01").is_err());
    }
}
