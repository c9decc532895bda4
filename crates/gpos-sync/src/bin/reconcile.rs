//! # Offline Invoice Reconciliation
//!
//! Submits every pending offline invoice in the local database, oldest first,
//! one page at a time, and prints a summary. Expired submission locks left
//! behind by crashed tills are purged first.
//!
//! ## Usage
//! ```bash
//! # Use sync.toml from the platform config directory
//! cargo run -p gpos-sync --bin gpos-reconcile
//!
//! # Explicit config file and page size
//! cargo run -p gpos-sync --bin gpos-reconcile -- --config ./sync.toml --batch-size 10
//! ```
//!
//! With no server configured, invoices are reconciled against the local
//! ledger in the same database.
//!
//! ## Exit Codes
//! - `0` - Run completed (individual records may still have failed)
//! - `1` - Database or ERP failure
//! - `2` - Configuration problem
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages
//! - Default: `info,gpos=debug,sqlx=warn`

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gpos_db::{Database, DbConfig};
use gpos_sync::{
    FrappeClient, InvoiceSubmitter, SalesInvoiceService, SyncConfig, SyncResult, TracingNotifier,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,gpos=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

struct Args {
    config: Option<PathBuf>,
    batch_size: Option<u32>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Args {
    let args: Vec<String> = args.into_iter().collect();
    let mut parsed = Args {
        config: None,
        batch_size: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                parsed.config = Some(PathBuf::from(&args[i + 1]));
                i += 1;
            }
            "--batch-size" if i + 1 < args.len() => {
                match args[i + 1].parse() {
                    Ok(n) => parsed.batch_size = Some(n),
                    Err(_) => warn!(
                        value = %args[i + 1],
                        "Invalid --batch-size, using the configured batch size"
                    ),
                }
                i += 1;
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }
    parsed
}

async fn run(args: Args) -> SyncResult<()> {
    let config = SyncConfig::load(args.config)?;
    let batch_size = args.batch_size.unwrap_or(config.submit.batch_size);

    let db = Database::new(DbConfig::new(config.database_path())).await?;

    let purged = db.locks().purge_expired().await?;
    if purged > 0 {
        info!(purged, "Removed expired submission locks");
    }

    let invoices: Arc<dyn SalesInvoiceService> = match FrappeClient::from_config(&config)? {
        Some(client) => {
            info!(server = %client.base_url(), "Reconciling against the ERP");
            Arc::new(client)
        }
        None => {
            info!("No server configured, reconciling against the local ledger");
            Arc::new(db.sales_invoices())
        }
    };

    let submitter = InvoiceSubmitter::new(
        Arc::new(db.offline_invoices()),
        invoices,
        Arc::new(db.locks()),
        Arc::new(TracingNotifier),
        config.device_id(),
    )
    .with_lock_ttl(config.lock_ttl());

    let summary = submitter.submit_pending(batch_size).await?;
    println!("{}", summary);

    db.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run(parse_args(env::args())).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_config_error() => {
            error!(error = %e, "Configuration problem, nothing was reconciled");
            ExitCode::from(2)
        }
        Err(e) => {
            error!(error = %e, "Reconciliation failed");
            ExitCode::FAILURE
        }
    }
}
