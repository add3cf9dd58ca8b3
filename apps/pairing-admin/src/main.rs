use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use db::{ConnectOpts, DbHandle};
use mimalloc::MiMalloc;
use runtime::{AppConfig, CliArgs, DatabaseConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use pairing::config::PairingConfig;
use pairing::contract::context::CallContext;
use pairing::PairingModule;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Key of the pairing section in the `modules` config bag.
const MODULE_NAME: &str = "pairing";

/// Expand a sqlite DSN into an absolute-path DSN using a base directory.
/// - Keeps "sqlite::memory:" as-is.
/// - Normalizes backslashes into forward slashes (important on Windows).
fn absolutize_sqlite_dsn(dsn: &str, base_dir: &Path, create_dirs: bool) -> Result<String> {
    if dsn.eq_ignore_ascii_case("sqlite::memory:") || dsn.eq_ignore_ascii_case("sqlite://:memory:")
    {
        return Ok("sqlite::memory:".to_string());
    }
    let db_path = dsn
        .strip_prefix("sqlite://")
        .ok_or_else(|| anyhow!("DSN must start with sqlite:// (got: {})", dsn))?;

    let (path_str, query) = match db_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (db_path, None),
    };

    let mut p = PathBuf::from(path_str);
    if p.as_os_str().is_empty() {
        return Err(anyhow!("Empty SQLite path in DSN"));
    }
    if p.is_relative() {
        p = base_dir.join(p);
    }

    if let Some(dir) = p.parent() {
        if create_dirs {
            std::fs::create_dir_all(dir)?;
        }
    }

    let mut out = String::from("sqlite://");
    out.push_str(&p.to_string_lossy().replace('\\', "/"));
    if let Some(q) = query {
        out.push('?');
        out.push_str(q);
    }
    Ok(out)
}

/// Pairing admin - operator tooling for the partner matching service
#[derive(Parser)]
#[command(name = "pairing-admin")]
#[command(about = "Pairing admin - operator tooling for the partner matching service")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use an in-memory database
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Check configuration
    Check,
    /// Finish couple purges left incomplete by a crash or a failing store
    ResumePurges,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        print_config: cli.print_config,
        verbose: cli.verbose,
        mock: cli.mock,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config
        .logging
        .clone()
        .unwrap_or_else(runtime::config::default_logging_config);
    runtime::init_logging_from_config(&logging_config, &config.home_path());
    tracing::debug!(home_dir = %config.home_dir, "pairing-admin starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Migrate => migrate(&config).await,
        Commands::Check => check_config(&config),
        Commands::ResumePurges => resume_purges(&config, args.mock).await,
    }
}

/// Detect DB backend from URL scheme (sqlite/postgres).
fn detect_from_dsn(cfg: &DatabaseConfig) -> Result<&'static str> {
    let raw = cfg.url.trim().to_owned();
    if raw.is_empty() {
        return Err(anyhow!("Database URL not configured"));
    }

    let url = Url::parse(&raw).map_err(|e| anyhow!("Invalid database DSN '{}': {}", raw, e))?;

    match url.scheme() {
        "sqlite" | "sqlite3" => Ok("sqlite"),
        "postgres" | "postgresql" => Ok("postgres"),
        other => Err(anyhow!("Unsupported database type: {}", other)),
    }
}

async fn connect(config: &AppConfig) -> Result<Arc<DbHandle>> {
    let db_config = config
        .database
        .as_ref()
        .ok_or_else(|| anyhow!("No database configuration found"))?;
    let backend = detect_from_dsn(db_config)?;

    let mut dsn = db_config.url.trim().to_owned();
    // Absolutize sqlite DSNs to avoid cwd issues
    if dsn.starts_with("sqlite://") {
        dsn = absolutize_sqlite_dsn(&dsn, &config.home_path(), true)?;
    }

    let connect_opts = ConnectOpts {
        max_conns: db_config.max_conns,
        acquire_timeout: Some(Duration::from_secs(5)),
        sqlite_busy_timeout: db_config
            .busy_timeout_ms
            .map(|ms| Duration::from_millis(ms as u64)),
        create_sqlite_dirs: true,
        ..Default::default()
    };

    tracing::info!(backend, "Connecting to database: {}", dsn);
    let db = DbHandle::connect(&dsn, connect_opts)
        .await
        .with_context(|| format!("Failed to connect to {backend} database"))?;
    Ok(Arc::new(db))
}

fn pairing_config(config: &AppConfig) -> Result<PairingConfig> {
    config.module_config::<PairingConfig>(MODULE_NAME)
}

async fn migrate(config: &AppConfig) -> Result<()> {
    let db = connect(config).await?;
    PairingModule::migrate(&db).await?;
    println!("Migrations applied");
    Ok(())
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    let pairing = pairing_config(config)?;
    if let Some(db_config) = &config.database {
        detect_from_dsn(db_config)?;
    }

    tracing::info!("Configuration is valid");
    println!("Configuration check passed");
    println!("Pairing config: {pairing:?}");
    println!("{}", config.to_yaml()?);
    Ok(())
}

async fn resume_purges(config: &AppConfig, mock: bool) -> Result<()> {
    let cfg = pairing_config(config)?;
    let db = connect(config).await?;
    if mock {
        // a fresh in-memory database has no schema yet
        PairingModule::migrate(&db).await?;
    }

    let module = PairingModule::init(db, &cfg)?;
    let client = module.client();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, abandoning resume");
            on_signal.cancel();
        }
    });

    let mut ctx = CallContext::new().with_cancel(cancel);
    if let Some(ms) = cfg.op_timeout_ms {
        ctx = ctx.with_timeout(Duration::from_millis(ms));
    }

    let report = client.resume_purges(&ctx).await?;
    for done in &report.completed {
        println!(
            "completed {} (journal {}): {:?}",
            done.couple_id, done.journal_id, done.purged
        );
    }
    for (couple_id, reason) in &report.failed {
        println!("failed {couple_id}: {reason}");
    }
    println!(
        "Resumed {} purge(s), {} still incomplete",
        report.completed.len(),
        report.failed.len()
    );

    if !report.failed.is_empty() {
        anyhow::bail!("{} purge(s) still incomplete", report.failed.len());
    }
    Ok(())
}
