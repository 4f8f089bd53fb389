use clap::Parser;
use mimalloc::MiMalloc;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wp_bootstrap::cli::{Cli, Commands};
use wp_bootstrap::db::MySqlConnector;
use wp_bootstrap::service::release::{self, FetchOutcome, ReleaseSource};
use wp_bootstrap::{BootstrapError, Config, InstallerRunner, PhpInstaller, SUCCESS_MESSAGE};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cfg = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        config = %cli.config.display(),
        database_host = %cfg.database.host,
        database_name = %cfg.database.name,
        site_url = %cfg.site.url,
        loglevel = %cfg.loglevel
    );

    let result = match cli.command() {
        Commands::Install => install(cfg).await,
        Commands::Fetch => fetch(cfg).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(BootstrapError::ConnectionFailed(_)) => {
            println!("{}", wp_bootstrap::error::CONNECTION_FAILED_MESSAGE);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "bootstrap failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn install(cfg: Config) -> Result<(), BootstrapError> {
    let connector = MySqlConnector::from_config(&cfg.database);
    let installer = PhpInstaller::from_config(&cfg.installer);
    let report = InstallerRunner::new(cfg, connector, installer).run().await?;
    info!(overrides = report.overrides.len(), "seed overrides applied");
    println!("{SUCCESS_MESSAGE}");
    Ok(())
}

async fn fetch(cfg: Config) -> Result<(), BootstrapError> {
    let client = release::build_client()?;
    let source = ReleaseSource::try_from(&cfg.release)?;
    match release::fetch_latest(&client, &source).await? {
        FetchOutcome::AlreadyCurrent => println!("We have the latest {}", source.target.display()),
        FetchOutcome::Downloaded => println!("Downloaded the latest {}", source.target.display()),
        FetchOutcome::ChecksumMismatch { expected, actual } => {
            return Err(BootstrapError::ChecksumMismatch {
                file: source.target.display().to_string(),
                expected,
                actual,
            });
        }
        FetchOutcome::Unavailable { reason } => {
            warn!(%reason, "release source unavailable");
            println!("Using the current {}", source.target.display());
        }
    }
    Ok(())
}
