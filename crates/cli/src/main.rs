use crate::{
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
    synthetic::{LoggingObserver, SyntheticFeed},
};
use clap::Parser;
use commands::Commands;
use engine_config::{ProcessorSettings, SettingsValidator, ValidatedSettings};
use engine_core::{
    connectors::{estimate::LagReport, feed::StartFrom, observer::Observer},
    state::{LeaseStore, sled_store::SledLeaseStore},
};
use engine_runtime::{
    FeedEstimator, PartitionRegistry, PartitionSupervisorFactory,
    supervisor::config::SupervisorConfig,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;
mod shutdown;
mod synthetic;

#[derive(Parser)]
#[command(
    name = "leasefeed",
    version = "0.1.0",
    about = "Lease-based change feed processor"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Seed { partitions, store } => {
            let store = open_lease_store(store, Duration::from_secs(60))?;
            let mut created = 0;
            for i in 0..partitions {
                if store.create_if_absent(&format!("p-{i}"), None).await? {
                    created += 1;
                }
            }
            store.flush().await?;
            println!("Created {created} of {partitions} leases");
        }
        Commands::Leases { store, json } => {
            let store = open_lease_store(store, Duration::from_secs(60))?;
            let leases = store.list().await?;
            output::print_leases(&leases, json)?;
        }
        Commands::Run {
            owner,
            store,
            settings,
            pages,
            page_size,
            from_beginning,
        } => {
            let mut settings = load_settings(settings.as_deref())?;
            if from_beginning {
                settings.start_from = StartFrom::Beginning;
            }
            let store = Arc::new(open_lease_store(store, settings.lease_expiration)?);
            let code = run_partitions(store, &owner, &settings, pages, page_size).await?;
            if !matches!(code, ExitCode::Success) {
                std::process::exit(code.as_i32());
            }
        }
        Commands::Estimate {
            store,
            settings,
            pages,
            page_size,
            json,
            watch,
        } => {
            let settings = load_settings(settings.as_deref())?;
            let store = Arc::new(open_lease_store(store, settings.lease_expiration)?);
            let estimator = FeedEstimator::from_settings(
                store,
                Arc::new(SyntheticFeed::new(pages, page_size)),
                Arc::new(move |report: &LagReport| {
                    if let Err(err) = output::print_lag(report, json) {
                        warn!(error = %err, "Failed to print lag report");
                    }
                }),
                &settings,
            );

            if watch {
                let coordinator = ShutdownCoordinator::new(CancellationToken::new());
                coordinator.register_handlers();
                estimator.run(coordinator.cancel_token()).await;
            } else {
                let report = estimator.estimate().await?;
                output::print_lag(&report, json)?;
            }
        }
    }

    Ok(())
}

fn default_store_path() -> Result<PathBuf, CliError> {
    let home = dirs::home_dir()
        .ok_or_else(|| CliError::Unexpected("Could not determine home directory".into()))?;
    Ok(home.join(".leasefeed/leases"))
}

fn open_lease_store(
    path: Option<PathBuf>,
    expiration: Duration,
) -> Result<SledLeaseStore, CliError> {
    let path = match path {
        Some(path) => path,
        None => default_store_path()?,
    };
    SledLeaseStore::open(&path, expiration).map_err(|err| {
        CliError::Unexpected(format!(
            "Failed to open lease store at {}: {err}",
            path.display()
        ))
    })
}

fn load_settings(path: Option<&Path>) -> Result<ValidatedSettings, CliError> {
    let settings = match path {
        Some(path) => ProcessorSettings::load_from_file(path)?,
        None => ProcessorSettings::default(),
    };
    Ok(SettingsValidator::new().validate(&settings)?)
}

/// Acquires every free lease, runs one supervisor per partition and waits
/// until a signal arrives or every partition stopped on its own.
async fn run_partitions(
    store: Arc<SledLeaseStore>,
    owner: &str,
    settings: &ValidatedSettings,
    pages: u64,
    page_size: u64,
) -> Result<ExitCode, CliError> {
    let coordinator = ShutdownCoordinator::new(CancellationToken::new());
    coordinator.register_handlers();

    let factory = PartitionSupervisorFactory::new(
        store.clone(),
        Arc::new(SyntheticFeed::new(pages, page_size)),
        Arc::new(|| Arc::new(LoggingObserver::default()) as Arc<dyn Observer>),
        SupervisorConfig::from_settings(settings),
    );
    let mut registry = PartitionRegistry::new(coordinator.cancel_token());

    for lease in store.list().await? {
        match store.acquire(&lease.partition_id, owner).await {
            Ok(acquired) => {
                registry.start(factory.create(acquired))?;
            }
            Err(err) if err.is_lease_lost() => {
                info!(partition = %lease.partition_id, owner = ?lease.owner, "Lease held elsewhere, skipping");
            }
            Err(err) => return Err(err.into()),
        }
    }

    if registry.is_empty() {
        warn!(owner = %owner, "No lease could be acquired, run `leasefeed seed` first");
        return Ok(ExitCode::Success);
    }
    info!(owner = %owner, partitions = ?registry.partition_ids(), "Processing partitions");

    let shutdown = coordinator.cancel_token();
    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = registry.wait_all_stopped() => {
            info!("Every partition stopped on its own");
        }
    }

    let outcomes = registry.shutdown_all().await;
    store.flush().await?;
    output::print_outcomes(&outcomes);

    if coordinator.is_shutdown_requested() {
        Ok(ExitCode::ShutdownRequested)
    } else if outcomes.iter().any(|o| o.reason.is_failure()) {
        Ok(ExitCode::PartitionsFailed)
    } else {
        Ok(ExitCode::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["leasefeed", "run", "--owner", "host-1"]).unwrap();
        let Commands::Run {
            owner,
            store,
            pages,
            page_size,
            from_beginning,
            ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(owner, "host-1");
        assert!(store.is_none());
        assert_eq!((pages, page_size), (10, 25));
        assert!(!from_beginning);
    }

    #[test]
    fn run_requires_owner() {
        assert!(Cli::try_parse_from(["leasefeed", "run"]).is_err());
    }

    #[test]
    fn estimate_is_one_shot_by_default() {
        let cli = Cli::try_parse_from(["leasefeed", "estimate", "--json"]).unwrap();
        let Commands::Estimate {
            json,
            watch,
            pages,
            ..
        } = cli.command
        else {
            panic!("expected estimate");
        };
        assert!(json);
        assert!(!watch);
        assert_eq!(pages, 10);
    }

    #[test]
    fn missing_settings_fall_back_to_defaults() {
        let settings = load_settings(None).unwrap();
        assert_eq!(settings.lease_expiration, Duration::from_secs(60));
        assert_eq!(settings.start_from, StartFrom::Now);
        assert!(settings.release_on_stop);
    }
}
