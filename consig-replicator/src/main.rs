//! Consignado sync job binary.
//!
//! Copies members, sales and installments from the legacy MySQL store into PostgreSQL, prints
//! the run report and exits. Meant to be run on a schedule; every run is safe to repeat.

use std::process::ExitCode;

use chrono::{Local, NaiveDateTime, TimeDelta};
use clap::Parser;
use consig_config::Environment;
use consig_config::shared::{SyncConfig, SyncJobConfig};
use consig_sync::pipeline::RunOptions;
use consig_sync::report::RunReport;
use consig_sync::types::EntityKind;
use consig_telemetry::tracing::{app_span, init_tracing};
use tracing::{Instrument, error};

use crate::config::load_sync_job_config;
use crate::core::start_sync_with_config;
use crate::error::{ReplicatorError, ReplicatorResult};

mod config;
mod core;
mod error;

#[derive(Debug, Parser)]
#[command(
    name = "consig-sync",
    version,
    about = "Synchronizes consignado members, sales and installments into PostgreSQL"
)]
struct Cli {
    /// Entity kind to synchronize. Repeat to select several; every kind runs when omitted.
    #[arg(long = "kind", value_name = "KIND")]
    kinds: Vec<EntityKind>,

    /// Only extract rows changed in the last HOURS hours, overriding
    /// `sync.changed_since_hours`.
    #[arg(long, value_name = "HOURS", value_parser = clap::value_parser!(u64).range(1..))]
    since_hours: Option<u64>,

    /// Extract every row even when a look-back window is configured.
    #[arg(long, conflicts_with = "since_hours")]
    full: bool,
}

impl Cli {
    /// Builds the options of this run, resolving the look-back window against `now`.
    fn run_options(&self, sync: &SyncConfig, now: NaiveDateTime) -> RunOptions {
        let hours = if self.full {
            None
        } else {
            self.since_hours.or(sync.changed_since_hours)
        };

        // Legacy timestamps are local wall-clock times.
        let changed_since = hours
            .and_then(|hours| i64::try_from(hours).ok())
            .and_then(TimeDelta::try_hours)
            .and_then(|window| now.checked_sub_signed(window));

        RunOptions {
            kinds: self.kinds.clone(),
            changed_since,
        }
    }
}

/// Exits with success when the run completed, even if some rows errored.
fn main() -> ExitCode {
    let cli = Cli::parse();

    match try_main(cli) {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn try_main(cli: Cli) -> ReplicatorResult<RunReport> {
    let sync_job_config = load_sync_job_config()?;

    let environment = Environment::load()?;
    init_tracing(env!("CARGO_BIN_NAME"), environment).map_err(ReplicatorError::config)?;

    let options = cli.run_options(&sync_job_config.sync, Local::now().naive_local());

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(
            async_main(sync_job_config, options).instrument(app_span(env!("CARGO_BIN_NAME"))),
        )
}

async fn async_main(
    sync_job_config: SyncJobConfig,
    options: RunOptions,
) -> ReplicatorResult<RunReport> {
    match start_sync_with_config(sync_job_config, options).await {
        Ok(report) => Ok(report),
        Err(err) => {
            error!("{err}");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn config_with_window(hours: Option<u64>) -> SyncConfig {
        SyncConfig {
            changed_since_hours: hours,
            ..SyncConfig::default()
        }
    }

    #[test]
    fn kinds_are_repeatable_and_accept_legacy_names() {
        let cli = Cli::try_parse_from(["consig-sync", "--kind", "parcelas", "--kind", "members"])
            .unwrap();

        assert_eq!(
            cli.kinds,
            vec![EntityKind::Installments, EntityKind::Members]
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(Cli::try_parse_from(["consig-sync", "--kind", "contracts"]).is_err());
    }

    #[test]
    fn full_conflicts_with_since_hours() {
        assert!(Cli::try_parse_from(["consig-sync", "--full", "--since-hours", "4"]).is_err());
        assert!(Cli::try_parse_from(["consig-sync", "--since-hours", "0"]).is_err());
    }

    #[test]
    fn look_back_window_comes_from_config_unless_overridden() {
        let configured = config_with_window(Some(24));

        let cli = Cli::try_parse_from(["consig-sync"]).unwrap();
        assert_eq!(
            cli.run_options(&configured, now()).changed_since,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(10, 0, 0)
        );

        let cli = Cli::try_parse_from(["consig-sync", "--since-hours", "2"]).unwrap();
        assert_eq!(
            cli.run_options(&configured, now()).changed_since,
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap().and_hms_opt(8, 0, 0)
        );

        let cli = Cli::try_parse_from(["consig-sync", "--full"]).unwrap();
        assert_eq!(cli.run_options(&configured, now()).changed_since, None);
    }

    #[test]
    fn no_window_means_full_extraction_of_every_kind() {
        let cli = Cli::try_parse_from(["consig-sync"]).unwrap();
        let options = cli.run_options(&config_with_window(None), now());

        assert_eq!(options, RunOptions::all());
    }
}
