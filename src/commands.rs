//! Entry points behind each CLI subcommand.
//!
//! These wire configuration, settings, and the real runtime and probe into
//! the [`Orchestrator`]. They return `Ok` for every lifecycle outcome and
//! only fail on configuration or settings I/O.

use anyhow::Result;
use std::path::Path;
use std::process::ExitCode;

use crate::config::Config;
use crate::lifecycle::{Orchestrator, Readiness, Session};
use crate::preflight;
use crate::probe::HttpProbe;
use crate::report::ReportMode;
use crate::retry::TokioPause;
use crate::runtime::DockerCli;
use crate::settings::SettingsStore;

/// `brain open`: start the service and wait for it to answer.
///
/// Prints the service URL on stdout when ready. Exits 1 when unreachable.
pub async fn run_open(config: &Config, vault: Option<&Path>, mode: ReportMode) -> Result<ExitCode> {
    let settings = SettingsStore::new(&config.settings.path).load()?;
    let vault = config.resolve_vault(vault)?;
    let reporter = mode.reporter();
    let runtime = DockerCli::new(&config.service.runtime_binary);

    preflight::check_and_notify(&runtime, &settings, reporter.as_ref()).await;

    let probe = HttpProbe::new(&config.service.endpoint, config.probe.request_timeout())?;
    let readiness = Readiness::new(&probe, &TokioPause, config.probe.retry_policy()?);
    let orchestrator = Orchestrator::new(&config.service, &runtime, reporter.as_ref());

    let session = Session::new(settings.api_key(), vault);
    let outcome = orchestrator.open(&session, &readiness).await;

    match outcome.url {
        Some(url) => {
            println!("{}", url);
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(ExitCode::FAILURE),
    }
}

/// `brain ingest`: run the ingestion entry point once over the vault.
pub async fn run_ingest(
    config: &Config,
    vault: Option<&Path>,
    mode: ReportMode,
) -> Result<ExitCode> {
    let settings = SettingsStore::new(&config.settings.path).load()?;
    let vault = config.resolve_vault(vault)?;
    let reporter = mode.reporter();
    let runtime = DockerCli::new(&config.service.runtime_binary);

    preflight::check_and_notify(&runtime, &settings, reporter.as_ref()).await;

    let orchestrator = Orchestrator::new(&config.service, &runtime, reporter.as_ref());

    let session = Session::new(settings.api_key(), vault);
    let report = orchestrator.run_ingest_once(&session).await;

    if report.ran.is_success() {
        println!("Ingestion finished.");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// `brain doctor`: load-time checks as a table. Always succeeds.
pub async fn run_doctor(config: &Config, mode: ReportMode) -> Result<ExitCode> {
    let settings = SettingsStore::new(&config.settings.path).load()?;
    let runtime = DockerCli::new(&config.service.runtime_binary);
    let report = preflight::check_and_notify(&runtime, &settings, mode.reporter().as_ref()).await;
    preflight::print_report(&report, &settings);
    Ok(ExitCode::SUCCESS)
}

pub fn run_settings_show(config: &Config) -> Result<ExitCode> {
    let store = SettingsStore::new(&config.settings.path);
    let settings = store.load()?;
    println!("settings file:  {}", store.path().display());
    println!("openai_api_key: {}", settings.masked_api_key());
    Ok(ExitCode::SUCCESS)
}

pub fn run_settings_set_api_key(config: &Config, key: &str) -> Result<ExitCode> {
    let store = SettingsStore::new(&config.settings.path);
    let settings = store.update(|s| s.openai_api_key = key.trim().to_string())?;
    println!("openai_api_key: {}", settings.masked_api_key());
    Ok(ExitCode::SUCCESS)
}
