//! Load-time checks.
//!
//! Two things can make the shim useless before it starts: the container
//! runtime is not installed, or no API key has been saved. Neither is
//! fatal. Each produces a notice, and the commands still run.

use crate::report::LifecycleReporter;
use crate::runtime::{CommandOutcome, ContainerRuntime};
use crate::settings::Settings;

pub const MISSING_RUNTIME_NOTICE: &str =
    "Docker is not installed in the system, brAIn plugin need docker to run.";
pub const MISSING_KEY_NOTICE: &str =
    "OpenAI api key not set. You need to add an OpenAI api key brAIn settings.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreflightReport {
    pub runtime: CommandOutcome,
    pub api_key_set: bool,
}

impl PreflightReport {
    pub fn notices(&self) -> Vec<&'static str> {
        let mut notices = Vec::new();
        if !self.runtime.is_success() {
            notices.push(MISSING_RUNTIME_NOTICE);
        }
        if !self.api_key_set {
            notices.push(MISSING_KEY_NOTICE);
        }
        notices
    }
}

pub async fn check(runtime: &dyn ContainerRuntime, settings: &Settings) -> PreflightReport {
    PreflightReport {
        runtime: runtime.version().await,
        api_key_set: settings.has_api_key(),
    }
}

/// Run the checks and surface any notices.
pub async fn check_and_notify(
    runtime: &dyn ContainerRuntime,
    settings: &Settings,
    reporter: &dyn LifecycleReporter,
) -> PreflightReport {
    let report = check(runtime, settings).await;
    for notice in report.notices() {
        reporter.notice(notice);
    }
    report
}

/// Status table for `brain doctor`.
pub fn print_report(report: &PreflightReport, settings: &Settings) {
    let runtime_status = match &report.runtime {
        CommandOutcome::Succeeded { stdout } => stdout.lines().next().unwrap_or("ok").to_string(),
        CommandOutcome::Failed { .. } => "NOT INSTALLED".to_string(),
    };
    println!("{:<12} {:<8} DETAIL", "CHECK", "OK");
    println!(
        "{:<12} {:<8} {}",
        "runtime",
        report.runtime.is_success(),
        runtime_status
    );
    println!(
        "{:<12} {:<8} {}",
        "api_key",
        report.api_key_set,
        settings.masked_api_key()
    );
}
