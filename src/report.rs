//! Lifecycle event reporting.
//!
//! Reports what the orchestrator is doing while `brain open` or
//! `brain ingest` runs: state transitions, each container command and its
//! outcome, each probe attempt. Output goes to **stderr** so stdout stays
//! parseable (it carries only the service URL, settings, or doctor table).
//!
//! Notices are the user-facing messages (missing runtime, missing key,
//! service unreachable). They are printed even when progress reporting is
//! off.

use std::io::Write;

use crate::lifecycle::LifecycleState;
use crate::probe::ProbeResult;
use crate::runtime::CommandOutcome;

/// A single lifecycle event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A flow has started and may take a while (first image pull, ingestion).
    Loading { message: String },
    Transition {
        from: LifecycleState,
        to: LifecycleState,
    },
    /// An external command finished. `label` is the masked command line.
    Command {
        label: String,
        outcome: CommandOutcome,
    },
    Attempt { n: u32, max: u32, result: ProbeResult },
}

pub trait LifecycleReporter: Send + Sync {
    fn report(&self, event: LifecycleEvent);

    /// Show a user-facing notice.
    fn notice(&self, message: &str) {
        let _ = writeln!(std::io::stderr().lock(), "notice: {}", message);
    }
}

/// Human-friendly lines on stderr: `brain  polling  attempt 2/5  not ready (HTTP 502)`.
pub struct StderrReporter;

impl LifecycleReporter for StderrReporter {
    fn report(&self, event: LifecycleEvent) {
        let line = human_line(&event);
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", line);
        let _ = err.flush();
    }
}

/// One JSON object per line on stderr.
pub struct JsonReporter;

impl LifecycleReporter for JsonReporter {
    fn report(&self, event: LifecycleEvent) {
        write_json(&json_value(&event));
    }

    fn notice(&self, message: &str) {
        write_json(&serde_json::json!({
            "event": "notice",
            "ts": chrono::Utc::now().to_rfc3339(),
            "message": message,
        }));
    }
}

/// Progress off; notices still go through the default.
pub struct NoReport;

impl LifecycleReporter for NoReport {
    fn report(&self, _event: LifecycleEvent) {}
}

fn write_json(value: &serde_json::Value) {
    if let Ok(line) = serde_json::to_string(value) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", line);
        let _ = err.flush();
    }
}

pub(crate) fn human_line(event: &LifecycleEvent) -> String {
    match event {
        LifecycleEvent::Loading { message } => format!("brain  loading  {}", message),
        LifecycleEvent::Transition { from, to } => {
            format!("brain  {}  ->  {}", from.as_str(), to.as_str())
        }
        LifecycleEvent::Command { label, outcome } => {
            format!("brain  command  {}  {}", label, outcome)
        }
        LifecycleEvent::Attempt { n, max, result } => {
            format!("brain  polling  attempt {}/{}  {}", n, max, result)
        }
    }
}

pub(crate) fn json_value(event: &LifecycleEvent) -> serde_json::Value {
    let ts = chrono::Utc::now().to_rfc3339();
    match event {
        LifecycleEvent::Loading { message } => serde_json::json!({
            "event": "loading",
            "ts": ts,
            "message": message,
        }),
        LifecycleEvent::Transition { from, to } => serde_json::json!({
            "event": "transition",
            "ts": ts,
            "from": from.as_str(),
            "to": to.as_str(),
        }),
        LifecycleEvent::Command { label, outcome } => {
            let (ok, reason) = match outcome {
                CommandOutcome::Succeeded { .. } => (true, None),
                CommandOutcome::Failed { reason } => (false, Some(reason.as_str())),
            };
            serde_json::json!({
                "event": "command",
                "ts": ts,
                "command": label,
                "ok": ok,
                "reason": reason,
            })
        }
        LifecycleEvent::Attempt { n, max, result } => {
            let reason = match result {
                ProbeResult::Ready => None,
                ProbeResult::NotReady { reason } => Some(reason.as_str()),
            };
            serde_json::json!({
                "event": "attempt",
                "ts": ts,
                "n": n,
                "max": max,
                "ready": result.is_ready(),
                "reason": reason,
            })
        }
    }
}

/// Reporting mode selected on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReportMode {
    Off,
    Human,
    Json,
}

impl ReportMode {
    /// Human output when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ReportMode::Human
        } else {
            ReportMode::Off
        }
    }

    /// Parse `auto`, `human`, `json` or `off`.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "auto" => Ok(Self::default_for_tty()),
            "human" => Ok(ReportMode::Human),
            "json" => Ok(ReportMode::Json),
            "off" => Ok(ReportMode::Off),
            other => anyhow::bail!(
                "Unknown report mode: '{}'. Must be auto, human, json, or off.",
                other
            ),
        }
    }

    pub fn reporter(&self) -> Box<dyn LifecycleReporter> {
        match self {
            ReportMode::Off => Box::new(NoReport),
            ReportMode::Human => Box::new(StderrReporter),
            ReportMode::Json => Box::new(JsonReporter),
        }
    }
}
