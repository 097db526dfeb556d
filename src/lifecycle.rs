//! Lifecycle orchestration for the brAIn service container.
//!
//! Two flows share one named container:
//!
//! - **Interactive** (`brain open`): remove any old container, start the
//!   service detached with the vault mounted, then poll the endpoint until
//!   it answers 200 or the retry budget runs out.
//! - **Ingest** (`brain ingest`): stop and remove the container, then run a
//!   transient one that executes the ingestion entry point over the vault.
//!
//! ```text
//! Idle ──open──▶ Starting ──dispatched──▶ Polling ──200──▶ Ready
//!                                            │
//!                                            └──budget spent──▶ Unreachable
//! ```
//!
//! Every external failure is reported and absorbed. A failed `run` still
//! moves on to polling; the probe has the final word. Nothing here returns
//! an error to the caller.
//!
//! The flows do not coordinate with each other. Running `open` and `ingest`
//! at the same time races on the container name.

use std::path::PathBuf;

use crate::config::ServiceConfig;
use crate::probe::Probe;
use crate::report::{LifecycleEvent, LifecycleReporter};
use crate::retry::{retry_until, Pause, RetryPolicy};
use crate::runtime::{CommandOutcome, ContainerRuntime, RunMode, RunSpec};

pub const LOADING_MESSAGE: &str =
    "Please wait while the docker is being loaded, the first time could take several minutes...";
pub const INGESTING_MESSAGE: &str =
    "Please wait while the docker is ingesting the docs of your vault, the first time could take several minutes...";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Polling,
    Ready,
    Unreachable,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Starting => "starting",
            LifecycleState::Polling => "polling",
            LifecycleState::Ready => "ready",
            LifecycleState::Unreachable => "unreachable",
        }
    }
}

/// Per-invocation context: who is asking, and for which vault.
#[derive(Clone, Debug)]
pub struct Session {
    pub api_key: String,
    /// Absolute path; mounted into the container at the same location.
    pub vault: PathBuf,
}

impl Session {
    pub fn new(api_key: impl Into<String>, vault: impl Into<PathBuf>) -> Self {
        Self {
            api_key: api_key.into(),
            vault: vault.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartReport {
    pub removed: CommandOutcome,
    pub started: CommandOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestReport {
    pub stopped: CommandOutcome,
    pub removed: CommandOutcome,
    pub ran: CommandOutcome,
}

/// Result of the interactive flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenOutcome {
    /// Always `Ready` or `Unreachable`.
    pub state: LifecycleState,
    pub start: StartReport,
    /// The probed endpoint, set only when `Ready`.
    pub url: Option<String>,
}

/// What the interactive flow polls and how: the probe, the wait between
/// attempts, and the attempt budget. Ingestion never needs one.
pub struct Readiness<'a> {
    probe: &'a dyn Probe,
    pause: &'a dyn Pause,
    policy: RetryPolicy,
}

impl<'a> Readiness<'a> {
    pub fn new(probe: &'a dyn Probe, pause: &'a dyn Pause, policy: RetryPolicy) -> Self {
        Self {
            probe,
            pause,
            policy,
        }
    }
}

pub struct Orchestrator<'a> {
    service: &'a ServiceConfig,
    runtime: &'a dyn ContainerRuntime,
    reporter: &'a dyn LifecycleReporter,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        service: &'a ServiceConfig,
        runtime: &'a dyn ContainerRuntime,
        reporter: &'a dyn LifecycleReporter,
    ) -> Self {
        Self {
            service,
            runtime,
            reporter,
        }
    }

    /// Run the interactive flow from `Idle` to a terminal state.
    pub async fn open(&self, session: &Session, readiness: &Readiness<'_>) -> OpenOutcome {
        self.reporter.report(LifecycleEvent::Loading {
            message: LOADING_MESSAGE.to_string(),
        });
        self.transition(LifecycleState::Idle, LifecycleState::Starting);

        let start = self.start_interactive_service(session).await;
        self.transition(LifecycleState::Starting, LifecycleState::Polling);

        let reachable = self.await_reachable(readiness).await;
        let state = if reachable {
            LifecycleState::Ready
        } else {
            LifecycleState::Unreachable
        };
        self.transition(LifecycleState::Polling, state);

        if !reachable {
            self.reporter.notice(&format!(
                "brAIn is not running, please check that the port {} is not being used by other service",
                self.service.port
            ));
        }

        OpenOutcome {
            state,
            start,
            url: reachable.then(|| readiness.probe.endpoint().to_string()),
        }
    }

    /// Replace any existing container with a fresh detached service.
    ///
    /// Both outcomes are reported; neither stops the flow. A failed removal
    /// usually just means there was no container to remove.
    pub async fn start_interactive_service(&self, session: &Session) -> StartReport {
        let removed = self.remove().await;

        let spec = RunSpec::new(
            &self.service.container_name,
            &self.service.image,
            RunMode::Detached,
        )
        .publish(self.service.port, self.service.port);
        let spec = self.with_vault(spec, session);

        let started = self.runtime.run(&spec).await;
        self.report_command(spec.to_string(), &started);

        StartReport { removed, started }
    }

    /// Probe until the endpoint answers 200 or the attempt budget is spent.
    pub async fn await_reachable(&self, readiness: &Readiness<'_>) -> bool {
        let max = readiness.policy.max_attempts();
        let probe = readiness.probe;
        let outcome = retry_until(&readiness.policy, readiness.pause, |n| async move {
            let result = probe.check().await;
            let ready = result.is_ready();
            self.reporter
                .report(LifecycleEvent::Attempt { n, max, result });
            ready
        })
        .await;
        outcome.succeeded
    }

    /// Tear down the service and run the ingestion entry point once.
    ///
    /// Returns when the runtime call returns. With a transient container
    /// that is when ingestion exits, but the exit status inside the
    /// container is not interpreted beyond the command outcome. The
    /// container's own output goes straight to the terminal.
    pub async fn run_ingest_once(&self, session: &Session) -> IngestReport {
        self.reporter.report(LifecycleEvent::Loading {
            message: INGESTING_MESSAGE.to_string(),
        });

        let name = &self.service.container_name;
        let stopped = self.runtime.stop(name).await;
        self.report_command(format!("stop {}", name), &stopped);

        let removed = self.remove().await;

        let spec = RunSpec::new(name, &self.service.image, RunMode::Transient);
        let spec = self
            .with_vault(spec, session)
            .command(self.service.ingest_command.iter().cloned());

        let ran = self.runtime.run(&spec).await;
        self.report_command(spec.to_string(), &ran);
        if !ran.is_success() {
            self.reporter.notice(&format!("Failed ingesting: {}", ran));
        }

        IngestReport {
            stopped,
            removed,
            ran,
        }
    }

    async fn remove(&self) -> CommandOutcome {
        let name = &self.service.container_name;
        let removed = self.runtime.remove(name).await;
        self.report_command(format!("rm -f {}", name), &removed);
        removed
    }

    fn with_vault(&self, spec: RunSpec, session: &Session) -> RunSpec {
        let vault = session.vault.display().to_string();
        spec.mount(&session.vault, &session.vault)
            .env(&self.service.path_env, vault)
            .secret_env(&self.service.key_env, &session.api_key)
            .tty()
    }

    fn report_command(&self, label: String, outcome: &CommandOutcome) {
        self.reporter.report(LifecycleEvent::Command {
            label,
            outcome: outcome.clone(),
        });
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) {
        self.reporter
            .report(LifecycleEvent::Transition { from, to });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeResult;
    use crate::retry::tests::RecordingPause;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every call; `run` fails when `fail_run` is set.
    #[derive(Default)]
    struct RecordingRuntime {
        calls: Mutex<Vec<String>>,
        specs: Mutex<Vec<RunSpec>>,
        fail_run: bool,
    }

    impl RecordingRuntime {
        fn failing_run() -> Self {
            Self {
                fail_run: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContainerRuntime for RecordingRuntime {
        async fn version(&self) -> CommandOutcome {
            CommandOutcome::Succeeded {
                stdout: "Docker version 24.0.0".to_string(),
            }
        }

        async fn remove(&self, name: &str) -> CommandOutcome {
            self.calls.lock().unwrap().push(format!("rm {}", name));
            CommandOutcome::Failed {
                reason: format!("No such container: {}", name),
            }
        }

        async fn stop(&self, name: &str) -> CommandOutcome {
            self.calls.lock().unwrap().push(format!("stop {}", name));
            CommandOutcome::Failed {
                reason: format!("No such container: {}", name),
            }
        }

        async fn run(&self, spec: &RunSpec) -> CommandOutcome {
            self.calls.lock().unwrap().push(format!("run {}", spec.name));
            self.specs.lock().unwrap().push(spec.clone());
            if self.fail_run {
                CommandOutcome::Failed {
                    reason: "port is already allocated".to_string(),
                }
            } else {
                CommandOutcome::Succeeded {
                    stdout: "3f2a".to_string(),
                }
            }
        }
    }

    /// Returns scripted results in order, then keeps returning the last one.
    struct ScriptedProbe {
        results: Mutex<VecDeque<ProbeResult>>,
        fallback: ProbeResult,
        calls: Mutex<u32>,
    }

    impl ScriptedProbe {
        fn new(results: Vec<ProbeResult>, fallback: ProbeResult) -> Self {
            Self {
                results: Mutex::new(results.into()),
                fallback,
                calls: Mutex::new(0),
            }
        }

        fn never_ready() -> Self {
            Self::new(Vec::new(), refused())
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        fn endpoint(&self) -> &str {
            "http://localhost:9000"
        }

        async fn check(&self) -> ProbeResult {
            *self.calls.lock().unwrap() += 1;
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<LifecycleEvent>>,
        notices: Mutex<Vec<String>>,
    }

    impl LifecycleReporter for RecordingReporter {
        fn report(&self, event: LifecycleEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn notice(&self, message: &str) {
            self.notices.lock().unwrap().push(message.to_string());
        }
    }

    impl RecordingReporter {
        fn transitions(&self) -> Vec<(LifecycleState, LifecycleState)> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    LifecycleEvent::Transition { from, to } => Some((*from, *to)),
                    _ => None,
                })
                .collect()
        }
    }

    fn refused() -> ProbeResult {
        ProbeResult::NotReady {
            reason: "connection refused".to_string(),
        }
    }

    fn bad_gateway() -> ProbeResult {
        ProbeResult::NotReady {
            reason: "HTTP 502 Bad Gateway".to_string(),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(10_000), Duration::from_millis(2_000)).unwrap()
    }

    fn session() -> Session {
        Session::new("sk-secret", "/home/me/vault")
    }

    #[tokio::test]
    async fn unreachable_after_five_attempts() {
        let service = ServiceConfig::default();
        let runtime = RecordingRuntime::default();
        let probe = ScriptedProbe::never_ready();
        let pause = RecordingPause::default();
        let reporter = RecordingReporter::default();
        let orch = Orchestrator::new(&service, &runtime, &reporter);
        let readiness = Readiness::new(&probe, &pause, policy());

        let outcome = orch.open(&session(), &readiness).await;

        assert_eq!(outcome.state, LifecycleState::Unreachable);
        assert_eq!(outcome.url, None);
        assert_eq!(probe.calls(), 5);
        let notices = reporter.notices.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("port 9000"));
    }

    #[tokio::test]
    async fn ready_on_third_attempt() {
        let service = ServiceConfig::default();
        let runtime = RecordingRuntime::default();
        let probe = ScriptedProbe::new(vec![bad_gateway(), bad_gateway()], ProbeResult::Ready);
        let pause = RecordingPause::default();
        let reporter = RecordingReporter::default();
        let orch = Orchestrator::new(&service, &runtime, &reporter);
        let readiness = Readiness::new(&probe, &pause, policy());

        let outcome = orch.open(&session(), &readiness).await;

        assert_eq!(outcome.state, LifecycleState::Ready);
        assert_eq!(outcome.url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(probe.calls(), 3);
        assert_eq!(pause.pauses.lock().unwrap().len(), 2);
        assert!(reporter.notices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn await_reachable_true_once_probe_answers() {
        let service = ServiceConfig::default();
        let runtime = RecordingRuntime::default();
        let probe = ScriptedProbe::new(vec![refused()], ProbeResult::Ready);
        let pause = RecordingPause::default();
        let reporter = RecordingReporter::default();
        let orch = Orchestrator::new(&service, &runtime, &reporter);
        let readiness = Readiness::new(&probe, &pause, policy());

        assert!(orch.await_reachable(&readiness).await);
        assert_eq!(probe.calls(), 2);
        assert!(runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn await_reachable_false_when_budget_spent() {
        let service = ServiceConfig::default();
        let runtime = RecordingRuntime::default();
        let probe = ScriptedProbe::never_ready();
        let pause = RecordingPause::default();
        let reporter = RecordingReporter::default();
        let orch = Orchestrator::new(&service, &runtime, &reporter);
        let readiness = Readiness::new(&probe, &pause, policy());

        assert!(!orch.await_reachable(&readiness).await);
        assert_eq!(probe.calls(), 5);
        let attempts = reporter
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, LifecycleEvent::Attempt { max: 5, .. }))
            .count();
        assert_eq!(attempts, 5);
    }

    #[tokio::test]
    async fn transitions_follow_state_machine() {
        let service = ServiceConfig::default();
        let runtime = RecordingRuntime::default();
        let probe = ScriptedProbe::new(Vec::new(), ProbeResult::Ready);
        let pause = RecordingPause::default();
        let reporter = RecordingReporter::default();
        let orch = Orchestrator::new(&service, &runtime, &reporter);
        let readiness = Readiness::new(&probe, &pause, policy());

        orch.open(&session(), &readiness).await;

        assert_eq!(
            reporter.transitions(),
            vec![
                (LifecycleState::Idle, LifecycleState::Starting),
                (LifecycleState::Starting, LifecycleState::Polling),
                (LifecycleState::Polling, LifecycleState::Ready),
            ]
        );
    }

    #[tokio::test]
    async fn failed_start_still_polls() {
        let service = ServiceConfig::default();
        let runtime = RecordingRuntime::failing_run();
        let probe = ScriptedProbe::new(vec![refused()], ProbeResult::Ready);
        let pause = RecordingPause::default();
        let reporter = RecordingReporter::default();
        let orch = Orchestrator::new(&service, &runtime, &reporter);
        let readiness = Readiness::new(&probe, &pause, policy());

        let outcome = orch.open(&session(), &readiness).await;

        assert!(!outcome.start.started.is_success());
        assert_eq!(probe.calls(), 2);
        assert_eq!(outcome.state, LifecycleState::Ready);
    }

    #[tokio::test]
    async fn interactive_start_removes_then_runs_detached() {
        let service = ServiceConfig::default();
        let runtime = RecordingRuntime::default();
        let reporter = RecordingReporter::default();
        let orch = Orchestrator::new(&service, &runtime, &reporter);

        let report = orch.start_interactive_service(&session()).await;

        assert!(!report.removed.is_success());
        assert!(report.started.is_success());
        assert_eq!(runtime.calls(), vec!["rm brain", "run brain"]);
        let specs = runtime.specs.lock().unwrap();
        let args = specs[0].to_args();
        assert!(args.contains(&"-d".to_string()));
        assert!(args.contains(&"9000:9000".to_string()));
        assert!(args.contains(&"/home/me/vault:/home/me/vault".to_string()));
        assert!(args.contains(&"MARKDOWN_FILES=/home/me/vault".to_string()));
        assert!(args.contains(&"OPENAI_API_KEY=sk-secret".to_string()));
    }

    #[tokio::test]
    async fn ingest_stops_removes_then_runs_transient() {
        let service = ServiceConfig::default();
        let runtime = RecordingRuntime::default();
        let reporter = RecordingReporter::default();
        let orch = Orchestrator::new(&service, &runtime, &reporter);

        let report = orch.run_ingest_once(&session()).await;

        assert!(report.ran.is_success());
        assert_eq!(runtime.calls(), vec!["stop brain", "rm brain", "run brain"]);
        let specs = runtime.specs.lock().unwrap();
        let args = specs[0].to_args();
        assert!(args.contains(&"--rm".to_string()));
        assert!(!args.contains(&"-p".to_string()));
        assert_eq!(&args[args.len() - 2..], &["make", "ingest"]);
    }

    #[tokio::test]
    async fn reported_commands_never_leak_the_key() {
        let service = ServiceConfig::default();
        let runtime = RecordingRuntime::default();
        let probe = ScriptedProbe::new(Vec::new(), ProbeResult::Ready);
        let pause = RecordingPause::default();
        let reporter = RecordingReporter::default();
        let orch = Orchestrator::new(&service, &runtime, &reporter);
        let readiness = Readiness::new(&probe, &pause, policy());

        orch.open(&session(), &readiness).await;
        orch.run_ingest_once(&session()).await;

        for event in reporter.events.lock().unwrap().iter() {
            if let LifecycleEvent::Command { label, .. } = event {
                assert!(!label.contains("sk-secret"), "leaked in {}", label);
            }
        }
    }

    #[tokio::test]
    async fn failed_ingest_run_emits_notice() {
        let service = ServiceConfig::default();
        let runtime = RecordingRuntime::failing_run();
        let reporter = RecordingReporter::default();
        let orch = Orchestrator::new(&service, &runtime, &reporter);

        let report = orch.run_ingest_once(&session()).await;

        assert!(!report.ran.is_success());
        let notices = reporter.notices.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].starts_with("Failed ingesting"));
    }
}
