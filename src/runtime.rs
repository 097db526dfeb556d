//! Container runtime invocations.
//!
//! The shim never talks to the container engine directly; it shells out to
//! its CLI (`docker` by default) the same way `git` is driven for repository
//! sync. Every invocation produces a [`CommandOutcome`] instead of an error:
//! the lifecycle flows are best effort and decide what to do with a failure
//! themselves.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Result of one external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CommandOutcome {
    Succeeded { stdout: String },
    Failed { reason: String },
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Succeeded { .. })
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Succeeded { .. } => write!(f, "ok"),
            CommandOutcome::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// Whether the container keeps running or is removed when its command exits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunMode {
    /// `-d`: background service.
    Detached,
    /// `--rm`: one-shot job, removed on exit.
    Transient,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
    /// Masked when a `RunSpec` is displayed.
    pub secret: bool,
}

/// Everything needed for one `run` invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunSpec {
    pub name: String,
    pub image: String,
    pub mode: RunMode,
    /// `(host, container)` port pairs.
    pub ports: Vec<(u16, u16)>,
    /// `(host, container)` bind mounts.
    pub mounts: Vec<(PathBuf, PathBuf)>,
    pub env: Vec<EnvVar>,
    pub tty: bool,
    pub command: Vec<String>,
}

impl RunSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>, mode: RunMode) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            mode,
            ports: Vec::new(),
            mounts: Vec::new(),
            env: Vec::new(),
            tty: false,
            command: Vec::new(),
        }
    }

    pub fn publish(mut self, host: u16, container: u16) -> Self {
        self.ports.push((host, container));
        self
    }

    pub fn mount(mut self, host: impl Into<PathBuf>, container: impl Into<PathBuf>) -> Self {
        self.mounts.push((host.into(), container.into()));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvVar {
            key: key.into(),
            value: value.into(),
            secret: false,
        });
        self
    }

    pub fn secret_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvVar {
            key: key.into(),
            value: value.into(),
            secret: true,
        });
        self
    }

    pub fn tty(mut self) -> Self {
        self.tty = true;
        self
    }

    pub fn command<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = args.into_iter().map(Into::into).collect();
        self
    }

    /// Arguments passed to the runtime binary, starting with `run`.
    pub fn to_args(&self) -> Vec<String> {
        self.render(false)
    }

    fn render(&self, mask_secrets: bool) -> Vec<String> {
        let mut args = vec!["run".to_string()];
        match self.mode {
            RunMode::Detached => args.push("-d".to_string()),
            RunMode::Transient => args.push("--rm".to_string()),
        }
        args.push("--name".to_string());
        args.push(self.name.clone());
        for (host, container) in &self.ports {
            args.push("-p".to_string());
            args.push(format!("{}:{}", host, container));
        }
        for (host, container) in &self.mounts {
            args.push("-v".to_string());
            args.push(format!("{}:{}", host.display(), container.display()));
        }
        for var in &self.env {
            args.push("-e".to_string());
            if mask_secrets && var.secret {
                args.push(format!("{}=****", var.key));
            } else {
                args.push(format!("{}={}", var.key, var.value));
            }
        }
        if self.tty {
            args.push("-t".to_string());
        }
        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

impl fmt::Display for RunSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(true).join(" "))
    }
}

/// The subset of a container CLI the shim needs.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// `--version`; used to detect whether the runtime is installed at all.
    async fn version(&self) -> CommandOutcome;
    async fn remove(&self, name: &str) -> CommandOutcome;
    async fn stop(&self, name: &str) -> CommandOutcome;
    async fn run(&self, spec: &RunSpec) -> CommandOutcome;
}

/// Drives the `docker` CLI (or any binary with the same verbs).
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn exec(&self, args: &[String]) -> CommandOutcome {
        let output = match Command::new(&self.binary).args(args).output().await {
            Ok(output) => output,
            Err(e) => {
                return CommandOutcome::Failed {
                    reason: format!("failed to execute '{}': {}", self.binary, e),
                }
            }
        };

        if output.status.success() {
            CommandOutcome::Succeeded {
                stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            }
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = match stderr.trim() {
                "" => format!("exited with {}", output.status),
                msg => msg.to_string(),
            };
            CommandOutcome::Failed { reason }
        }
    }

    /// Run with the child's output passed through instead of captured.
    ///
    /// stdout is sent to our stderr so the CLI's stdout keeps carrying only
    /// results. The outcome has an empty `stdout`.
    async fn exec_streamed(&self, args: &[String]) -> CommandOutcome {
        let status = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(std::io::stderr())
            .stderr(Stdio::inherit())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => CommandOutcome::Succeeded {
                stdout: String::new(),
            },
            Ok(status) => CommandOutcome::Failed {
                reason: format!("exited with {}", status),
            },
            Err(e) => CommandOutcome::Failed {
                reason: format!("failed to execute '{}': {}", self.binary, e),
            },
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn version(&self) -> CommandOutcome {
        self.exec(&["--version".to_string()]).await
    }

    async fn remove(&self, name: &str) -> CommandOutcome {
        self.exec(&["rm".to_string(), "-f".to_string(), name.to_string()])
            .await
    }

    async fn stop(&self, name: &str) -> CommandOutcome {
        self.exec(&["stop".to_string(), name.to_string()]).await
    }

    /// Detached runs print only the container id, which is captured.
    /// Transient runs can take minutes and their output is streamed.
    async fn run(&self, spec: &RunSpec) -> CommandOutcome {
        match spec.mode {
            RunMode::Detached => self.exec(&spec.to_args()).await,
            RunMode::Transient => self.exec_streamed(&spec.to_args()).await,
        }
    }
}
