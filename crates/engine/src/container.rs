// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container supervision via the Docker CLI.
//!
//! Workers run one per task in labelled containers
//! (`mycelium.project|run|task`). Attached stdout/stderr is demultiplexed
//! into lines: structured JSON worker events go to the task's JSONL log,
//! anything else becomes `task.log`. On resume the supervisor finds live
//! containers by label and re-attaches instead of restarting them.

use crate::error::EngineError;
use crate::worker::{WorkerOutcome, WorkerRequest, WorkerRunner};
use async_trait::async_trait;
use myc_core::{Clock, Diagnostic, Event, EventRecord, RunId, TokenUsage};
use myc_storage::{DockerConfig, LogSink};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

pub const DAEMON_HINT: &str =
    "Start the Docker daemon and retry, or run with --local-worker to bypass Docker.";

/// Test-only crash injection: abort right after `container.start`.
pub const FAKE_CRASH_ENV: &str = "MYCELIUM_FAKE_CRASH_AFTER_CONTAINER_START";

#[derive(Debug, Error)]
pub enum DockerError {
    #[error("docker daemon unreachable: {detail}")]
    DaemonUnreachable { detail: String },

    #[error("failed to spawn docker for `{op}`: {source}")]
    Spawn {
        op: String,
        #[source]
        source: std::io::Error,
    },

    #[error("docker {op} failed: {stderr}")]
    Command { op: String, stderr: String },

    #[error("worker Dockerfile not found at {path}")]
    MissingDockerfile { path: String },
}

impl Diagnostic for DockerError {
    fn code(&self) -> &'static str {
        "DOCKER_ERROR"
    }

    fn hint(&self) -> Option<String> {
        match self {
            DockerError::DaemonUnreachable { .. } => Some(DAEMON_HINT.into()),
            DockerError::MissingDockerfile { .. } => {
                Some("Scaffold the worker image directory with `myc init`.".into())
            }
            _ => None,
        }
    }
}

/// One demultiplexed output line from a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerLine {
    /// Structured worker event: a JSON object with a string `type`.
    Event { kind: String, payload: Value },
    /// Anything else, logged as `task.log`.
    Raw(String),
}

/// Classify a single output line.
pub fn classify_line(line: &str) -> WorkerLine {
    let trimmed = line.trim();
    if trimmed.starts_with('{') {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
            if let Some(kind) = map.get("type").and_then(Value::as_str) {
                let payload = map.get("payload").cloned().unwrap_or(Value::Null);
                return WorkerLine::Event { kind: kind.to_string(), payload };
            }
        }
    }
    WorkerLine::Raw(line.to_string())
}

/// Container launch parameters, all explicit.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub env: Vec<(String, String)>,
    /// `(host_path, container_path)` bind mounts.
    pub binds: Vec<(String, String)>,
    pub workdir: String,
    pub user: Option<String>,
    pub network_mode: String,
    pub memory_mb: Option<u64>,
    pub cpu_quota: Option<u64>,
    pub pids_limit: Option<u64>,
    pub project: String,
    pub run_id: String,
    pub task_id: String,
}

impl ContainerSpec {
    /// The `docker create` argument vector, labels included.
    pub fn create_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "create".into(),
            "--label".into(),
            format!("mycelium.project={}", self.project),
            "--label".into(),
            format!("mycelium.run={}", self.run_id),
            "--label".into(),
            format!("mycelium.task={}", self.task_id),
            "--network".into(),
            self.network_mode.clone(),
            "-w".into(),
            self.workdir.clone(),
        ];
        if let Some(user) = &self.user {
            args.push("--user".into());
            args.push(user.clone());
        }
        if let Some(mb) = self.memory_mb {
            args.push("--memory".into());
            args.push(format!("{mb}m"));
        }
        if let Some(quota) = self.cpu_quota {
            args.push("--cpu-quota".into());
            args.push(quota.to_string());
        }
        if let Some(pids) = self.pids_limit {
            args.push("--pids-limit".into());
            args.push(pids.to_string());
        }
        for (key, value) in &self.env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }
        for (host, container) in &self.binds {
            args.push("-v".into());
            args.push(format!("{host}:{container}"));
        }
        args.push(self.image.clone());
        args
    }
}

/// A created container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
}

/// Docker CLI wrapper.
#[derive(Debug, Clone, Default)]
pub struct DockerCli;

impl DockerCli {
    async fn docker(&self, args: &[String]) -> Result<String, DockerError> {
        let op = args.first().cloned().unwrap_or_default();
        let output = tokio::process::Command::new("docker")
            .args(args)
            .output()
            .await
            .map_err(|source| DockerError::Spawn { op: op.clone(), source })?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("Cannot connect to the Docker daemon")
            || stderr.contains("Is the docker daemon running")
        {
            Err(DockerError::DaemonUnreachable { detail: stderr })
        } else {
            Err(DockerError::Command { op, stderr })
        }
    }

    async fn docker_strs(&self, args: &[&str]) -> Result<String, DockerError> {
        let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        self.docker(&owned).await
    }

    /// Build the worker image, requiring the Dockerfile template to exist.
    pub async fn build_worker_image_from_template(
        &self,
        context_dir: &Path,
        image: &str,
    ) -> Result<(), DockerError> {
        let dockerfile = context_dir.join("Dockerfile");
        if !dockerfile.is_file() {
            return Err(DockerError::MissingDockerfile {
                path: dockerfile.display().to_string(),
            });
        }
        let context = context_dir.display().to_string();
        self.docker_strs(&["build", "-t", image, &context]).await.map(|_| ())
    }

    pub async fn create_and_start(
        &self,
        spec: &ContainerSpec,
    ) -> Result<ContainerHandle, DockerError> {
        let id = self.docker(&spec.create_args()).await?;
        self.docker_strs(&["start", &id]).await?;
        Ok(ContainerHandle { id })
    }

    /// Follow logs until the container exits, invoking `on_line` per line
    /// on both streams, then return the exit code.
    pub async fn attach_and_wait(
        &self,
        id: &str,
        mut on_line: impl FnMut(WorkerLine) + Send,
    ) -> Result<i64, DockerError> {
        let mut child = tokio::process::Command::new("docker")
            .args(["logs", "-f", id])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|source| DockerError::Spawn { op: "logs".into(), source })?;

        // Fan both streams into one channel; the channel closes when both
        // readers finish.
        let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(256);
        if let Some(stdout) = child.stdout.take() {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        while let Some(line) = rx.recv().await {
            on_line(classify_line(&line));
        }
        let _ = child.wait().await;
        let code = self.docker_strs(&["wait", id]).await?;
        code.trim().parse::<i64>().map_err(|_| DockerError::Command {
            op: "wait".into(),
            stderr: format!("unparseable exit code {code:?}"),
        })
    }

    /// Containers carrying the given task labels: `(id, is_running)`.
    pub async fn list_by_labels(
        &self,
        project: &str,
        run_id: &str,
        task_id: Option<&str>,
    ) -> Result<Vec<(String, bool)>, DockerError> {
        let mut args: Vec<String> = vec![
            "ps".into(),
            "-a".into(),
            "--filter".into(),
            format!("label=mycelium.project={project}"),
            "--filter".into(),
            format!("label=mycelium.run={run_id}"),
        ];
        if let Some(task) = task_id {
            args.push("--filter".into());
            args.push(format!("label=mycelium.task={task}"));
        }
        args.push("--format".into());
        args.push("{{.ID}} {{.State}}".into());

        let output = self.docker(&args).await?;
        Ok(output
            .lines()
            .filter_map(|line| {
                let (id, state) = line.trim().split_once(' ')?;
                Some((id.to_string(), state == "running"))
            })
            .collect())
    }

    pub async fn kill(&self, id: &str) -> Result<(), DockerError> {
        self.docker_strs(&["kill", "--signal", "KILL", id]).await.map(|_| ())
    }

    pub async fn remove(&self, id: &str) -> Result<(), DockerError> {
        self.docker_strs(&["rm", "-f", id]).await.map(|_| ())
    }

    /// Run one bootstrap command inside the container; returns
    /// `(exit_code, stdout, stderr)` with both captures truncated.
    pub async fn exec_capture(
        &self,
        id: &str,
        command: &str,
        output_limit: usize,
    ) -> Result<(i64, String, String), DockerError> {
        let output = tokio::process::Command::new("docker")
            .args(["exec", id, "sh", "-c", command])
            .output()
            .await
            .map_err(|source| DockerError::Spawn { op: "exec".into(), source })?;
        let code = output.status.code().unwrap_or(-1) as i64;
        Ok((
            code,
            truncate(&String::from_utf8_lossy(&output.stdout), output_limit),
            truncate(&String::from_utf8_lossy(&output.stderr), output_limit),
        ))
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}… [truncated]", &text[..end])
}

/// Worker runner that executes the task inside a Docker container.
pub struct DockerWorkerRunner<C: Clock> {
    docker: DockerCli,
    config: DockerConfig,
    sink: Arc<dyn LogSink>,
    run_id: RunId,
    project: String,
    clock: C,
    build_image: bool,
}

impl<C: Clock> DockerWorkerRunner<C> {
    pub fn new(
        config: DockerConfig,
        sink: Arc<dyn LogSink>,
        run_id: RunId,
        project: impl Into<String>,
        clock: C,
        build_image: bool,
    ) -> Self {
        Self {
            docker: DockerCli,
            config,
            sink,
            run_id,
            project: project.into(),
            clock,
            build_image,
        }
    }

    fn emit(&self, task_id: &str, attempt: u32, event: Event) {
        self.sink.append(EventRecord {
            ts: self.clock.iso_ms(),
            run_id: self.run_id.clone(),
            task_id: Some(task_id.to_string()),
            attempt: Some(attempt),
            event,
        });
    }

    fn spec_for(&self, request: &WorkerRequest) -> ContainerSpec {
        let mut env: Vec<(String, String)> =
            request.inputs.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        env.sort();
        ContainerSpec {
            image: self.config.image.clone(),
            env,
            binds: vec![(request.workspace.display().to_string(), "/workspace".into())],
            workdir: "/workspace".into(),
            user: self.config.user.clone(),
            network_mode: self.config.network_mode.clone(),
            memory_mb: self.config.memory_mb,
            cpu_quota: self.config.cpu_quota,
            pids_limit: self.config.pids_limit,
            project: self.project.clone(),
            run_id: self.run_id.to_string(),
            task_id: request.task_id.clone(),
        }
    }

    /// Ordered bootstrap sequence; stops on the first non-zero exit.
    async fn bootstrap(
        &self,
        container: &ContainerHandle,
        request: &WorkerRequest,
    ) -> Result<bool, EngineError> {
        if self.config.bootstrap.is_empty() {
            return Ok(true);
        }
        let task = request.task_id.as_str();
        let attempt = request.attempt;
        self.emit(task, attempt, Event::BootstrapStart { commands: self.config.bootstrap.len() });

        for (index, command) in self.config.bootstrap.iter().enumerate() {
            self.emit(task, attempt, Event::BootstrapCmdStart { index, command: command.clone() });
            let (code, stdout, stderr) = self
                .docker
                .exec_capture(&container.id, command, self.config.bootstrap_output_limit)
                .await?;
            if code == 0 {
                self.emit(task, attempt, Event::BootstrapCmdComplete { index });
            } else {
                self.emit(
                    task,
                    attempt,
                    Event::BootstrapCmdFail { index, exit_code: code, stdout, stderr },
                );
                self.emit(task, attempt, Event::BootstrapFailed { index });
                return Ok(false);
            }
        }
        self.emit(task, attempt, Event::BootstrapComplete {});
        Ok(true)
    }

    /// Attach to the container, translating its output into events and the
    /// final outcome.
    async fn observe(
        &self,
        container: &ContainerHandle,
        request: &WorkerRequest,
    ) -> Result<WorkerOutcome, EngineError> {
        let task = request.task_id.as_str();
        let attempt = request.attempt;
        let mut outcome = WorkerOutcome {
            container_id: Some(container.id.clone()),
            ..WorkerOutcome::default()
        };

        let mut events: Vec<Event> = Vec::new();
        let exit_code = self
            .docker
            .attach_and_wait(&container.id, |line| match line {
                WorkerLine::Event { kind, payload } => {
                    match kind.as_str() {
                        "usage" => {
                            let tokens =
                                payload.get("tokens").and_then(Value::as_u64).unwrap_or(0);
                            let cost = payload
                                .get("estimated_cost")
                                .and_then(Value::as_f64)
                                .unwrap_or(0.0);
                            outcome.usage.tokens += tokens;
                            outcome.usage.estimated_cost += cost;
                        }
                        "result" => {
                            outcome.success =
                                payload.get("success").and_then(Value::as_bool).unwrap_or(false);
                            outcome.reset_to_pending = payload
                                .get("reset_to_pending")
                                .and_then(Value::as_bool)
                                .unwrap_or(false);
                            if let Some(error) =
                                payload.get("error").and_then(Value::as_str)
                            {
                                outcome.error = Some(error.to_string());
                            }
                        }
                        "codex.thread.started" => events.push(Event::CodexThreadStarted {
                            thread_id: string_field(&payload, "thread_id"),
                        }),
                        "codex.thread.resumed" => events.push(Event::CodexThreadResumed {
                            thread_id: string_field(&payload, "thread_id"),
                        }),
                        "codex.auth" => events.push(Event::CodexAuth {
                            method: string_field(&payload, "method"),
                        }),
                        // Unknown structured events are still preserved.
                        _ => events.push(Event::TaskLog {
                            line: serde_json::json!({ "type": kind, "payload": payload })
                                .to_string(),
                        }),
                    }
                }
                WorkerLine::Raw(text) => events.push(Event::TaskLog { line: text }),
            })
            .await?;

        for event in events {
            self.emit(task, attempt, event);
        }
        self.emit(
            task,
            attempt,
            Event::ContainerExit { container_id: container.id.clone(), exit_code: Some(exit_code) },
        );

        if exit_code != 0 && outcome.error.is_none() {
            outcome.success = false;
            outcome.error = Some(format!("worker exited with code {exit_code}"));
        }
        Ok(outcome)
    }
}

fn string_field(payload: &Value, key: &str) -> String {
    payload.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

#[async_trait]
impl<C: Clock> WorkerRunner for DockerWorkerRunner<C> {
    async fn prepare(&self) -> Result<(), EngineError> {
        if self.build_image {
            let context = std::path::PathBuf::from(&self.config.build_context);
            self.docker
                .build_worker_image_from_template(&context, &self.config.image)
                .await?;
        }
        Ok(())
    }

    async fn run(&self, request: &WorkerRequest) -> Result<WorkerOutcome, EngineError> {
        let container = self.docker.create_and_start(&self.spec_for(request)).await?;
        self.emit(
            &request.task_id,
            request.attempt,
            Event::ContainerStart { container_id: container.id.clone() },
        );

        if std::env::var(FAKE_CRASH_ENV).as_deref() == Ok("1") {
            tracing::error!("fake crash injection active, aborting orchestrator");
            std::process::exit(87);
        }

        if !self.bootstrap(&container, request).await? {
            return Ok(WorkerOutcome {
                success: false,
                reset_to_pending: false,
                usage: TokenUsage::default(),
                container_id: Some(container.id.clone()),
                error: Some("bootstrap failed".into()),
            });
        }

        self.observe(&container, request).await
    }

    async fn reattach(
        &self,
        request: &WorkerRequest,
    ) -> Result<Option<WorkerOutcome>, EngineError> {
        let containers = self
            .docker
            .list_by_labels(&self.project, self.run_id.as_str(), Some(&request.task_id))
            .await?;

        let Some((id, running)) = containers.into_iter().next() else {
            return Ok(None);
        };
        if !running {
            // Exited while we were away: a terminated attempt.
            return Ok(None);
        }

        self.emit(
            &request.task_id,
            request.attempt,
            Event::ContainerReattach { container_id: id.clone() },
        );
        let container = ContainerHandle { id };
        self.observe(&container, request).await.map(Some)
    }

    async fn stop_all(&self) -> Result<(), EngineError> {
        if !self.config.stop_containers_on_exit {
            return Ok(());
        }
        let containers =
            self.docker.list_by_labels(&self.project, self.run_id.as_str(), None).await?;
        for (id, running) in containers {
            if running {
                let _ = self.docker.kill(&id).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
