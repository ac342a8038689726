//! Single-container operations

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use sd_compose::{Descriptor, ServiceDescriptor, TranslateContext, VariableSet};
use sd_core::error::{DeployError, ExecutionError};
use sd_remote::channel::OutputFn;
use sd_remote::CommandChannel;

use crate::driver::{DeployOptions, DeployedService, Deployer};

/// One line of `docker ps --format '{{json .}}'`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSummary {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Names")]
    pub names: String,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Ports")]
    pub ports: String,
    #[serde(rename = "CreatedAt")]
    pub created_at: String,
}

/// Engine commands over a borrowed channel
pub struct Engine<'c, C: CommandChannel + ?Sized> {
    channel: &'c mut C,
    docker_binary: String,
}

impl<'c, C: CommandChannel + ?Sized> Engine<'c, C> {
    pub fn new(channel: &'c mut C, docker_binary: impl Into<String>) -> Self {
        Self {
            channel,
            docker_binary: docker_binary.into(),
        }
    }

    /// Pull if needed, then create and start one service
    pub async fn run_container(
        &mut self,
        service: &ServiceDescriptor,
        ctx: &TranslateContext,
        options: DeployOptions,
    ) -> Result<DeployedService, DeployError> {
        let descriptor = Descriptor::new(None, vec![service.clone()]);
        let options = DeployOptions {
            docker_binary: self.docker_binary.clone(),
            ..options
        };

        let mut deployer = Deployer::new(&mut *self.channel, options);
        let mut report = deployer
            .deploy(&descriptor, ctx, &VariableSet::new())
            .await?;
        // one service in, one success out
        Ok(report.services.remove(0))
    }

    /// List containers; stopped ones too when `all` is set
    pub async fn list_containers(
        &mut self,
        all: bool,
    ) -> Result<Vec<ContainerSummary>, ExecutionError> {
        let flag = if all { " -a" } else { "" };
        let output = self
            .execute(&format!("ps{} --format '{{{{json .}}}}'", flag))
            .await?;
        Ok(parse_ps_lines(&output))
    }

    /// Recent log output
    pub async fn container_logs(
        &mut self,
        name: &str,
        tail: Option<u32>,
    ) -> Result<String, ExecutionError> {
        self.execute(&format!("logs{} {}", tail_flag(tail), name))
            .await
    }

    /// Stream log output until the container stops or `cancel` fires
    pub async fn follow_logs(
        &mut self,
        name: &str,
        tail: Option<u32>,
        on_stdout: OutputFn<'_>,
        on_stderr: OutputFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutionError> {
        let command_line = self.command(&format!("logs -f{} {}", tail_flag(tail), name));
        debug!("Streaming: {}", command_line);
        self.channel
            .stream(&command_line, on_stdout, on_stderr, cancel)
            .await
    }

    /// Run a command inside a container and collect its output
    pub async fn exec_in_container(
        &mut self,
        name: &str,
        command: &[String],
    ) -> Result<String, ExecutionError> {
        self.execute(&format!("exec {} {}", name, command.join(" ")))
            .await
    }

    /// Run a command inside a container, forwarding output as it arrives
    pub async fn exec_streaming(
        &mut self,
        name: &str,
        command: &[String],
        on_stdout: OutputFn<'_>,
        on_stderr: OutputFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutionError> {
        let command_line = self.command(&format!("exec {} {}", name, command.join(" ")));
        debug!("Streaming: {}", command_line);
        self.channel
            .stream(&command_line, on_stdout, on_stderr, cancel)
            .await
    }

    pub async fn start(&mut self, names: &[String]) -> Result<String, ExecutionError> {
        self.execute(&format!("start {}", names.join(" "))).await
    }

    /// Stop, waiting up to `time` seconds before killing
    pub async fn stop(
        &mut self,
        names: &[String],
        time: Option<u32>,
    ) -> Result<String, ExecutionError> {
        self.execute(&format!("stop{} {}", time_flag(time), names.join(" ")))
            .await
    }

    pub async fn restart(
        &mut self,
        names: &[String],
        time: Option<u32>,
    ) -> Result<String, ExecutionError> {
        self.execute(&format!("restart{} {}", time_flag(time), names.join(" ")))
            .await
    }

    /// Remove containers; `force` removes running ones
    pub async fn remove(&mut self, names: &[String], force: bool) -> Result<String, ExecutionError> {
        let flag = if force { " -f" } else { "" };
        self.execute(&format!("rm{} {}", flag, names.join(" "))).await
    }

    pub async fn pull_image(&mut self, image: &str) -> Result<String, ExecutionError> {
        self.execute(&format!("pull {}", image)).await
    }

    /// Server version reported by the engine
    pub async fn test_engine(&mut self) -> Result<String, ExecutionError> {
        let output = self
            .execute("version --format '{{.Server.Version}}'")
            .await?;
        Ok(output.trim().to_string())
    }

    fn command(&self, rest: &str) -> String {
        format!("{} {}", self.docker_binary, rest)
    }

    async fn execute(&mut self, rest: &str) -> Result<String, ExecutionError> {
        let command_line = self.command(rest);
        debug!("Executing: {}", command_line);
        let output = self.channel.execute(&command_line).await?;
        Ok(output.text())
    }
}

fn tail_flag(tail: Option<u32>) -> String {
    tail.map(|n| format!(" --tail {}", n)).unwrap_or_default()
}

fn time_flag(time: Option<u32>) -> String {
    time.map(|t| format!(" -t {}", t)).unwrap_or_default()
}

/// Parse `{{json .}}` lines, skipping any that are not valid JSON
fn parse_ps_lines(output: &str) -> Vec<ContainerSummary> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Skipping unparseable ps line: {}", e);
                None
            }
        })
        .collect()
}
