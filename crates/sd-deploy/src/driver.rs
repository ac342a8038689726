//! Orchestration driver
//!
//! Services are deployed strictly in descriptor order. For each one the
//! driver expands placeholders, translates, makes sure the image is present
//! and then creates the container. The first failure aborts the run; services
//! already started are left running.

use serde::Serialize;
use tracing::{debug, info, warn};

use sd_compose::{
    expand_service, translate, Descriptor, RemoteAction, ServiceDescriptor, TranslateContext,
    VariableSet,
};
use sd_core::config::{DefaultsConfig, PullPolicy, DEFAULT_DOCKER_BINARY};
use sd_core::error::{DeployError, ExecutionError};
use sd_remote::CommandChannel;

/// Driver settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    /// Engine binary on the remote host
    pub docker_binary: String,
    /// When images are pulled
    pub pull: PullPolicy,
    /// Record actions without sending them
    pub dry_run: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            docker_binary: DEFAULT_DOCKER_BINARY.to_string(),
            pull: PullPolicy::default(),
            dry_run: false,
        }
    }
}

impl From<&DefaultsConfig> for DeployOptions {
    fn from(config: &DefaultsConfig) -> Self {
        Self {
            docker_binary: config.docker_binary.clone(),
            pull: config.pull,
            dry_run: false,
        }
    }
}

/// Where a run is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Not started
    Pending,
    /// Working through services
    PerServiceLoop,
    /// Every service was deployed
    Succeeded,
    /// Stopped at the first failure
    Aborted,
}

/// A service that was deployed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployedService {
    pub service: String,
    pub container: String,
    /// ID printed by the engine; `None` in dry runs
    pub container_id: Option<String>,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    /// Services in the order they were deployed
    pub services: Vec<DeployedService>,
    /// Every command line sent, or that would have been sent in a dry run
    pub commands: Vec<String>,
    pub dry_run: bool,
}

/// Deploys descriptors over one channel
pub struct Deployer<C: CommandChannel> {
    channel: C,
    options: DeployOptions,
    state: RunState,
}

impl<C: CommandChannel> Deployer<C> {
    pub fn new(channel: C, options: DeployOptions) -> Self {
        Self {
            channel,
            options,
            state: RunState::Pending,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Deploy every service of `descriptor` in order
    ///
    /// # Errors
    ///
    /// Returns the first failure, naming the service it happened on. No
    /// later service is attempted and nothing already started is undone.
    pub async fn deploy(
        &mut self,
        descriptor: &Descriptor,
        ctx: &TranslateContext,
        vars: &VariableSet,
    ) -> Result<DeployReport, DeployError> {
        self.state = RunState::PerServiceLoop;
        let mut report = DeployReport {
            dry_run: self.options.dry_run,
            ..Default::default()
        };

        let total = descriptor.len();
        for (index, service) in descriptor.services().iter().enumerate() {
            info!(
                "Deploying service '{}' ({}/{})",
                service.name,
                index + 1,
                total
            );

            match self.deploy_service(service, ctx, vars, &mut report).await {
                Ok(deployed) => report.services.push(deployed),
                Err(e) => {
                    warn!("Aborting deployment at service '{}': {}", service.name, e);
                    self.state = RunState::Aborted;
                    return Err(e);
                }
            }
        }

        self.state = RunState::Succeeded;
        info!("Deployed {} service(s)", report.services.len());
        Ok(report)
    }

    async fn deploy_service(
        &mut self,
        service: &ServiceDescriptor,
        ctx: &TranslateContext,
        vars: &VariableSet,
        report: &mut DeployReport,
    ) -> Result<DeployedService, DeployError> {
        let expanded = expand_service(service, vars);
        let action = translate(&expanded, ctx)?;

        self.ensure_image(&expanded, report).await?;

        let command_line = action.command_line(&self.options.docker_binary);
        report.commands.push(command_line.clone());

        let container_id = if self.options.dry_run {
            None
        } else {
            let output = self
                .run(&command_line)
                .await
                .map_err(|source| create_error(&expanded, &action, source))?;
            last_line(&output)
        };

        info!(
            "Service '{}' running as container '{}'",
            service.name,
            action.target()
        );

        Ok(DeployedService {
            service: service.name.clone(),
            container: action.target().to_string(),
            container_id,
        })
    }

    async fn ensure_image(
        &mut self,
        service: &ServiceDescriptor,
        report: &mut DeployReport,
    ) -> Result<(), DeployError> {
        let pull =
            RemoteAction::pull(service.image.clone()).command_line(&self.options.docker_binary);
        let pull_error = |source: ExecutionError| DeployError::Pull {
            service: service.name.clone(),
            image: service.image.clone(),
            source,
        };

        match self.options.pull {
            PullPolicy::Never => return Ok(()),
            PullPolicy::Always => {}
            PullPolicy::Missing => {
                let inspect = format!(
                    "{} image inspect {}",
                    self.options.docker_binary, service.image
                );
                report.commands.push(inspect.clone());
                if self.options.dry_run {
                    return Ok(());
                }
                match self.run(&inspect).await {
                    Ok(_) => {
                        debug!("Image {} already present", service.image);
                        return Ok(());
                    }
                    Err(e) if e.is_remote_exit() => {}
                    Err(e) => return Err(pull_error(e)),
                }
            }
        }

        report.commands.push(pull.clone());
        if !self.options.dry_run {
            info!("Pulling image {}", service.image);
            self.run(&pull).await.map_err(pull_error)?;
        }
        Ok(())
    }

    async fn run(&mut self, command_line: &str) -> Result<String, ExecutionError> {
        debug!("Executing: {}", command_line);
        let output = self.channel.execute(command_line).await?;
        Ok(output.text())
    }
}

fn create_error(
    service: &ServiceDescriptor,
    action: &RemoteAction,
    source: ExecutionError,
) -> DeployError {
    DeployError::Create {
        service: service.name.clone(),
        container: action.target().to_string(),
        source,
    }
}

fn last_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
}
