//! CLI command implementations

mod config;
mod container;
mod deploy;
mod run;

pub use config::{config_path, config_show};
pub use container::{
    check_command, exec_command, lifecycle_command, logs_command, ps_command, pull_command,
    Lifecycle,
};
pub use deploy::{deploy_command, DeployArgs};
pub use run::{run_command, RunArgs};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use sd_core::config::ClientConfig;
use sd_core::endpoint::{normalize_host, parse_host_port};
use sd_remote::{ConnectOptions, SshChannel};

use crate::output::print_info;

/// Remote settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct RemoteOverrides {
    /// `host` or `host:port`
    pub host: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub key: Option<PathBuf>,
}

/// Load the client configuration and apply command-line overrides
pub fn load_client_config(
    config_path: Option<&Path>,
    overrides: &RemoteOverrides,
) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(config_path).context("Failed to load configuration")?;

    if let Some(host) = &overrides.host {
        let (host, port) = parse_host_port(&normalize_host(host))?;
        config.remote.host = host;
        if host_has_port(&overrides.host) {
            config.remote.port = port;
        }
    }
    if let Some(user) = &overrides.user {
        config.remote.user = user.clone();
    }
    if let Some(port) = overrides.port {
        config.remote.port = port;
    }
    if let Some(key) = &overrides.key {
        config.remote.key_path = Some(key.clone());
        config.remote.use_agent = false;
    }

    Ok(config)
}

fn host_has_port(host: &Option<String>) -> bool {
    host.as_deref()
        .map(|h| normalize_host(h).contains(':'))
        .unwrap_or(false)
}

/// Connect to the configured remote host
pub async fn connect(config: &ClientConfig) -> Result<SshChannel> {
    config
        .validate()
        .context("Configuration incomplete (set [remote] host in the config file or pass --host)")?;

    let endpoint = config.remote.endpoint()?;
    print_info(&format!("Connecting to {}...", endpoint));

    let channel = SshChannel::connect(&endpoint, &ConnectOptions::from(&config.remote))
        .await
        .with_context(|| format!("Connection to {} failed", endpoint.address()))?;
    debug!("SSH session established");
    Ok(channel)
}
