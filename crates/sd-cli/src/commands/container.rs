//! Single-container commands

use std::io::Write;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use sd_core::config::ClientConfig;
use sd_core::error::ExecutionError;
use sd_deploy::Engine;
use sd_remote::{CommandChannel, SshChannel};

use super::connect;
use crate::output::{format_containers, print_info, print_success, print_warning};

/// Start, stop, restart or remove
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Start,
    Stop { time: Option<u32> },
    Restart { time: Option<u32> },
    Remove { force: bool },
}

impl Lifecycle {
    fn past_tense(&self) -> &'static str {
        match self {
            Lifecycle::Start => "Started",
            Lifecycle::Stop { .. } => "Stopped",
            Lifecycle::Restart { .. } => "Restarted",
            Lifecycle::Remove { .. } => "Removed",
        }
    }
}

/// List containers
pub async fn ps_command(config: &ClientConfig, all: bool, json: bool) -> Result<()> {
    let mut channel = connect(config).await?;
    let result = engine(&mut channel, config).list_containers(all).await;
    channel.close().await;

    let containers = result.context("Failed to list containers")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&containers)?);
    } else {
        println!("{}", format_containers(&containers));
    }
    Ok(())
}

/// Print or follow container logs
pub async fn logs_command(
    config: &ClientConfig,
    name: &str,
    follow: bool,
    tail: Option<u32>,
) -> Result<()> {
    let mut channel = connect(config).await?;

    let result = if follow {
        let cancel = ctrl_c_token();
        let mut on_stdout = |chunk: &[u8]| write_chunk(&mut std::io::stdout(), chunk);
        let mut on_stderr = |chunk: &[u8]| write_chunk(&mut std::io::stderr(), chunk);
        engine(&mut channel, config)
            .follow_logs(name, tail, &mut on_stdout, &mut on_stderr, &cancel)
            .await
    } else {
        engine(&mut channel, config)
            .container_logs(name, tail)
            .await
            .map(|logs| print!("{}", logs))
    };
    channel.close().await;

    match result {
        Ok(()) => Ok(()),
        Err(ExecutionError::Cancelled { .. }) => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to get logs for {}", name)),
    }
}

/// Run a command inside a container, streaming its output
pub async fn exec_command(config: &ClientConfig, name: &str, command: &[String]) -> Result<()> {
    let mut channel = connect(config).await?;
    let cancel = ctrl_c_token();
    let mut on_stdout = |chunk: &[u8]| write_chunk(&mut std::io::stdout(), chunk);
    let mut on_stderr = |chunk: &[u8]| write_chunk(&mut std::io::stderr(), chunk);

    let result = engine(&mut channel, config)
        .exec_streaming(name, command, &mut on_stdout, &mut on_stderr, &cancel)
        .await;
    channel.close().await;

    match result {
        Ok(()) => Ok(()),
        Err(ExecutionError::Cancelled { .. }) => {
            print_warning("Interrupted");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Command failed in {}", name)),
    }
}

/// Start, stop, restart or remove containers
pub async fn lifecycle_command(
    config: &ClientConfig,
    action: Lifecycle,
    names: &[String],
) -> Result<()> {
    let mut channel = connect(config).await?;
    let result = {
        let mut engine = engine(&mut channel, config);
        match action {
            Lifecycle::Start => engine.start(names).await,
            Lifecycle::Stop { time } => engine.stop(names, time).await,
            Lifecycle::Restart { time } => engine.restart(names, time).await,
            Lifecycle::Remove { force } => engine.remove(names, force).await,
        }
    };
    channel.close().await;

    result.with_context(|| format!("Failed to update {}", names.join(", ")))?;
    print_success(&format!("{} {}", action.past_tense(), names.join(", ")));
    Ok(())
}

/// Pull an image
pub async fn pull_command(config: &ClientConfig, image: &str) -> Result<()> {
    let mut channel = connect(config).await?;
    print_info(&format!("Pulling {}...", image));
    let result = engine(&mut channel, config).pull_image(image).await;
    channel.close().await;

    result.with_context(|| format!("Failed to pull {}", image))?;
    print_success(&format!("Pulled {}", image));
    Ok(())
}

/// Check the connection and the remote engine
pub async fn check_command(config: &ClientConfig) -> Result<()> {
    let mut channel = connect(config).await?;
    let result = engine(&mut channel, config).test_engine().await;
    channel.close().await;

    let version = result.context("Container engine not reachable")?;
    print_success(&format!("Connected; container engine version {}", version));
    Ok(())
}

fn engine<'c>(channel: &'c mut SshChannel, config: &ClientConfig) -> Engine<'c, SshChannel> {
    Engine::new(channel, config.defaults.docker_binary.clone())
}

/// Token cancelled on the first Ctrl+C
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}

fn write_chunk(out: &mut impl Write, chunk: &[u8]) {
    let _ = out.write_all(chunk);
    let _ = out.flush();
}
