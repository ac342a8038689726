//! SSH-backed command channel
//!
//! Opens one SSH session to the remote host and runs each command line on
//! its own session channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use russh::client::{self, Config, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use sd_core::config::RemoteConfig;
use sd_core::endpoint::{CredentialRef, RemoteEndpoint};
use sd_core::error::{ChannelError, ExecutionError};

use crate::channel::{CommandChannel, ExecOutput, OutputFn};

/// `PATH` requested for each command so the engine binary resolves
pub const DEFAULT_REMOTE_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Extended data stream number for stderr (RFC 4254)
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Options for [`SshChannel::connect`]
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Bound on TCP connect and SSH handshake
    pub connect_timeout: Duration,
    /// Expected server key fingerprint; any key is accepted when unset
    pub host_key_fingerprint: Option<String>,
    /// `PATH` requested for every command
    pub remote_path: String,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            host_key_fingerprint: None,
            remote_path: DEFAULT_REMOTE_PATH.to_string(),
        }
    }
}

impl From<&RemoteConfig> for ConnectOptions {
    fn from(remote: &RemoteConfig) -> Self {
        Self {
            connect_timeout: remote.connect_timeout,
            host_key_fingerprint: remote.host_key_fingerprint.clone(),
            ..Default::default()
        }
    }
}

/// A single authenticated SSH session
///
/// Created by [`SshChannel::connect`]; there is no reconnect. After
/// [`close`](CommandChannel::close) every call returns
/// [`ExecutionError::ChannelClosed`].
pub struct SshChannel {
    /// Session handle, `None` once closed
    session: Option<Handle<ClientHandler>>,
    /// `user@host:port` for log lines
    label: String,
    /// `PATH` requested for each command
    remote_path: String,
}

impl SshChannel {
    /// Connect and authenticate once
    ///
    /// A rejected credential is [`ChannelError::AuthFailure`]; nothing is
    /// retried.
    pub async fn connect(
        endpoint: &RemoteEndpoint,
        options: &ConnectOptions,
    ) -> Result<Self, ChannelError> {
        let ssh_config = Arc::new(Config::default());
        let handler = ClientHandler::new(options.host_key_fingerprint.clone());

        tracing::debug!("Connecting to {}", endpoint.address());
        let mut session = tokio::time::timeout(
            options.connect_timeout,
            client::connect(ssh_config, (endpoint.host(), endpoint.port()), handler),
        )
        .await
        .map_err(|_| {
            ChannelError::NetworkUnreachable(format!(
                "timed out connecting to {} after {:?}",
                endpoint.address(),
                options.connect_timeout
            ))
        })?
        .map_err(|e| e.into_channel_error(endpoint))?;

        tracing::debug!(
            "Authenticating as '{}' with {}",
            endpoint.user(),
            endpoint.credential()
        );
        let authenticated = match endpoint.credential() {
            CredentialRef::KeyFile(path) => {
                let key = russh_keys::load_secret_key(path, None).map_err(|e| {
                    ChannelError::KeyLoad {
                        path: path.clone(),
                        reason: e.to_string(),
                    }
                })?;
                session
                    .authenticate_publickey(endpoint.user(), Arc::new(key))
                    .await
                    .map_err(|e| ChannelError::Protocol(format!("authentication error: {}", e)))?
            }
            CredentialRef::Agent => authenticate_with_agent(&mut session, endpoint.user()).await?,
        };

        if !authenticated {
            return Err(ChannelError::AuthFailure {
                user: endpoint.user().to_string(),
                host: endpoint.host().to_string(),
            });
        }

        tracing::info!("Connected to {}", endpoint);
        Ok(Self {
            session: Some(session),
            label: endpoint.to_string(),
            remote_path: options.remote_path.clone(),
        })
    }

    /// Open a session channel and start `command_line` on it
    async fn start(&self, command_line: &str) -> Result<Channel<Msg>, ExecutionError> {
        let session = match &self.session {
            Some(session) if !session.is_closed() => session,
            _ => return Err(ExecutionError::ChannelClosed),
        };

        let channel = session
            .channel_open_session()
            .await
            .map_err(|e| transport(command_line, e))?;

        // Servers may refuse environment requests; PATH is best-effort.
        if let Err(e) = channel.set_env(false, "PATH", self.remote_path.as_str()).await {
            tracing::debug!("PATH request ignored: {}", e);
        }

        tracing::debug!("[{}] $ {}", self.label, command_line);
        channel
            .exec(true, command_line)
            .await
            .map_err(|e| transport(command_line, e))?;

        Ok(channel)
    }
}

#[async_trait]
impl CommandChannel for SshChannel {
    async fn execute(&mut self, command_line: &str) -> Result<ExecOutput, ExecutionError> {
        let mut channel = self.start(command_line).await?;
        let mut output = BytesMut::new();
        let mut exit_status = None;

        // Exit status can arrive before the last data, so drain until close.
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => output.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, .. } => output.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                ChannelMsg::Failure => {
                    return Err(ExecutionError::Transport {
                        command: command_line.to_string(),
                        reason: "server refused exec request".to_string(),
                    })
                }
                _ => {}
            }
        }

        let output = ExecOutput::new(output.freeze());
        match exit_status {
            Some(0) => Ok(output),
            Some(status) => Err(ExecutionError::RemoteNonZeroExit {
                command: command_line.to_string(),
                status,
                output: output.text(),
            }),
            None => Err(ExecutionError::Transport {
                command: command_line.to_string(),
                reason: "channel closed without exit status".to_string(),
            }),
        }
    }

    async fn stream(
        &mut self,
        command_line: &str,
        on_stdout: OutputFn<'_>,
        on_stderr: OutputFn<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutionError> {
        let mut channel = self.start(command_line).await?;
        let mut exit_status = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("[{}] cancelling `{}`", self.label, command_line);
                    if let Err(e) = channel.close().await {
                        tracing::debug!("Channel close failed: {}", e);
                    }
                    return Err(ExecutionError::Cancelled {
                        command: command_line.to_string(),
                    });
                }
                msg = channel.wait() => match msg {
                    Some(ChannelMsg::Data { ref data }) => on_stdout(data),
                    Some(ChannelMsg::ExtendedData { ref data, ext }) => {
                        if ext == SSH_EXTENDED_DATA_STDERR {
                            on_stderr(data);
                        } else {
                            on_stdout(data);
                        }
                    }
                    Some(ChannelMsg::ExitStatus { exit_status: status }) => exit_status = Some(status),
                    Some(ChannelMsg::Failure) => {
                        return Err(ExecutionError::Transport {
                            command: command_line.to_string(),
                            reason: "server refused exec request".to_string(),
                        });
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }

        match exit_status {
            Some(0) => Ok(()),
            Some(status) => Err(ExecutionError::RemoteNonZeroExit {
                command: command_line.to_string(),
                status,
                output: String::new(),
            }),
            None => Err(ExecutionError::Transport {
                command: command_line.to_string(),
                reason: "channel closed without exit status".to_string(),
            }),
        }
    }

    async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::debug!("Disconnecting from {}", self.label);
            if let Err(e) = session
                .disconnect(Disconnect::ByApplication, "closing", "en")
                .await
            {
                tracing::debug!("Disconnect from {} failed: {}", self.label, e);
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.session
            .as_ref()
            .map_or(true, |session| session.is_closed())
    }
}

fn transport(command_line: &str, err: russh::Error) -> ExecutionError {
    ExecutionError::Transport {
        command: command_line.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(unix)]
async fn authenticate_with_agent(
    session: &mut Handle<ClientHandler>,
    user: &str,
) -> Result<bool, ChannelError> {
    use russh_keys::agent::client::AgentClient;

    let mut agent = AgentClient::connect_env()
        .await
        .map_err(|e| ChannelError::KeyLoad {
            path: "SSH_AUTH_SOCK".into(),
            reason: format!("ssh-agent not available: {}", e),
        })?;

    let identities = agent
        .request_identities()
        .await
        .map_err(|e| ChannelError::KeyLoad {
            path: "SSH_AUTH_SOCK".into(),
            reason: format!("failed to list agent identities: {}", e),
        })?;

    if identities.is_empty() {
        return Err(ChannelError::KeyLoad {
            path: "SSH_AUTH_SOCK".into(),
            reason: "no keys available in ssh-agent".to_string(),
        });
    }

    // One authentication phase: offer each identity until one is accepted.
    for key in identities {
        let fingerprint = key.fingerprint();
        let (returned, result) = session.authenticate_future(user, key, agent).await;
        agent = returned;
        match result {
            Ok(true) => return Ok(true),
            Ok(false) => tracing::debug!("Agent key {} rejected", fingerprint),
            Err(e) => {
                return Err(ChannelError::Protocol(format!(
                    "agent signing failed: {}",
                    e
                )))
            }
        }
    }

    Ok(false)
}

#[cfg(not(unix))]
async fn authenticate_with_agent(
    _session: &mut Handle<ClientHandler>,
    _user: &str,
) -> Result<bool, ChannelError> {
    Err(ChannelError::KeyLoad {
        path: "SSH_AUTH_SOCK".into(),
        reason: "ssh-agent authentication is only supported on unix".to_string(),
    })
}

/// Errors raised from inside the SSH client handler
#[derive(Debug, Error)]
enum HandlerError {
    #[error(transparent)]
    Ssh(#[from] russh::Error),

    #[error("host key mismatch: expected {expected}, got {actual}")]
    HostKey { expected: String, actual: String },
}

impl HandlerError {
    fn into_channel_error(self, endpoint: &RemoteEndpoint) -> ChannelError {
        match self {
            HandlerError::HostKey { expected, actual } => {
                ChannelError::HostKeyMismatch { expected, actual }
            }
            HandlerError::Ssh(russh::Error::IO(e)) => ChannelError::NetworkUnreachable(format!(
                "failed to connect to {}: {}",
                endpoint.address(),
                e
            )),
            HandlerError::Ssh(e) => ChannelError::Protocol(e.to_string()),
        }
    }
}

/// SSH client handler
struct ClientHandler {
    /// Expected host key fingerprint
    expected_host_key: Option<String>,
}

impl ClientHandler {
    fn new(expected_host_key: Option<String>) -> Self {
        Self { expected_host_key }
    }
}

/// Compare fingerprints, ignoring an optional `SHA256:` prefix on either side
fn fingerprint_matches(expected: &str, actual: &str) -> bool {
    let strip = |s: &str| s.trim().trim_start_matches("SHA256:").to_string();
    strip(expected) == strip(actual)
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = HandlerError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        tracing::debug!("Server host key: SHA256:{}", fingerprint);

        match &self.expected_host_key {
            Some(expected) if !fingerprint_matches(expected, &fingerprint) => {
                Err(HandlerError::HostKey {
                    expected: expected.clone(),
                    actual: format!("SHA256:{}", fingerprint),
                })
            }
            _ => Ok(true),
        }
    }
}
