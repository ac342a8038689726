//! Remote endpoint description

use std::fmt;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// How the channel authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialRef {
    /// Private key file on the local machine
    KeyFile(PathBuf),
    /// Identities held by the running ssh-agent (`SSH_AUTH_SOCK`)
    Agent,
}

impl fmt::Display for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialRef::KeyFile(path) => write!(f, "key {}", path.display()),
            CredentialRef::Agent => write!(f, "ssh-agent"),
        }
    }
}

/// Where and as whom to connect
///
/// Built once from configuration and handed to the channel on connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    host: String,
    port: u16,
    user: String,
    credential: CredentialRef,
}

impl RemoteEndpoint {
    /// Create a new endpoint
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        credential: CredentialRef,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            credential,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn credential(&self) -> &CredentialRef {
        &self.credential
    }

    /// `host:port` form for socket connection
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Split a `host[:port]` string
///
/// A missing or empty port yields [`DEFAULT_SSH_PORT`].
pub fn parse_host_port(input: &str) -> Result<(String, u16), ConfigError> {
    if input.is_empty() {
        return Err(ConfigError::Invalid("host cannot be empty".to_string()));
    }

    let parts: Vec<&str> = input.split(':').collect();
    match parts.as_slice() {
        [host] => Ok((host.to_string(), DEFAULT_SSH_PORT)),
        [host, ""] => Ok((host.to_string(), DEFAULT_SSH_PORT)),
        [host, port] => {
            let port: u16 = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("invalid port: {}", port)))?;
            if port == 0 {
                return Err(ConfigError::Invalid(
                    "port must be between 1 and 65535".to_string(),
                ));
            }
            Ok((host.to_string(), port))
        }
        _ => Err(ConfigError::Invalid(format!(
            "invalid host:port format: {}",
            input
        ))),
    }
}

/// Lowercase a host and strip any URL scheme or trailing slash
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().to_lowercase();
    let host = host
        .strip_prefix("http://")
        .or_else(|| host.strip_prefix("https://"))
        .unwrap_or(&host);
    host.strip_suffix('/').unwrap_or(host).to_string()
}
