//! Client configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::endpoint::{CredentialRef, RemoteEndpoint, DEFAULT_SSH_PORT};
use crate::error::ConfigError;

/// Default SSH user on a Synology NAS
pub const DEFAULT_USER: &str = "admin";
/// Host directory that relative volume paths are placed under
pub const DEFAULT_VOLUME_PATH: &str = "/volume1/docker";
/// Network containers join when a service names none
pub const DEFAULT_NETWORK: &str = "bridge";
/// Restart policy applied when a service names none
pub const DEFAULT_RESTART_POLICY: &str = "unless-stopped";
/// Container engine binary on DSM 7.2+ Container Manager
pub const DEFAULT_DOCKER_BINARY: &str = "/usr/local/bin/docker";

/// Key files probed, in order, when none is configured
const DEFAULT_KEY_NAMES: [&str; 3] = ["id_rsa", "id_ed25519", "id_ecdsa"];

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Remote host settings
    pub remote: RemoteConfig,
    /// Translation and deployment defaults
    pub defaults: DefaultsConfig,
}

/// `[remote]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Host name or address of the NAS
    pub host: String,

    /// SSH port
    pub port: u16,

    /// SSH user
    pub user: String,

    /// Private key path; `~/` is expanded
    pub key_path: Option<PathBuf>,

    /// Authenticate with ssh-agent instead of a key file
    pub use_agent: bool,

    /// Expected server key fingerprint (`SHA256:...`)
    pub host_key_fingerprint: Option<String>,

    /// Connection timeout
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_SSH_PORT,
            user: DEFAULT_USER.to_string(),
            key_path: None,
            use_agent: false,
            host_key_fingerprint: None,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl RemoteConfig {
    /// Resolve the endpoint to connect to
    ///
    /// Without an explicit key or agent the first of `~/.ssh/id_rsa`,
    /// `id_ed25519` and `id_ecdsa` that exists is used.
    pub fn endpoint(&self) -> Result<RemoteEndpoint, ConfigError> {
        let credential = if self.use_agent {
            CredentialRef::Agent
        } else if let Some(path) = &self.key_path {
            CredentialRef::KeyFile(expand_home(path))
        } else {
            let key = find_default_key().ok_or_else(|| {
                ConfigError::MissingField("remote.key_path (no key found in ~/.ssh)".to_string())
            })?;
            CredentialRef::KeyFile(key)
        };

        Ok(RemoteEndpoint::new(
            self.host.clone(),
            self.port,
            self.user.clone(),
            credential,
        ))
    }
}

/// When the driver makes sure an image exists remotely
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullPolicy {
    /// Pull before every create
    #[default]
    Always,
    /// Pull only when `image inspect` fails
    Missing,
    /// Never pull
    Never,
}

impl fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PullPolicy::Always => write!(f, "always"),
            PullPolicy::Missing => write!(f, "missing"),
            PullPolicy::Never => write!(f, "never"),
        }
    }
}

impl std::str::FromStr for PullPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(PullPolicy::Always),
            "missing" => Ok(PullPolicy::Missing),
            "never" => Ok(PullPolicy::Never),
            other => Err(ConfigError::Invalid(format!("unknown pull policy: {}", other))),
        }
    }
}

/// `[defaults]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Prefix for relative host volume paths
    pub volume_path: String,

    /// Network used when a service names none
    pub network: String,

    /// Restart policy used when a service names none
    pub restart: String,

    /// Path of the engine binary on the remote host
    pub docker_binary: String,

    /// Image pull policy
    pub pull: PullPolicy,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            volume_path: DEFAULT_VOLUME_PATH.to_string(),
            network: DEFAULT_NETWORK.to_string(),
            restart: DEFAULT_RESTART_POLICY.to_string(),
            docker_binary: DEFAULT_DOCKER_BINARY.to_string(),
            pull: PullPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Load from an explicit path, or the default path if it exists
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file yields the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => super::load_config(path),
            None => {
                let default_path = super::default_config_path();
                if default_path.exists() {
                    super::load_config(&default_path)
                } else {
                    tracing::debug!("No config at {:?}, using defaults", default_path);
                    Ok(Self::default())
                }
            }
        }
    }

    /// Check required values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.host.is_empty() {
            return Err(ConfigError::MissingField("remote.host".to_string()));
        }
        if self.remote.user.is_empty() {
            return Err(ConfigError::MissingField("remote.user".to_string()));
        }
        if self.remote.port == 0 {
            return Err(ConfigError::Invalid(
                "remote.port must be between 1 and 65535".to_string(),
            ));
        }
        if self.defaults.docker_binary.is_empty() {
            return Err(ConfigError::MissingField("defaults.docker_binary".to_string()));
        }
        Ok(())
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().unwrap_or_default().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

fn find_default_key() -> Option<PathBuf> {
    let ssh_dir = dirs::home_dir()?.join(".ssh");
    DEFAULT_KEY_NAMES
        .iter()
        .map(|name| ssh_dir.join(name))
        .find(|path| path.exists())
}

/// Duration serialized as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
