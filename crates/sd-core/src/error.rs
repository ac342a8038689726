//! Core error types for syno-deploy

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the syno-deploy ecosystem
#[derive(Error, Debug)]
pub enum SdError {
    /// Channel establishment error
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Remote command error
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Descriptor or variable file error
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    /// Service translation error
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Deployment run error
    #[error("Deploy error: {0}")]
    Deploy(#[from] DeployError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors establishing the secure channel
///
/// All of these are fatal to a run; the channel has to be rebuilt.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The server rejected every credential offered
    #[error("Authentication failed for {user}@{host}")]
    AuthFailure { user: String, host: String },

    /// TCP connection or SSH handshake could not complete
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// SSH protocol failure after the transport came up
    #[error("SSH protocol error: {0}")]
    Protocol(String),

    /// Private key could not be read or parsed
    #[error("Failed to load private key {path}: {reason}")]
    KeyLoad { path: PathBuf, reason: String },

    /// Server key did not match the configured fingerprint
    #[error("Host key verification failed: expected {expected}, got {actual}")]
    HostKeyMismatch { expected: String, actual: String },
}

/// Errors running a command over an established channel
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The channel was closed before the call
    #[error("Channel closed")]
    ChannelClosed,

    /// The remote process exited with a non-zero status
    #[error("`{command}` exited with status {status}: {}", .output.trim())]
    RemoteNonZeroExit {
        command: String,
        status: u32,
        output: String,
    },

    /// The caller cancelled a streaming command
    #[error("`{command}` cancelled")]
    Cancelled { command: String },

    /// The sub-session failed at the transport level
    #[error("`{command}` failed: {reason}")]
    Transport { command: String, reason: String },
}

impl ExecutionError {
    /// Output captured from the remote process, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            ExecutionError::RemoteNonZeroExit { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Whether this is a remote non-zero exit rather than a channel fault
    pub fn is_remote_exit(&self) -> bool {
        matches!(self, ExecutionError::RemoteNonZeroExit { .. })
    }
}

/// Malformed descriptor or variable file
#[derive(Error, Debug)]
pub enum SyntaxError {
    /// The document is not valid YAML or has the wrong structure
    #[error("Invalid descriptor: {0}")]
    Yaml(String),

    /// A service entry could not be read
    #[error("Invalid service '{service}': {reason}")]
    InvalidService { service: String, reason: String },

    /// A field uses a shape other than the supported ones
    #[error("Unsupported shape for '{field}' in service '{service}': {found}")]
    UnsupportedFieldShape {
        service: String,
        field: &'static str,
        found: String,
    },

    /// File could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A service cannot be mapped to a remote action
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// Volume mapping is malformed or its container path is not absolute
    #[error("Invalid volume '{spec}' in service '{service}': {reason}")]
    InvalidVolumeSpec {
        service: String,
        spec: String,
        reason: String,
    },

    /// Service has no image
    #[error("Service '{service}' has no image")]
    MissingImage { service: String },

    /// Resolved container name is not a valid engine name
    #[error("Invalid container name '{name}' for service '{service}'")]
    InvalidName { service: String, name: String },
}

impl TranslationError {
    /// Name of the service that failed to translate
    pub fn service(&self) -> &str {
        match self {
            TranslationError::InvalidVolumeSpec { service, .. }
            | TranslationError::MissingImage { service }
            | TranslationError::InvalidName { service, .. } => service,
        }
    }
}

/// First failure of a deployment run
#[derive(Error, Debug)]
pub enum DeployError {
    /// The service could not be translated
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// Ensuring the image is present failed
    #[error("Service '{service}': failed to pull {image}: {source}")]
    Pull {
        service: String,
        image: String,
        #[source]
        source: ExecutionError,
    },

    /// The create-and-start action failed
    #[error("Service '{service}': failed to create container {container}: {source}")]
    Create {
        service: String,
        container: String,
        #[source]
        source: ExecutionError,
    },
}

impl DeployError {
    /// Name of the service the run aborted on
    pub fn service(&self) -> &str {
        match self {
            DeployError::Translation(e) => e.service(),
            DeployError::Pull { service, .. } | DeployError::Create { service, .. } => service,
        }
    }

    /// Remote output captured for the failing command, if any
    pub fn remote_output(&self) -> Option<&str> {
        match self {
            DeployError::Translation(_) => None,
            DeployError::Pull { source, .. } | DeployError::Create { source, .. } => {
                source.output()
            }
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}
