//! Descriptor model
//!
//! Shapes that compose files allow in more than one form (environment,
//! command) are resolved into tagged variants by the parser, so nothing
//! downstream inspects raw YAML.

use std::collections::BTreeMap;

/// A parsed descriptor: services in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Descriptor {
    /// `version` field, if present
    pub version: Option<String>,
    services: Vec<ServiceDescriptor>,
}

impl Descriptor {
    /// Build a descriptor from services in deployment order
    pub fn new(version: Option<String>, services: Vec<ServiceDescriptor>) -> Self {
        Self { version, services }
    }

    /// Services in document order
    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    /// Look up a service by name
    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Service names in document order
    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Environment as written in the descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// `- KEY=value` entries
    List(Vec<String>),
    /// `KEY: value` pairs, in document order
    Map(Vec<(String, String)>),
}

impl Default for Environment {
    fn default() -> Self {
        Environment::List(Vec::new())
    }
}

impl Environment {
    /// `KEY=value` strings regardless of source shape
    pub fn entries(&self) -> Vec<String> {
        match self {
            Environment::List(list) => list.clone(),
            Environment::Map(pairs) => pairs
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Environment::List(list) => list.is_empty(),
            Environment::Map(pairs) => pairs.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Environment::List(list) => list.len(),
            Environment::Map(pairs) => pairs.len(),
        }
    }
}

/// Command override as written in the descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A single string, passed through as one token
    Shell(String),
    /// A list of tokens
    Tokens(Vec<String>),
}

impl Command {
    /// Tokens appended after the image
    pub fn tokens(&self) -> Vec<String> {
        match self {
            Command::Shell(line) => vec![line.clone()],
            Command::Tokens(tokens) => tokens.clone(),
        }
    }
}

/// One service entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceDescriptor {
    /// Key under `services`
    pub name: String,
    /// Image reference
    pub image: String,
    /// `host:container` port mappings
    pub ports: Vec<String>,
    /// `host:container[:opts]` volume mappings
    pub volumes: Vec<String>,
    /// Environment
    pub environment: Environment,
    /// Restart policy
    pub restart: Option<String>,
    /// Network to join
    pub network: Option<String>,
    /// Working directory inside the container
    pub working_dir: Option<String>,
    /// User to run as
    pub user: Option<String>,
    /// Command override
    pub command: Option<Command>,
    /// Explicit container name
    pub container_name: Option<String>,
    /// Container hostname
    pub hostname: Option<String>,
    /// Labels, in document order
    pub labels: Vec<(String, String)>,
    /// Fields not recognized by this tool, kept verbatim
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ServiceDescriptor {
    /// A service with only a name and an image
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ..Default::default()
        }
    }
}
