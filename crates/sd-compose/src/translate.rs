//! Service translation
//!
//! Maps one expanded [`ServiceDescriptor`] onto one fully resolved
//! [`RemoteAction`]. Translation is pure: it never touches the remote host,
//! so a service that cannot be translated is rejected before anything is sent
//! for it.

use serde::Serialize;
use tracing::debug;

use sd_core::config::{DefaultsConfig, DEFAULT_NETWORK, DEFAULT_RESTART_POLICY, DEFAULT_VOLUME_PATH};
use sd_core::error::TranslationError;

use crate::descriptor::{Descriptor, ServiceDescriptor};
use crate::validation::is_valid_container_name;

/// Values used where a service leaves a setting unspecified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    /// Host directory relative volume paths are placed under
    pub path_prefix: String,
    /// Network joined when none is named
    pub network: String,
    /// Restart policy applied when none is named
    pub restart: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            path_prefix: DEFAULT_VOLUME_PATH.to_string(),
            network: DEFAULT_NETWORK.to_string(),
            restart: DEFAULT_RESTART_POLICY.to_string(),
        }
    }
}

impl From<&DefaultsConfig> for Defaults {
    fn from(config: &DefaultsConfig) -> Self {
        Self {
            path_prefix: config.volume_path.clone(),
            network: config.network.clone(),
            restart: config.restart.clone(),
        }
    }
}

/// Per-run translation settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslateContext {
    /// Project name; when set, containers are named `<project>_<service>_1`
    pub project: Option<String>,
    pub defaults: Defaults,
}

impl TranslateContext {
    pub fn new(project: Option<String>, defaults: Defaults) -> Self {
        Self { project, defaults }
    }
}

/// What a remote action does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Create and start a detached container
    CreateContainer,
    /// Fetch an image
    PullImage,
}

impl ActionKind {
    fn verb(&self) -> &'static [&'static str] {
        match self {
            ActionKind::CreateContainer => &["run", "-d"],
            ActionKind::PullImage => &["pull"],
        }
    }
}

/// A single engine invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteAction {
    kind: ActionKind,
    target: String,
    args: Vec<String>,
}

impl RemoteAction {
    /// Pull `image`
    pub fn pull(image: impl Into<String>) -> Self {
        let image = image.into();
        Self {
            kind: ActionKind::PullImage,
            args: vec![image.clone()],
            target: image,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Container name for creates, image reference for pulls
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Arguments after the verb
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The command line to send, space-joined without quoting
    pub fn command_line(&self, docker_binary: &str) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(1 + self.args.len() + 2);
        parts.push(docker_binary);
        parts.extend_from_slice(self.kind.verb());
        parts.extend(self.args.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// Translate a service into its create action
///
/// Expects placeholders to be expanded already.
///
/// # Errors
///
/// Returns an error if:
/// - The service has no image
/// - The resolved container name is invalid
/// - A volume mapping is malformed or has a relative container path
pub fn translate(
    service: &ServiceDescriptor,
    ctx: &TranslateContext,
) -> Result<RemoteAction, TranslationError> {
    if service.image.trim().is_empty() {
        return Err(TranslationError::MissingImage {
            service: service.name.clone(),
        });
    }

    let name = container_name(service, ctx.project.as_deref());
    if !is_valid_container_name(&name) {
        return Err(TranslationError::InvalidName {
            service: service.name.clone(),
            name,
        });
    }

    let mut args = vec!["--name".to_string(), name.clone()];

    for port in &service.ports {
        args.push("-p".to_string());
        args.push(port.clone());
    }

    for volume in &service.volumes {
        args.push("-v".to_string());
        args.push(resolve_volume(&service.name, volume, &ctx.defaults.path_prefix)?);
    }

    for entry in service.environment.entries() {
        args.push("-e".to_string());
        args.push(entry);
    }

    let restart = service.restart.as_deref().unwrap_or(&ctx.defaults.restart);
    if !restart.is_empty() {
        args.push("--restart".to_string());
        args.push(restart.to_string());
    }

    let network = service.network.as_deref().unwrap_or(&ctx.defaults.network);
    if !network.is_empty() {
        args.push("--network".to_string());
        args.push(network.to_string());
    }

    if let Some(user) = &service.user {
        args.push("--user".to_string());
        args.push(user.clone());
    }

    if let Some(dir) = &service.working_dir {
        args.push("-w".to_string());
        args.push(dir.clone());
    }

    args.push(service.image.clone());

    if let Some(command) = &service.command {
        args.extend(command.tokens());
    }

    debug!("Translated service '{}' -> container '{}'", service.name, name);

    Ok(RemoteAction {
        kind: ActionKind::CreateContainer,
        target: name,
        args,
    })
}

/// Translate every service in descriptor order, stopping at the first error
pub fn translate_all(
    descriptor: &Descriptor,
    ctx: &TranslateContext,
) -> Result<Vec<RemoteAction>, TranslationError> {
    descriptor
        .services()
        .iter()
        .map(|service| translate(service, ctx))
        .collect()
}

/// Container name derived from an image reference
///
/// `registry.example.com/team/api:1.4` becomes `api`.
pub fn container_name_from_image(image: &str) -> String {
    let last = image.rsplit('/').next().unwrap_or(image);
    let last = last.split('@').next().unwrap_or(last);
    last.split(':').next().unwrap_or(last).to_string()
}

fn container_name(service: &ServiceDescriptor, project: Option<&str>) -> String {
    if let Some(name) = service.container_name.as_deref().filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    match project.filter(|p| !p.is_empty()) {
        Some(project) => format!("{}_{}_1", project, service.name),
        None => container_name_from_image(&service.image),
    }
}

/// Resolve a `host:container[:opts]` volume mapping
///
/// Host paths not starting with `/` are placed under `prefix`, with a
/// leading `./` dropped. A lone absolute path is an anonymous volume and is
/// returned unchanged.
pub fn resolve_volume(service: &str, spec: &str, prefix: &str) -> Result<String, TranslationError> {
    let invalid = |reason: &str| TranslationError::InvalidVolumeSpec {
        service: service.to_string(),
        spec: spec.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = spec.split(':').collect();
    match parts.as_slice() {
        [single] => {
            if single.starts_with('/') {
                Ok(spec.to_string())
            } else {
                Err(invalid("anonymous volume path must be absolute"))
            }
        }
        [host, container, opts @ ..] if opts.len() <= 1 => {
            let (host, container) = (*host, *container);
            if host.is_empty() {
                return Err(invalid("host path is empty"));
            }
            if !container.starts_with('/') {
                return Err(invalid("container path must be absolute"));
            }

            let host = if host.starts_with('/') {
                host.to_string()
            } else {
                let relative = host.strip_prefix("./").unwrap_or(host);
                format!("{}/{}", prefix.trim_end_matches('/'), relative)
            };

            let mut resolved = format!("{}:{}", host, container);
            if let Some(opts) = opts.first() {
                resolved.push(':');
                resolved.push_str(opts);
            }
            Ok(resolved)
        }
        _ => Err(invalid("expected host:container[:options]")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Command, Environment};

    fn ctx(project: Option<&str>) -> TranslateContext {
        TranslateContext::new(project.map(str::to_string), Defaults::default())
    }

    fn web() -> ServiceDescriptor {
        let mut service = ServiceDescriptor::new("web", "nginx:latest");
        service.ports = vec!["8080:80".to_string()];
        service.volumes = vec!["./html:/usr/share/nginx/html".to_string()];
        service
    }

    #[test]
    fn test_translate_project_service() {
        let action = translate(&web(), &ctx(Some("myapp"))).unwrap();
        assert_eq!(action.kind(), ActionKind::CreateContainer);
        assert_eq!(action.target(), "myapp_web_1");
        assert_eq!(
            action.command_line("/usr/local/bin/docker"),
            "/usr/local/bin/docker run -d --name myapp_web_1 -p 8080:80 \
             -v /volume1/docker/html:/usr/share/nginx/html \
             --restart unless-stopped --network bridge nginx:latest"
        );
    }

    #[test]
    fn test_translate_idempotent() {
        let service = web();
        let ctx = ctx(Some("myapp"));
        assert_eq!(translate(&service, &ctx).unwrap(), translate(&service, &ctx).unwrap());
    }

    #[test]
    fn test_argument_order() {
        let mut service = ServiceDescriptor::new("api", "ghcr.io/acme/api:2.1");
        service.ports = vec!["9000:9000".to_string()];
        service.volumes = vec!["/volume2/api:/data:ro".to_string()];
        service.environment = Environment::Map(vec![("MODE".to_string(), "prod".to_string())]);
        service.restart = Some("always".to_string());
        service.network = Some("host".to_string());
        service.user = Some("1000:1000".to_string());
        service.working_dir = Some("/app".to_string());
        service.command = Some(Command::Tokens(vec!["serve".to_string(), "--verbose".to_string()]));

        let action = translate(&service, &ctx(None)).unwrap();
        assert_eq!(
            action.args(),
            [
                "--name", "api", "-p", "9000:9000", "-v", "/volume2/api:/data:ro", "-e",
                "MODE=prod", "--restart", "always", "--network", "host", "--user", "1000:1000",
                "-w", "/app", "ghcr.io/acme/api:2.1", "serve", "--verbose",
            ]
        );
    }

    #[test]
    fn test_explicit_container_name_wins() {
        let mut service = web();
        service.container_name = Some("frontend".to_string());
        assert_eq!(translate(&service, &ctx(Some("myapp"))).unwrap().target(), "frontend");
    }

    #[test]
    fn test_name_from_image() {
        assert_eq!(container_name_from_image("nginx:latest"), "nginx");
        assert_eq!(container_name_from_image("registry.local:5000/team/api:1.4"), "api");
        assert_eq!(container_name_from_image("linuxserver/plex"), "plex");
        assert_eq!(container_name_from_image("alpine@sha256:abc"), "alpine");
        assert_eq!(translate(&web(), &ctx(None)).unwrap().target(), "nginx");
    }

    #[test]
    fn test_invalid_name() {
        let mut service = web();
        service.container_name = Some("bad name".to_string());
        assert_eq!(
            translate(&service, &ctx(None)),
            Err(TranslationError::InvalidName {
                service: "web".to_string(),
                name: "bad name".to_string(),
            })
        );
    }

    #[test]
    fn test_missing_image() {
        let service = ServiceDescriptor::new("worker", "");
        assert!(matches!(
            translate(&service, &ctx(None)),
            Err(TranslationError::MissingImage { service }) if service == "worker"
        ));
    }

    #[test]
    fn test_resolve_volume() {
        let prefix = "/volume1/docker";
        assert_eq!(
            resolve_volume("s", "./html:/usr/share/nginx/html", prefix).unwrap(),
            "/volume1/docker/html:/usr/share/nginx/html"
        );
        assert_eq!(
            resolve_volume("s", "config:/config:ro", prefix).unwrap(),
            "/volume1/docker/config:/config:ro"
        );
        assert_eq!(
            resolve_volume("s", "/volume2/media:/media", prefix).unwrap(),
            "/volume2/media:/media"
        );
        assert_eq!(resolve_volume("s", "/cache", prefix).unwrap(), "/cache");
        assert_eq!(
            resolve_volume("s", "./x:/x", "/volume1/docker/").unwrap(),
            "/volume1/docker/x:/x"
        );
    }

    #[test]
    fn test_resolve_volume_errors() {
        let prefix = "/volume1/docker";
        for spec in ["./data:data", "cache", ":/data", "a:/b:ro:z"] {
            assert!(
                matches!(
                    resolve_volume("db", spec, prefix),
                    Err(TranslationError::InvalidVolumeSpec { ref service, .. }) if service == "db"
                ),
                "{} should be rejected",
                spec
            );
        }
    }

    #[test]
    fn test_defaults_from_config() {
        let mut config = DefaultsConfig::default();
        config.volume_path = "/volume2/apps".to_string();
        config.network = "apps".to_string();
        let defaults = Defaults::from(&config);
        assert_eq!(defaults.path_prefix, "/volume2/apps");
        assert_eq!(defaults.network, "apps");
        assert_eq!(defaults.restart, "unless-stopped");
    }

    #[test]
    fn test_translate_all_in_order() {
        let descriptor = Descriptor::new(
            None,
            vec![web(), ServiceDescriptor::new("cache", "redis:7")],
        );
        let actions = translate_all(&descriptor, &ctx(Some("myapp"))).unwrap();
        let targets: Vec<_> = actions.iter().map(RemoteAction::target).collect();
        assert_eq!(targets, vec!["myapp_web_1", "myapp_cache_1"]);
    }

    #[test]
    fn test_pull_action() {
        let action = RemoteAction::pull("nginx:latest");
        assert_eq!(action.kind(), ActionKind::PullImage);
        assert_eq!(action.command_line("docker"), "docker pull nginx:latest");
    }
}
