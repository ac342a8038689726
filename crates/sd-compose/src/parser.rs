//! Compose descriptor parser
//!
//! Reads the top-level `services` mapping of a compose-style YAML document.
//! Other top-level sections (`volumes`, `networks`, `x-*`) are accepted and
//! ignored. Merge keys (`<<: *anchor`) are resolved before services are read.

use std::path::Path;

use serde_yaml::{Mapping, Value};
use tracing::{debug, instrument};

use sd_core::error::SyntaxError;

use crate::descriptor::{Command, Descriptor, Environment, ServiceDescriptor};

/// Parse a descriptor from YAML text
///
/// A document without services is valid and yields an empty descriptor.
///
/// # Errors
///
/// Returns an error if:
/// - The YAML is invalid or the document is not a mapping
/// - A service entry or one of its fields has the wrong type
/// - `environment` or `command` is neither of its two supported shapes
#[instrument(skip(raw))]
pub fn parse_descriptor(raw: &str) -> Result<Descriptor, SyntaxError> {
    if raw.trim().is_empty() {
        return Ok(Descriptor::default());
    }
    let mut document: Value =
        serde_yaml::from_str(raw).map_err(|e| SyntaxError::Yaml(e.to_string()))?;
    document
        .apply_merge()
        .map_err(|e| SyntaxError::Yaml(e.to_string()))?;

    let root = match document {
        Value::Null => return Ok(Descriptor::default()),
        Value::Mapping(root) => root,
        other => {
            return Err(SyntaxError::Yaml(format!(
                "expected a mapping at the top level, found {}",
                kind(&other)
            )))
        }
    };

    let version = root.get("version").and_then(scalar_string);

    let services = match root.get("services") {
        None | Some(Value::Null) => Mapping::new(),
        Some(Value::Mapping(services)) => services.clone(),
        Some(other) => {
            return Err(SyntaxError::Yaml(format!(
                "'services' must be a mapping, found {}",
                kind(other)
            )))
        }
    };

    let mut parsed = Vec::with_capacity(services.len());
    for (key, value) in &services {
        let name = scalar_string(key).ok_or_else(|| {
            SyntaxError::Yaml(format!("service name must be a string, found {}", kind(key)))
        })?;
        parsed.push(parse_service(name, value)?);
    }

    debug!("Parsed {} service(s)", parsed.len());
    Ok(Descriptor::new(version, parsed))
}

/// Read and parse a descriptor file
pub fn parse_descriptor_file(path: &Path) -> Result<Descriptor, SyntaxError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SyntaxError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_descriptor(&raw)
}

fn parse_service(name: String, value: &Value) -> Result<ServiceDescriptor, SyntaxError> {
    let empty = Mapping::new();
    let fields = match value {
        Value::Mapping(fields) => fields,
        Value::Null => &empty,
        other => {
            return Err(SyntaxError::InvalidService {
                service: name,
                reason: format!("expected a mapping, found {}", kind(other)),
            })
        }
    };

    let mut service = ServiceDescriptor {
        name,
        ..Default::default()
    };
    let mut network_mode = None;
    let mut networks = None;

    for (key, value) in fields {
        let Some(key) = key.as_str() else {
            return Err(invalid(&service.name, "field names must be strings"));
        };

        match key {
            "image" => service.image = string_field(&service.name, key, value)?,
            "ports" => service.ports = string_list(&service.name, key, value)?,
            "volumes" => service.volumes = volume_list(&service.name, value)?,
            "environment" => service.environment = environment(&service.name, value)?,
            "restart" => service.restart = optional_string(&service.name, key, value)?,
            "network_mode" => network_mode = optional_string(&service.name, key, value)?,
            "networks" => networks = first_network(&service.name, value)?,
            "command" => service.command = command(&service.name, value)?,
            "working_dir" => service.working_dir = optional_string(&service.name, key, value)?,
            "user" => service.user = optional_string(&service.name, key, value)?,
            "container_name" => {
                service.container_name = optional_string(&service.name, key, value)?
            }
            "hostname" => service.hostname = optional_string(&service.name, key, value)?,
            "labels" => service.labels = pairs(&service.name, key, value)?,
            other => {
                service.extra.insert(other.to_string(), value.clone());
            }
        }
    }

    service.network = network_mode.or(networks);
    Ok(service)
}

fn environment(service: &str, value: &Value) -> Result<Environment, SyntaxError> {
    match value {
        Value::Null => Ok(Environment::default()),
        Value::Sequence(items) => items
            .iter()
            .map(|item| {
                scalar_string(item).ok_or_else(|| shape(service, "environment", item))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Environment::List),
        Value::Mapping(map) => {
            let mut pairs = Vec::with_capacity(map.len());
            for (key, value) in map {
                let key = scalar_string(key).ok_or_else(|| shape(service, "environment", key))?;
                let value = match value {
                    Value::Null => String::new(),
                    other => scalar_string(other)
                        .ok_or_else(|| shape(service, "environment", other))?,
                };
                pairs.push((key, value));
            }
            Ok(Environment::Map(pairs))
        }
        other => Err(shape(service, "environment", other)),
    }
}

fn command(service: &str, value: &Value) -> Result<Option<Command>, SyntaxError> {
    match value {
        Value::Null => Ok(None),
        Value::String(line) => Ok(Some(Command::Shell(line.clone()))),
        Value::Sequence(items) => items
            .iter()
            .map(|item| scalar_string(item).ok_or_else(|| shape(service, "command", item)))
            .collect::<Result<Vec<_>, _>>()
            .map(|tokens| Some(Command::Tokens(tokens))),
        other => Err(shape(service, "command", other)),
    }
}

/// Short or long volume syntax, normalized to `source:target[:opts]`
fn volume_list(service: &str, value: &Value) -> Result<Vec<String>, SyntaxError> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(items) => items,
        other => {
            return Err(invalid(
                service,
                &format!("'volumes' must be a list, found {}", kind(other)),
            ))
        }
    };

    items
        .iter()
        .map(|item| match item {
            Value::Mapping(long) => long_volume(service, long),
            other => scalar_string(other).ok_or_else(|| {
                invalid(
                    service,
                    &format!("volume entries must be strings, found {}", kind(other)),
                )
            }),
        })
        .collect()
}

fn long_volume(service: &str, long: &Mapping) -> Result<String, SyntaxError> {
    let target = long
        .get("target")
        .and_then(scalar_string)
        .ok_or_else(|| invalid(service, "long-syntax volume requires 'target'"))?;
    let read_only = long
        .get("read_only")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut spec = match long.get("source").and_then(scalar_string) {
        Some(source) => format!("{}:{}", source, target),
        None => target,
    };
    if read_only {
        spec.push_str(":ro");
    }
    Ok(spec)
}

/// `networks` as a list or mapping; the first entry is the one joined
fn first_network(service: &str, value: &Value) -> Result<Option<String>, SyntaxError> {
    match value {
        Value::Null => Ok(None),
        Value::Sequence(items) => Ok(items.first().and_then(scalar_string)),
        Value::Mapping(map) => Ok(map.keys().next().and_then(scalar_string)),
        other => Err(invalid(
            service,
            &format!("'networks' must be a list or mapping, found {}", kind(other)),
        )),
    }
}

/// `labels` as `KEY=value` list or mapping
fn pairs(service: &str, field: &str, value: &Value) -> Result<Vec<(String, String)>, SyntaxError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .iter()
            .map(|item| {
                let entry = scalar_string(item).ok_or_else(|| {
                    invalid(service, &format!("'{}' entries must be strings", field))
                })?;
                Ok(match entry.split_once('=') {
                    Some((key, value)) => (key.to_string(), value.to_string()),
                    None => (entry, String::new()),
                })
            })
            .collect(),
        Value::Mapping(map) => map
            .iter()
            .map(|(key, value)| {
                let key = scalar_string(key)
                    .ok_or_else(|| invalid(service, &format!("'{}' keys must be strings", field)))?;
                Ok((key, scalar_string(value).unwrap_or_default()))
            })
            .collect(),
        other => Err(invalid(
            service,
            &format!("'{}' must be a list or mapping, found {}", field, kind(other)),
        )),
    }
}

fn string_field(service: &str, field: &str, value: &Value) -> Result<String, SyntaxError> {
    Ok(optional_string(service, field, value)?.unwrap_or_default())
}

fn optional_string(service: &str, field: &str, value: &Value) -> Result<Option<String>, SyntaxError> {
    match value {
        Value::Null => Ok(None),
        other => scalar_string(other).map(Some).ok_or_else(|| {
            invalid(
                service,
                &format!("'{}' must be a string, found {}", field, kind(other)),
            )
        }),
    }
}

fn string_list(service: &str, field: &str, value: &Value) -> Result<Vec<String>, SyntaxError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .iter()
            .map(|item| {
                scalar_string(item).ok_or_else(|| {
                    invalid(
                        service,
                        &format!("'{}' entries must be strings, found {}", field, kind(item)),
                    )
                })
            })
            .collect(),
        other => Err(invalid(
            service,
            &format!("'{}' must be a list, found {}", field, kind(other)),
        )),
    }
}

/// Strings, numbers and booleans as text
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn invalid(service: &str, reason: &str) -> SyntaxError {
    SyntaxError::InvalidService {
        service: service.to_string(),
        reason: reason.to_string(),
    }
}

fn shape(service: &str, field: &'static str, found: &Value) -> SyntaxError {
    SyntaxError::UnsupportedFieldShape {
        service: service.to_string(),
        field,
        found: kind(found).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::envfile::VariableSet;
    use crate::expand::expand_service;

    const WEB_AND_DB: &str = r#"
version: "3.8"
services:
  web:
    image: nginx:latest
    ports:
      - "8080:80"
    volumes:
      - ./html:/usr/share/nginx/html
    environment:
      - NGINX_HOST=example.com
      - NGINX_PORT=80
    restart: always
  db:
    image: postgres:16
    environment:
      POSTGRES_USER: app
      POSTGRES_PORT: 5432
      POSTGRES_DEBUG:
    command: ["postgres", "-c", "max_connections=200"]
    networks:
      - backend
volumes:
  dbdata: {}
networks:
  backend:
    driver: bridge
"#;

    #[test]
    fn test_parse_services_in_order() {
        let descriptor = parse_descriptor(WEB_AND_DB).unwrap();
        assert_eq!(descriptor.version.as_deref(), Some("3.8"));
        assert_eq!(descriptor.service_names(), vec!["web", "db"]);

        let web = descriptor.get("web").unwrap();
        assert_eq!(web.image, "nginx:latest");
        assert_eq!(web.ports, vec!["8080:80"]);
        assert_eq!(web.volumes, vec!["./html:/usr/share/nginx/html"]);
        assert_eq!(web.restart.as_deref(), Some("always"));
        assert!(web.network.is_none());
        assert!(web.command.is_none());
    }

    #[test]
    fn test_list_and_map_environment() {
        let descriptor = parse_descriptor(WEB_AND_DB).unwrap();

        let web = descriptor.get("web").unwrap();
        assert_eq!(
            web.environment,
            Environment::List(vec![
                "NGINX_HOST=example.com".to_string(),
                "NGINX_PORT=80".to_string()
            ])
        );

        let db = descriptor.get("db").unwrap();
        assert_eq!(
            db.environment.entries(),
            vec!["POSTGRES_USER=app", "POSTGRES_PORT=5432", "POSTGRES_DEBUG="]
        );
    }

    #[test]
    fn test_environment_shapes_equivalent_after_expansion() {
        let yaml = r#"
services:
  listed:
    image: app
    environment:
      - DB_HOST=${HOST}
      - DB_PORT=5432
      - EMPTY=
  mapped:
    image: app
    environment:
      EMPTY:
      DB_PORT: 5432
      DB_HOST: ${HOST}
"#;
        let descriptor = parse_descriptor(yaml).unwrap();
        let vars: VariableSet = [("HOST", "db.internal")].into_iter().collect();

        let entries = |name: &str| -> HashSet<String> {
            expand_service(descriptor.get(name).unwrap(), &vars)
                .environment
                .entries()
                .into_iter()
                .collect()
        };

        assert_eq!(entries("listed"), entries("mapped"));
        assert!(entries("listed").contains("DB_HOST=db.internal"));
    }

    #[test]
    fn test_merge_keys_applied() {
        let yaml = r#"
x-base: &base
  restart: always
  ports:
    - "8080:80"
  environment:
    TZ: UTC
services:
  web:
    <<: *base
    image: nginx:latest
  worker:
    <<: *base
    image: app:1
    restart: on-failure
"#;
        let descriptor = parse_descriptor(yaml).unwrap();

        let web = descriptor.get("web").unwrap();
        assert_eq!(web.image, "nginx:latest");
        assert_eq!(web.ports, vec!["8080:80"]);
        assert_eq!(web.restart.as_deref(), Some("always"));
        assert_eq!(web.environment.entries(), vec!["TZ=UTC"]);
        assert!(!web.extra.contains_key("<<"));

        let worker = descriptor.get("worker").unwrap();
        assert_eq!(worker.restart.as_deref(), Some("on-failure"));
        assert_eq!(worker.ports, vec!["8080:80"]);
    }

    #[test]
    fn test_merge_of_non_mapping_rejected() {
        let yaml = "services:\n  web:\n    <<: 3\n    image: nginx\n";
        assert!(matches!(parse_descriptor(yaml), Err(SyntaxError::Yaml(_))));
    }

    #[test]
    fn test_command_shapes() {
        let descriptor = parse_descriptor(WEB_AND_DB).unwrap();
        assert_eq!(
            descriptor.get("db").unwrap().command,
            Some(Command::Tokens(vec![
                "postgres".to_string(),
                "-c".to_string(),
                "max_connections=200".to_string()
            ]))
        );

        let descriptor =
            parse_descriptor("services:\n  app:\n    image: alpine\n    command: sleep 3600\n")
                .unwrap();
        assert_eq!(
            descriptor.get("app").unwrap().command,
            Some(Command::Shell("sleep 3600".to_string()))
        );
    }

    #[test]
    fn test_network_from_list_or_mode() {
        let descriptor = parse_descriptor(WEB_AND_DB).unwrap();
        assert_eq!(descriptor.get("db").unwrap().network.as_deref(), Some("backend"));

        let yaml = r#"
services:
  app:
    image: alpine
    network_mode: host
    networks:
      frontend: {}
"#;
        let descriptor = parse_descriptor(yaml).unwrap();
        assert_eq!(descriptor.get("app").unwrap().network.as_deref(), Some("host"));
    }

    #[test]
    fn test_empty_documents() {
        assert!(parse_descriptor("").unwrap().is_empty());
        assert!(parse_descriptor("version: '3'\n").unwrap().is_empty());
        assert!(parse_descriptor("services: {}\n").unwrap().is_empty());
        assert!(parse_descriptor("services:\n").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_fields_preserved() {
        let yaml = r#"
services:
  app:
    image: alpine
    depends_on: [db]
    healthcheck:
      test: ["CMD", "true"]
    hostname: app-1
    labels:
      com.example.team: infra
x-common:
  foo: bar
"#;
        let descriptor = parse_descriptor(yaml).unwrap();
        let app = descriptor.get("app").unwrap();
        assert!(app.extra.contains_key("depends_on"));
        assert!(app.extra.contains_key("healthcheck"));
        assert_eq!(app.hostname.as_deref(), Some("app-1"));
        assert_eq!(
            app.labels,
            vec![("com.example.team".to_string(), "infra".to_string())]
        );
    }

    #[test]
    fn test_unsupported_environment_shape() {
        let yaml = "services:\n  app:\n    image: alpine\n    environment: FOO=bar\n";
        let err = parse_descriptor(yaml).unwrap_err();
        assert!(matches!(
            err,
            SyntaxError::UnsupportedFieldShape { ref service, field: "environment", .. } if service == "app"
        ));
    }

    #[test]
    fn test_unsupported_command_shape() {
        let yaml = "services:\n  app:\n    image: alpine\n    command:\n      run: yes\n";
        let err = parse_descriptor(yaml).unwrap_err();
        assert!(matches!(
            err,
            SyntaxError::UnsupportedFieldShape { field: "command", .. }
        ));
    }

    #[test]
    fn test_nested_environment_value_rejected() {
        let yaml = "services:\n  app:\n    image: alpine\n    environment:\n      A:\n        - 1\n";
        assert!(matches!(
            parse_descriptor(yaml),
            Err(SyntaxError::UnsupportedFieldShape { field: "environment", .. })
        ));
    }

    #[test]
    fn test_long_volume_syntax() {
        let yaml = r#"
services:
  app:
    image: alpine
    volumes:
      - type: bind
        source: ./config
        target: /etc/app
        read_only: true
      - /var/cache/app
"#;
        let descriptor = parse_descriptor(yaml).unwrap();
        assert_eq!(
            descriptor.get("app").unwrap().volumes,
            vec!["./config:/etc/app:ro", "/var/cache/app"]
        );
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            parse_descriptor("services: [unclosed"),
            Err(SyntaxError::Yaml(_))
        ));
        assert!(matches!(
            parse_descriptor("- just\n- a list\n"),
            Err(SyntaxError::Yaml(_))
        ));
        assert!(matches!(
            parse_descriptor("services:\n  app: nginx\n"),
            Err(SyntaxError::InvalidService { .. })
        ));
    }

    #[test]
    fn test_parse_descriptor_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker-compose.yml");
        std::fs::write(&path, WEB_AND_DB).unwrap();
        assert_eq!(parse_descriptor_file(&path).unwrap().len(), 2);

        let missing = dir.path().join("nope.yml");
        assert!(matches!(
            parse_descriptor_file(&missing),
            Err(SyntaxError::Io { .. })
        ));
    }
}
