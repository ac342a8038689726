//! Variable expansion
//!
//! `${NAME}` and `$NAME` are replaced in one left-to-right pass. Substituted
//! text is never scanned again and undefined names are left as written.

use crate::descriptor::{Command, Environment, ServiceDescriptor};
use crate::envfile::VariableSet;

/// Expand placeholders in `raw`
pub fn expand(raw: &str, vars: &VariableSet) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(close) = braced.find('}') {
                let name = &braced[..close];
                let consumed = close + 3;
                match vars.get(name) {
                    Some(value) if is_name(name) => out.push_str(value),
                    _ => out.push_str(&rest[pos..pos + consumed]),
                }
                rest = &rest[pos + consumed..];
                continue;
            }
        } else {
            let len = name_len(after);
            if len > 0 {
                let name = &after[..len];
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('$');
                        out.push_str(name);
                    }
                }
                rest = &after[len..];
                continue;
            }
        }

        out.push('$');
        rest = after;
    }

    out.push_str(rest);
    out
}

/// Expand every string field of a service
pub fn expand_service(service: &ServiceDescriptor, vars: &VariableSet) -> ServiceDescriptor {
    let one = |s: &String| expand(s, vars);
    let some = |s: &Option<String>| s.as_ref().map(|s| expand(s, vars));
    let all = |list: &[String]| list.iter().map(|s| expand(s, vars)).collect::<Vec<_>>();

    let environment = match &service.environment {
        Environment::List(list) => Environment::List(all(list)),
        Environment::Map(pairs) => Environment::Map(
            pairs
                .iter()
                .map(|(key, value)| (key.clone(), expand(value, vars)))
                .collect(),
        ),
    };

    let command = service.command.as_ref().map(|command| match command {
        Command::Shell(line) => Command::Shell(expand(line, vars)),
        Command::Tokens(tokens) => Command::Tokens(all(tokens)),
    });

    ServiceDescriptor {
        name: service.name.clone(),
        image: one(&service.image),
        ports: all(&service.ports),
        volumes: all(&service.volumes),
        environment,
        restart: some(&service.restart),
        network: some(&service.network),
        working_dir: some(&service.working_dir),
        user: some(&service.user),
        command,
        container_name: some(&service.container_name),
        hostname: some(&service.hostname),
        labels: service
            .labels
            .iter()
            .map(|(key, value)| (key.clone(), expand(value, vars)))
            .collect(),
        extra: service.extra.clone(),
    }
}

/// Length of the `[A-Za-z_][A-Za-z0-9_]*` run at the start of `s`
fn name_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

fn is_name(s: &str) -> bool {
    !s.is_empty() && name_len(s) == s.len()
}
