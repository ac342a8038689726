//! Container name, port and volume checks

/// Longest container name the engine accepts
pub const MAX_CONTAINER_NAME_LEN: usize = 253;

/// Whether `name` is a valid container name
///
/// The first character is alphanumeric; the rest are alphanumeric or one of
/// `_`, `.`, `-`.
pub fn is_valid_container_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_CONTAINER_NAME_LEN {
        return false;
    }

    let mut chars = name.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    first_ok && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Check a `host:container` port mapping
///
/// Both sides must be numeric ports in 1..=65535. A `/tcp` or `/udp` suffix
/// on the container port is allowed.
pub fn validate_port_mapping(mapping: &str) -> Result<(), String> {
    let (host, container) = mapping
        .split_once(':')
        .ok_or_else(|| format!("invalid port mapping '{}': expected host:container", mapping))?;

    let container = match container.split_once('/') {
        Some((port, "tcp" | "udp")) => port,
        Some((_, proto)) => {
            return Err(format!(
                "invalid port mapping '{}': unknown protocol '{}'",
                mapping, proto
            ))
        }
        None => container,
    };

    for (side, value) in [("host", host), ("container", container)] {
        match value.parse::<u16>() {
            Ok(port) if port > 0 => {}
            _ => {
                return Err(format!(
                    "invalid {} port in '{}': must be between 1 and 65535",
                    side, mapping
                ))
            }
        }
    }

    Ok(())
}

/// Check a `host:container[:opts]` volume mapping as given on the command line
pub fn validate_volume_mapping(mapping: &str) -> Result<(), String> {
    let parts: Vec<&str> = mapping.split(':').collect();
    if !(2..=3).contains(&parts.len()) || parts[0].is_empty() {
        return Err(format!(
            "invalid volume mapping '{}': expected host:container[:options]",
            mapping
        ));
    }
    if !parts[1].starts_with('/') {
        return Err(format!(
            "invalid volume mapping '{}': container path must be absolute",
            mapping
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_names() {
        assert!(is_valid_container_name("myapp_web_1"));
        assert!(is_valid_container_name("nginx"));
        assert!(is_valid_container_name("a.b-c_d"));
        assert!(is_valid_container_name("0day"));

        assert!(!is_valid_container_name(""));
        assert!(!is_valid_container_name("_hidden"));
        assert!(!is_valid_container_name("-dash"));
        assert!(!is_valid_container_name("has space"));
        assert!(!is_valid_container_name("ns/name"));
        assert!(!is_valid_container_name(&"a".repeat(254)));
        assert!(is_valid_container_name(&"a".repeat(253)));
    }

    #[test]
    fn test_port_mappings() {
        assert!(validate_port_mapping("8080:80").is_ok());
        assert!(validate_port_mapping("53:53/udp").is_ok());
        assert!(validate_port_mapping("65535:1").is_ok());

        assert!(validate_port_mapping("8080").is_err());
        assert!(validate_port_mapping("0:80").is_err());
        assert!(validate_port_mapping("8080:70000").is_err());
        assert!(validate_port_mapping("http:80").is_err());
        assert!(validate_port_mapping("80:80/sctp").is_err());
    }

    #[test]
    fn test_volume_mappings() {
        assert!(validate_volume_mapping("/volume1/docker/html:/usr/share/nginx/html").is_ok());
        assert!(validate_volume_mapping("./data:/data:ro").is_ok());

        assert!(validate_volume_mapping("/data").is_err());
        assert!(validate_volume_mapping("./data:data").is_err());
        assert!(validate_volume_mapping("a:/b:ro:extra").is_err());
    }
}
