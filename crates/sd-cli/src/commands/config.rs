//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use sd_core::config::{self, ClientConfig};

use crate::output::{print_info, print_warning};

fn resolve_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Show the effective configuration
///
/// Prints the file location and the merged settings, with built-in defaults
/// filled in for anything the file leaves out.
pub fn config_show(config_path: Option<&Path>, effective: &ClientConfig) -> Result<()> {
    let path = resolve_path(config_path);

    if path.exists() {
        print_info(&format!("Configuration file: {:?}", path));
    } else {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Showing built-in defaults");
    }
    println!();

    let rendered =
        toml::to_string_pretty(effective).context("Failed to render configuration")?;
    println!("{}", rendered);

    Ok(())
}

/// Print the config file location
pub fn config_path(config_path: Option<&Path>) -> Result<()> {
    println!("{}", resolve_path(config_path).display());
    Ok(())
}
