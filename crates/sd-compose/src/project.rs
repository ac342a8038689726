//! Project naming

use std::path::Path;

/// Name used when none can be derived from the path
pub const DEFAULT_PROJECT_NAME: &str = "synodeploy";

/// Derive a project name from a descriptor path
///
/// Uses the parent directory name, lowercased, keeping only ASCII letters
/// and digits so the result is always a valid container name prefix.
pub fn project_name_from_path(path: &Path) -> String {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok());

    let name: String = dir
        .as_deref()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();

    if name.is_empty() {
        DEFAULT_PROJECT_NAME.to_string()
    } else {
        name
    }
}
