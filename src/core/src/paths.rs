use std::path::PathBuf;

use directories::BaseDirs;

fn env_home_dir() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os("HOME") {
        if !home.is_empty() {
            return Some(PathBuf::from(home));
        }
    }
    if let Some(profile) = std::env::var_os("USERPROFILE") {
        if !profile.is_empty() {
            return Some(PathBuf::from(profile));
        }
    }
    None
}

pub fn user_home_dir() -> Option<PathBuf> {
    if let Some(base) = BaseDirs::new() {
        return Some(base.home_dir().to_path_buf());
    }
    env_home_dir()
}

/// Directory holding `config.toml` and the analytics database.
///
/// `RADIOMON_HOME` wins when set; otherwise `~/.radiomon`.
pub fn radiomon_home_dir() -> Result<PathBuf, String> {
    if let Some(override_dir) = std::env::var_os("RADIOMON_HOME") {
        let path = PathBuf::from(override_dir);
        if path.is_relative() {
            return Err("RADIOMON_HOME must be an absolute path".to_string());
        }
        std::fs::create_dir_all(&path)
            .map_err(|e| format!("failed to create RADIOMON_HOME directory: {e}"))?;
        return Ok(path);
    }

    let home = user_home_dir().ok_or_else(|| {
        "failed to resolve user home; set RADIOMON_HOME or HOME/USERPROFILE".to_string()
    })?;
    let dir = home.join(".radiomon");
    std::fs::create_dir_all(&dir).map_err(|e| format!("failed to create ~/.radiomon: {e}"))?;
    Ok(dir)
}

pub fn radiomon_config_path() -> Result<PathBuf, String> {
    Ok(radiomon_home_dir()?.join("config.toml"))
}

/// Expand `~` and anchor relative paths at the radiomon home.
pub fn resolve_path(value: &str) -> Result<PathBuf, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("path override is empty".to_string());
    }
    let home = user_home_dir();
    if let Some(rest) = trimmed.strip_prefix("~/") {
        if let Some(home) = home {
            return Ok(home.join(rest));
        }
    }
    if trimmed == "~" {
        if let Some(home) = home {
            return Ok(home);
        }
    }
    let path = PathBuf::from(trimmed);
    if path.is_relative() {
        let base = radiomon_home_dir()?;
        return Ok(base.join(path));
    }
    Ok(path)
}
