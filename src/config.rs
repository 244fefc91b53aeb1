//! Saved defaults, stored as command-line flags one per line.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::bridge::BridgeOptions;

const APP_DIR: &str = "edbridge";
const LOCAL_FILE: &str = ".edbridgerc";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub ignore_selection_change: bool,
    pub keep_initial_change: bool,
    pub watch: bool,
    pub pretty: bool,
    pub subscribers: Option<usize>,
}

impl ConfigFlags {
    /// Merge `other` over `self`: booleans are OR-ed, options prefer `other`.
    pub const fn union(&self, other: &Self) -> Self {
        Self {
            ignore_selection_change: self.ignore_selection_change || other.ignore_selection_change,
            keep_initial_change: self.keep_initial_change || other.keep_initial_change,
            watch: self.watch || other.watch,
            pretty: self.pretty || other.pretty,
            subscribers: match other.subscribers {
                Some(n) => Some(n),
                None => self.subscribers,
            },
        }
    }

    pub const fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions::new()
            .with_ignore_initial_change(!self.keep_initial_change)
            .with_ignore_selection_change(self.ignore_selection_change)
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join(APP_DIR).join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join(APP_DIR)
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join(APP_DIR).join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join(APP_DIR).join("config");
        }
    }

    PathBuf::from(LOCAL_FILE)
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(LOCAL_FILE)
}

/// Read flags from `path`. A missing file yields the defaults.
///
/// # Errors
/// Returns an error if the file exists but cannot be read.
pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

/// Write `flags` to `path`, creating parent directories.
///
/// # Errors
/// Returns an error if the directory or file cannot be written.
pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# edbridge defaults (saved with --save)".to_string()];
    if flags.ignore_selection_change {
        lines.push("--ignore-selection-change".to_string());
    }
    if flags.keep_initial_change {
        lines.push("--keep-initial-change".to_string());
    }
    if flags.watch {
        lines.push("--watch".to_string());
    }
    if flags.pretty {
        lines.push("--pretty".to_string());
    }
    if let Some(n) = flags.subscribers {
        lines.push(format!("--subscribers {n}"));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

/// Remove the config file at `path` if present.
///
/// # Errors
/// Returns an error if the file exists but cannot be removed.
pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Extract known flags from raw tokens, ignoring everything else.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        match token {
            "--ignore-selection-change" => flags.ignore_selection_change = true,
            "--keep-initial-change" => flags.keep_initial_change = true,
            "--watch" | "-w" => flags.watch = true,
            "--pretty" => flags.pretty = true,
            "--subscribers" => {
                if let Some(next) = tokens.get(i + 1) {
                    flags.subscribers = next.parse().ok();
                    i += 1;
                }
            }
            _ => {
                if let Some(value) = token.strip_prefix("--subscribers=") {
                    flags.subscribers = value.parse().ok();
                }
            }
        }
        i += 1;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tokens(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_flag_tokens_extracts_known_flags() {
        let flags = parse_flag_tokens(&tokens(&[
            "edbridge",
            "--ignore-selection-change",
            "-w",
            "--subscribers",
            "3",
            "edits.script",
        ]));
        assert!(flags.ignore_selection_change);
        assert!(flags.watch);
        assert!(!flags.keep_initial_change);
        assert_eq!(flags.subscribers, Some(3));
    }

    #[test]
    fn test_bridge_options_from_flags() {
        assert_eq!(ConfigFlags::default().bridge_options(), BridgeOptions::default());
        let flags = ConfigFlags {
            keep_initial_change: true,
            ignore_selection_change: true,
            ..ConfigFlags::default()
        };
        let options = flags.bridge_options();
        assert!(!options.ignore_initial_change);
        assert!(options.ignore_selection_change);
    }

    #[test]
    fn test_union_prefers_later_subscriber_count() {
        let file = ConfigFlags {
            watch: true,
            subscribers: Some(2),
            ..ConfigFlags::default()
        };
        let cli = ConfigFlags {
            pretty: true,
            subscribers: Some(5),
            ..ConfigFlags::default()
        };
        let merged = file.union(&cli);
        assert!(merged.watch);
        assert!(merged.pretty);
        assert_eq!(merged.subscribers, Some(5));
        assert_eq!(cli.union(&ConfigFlags::default()).subscribers, Some(5));
    }

    #[test]
    fn test_save_load_and_clear_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config");
        let flags = ConfigFlags {
            ignore_selection_change: true,
            keep_initial_change: true,
            watch: true,
            pretty: true,
            subscribers: Some(4),
        };

        save_config_flags(&path, &flags).unwrap();
        assert_eq!(load_config_flags(&path).unwrap(), flags);

        clear_config_flags(&path).unwrap();
        assert!(!path.exists());
        assert_eq!(load_config_flags(&path).unwrap(), ConfigFlags::default());
    }
}
