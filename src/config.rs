//! Tool configuration loaded from config.hcl

use crate::error::{PimError, PimResult};
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// File name looked up next to the executable when no path is given
pub const CONFIG_FILE_NAME: &str = "config.hcl";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PACKAGELESS_CONFIG";

/// Process-wide settings, read once at startup
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root under which all package state lives
    pub base_dir: String,
    /// Host port published for a package's declared container port
    pub start_port: u16,
    /// Reserved for multi-instance port allocation
    pub port_increment: u16,
    /// Register and deregister shell aliases on install/uninstall
    pub alias: bool,
    /// Base URL manifests are fetched from
    pub repository_host: String,
    /// Subdirectory of `base_dir` holding cached manifests
    pub pims_config_dir: String,
    /// Subdirectory of `base_dir` holding package data
    pub pims_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_dir: "~/.packageless/".to_string(),
            start_port: 3000,
            port_increment: 1,
            alias: true,
            repository_host:
                "https://raw.githubusercontent.com/everettraven/packageless-pims/main/pims/"
                    .to_string(),
            pims_config_dir: "pims_config/".to_string(),
            pims_dir: "pims/".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a config.hcl file
    pub fn from_file<P: AsRef<Path>>(path: P) -> PimResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| PimError::filesystem(path, e))?;
        Self::from_hcl(&content)
    }

    /// Parse configuration from HCL attributes
    pub fn from_hcl(content: &str) -> PimResult<Self> {
        let config: Config =
            hcl::from_str(content).map_err(|e| PimError::Decode(e.to_string()))?;

        if config.base_dir.trim().is_empty() {
            return Err(PimError::Config("base_dir must not be empty".to_string()));
        }

        Ok(config)
    }

    /// Resolve the configuration for this process.
    ///
    /// An explicit path (flag or environment) must exist. The default
    /// location next to the executable falls back to built-in defaults when
    /// the file is absent.
    pub fn locate(explicit: Option<&Path>) -> PimResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let exe = std::env::current_exe().map_err(|e| PimError::Config(e.to_string()))?;
        let default_path = exe
            .parent()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

        if default_path.exists() {
            Self::from_file(&default_path)
        } else {
            tracing::debug!(path = %default_path.display(), "no config file, using defaults");
            Ok(Config::default())
        }
    }

    /// Root directory with `~` expanded
    pub fn base_path(&self) -> PathBuf {
        expand_home(&self.base_dir)
    }

    /// Directory holding the locally cached manifests
    pub fn manifest_dir(&self) -> PathBuf {
        join_relative(&self.base_path(), &self.pims_config_dir)
    }

    /// Directory under which package base directories and volumes live
    pub fn package_root(&self) -> PathBuf {
        join_relative(&self.base_path(), &self.pims_dir)
    }
}

/// Join a manifest-style path (possibly with a leading separator) under `root`
pub fn join_relative(root: &Path, path: &str) -> PathBuf {
    let trimmed = path.trim_start_matches(['/', '\\']);
    if trimmed.is_empty() {
        root.to_path_buf()
    } else {
        root.join(trimmed)
    }
}

/// Whether `path` joined under a root stays strictly below it
pub fn is_contained(path: &str) -> bool {
    let relative = Path::new(path.trim_start_matches(['/', '\\']));
    let mut components = relative.components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = home_dir() {
            return join_relative(&home, rest);
        }
    }
    PathBuf::from(path)
}

/// The current user's home directory
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_hcl("base_dir = \"/opt/pl\"\nalias = false\nstart_port = 4000\n").unwrap();
        assert_eq!(config.base_dir, "/opt/pl");
        assert!(!config.alias);
        assert_eq!(config.start_port, 4000);
        assert_eq!(config.port_increment, 1);
        assert_eq!(config.pims_dir, "pims/");
    }

    #[test]
    fn derived_directories() {
        let config = Config::from_hcl("base_dir = \"/opt/pl/\"").unwrap();
        assert_eq!(config.manifest_dir(), PathBuf::from("/opt/pl/pims_config"));
        assert_eq!(config.package_root(), PathBuf::from("/opt/pl/pims"));
    }

    #[test]
    fn bad_types_are_decode_errors() {
        let err = Config::from_hcl("start_port = \"many\"").unwrap_err();
        assert!(matches!(err, PimError::Decode(_)));
    }

    #[test]
    fn join_strips_leading_separator() {
        assert_eq!(join_relative(Path::new("/r"), "/py"), PathBuf::from("/r/py"));
        assert_eq!(join_relative(Path::new("/r"), "py/lib"), PathBuf::from("/r/py/lib"));
        assert_eq!(join_relative(Path::new("/r"), "/"), PathBuf::from("/r"));
    }

    #[test]
    fn containment() {
        assert!(is_contained("/py"));
        assert!(is_contained("node/modules"));
        assert!(!is_contained("/"));
        assert!(!is_contained(""));
        assert!(!is_contained("/../victim"));
        assert!(!is_contained("/py/../.."));
        assert!(!is_contained("/./py"));
    }
}
