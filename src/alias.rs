//! Shell alias registration for installed packages
//!
//! Each installed package gets a shell command of its own that forwards to
//! `packageless run <identifier>`.

use crate::config::home_dir;
use crate::error::{PimError, PimResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub trait AliasManager {
    /// Make `command` run the package `identifier`
    fn register(&self, command: &str, identifier: &str) -> PimResult<()>;

    /// Undo [`AliasManager::register`]; a missing alias is not an error
    fn deregister(&self, command: &str, identifier: &str) -> PimResult<()>;
}

/// Used when alias management is switched off
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAliases;

impl AliasManager for DisabledAliases {
    fn register(&self, _command: &str, _identifier: &str) -> PimResult<()> {
        Ok(())
    }

    fn deregister(&self, _command: &str, _identifier: &str) -> PimResult<()> {
        Ok(())
    }
}

/// Startup file the alias lines are written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasTarget {
    /// bash or zsh rc file, `alias name="..."` lines
    Posix(PathBuf),
    /// PowerShell profile, one function per package
    PowerShell(PathBuf),
    /// Shell we do not know how to edit
    Unsupported(String),
}

/// Edits a shell startup file, one line per package
#[derive(Debug, Clone)]
pub struct ShellAliasManager {
    target: AliasTarget,
    executable: PathBuf,
}

impl ShellAliasManager {
    pub fn new(target: AliasTarget, executable: impl Into<PathBuf>) -> Self {
        ShellAliasManager {
            target,
            executable: executable.into(),
        }
    }

    /// Pick the startup file for the current platform and `$SHELL`
    pub fn detect(executable: impl Into<PathBuf>) -> Self {
        Self::new(detect_target(), executable)
    }

    fn line(&self, command: &str, identifier: &str) -> PimResult<(PathBuf, String)> {
        let exe = self.executable.display();
        match &self.target {
            AliasTarget::Posix(path) => Ok((
                path.clone(),
                format!("alias {}=\"{} run {}\"", command, exe, identifier),
            )),
            AliasTarget::PowerShell(path) => Ok((
                path.clone(),
                format!("function {} {{ & \"{}\" run {} @args }}", command, exe, identifier),
            )),
            AliasTarget::Unsupported(shell) => Err(PimError::Config(format!(
                "Shell: {} is currently unsupported for aliases",
                shell
            ))),
        }
    }
}

impl AliasManager for ShellAliasManager {
    fn register(&self, command: &str, identifier: &str) -> PimResult<()> {
        let (path, line) = self.line(command, identifier)?;
        let mut content = read_or_empty(&path)?;

        if content.lines().any(|l| l == line) {
            tracing::debug!(command, path = %path.display(), "alias already present");
            return Ok(());
        }

        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&line);
        content.push('\n');

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PimError::filesystem(parent, e))?;
        }
        fs::write(&path, content).map_err(|e| PimError::filesystem(&path, e))?;
        tracing::info!(command, path = %path.display(), "registered alias");
        Ok(())
    }

    fn deregister(&self, command: &str, identifier: &str) -> PimResult<()> {
        let (path, line) = self.line(command, identifier)?;
        let content = read_or_empty(&path)?;
        if !content.lines().any(|l| l == line) {
            return Ok(());
        }

        let mut kept = String::with_capacity(content.len());
        for existing in content.lines().filter(|l| *l != line) {
            kept.push_str(existing);
            kept.push('\n');
        }

        fs::write(&path, kept).map_err(|e| PimError::filesystem(&path, e))?;
        tracing::info!(command, path = %path.display(), "removed alias");
        Ok(())
    }
}

fn read_or_empty(path: &Path) -> PimResult<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(PimError::filesystem(path, e)),
    }
}

fn detect_target() -> AliasTarget {
    let Some(home) = home_dir() else {
        return AliasTarget::Unsupported("no home directory".to_string());
    };

    if cfg!(windows) {
        return AliasTarget::PowerShell(
            home.join("Documents")
                .join("WindowsPowerShell")
                .join("Microsoft.PowerShell_profile.ps1"),
        );
    }

    let shell = std::env::var("SHELL").unwrap_or_default();
    target_for_shell(&shell, &home)
}

/// Startup file for the shell at `shell` (a path or bare name)
pub fn target_for_shell(shell: &str, home: &Path) -> AliasTarget {
    let name = Path::new(shell)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(shell)
        .trim_start_matches('-');

    match name {
        "bash" => AliasTarget::Posix(home.join(".bashrc")),
        "zsh" => AliasTarget::Posix(home.join(".zshrc")),
        "pwsh" | "powershell" => AliasTarget::PowerShell(
            home.join(".config").join("powershell").join("Microsoft.PowerShell_profile.ps1"),
        ),
        other => AliasTarget::Unsupported(other.to_string()),
    }
}
