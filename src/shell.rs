use anyhow::{Context, Result};
use std::{env, fs, io::Write, path::Path, path::PathBuf};

use crate::store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Zsh,
    Bash,
    Fish,
}

impl std::fmt::Display for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shell::Zsh => write!(f, "zsh"),
            Shell::Bash => write!(f, "bash"),
            Shell::Fish => write!(f, "fish"),
        }
    }
}

pub fn detect() -> Shell {
    from_shell_var(&env::var("SHELL").unwrap_or_default())
}

pub fn from_shell_var(shell: &str) -> Shell {
    if shell.contains("zsh") {
        Shell::Zsh
    } else if shell.contains("fish") {
        Shell::Fish
    } else {
        Shell::Bash
    }
}

pub fn rc_file(shell: Shell) -> PathBuf {
    let home = dirs::home_dir().expect("Cannot find home directory");
    match shell {
        Shell::Zsh => home.join(".zshrc"),
        Shell::Fish => home.join(".config").join("fish").join("config.fish"),
        Shell::Bash => {
            let bashrc = home.join(".bashrc");
            if bashrc.exists() {
                bashrc
            } else {
                home.join(".bash_profile")
            }
        }
    }
}

pub const PATH_EXPORT_LINE: &str = "export PATH=\"$HOME/.sweech/bin:$PATH\"";

/// True if the sweech bin directory is already on PATH.
pub fn is_in_path() -> bool {
    let bin = store::bin_dir();
    let resolved_bin = bin.canonicalize().unwrap_or(bin);
    env::var_os("PATH")
        .map(|path| {
            env::split_paths(&path)
                .any(|p| p.canonicalize().unwrap_or(p) == resolved_bin)
        })
        .unwrap_or(false)
}

/// Append the PATH export line to the shell RC file unless already present.
/// Returns the RC file written, or None if it was already configured.
pub fn add_to_rc_file(shell: Shell) -> Result<Option<PathBuf>> {
    let rc = rc_file(shell);
    if rc.exists() {
        let content = fs::read_to_string(&rc)
            .with_context(|| format!("Cannot read {}", rc.display()))?;
        if content.contains(".sweech/bin") {
            return Ok(None);
        }
    } else if let Some(parent) = rc.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut f = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&rc)
        .with_context(|| format!("Cannot open {}", rc.display()))?;
    writeln!(f, "\n# Added by sweech\n{PATH_EXPORT_LINE}")?;

    Ok(Some(rc))
}

pub fn rc_contains_path_line(rc: &Path) -> bool {
    fs::read_to_string(rc)
        .map(|c| c.contains(".sweech/bin"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_detection_matches_shell_var_substrings() {
        assert_eq!(from_shell_var("/bin/zsh"), Shell::Zsh);
        assert_eq!(from_shell_var("/usr/bin/fish"), Shell::Fish);
        assert_eq!(from_shell_var("/bin/bash"), Shell::Bash);
        assert_eq!(from_shell_var(""), Shell::Bash);
    }

    #[test]
    fn rc_append_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join(".bashrc");
        fs::write(&rc, format!("# existing\n{PATH_EXPORT_LINE}\n")).unwrap();
        assert!(rc_contains_path_line(&rc));
    }
}
