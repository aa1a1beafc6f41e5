use std::process::Command;

use crate::providers::CliType;

// ── Supported CLI registry ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CliSpec {
    pub cli_type: CliType,
    pub display_name: &'static str,
    pub command: &'static str,
    pub config_dir_env_var: &'static str,
    pub description: &'static str,
    pub install_url: &'static str,
}

pub const SUPPORTED_CLIS: &[CliSpec] = &[
    CliSpec {
        cli_type: CliType::Claude,
        display_name: "Claude Code",
        command: "claude",
        config_dir_env_var: "CLAUDE_CONFIG_DIR",
        description: "Anthropic Claude Code CLI",
        install_url: "https://code.claude.com/",
    },
    CliSpec {
        cli_type: CliType::Codex,
        display_name: "Codex (OpenAI)",
        command: "codex",
        config_dir_env_var: "CODEX_HOME",
        description: "OpenAI Codex CLI - lightweight coding agent",
        install_url: "https://github.com/openai/codex",
    },
];

pub fn get(cli_type: CliType) -> &'static CliSpec {
    SUPPORTED_CLIS
        .iter()
        .find(|c| c.cli_type == cli_type)
        .expect("registry covers all CLI types")
}

// ── Installed-CLI detection ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Detection {
    pub cli: &'static CliSpec,
    pub installed: bool,
    pub version: Option<String>,
}

pub fn is_installed(command: &str) -> bool {
    Command::new("which")
        .arg(command)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub fn version_of(command: &str) -> Option<String> {
    let output = Command::new(command).arg("--version").output().ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
        return Some(stdout);
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    (!stderr.is_empty()).then_some(stderr)
}

pub fn detect_installed() -> Vec<Detection> {
    SUPPORTED_CLIS
        .iter()
        .map(|cli| {
            let installed = is_installed(cli.command);
            Detection {
                cli,
                installed,
                version: installed.then(|| version_of(cli.command)).flatten(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_maps_env_vars_per_cli() {
        assert_eq!(get(CliType::Claude).config_dir_env_var, "CLAUDE_CONFIG_DIR");
        assert_eq!(get(CliType::Codex).config_dir_env_var, "CODEX_HOME");
    }

    #[test]
    fn nonexistent_command_is_not_installed() {
        assert!(!is_installed("sweech-definitely-not-a-real-binary"));
    }
}
