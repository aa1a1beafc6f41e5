use anyhow::{Context, Result};
use rand::RngCore;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::clis::CliSpec;
use crate::oauth::{self, OAuthToken};
use crate::providers::{CliType, Provider};
use crate::store;

// ── Profile config directory ──────────────────────────────────────────────────

/// Write the per-profile config directory: `settings.json` with the env vars
/// the target CLI reads, plus a `.claude.json` that skips onboarding when an
/// external provider backs the claude CLI.
///
/// `native_auth` means the CLI runs its own login flow; no credentials are
/// written in that case.
pub fn write_profile_config(
    command_name: &str,
    provider: &Provider,
    api_key: Option<&str>,
    oauth_token: Option<&OAuthToken>,
    cli_type: CliType,
    native_auth: bool,
) -> Result<()> {
    let dir = store::profile_dir(command_name);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Cannot create profile directory {}", dir.display()))?;

    let mut env: BTreeMap<String, String> = BTreeMap::new();

    if !native_auth {
        if let Some(token) = oauth_token {
            env.extend(oauth::token_env(token, cli_type));
        } else if let Some(key) = api_key {
            let auth_var = match cli_type {
                CliType::Claude => "ANTHROPIC_AUTH_TOKEN",
                CliType::Codex => "OPENAI_API_KEY",
            };
            env.insert(auth_var.to_string(), key.to_string());
        }

        let (base_url_var, model_var, fast_model_var) = match cli_type {
            CliType::Claude => (
                "ANTHROPIC_BASE_URL",
                "ANTHROPIC_MODEL",
                "ANTHROPIC_SMALL_FAST_MODEL",
            ),
            CliType::Codex => ("OPENAI_BASE_URL", "OPENAI_MODEL", "OPENAI_SMALL_FAST_MODEL"),
        };

        if !provider.base_url.is_empty() {
            env.insert(base_url_var.to_string(), provider.base_url.clone());
        }
        if !provider.default_model.is_empty() {
            env.insert(model_var.to_string(), provider.default_model.clone());
        }
        if let Some(fast) = &provider.small_fast_model {
            env.insert(fast_model_var.to_string(), fast.clone());
        }

        // MiniMax responses can exceed the CLI's default timeout
        if provider.name == "minimax" {
            env.insert("API_TIMEOUT_MS".to_string(), "3000000".to_string());
        }
    }

    let settings = json!({ "env": env });
    store::write_atomic(
        &dir.join("settings.json"),
        &serde_json::to_string_pretty(&settings)?,
    )?;

    // External providers must not trigger the claude CLI's own login
    if cli_type == CliType::Claude && !native_auth {
        let claude_config = json!({
            "hasCompletedOnboarding": true,
            "loginMethod": "api_key",
            "apiKey": "sk-ant-external-provider",
            "userID": generate_user_id(),
            "firstStartTime": store::now_utc(),
        });
        store::write_atomic(
            &dir.join(".claude.json"),
            &serde_json::to_string_pretty(&claude_config)?,
        )?;
    }

    Ok(())
}

fn generate_user_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ── Wrapper script ────────────────────────────────────────────────────────────

pub fn wrapper_script_body(command_name: &str, cli: &CliSpec) -> String {
    let profile_dir = store::profile_dir(command_name);
    let usage_file = store::usage_file();

    format!(
        r#"#!/bin/bash
# sweech wrapper for {command_name} ({display_name})

# Log usage in the background so startup is not slowed down
(
  USAGE_FILE="{usage_file}"
  TIMESTAMP=$(date -u +"%Y-%m-%dT%H:%M:%S.000Z")

  if [ -f "$USAGE_FILE" ]; then
    CONTENT=$(cat "$USAGE_FILE")
  else
    CONTENT="[]"
  fi

  RECORD="{{\"commandName\":\"{command_name}\",\"timestamp\":\"$TIMESTAMP\"}}"
  if [ "$CONTENT" = "[]" ]; then
    UPDATED="[$RECORD]"
  else
    UPDATED=$(echo "$CONTENT" | sed "s/\]$/,$RECORD]/")
  fi
  echo "$UPDATED" > "$USAGE_FILE"
) &

# Transform arguments: --yolo -> --dangerously-skip-permissions (Claude Code only)
ARGS=()
for arg in "$@"; do
  if [ "$arg" = "--yolo" ] && [ "{cli_command}" = "claude" ]; then
    ARGS+=("--dangerously-skip-permissions")
  else
    ARGS+=("$arg")
  fi
done

export {env_var}="{profile_dir}"
exec {cli_command} "${{ARGS[@]}}"
"#,
        display_name = cli.display_name,
        usage_file = usage_file.display(),
        cli_command = cli.command,
        env_var = cli.config_dir_env_var,
        profile_dir = profile_dir.display(),
    )
}

/// Write the executable wrapper script for a profile (mode 0755).
pub fn write_wrapper_script(command_name: &str, cli: &CliSpec) -> Result<()> {
    fs::create_dir_all(store::bin_dir())?;
    let path = store::wrapper_path(command_name);
    fs::write(&path, wrapper_script_body(command_name, cli))
        .with_context(|| format!("Cannot write wrapper script to {}", path.display()))?;

    #[cfg(unix)]
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clis;

    #[test]
    fn wrapper_script_exports_config_dir_and_execs_cli() {
        let body = wrapper_script_body("cmini", clis::get(CliType::Claude));
        assert!(body.starts_with("#!/bin/bash"));
        assert!(body.contains("export CLAUDE_CONFIG_DIR="));
        assert!(body.contains("profiles/cmini"));
        assert!(body.contains("exec claude"));
        assert!(body.contains("--dangerously-skip-permissions"));
    }

    #[test]
    fn codex_wrapper_uses_codex_home() {
        let body = wrapper_script_body("dx", clis::get(CliType::Codex));
        assert!(body.contains("export CODEX_HOME="));
        assert!(body.contains("exec codex"));
    }

    #[test]
    fn user_id_is_64_hex_chars() {
        let id = generate_user_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
