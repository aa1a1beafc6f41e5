use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{fs, io::Write, path::Path, path::PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::oauth::OAuthToken;
use crate::providers::{ApiFormat, CliType};

// ── Profile record ────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub command_name: String,
    #[serde(default)]
    pub cli_type: CliType,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth: Option<OAuthToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_fast_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_provider: Option<CustomProvider>,
    pub created_at: String,
}

/// User-supplied details for a custom/local provider, kept on the profile so
/// wrappers can be regenerated without re-prompting.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CustomProvider {
    pub base_url: String,
    pub api_format: ApiFormat,
    pub default_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub small_fast_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

pub fn now_utc() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .expect("Cannot find home directory")
        .join(".sweech")
}

pub fn config_file() -> PathBuf {
    config_dir().join("config.json")
}

pub fn profiles_dir() -> PathBuf {
    config_dir().join("profiles")
}

pub fn bin_dir() -> PathBuf {
    config_dir().join("bin")
}

pub fn profile_dir(command_name: &str) -> PathBuf {
    profiles_dir().join(command_name)
}

pub fn wrapper_path(command_name: &str) -> PathBuf {
    bin_dir().join(command_name)
}

pub fn usage_file() -> PathBuf {
    config_dir().join("usage.json")
}

pub fn aliases_file() -> PathBuf {
    config_dir().join("aliases.json")
}

pub fn setup_dirs() -> Result<()> {
    fs::create_dir_all(profiles_dir())?;
    fs::create_dir_all(bin_dir())?;

    #[cfg(unix)]
    fs::set_permissions(config_dir(), fs::Permissions::from_mode(0o700))?;

    Ok(())
}

// ── Profile array CRUD ────────────────────────────────────────────────────────

pub fn load_profiles_from(path: &Path) -> Result<Vec<Profile>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))
}

pub fn load_profiles() -> Result<Vec<Profile>> {
    load_profiles_from(&config_file())
}

fn save_profiles_to(path: &Path, profiles: &[Profile]) -> Result<()> {
    write_atomic(path, &serde_json::to_string_pretty(profiles)?)
}

pub fn save_profiles(profiles: &[Profile]) -> Result<()> {
    setup_dirs()?;
    save_profiles_to(&config_file(), profiles)
}

pub fn find_profile<'a>(profiles: &'a [Profile], command_name: &str) -> Option<&'a Profile> {
    profiles.iter().find(|p| p.command_name == command_name)
}

pub fn add_profile_at(path: &Path, profile: Profile) -> Result<()> {
    let mut profiles = load_profiles_from(path)?;
    if find_profile(&profiles, &profile.command_name).is_some() {
        bail!("Command name '{}' already exists", profile.command_name);
    }
    profiles.push(profile);
    save_profiles_to(path, &profiles)
}

pub fn add_profile(profile: Profile) -> Result<()> {
    setup_dirs()?;
    add_profile_at(&config_file(), profile)
}

/// Removing a name that is not present is a no-op.
pub fn remove_profile_at(path: &Path, command_name: &str) -> Result<()> {
    let mut profiles = load_profiles_from(path)?;
    profiles.retain(|p| p.command_name != command_name);
    save_profiles_to(path, &profiles)
}

/// Drop a profile from the store and delete its wrapper script and config
/// directory.
pub fn remove_profile(command_name: &str) -> Result<()> {
    setup_dirs()?;
    remove_profile_at(&config_file(), command_name)?;

    let wrapper = wrapper_path(command_name);
    if wrapper.exists() {
        fs::remove_file(&wrapper)
            .with_context(|| format!("Cannot remove {}", wrapper.display()))?;
    }

    let dir = profile_dir(command_name);
    if dir.exists() {
        fs::remove_dir_all(&dir)
            .with_context(|| format!("Cannot remove {}", dir.display()))?;
    }

    Ok(())
}

pub fn update_profile(updated: Profile) -> Result<()> {
    let mut profiles = load_profiles()?;
    let slot = profiles
        .iter_mut()
        .find(|p| p.command_name == updated.command_name)
        .with_context(|| format!("Profile '{}' not found", updated.command_name))?;
    *slot = updated;
    save_profiles(&profiles)
}

// ── Atomic write ──────────────────────────────────────────────────────────────

/// Atomically write a JSON file: validate → temp file → rename → chmod 600.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    // Validate JSON before touching the real file
    let _: serde_json::Value =
        serde_json::from_str(content).context("Refusing to write invalid JSON")?;

    let temp_path = path.with_extension(format!("tmp.{}", std::process::id()));

    {
        let mut f = fs::File::create(&temp_path)
            .with_context(|| format!("Cannot create temp file {}", temp_path.display()))?;
        f.write_all(content.as_bytes())?;
        f.flush()?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e).with_context(|| format!("Cannot finalize file at {}", path.display()));
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(command_name: &str) -> Profile {
        Profile {
            name: command_name.to_string(),
            command_name: command_name.to_string(),
            cli_type: CliType::Claude,
            provider: "minimax".to_string(),
            api_key: Some("sk-test".to_string()),
            oauth: None,
            base_url: Some("https://api.minimax.io/anthropic".to_string()),
            model: Some("MiniMax-M2".to_string()),
            small_fast_model: None,
            custom_provider: None,
            created_at: now_utc(),
        }
    }

    #[test]
    fn profile_json_round_trips_with_camel_case_keys() {
        let json = serde_json::to_string(&sample("cmini")).unwrap();
        assert!(json.contains("\"commandName\":\"cmini\""));
        assert!(json.contains("\"cliType\":\"claude\""));
        assert!(json.contains("\"createdAt\""));
        assert!(!json.contains("\"oauth\""));

        let back: Profile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.command_name, "cmini");
        assert_eq!(back.provider, "minimax");
    }

    #[test]
    fn missing_cli_type_defaults_to_claude() {
        let json = r#"{
            "name": "old",
            "commandName": "old",
            "provider": "qwen",
            "apiKey": "k",
            "createdAt": "2024-01-01T00:00:00Z"
        }"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.cli_type, CliType::Claude);
    }

    #[test]
    fn find_profile_matches_command_name_only() {
        let profiles = vec![sample("a"), sample("b")];
        assert!(find_profile(&profiles, "a").is_some());
        assert!(find_profile(&profiles, "c").is_none());
    }

    #[test]
    fn write_atomic_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert!(write_atomic(&path, "not json").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_atomic(&path, "[1]").unwrap();
        write_atomic(&path, "[1,2]").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[1,2]");
    }

    #[test]
    fn write_atomic_cleans_up_temp_file_when_rename_fails() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the target path makes the rename fail
        let path = dir.path().join("config.json");
        fs::create_dir(&path).unwrap();

        assert!(write_atomic(&path, "[1]").is_err());

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn add_rejects_duplicate_command_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        add_profile_at(&path, sample("cmini")).unwrap();
        let err = add_profile_at(&path, sample("cmini")).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        let profiles = load_profiles_from(&path).unwrap();
        assert_eq!(profiles.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        add_profile_at(&path, sample("cmini")).unwrap();
        remove_profile_at(&path, "cmini").unwrap();
        assert!(load_profiles_from(&path).unwrap().is_empty());

        // Removing again is a no-op, not an error
        remove_profile_at(&path, "cmini").unwrap();
        assert!(load_profiles_from(&path).unwrap().is_empty());
    }
}
