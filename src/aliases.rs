use anyhow::{bail, Result};
use colored::Colorize;
use std::{collections::BTreeMap, fs, path::Path};

use crate::store;

pub type AliasMap = BTreeMap<String, String>;

// ── Alias file ────────────────────────────────────────────────────────────────

pub fn load_from(path: &Path) -> AliasMap {
    let Ok(content) = fs::read_to_string(path) else {
        return AliasMap::new();
    };
    serde_json::from_str(&content).unwrap_or_default()
}

pub fn load() -> AliasMap {
    load_from(&store::aliases_file())
}

fn save_to(path: &Path, aliases: &AliasMap) -> Result<()> {
    store::write_atomic(path, &serde_json::to_string_pretty(aliases)?)
}

pub fn add_at(path: &Path, alias: &str, command: &str) -> Result<()> {
    let mut aliases = load_from(path);
    if let Some(existing) = aliases.get(alias) {
        bail!("Alias '{alias}' already exists (points to '{existing}')");
    }
    aliases.insert(alias.to_string(), command.to_string());
    save_to(path, &aliases)
}

pub fn remove_at(path: &Path, alias: &str) -> Result<()> {
    let mut aliases = load_from(path);
    if aliases.remove(alias).is_none() {
        bail!("Alias '{alias}' does not exist");
    }
    save_to(path, &aliases)
}

/// Resolve an alias to its command name, falling back to the input.
pub fn resolve(command_or_alias: &str) -> String {
    load()
        .get(command_or_alias)
        .cloned()
        .unwrap_or_else(|| command_or_alias.to_string())
}

// ── Command ───────────────────────────────────────────────────────────────────

pub fn cmd_alias(action: Option<&str>, value: Option<&str>) -> Result<()> {
    let path = store::aliases_file();

    match action {
        None | Some("list") => {
            let aliases = load_from(&path);
            if aliases.is_empty() {
                println!("\n  {}\n", "No aliases configured yet".yellow());
                println!(
                    "  Add an alias with: {}\n",
                    "sweech alias work=claude-mini".bold()
                );
                return Ok(());
            }

            println!("\n  {}\n", "Command Aliases".bold());
            for (alias, command) in &aliases {
                println!("  {} {} {}", alias.cyan(), "→".dimmed(), command);
            }
            println!();
            Ok(())
        }
        Some("remove") => {
            let alias = value.ok_or_else(|| {
                anyhow::anyhow!("Alias name required. Usage: sweech alias remove <alias>")
            })?;
            store::setup_dirs()?;
            remove_at(&path, alias)?;
            println!("\n  {} Removed alias '{}'\n", "✓".green().bold(), alias);
            Ok(())
        }
        Some(entry) if entry.contains('=') => {
            let Some((alias, command)) = entry.split_once('=') else {
                bail!("Invalid alias format. Usage: sweech alias work=claude-mini");
            };
            if alias.is_empty() || command.is_empty() {
                bail!("Invalid alias format. Usage: sweech alias work=claude-mini");
            }

            let profiles = store::load_profiles()?;
            if store::find_profile(&profiles, command).is_none() {
                bail!("Command '{command}' not found");
            }

            store::setup_dirs()?;
            add_at(&path, alias, command)?;
            println!("\n  {} Added alias: {} → {}\n", "✓".green().bold(), alias, command);
            println!("  Now you can use: {}\n", alias.bold());
            Ok(())
        }
        Some(_) => {
            bail!(
                "Invalid action. Usage:\n  \
                 sweech alias                    # List all aliases\n  \
                 sweech alias work=claude-mini   # Add alias\n  \
                 sweech alias remove work        # Remove alias"
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        assert!(load_from(&path).is_empty());

        fs::write(&path, "invalid json").unwrap();
        assert!(load_from(&path).is_empty());
    }

    #[test]
    fn add_rejects_duplicate_alias() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.json");

        add_at(&path, "work", "claude-mini").unwrap();
        let err = add_at(&path, "work", "other").unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(load_from(&path)["work"], "claude-mini");
    }

    #[test]
    fn remove_rejects_missing_alias() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        assert!(remove_at(&path, "nope").is_err());

        add_at(&path, "work", "claude-mini").unwrap();
        remove_at(&path, "work").unwrap();
        assert!(load_from(&path).is_empty());
    }
}
