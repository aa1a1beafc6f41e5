use anyhow::Result;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::commands::provider_for;
use crate::{backup, prompt, shell, store};

/// Config directories owned by the CLIs themselves; a reset or removal must
/// never delete these.
fn default_cli_directories() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    vec![
        home.join(".claude"),
        home.join(".codex"),
        home.join(".config").join("claude"),
    ]
}

pub fn is_default_cli_directory(path: &Path) -> bool {
    let normalized = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    default_cli_directories()
        .iter()
        .any(|d| d.canonicalize().unwrap_or_else(|_| d.clone()) == normalized)
}

pub fn cmd_reset() -> Result<()> {
    println!("\n  {}\n", "Sweech Reset (Uninstall)".red().bold());

    let profiles = store::load_profiles()?;
    let sweech_dir = store::config_dir();
    let bin_dir = store::bin_dir();

    println!("  {}", "Your setup:".bold());
    if profiles.is_empty() {
        println!("    {}\n", "No profiles configured".dimmed());
    } else {
        for profile in &profiles {
            let display = provider_for(profile)
                .map(|p| p.display_name)
                .unwrap_or_else(|| profile.provider.clone());
            let profile_dir = store::profile_dir(&profile.command_name);
            if is_default_cli_directory(&profile_dir) {
                println!(
                    "    {}",
                    format!(
                        "• {} ({display}) [DEFAULT - will be preserved]",
                        profile.command_name
                    )
                    .dimmed()
                );
            } else {
                println!("    {} {} ({display})", "•".cyan(), profile.command_name);
            }
        }
        println!();
    }

    println!("  {}", "This will NOT affect:".bold());
    let existing_defaults: Vec<PathBuf> = default_cli_directories()
        .into_iter()
        .filter(|d| d.exists())
        .collect();
    if existing_defaults.is_empty() {
        println!(
            "    {} All default CLI configurations (~/.claude/, ~/.codex/, etc.)",
            "✓".green()
        );
    } else {
        for dir in &existing_defaults {
            println!("    {} {} (default CLI setup)", "✓".green(), dir.display());
        }
    }
    println!("    {} Installed CLIs (claude, codex, etc.)\n", "✓".green());

    println!("  {}", "This will remove:".bold());
    println!("    {} {}/ (sweech configuration)", "✗".red(), sweech_dir.display());
    println!("    {} {}/ (wrapper scripts)", "✗".red(), bin_dir.display());
    println!("    {} All sweech-managed profiles", "✗".red());
    println!("    {} Usage statistics", "✗".red());
    println!("    {} Aliases\n", "✗".red());

    if prompt::confirm("Would you like to create a backup first?", true)? {
        println!();
        if let Err(err) = backup::cmd_backup(None) {
            eprintln!("  {} Backup failed: {err}", "✗".red());
            if !prompt::confirm("Backup failed. Continue with reset anyway?", false)? {
                println!("\n  {}\n", "Reset cancelled".yellow());
                return Ok(());
            }
        }
    }

    let confirmation = prompt::input("Type \"reset\" to confirm complete uninstall:")?;
    if confirmation.to_lowercase() != "reset" {
        println!("\n  {}\n", "Reset cancelled".yellow());
        return Ok(());
    }

    println!("\n  {} Removing sweech...\n", "·".cyan());

    if sweech_dir.exists() && !is_default_cli_directory(&sweech_dir) {
        fs::remove_dir_all(&sweech_dir)?;
        println!("  {} Removed {}", "✓".green(), sweech_dir.display());
    }

    println!("\n  {}", "Note: You may want to remove sweech from your PATH".yellow());
    println!(
        "  {}",
        "Remove this line from your shell RC file (~/.zshrc or ~/.bashrc):".dimmed()
    );
    println!("    {}\n", shell::PATH_EXPORT_LINE.dimmed());

    println!("  {} Sweech has been uninstalled\n", "✓".green().bold());
    println!("  {}", "Your default CLI configurations remain untouched.".dimmed());
    println!("  {}\n", "To reinstall: cargo install sweech".dimmed());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cli_directories_are_protected() {
        let home = dirs::home_dir().unwrap();
        assert!(is_default_cli_directory(&home.join(".claude")));
        assert!(is_default_cli_directory(&home.join(".codex")));
        assert!(is_default_cli_directory(&home.join(".config").join("claude")));
    }

    #[test]
    fn sweech_profile_directories_are_not_protected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_default_cli_directory(&dir.path().join("profiles/cmini")));
    }
}
