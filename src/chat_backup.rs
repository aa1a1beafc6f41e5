use anyhow::{bail, Context, Result};
use chrono::Utc;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::backup::{self, Archive};
use crate::{aliases, prompt, store};

const MIN_PASSWORD_LEN: usize = 8;

// ── Directory inspection ──────────────────────────────────────────────────────

pub fn dir_size(path: &Path) -> u64 {
    let Ok(meta) = fs::metadata(path) else {
        return 0;
    };
    if meta.is_file() {
        return meta.len();
    }
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| dir_size(&entry.path()))
        .sum()
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let exp = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    format!("{:.2} {}", bytes as f64 / 1024f64.powi(exp as i32), UNITS[exp])
}

/// Whether a config directory holds conversation transcripts: well-known
/// subdirectory names, or any `.jsonl` file.
pub fn has_chat_data(config_dir: &Path) -> bool {
    const CHAT_DIRS: [&str; 4] = ["projects", "conversations", "history", "transcripts"];

    let Ok(entries) = fs::read_dir(config_dir) else {
        return false;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_dir() {
            if CHAT_DIRS.contains(&name.as_str()) || has_chat_data(&path) {
                return true;
            }
        } else if name.ends_with(".jsonl") {
            return true;
        }
    }
    false
}

// ── Backup ────────────────────────────────────────────────────────────────────

fn default_chat_backup_name(command_name: &str) -> String {
    format!(
        "sweech-chats-{command_name}-{}.zip",
        Utc::now().format("%Y%m%d")
    )
}

/// Encrypt a profile's config directory into a standalone backup file.
/// Returns the path written.
pub fn backup_chat_history(
    command_name: &str,
    config_dir: &Path,
    output: Option<PathBuf>,
) -> Result<PathBuf> {
    if !config_dir.exists() {
        bail!("Config directory not found: {}", config_dir.display());
    }

    let password = prompt::password_confirmed("Enter backup password:", MIN_PASSWORD_LEN)?;
    let output = output.unwrap_or_else(|| PathBuf::from(default_chat_backup_name(command_name)));

    println!("\n  {} Creating chat backup...\n", "·".cyan());
    println!("  {} {}", "Source:".dimmed(), config_dir.display());
    println!("  {} {}", "Size:".dimmed(), format_bytes(dir_size(config_dir)));
    println!("  {} {}\n", "Output:".dimmed(), output.display());

    let mut archive = Archive::new();
    archive.add_dir(config_dir, "")?;
    let zip_data = archive.finish()?;

    let encrypted = backup::encrypt(&zip_data, &password)?;
    fs::write(&output, &encrypted)
        .with_context(|| format!("Cannot write backup to {}", output.display()))?;

    println!("  {} Backup created: {}", "✓".green().bold(), output.display());
    println!("    {} {}\n", "Size:".dimmed(), format_bytes(encrypted.len() as u64));
    println!("  {}\n", "Keep this password safe! It cannot be recovered.".yellow());

    Ok(output)
}

pub fn cmd_backup_chats(command_name: &str, output: Option<PathBuf>) -> Result<()> {
    let profiles = store::load_profiles()?;
    let resolved = aliases::resolve(command_name);
    let profile = store::find_profile(&profiles, &resolved)
        .with_context(|| format!("Command '{command_name}' not found"))?;

    let config_dir = store::profile_dir(&profile.command_name);
    if !has_chat_data(&config_dir) {
        println!(
            "\n  {}\n",
            format!("No chat history found for '{}'", profile.command_name).yellow()
        );
        return Ok(());
    }

    backup_chat_history(&profile.command_name, &config_dir, output)?;
    Ok(())
}

// ── Pre-removal flow ──────────────────────────────────────────────────────────

/// Offer to back up chat history before a profile is removed.
/// Returns false when the user cancels the removal.
pub fn confirm_before_removal(command_name: &str, config_dir: &Path) -> Result<bool> {
    if !has_chat_data(config_dir) {
        return Ok(true);
    }

    println!(
        "\n  {}",
        format!(
            "This profile contains chat history ({})",
            format_bytes(dir_size(config_dir))
        )
        .yellow()
    );
    println!("  {} {}\n", "Location:".dimmed(), config_dir.display());

    let choice = prompt::select(
        "What would you like to do?",
        &[
            "Backup chats before removing",
            "Remove without backing up",
            "Cancel removal",
        ],
    )?;

    match choice {
        0 => match backup_chat_history(command_name, config_dir, None) {
            Ok(_) => {
                println!("  {} Backup complete. Proceeding with removal...\n", "✓".green());
                Ok(true)
            }
            Err(err) => {
                eprintln!("\n  {} Backup failed: {err}\n", "✗".red());
                prompt::confirm("Continue with removal anyway?", false)
            }
        },
        1 => Ok(true),
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_scales_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512.00 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn dir_size_sums_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/x.txt"), [0u8; 100]).unwrap();
        fs::write(dir.path().join("a/b/y.txt"), [0u8; 250]).unwrap();
        assert_eq!(dir_size(dir.path()), 350);
        assert_eq!(dir_size(&dir.path().join("missing")), 0);
    }

    #[test]
    fn chat_data_detected_by_directory_name() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!has_chat_data(dir.path()));

        fs::create_dir_all(dir.path().join("nested/projects")).unwrap();
        assert!(has_chat_data(dir.path()));
    }

    #[test]
    fn chat_data_detected_by_jsonl_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("settings.json"), "{}").unwrap();
        assert!(!has_chat_data(dir.path()));

        fs::write(dir.path().join("session.jsonl"), "{}").unwrap();
        assert!(has_chat_data(dir.path()));
    }
}
