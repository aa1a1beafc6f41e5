use anyhow::{bail, Result};
use colored::Colorize;
use std::fs;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::commands::provider_for;
use crate::store::{self, Profile};
use crate::{aliases, clis, prompt, shell, wrapper};

// ── doctor ────────────────────────────────────────────────────────────────────

pub fn cmd_doctor() -> Result<()> {
    println!("\n  {}\n", "Sweech Health Check".bold());

    let profiles = store::load_profiles()?;
    let bin_dir = store::bin_dir();

    println!("  {}", "Environment:".bold());
    println!("    {} sweech: v{}", "✓".green(), env!("CARGO_PKG_VERSION"));

    println!("\n  {}", "PATH Configuration:".bold());
    let in_path = shell::is_in_path();
    if in_path {
        println!("    {} {} is in PATH", "✓".green(), bin_dir.display());
        println!(
            "      {}",
            format!("Location: {}", shell::rc_file(shell::detect()).display()).dimmed()
        );
    } else {
        println!("    {} {} is NOT in PATH", "✗".red(), bin_dir.display());
        let rc = shell::rc_file(shell::detect());
        if shell::rc_contains_path_line(&rc) {
            println!(
                "      {}",
                format!("{} has the export line; restart your terminal", rc.display()).dimmed()
            );
        } else {
            println!("      {} {}", "Run:".yellow(), "sweech path".bold());
        }
    }

    println!("\n  {}", "Installed CLIs:".bold());
    for detection in clis::detect_installed() {
        if detection.installed {
            let version = detection
                .version
                .map(|v| format!(" ({v})"))
                .unwrap_or_default();
            println!("    {} {}{version}", "✓".green(), detection.cli.display_name);
        } else {
            println!(
                "    {} {}: Not installed",
                "✗".dimmed(),
                detection.cli.display_name
            );
            println!("      {}", format!("Install: {}", detection.cli.install_url).dimmed());
        }
    }

    println!("\n  {}", format!("Profiles ({}):", profiles.len()).bold());
    let mut broken_wrappers = false;
    if profiles.is_empty() {
        println!("    {}", "No profiles configured yet".dimmed());
        println!("    {} {} {}", "Run:".dimmed(), "sweech add".bold(), "to add a provider".dimmed());
    } else {
        for profile in &profiles {
            broken_wrappers |= !report_profile_health(profile);
        }
    }

    println!();
    if !in_path || broken_wrappers {
        println!("  {}\n", "Some issues detected. See above for details.".yellow());
    } else {
        println!("  {}\n", "Everything looks good!".green());
    }

    Ok(())
}

/// Print one profile's health line; returns false when something is broken.
fn report_profile_health(profile: &Profile) -> bool {
    let display = provider_for(profile)
        .map(|p| p.display_name)
        .unwrap_or_else(|| profile.provider.clone());
    let wrapper_path = store::wrapper_path(&profile.command_name);
    let settings_path = store::profile_dir(&profile.command_name).join("settings.json");

    let wrapper_exists = wrapper_path.exists();
    let wrapper_executable = wrapper_exists && is_executable(&wrapper_path);
    let config_exists = settings_path.exists();

    if wrapper_executable && config_exists {
        println!("    {} {} → {display}", "✓".green(), profile.command_name);
        return true;
    }

    println!("    {} {} → {display}", "⚠".yellow(), profile.command_name);
    if !wrapper_exists {
        println!("      {}", "Missing wrapper script".dimmed());
    } else if !wrapper_executable {
        println!("      {}", "Wrapper not executable".dimmed());
    }
    if !config_exists {
        println!("      {}", "Missing config file".dimmed());
    }
    false
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &std::path::Path) -> bool {
    true
}

// ── path ──────────────────────────────────────────────────────────────────────

pub fn cmd_path() -> Result<()> {
    println!("\n  {}\n", "PATH Configuration".bold());

    let bin_dir = store::bin_dir();
    let detected = shell::detect();

    if shell::is_in_path() {
        println!("  {} {}", "Status:".bold(), "✓ Configured".green());
        println!("    {}", format!("{} is in your PATH", bin_dir.display()).dimmed());
        println!("    {}\n", format!("Shell: {detected}").dimmed());
        return Ok(());
    }

    println!("  {} {}", "Status:".bold(), "✗ Not configured".yellow());
    println!("    {}\n", format!("{} is not in your PATH", bin_dir.display()).dimmed());

    println!("  {}\n", "To use your commands, add this to your shell:".bold());
    let rc = shell::rc_file(detected);
    match detected {
        shell::Shell::Fish => {
            println!("    {}", "# For fish".cyan());
            println!("    set -Ua fish_user_paths $HOME/.sweech/bin");
            println!("    # Or add to {}\n", rc.display());
        }
        _ => {
            println!("    {}", format!("# For {detected}").cyan());
            println!("    echo '{}' >> {}", shell::PATH_EXPORT_LINE, rc.display());
            println!("    source {}\n", rc.display());
        }
    }

    if prompt::confirm("Would you like sweech to add this automatically?", false)? {
        match shell::add_to_rc_file(detected)? {
            Some(rc) => {
                println!("\n  {} Added to {}", "✓".green(), rc.display());
                println!(
                    "\n  {} {}\n",
                    "Restart your terminal or run:".yellow(),
                    format!("source {}", rc.display()).bold()
                );
            }
            None => {
                println!("\n  {} Already in {}\n", "✓".green(), rc.display());
            }
        }
    }

    Ok(())
}

// ── test ──────────────────────────────────────────────────────────────────────

pub fn cmd_test(command_name: &str) -> Result<()> {
    let profiles = store::load_profiles()?;
    let resolved = aliases::resolve(command_name);
    let Some(profile) = store::find_profile(&profiles, &resolved) else {
        bail!("Profile '{command_name}' not found");
    };

    let display = provider_for(profile)
        .map(|p| p.display_name)
        .unwrap_or_else(|| profile.provider.clone());
    let cli = clis::get(profile.cli_type);

    println!("\n  {}\n", format!("Testing {resolved} ({display})...").bold());

    print!("  {}", "Checking configuration...        ".dimmed());
    let profile_dir = store::profile_dir(&resolved);
    let settings_path = profile_dir.join("settings.json");
    let wrapper_path = store::wrapper_path(&resolved);
    if !settings_path.exists() {
        println!("{}", "✗".red());
        bail!("Config file not found: {}", settings_path.display());
    }
    if !wrapper_path.exists() {
        println!("{}", "✗".red());
        bail!("Wrapper script not found: {}", wrapper_path.display());
    }
    println!("{}", "✓".green());

    print!("  {}", "Checking CLI installation...     ".dimmed());
    if !clis::is_installed(cli.command) {
        println!("{}", "✗".red());
        bail!("{} is not installed or not in PATH", cli.display_name);
    }
    println!("{}", "✓".green());

    // A live API request would need the CLI's own authentication flow
    println!(
        "  {}{}",
        "Testing API connection...        ".dimmed(),
        "⊘ Skipped".yellow()
    );

    println!("\n  {}\n", "Configuration is valid!".green());
    println!("  {}", "Configuration:".dimmed());
    println!("    {} {display}", "Provider:".dimmed());
    println!("    {} {}", "Model:".dimmed(), profile.model.as_deref().unwrap_or("default"));
    println!("    {} {}", "Config:".dimmed(), profile_dir.display());
    println!("    {} {}\n", "Wrapper:".dimmed(), wrapper_path.display());
    println!("  {} {}\n", "To use:".cyan(), resolved.bold());
    Ok(())
}

// ── edit ──────────────────────────────────────────────────────────────────────

pub fn cmd_edit(command_name: &str) -> Result<()> {
    let profiles = store::load_profiles()?;
    let resolved = aliases::resolve(command_name);
    let Some(profile) = store::find_profile(&profiles, &resolved) else {
        bail!("Profile '{command_name}' not found");
    };
    let mut profile = profile.clone();

    let display = provider_for(&profile)
        .map(|p| p.display_name)
        .unwrap_or_else(|| profile.provider.clone());

    println!("\n  {}\n", format!("Edit {resolved}").bold());
    println!("  {}", "Current configuration:".dimmed());
    println!("    {} {display}", "Provider:".dimmed());
    println!("    {} {}", "Model:".dimmed(), profile.model.as_deref().unwrap_or("default"));
    let auth = match (&profile.api_key, &profile.oauth) {
        (Some(key), _) => format!("API Key: {}", masked_key(key)),
        (None, Some(token)) => format!("OAuth ({})", token.provider),
        (None, None) => "None (CLI native)".to_string(),
    };
    println!("    {} {auth}\n", "Auth:".dimmed());

    let field = prompt::select(
        "What would you like to edit?",
        &["API Key", "Model", "Base URL", "Cancel"],
    )?;

    match field {
        0 => {
            let key = prompt::password("Enter new API key:")?;
            if key.is_empty() {
                bail!("API key required");
            }
            profile.api_key = Some(key);
            profile.oauth = None;
        }
        1 => {
            let model = prompt::input_with_default(
                "Enter new model name:",
                profile.model.as_deref().unwrap_or(""),
            )?;
            if model.is_empty() {
                bail!("Model name required");
            }
            profile.model = Some(model);
        }
        2 => {
            let base_url = prompt::input_with_default(
                "Enter new base URL:",
                profile.base_url.as_deref().unwrap_or(""),
            )?;
            if base_url.is_empty() {
                bail!("Base URL required");
            }
            profile.base_url = Some(base_url);
        }
        _ => {
            println!("\n  {}\n", "Cancelled".yellow());
            return Ok(());
        }
    }

    store::update_profile(profile.clone())?;
    regenerate_profile_files(&profile)?;

    let field_name = ["API key", "model", "base URL"][field];
    println!("\n  {} Updated {field_name} for {resolved}\n", "✓".green().bold());
    Ok(())
}

/// Show at most the first ten characters of a stored key.
fn masked_key(key: &str) -> String {
    format!("{}***", key.chars().take(10).collect::<String>())
}

/// Rewrite settings.json from the profile's current fields, honoring edits
/// that diverge from the provider registry defaults.
fn regenerate_profile_files(profile: &Profile) -> Result<()> {
    let Some(mut provider) = provider_for(profile) else {
        return Ok(());
    };
    if let Some(base_url) = &profile.base_url {
        provider.base_url = base_url.clone();
    }
    if let Some(model) = &profile.model {
        provider.default_model = model.clone();
    }
    provider.small_fast_model = profile.small_fast_model.clone();

    wrapper::write_profile_config(
        &profile.command_name,
        &provider,
        profile.api_key.as_deref(),
        profile.oauth.as_ref(),
        profile.cli_type,
        false,
    )
}

// ── clone ─────────────────────────────────────────────────────────────────────

pub fn cmd_clone(source_name: &str, target_name: &str) -> Result<()> {
    let profiles = store::load_profiles()?;
    let Some(source) = store::find_profile(&profiles, source_name) else {
        bail!("Profile '{source_name}' not found");
    };
    if store::find_profile(&profiles, target_name).is_some() {
        bail!("Profile '{target_name}' already exists");
    }

    println!("\n  {}\n", format!("Cloning {source_name} → {target_name}...").bold());

    let api_key = if source.api_key.is_some() && prompt::confirm("Use same API key?", true)? {
        source.api_key.clone()
    } else {
        let key = prompt::password("Enter API key for new profile:")?;
        if key.is_empty() {
            bail!("API key required");
        }
        Some(key)
    };

    let cloned = Profile {
        name: target_name.to_string(),
        command_name: target_name.to_string(),
        api_key: api_key.clone(),
        created_at: store::now_utc(),
        ..source.clone()
    };

    store::add_profile(cloned.clone())?;
    regenerate_profile_files(&cloned)?;
    wrapper::write_wrapper_script(target_name, clis::get(cloned.cli_type))?;

    let display = provider_for(&cloned)
        .map(|p| p.display_name)
        .unwrap_or_else(|| cloned.provider.clone());
    println!("\n  {} Created {target_name} ({display})\n", "✓".green().bold());
    Ok(())
}

// ── rename ────────────────────────────────────────────────────────────────────

pub fn cmd_rename(old_name: &str, new_name: &str) -> Result<()> {
    let mut profiles = store::load_profiles()?;
    if store::find_profile(&profiles, new_name).is_some() {
        bail!("Profile '{new_name}' already exists");
    }
    let Some(profile) = profiles.iter_mut().find(|p| p.command_name == old_name) else {
        bail!("Profile '{old_name}' not found");
    };

    println!("\n  {}\n", format!("Renaming {old_name} → {new_name}...").bold());

    profile.name = new_name.to_string();
    profile.command_name = new_name.to_string();
    let cli_type = profile.cli_type;
    store::save_profiles(&profiles)?;

    let old_dir = store::profile_dir(old_name);
    let new_dir = store::profile_dir(new_name);
    if old_dir.exists() {
        fs::rename(&old_dir, &new_dir)?;
    }

    let old_wrapper = store::wrapper_path(old_name);
    if old_wrapper.exists() {
        fs::remove_file(&old_wrapper)?;
    }
    wrapper::write_wrapper_script(new_name, clis::get(cli_type))?;

    println!("  {} Renamed {old_name} → {new_name}\n", "✓".green().bold());
    println!("    {} {new_name}", "Command:".dimmed());
    println!("    {} {}\n", "Config:".dimmed(), new_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_key_truncates_long_keys() {
        assert_eq!(masked_key("sk-abcdefghijklmnop"), "sk-abcdefg***");
        assert_eq!(masked_key("short"), "short***");
    }

    #[test]
    fn masked_key_handles_multibyte_characters() {
        // char-based truncation must not split a UTF-8 sequence
        assert_eq!(masked_key("ключ-секрет"), "ключ-секре***");
        assert_eq!(masked_key("鍵"), "鍵***");
    }
}
