use anyhow::{bail, Result};
use colored::Colorize;
use std::collections::BTreeSet;

use crate::providers::{self, Provider};
use crate::store::{self, Profile};
use crate::{aliases, chat_backup, clis, prompt, reset, usage, wrapper};

/// Resolve the provider behind a profile, materializing custom providers
/// from the details stored on the profile itself.
pub fn provider_for(profile: &Profile) -> Option<Provider> {
    match &profile.custom_provider {
        Some(custom) => Some(providers::from_custom(custom, &profile.provider)),
        None => providers::get(&profile.provider),
    }
}

fn provider_display_name(profile: &Profile) -> String {
    provider_for(profile)
        .map(|p| p.display_name)
        .unwrap_or_else(|| profile.provider.clone())
}

// ── list ──────────────────────────────────────────────────────────────────────

pub fn cmd_list() -> Result<()> {
    let profiles = store::load_profiles()?;

    if profiles.is_empty() {
        println!(
            "\n  {} {}\n",
            "No providers configured yet. Run:".yellow(),
            "sweech add".bold()
        );
        return Ok(());
    }

    println!("\n  {}\n", "Configured Providers".bold());

    for profile in &profiles {
        let cli = clis::get(profile.cli_type);
        println!("  {} {}", "▸".cyan(), profile.command_name.bold());
        println!("    {} {}", "CLI:".dimmed(), cli.display_name);
        println!("    {} {}", "Provider:".dimmed(), provider_display_name(profile));
        println!(
            "    {} {}",
            "Model:".dimmed(),
            profile.model.as_deref().unwrap_or("default")
        );
        println!("    {} {}", "Created:".dimmed(), profile.created_at);
        println!();
    }

    println!(
        "  {}\n",
        "Default Claude account is in ~/.claude/ (use \"claude\" command)".dimmed()
    );
    Ok(())
}

// ── remove ────────────────────────────────────────────────────────────────────

pub fn cmd_remove(command_name: &str) -> Result<()> {
    let profiles = store::load_profiles()?;
    let resolved = aliases::resolve(command_name);
    if store::find_profile(&profiles, &resolved).is_none() {
        bail!("Provider '{command_name}' not found");
    }

    let profile_dir = store::profile_dir(&resolved);

    // Never let a removal touch a CLI's own config directory
    if reset::is_default_cli_directory(&profile_dir) {
        eprintln!(
            "\n  {} Cannot remove default CLI directory: {}",
            "✗".red(),
            profile_dir.display()
        );
        println!(
            "  {}",
            "This is a system default and should not be managed by sweech.".yellow()
        );
        println!("  {}\n", format!("To backup: sweech backup-chats {resolved}").dimmed());
        bail!("Refusing to remove a default CLI directory");
    }

    if !chat_backup::confirm_before_removal(&resolved, &profile_dir)? {
        println!("\n  {}\n", "Cancelled".yellow());
        return Ok(());
    }

    if !prompt::confirm(&format!("Are you sure you want to remove '{resolved}'?"), false)? {
        println!("  {}", "Cancelled".yellow());
        return Ok(());
    }

    store::remove_profile(&resolved)?;
    println!("\n  {} Removed '{resolved}' successfully\n", "✓".green().bold());
    Ok(())
}

// ── show ──────────────────────────────────────────────────────────────────────

pub fn cmd_show(command_name: &str) -> Result<()> {
    let profiles = store::load_profiles()?;
    let resolved = aliases::resolve(command_name);
    let Some(profile) = store::find_profile(&profiles, &resolved) else {
        bail!("Provider '{command_name}' not found");
    };

    let cli = clis::get(profile.cli_type);

    println!("\n  {}\n", profile.command_name.bold());
    println!("  {} {}", "Provider:".cyan(), provider_display_name(profile));
    println!("  {} {}", "CLI:".cyan(), cli.display_name);
    println!("  {} {}", "Model:".cyan(), profile.model.as_deref().unwrap_or("default"));
    if let Some(fast) = &profile.small_fast_model {
        println!("  {} {fast}", "Fast model:".cyan());
    }
    println!(
        "  {} {}",
        "API endpoint:".cyan(),
        profile.base_url.as_deref().unwrap_or("default")
    );
    if let Some(provider) = provider_for(profile) {
        println!("  {} {}", "API format:".cyan(), provider.api_format);
    }
    println!(
        "  {} {}",
        "Config dir:".cyan(),
        store::profile_dir(&profile.command_name).display()
    );
    println!("  {} {}", "Created:".cyan(), profile.created_at);

    let records = usage::read_records(&store::usage_file());
    let stats = usage::compute_stats(&records, Some(&profile.command_name));
    if let Some(stat) = stats.first() {
        println!("\n  {}", "Usage:".bold());
        println!("    {} {}", "Total uses:".dimmed(), stat.total_uses);
        println!("    {} {}", "Last used:".dimmed(), stat.last_used);
    }

    let pointing: Vec<String> = aliases::load()
        .into_iter()
        .filter(|(_, cmd)| *cmd == profile.command_name)
        .map(|(alias, _)| alias)
        .collect();
    if !pointing.is_empty() {
        println!("\n  {} {}", "Aliases:".bold(), pointing.join(", "));
    }

    println!();
    Ok(())
}

// ── info ──────────────────────────────────────────────────────────────────────

pub fn cmd_info() -> Result<()> {
    let profiles = store::load_profiles()?;

    println!("\n  {}\n", "Sweech Configuration".bold());
    println!("  {} {}", "Version:".cyan(), env!("CARGO_PKG_VERSION"));
    println!("  {} {}", "Config directory:".cyan(), store::config_dir().display());
    println!("  {} {}", "Wrapper scripts:".cyan(), store::bin_dir().display());
    println!("  {} {}", "Profiles:".cyan(), profiles.len());
    if let Some(home) = dirs::home_dir() {
        println!("  {} {}", "Default Claude:".cyan(), home.join(".claude").display());
    }
    println!("\n  {} {} {}\n", "Run".dimmed(), "sweech list".bold(), "to see all providers".dimmed());
    Ok(())
}

// ── discover ──────────────────────────────────────────────────────────────────

pub fn cmd_discover() -> Result<()> {
    let profiles = store::load_profiles()?;
    let configured: BTreeSet<&str> = profiles.iter().map(|p| p.provider.as_str()).collect();

    println!("\n  {}\n", "Available AI Providers".bold());

    for provider in providers::registry() {
        let is_configured = configured.contains(provider.name.as_str());
        let icon = if is_configured {
            "✓".green().to_string()
        } else {
            "○".dimmed().to_string()
        };

        println!("  {icon} {}", provider.display_name.bold());
        println!("    {}", provider.description.dimmed());
        if let Some(pricing) = &provider.pricing {
            println!("    {} {pricing}", "Pricing:".dimmed());
        }
        if !provider.default_model.is_empty() {
            println!("    {} {}", "Default model:".dimmed(), provider.default_model);
        }

        if is_configured {
            let commands: Vec<String> = profiles
                .iter()
                .filter(|p| p.provider == provider.name)
                .map(|p| p.command_name.cyan().to_string())
                .collect();
            println!("    {} {}", "Your commands:".dimmed(), commands.join(", "));
        }
        println!();
    }

    println!("  {} {}\n", "Add a provider with:".dimmed(), "sweech add".bold());
    Ok(())
}

// ── update-wrappers ───────────────────────────────────────────────────────────

pub fn cmd_update_wrappers() -> Result<()> {
    let mut profiles = store::load_profiles()?;

    println!("\n  {}\n", "Updating wrapper scripts...".bold());

    for profile in &mut profiles {
        refresh_expired_token(profile)?;
        let cli = clis::get(profile.cli_type);
        wrapper::write_wrapper_script(&profile.command_name, cli)?;
        println!("  {} {}", "✓".green(), profile.command_name);
    }

    println!("\n  {} All wrapper scripts updated\n", "✓".green().bold());
    Ok(())
}

/// Refresh an expired OAuth token and rewrite the profile's config files.
/// Refresh failures are reported but do not abort the pass.
fn refresh_expired_token(profile: &mut Profile) -> Result<()> {
    let Some(token) = &profile.oauth else {
        return Ok(());
    };
    if !token.is_expired() {
        return Ok(());
    }

    match crate::oauth::refresh_token(token) {
        Ok(refreshed) => {
            profile.oauth = Some(refreshed);
            store::update_profile(profile.clone())?;
            if let Some(provider) = provider_for(profile) {
                wrapper::write_profile_config(
                    &profile.command_name,
                    &provider,
                    profile.api_key.as_deref(),
                    profile.oauth.as_ref(),
                    profile.cli_type,
                    false,
                )?;
            }
            println!("  {} {}: refreshed OAuth token", "·".cyan(), profile.command_name);
        }
        Err(err) => {
            println!(
                "  {} {}: OAuth token expired and refresh failed ({err})",
                "⚠".yellow(),
                profile.command_name
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ApiFormat, CliType};
    use crate::store::CustomProvider;

    fn profile_with_custom() -> Profile {
        Profile {
            name: "local".into(),
            command_name: "local".into(),
            cli_type: CliType::Codex,
            provider: "local".into(),
            api_key: Some("k".into()),
            oauth: None,
            base_url: Some("http://localhost:11434/v1".into()),
            model: Some("llama3".into()),
            small_fast_model: None,
            custom_provider: Some(CustomProvider {
                base_url: "http://localhost:11434/v1".into(),
                api_format: ApiFormat::Openai,
                default_model: "llama3".into(),
                small_fast_model: None,
                display_name: Some("Ollama".into()),
            }),
            created_at: store::now_utc(),
        }
    }

    #[test]
    fn provider_lookup_prefers_stored_custom_details() {
        let profile = profile_with_custom();
        let provider = provider_for(&profile).unwrap();
        assert_eq!(provider.display_name, "Ollama");
        assert!(provider.is_custom);
    }

    #[test]
    fn unknown_provider_falls_back_to_raw_name() {
        let mut profile = profile_with_custom();
        profile.custom_provider = None;
        profile.provider = "vanished".into();
        assert!(provider_for(&profile).is_none());
        assert_eq!(provider_display_name(&profile), "vanished");
    }
}
