use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::collections::BTreeMap;

use crate::clis::{self, Detection};
use crate::providers::{self, ApiFormat, CliType, Provider};
use crate::store::{self, CustomProvider, Profile};
use crate::{oauth, prompt, syscheck, wrapper};

/// Everything collected by the interactive flow before a profile is created.
pub struct AddAnswers {
    pub cli_type: CliType,
    pub provider: Provider,
    pub command_name: String,
    pub api_key: Option<String>,
    pub use_oauth: bool,
    pub custom: Option<CustomProvider>,
}

pub fn cmd_add() -> Result<()> {
    println!("\n  {}\n", "Sweech - Add New Provider".bold());

    let profiles = store::load_profiles()?;
    show_current_setup(&profiles);

    println!("  {}\n", "Detecting installed CLIs...".dimmed());
    let detections = clis::detect_installed();
    let answers = interactive_add(&profiles, &detections)?;
    create_profile(answers)
}

fn show_current_setup(profiles: &[Profile]) {
    if profiles.is_empty() {
        return;
    }

    println!("  {}", "Your current setup:".bold());
    let mut grouped: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for profile in profiles {
        grouped
            .entry(profile.cli_type.to_string())
            .or_default()
            .push(&profile.command_name);
    }
    for (cli, names) in &grouped {
        let plural = if names.len() == 1 { "profile" } else { "profiles" };
        println!(
            "    {} {}: {} {plural} ({})",
            "•".cyan(),
            cli,
            names.len(),
            names.join(", ")
        );
    }
    println!();
}

// ── Interactive flow ──────────────────────────────────────────────────────────

pub fn interactive_add(profiles: &[Profile], detections: &[Detection]) -> Result<AddAnswers> {
    let installed: Vec<&Detection> = detections.iter().filter(|d| d.installed).collect();
    if installed.is_empty() {
        println!("  {} No supported CLIs found. Please install at least one:", "✗".red());
        for detection in detections {
            println!(
                "    {} {}: {}",
                "•".yellow(),
                detection.cli.display_name,
                detection.cli.install_url
            );
        }
        println!();
        bail!("No supported CLIs installed");
    }

    let cli_type = choose_cli(&installed)?;
    let provider = choose_provider(cli_type)?;
    let command_name = prompt_command_name(profiles, &provider)?;

    let custom = if provider.is_custom {
        Some(prompt_custom_provider()?)
    } else {
        None
    };
    let provider = match &custom {
        Some(custom) => providers::from_custom(custom, &command_name),
        None => provider,
    };

    let use_oauth = !provider.is_custom
        && prompt::select(
            "How do you want to authenticate?",
            &["API key", "OAuth (browser login)"],
        )? == 1;

    let api_key = if use_oauth {
        None
    } else {
        let key = prompt::password(&format!("Enter API key for {}:", provider.display_name))?;
        if key.is_empty() {
            bail!("API key is required");
        }
        Some(key)
    };

    Ok(AddAnswers {
        cli_type,
        provider,
        command_name,
        api_key,
        use_oauth,
        custom,
    })
}

fn choose_cli(installed: &[&Detection]) -> Result<CliType> {
    if installed.len() == 1 {
        return Ok(installed[0].cli.cli_type);
    }

    let labels: Vec<String> = installed
        .iter()
        .map(|d| match &d.version {
            Some(version) => format!("{} ({version})", d.cli.display_name),
            None => format!("{} - {}", d.cli.display_name, d.cli.description),
        })
        .collect();
    let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    let choice = prompt::select("Which CLI are you configuring?", &refs)?;
    Ok(installed[choice].cli.cli_type)
}

fn choose_provider(cli_type: CliType) -> Result<Provider> {
    let cli = clis::get(cli_type);

    // The claude CLI has an official provider worth offering separately
    if cli_type == CliType::Claude {
        let choice = prompt::select(
            &format!("What would you like to add for {}?", cli.display_name),
            &[
                "Another Claude Code account (official provider)",
                "External AI provider (MiniMax, Qwen, Kimi, DeepSeek, etc.)",
            ],
        )?;
        if choice == 0 {
            return providers::get("anthropic").context("Provider registry is missing anthropic");
        }
    }

    let available: Vec<Provider> = providers::for_cli(cli_type)
        .into_iter()
        .filter(|p| p.name != "anthropic")
        .collect();

    let labels: Vec<String> = available
        .iter()
        .map(|p| format!("{} - {}", p.display_name, p.description))
        .collect();
    let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    let choice = prompt::select("Choose a provider:", &refs)?;
    Ok(available[choice].clone())
}

fn command_name_suggestions(provider: &str) -> &'static str {
    match provider {
        "minimax" => "\"cmini\", \"claude-mini\", \"mini\"",
        "qwen" | "qwen-openai" => "\"qwen\", \"claude-qwen\", \"cqwen\"",
        "kimi" => "\"kimi\", \"claude-kimi\", \"ckimi\"",
        "deepseek" | "deepseek-openai" => "\"deep\", \"claude-deep\", \"cdeep\"",
        "glm" => "\"glm\", \"claude-glm\", \"glm4\"",
        "anthropic" => "\"claude-2\", \"claude-work\", \"claude-personal\"",
        _ => "\"my-command\"",
    }
}

fn prompt_command_name(profiles: &[Profile], provider: &Provider) -> Result<String> {
    loop {
        let input = prompt::input(&format!(
            "What command name? (e.g., {})",
            command_name_suggestions(&provider.name)
        ))?;
        let name = input.trim().to_lowercase();

        if name.is_empty() {
            println!("  {}", "Command name is required".red());
            continue;
        }
        if !syscheck::has_valid_charset(&name) {
            println!(
                "  {}",
                "Use only lowercase letters, numbers, and hyphens (e.g., \"claude-mini\")".red()
            );
            continue;
        }
        if name == "claude" {
            println!(
                "  {}",
                "Cannot use \"claude\" - this is reserved for your default account".red()
            );
            continue;
        }
        if store::find_profile(profiles, &name).is_some() {
            println!(
                "  {}",
                format!("Command \"{name}\" already exists. Choose a different name.").red()
            );
            continue;
        }

        match syscheck::validate_command_name(&name) {
            Err(error) => {
                println!("  {}", error.red());
                continue;
            }
            Ok(Some(warning)) => {
                println!("  {}", warning.yellow());
                if !prompt::confirm("Use this name anyway?", false)? {
                    continue;
                }
            }
            Ok(None) => {}
        }

        return Ok(name);
    }
}

fn prompt_custom_provider() -> Result<CustomProvider> {
    println!("\n  {}\n", "Custom Provider Setup".bold());
    println!("  {}", "Configure a local or self-hosted LLM provider".dimmed());
    println!("  {}", "Examples:".cyan());
    println!("    {}", "Local:   http://localhost:1234".dimmed());
    println!("    {}", "LAN:     http://192.168.1.100:8080".dimmed());
    println!("    {}\n", "Remote:  https://api.your-server.com".dimmed());

    let base_url = loop {
        let input = prompt::input("Base URL:")?;
        let trimmed = input.trim_end_matches('/').to_string();
        match providers::validate_base_url(&trimmed) {
            Ok(()) => break trimmed,
            Err(error) => println!("  {}", error.red()),
        }
    };

    let api_format = match prompt::select(
        "API format:",
        &[
            "OpenAI-compatible (GPT, Codex, LM Studio, llama.cpp, etc.)",
            "Anthropic-compatible (Claude API format)",
        ],
    )? {
        0 => ApiFormat::Openai,
        _ => ApiFormat::Anthropic,
    };

    let model_default = match api_format {
        ApiFormat::Openai => "gpt-3.5-turbo",
        ApiFormat::Anthropic => "claude-sonnet-4-5",
    };
    let default_model = prompt::input_with_default("Default model name:", model_default)?;

    let small_fast_model = prompt::input("Small/fast model (optional, press Enter to skip):")?;
    let display_name = prompt::input("Display name (optional, press Enter to use base URL):")?;

    Ok(CustomProvider {
        base_url,
        api_format,
        default_model: default_model.trim().to_string(),
        small_fast_model: (!small_fast_model.is_empty()).then_some(small_fast_model),
        display_name: (!display_name.is_empty()).then_some(display_name),
    })
}

// ── Profile creation ──────────────────────────────────────────────────────────

/// OAuth against the CLI's own provider defers to the CLI's built-in login.
fn is_official_provider(cli_type: CliType, provider: &str) -> bool {
    matches!(
        (cli_type, provider),
        (CliType::Claude, "anthropic") | (CliType::Codex, "openai")
    )
}

pub fn create_profile(answers: AddAnswers) -> Result<()> {
    let cli = clis::get(answers.cli_type);
    let native_auth = answers.use_oauth && is_official_provider(answers.cli_type, &answers.provider.name);

    let oauth_token = if answers.use_oauth && !native_auth {
        let token = oauth::get_token(answers.cli_type)?;
        println!("  {} OAuth authentication successful", "✓".green());
        Some(token)
    } else {
        None
    };

    let provider = &answers.provider;
    let profile = Profile {
        name: answers.command_name.clone(),
        command_name: answers.command_name.clone(),
        cli_type: answers.cli_type,
        provider: provider.name.clone(),
        api_key: answers.api_key.clone(),
        oauth: oauth_token.clone(),
        base_url: (!provider.base_url.is_empty()).then(|| provider.base_url.clone()),
        model: (!provider.default_model.is_empty()).then(|| provider.default_model.clone()),
        small_fast_model: provider.small_fast_model.clone(),
        custom_provider: answers.custom.clone(),
        created_at: store::now_utc(),
    };

    store::add_profile(profile)?;
    wrapper::write_profile_config(
        &answers.command_name,
        provider,
        answers.api_key.as_deref(),
        oauth_token.as_ref(),
        answers.cli_type,
        native_auth,
    )?;
    wrapper::write_wrapper_script(&answers.command_name, cli)?;

    println!("\n  {} Provider added successfully!\n", "✓".green().bold());
    println!("  {} {}", "Command:".cyan(), answers.command_name.bold());
    println!("  {} {}", "Provider:".cyan(), provider.display_name);

    if native_auth {
        println!("  {} OAuth (via CLI)", "Auth:".cyan());
        println!("\n  {}", "Authentication setup required:".yellow());
        println!("    {} {}", "Run:".dimmed(), answers.command_name.cyan());
        println!("    {}", "This will start the CLI's own login flow".dimmed());
    } else {
        println!("  {} {}", "Model:".cyan(), provider.default_model);
        if answers.use_oauth {
            println!("  {} OAuth Token", "Auth:".cyan());
        }
    }
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn official_provider_pairs_cli_with_its_vendor() {
        assert!(is_official_provider(CliType::Claude, "anthropic"));
        assert!(is_official_provider(CliType::Codex, "openai"));
        assert!(!is_official_provider(CliType::Claude, "minimax"));
        assert!(!is_official_provider(CliType::Codex, "anthropic"));
    }

    #[test]
    fn suggestions_cover_builtin_providers() {
        assert!(command_name_suggestions("minimax").contains("cmini"));
        assert!(command_name_suggestions("unknown").contains("my-command"));
    }
}
