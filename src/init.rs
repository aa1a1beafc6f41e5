use anyhow::Result;
use colored::Colorize;

use crate::{add, clis, prompt, shell, store, utility};

/// Interactive first-run onboarding: PATH, CLI detection, first provider,
/// optional health check.
pub fn cmd_init() -> Result<()> {
    println!("\n  {}\n", "Welcome to Sweech!".cyan().bold());
    println!("  Let's get you set up with your first AI provider.\n");

    let existing = store::load_profiles()?;
    if !existing.is_empty() {
        println!("  {}\n", "You already have providers configured:".yellow());
        for profile in &existing {
            println!("    {} {}", "•".dimmed(), profile.command_name);
        }
        println!();

        if !prompt::confirm("Would you like to add another provider?", true)? {
            println!(
                "\n  {} You're all set! Run {} to see your providers.\n",
                "✓".green(),
                "sweech list".bold()
            );
            return Ok(());
        }
        println!();
    }

    step_path()?;
    if !step_detect_clis()? {
        return Ok(());
    }
    step_first_provider(&existing)?;
    step_verify()?;
    final_summary()?;

    Ok(())
}

fn step_path() -> Result<()> {
    if shell::is_in_path() {
        println!("  {} Sweech is in your PATH\n", "✓".green());
        return Ok(());
    }

    println!("  {}\n", "Step 1: Add Sweech to your PATH".bold());

    let detected = shell::detect();
    let rc = shell::rc_file(detected);

    println!("  {}\n", "Sweech bin directory is not in your PATH yet.".yellow());
    println!("  To use your providers, add this to your shell configuration:\n");
    println!("    {}\n", shell::PATH_EXPORT_LINE.cyan());
    println!("  {}\n", format!("Add to: {}", rc.display()).dimmed());

    if prompt::confirm("Would you like me to add it automatically?", true)? {
        match shell::add_to_rc_file(detected) {
            Ok(Some(rc)) => {
                println!("\n  {} Added to {}", "✓".green(), rc.display());
                println!("\n  {}", "Restart your terminal or run:".yellow());
                println!("    {}\n", format!("source {}", rc.display()).cyan());
            }
            Ok(None) => println!("\n  {} Already in PATH\n", "✓".green()),
            Err(err) => {
                eprintln!("\n  {} Failed to update {}: {err}", "✗".red(), rc.display());
                println!("  {}\n", "Please add it manually.".yellow());
            }
        }
    } else {
        println!("\n  {}\n", "Remember to add it to your PATH manually!".yellow());
    }
    Ok(())
}

/// Returns false when setup should stop because no CLI is installed.
fn step_detect_clis() -> Result<bool> {
    println!("  {}\n", "Step 2: Detect installed CLIs".bold());

    let detections = clis::detect_installed();
    let any_installed = detections.iter().any(|d| d.installed);

    for detection in &detections {
        if detection.installed {
            let version = detection
                .version
                .as_ref()
                .map(|v| format!(" ({v})").dimmed().to_string())
                .unwrap_or_default();
            println!("  {} {} detected{version}", "✓".green(), detection.cli.display_name);
        } else {
            println!("  {} {} not found", "○".dimmed(), detection.cli.display_name);
            println!("    {}", format!("Install: {}", detection.cli.install_url).dimmed());
        }
    }

    if !any_installed {
        println!("\n  {}", "No supported CLIs found!".yellow());
        println!("  You'll need to install Claude Code or Codex to use Sweech.\n");

        if !prompt::confirm("Continue anyway? (You can configure providers later)", false)? {
            println!("\n  {}\n", "Install a CLI first, then run `sweech init` again.".yellow());
            return Ok(false);
        }
    }

    println!();
    Ok(true)
}

fn step_first_provider(existing: &[crate::store::Profile]) -> Result<()> {
    println!("  {}\n", "Step 3: Add your first provider".bold());

    let detections = clis::detect_installed();
    match add::interactive_add(existing, &detections).and_then(add::create_profile) {
        Ok(()) => Ok(()),
        Err(err) => {
            eprintln!("\n  {} Setup failed: {err}\n", "✗".red());
            Ok(())
        }
    }
}

fn step_verify() -> Result<()> {
    println!("  {}\n", "Step 4: Verify installation".bold());

    if prompt::confirm("Run health check to verify everything works?", true)? {
        println!();
        utility::cmd_doctor()?;
    }
    Ok(())
}

fn final_summary() -> Result<()> {
    println!("\n  {}\n", "Setup complete!".green().bold());
    println!("  {}\n", "Next steps:".bold());

    if !shell::is_in_path() {
        let rc = shell::rc_file(shell::detect());
        println!("  {}", "1. Restart your terminal or run:".yellow());
        println!("     {}\n", format!("source {}", rc.display()).cyan());
    }

    let profiles = store::load_profiles()?;
    if let Some(first) = profiles.first() {
        println!("  {}", "2. Try your new command:".cyan());
        println!("     {}\n", first.command_name.cyan().bold());
    }

    println!("  {}", "3. Add more providers:".dimmed());
    println!("     {}\n", "sweech add".dimmed());
    println!("  {}", "4. View all providers:".dimmed());
    println!("     {}\n", "sweech list".dimmed());

    Ok(())
}
