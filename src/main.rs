mod add;
mod aliases;
mod backup;
mod chat_backup;
mod clis;
mod commands;
mod init;
mod oauth;
mod prompt;
mod providers;
mod reset;
mod shell;
mod store;
mod syscheck;
mod usage;
mod utility;
mod wrapper;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell as CompletionShell;
use colored::Colorize;

#[derive(Parser)]
#[command(
    name = "sweech",
    version,
    about = "Switch between Claude accounts and external AI providers",
    long_about = "\
Run multiple AI coding assistant accounts side by side without logging \
in and out each time.\n\
\n\
Each provider gets its own command (e.g. `cmini` for MiniMax) backed by \
an isolated config directory under ~/.sweech/profiles and a wrapper \
script in ~/.sweech/bin."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive onboarding for first-time setup
    Init,

    /// Add a new provider with interactive setup
    Add,

    /// List all configured providers
    #[command(alias = "ls")]
    List,

    /// Remove a configured provider
    #[command(alias = "rm")]
    Remove {
        /// Command name or alias of the provider
        command_name: String,
    },

    /// Show detailed information about a provider
    Show {
        /// Command name or alias of the provider
        command_name: String,
    },

    /// Show sweech configuration info
    Info,

    /// Discover available AI providers
    Discover,

    /// Show usage statistics for providers
    Stats {
        /// Limit to one command
        command_name: Option<String>,
        /// Clear recorded usage instead of showing it
        #[arg(long)]
        clear: bool,
    },

    /// Manage command aliases (list, add: work=claude-mini, remove: work)
    Alias {
        /// list | remove | <alias>=<command>
        action: Option<String>,
        /// Alias name when removing
        value: Option<String>,
    },

    /// Create a password-protected backup of all sweech configurations
    Backup {
        /// Output file path (default: sweech-backup-YYYYMMDD.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Restore sweech configuration from a backup
    Restore {
        /// Backup file created by `sweech backup`
        backup_file: PathBuf,
    },

    /// Backup chat history for a profile
    BackupChats {
        /// Command name or alias of the profile
        command_name: String,
        /// Output file path (default: sweech-chats-<name>-YYYYMMDD.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Regenerate wrapper scripts for all profiles
    UpdateWrappers,

    /// Health check for PATH, CLIs, and profiles
    Doctor,

    /// PATH configuration helper
    Path,

    /// Verify a provider's configuration
    Test {
        /// Command name or alias of the provider
        command_name: String,
    },

    /// Edit a profile's API key, model, or base URL
    Edit {
        /// Command name or alias of the provider
        command_name: String,
    },

    /// Clone an existing profile under a new command name
    Clone {
        /// Profile to copy from
        source: String,
        /// New command name
        target: String,
    },

    /// Rename a profile
    Rename {
        /// Current command name
        old_name: String,
        /// New command name
        new_name: String,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate for
        shell: CompletionShell,
    },

    /// Remove all sweech configuration (uninstall)
    Reset,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("\n  {} {}\n", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => init::cmd_init(),
        Commands::Add => add::cmd_add(),
        Commands::List => commands::cmd_list(),
        Commands::Remove { command_name } => commands::cmd_remove(&command_name),
        Commands::Show { command_name } => commands::cmd_show(&command_name),
        Commands::Info => commands::cmd_info(),
        Commands::Discover => commands::cmd_discover(),
        Commands::Stats { command_name, clear } => {
            if clear {
                usage::cmd_clear(command_name.as_deref())
            } else {
                usage::cmd_stats(command_name.as_deref())
            }
        }
        Commands::Alias { action, value } => {
            aliases::cmd_alias(action.as_deref(), value.as_deref())
        }
        Commands::Backup { output } => backup::cmd_backup(output),
        Commands::Restore { backup_file } => backup::cmd_restore(&backup_file),
        Commands::BackupChats { command_name, output } => {
            chat_backup::cmd_backup_chats(&command_name, output)
        }
        Commands::UpdateWrappers => commands::cmd_update_wrappers(),
        Commands::Doctor => utility::cmd_doctor(),
        Commands::Path => utility::cmd_path(),
        Commands::Test { command_name } => utility::cmd_test(&command_name),
        Commands::Edit { command_name } => utility::cmd_edit(&command_name),
        Commands::Clone { source, target } => utility::cmd_clone(&source, &target),
        Commands::Rename { old_name, new_name } => utility::cmd_rename(&old_name, &new_name),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
        Commands::Reset => reset::cmd_reset(),
    }
}
