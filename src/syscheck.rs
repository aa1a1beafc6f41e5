use std::process::Command;

/// Critical system commands that must never be shadowed by a wrapper script.
const BLOCKED_COMMANDS: &[&str] = &[
    // Navigation & file system
    "cd", "ls", "pwd", "mkdir", "rm", "cp", "mv", "touch",
    // File viewing/editing
    "cat", "less", "more", "head", "tail", "nano", "vim", "vi",
    // System operations
    "sudo", "su", "chmod", "chown", "kill", "ps", "top",
    // Git
    "git", "gh",
    // Package managers
    "npm", "yarn", "pnpm", "pip", "brew",
    // Shell builtins
    "echo", "export", "source", "alias",
    // Common CLIs
    "node", "python", "python3", "ruby", "java", "docker",
    // Other AI CLIs
    "copilot",
];

pub fn is_blocked(command_name: &str) -> bool {
    let lower = command_name.to_lowercase();
    BLOCKED_COMMANDS.contains(&lower.as_str())
}

pub fn has_valid_charset(command_name: &str) -> bool {
    !command_name.is_empty()
        && command_name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Check whether a command already exists in the system PATH.
pub fn is_system_command(command_name: &str) -> bool {
    if !has_valid_charset(command_name) {
        return false;
    }
    Command::new("which")
        .arg(command_name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Validate a proposed command name.
/// Err: the name is a critical system command and may not be used.
/// Ok(Some(warning)): the name collides with a non-critical PATH entry.
pub fn validate_command_name(command_name: &str) -> Result<Option<String>, String> {
    if is_blocked(command_name) {
        return Err(format!(
            "Cannot use \"{command_name}\" - this is a critical system command that must not be shadowed"
        ));
    }

    if is_system_command(command_name) {
        return Ok(Some(format!(
            "\"{command_name}\" exists as a system command. Consider a different name to avoid confusion."
        )));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_commands_are_blocked_case_insensitively() {
        assert!(is_blocked("git"));
        assert!(is_blocked("GIT"));
        assert!(is_blocked("sudo"));
        assert!(!is_blocked("claude-mini"));
    }

    #[test]
    fn charset_allows_lowercase_digits_and_hyphens_only() {
        assert!(has_valid_charset("claude-mini"));
        assert!(has_valid_charset("qwen2"));
        assert!(!has_valid_charset("Claude"));
        assert!(!has_valid_charset("bad name"));
        assert!(!has_valid_charset("semi;colon"));
        assert!(!has_valid_charset(""));
    }

    #[test]
    fn blocked_names_fail_validation() {
        assert!(validate_command_name("rm").is_err());
        assert!(validate_command_name("sweech-no-such-command-xyz").unwrap().is_none());
    }
}
