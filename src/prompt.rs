use anyhow::{bail, Result};
use std::io::{self, BufRead, Write};

pub fn input(message: &str) -> Result<String> {
    print!("  {message} ");
    io::stdout().flush()?;
    read_trimmed_line(&mut io::stdin().lock())
}

/// A zero-byte read means stdin is closed; retry loops must not spin on it.
fn read_trimmed_line(reader: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        bail!("Input stream closed");
    }
    Ok(line.trim().to_string())
}

pub fn input_with_default(message: &str, default: &str) -> Result<String> {
    let value = input(&format!("{message} [{default}]"))?;
    if value.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(value)
    }
}

pub fn confirm(message: &str, default: bool) -> Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    let answer = input(&format!("{message} {hint}"))?;
    Ok(match answer.to_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    })
}

/// Numbered single-choice menu; returns the selected index.
pub fn select(message: &str, options: &[&str]) -> Result<usize> {
    println!("  {message}");
    for (i, option) in options.iter().enumerate() {
        println!("    {}. {option}", i + 1);
    }
    loop {
        let answer = input(&format!("Choice [1-{}]:", options.len()))?;
        if let Ok(n) = answer.parse::<usize>() {
            if n >= 1 && n <= options.len() {
                return Ok(n - 1);
            }
        }
        println!("  Please enter a number between 1 and {}", options.len());
    }
}

pub fn password(message: &str) -> Result<String> {
    let value = rpassword::prompt_password(format!("  {message} "))?;
    Ok(value.trim().to_string())
}

/// Prompt for a password twice, enforcing a minimum length.
pub fn password_confirmed(message: &str, min_len: usize) -> Result<String> {
    let first = password(message)?;
    if first.len() < min_len {
        bail!("Password must be at least {min_len} characters");
    }
    let second = password("Confirm password:")?;
    if first != second {
        bail!("Passwords do not match");
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_line_trims_whitespace() {
        let mut reader = Cursor::new("  cmini  \n");
        assert_eq!(read_trimmed_line(&mut reader).unwrap(), "cmini");
    }

    #[test]
    fn closed_input_stream_is_an_error() {
        let mut reader = Cursor::new("");
        let err = read_trimmed_line(&mut reader).unwrap_err();
        assert!(err.to_string().contains("Input stream closed"));
    }
}
