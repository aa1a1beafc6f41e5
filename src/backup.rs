use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use colored::Colorize;
use rand::RngCore;
use sha2::Sha256;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::{env, fs};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::{prompt, shell, store};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

pub const SALT_LEN: usize = 32;
pub const IV_LEN: usize = 16;
const PBKDF2_ITERATIONS: u32 = 100_000;

const MIN_PASSWORD_LEN: usize = 6;

// ── Encryption envelope: salt(32) || iv(16) || ciphertext ────────────────────

fn derive_key(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

pub fn encrypt(data: &[u8], password: &str) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let key = derive_key(password, &salt);
    let cipher = Aes256CbcEnc::new_from_slices(&key, &iv)
        .map_err(|_| anyhow!("Invalid key or IV length"))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(data);

    let mut out = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub fn decrypt(data: &[u8], password: &str) -> Result<Vec<u8>> {
    if data.len() < SALT_LEN + IV_LEN {
        bail!("Incorrect password or corrupted backup file");
    }
    let (salt, rest) = data.split_at(SALT_LEN);
    let (iv, ciphertext) = rest.split_at(IV_LEN);

    let key = derive_key(password, salt);
    let cipher = Aes256CbcDec::new_from_slices(&key, iv)
        .map_err(|_| anyhow!("Invalid key or IV length"))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| anyhow!("Incorrect password or corrupted backup file"))
}

// ── In-memory zip archive ─────────────────────────────────────────────────────

pub struct Archive {
    zip: ZipWriter<Cursor<Vec<u8>>>,
}

impl Archive {
    pub fn new() -> Self {
        Archive {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
    }

    pub fn add_file(&mut self, path: &Path, name: &str) -> Result<()> {
        let data =
            fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
        self.zip.start_file(name, Self::options())?;
        self.zip.write_all(&data)?;
        Ok(())
    }

    /// Add a directory tree; entries are named `<prefix>/<relative path>`,
    /// or just the relative path when the prefix is empty.
    pub fn add_dir(&mut self, dir: &Path, prefix: &str) -> Result<()> {
        if !dir.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let name = if prefix.is_empty() {
                file_name
            } else {
                format!("{prefix}/{file_name}")
            };
            if path.is_dir() {
                self.add_dir(&path, &name)?;
            } else {
                self.add_file(&path, &name)?;
            }
        }
        Ok(())
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        Ok(self.zip.finish()?.into_inner())
    }
}

pub fn extract_zip(data: &[u8], dest: &Path) -> Result<()> {
    let mut archive =
        ZipArchive::new(Cursor::new(data)).context("Backup does not contain a valid archive")?;
    archive
        .extract(dest)
        .with_context(|| format!("Cannot extract archive into {}", dest.display()))
}

// ── Backup command ────────────────────────────────────────────────────────────

pub fn default_backup_name() -> String {
    format!("sweech-backup-{}.zip", Utc::now().format("%Y%m%d"))
}

pub fn cmd_backup(output: Option<PathBuf>) -> Result<()> {
    let profiles = store::load_profiles()?;
    if profiles.is_empty() {
        println!("\n  {}\n", "No providers configured. Nothing to backup.".yellow());
        return Ok(());
    }

    let password =
        prompt::password_confirmed("Enter password to encrypt backup:", MIN_PASSWORD_LEN)?;

    let output = output.unwrap_or_else(|| PathBuf::from(default_backup_name()));

    println!("\n  {} Creating backup...\n", "·".cyan());

    let mut archive = Archive::new();
    archive.add_dir(&store::profiles_dir(), "profiles")?;
    archive.add_file(&store::config_file(), "config.json")?;
    archive.add_dir(&store::bin_dir(), "bin")?;
    let zip_data = archive.finish()?;

    let encrypted = encrypt(&zip_data, &password)?;
    fs::write(&output, &encrypted)
        .with_context(|| format!("Cannot write backup to {}", output.display()))?;

    println!("  {} Backup created successfully!\n", "✓".green().bold());
    println!(
        "  {} {}",
        "File:".cyan(),
        fs::canonicalize(&output).unwrap_or(output).display()
    );
    println!("  {} {:.2} KB", "Size:".cyan(), encrypted.len() as f64 / 1024.0);
    println!("  {} {}\n", "Profiles:".cyan(), profiles.len());
    println!("  {}", "Keep this backup and password safe!".yellow());
    println!("  {}\n", "You'll need them to restore on a new machine.".yellow());

    Ok(())
}

// ── Restore command ───────────────────────────────────────────────────────────

pub fn cmd_restore(backup_file: &Path) -> Result<()> {
    if !backup_file.exists() {
        bail!("Backup file not found: {}", backup_file.display());
    }

    let existing = store::load_profiles()?;
    if !existing.is_empty() {
        println!("\n  {}", "Warning: You have existing providers configured:".yellow());
        for profile in &existing {
            println!("    {} {}", "-".dimmed(), profile.command_name);
        }
        println!();

        if !prompt::confirm("This will overwrite existing configurations. Continue?", false)? {
            println!("  {}\n", "Cancelled".yellow());
            return Ok(());
        }
    }

    let password = prompt::password("Enter backup password:")?;
    if password.is_empty() {
        bail!("Password is required");
    }

    println!("\n  {} Restoring backup...\n", "·".cyan());

    let encrypted = fs::read(backup_file)
        .with_context(|| format!("Cannot read {}", backup_file.display()))?;
    let zip_data = decrypt(&encrypted, &password)?;

    store::setup_dirs()?;
    extract_zip(&zip_data, &store::config_dir())?;
    make_bin_scripts_executable()?;

    let restored = store::load_profiles()?;
    println!("  {} Backup restored successfully!\n", "✓".green().bold());
    println!("  {} {}", "Profiles restored:".cyan(), restored.len());
    for profile in &restored {
        println!("    {} {}", "-".dimmed(), profile.command_name);
    }
    println!();

    if env_path_hint_needed() {
        println!("  {}", "Make sure ~/.sweech/bin is in your PATH:".yellow());
        println!("    {}\n", shell::PATH_EXPORT_LINE.dimmed());
    }

    Ok(())
}

fn make_bin_scripts_executable() -> Result<()> {
    let bin = store::bin_dir();
    if !bin.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(&bin)? {
        let path = entry?.path();

        #[cfg(unix)]
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        #[cfg(not(unix))]
        let _ = path;
    }
    Ok(())
}

fn env_path_hint_needed() -> bool {
    env::var_os("PATH").is_some() && !shell::is_in_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trips_arbitrary_bytes() {
        let data: Vec<u8> = (0..4096).map(|i| (i * 31 % 251) as u8).collect();
        let encrypted = encrypt(&data, "secret-password").unwrap();

        assert!(encrypted.len() > SALT_LEN + IV_LEN);
        assert_ne!(&encrypted[SALT_LEN + IV_LEN..], data.as_slice());

        let decrypted = decrypt(&encrypted, "secret-password").unwrap();
        assert_eq!(decrypted, data);
    }

    #[test]
    fn empty_input_round_trips() {
        let encrypted = encrypt(b"", "pw1234").unwrap();
        assert_eq!(decrypt(&encrypted, "pw1234").unwrap(), b"");
    }

    #[test]
    fn wrong_password_always_fails() {
        let encrypted = encrypt(b"sensitive profile data", "correct-password").unwrap();
        let err = decrypt(&encrypted, "wrong-password").unwrap_err();
        assert!(err.to_string().contains("Incorrect password"));
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let err = decrypt(&[0u8; SALT_LEN + IV_LEN - 1], "pw").unwrap_err();
        assert!(err.to_string().contains("corrupted"));
    }

    #[test]
    fn fresh_salt_and_iv_per_encryption() {
        let a = encrypt(b"same data", "same password").unwrap();
        let b = encrypt(b"same data", "same password").unwrap();
        assert_ne!(a[..SALT_LEN], b[..SALT_LEN]);
        assert_ne!(a[SALT_LEN..SALT_LEN + IV_LEN], b[SALT_LEN..SALT_LEN + IV_LEN]);
    }

    #[test]
    fn archive_round_trips_a_directory_tree() {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("profiles/cmini")).unwrap();
        fs::write(src.path().join("profiles/cmini/settings.json"), "{\"env\":{}}").unwrap();
        fs::write(src.path().join("config.json"), "[]").unwrap();

        let mut archive = Archive::new();
        archive.add_dir(&src.path().join("profiles"), "profiles").unwrap();
        archive.add_file(&src.path().join("config.json"), "config.json").unwrap();
        let data = archive.finish().unwrap();

        let dest = tempfile::tempdir().unwrap();
        extract_zip(&data, dest.path()).unwrap();

        assert_eq!(
            fs::read_to_string(dest.path().join("profiles/cmini/settings.json")).unwrap(),
            "{\"env\":{}}"
        );
        assert_eq!(fs::read_to_string(dest.path().join("config.json")).unwrap(), "[]");
    }

    #[test]
    fn missing_directory_is_skipped_silently() {
        let mut archive = Archive::new();
        archive.add_dir(Path::new("/no/such/dir/anywhere"), "x").unwrap();
        assert!(archive.finish().is_ok());
    }
}
