//! Where the API key comes from, and where it goes when the user enters one.

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::client::API_KEY_ENV;
use crate::{Error, Result};

/// Default env file, relative to the working directory.
pub const DEFAULT_ENV_FILE: &str = ".parley";

/// A source of API keys.
pub trait CredentialSource {
    /// Returns the key, or `None` if there is none.  An empty key is no key.
    fn credential(&self) -> Option<String>;
}

impl CredentialSource for Option<String> {
    fn credential(&self) -> Option<String> {
        self.as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(String::from)
    }
}

/// Looks up a key in the process environment, then in an env file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStore {
    var: String,
    env_file: Option<PathBuf>,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(API_KEY_ENV, Some(PathBuf::from(DEFAULT_ENV_FILE)))
    }
}

impl CredentialStore {
    pub fn new(var: impl Into<String>, env_file: Option<PathBuf>) -> Self {
        Self {
            var: var.into(),
            env_file,
        }
    }

    pub fn var(&self) -> &str {
        &self.var
    }

    pub fn env_file(&self) -> Option<&Path> {
        self.env_file.as_deref()
    }

    fn from_env_file(&self) -> Option<String> {
        let path = self.env_file.as_deref()?;
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(err) => {
                if path.exists() {
                    tracing::warn!(path = %path.display(), error = %err, "cannot read env file");
                }
                return None;
            }
        };
        for item in iter {
            match item {
                Ok((key, value)) if key == self.var => {
                    return Some(value).credential();
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "malformed env file");
                    return None;
                }
            }
        }
        None
    }

    /// Store `key` in the env file, replacing any previous value for this
    /// store's variable and keeping every other line.
    pub fn save(&self, key: &str) -> Result<PathBuf> {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::validation("API key is empty", Some(self.var.clone())));
        }
        if key
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '\\'))
        {
            return Err(Error::validation(
                "API key contains whitespace or quote characters",
                Some(self.var.clone()),
            ));
        }
        let path = self
            .env_file
            .clone()
            .ok_or_else(|| Error::configuration("no env file configured to store the key in"))?;

        let existing = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(Error::io(
                    format!("cannot read {}", path.display()),
                    err,
                ));
            }
        };

        let line = format!("{}=\"{}\"", self.var, key);
        let mut replaced = false;
        let mut lines: Vec<String> = Vec::new();
        for existing_line in existing.lines() {
            if assigns(existing_line, &self.var) {
                if !replaced {
                    lines.push(line.clone());
                    replaced = true;
                }
            } else {
                lines.push(existing_line.to_string());
            }
        }
        if !replaced {
            lines.push(line);
        }
        let mut contents = lines.join("\n");
        contents.push('\n');

        write_private(&path, contents.as_bytes())
            .map_err(|err| Error::io(format!("cannot write {}", path.display()), err))?;
        tracing::debug!(path = %path.display(), var = %self.var, "stored API key");
        Ok(path)
    }
}

impl CredentialSource for CredentialStore {
    fn credential(&self) -> Option<String> {
        env::var(&self.var)
            .ok()
            .credential()
            .or_else(|| self.from_env_file())
    }
}

/// True if `line` assigns `var`, with or without a leading `export`.
fn assigns(line: &str, var: &str) -> bool {
    let line = line.trim_start();
    let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
    line.strip_prefix(var)
        .is_some_and(|rest| rest.trim_start().starts_with('='))
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // An existing file keeps its old mode unless we tighten it ourselves.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
