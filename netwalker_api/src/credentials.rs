use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use configparser::ini::Ini;
use log::{debug, info, warn};

use crate::config::{deobfuscate, obfuscate, ENC_PREFIX};
use crate::error::SetupError;

pub const ENV_USERNAME: &str = "NETWALKER_USERNAME";
pub const ENV_PASSWORD: &str = "NETWALKER_PASSWORD";
pub const ENV_ENABLE_PASSWORD: &str = "NETWALKER_ENABLE_PASSWORD";

/// Default credentials file name, searched for in the working directory and
/// up to two parent directories.
pub const CREDENTIALS_FILE: &str = "secret_creds.ini";

/// Device login credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub enable_password: Option<String>,
}

/// Resolves device credentials from, in order: explicit overrides, the
/// `NETWALKER_*` environment variables, a credentials file, and finally an
/// interactive prompt with echo suppressed for secrets.
///
/// Passwords at rest in the credentials file are kept in the reversible
/// `ENC:` base-64 form. That is obfuscation against shoulder-surfing, not
/// encryption; treat the file as sensitive regardless.
pub struct CredentialStore {
    cli_username: Option<String>,
    cli_password: Option<String>,
    prompt_enable: bool,
    credentials_file: PathBuf,
}

impl CredentialStore {
    pub fn new(
        cli_username: Option<String>,
        cli_password: Option<String>,
        prompt_enable: bool,
    ) -> Self {
        Self {
            cli_username,
            cli_password,
            prompt_enable,
            credentials_file: find_credentials_file(CREDENTIALS_FILE),
        }
    }

    #[cfg(test)]
    fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            cli_username: None,
            cli_password: None,
            prompt_enable: false,
            credentials_file: path.into(),
        }
    }

    /// Resolve credentials; first source with a full username+password pair
    /// wins.
    pub fn get(&self) -> Result<Credentials, SetupError> {
        if let (Some(username), Some(password)) = (&self.cli_username, &self.cli_password) {
            info!("Using credentials from command-line arguments");
            return Ok(Credentials {
                username: username.clone(),
                password: password.clone(),
                enable_password: env::var(ENV_ENABLE_PASSWORD).ok(),
            });
        }

        if let (Ok(username), Ok(password)) = (env::var(ENV_USERNAME), env::var(ENV_PASSWORD)) {
            if !username.is_empty() && !password.is_empty() {
                info!("Using credentials from environment variables");
                return Ok(Credentials {
                    username,
                    password,
                    enable_password: env::var(ENV_ENABLE_PASSWORD).ok().filter(|s| !s.is_empty()),
                });
            }
        }

        if self.credentials_file.exists() {
            if let Some(credentials) = self.load_from_file()? {
                info!(
                    "Using credentials from {}",
                    self.credentials_file.display()
                );
                return Ok(credentials);
            }
        }

        info!("No stored credentials found, prompting");
        self.prompt()
    }

    fn load_from_file(&self) -> Result<Option<Credentials>, SetupError> {
        let mut ini = Ini::new();
        ini.load(&self.credentials_file).map_err(|e| {
            SetupError::Credentials(format!(
                "Failed to parse {}: {e}",
                self.credentials_file.display()
            ))
        })?;

        let username = ini.get("credentials", "username");
        let password = ini.get("credentials", "password");
        let enable_password = ini.get("credentials", "enable_password");

        let (Some(username), Some(password)) = (username, password) else {
            warn!(
                "{} has no complete [credentials] section",
                self.credentials_file.display()
            );
            return Ok(None);
        };

        // First read of a plain-text file: rewrite secrets in ENC: form.
        let mut rewritten = false;
        if !password.starts_with(ENC_PREFIX) {
            ini.set("credentials", "password", Some(obfuscate(&password)));
            rewritten = true;
        }
        if let Some(enable) = &enable_password {
            if !enable.starts_with(ENC_PREFIX) {
                ini.set("credentials", "enable_password", Some(obfuscate(enable)));
                rewritten = true;
            }
        }
        if rewritten {
            match ini.write(&self.credentials_file) {
                Ok(()) => info!(
                    "Obfuscated plain-text secrets in {}",
                    self.credentials_file.display()
                ),
                Err(e) => warn!(
                    "Could not rewrite {}: {e}",
                    self.credentials_file.display()
                ),
            }
        }

        let decode = |value: &str| {
            deobfuscate(value)
                .map_err(|e| SetupError::Credentials(format!("Invalid ENC: value: {e}")))
        };

        Ok(Some(Credentials {
            username,
            password: decode(&password)?,
            enable_password: enable_password.as_deref().map(decode).transpose()?,
        }))
    }

    fn prompt(&self) -> Result<Credentials, SetupError> {
        print!("Username: ");
        io::stdout()
            .flush()
            .map_err(|e| SetupError::Credentials(e.to_string()))?;

        let mut username = String::new();
        io::stdin()
            .read_line(&mut username)
            .map_err(|e| SetupError::Credentials(e.to_string()))?;
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(SetupError::Credentials("username cannot be empty".into()));
        }

        let password = rpassword::prompt_password("Password: ")
            .map_err(|e| SetupError::Credentials(e.to_string()))?;
        if password.is_empty() {
            return Err(SetupError::Credentials("password cannot be empty".into()));
        }

        let enable_password = if self.prompt_enable {
            let entered = rpassword::prompt_password("Enable password (optional): ")
                .map_err(|e| SetupError::Credentials(e.to_string()))?;
            (!entered.is_empty()).then_some(entered)
        } else {
            None
        };

        Ok(Credentials {
            username,
            password,
            enable_password,
        })
    }
}

/// Look for `filename` in the working directory, then one and two levels up.
/// Returns the first hit, or the bare name if none exists yet.
fn find_credentials_file(filename: &str) -> PathBuf {
    for prefix in ["", "..", "../.."] {
        let candidate = if prefix.is_empty() {
            PathBuf::from(filename)
        } else {
            Path::new(prefix).join(filename)
        };
        if candidate.exists() {
            debug!("Found credentials file at {}", candidate.display());
            return candidate;
        }
    }
    PathBuf::from(filename)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use indoc::indoc;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_file_credentials_obfuscated_on_first_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CREDENTIALS_FILE);
        fs::write(
            &path,
            indoc! {r#"
                [credentials]
                username = netops
                password = Sup3rS3cret
                enable_password = extra
            "#},
        )
        .unwrap();

        let store = CredentialStore::with_file(&path);
        let credentials = store.get().unwrap();
        assert_eq!(credentials.username, "netops");
        assert_eq!(credentials.password, "Sup3rS3cret");
        assert_eq!(credentials.enable_password.as_deref(), Some("extra"));

        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(!rewritten.contains("Sup3rS3cret"));
        assert!(!rewritten.contains("= extra"));
        assert!(rewritten.matches(ENC_PREFIX).count() >= 2);

        // The obfuscated file still round-trips.
        let credentials = store.get().unwrap();
        assert_eq!(credentials.password, "Sup3rS3cret");
        assert_eq!(credentials.enable_password.as_deref(), Some("extra"));
    }

    #[test]
    fn test_incomplete_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CREDENTIALS_FILE);
        fs::write(&path, "[credentials]\nusername = lonely\n").unwrap();

        let store = CredentialStore::with_file(&path);
        assert!(store.load_from_file().unwrap().is_none());
    }
}
