use anyhow::{Result, anyhow, bail};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub http: Http,
    pub log: Log,
    pub storage: Storage,
}

#[derive(Clone, Deserialize)]
pub struct Auth {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub max_token_attempts: u32,
    pub secure_cookie: bool,
}

impl Auth {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }
}

// Hand-written so the secret never reaches the logs.
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("max_token_attempts", &self.max_token_attempts)
            .field("secure_cookie", &self.secure_cookie)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Http {
    pub address: String,
    pub tls: Option<Tls>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tls {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    pub backend: String, // "memory" or "mysql"
    pub database_url: Option<String>,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Environment overrides use this prefix, e.g. `NOTEBOOK__AUTH__SECRET`.
const ENV_PREFIX: &str = "NOTEBOOK";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.validate()?;
    Ok(settings)
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.auth.secret.trim().is_empty() {
            bail!("auth.secret is missing or empty");
        }
        if self.auth.max_token_attempts == 0 {
            bail!("auth.max_token_attempts must be at least 1");
        }
        if self.auth.access_ttl_secs == 0 || self.auth.refresh_ttl_secs == 0 {
            bail!("auth token TTLs must be positive");
        }
        if self.storage.backend == "mysql" && self.storage.database_url.is_none() {
            bail!("storage.database_url is required for the mysql backend");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            auth: Auth {
                secret: "s3cret".to_string(),
                issuer: "notebook.auth".to_string(),
                audience: "notebook-client".to_string(),
                access_ttl_secs: 900,
                refresh_ttl_secs: 2_592_000,
                max_token_attempts: 3,
                secure_cookie: false,
            },
            http: Http {
                address: "127.0.0.1:8080".to_string(),
                tls: None,
            },
            log: Log {
                filter: "info".to_string(),
            },
            storage: Storage {
                backend: "memory".to_string(),
                database_url: None,
            },
        }
    }

    #[test]
    fn accepts_complete_settings() {
        assert!(settings().validate().is_ok());
    }

    #[test]
    fn rejects_empty_secret_and_zero_attempts() {
        let mut s = settings();
        s.auth.secret = "  ".to_string();
        assert!(s.validate().is_err());

        let mut s = settings();
        s.auth.max_token_attempts = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn mysql_requires_database_url() {
        let mut s = settings();
        s.storage.backend = "mysql".to_string();
        assert!(s.validate().is_err());
    }

    #[test]
    fn debug_output_hides_secret() {
        let rendered = format!("{:?}", settings());
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("settings/does-not-exist.toml")).is_err());
    }
}
