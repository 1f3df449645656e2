use std::path::PathBuf;

use anyhow::{Context, Result};

/// Secrets that ship in examples and must never sign real sessions.
pub const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// Browser origins of the local development front-ends.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:8080",
    "http://127.0.0.1:8080",
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub cors_origins: Vec<String>,
    pub legacy_email_header: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port: u16 = var("SERENE_PORT", "8000")
            .parse()
            .context("SERENE_PORT must be a port number")?;
        let token_ttl_hours: i64 = var("SERENE_TOKEN_TTL_HOURS", "720")
            .parse()
            .context("SERENE_TOKEN_TTL_HOURS must be an integer")?;
        if token_ttl_hours <= 0 {
            anyhow::bail!("SERENE_TOKEN_TTL_HOURS must be positive");
        }

        let cors_origins = match lookup("SERENE_CORS_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        Ok(Self {
            host: var("SERENE_HOST", "0.0.0.0"),
            port,
            db_path: var("SERENE_DB_PATH", "serene.db").into(),
            jwt_secret: var("SERENE_JWT_SECRET", "dev-secret-change-me"),
            token_ttl_hours,
            cors_origins,
            legacy_email_header: parse_flag(lookup("SERENE_LEGACY_EMAIL_HEADER").as_deref()),
        })
    }

    pub fn has_placeholder_secret(&self) -> bool {
        self.jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.db_path, PathBuf::from("serene.db"));
        assert_eq!(config.token_ttl_hours, 720);
        assert_eq!(config.cors_origins.len(), DEFAULT_CORS_ORIGINS.len());
        assert!(!config.legacy_email_header);
        assert!(config.has_placeholder_secret());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("SERENE_PORT", "9100"),
            ("SERENE_JWT_SECRET", "a-real-secret"),
            ("SERENE_CORS_ORIGINS", "https://app.example.com, ,https://admin.example.com"),
            ("SERENE_LEGACY_EMAIL_HEADER", "True"),
        ])
        .unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(
            config.cors_origins,
            vec!["https://app.example.com", "https://admin.example.com"]
        );
        assert!(config.legacy_email_header);
        assert!(!config.has_placeholder_secret());
    }

    #[test]
    fn invalid_numbers_are_errors() {
        assert!(config_from(&[("SERENE_PORT", "eighty")]).is_err());
        assert!(config_from(&[("SERENE_TOKEN_TTL_HOURS", "0")]).is_err());
    }
}
