use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// Longest session lifetime accepted from `AGORA_SESSION_DAYS`.
const MAX_SESSION_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub session_days: i64,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = var("AGORA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("AGORA_JWT_SECRET is unset or still a placeholder; set it in .env");
        }

        let db_path: PathBuf = var("AGORA_DB_PATH").unwrap_or_else(|| "agora.db".into()).into();
        let host = var("AGORA_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("AGORA_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("AGORA_PORT must be a port number")?;
        let session_days: i64 = var("AGORA_SESSION_DAYS")
            .unwrap_or_else(|| "30".into())
            .parse()
            .context("AGORA_SESSION_DAYS must be a whole number of days")?;
        if !(1..=MAX_SESSION_DAYS).contains(&session_days) {
            bail!("AGORA_SESSION_DAYS must be between 1 and {}", MAX_SESSION_DAYS);
        }

        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            session_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("AGORA_JWT_SECRET", "a-real-secret")]).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("agora.db"));
        assert_eq!(cfg.addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(cfg.session_days, 30);
    }

    #[test]
    fn overrides_apply() {
        let cfg = config(&[
            ("AGORA_JWT_SECRET", "a-real-secret"),
            ("AGORA_DB_PATH", "/var/lib/agora/forum.db"),
            ("AGORA_HOST", "127.0.0.1"),
            ("AGORA_PORT", "8080"),
            ("AGORA_SESSION_DAYS", "7"),
        ])
        .unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/var/lib/agora/forum.db"));
        assert_eq!(cfg.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(cfg.session_days, 7);
    }

    #[test]
    fn placeholder_or_missing_secret_is_refused() {
        assert!(config(&[]).is_err());
        assert!(config(&[("AGORA_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn bad_numbers_are_refused() {
        assert!(config(&[("AGORA_JWT_SECRET", "x"), ("AGORA_PORT", "http")]).is_err());
        assert!(config(&[("AGORA_JWT_SECRET", "x"), ("AGORA_SESSION_DAYS", "0")]).is_err());
    }

    #[test]
    fn session_days_are_capped() {
        let cfg = config(&[("AGORA_JWT_SECRET", "x"), ("AGORA_SESSION_DAYS", "3650")]).unwrap();
        assert_eq!(cfg.session_days, 3650);
        assert!(config(&[("AGORA_JWT_SECRET", "x"), ("AGORA_SESSION_DAYS", "3651")]).is_err());
        assert!(
            config(&[("AGORA_JWT_SECRET", "x"), ("AGORA_SESSION_DAYS", "1000000000000000")]).is_err()
        );
    }
}
