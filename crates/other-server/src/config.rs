use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use tracing::warn;

/// Secrets that are only acceptable for local development.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEFAULT_SECRET: &str = "dev-secret-change-me";

/// Accepted range for `OTHER_TOKEN_TTL_DAYS`.
const TOKEN_TTL_DAYS: std::ops::RangeInclusive<i64> = 1..=3650;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub avatar_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Missing keys fall back to
    /// defaults; unparseable numbers are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("OTHER_JWT_SECRET", DEFAULT_SECRET);
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            warn!("OTHER_JWT_SECRET is unset or still a placeholder; do not run like this in production");
        }

        let token_ttl_days = parse("OTHER_TOKEN_TTL_DAYS", &get("OTHER_TOKEN_TTL_DAYS", "30"))?;
        if !TOKEN_TTL_DAYS.contains(&token_ttl_days) {
            bail!(
                "OTHER_TOKEN_TTL_DAYS must be between {} and {}, got {}",
                TOKEN_TTL_DAYS.start(),
                TOKEN_TTL_DAYS.end(),
                token_ttl_days
            );
        }

        Ok(Self {
            host: get("OTHER_HOST", "0.0.0.0"),
            port: parse("OTHER_PORT", &get("OTHER_PORT", "3000"))?,
            db_path: get("OTHER_DB_PATH", "other.db").into(),
            jwt_secret,
            token_ttl_days,
            avatar_dir: get("OTHER_AVATAR_DIR", "./public/img/users").into(),
        })
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e: T::Err| anyhow::anyhow!("{}", e))
        .with_context(|| format!("invalid {} value {:?}", key, value))
}
