use std::{env, net::SocketAddr, path::PathBuf};

use rand::RngCore;

/// One year.
pub const SESSION_TTL_MAX_MINUTES: i64 = 525_600;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Runtime settings read from the environment (after `.env` is loaded).
#[derive(Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub db_url: Option<String>,
    pub admin_secret: Option<String>,
    pub session_key: Vec<u8>,
    pub session_ttl_minutes: i64,
    pub cookie_secure: bool,
    pub upload_dir: PathBuf,
    pub upload_url_prefix: String,
    pub upload_max_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = parse_var("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

        let admin_secret = non_empty("ADMIN_SECRET").map(|s| s.trim().to_string());
        if admin_secret.is_none() {
            tracing::warn!("ADMIN_SECRET is not set; admin routes will reject every request");
        }

        let session_key = match non_empty("SESSION_KEY") {
            Some(key) => key.into_bytes(),
            None => random_key(),
        };

        Ok(Self {
            bind_addr,
            db_url: non_empty("DB_URL"),
            admin_secret,
            session_key,
            session_ttl_minutes: session_ttl(parse_var("SESSION_TTL_MINUTES", 60)?)?,
            cookie_secure: parse_var("COOKIE_SECURE", false)?,
            upload_dir: non_empty("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public/uploads")),
            upload_url_prefix: non_empty("UPLOAD_URL_PREFIX")
                .map(|p| p.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "/uploads".to_string()),
            upload_max_bytes: parse_var("UPLOAD_MAX_BYTES", 20 * 1024 * 1024)?,
        })
    }

    /// Settings for tests and local tooling: in-memory store, fixed secret.
    pub fn for_tests(admin_secret: &str, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            db_url: None,
            admin_secret: Some(admin_secret.trim().to_string()),
            session_key: random_key(),
            session_ttl_minutes: 60,
            cookie_secure: false,
            upload_dir: upload_dir.into(),
            upload_url_prefix: "/uploads".to_string(),
            upload_max_bytes: 20 * 1024 * 1024,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("db_url", &self.db_url.as_ref().map(|_| "<set>"))
            .field("admin_secret", &self.admin_secret.as_ref().map(|_| "<set>"))
            .field("session_ttl_minutes", &self.session_ttl_minutes)
            .field("cookie_secure", &self.cookie_secure)
            .field("upload_dir", &self.upload_dir)
            .field("upload_url_prefix", &self.upload_url_prefix)
            .field("upload_max_bytes", &self.upload_max_bytes)
            .finish()
    }
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn session_ttl(minutes: i64) -> Result<i64, ConfigError> {
    if !(1..=SESSION_TTL_MAX_MINUTES).contains(&minutes) {
        return Err(ConfigError::Invalid {
            var: "SESSION_TTL_MINUTES",
            reason: format!("must be between 1 and {}, got {}", SESSION_TTL_MAX_MINUTES, minutes),
        });
    }
    Ok(minutes)
}

fn random_key() -> Vec<u8> {
    let mut key = vec![0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}
