use serde::Deserialize;
use std::{net::IpAddr, num::NonZeroU32, path::PathBuf, time::Duration};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ConfigError {
    #[error("POSTS_PER_PAGE must be at least 1")]
    ZeroPageSize,
}

/// Process configuration, read from the environment (and an optional `.env` file).
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    pub database_url: String,
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: u32,
    #[serde(default = "default_index_cache_seconds")]
    pub index_cache_seconds: u64,
    #[serde(default = "default_login_url")]
    pub login_url: String,
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_posts_per_page() -> u32 {
    10
}

fn default_index_cache_seconds() -> u64 {
    20
}

fn default_login_url() -> String {
    "/auth/login/".to_owned()
}

/// The part of the configuration request handlers see.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Settings {
    pub posts_per_page: NonZeroU32,
    /// Where unauthenticated visitors of protected pages are sent.
    pub login_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            posts_per_page: pinnwand_common::pagination::DEFAULT_PAGE_SIZE,
            login_url: default_login_url(),
        }
    }
}

impl Env {
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        Ok(Settings {
            posts_per_page: NonZeroU32::new(self.posts_per_page)
                .ok_or(ConfigError::ZeroPageSize)?,
            login_url: self.login_url.clone(),
        })
    }

    #[must_use]
    pub fn index_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.index_cache_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, Env};

    fn env(vars: &[(&str, &str)]) -> Env {
        envy::from_iter(vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))).unwrap()
    }

    #[test]
    fn optional_values_have_defaults() {
        let env = env(&[
            ("SERVER_ADDRESS", "127.0.0.1"),
            ("SERVER_PORT", "8000"),
            ("DATABASE_URL", "sqlite://pinnwand.db"),
        ]);

        assert_eq!(env.posts_per_page, 10);
        assert_eq!(env.index_cache_ttl().as_secs(), 20);
        assert_eq!(env.settings().unwrap().login_url, "/auth/login/");
        assert_eq!(env.media_root.to_str(), Some("media"));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let env = env(&[
            ("SERVER_ADDRESS", "::1"),
            ("SERVER_PORT", "8000"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("POSTS_PER_PAGE", "0"),
        ]);

        assert_eq!(env.settings().unwrap_err(), ConfigError::ZeroPageSize);
    }
}
