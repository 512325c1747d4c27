//! Process configuration read from the environment.
//!
//! # Environment Variables
//!
//! - `HOST`: bind address (default `0.0.0.0`)
//! - `PORT`: bind port (default `3000`)
//! - `STORAGE_MODE`: `mongodb` (default) | `in_memory`
//! - `DB_URL`: MongoDB connection string (required for `mongodb`)
//! - `DB_NAME`: MongoDB database name (required for `mongodb`)
//! - `REQUEST_TIMEOUT_SECS`: per-request deadline in seconds, at least 1 (default `30`)

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::repository::MongoConfig;
use crate::DEFAULT_REQUEST_TIMEOUT;

const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must be set when STORAGE_MODE=mongodb")]
    Missing(&'static str),
}

/// Where todos are kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Storage {
    InMemory,
    MongoDb(MongoConfig),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub addr: SocketAddr,
    pub storage: Storage,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let host: IpAddr = parse(&get, "HOST")?.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let port: u16 = parse(&get, "PORT")?.unwrap_or(DEFAULT_PORT);
        let request_timeout = match parse::<u64, _>(&get, "REQUEST_TIMEOUT_SECS")? {
            None => DEFAULT_REQUEST_TIMEOUT,
            Some(0) => {
                return Err(ConfigError::Invalid {
                    key: "REQUEST_TIMEOUT_SECS",
                    value: "0".to_string(),
                })
            }
            Some(secs) => Duration::from_secs(secs),
        };

        let mode = get("STORAGE_MODE").map(|mode| mode.to_lowercase());
        let storage = match mode.as_deref() {
            None | Some("mongodb") | Some("mongo") => Storage::MongoDb(MongoConfig {
                url: get("DB_URL").ok_or(ConfigError::Missing("DB_URL"))?,
                database: get("DB_NAME").ok_or(ConfigError::Missing("DB_NAME"))?,
            }),
            Some("in_memory") | Some("inmemory") | Some("memory") => Storage::InMemory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_MODE",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            addr: SocketAddr::new(host, port),
            storage,
            request_timeout,
        })
    }
}

fn parse<T, G>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value })
        })
        .transpose()
}
