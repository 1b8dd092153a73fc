//! # Config - tool settings from the environment
//!
//! ```text
//! TABLET_DIR               directory holding tablet files  (default: "data")
//! TABLET_BLOCK_SIZE        target block size in bytes      (default: 4096)
//! TABLET_COMPRESSION       "none" or "snappy"              (default: "none")
//! TABLET_RESTART_INTERVAL  entries between restart points  (default: 16)
//! ```
//!
//! Unset variables fall back to their defaults. A variable that is set but
//! does not parse is an error rather than a silent default.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use tablet::{Compression, WriterOptions, DEFAULT_BLOCK_SIZE, DEFAULT_KEY_RESTART_INTERVAL};

pub const ENV_DIR: &str = "TABLET_DIR";
pub const ENV_BLOCK_SIZE: &str = "TABLET_BLOCK_SIZE";
pub const ENV_COMPRESSION: &str = "TABLET_COMPRESSION";
pub const ENV_RESTART_INTERVAL: &str = "TABLET_RESTART_INTERVAL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub dir: PathBuf,
    pub block_size: usize,
    pub compression: Compression,
    pub key_restart_interval: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            block_size: DEFAULT_BLOCK_SIZE,
            compression: Compression::None,
            key_restart_interval: DEFAULT_KEY_RESTART_INTERVAL,
        }
    }
}

impl Config {
    /// Loads settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            dir: lookup(ENV_DIR).map(PathBuf::from).unwrap_or(defaults.dir),
            block_size: parse_var(&lookup, ENV_BLOCK_SIZE)?.unwrap_or(defaults.block_size),
            compression: parse_var(&lookup, ENV_COMPRESSION)?.unwrap_or(defaults.compression),
            key_restart_interval: parse_var(&lookup, ENV_RESTART_INTERVAL)?
                .unwrap_or(defaults.key_restart_interval),
        })
    }

    #[must_use]
    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions::default()
            .with_block_size(self.block_size)
            .with_compression(self.compression)
            .with_key_restart_interval(self.key_restart_interval)
    }

    /// Path of the tablet called `name` inside [`Config::dir`].
    #[must_use]
    pub fn tablet_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.tab", name))
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => {
            let v = raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("invalid {}={:?}", key, raw))?;
            tracing::debug!(key, value = %raw, "config override");
            Ok(Some(v))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.writer_options(), WriterOptions::default());
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = Config::from_lookup(lookup_from(&[
            (ENV_DIR, "/tmp/tabs"),
            (ENV_BLOCK_SIZE, "1024"),
            (ENV_COMPRESSION, "snappy"),
            (ENV_RESTART_INTERVAL, " 8 "),
        ]))
        .unwrap();
        assert_eq!(cfg.dir, PathBuf::from("/tmp/tabs"));
        let opts = cfg.writer_options();
        assert_eq!(opts.block_size, 1024);
        assert_eq!(opts.compression, Compression::Snappy);
        assert_eq!(opts.key_restart_interval, 8);
        assert_eq!(cfg.tablet_path("t1"), PathBuf::from("/tmp/tabs/t1.tab"));
    }

    #[test]
    fn bad_values_fail_loudly() {
        let err = Config::from_lookup(lookup_from(&[(ENV_BLOCK_SIZE, "big")])).unwrap_err();
        assert!(err.to_string().contains(ENV_BLOCK_SIZE));

        let err = Config::from_lookup(lookup_from(&[(ENV_COMPRESSION, "zstd")])).unwrap_err();
        assert!(err.to_string().contains(ENV_COMPRESSION));
    }
}
