//! Service configuration resolved from the environment.
//!
//! Command-line flags override these values in the binaries.

use std::path::PathBuf;
use std::str::FromStr;

use crate::adapters::BundleOptions;

pub const BUNDLE_DIR_ENV: &str = "GLUCOGUARD_BUNDLE_DIR";
pub const REQUIRE_SIGNED_ENV: &str = "GLUCOGUARD_REQUIRE_SIGNED_BUNDLE";
pub const PUBKEY_FILE_ENV: &str = "GLUCOGUARD_BUNDLE_PUBKEY_B64_FILE";
pub const LOG_MODE_ENV: &str = "GLUCOGUARD_LOG_MODE";
pub const LOG_FILE_ENV: &str = "GLUCOGUARD_LOG_FILE";

pub const DEFAULT_BUNDLE_DIR: &str = "models";
pub const DEFAULT_LOG_FILE: &str = "glucoguard.log";

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogMode {
    /// stderr, keeping stdout for responses
    #[default]
    Auto,
    Stdout,
    Stderr,
    File,
}

impl FromStr for LogMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            "file" => Ok(Self::File),
            other => Err(format!("unknown log mode {other:?}")),
        }
    }
}

/// Truthy values accepted for boolean switches.
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bundle_dir: PathBuf,
    pub require_signature: bool,
    pub pubkey_file: Option<PathBuf>,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bundle_dir: PathBuf::from(DEFAULT_BUNDLE_DIR),
            require_signature: false,
            pubkey_file: None,
            log_mode: LogMode::Auto,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl ServiceConfig {
    /// Resolve from process environment variables.
    ///
    /// See [`ServiceConfig::from_lookup`] for the returned warnings.
    #[must_use]
    pub fn from_env() -> (Self, Vec<String>) {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve using an arbitrary variable lookup.
    ///
    /// Unset or empty variables keep their defaults. An unrecognised log
    /// mode falls back to `auto`. Configuration is resolved before logging
    /// exists, so such problems are returned for the caller to log once the
    /// subscriber is installed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> (Self, Vec<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        let mut warnings = Vec::new();

        let log_mode = match get(LOG_MODE_ENV) {
            Some(v) => v.parse().unwrap_or_else(|e| {
                warnings.push(format!("{LOG_MODE_ENV}: {e}; using auto"));
                LogMode::Auto
            }),
            None => defaults.log_mode,
        };

        let config = Self {
            bundle_dir: get(BUNDLE_DIR_ENV).map_or(defaults.bundle_dir, PathBuf::from),
            require_signature: get(REQUIRE_SIGNED_ENV).is_some_and(|v| parse_bool(&v)),
            pubkey_file: get(PUBKEY_FILE_ENV).map(PathBuf::from),
            log_mode,
            log_file: get(LOG_FILE_ENV).map_or(defaults.log_file, PathBuf::from),
        };
        (config, warnings)
    }

    #[must_use]
    pub fn bundle_options(&self) -> BundleOptions {
        BundleOptions {
            require_signature: self.require_signature,
            pubkey_file: self.pubkey_file.clone(),
        }
    }
}
