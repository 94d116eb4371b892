//! Runtime configuration: defaults, option merging and loading.
//!
//! Options can be built in code with the `with_*` setters, parsed from YAML,
//! and finally overridden from the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `HTTP_LIFECYCLE_CACHE_PREFIX` | `cache.cache_prefix` |
//! | `HTTP_LIFECYCLE_DEFAULT_TTL_MS` | `cache.default_ttl` |
//! | `HTTP_LIFECYCLE_DEBUG` | `debug` |

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CACHE_PREFIX: &str = "axios-cache-";
/// Five minutes, in milliseconds.
pub const DEFAULT_TTL_MS: f64 = 300_000.0;

/// How a per-request TTL override falls back to the configured default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlFallback {
    /// Compatibility mode: absent, NaN and `0` all fall back to the default TTL.
    #[default]
    Falsy,
    /// Only an absent override falls back; an explicit `0` is honoured and the
    /// entry is stale as soon as it is written.
    Nullish,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Prepended verbatim to every request id to form the store key.
    pub cache_prefix: String,
    /// Milliseconds. `f64::INFINITY` means entries never expire.
    pub default_ttl: f64,
    pub debug: bool,
    pub ttl_fallback: TtlFallback,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            default_ttl: DEFAULT_TTL_MS,
            debug: false,
            ttl_fallback: TtlFallback::Falsy,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl_ms: f64) -> Self {
        self.default_ttl = ttl_ms;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_ttl_fallback(mut self, fallback: TtlFallback) -> Self {
        self.ttl_fallback = fallback;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_ttl.is_nan() || self.default_ttl < 0.0 {
            return Err(Error::configuration_with_context(
                "default TTL must be a non-negative number of milliseconds",
                ErrorContext::new()
                    .with_field_path("cache.default_ttl")
                    .with_details(format!("got {}", self.default_ttl)),
            ));
        }
        Ok(())
    }
}

/// Top-level settings shared by the tracker, the cache and the integration layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub debug: bool,
    pub cache: CacheConfig,
}

impl LifecycleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("failed to read config: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Apply `HTTP_LIFECYCLE_*` environment variables on top of the current values.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(prefix) = lookup("HTTP_LIFECYCLE_CACHE_PREFIX") {
            self.cache.cache_prefix = prefix;
        }
        if let Some(raw) = lookup("HTTP_LIFECYCLE_DEFAULT_TTL_MS") {
            self.cache.default_ttl = raw.trim().parse::<f64>().map_err(|_| {
                Error::configuration_with_context(
                    "invalid default TTL",
                    ErrorContext::new()
                        .with_field_path("HTTP_LIFECYCLE_DEFAULT_TTL_MS")
                        .with_details(raw.clone()),
                )
            })?;
        }
        if let Some(raw) = lookup("HTTP_LIFECYCLE_DEBUG") {
            self.debug = matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.validate()
    }

    /// Cache options with the global debug switch merged in.
    pub fn cache_config(&self) -> CacheConfig {
        let mut cache = self.cache.clone();
        cache.debug = cache.debug || self.debug;
        cache
    }
}
