// Configuration constants and environment helpers
use tracing::warn;

use crate::tenant::{Tenant, DEFAULT_API_VERSION};

// Server configuration
pub const SERVER_HOST: [u8; 4] = [0, 0, 0, 0];
pub const SERVER_PORT: u16 = 3000;

pub const SOURCE_STORE_NAME: &str = "SOURCE_STORE_NAME";
pub const SOURCE_STORE_TOKEN: &str = "SOURCE_STORE_TOKEN";
pub const TARGET_STORE_NAME: &str = "TARGET_STORE_NAME";
pub const TARGET_STORE_TOKEN: &str = "TARGET_STORE_TOKEN";
pub const API_VERSION: &str = "SHOPIFY_API_VERSION";
pub const PORT: &str = "PORT";
pub const MIGRATION_CONCURRENCY: &str = "MIGRATION_CONCURRENCY";
pub const DEDUPLICATE_RUNS: &str = "DEDUPLICATE_RUNS";

/// Everything the process reads from its environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub source: Tenant,
    pub target: Tenant,
    pub api_version: String,
    pub port: u16,
    pub concurrency: usize,
    pub deduplicate_runs: bool,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    ///
    /// Missing credentials are not an error here; the remote API rejects the
    /// first request instead. Unparseable numbers fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| match lookup(key) {
            Some(value) if !value.is_empty() => value,
            _ => {
                warn!("{} is not set", key);
                String::new()
            }
        };

        let source = Tenant::new(required(SOURCE_STORE_NAME), required(SOURCE_STORE_TOKEN));
        let target = Tenant::new(required(TARGET_STORE_NAME), required(TARGET_STORE_TOKEN));

        let api_version = lookup(API_VERSION)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        Self {
            source,
            target,
            api_version,
            port: parse_or(&lookup, PORT, SERVER_PORT),
            concurrency: parse_or(&lookup, MIGRATION_CONCURRENCY, 1usize).max(1),
            deduplicate_runs: lookup(DEDUPLICATE_RUNS)
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
        }
    }
}

fn parse_or<F, V>(lookup: &F, key: &str, default: V) -> V
where
    F: Fn(&str) -> Option<String>,
    V: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}
