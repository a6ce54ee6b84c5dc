//! Environment-derived configuration.
//!
//! The job is event-triggered, so there is no config file or CLI surface:
//! everything comes from the environment of the invocation. Validation is
//! strict and happens once, before any object is opened, so a misconfigured
//! deployment fails fast instead of half-processing a batch.

use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MAX_INFLIGHT_WRITES: usize = 64;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    /// Base name; the monthly suffix is appended per document.
    pub index: String,
    pub doctype: String,
    /// Region label carried for deployment parity; the transport itself is
    /// fronted by the deployment, not signed here.
    pub region: Option<String>,
    /// UTC offset in hours applied to event times and index naming. May be
    /// fractional; must be finite.
    pub time_offset: f64,
    pub max_inflight_writes: usize,
    pub http_timeout: Duration,
}

/// Where log objects are fetched from. Exactly one mode is configured.
#[derive(Debug, Clone)]
pub enum SourceConfig {
    /// Path-style object-store GET against `<endpoint>/<bucket>/<key>`.
    Http { endpoint: String },
    /// Local tree laid out as `<root>/<bucket>/<key>`.
    Fs { root: PathBuf },
}

/// Where documents are written. Exactly one mode is configured.
#[derive(Debug, Clone)]
pub enum SinkConfig {
    /// Document POST against the search-store endpoint.
    Http {
        endpoint: String,
        username: Option<String>,
        password: Option<String>,
    },
    /// One file per document under a local directory.
    Fs { output_dir: PathBuf },
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from a variable lookup. Split out from
    /// [`Config::from_env`] so validation is testable without mutating the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |name: &str| {
            get(name).ok_or_else(|| anyhow!("required environment variable {name} is not set"))
        };

        let sink = match (get("ELASTIC_HOST"), get("OUTPUT_DIR")) {
            (Some(endpoint), None) => SinkConfig::Http {
                endpoint,
                username: get("ES_USERNAME"),
                password: get("ES_PASSWORD"),
            },
            (None, Some(dir)) => SinkConfig::Fs {
                output_dir: PathBuf::from(dir),
            },
            (Some(_), Some(_)) => {
                bail!("sink configuration must set only one of ELASTIC_HOST or OUTPUT_DIR")
            }
            (None, None) => {
                bail!("sink configuration requires either ELASTIC_HOST or OUTPUT_DIR")
            }
        };

        let source = match (get("SOURCE_ENDPOINT"), get("SOURCE_DIR")) {
            (Some(endpoint), None) => SourceConfig::Http { endpoint },
            (None, Some(dir)) => SourceConfig::Fs {
                root: PathBuf::from(dir),
            },
            (Some(_), Some(_)) => {
                bail!("source configuration must set only one of SOURCE_ENDPOINT or SOURCE_DIR")
            }
            (None, None) => {
                bail!("source configuration requires either SOURCE_ENDPOINT or SOURCE_DIR")
            }
        };

        let time_offset = require("TIME_OFFSET")?
            .parse::<f64>()
            .context("TIME_OFFSET must be a signed number of hours")?;
        if !time_offset.is_finite() {
            bail!("TIME_OFFSET must be finite, got {time_offset}");
        }

        let max_inflight_writes = match get("MAX_INFLIGHT_WRITES") {
            Some(raw) => raw
                .parse::<usize>()
                .context("MAX_INFLIGHT_WRITES must be a positive integer")?,
            None => DEFAULT_MAX_INFLIGHT_WRITES,
        };
        if max_inflight_writes == 0 {
            bail!("MAX_INFLIGHT_WRITES must be at least 1");
        }

        let http_timeout_secs = match get("HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("HTTP_TIMEOUT_SECS must be an integer number of seconds")?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            source,
            sink,
            index: require("INDEX_NAME")?,
            doctype: require("DOC_TYPE")?,
            region: get("REGION"),
            time_offset,
            max_inflight_writes,
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |name| map.get(name).map(|v| v.to_string())
    }

    const BASE: &[(&str, &str)] = &[
        ("ELASTIC_HOST", "https://search.example.com"),
        ("SOURCE_DIR", "/var/spool/logs"),
        ("INDEX_NAME", "alb-logs"),
        ("DOC_TYPE", "accesslog"),
        ("TIME_OFFSET", "9"),
    ];

    #[test]
    fn loads_a_minimal_configuration() {
        let config = Config::from_lookup(lookup(BASE)).unwrap();

        assert!(matches!(config.sink, SinkConfig::Http { .. }));
        assert!(matches!(config.source, SourceConfig::Fs { .. }));
        assert_eq!(config.index, "alb-logs");
        assert_eq!(config.doctype, "accesslog");
        assert_eq!(config.time_offset, 9.0);
        assert_eq!(config.max_inflight_writes, 64);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn rejects_both_sink_modes_at_once() {
        let mut vars = BASE.to_vec();
        vars.push(("OUTPUT_DIR", "/tmp/docs"));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("only one of ELASTIC_HOST"));
    }

    #[test]
    fn rejects_missing_source_mode() {
        let vars: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(name, _)| *name != "SOURCE_DIR")
            .collect();
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("SOURCE_ENDPOINT or SOURCE_DIR"));
    }

    #[test]
    fn rejects_missing_time_offset() {
        let vars: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(name, _)| *name != "TIME_OFFSET")
            .collect();
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn accepts_fractional_time_offset() {
        let mut vars: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(name, _)| *name != "TIME_OFFSET")
            .collect();
        vars.push(("TIME_OFFSET", "-9.5"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.time_offset, -9.5);
    }

    #[test]
    fn rejects_non_numeric_time_offset() {
        let mut vars: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(name, _)| *name != "TIME_OFFSET")
            .collect();
        vars.push(("TIME_OFFSET", "KST"));
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn rejects_zero_write_concurrency() {
        let mut vars = BASE.to_vec();
        vars.push(("MAX_INFLIGHT_WRITES", "0"));
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn blank_values_are_treated_as_unset() {
        let mut vars: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(name, _)| *name != "ELASTIC_HOST")
            .collect();
        vars.push(("ELASTIC_HOST", "   "));
        vars.push(("OUTPUT_DIR", "/tmp/docs"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert!(matches!(config.sink, SinkConfig::Fs { .. }));
    }
}
