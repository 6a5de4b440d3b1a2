//! Settings read from the environment.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::IndexingError;
use search_indexer_pipeline::PipelineConfig;
use search_indexer_repository::config::DEFAULT_OPENSEARCH_URL;

/// Everything the binary needs to start a session.
#[derive(Debug, Clone)]
pub struct IndexerSettings {
    pub opensearch_url: String,
    pub opensearch_timeout: Option<Duration>,
    /// JSON file with the entity mappings.
    pub mapping_path: PathBuf,
    /// JSON-lines file with one resource per line.
    pub source_path: PathBuf,
    /// Drop and recreate every mapped index before indexing.
    pub reset_indices: bool,
    pub pipeline: PipelineConfig,
}

impl IndexerSettings {
    /// Read settings from process environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `OPENSEARCH_TIMEOUT_MS`: Transport request timeout
    /// - `INDEXER_MAPPING_PATH`: Entity mapping file (required)
    /// - `INDEXER_SOURCE_PATH`: JSON-lines resource file (required)
    /// - `INDEXER_RESET_INDICES`: Recreate indices before indexing (default: false)
    /// - `INDEXER_<FIELD>`: Override any pipeline setting, e.g.
    ///   `INDEXER_MAX_BATCH_COUNT=200`
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let opensearch_url =
            var("OPENSEARCH_URL").unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string());
        let opensearch_timeout =
            parse(&var, "OPENSEARCH_TIMEOUT_MS")?.map(Duration::from_millis);

        let mapping_path = var("INDEXER_MAPPING_PATH")
            .map(PathBuf::from)
            .ok_or_else(|| IndexingError::config("INDEXER_MAPPING_PATH is required"))?;
        let source_path = var("INDEXER_SOURCE_PATH")
            .map(PathBuf::from)
            .ok_or_else(|| IndexingError::config("INDEXER_SOURCE_PATH is required"))?;
        let reset_indices = parse_bool(&var, "INDEXER_RESET_INDICES")?.unwrap_or(false);

        let mut pipeline = PipelineConfig::default();
        override_with(&mut pipeline.max_batch_count, parse(&var, "INDEXER_MAX_BATCH_COUNT")?);
        override_with(&mut pipeline.max_batch_bytes, parse(&var, "INDEXER_MAX_BATCH_BYTES")?);
        override_with(
            &mut pipeline.max_concurrent_batches,
            parse(&var, "INDEXER_MAX_CONCURRENT_BATCHES")?,
        );
        override_with(
            &mut pipeline.retry_base_delay_ms,
            parse(&var, "INDEXER_RETRY_BASE_DELAY_MS")?,
        );
        override_with(
            &mut pipeline.retry_max_delay_ms,
            parse(&var, "INDEXER_RETRY_MAX_DELAY_MS")?,
        );
        override_with(&mut pipeline.retry_jitter, parse(&var, "INDEXER_RETRY_JITTER")?);
        override_with(&mut pipeline.max_attempts, parse(&var, "INDEXER_MAX_ATTEMPTS")?);
        if let Some(raw) = var("INDEXER_FATAL_FAILURE_RATE_THRESHOLD") {
            pipeline.fatal_failure_rate_threshold = if raw.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse_value("INDEXER_FATAL_FAILURE_RATE_THRESHOLD", &raw)?)
            };
        }
        override_with(
            &mut pipeline.fatal_failure_min_samples,
            parse(&var, "INDEXER_FATAL_FAILURE_MIN_SAMPLES")?,
        );
        override_with(
            &mut pipeline.idle_flush_timeout_ms,
            parse(&var, "INDEXER_IDLE_FLUSH_TIMEOUT_MS")?,
        );
        override_with(
            &mut pipeline.submission_timeout_ms,
            parse(&var, "INDEXER_SUBMISSION_TIMEOUT_MS")?,
        );
        if let Some(timeout) = parse(&var, "INDEXER_SESSION_TIMEOUT_MS")? {
            pipeline.session_timeout_ms = Some(timeout);
        }
        override_with(
            &mut pipeline.channel_buffer_size,
            parse(&var, "INDEXER_CHANNEL_BUFFER_SIZE")?,
        );
        override_with(&mut pipeline.refresh, parse_bool(&var, "INDEXER_REFRESH")?);

        pipeline.validate()?;

        Ok(Self {
            opensearch_url,
            opensearch_timeout,
            mapping_path,
            source_path,
            reset_indices,
            pipeline,
        })
    }
}

fn override_with<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>, IndexingError>
where
    T: FromStr,
    T::Err: Display,
{
    var(name).map(|raw| parse_value(name, &raw)).transpose()
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T, IndexingError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| IndexingError::config(format!("Invalid {}='{}': {}", name, raw, e)))
}

fn parse_bool(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<bool>, IndexingError> {
    match var(name).map(|raw| raw.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(raw) => match raw.as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(IndexingError::config(format!(
                "Invalid {}='{}': expected a boolean",
                name, raw
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("INDEXER_MAPPING_PATH", "mappings.json"),
        ("INDEXER_SOURCE_PATH", "resources.jsonl"),
    ];

    #[test]
    fn test_defaults_with_required_paths() {
        let settings = IndexerSettings::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(settings.opensearch_url, DEFAULT_OPENSEARCH_URL);
        assert_eq!(settings.mapping_path, PathBuf::from("mappings.json"));
        assert!(!settings.reset_indices);
        assert_eq!(settings.pipeline.max_batch_count, 500);
    }

    #[test]
    fn test_missing_required_path() {
        let result = IndexerSettings::from_lookup(lookup(&[("INDEXER_SOURCE_PATH", "x")]));
        assert!(matches!(result, Err(IndexingError::ConfigError(msg)) if msg.contains("INDEXER_MAPPING_PATH")));
    }

    #[test]
    fn test_pipeline_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("INDEXER_MAX_BATCH_COUNT", "50"),
            ("INDEXER_MAX_CONCURRENT_BATCHES", "8"),
            ("INDEXER_FATAL_FAILURE_RATE_THRESHOLD", "none"),
            ("INDEXER_SESSION_TIMEOUT_MS", "60000"),
            ("INDEXER_REFRESH", "yes"),
            ("INDEXER_RESET_INDICES", "true"),
            ("OPENSEARCH_TIMEOUT_MS", "2500"),
        ]);

        let settings = IndexerSettings::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(settings.pipeline.max_batch_count, 50);
        assert_eq!(settings.pipeline.max_concurrent_batches, 8);
        assert_eq!(settings.pipeline.fatal_failure_rate_threshold, None);
        assert_eq!(settings.pipeline.session_timeout_ms, Some(60_000));
        assert!(settings.pipeline.refresh);
        assert!(settings.reset_indices);
        assert_eq!(settings.opensearch_timeout, Some(Duration::from_millis(2_500)));
    }

    #[test]
    fn test_invalid_number_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("INDEXER_MAX_ATTEMPTS", "lots"));
        let result = IndexerSettings::from_lookup(lookup(&vars));
        assert!(matches!(result, Err(IndexingError::ConfigError(msg)) if msg.contains("INDEXER_MAX_ATTEMPTS")));
    }

    #[test]
    fn test_invalid_pipeline_config_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("INDEXER_MAX_BATCH_COUNT", "0"));
        assert!(matches!(
            IndexerSettings::from_lookup(lookup(&vars)),
            Err(IndexingError::PipelineError(_))
        ));
    }
}
