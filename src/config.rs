//! Run configuration.
//!
//! One [`EngineConfig`] is built per run and moved into the engine; nothing is
//! read from global state afterwards.

use camino::Utf8PathBuf;

use crate::errors::ConfigError;
use crate::options::SnapshotOptions;
use crate::types::Threshold;

/// Environment variable naming the fixture root
pub const FIXTURE_DIR_VAR: &str = "SNAPDIFF_FIXTURE_DIR";
/// Environment variable naming the report/target root
pub const TARGET_DIR_VAR: &str = "SNAPDIFF_TARGET_DIR";
/// Optional environment variable overriding the default threshold
pub const THRESHOLD_VAR: &str = "SNAPDIFF_THRESHOLD";

/// Directories and defaults for one run
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Accepted reference images, kept across runs
    pub fixture_root: Utf8PathBuf,
    /// Screenshots, fixture copies and diffs of this run
    pub target_root: Utf8PathBuf,
    /// Options used when a request does not bring its own
    pub default_options: SnapshotOptions,
}

impl EngineConfig {
    pub fn new(fixture_root: impl Into<Utf8PathBuf>, target_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            fixture_root: fixture_root.into(),
            target_root: target_root.into(),
            default_options: SnapshotOptions::default(),
        }
    }

    pub fn with_default_options(mut self, options: SnapshotOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Read the roots (and optionally the threshold) from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name))
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Result<String, std::env::VarError>,
    {
        let var = |name: &'static str| -> Result<Option<String>, ConfigError> {
            match lookup(name) {
                Ok(value) => Ok(Some(value)),
                Err(std::env::VarError::NotPresent) => Ok(None),
                Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode { name }),
            }
        };

        let fixture_root = var(FIXTURE_DIR_VAR)?.ok_or(ConfigError::MissingVar {
            name: FIXTURE_DIR_VAR,
        })?;
        let target_root = var(TARGET_DIR_VAR)?.ok_or(ConfigError::MissingVar {
            name: TARGET_DIR_VAR,
        })?;

        let mut config = Self::new(fixture_root, target_root);
        if let Some(raw) = var(THRESHOLD_VAR)? {
            config.default_options.threshold = parse_threshold(&raw)?;
        }
        Ok(config)
    }
}

fn parse_threshold(raw: &str) -> Result<Threshold, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidThreshold {
        value: raw.to_string(),
        reason,
    };
    let value: f64 = raw.trim().parse().map_err(|e| invalid(format!("{e}")))?;
    Threshold::try_new(value).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::env::VarError;

    fn lookup(
        vars: &[(&'static str, &str)],
    ) -> impl Fn(&'static str) -> Result<String, VarError> {
        let vars: HashMap<&'static str, String> =
            vars.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |name| vars.get(name).cloned().ok_or(VarError::NotPresent)
    }

    #[test]
    fn reads_both_roots() {
        let config = EngineConfig::from_lookup(lookup(&[
            (FIXTURE_DIR_VAR, "test/fixtures"),
            (TARGET_DIR_VAR, "target/ui"),
        ]))
        .unwrap();
        assert_eq!(config.fixture_root, "test/fixtures");
        assert_eq!(config.target_root, "target/ui");
        assert_eq!(config.default_options, SnapshotOptions::default());
    }

    #[test]
    fn missing_root_is_reported_by_name() {
        let err = EngineConfig::from_lookup(lookup(&[(FIXTURE_DIR_VAR, "f")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingVar {
                name: TARGET_DIR_VAR
            }
        ));
    }

    #[test]
    fn threshold_override() {
        let config = EngineConfig::from_lookup(lookup(&[
            (FIXTURE_DIR_VAR, "f"),
            (TARGET_DIR_VAR, "t"),
            (THRESHOLD_VAR, " 0.05 "),
        ]))
        .unwrap();
        assert_eq!(config.default_options.threshold.raw(), 0.05);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[
            (FIXTURE_DIR_VAR, "f"),
            (TARGET_DIR_VAR, "t"),
            (THRESHOLD_VAR, "3"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThreshold { .. }));
    }
}
