// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::EngineConfig;
use crate::errors::ConfigError;

/// Reject configuration values that would prevent any progress.
///
/// A cascade limit of zero would stop every dispatch before its first match,
/// and a zero drain timeout would fail every snapshot that has a handler in
/// flight.
pub fn validate_config(cfg: &EngineConfig) -> Result<(), ConfigError> {
    if cfg.dispatch.max_cascade_rounds == Some(0) {
        return Err(ConfigError::Invalid {
            field: "dispatch.max_cascade_rounds",
            reason: "must be greater than zero".to_string(),
        });
    }

    if cfg.snapshot.drain_timeout_ms == Some(0) {
        return Err(ConfigError::Invalid {
            field: "snapshot.drain_timeout_ms",
            reason: "must be greater than zero".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_config_table_driven() {
        struct TestCase {
            name: &'static str,
            yaml: &'static str,
            expected_field: Option<&'static str>,
        }

        let test_cases = vec![
            TestCase {
                name: "defaults",
                yaml: "{}",
                expected_field: None,
            },
            TestCase {
                name: "zero cascade rounds",
                yaml: "dispatch:\n  max_cascade_rounds: 0\n",
                expected_field: Some("dispatch.max_cascade_rounds"),
            },
            TestCase {
                name: "zero drain timeout",
                yaml: "snapshot:\n  drain_timeout_ms: 0\n",
                expected_field: Some("snapshot.drain_timeout_ms"),
            },
            TestCase {
                name: "positive limits",
                yaml: "dispatch:\n  max_cascade_rounds: 1\nsnapshot:\n  drain_timeout_ms: 1\n",
                expected_field: None,
            },
        ];

        for case in test_cases {
            let cfg = EngineConfig::from_yaml_str(case.yaml).unwrap();
            let result = validate_config(&cfg);
            match (case.expected_field, result) {
                (None, Ok(())) => {}
                (Some(expected), Err(ConfigError::Invalid { field, .. })) => {
                    assert_eq!(field, expected, "case '{}'", case.name)
                }
                (expected, actual) => panic!(
                    "case '{}': expected {:?}, got {:?}",
                    case.name, expected, actual
                ),
            }
        }
    }
}
