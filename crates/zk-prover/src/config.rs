//! Prover configuration
//!
//! Defaults match the production circuit: 16 account slots, 32-bit balances
//! and the statutory per-type limits. Override via a JSON file or the
//! environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ComplianceError, Result};
use crate::types::{CircuitParams, LimitTable};

/// Service-level prover settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProverConfig {
    /// Account slots per proof
    pub capacity: usize,
    /// Bit width of balances and slack values
    pub bit_width: usize,
    /// Threads in the proving pool
    pub worker_threads: usize,
    /// Limits applied when a request carries none
    pub limits: LimitTable,
    /// Key directory; keys are generated and saved there when missing
    pub key_dir: Option<PathBuf>,
    /// Abandon proof generation after this many seconds
    pub proof_timeout_secs: Option<u64>,
}

impl Default for ProverConfig {
    fn default() -> Self {
        let params = CircuitParams::default();
        Self {
            capacity: params.capacity,
            bit_width: params.bit_width,
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            limits: LimitTable::default(),
            key_dir: None,
            proof_timeout_secs: None,
        }
    }
}

impl ProverConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults:
    /// - `BALANCE_PROVER_CAPACITY` (default: 16)
    /// - `BALANCE_PROVER_BIT_WIDTH` (default: 32)
    /// - `BALANCE_PROVER_WORKERS` (default: available parallelism)
    /// - `BALANCE_PROVER_KEY_DIR` (default: none, keys stay in memory)
    /// - `BALANCE_PROVER_TIMEOUT_SECS` (default: none)
    /// - `BALANCE_PROVER_LIMIT_INDIVIDUAL` (default: 22950)
    /// - `BALANCE_PROVER_LIMIT_ASSOCIATION` (default: 76500)
    /// - `BALANCE_PROVER_LIMIT_LARGE_CONDOMINIUM` (default: 100000)
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(capacity) = env_parse("BALANCE_PROVER_CAPACITY")? {
            config.capacity = capacity;
        }
        if let Some(bit_width) = env_parse("BALANCE_PROVER_BIT_WIDTH")? {
            config.bit_width = bit_width;
        }
        if let Some(workers) = env_parse("BALANCE_PROVER_WORKERS")? {
            config.worker_threads = workers;
        }
        if let Ok(dir) = std::env::var("BALANCE_PROVER_KEY_DIR") {
            if !dir.trim().is_empty() {
                config.key_dir = Some(PathBuf::from(dir));
            }
        }
        if let Some(timeout) = env_parse("BALANCE_PROVER_TIMEOUT_SECS")? {
            config.proof_timeout_secs = Some(timeout);
        }
        if let Some(limit) = env_parse("BALANCE_PROVER_LIMIT_INDIVIDUAL")? {
            config.limits.individual = limit;
        }
        if let Some(limit) = env_parse("BALANCE_PROVER_LIMIT_ASSOCIATION")? {
            config.limits.association = limit;
        }
        if let Some(limit) = env_parse("BALANCE_PROVER_LIMIT_LARGE_CONDOMINIUM")? {
            config.limits.large_condominium = limit;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file; missing fields keep defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text).map_err(|e| ComplianceError::Config {
            reason: format!("{}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let params = self.circuit_params()?;
        if self.worker_threads == 0 {
            return Err(config_error("workerThreads must be at least 1"));
        }
        if self.proof_timeout_secs == Some(0) {
            return Err(config_error("proofTimeoutSecs must be positive"));
        }
        self.limits
            .validate(params.bit_width)
            .map_err(|e| config_error(&e.to_string()))
    }

    pub fn circuit_params(&self) -> Result<CircuitParams> {
        CircuitParams::new(self.capacity, self.bit_width).map_err(|e| config_error(&e.to_string()))
    }

    pub fn proof_timeout(&self) -> Option<Duration> {
        self.proof_timeout_secs.map(Duration::from_secs)
    }
}

fn env_parse<T>(var: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| config_error(&format!("{var}={raw}: {e}"))),
        _ => Ok(None),
    }
}

fn config_error(reason: &str) -> ComplianceError {
    ComplianceError::Config {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ProverConfig::default();
        assert_eq!(config.capacity, 16);
        assert_eq!(config.bit_width, 32);
        assert!(config.worker_threads >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_file_with_partial_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"capacity": 4, "bitWidth": 24, "limits": {{"individual": 1000, "association": 2000, "large_condominium": 3000}}, "proofTimeoutSecs": 30}}"#
        )
        .unwrap();

        let config = ProverConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.capacity, 4);
        assert_eq!(config.bit_width, 24);
        assert_eq!(config.limits.association, 2000);
        assert_eq!(config.proof_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.key_dir, None);
    }

    #[test]
    fn test_limits_wider_than_circuit() {
        let config = ProverConfig {
            bit_width: 16,
            ..ProverConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ComplianceError::Config { .. })
        ));
    }

    #[test]
    fn test_zero_values_rejected() {
        let no_workers = ProverConfig {
            worker_threads: 0,
            ..ProverConfig::default()
        };
        assert!(no_workers.validate().is_err());

        let no_slots = ProverConfig {
            capacity: 0,
            ..ProverConfig::default()
        };
        assert!(no_slots.validate().is_err());

        let no_timeout = ProverConfig {
            proof_timeout_secs: Some(0),
            ..ProverConfig::default()
        };
        assert!(no_timeout.validate().is_err());
    }

    #[test]
    fn test_env_parse() {
        std::env::set_var("BALANCE_PROVER_TEST_PARSE_OK", " 12 ");
        std::env::set_var("BALANCE_PROVER_TEST_PARSE_BAD", "twelve");
        let ok: Option<usize> = env_parse("BALANCE_PROVER_TEST_PARSE_OK").unwrap();
        let bad: Result<Option<usize>> = env_parse("BALANCE_PROVER_TEST_PARSE_BAD");
        let unset: Option<usize> = env_parse("BALANCE_PROVER_TEST_PARSE_UNSET").unwrap();
        std::env::remove_var("BALANCE_PROVER_TEST_PARSE_OK");
        std::env::remove_var("BALANCE_PROVER_TEST_PARSE_BAD");

        assert_eq!(ok, Some(12));
        assert!(matches!(bad, Err(ComplianceError::Config { .. })));
        assert_eq!(unset, None);
    }
}
