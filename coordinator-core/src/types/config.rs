//! Configuration layer: persistence, hybrid inference (with named presets),
//! and the top-level `CoordinatorConfig` that wires everything together.
//!
//! Plain structs with a `Default` impl; no environment-variable parsing
//! lives in this library, that belongs to whatever binary embeds it.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::resilience::{CircuitBreakerConfig, RetryConfig};

#[derive(Debug, Clone)]
pub enum PersistenceBackend {
    File { directory: PathBuf },
    Sql { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub backend: PersistenceBackend,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::File {
                directory: PathBuf::from("./data"),
            },
        }
    }
}

/// Tunable knobs for the hybrid dependency inferer.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridInferenceConfig {
    pub pattern_confidence_threshold: f64,
    pub ai_confidence_threshold: f64,
    pub combined_confidence_boost: f64,
    pub max_ai_pairs_per_batch: usize,
    pub min_shared_keywords: usize,
    pub enable_ai_inference: bool,
    pub cache_ttl_hours: u64,
    pub require_component_match: bool,
    pub max_dependency_chain_length: usize,
}

impl Default for HybridInferenceConfig {
    fn default() -> Self {
        Self {
            pattern_confidence_threshold: 0.8,
            ai_confidence_threshold: 0.7,
            combined_confidence_boost: 0.15,
            max_ai_pairs_per_batch: 20,
            min_shared_keywords: 2,
            enable_ai_inference: true,
            cache_ttl_hours: 24,
            require_component_match: false,
            max_dependency_chain_length: 20,
        }
    }
}

impl HybridInferenceConfig {
    /// Validates that thresholds and boosts land in `[0, 1]` and batch sizes
    /// are non-zero; a misconfigured coordinator should fail at startup, not
    /// silently misbehave at inference time.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("pattern_confidence_threshold", self.pattern_confidence_threshold),
            ("ai_confidence_threshold", self.ai_confidence_threshold),
            ("combined_confidence_boost", self.combined_confidence_boost),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::ValidationFailure(format!(
                    "{name} must be within [0,1], got {value}"
                )));
            }
        }
        if self.max_ai_pairs_per_batch == 0 {
            return Err(Error::ValidationFailure(
                "max_ai_pairs_per_batch must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// High precision, conservative about calling the LLM refiner.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            pattern_confidence_threshold: 0.9,
            ai_confidence_threshold: 0.85,
            enable_ai_inference: true,
            max_ai_pairs_per_batch: 10,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn balanced() -> Self {
        Self::default()
    }

    /// Lower thresholds, larger batches: trades precision for recall.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            pattern_confidence_threshold: 0.6,
            ai_confidence_threshold: 0.5,
            combined_confidence_boost: 0.2,
            max_ai_pairs_per_batch: 40,
            min_shared_keywords: 1,
            ..Self::default()
        }
    }

    /// Minimizes LLM calls: only the most ambiguous pairs are sent, in small
    /// batches.
    #[must_use]
    pub fn cost_optimized() -> Self {
        Self {
            max_ai_pairs_per_batch: 5,
            cache_ttl_hours: 72,
            min_shared_keywords: 3,
            ..Self::default()
        }
    }

    /// Pattern engine only; `enable_ai_inference = false` disables the LLM
    /// refiner entirely.
    #[must_use]
    pub fn pattern_only() -> Self {
        Self {
            enable_ai_inference: false,
            ..Self::default()
        }
    }
}

/// Top-level coordinator configuration: persistence backend, resilience
/// defaults for storage and remote providers, and dependency-inference
/// tuning.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub persistence: PersistenceConfig,
    pub storage_retry: RetryConfig,
    pub storage_breaker: CircuitBreakerConfig,
    pub remote_retry: RetryConfig,
    pub remote_breaker: CircuitBreakerConfig,
    pub hybrid_inference: HybridInferenceConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            persistence: PersistenceConfig::default(),
            storage_retry: RetryConfig::default(),
            storage_breaker: CircuitBreakerConfig::default(),
            remote_retry: RetryConfig::default(),
            remote_breaker: CircuitBreakerConfig::default(),
            hybrid_inference: HybridInferenceConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<()> {
        self.hybrid_inference.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(CoordinatorConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_threshold_fails_validation() {
        let mut config = HybridInferenceConfig::default();
        config.pattern_confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn pattern_only_disables_ai_inference() {
        assert!(!HybridInferenceConfig::pattern_only().enable_ai_inference);
    }

    #[test]
    fn presets_all_validate() {
        for config in [
            HybridInferenceConfig::conservative(),
            HybridInferenceConfig::balanced(),
            HybridInferenceConfig::aggressive(),
            HybridInferenceConfig::cost_optimized(),
            HybridInferenceConfig::pattern_only(),
        ] {
            assert!(config.validate().is_ok());
        }
    }
}
