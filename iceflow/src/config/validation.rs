//! Semantic configuration validation
//!
//! Runs on the fully deserialized `ExperimentConfig`, after the shape check
//! has guaranteed presence, kinds and per-field bounds. What remains are
//! the relations between fields.
//!
//! Validation collects ALL issues (doesn't stop at first) to provide
//! comprehensive feedback to users.

use crate::config::loader::ConfigLimits;
use crate::error::{Severity, ValidationIssue};

use iceflow_core::config::{DatasetConfig, ExperimentConfig, ReportingConfig};

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Cross-field validator for experiment configurations.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns the result.
    ///
    /// This method collects all errors and warnings rather than stopping
    /// at the first issue.
    pub fn validate(&mut self, config: &ExperimentConfig, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_limits(config, limits);
        self.validate_reporting(&config.reporting);
        self.validate_states(&config.model.base, &config.model.target);
        self.validate_flow(config);
        self.validate_train(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn validate_limits(&mut self, config: &ExperimentConfig, limits: &ConfigLimits) {
        let couplings = config.model.flow.couplings.len();
        if couplings > limits.max_couplings {
            self.add_error(
                "model.flow.couplings",
                format!(
                    "Too many couplings: {couplings} (max: {})",
                    limits.max_couplings
                ),
            );
        }

        let stages = config.train.len();
        if stages > limits.max_train_stages {
            self.add_error(
                "train",
                format!(
                    "Too many training stages: {stages} (max: {})",
                    limits.max_train_stages
                ),
            );
        }
    }

    fn validate_reporting(&mut self, reporting: &ReportingConfig) {
        match reporting.num_samples.value() {
            Some(&samples) => {
                if reporting.num_samples_per_batch > samples {
                    self.add_error(
                        "reporting.num_samples_per_batch",
                        format!(
                            "Batch size {} exceeds reporting.num_samples ({samples})",
                            reporting.num_samples_per_batch
                        ),
                    );
                }
            }
            None => {
                if reporting.any_flag_set() {
                    self.add_warning(
                        "reporting",
                        "Report flags are set but reporting.num_samples is not; no reports will be produced",
                    );
                }
            }
        }
    }

    fn validate_states(&mut self, base: &DatasetConfig, target: &DatasetConfig) {
        if base.temperature.total_cmp(&target.temperature).is_eq() {
            self.add_warning(
                "model.target.temperature",
                format!(
                    "Base and target share temperature {} K; the free-energy difference is trivial",
                    target.temperature
                ),
            );
        }

        if base.num_molecules != target.num_molecules {
            self.add_warning(
                "model.target.num_molecules",
                format!(
                    "Base has {} molecules but target has {}; the flow maps between equal-sized systems",
                    base.num_molecules, target.num_molecules
                ),
            );
        }
    }

    fn validate_flow(&mut self, config: &ExperimentConfig) {
        for (idx, coupling) in config.model.flow.couplings.iter().enumerate() {
            for (name, block) in coupling.updates() {
                if block.channels_per_head().is_none() {
                    self.add_warning(
                        format!("model.flow.couplings[{idx}].{name}.num_channels"),
                        format!(
                            "num_channels ({}) is not divisible by num_heads ({})",
                            block.num_channels, block.num_heads
                        ),
                    );
                }
            }
        }
    }

    fn validate_train(&mut self, config: &ExperimentConfig) {
        let target_sampled = config.model.target.is_sampled();

        for (idx, stage) in config.train.iter().enumerate() {
            if !stage.has_learning_signal() {
                self.add_error(
                    format!("train[{idx}]"),
                    "weight_fe and weight_nll are both zero; the stage has no learning signal",
                );
            }

            if stage.weight_nll > 0.0 && !target_sampled {
                self.add_warning(
                    format!("train[{idx}].weight_nll"),
                    "NLL term is weighted but model.target.num_samples is 0; no target samples will be drawn",
                );
            }
        }

        let total = config.total_iters();
        if config.global_step >= total {
            self.add_warning(
                "global_step",
                format!(
                    "global_step ({}) is at or past the end of the schedule ({total} steps)",
                    config.global_step
                ),
            );
        }
    }

    fn add_error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            severity: Severity::Warning,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use iceflow_core::config::{
        BlockConfig, CouplingConfig, EnergyErrorHandling, FlowConfig, ModelConfig, Setting,
        TrainStage,
    };
    use std::path::PathBuf;

    fn block(heads: u64, channels: u64) -> BlockConfig {
        BlockConfig {
            num_blocks: 1,
            num_heads: heads,
            num_channels: channels,
        }
    }

    fn dataset(temperature: f64, molecules: u64, samples: u64) -> DatasetConfig {
        DatasetConfig {
            path: PathBuf::from("data"),
            num_molecules: molecules,
            temperature,
            ice_type: "XI".to_string(),
            water_type: "tip4pew".to_string(),
            num_samples: samples,
            recompute_forces: Setting::Absent,
            store_forces: Setting::Absent,
        }
    }

    fn stage(weight_fe: f64, weight_nll: f64) -> TrainStage {
        TrainStage {
            num_epochs: 5,
            num_iters_per_epoch: 100,
            num_samples: 16,
            init_learning_rate: 1e-3,
            target_learning_rate: 1e-4,
            weight_fe,
            weight_nll,
        }
    }

    fn config() -> ExperimentConfig {
        ExperimentConfig {
            seed: 1,
            global_step: 0,
            reporting: ReportingConfig::default(),
            model: ModelConfig {
                pretrained_model_path: Setting::Absent,
                use_auxiliary: false,
                flow: FlowConfig {
                    couplings: vec![CouplingConfig {
                        num_repetitions: 1,
                        auxiliary_update: block(2, 8),
                        position_update: block(2, 8),
                        quaternion_update: block(2, 8),
                    }],
                },
                base: dataset(250.0, 16, 1000),
                target: dataset(100.0, 16, 0),
                base_density: None,
                target_density: None,
                energy_error_handling: EnergyErrorHandling::default(),
            },
            train: vec![stage(1.0, 0.0)],
        }
    }

    fn validate(config: &ExperimentConfig) -> ValidationResult {
        Validator::new().validate(config, &ConfigLimits::default())
    }

    #[test]
    fn test_valid_config_is_clean() {
        let result = validate(&config());
        assert!(result.is_valid());
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_batch_larger_than_report_samples() {
        let mut cfg = config();
        cfg.reporting.num_samples = Setting::Value(64);
        cfg.reporting.num_samples_per_batch = 128;
        let result = validate(&cfg);
        assert!(result.has_errors());
        assert_eq!(result.errors[0].path, "reporting.num_samples_per_batch");
    }

    #[test]
    fn test_batch_size_ignored_when_reporting_disabled() {
        let mut cfg = config();
        cfg.reporting.num_samples = Setting::Null;
        cfg.reporting.num_samples_per_batch = 1_000_000;
        assert!(validate(&cfg).is_valid());
    }

    #[test]
    fn test_flags_without_reporting_warn() {
        let mut cfg = config();
        cfg.reporting.save_model = true;
        let result = validate(&cfg);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].path, "reporting");
    }

    #[test]
    fn test_equal_temperatures_warn() {
        let mut cfg = config();
        cfg.model.target.temperature = 250.0;
        let result = validate(&cfg);
        assert!(result.is_valid());
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.path == "model.target.temperature")
        );
    }

    #[test]
    fn test_molecule_mismatch_warns() {
        let mut cfg = config();
        cfg.model.target.num_molecules = 128;
        let result = validate(&cfg);
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.path == "model.target.num_molecules")
        );
    }

    #[test]
    fn test_uneven_heads_warn() {
        let mut cfg = config();
        cfg.model.flow.couplings[0].position_update = block(3, 8);
        let result = validate(&cfg);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(
            result.warnings[0].path,
            "model.flow.couplings[0].position_update.num_channels"
        );
    }

    #[test]
    fn test_no_learning_signal_is_error() {
        let mut cfg = config();
        cfg.train.push(stage(0.0, 0.0));
        cfg.train.push(stage(0.0, 0.0));
        let result = validate(&cfg);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].path, "train[1]");
        assert_eq!(result.errors[1].path, "train[2]");
    }

    #[test]
    fn test_nll_without_target_samples_warns() {
        let mut cfg = config();
        cfg.train[0] = stage(0.0, 1.0);
        let result = validate(&cfg);
        assert!(result.is_valid());
        assert_eq!(result.warnings[0].path, "train[0].weight_nll");

        cfg.model.target.num_samples = 500;
        assert!(validate(&cfg).warnings.is_empty());
    }

    #[test]
    fn test_finished_schedule_warns() {
        let mut cfg = config();
        cfg.global_step = 500;
        let result = validate(&cfg);
        assert!(result.warnings.iter().any(|w| w.path == "global_step"));
    }

    #[test]
    fn test_limits_enforced() {
        let limits = ConfigLimits {
            max_couplings: 1,
            max_train_stages: 1,
            max_config_size: 1024,
        };
        let mut cfg = config();
        let coupling = cfg.model.flow.couplings[0].clone();
        cfg.model.flow.couplings.push(coupling);
        cfg.train.push(stage(1.0, 0.0));

        let result = Validator::new().validate(&cfg, &limits);
        let paths: Vec<_> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["model.flow.couplings", "train"]);
    }
}
