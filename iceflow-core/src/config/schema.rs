//! Experiment configuration schema.
//!
//! These types are deserialized from YAML experiment documents. Field
//! presence and bounds are enforced by the loader before deserialization,
//! so the serde attributes here only encode defaults and the null/absent
//! distinction.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::setting::Setting;

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root of an experiment document.
///
/// Loaded once at process start and treated as immutable, except for
/// `global_step`, which a training run may persist back for resumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExperimentConfig {
    /// PRNG seed for the run (required)
    pub seed: i64,

    /// Number of optimization steps already taken
    #[serde(default)]
    pub global_step: u64,

    /// What to report and save while training
    #[serde(default)]
    pub reporting: ReportingConfig,

    /// Flow architecture and the two thermodynamic states (required)
    pub model: ModelConfig,

    /// Training schedule, applied stage by stage in order (required)
    pub train: Vec<TrainStage>,
}

impl ExperimentConfig {
    /// Renders the configuration as YAML.
    ///
    /// Defaults are written out; absent nullable fields are omitted and
    /// explicit nulls are written as `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Total number of optimization steps across all training stages.
    #[must_use]
    pub fn total_iters(&self) -> u64 {
        self.train
            .iter()
            .map(TrainStage::total_iters)
            .fold(0, u64::saturating_add)
    }

    /// Locates a global step within the training schedule.
    ///
    /// Returns `None` once `step` is past the final stage.
    #[must_use]
    pub fn stage_at(&self, step: u64) -> Option<StagePosition> {
        let mut remaining = step;
        for (stage, train_stage) in self.train.iter().enumerate() {
            let len = train_stage.total_iters();
            if remaining < len {
                return Some(StagePosition {
                    stage,
                    local_step: remaining,
                });
            }
            remaining -= len;
        }
        None
    }

    /// Stage and offset where training resumes, based on `global_step`.
    #[must_use]
    pub fn resume_position(&self) -> Option<StagePosition> {
        self.stage_at(self.global_step)
    }
}

/// Position of a global step inside the training schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePosition {
    /// Index into `train`
    pub stage: usize,
    /// Step offset from the start of that stage
    pub local_step: u64,
}

// ============================================================================
// Reporting
// ============================================================================

/// Reporting and artifact settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReportingConfig {
    /// Samples drawn per report; absent or null disables reporting
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub num_samples: Setting<u64>,

    /// Batch size used when drawing report samples
    #[serde(default = "default_samples_per_batch")]
    pub num_samples_per_batch: u64,

    #[serde(default)]
    pub report_ess: bool,

    #[serde(default)]
    pub report_likelihood: bool,

    #[serde(default)]
    pub save_model: bool,

    #[serde(default)]
    pub save_samples: bool,

    #[serde(default)]
    pub save_statistics: bool,

    #[serde(default)]
    pub plot_oxygens: bool,

    #[serde(default)]
    pub plot_energy_histograms: bool,

    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub plot_quaternions: Setting<bool>,
}

const fn default_samples_per_batch() -> u64 {
    128
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            num_samples: Setting::Absent,
            num_samples_per_batch: default_samples_per_batch(),
            report_ess: false,
            report_likelihood: false,
            save_model: false,
            save_samples: false,
            save_statistics: false,
            plot_oxygens: false,
            plot_energy_histograms: false,
            plot_quaternions: Setting::Absent,
        }
    }
}

impl ReportingConfig {
    /// Returns `true` if reports will be produced.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.num_samples.value().is_some_and(|n| *n > 0)
    }

    /// Number of batches needed to draw the report samples.
    ///
    /// The last batch may be partial.
    #[must_use]
    pub fn num_batches(&self) -> Option<u64> {
        let samples = *self.num_samples.value()?;
        if self.num_samples_per_batch == 0 {
            return None;
        }
        Some(samples.div_ceil(self.num_samples_per_batch))
    }

    /// Returns `true` if any report or artifact flag is switched on.
    #[must_use]
    pub fn any_flag_set(&self) -> bool {
        self.report_ess
            || self.report_likelihood
            || self.save_model
            || self.save_samples
            || self.save_statistics
            || self.plot_oxygens
            || self.plot_energy_histograms
            || self.plot_quaternions.value().copied().unwrap_or(false)
    }
}

// ============================================================================
// Model
// ============================================================================

/// Flow model and the pair of states it maps between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModelConfig {
    /// Checkpoint to start from; absent or null trains from scratch
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub pretrained_model_path: Setting<PathBuf>,

    /// Whether the flow carries auxiliary variables
    #[serde(default)]
    pub use_auxiliary: bool,

    pub flow: FlowConfig,

    /// Prior state
    pub base: DatasetConfig,

    /// State the flow maps onto
    pub target: DatasetConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_density: Option<BaseDensityConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_density: Option<TargetDensityConfig>,

    /// What the energy model does when a force evaluation fails
    #[serde(default)]
    pub energy_error_handling: EnergyErrorHandling,
}

/// Ordered stack of coupling layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FlowConfig {
    /// Couplings in composition order
    pub couplings: Vec<CouplingConfig>,
}

impl FlowConfig {
    /// Number of coupling layers after expanding repetitions.
    #[must_use]
    pub fn num_layers(&self) -> u64 {
        self.couplings
            .iter()
            .map(|c| c.num_repetitions)
            .fold(0, u64::saturating_add)
    }
}

/// One coupling stage, repeated `num_repetitions` times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CouplingConfig {
    #[serde(default = "default_repetitions")]
    pub num_repetitions: u64,

    pub auxiliary_update: BlockConfig,

    pub position_update: BlockConfig,

    pub quaternion_update: BlockConfig,
}

const fn default_repetitions() -> u64 {
    1
}

impl CouplingConfig {
    /// The three sub-network updates, labelled by their key.
    #[must_use]
    pub fn updates(&self) -> [(&'static str, &BlockConfig); 3] {
        [
            ("auxiliary_update", &self.auxiliary_update),
            ("position_update", &self.position_update),
            ("quaternion_update", &self.quaternion_update),
        ]
    }
}

/// Capacity of one sub-network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BlockConfig {
    pub num_blocks: u64,
    pub num_heads: u64,
    pub num_channels: u64,
}

impl BlockConfig {
    /// Channels per attention head, if the split is even.
    #[must_use]
    pub const fn channels_per_head(&self) -> Option<u64> {
        if self.num_heads == 0 || self.num_channels % self.num_heads != 0 {
            None
        } else {
            Some(self.num_channels / self.num_heads)
        }
    }
}

/// One thermodynamic state backed by simulation data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatasetConfig {
    /// Directory holding the trajectory and model files
    pub path: PathBuf,

    pub num_molecules: u64,

    /// Temperature in kelvin
    pub temperature: f64,

    /// Ice polymorph label, e.g. `XI`
    pub ice_type: String,

    /// Water model label, e.g. `tip4pew`
    pub water_type: String,

    /// Samples to draw from this state; 0 means unused for this role
    #[serde(default)]
    pub num_samples: u64,

    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub recompute_forces: Setting<bool>,

    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub store_forces: Setting<bool>,
}

impl DatasetConfig {
    /// Identifier of the simulated system, used in data file names.
    #[must_use]
    pub fn stem(&self) -> String {
        format!(
            "{}_{}_T{}_N{}",
            self.ice_type, self.water_type, self.temperature, self.num_molecules
        )
    }

    /// Location of the serialized energy model for this state.
    #[must_use]
    pub fn model_file(&self) -> PathBuf {
        self.path.join(format!("model-{}.json", self.stem()))
    }

    /// Returns `true` if samples are drawn from this state.
    #[must_use]
    pub const fn is_sampled(&self) -> bool {
        self.num_samples > 0
    }
}

/// Rotational prior of the base density.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BaseDensityConfig {
    /// von Mises-Fisher concentration for molecule orientations
    pub rot_concentration: f64,
}

/// Energy settings of the target density.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TargetDensityConfig {
    /// Gradient-norm threshold above which the potential is replaced by a
    /// harmonic approximation; absent or null disables the cutoff
    #[serde(default, skip_serializing_if = "Setting::is_absent")]
    pub cutoff_threshold: Setting<f64>,
}

/// Failure policy for energy and force evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyErrorHandling {
    /// Abort the run
    RaiseException,
    /// Log and continue (default)
    #[default]
    LogWarning,
    /// Continue silently
    Nothing,
}

impl EnergyErrorHandling {
    /// Accepted spellings, in declaration order.
    pub const NAMES: &'static [&'static str] = &["raise_exception", "log_warning", "nothing"];

    /// Returns the YAML spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RaiseException => "raise_exception",
            Self::LogWarning => "log_warning",
            Self::Nothing => "nothing",
        }
    }
}

// ============================================================================
// Training
// ============================================================================

/// One stage of the training schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrainStage {
    pub num_epochs: u64,

    pub num_iters_per_epoch: u64,

    /// Batch size
    pub num_samples: u64,

    /// Learning rate at the start of the stage
    pub init_learning_rate: f64,

    /// Learning rate the schedule anneals towards
    pub target_learning_rate: f64,

    /// Weight of the free-energy (reverse KL) loss term
    pub weight_fe: f64,

    /// Weight of the negative log-likelihood loss term
    pub weight_nll: f64,
}

impl TrainStage {
    /// Optimization steps in this stage.
    #[must_use]
    pub const fn total_iters(&self) -> u64 {
        self.num_epochs.saturating_mul(self.num_iters_per_epoch)
    }

    /// Returns `true` if at least one loss term is weighted.
    #[must_use]
    pub fn has_learning_signal(&self) -> bool {
        self.weight_fe > 0.0 || self.weight_nll > 0.0
    }
}

// ============================================================================
// Tests
// ============================================================================
