use crate::core::models::system::SA_RADIUS_OFFSET;
use crate::core::switching::VolumeCutoffs;
use crate::tree::{BuildStrategy, MAX_ORDER, PartitionSettings, ReductionStrategy, TreeSettings};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default neighbor-list cutoff for the overlap tree, in Angstroms.
pub const DEFAULT_NEIGHBOR_CUTOFF: f64 = 8.0;
/// Pairs farther apart than this do not descreen each other, in Angstroms.
pub const DEFAULT_DESCREENING_CUTOFF: f64 = 12.0;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// The energy model an [`Evaluator`](super::evaluator::Evaluator) computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Model {
    /// Surface-area energy from the difference of two Gaussian volumes.
    #[default]
    GVolSA,
    /// Surface area plus AGBNP generalized-Born and dispersion energies.
    Agbnp1,
    /// AGBNP with solvent-probe boundary corrections to the self volumes.
    Agbnp2,
}

impl Model {
    pub fn has_solvation(&self) -> bool {
        !matches!(self, Model::GVolSA)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Model::GVolSA => "gvolsa",
            Model::Agbnp1 => "agbnp1",
            Model::Agbnp2 => "agbnp2",
        })
    }
}

impl FromStr for Model {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "gvolsa" | "gvol" | "sa" => Ok(Model::GVolSA),
            "agbnp1" | "agbnp" => Ok(Model::Agbnp1),
            "agbnp2" => Ok(Model::Agbnp2),
            other => Err(format!("unknown model '{other}'")),
        }
    }
}

/// Continuum solvent parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolventConfig {
    /// Solvent probe radius in Angstroms.
    pub probe_radius: f64,
    pub dielectric_in: f64,
    pub dielectric_out: f64,
    /// Offset added to Born radii in the dispersion energy, in Angstroms.
    pub dispersion_offset: f64,
    /// Scale of a solvent-probe particle's volume relative to the probe sphere.
    pub probe_volume_coefficient: f64,
    /// Switching thresholds for the free volume of solvent-probe particles.
    pub probe_cutoffs: VolumeCutoffs,
}

impl Default for SolventConfig {
    fn default() -> Self {
        Self {
            probe_radius: 1.4,
            dielectric_in: 1.0,
            dielectric_out: 80.0,
            dispersion_offset: 1.4,
            probe_volume_coefficient: 0.17,
            probe_cutoffs: VolumeCutoffs::probe(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub model: Model,
    pub tree: TreeSettings,
    pub partition: PartitionSettings,
    pub neighbor_cutoff: f64,
    /// Radius offset of the large spheres in the surface-area model.
    pub sa_radius_offset: f64,
    pub descreening_cutoff: f64,
    pub solvent: SolventConfig,
}

#[derive(Default)]
pub struct EngineConfigBuilder {
    model: Option<Model>,
    volume_cutoffs: Option<VolumeCutoffs>,
    max_order: Option<usize>,
    build_strategy: Option<BuildStrategy>,
    reduction: Option<ReductionStrategy>,
    partition: Option<PartitionSettings>,
    neighbor_cutoff: Option<f64>,
    sa_radius_offset: Option<f64>,
    descreening_cutoff: Option<f64>,
    solvent: Option<SolventConfig>,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }
    pub fn volume_cutoffs(mut self, cutoffs: VolumeCutoffs) -> Self {
        self.volume_cutoffs = Some(cutoffs);
        self
    }
    pub fn max_order(mut self, order: usize) -> Self {
        self.max_order = Some(order);
        self
    }
    pub fn build_strategy(mut self, strategy: BuildStrategy) -> Self {
        self.build_strategy = Some(strategy);
        self
    }
    pub fn reduction(mut self, strategy: ReductionStrategy) -> Self {
        self.reduction = Some(strategy);
        self
    }
    pub fn partition(mut self, settings: PartitionSettings) -> Self {
        self.partition = Some(settings);
        self
    }
    pub fn neighbor_cutoff(mut self, cutoff: f64) -> Self {
        self.neighbor_cutoff = Some(cutoff);
        self
    }
    pub fn sa_radius_offset(mut self, offset: f64) -> Self {
        self.sa_radius_offset = Some(offset);
        self
    }
    pub fn descreening_cutoff(mut self, cutoff: f64) -> Self {
        self.descreening_cutoff = Some(cutoff);
        self
    }
    pub fn solvent(mut self, solvent: SolventConfig) -> Self {
        self.solvent = Some(solvent);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// The model is required; every other parameter falls back to its default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingParameter`] if no model was given and
    /// [`ConfigError::InvalidParameter`] for out-of-range values.
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let model = self.model.ok_or(ConfigError::MissingParameter("model"))?;
        let tree = TreeSettings {
            cutoffs: self.volume_cutoffs.unwrap_or_default(),
            max_order: self.max_order.unwrap_or(MAX_ORDER),
            build_strategy: self.build_strategy.unwrap_or_default(),
            reduction: self.reduction.unwrap_or_default(),
        };
        let config = EngineConfig {
            model,
            tree,
            partition: self.partition.unwrap_or_default(),
            neighbor_cutoff: self.neighbor_cutoff.unwrap_or(DEFAULT_NEIGHBOR_CUTOFF),
            sa_radius_offset: self.sa_radius_offset.unwrap_or(SA_RADIUS_OFFSET),
            descreening_cutoff: self
                .descreening_cutoff
                .unwrap_or(DEFAULT_DESCREENING_CUTOFF),
            solvent: self.solvent.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// Checks every parameter for a physically meaningful value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_cutoffs("volume_cutoffs", &self.tree.cutoffs)?;
        check_cutoffs("probe_cutoffs", &self.solvent.probe_cutoffs)?;
        if self.tree.max_order < 2 {
            return Err(invalid("max_order", "must be at least 2"));
        }

        let partition = &self.partition;
        if partition.lane_groups == 0 {
            return Err(invalid("lane_groups", "must be at least 1"));
        }
        if partition.pad_modulo == 0 {
            return Err(invalid("pad_modulo", "must be at least 1"));
        }
        if partition.max_atoms_per_section == 0 {
            return Err(invalid("max_atoms_per_section", "must be at least 1"));
        }
        if partition.min_atoms_per_section > partition.max_atoms_per_section {
            return Err(invalid(
                "min_atoms_per_section",
                "must not exceed max_atoms_per_section",
            ));
        }

        check_positive("neighbor_cutoff", self.neighbor_cutoff)?;
        check_positive("sa_radius_offset", self.sa_radius_offset)?;
        check_positive("descreening_cutoff", self.descreening_cutoff)?;
        check_positive("probe_radius", self.solvent.probe_radius)?;
        check_positive("dielectric_in", self.solvent.dielectric_in)?;
        check_positive("dielectric_out", self.solvent.dielectric_out)?;
        check_positive(
            "probe_volume_coefficient",
            self.solvent.probe_volume_coefficient,
        )?;
        if self.solvent.dispersion_offset < 0.0 || self.solvent.dispersion_offset.is_nan() {
            return Err(invalid("dispersion_offset", "must not be negative"));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.to_string(),
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must be positive, got {value}"),
        })
    }
}

fn check_cutoffs(name: &'static str, cutoffs: &VolumeCutoffs) -> Result<(), ConfigError> {
    if cutoffs.min_a > 0.0 && cutoffs.min_a < cutoffs.min_b && cutoffs.min_b.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!(
                "expected 0 < min_a < min_b, got min_a = {}, min_b = {}",
                cutoffs.min_a, cutoffs.min_b
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_fails_without_model() {
        let result = EngineConfigBuilder::new().build();
        assert_eq!(result, Err(ConfigError::MissingParameter("model")));
    }

    #[test]
    fn build_fills_defaults() {
        let config = EngineConfig::builder().model(Model::Agbnp1).build().unwrap();
        assert_eq!(config.model, Model::Agbnp1);
        assert_eq!(config.tree, TreeSettings::default());
        assert_eq!(config.partition, PartitionSettings::default());
        assert_eq!(config.neighbor_cutoff, DEFAULT_NEIGHBOR_CUTOFF);
        assert_eq!(config.sa_radius_offset, SA_RADIUS_OFFSET);
        assert_eq!(config.solvent, SolventConfig::default());
    }

    #[test]
    fn build_keeps_explicit_values() {
        let config = EngineConfig::builder()
            .model(Model::GVolSA)
            .max_order(4)
            .build_strategy(BuildStrategy::SinglePass)
            .reduction(ReductionStrategy::Atomic)
            .neighbor_cutoff(6.5)
            .build()
            .unwrap();
        assert_eq!(config.tree.max_order, 4);
        assert_eq!(config.tree.build_strategy, BuildStrategy::SinglePass);
        assert_eq!(config.tree.reduction, ReductionStrategy::Atomic);
        assert_eq!(config.neighbor_cutoff, 6.5);
    }

    #[test]
    fn build_rejects_inverted_cutoffs() {
        let result = EngineConfig::builder()
            .model(Model::GVolSA)
            .volume_cutoffs(VolumeCutoffs::new(0.1, 0.01))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter {
                name: "volume_cutoffs",
                ..
            })
        ));
    }

    #[test]
    fn build_rejects_first_order_tree() {
        let result = EngineConfig::builder().model(Model::GVolSA).max_order(1).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter {
                name: "max_order",
                ..
            })
        ));
    }

    #[test]
    fn build_rejects_zero_lane_groups() {
        let result = EngineConfig::builder()
            .model(Model::GVolSA)
            .partition(PartitionSettings {
                lane_groups: 0,
                ..PartitionSettings::default()
            })
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter {
                name: "lane_groups",
                ..
            })
        ));
    }

    #[test]
    fn build_rejects_non_positive_dielectric() {
        let result = EngineConfig::builder()
            .model(Model::Agbnp2)
            .solvent(SolventConfig {
                dielectric_out: 0.0,
                ..SolventConfig::default()
            })
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter {
                name: "dielectric_out",
                ..
            })
        ));
    }

    #[test]
    fn model_round_trips_through_display() {
        for model in [Model::GVolSA, Model::Agbnp1, Model::Agbnp2] {
            assert_eq!(model.to_string().parse::<Model>(), Ok(model));
        }
        assert_eq!("AGBNP".parse::<Model>(), Ok(Model::Agbnp1));
        assert!("gbsa".parse::<Model>().is_err());
    }
}
