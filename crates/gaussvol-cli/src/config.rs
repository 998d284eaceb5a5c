use crate::cli::EngineArgs;
use crate::error::{CliError, Result};
use gaussvol::core::switching::VolumeCutoffs;
use gaussvol::engine::config::{self as core_config, EngineConfig, Model, SolventConfig};
use gaussvol::tree::{BuildStrategy, PartitionSettings, ReductionStrategy};
use serde::Deserialize;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialModelConfig {
    name: Option<String>,
    sa_radius_offset: Option<f64>,
    descreening_cutoff: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialTreeConfig {
    volume_min_a: Option<f64>,
    volume_min_b: Option<f64>,
    max_order: Option<usize>,
    neighbor_cutoff: Option<f64>,
    build_strategy: Option<String>,
    reduction: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialPartitionConfig {
    lane_groups: Option<usize>,
    min_atoms_per_section: Option<usize>,
    max_atoms_per_section: Option<usize>,
    pad_modulo: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialSolventConfig {
    probe_radius: Option<f64>,
    dielectric_in: Option<f64>,
    dielectric_out: Option<f64>,
    dispersion_offset: Option<f64>,
    probe_volume_coefficient: Option<f64>,
    probe_volume_min_a: Option<f64>,
    probe_volume_min_b: Option<f64>,
}

/// Engine settings as read from a TOML file; every field is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialEngineConfig {
    model: Option<PartialModelConfig>,
    tree: Option<PartialTreeConfig>,
    partition: Option<PartialPartitionConfig>,
    solvent: Option<PartialSolventConfig>,
}

impl PartialEngineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Loads the file given with `--config`, or starts from an empty configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Applies `-S` settings, then command-line flags, on top of the file values and hands the
    /// result to the library builder. Anything left unset takes the library default.
    pub fn merge_with_cli(mut self, args: &EngineArgs) -> Result<EngineConfig> {
        self.apply_set_values(&args.set_values)?;

        let model_config = self.model.take().unwrap_or_default();
        let tree_config = self.tree.take().unwrap_or_default();
        let partition_config = self.partition.take().unwrap_or_default();
        let solvent_config = self.solvent.take().unwrap_or_default();

        let model = match args.model {
            Some(model) => model,
            None => parse_optional::<Model>("model.name", model_config.name.as_deref())?
                .unwrap_or_default(),
        };
        let build_strategy = match args.strategy {
            Some(strategy) => Some(strategy),
            None => parse_optional::<BuildStrategy>(
                "tree.build-strategy",
                tree_config.build_strategy.as_deref(),
            )?,
        };
        let reduction = match args.reduction {
            Some(reduction) => Some(reduction),
            None => parse_optional::<ReductionStrategy>(
                "tree.reduction",
                tree_config.reduction.as_deref(),
            )?,
        };

        let default_cutoffs = VolumeCutoffs::default();
        let mut builder = core_config::EngineConfigBuilder::new()
            .model(model)
            .volume_cutoffs(VolumeCutoffs::new(
                tree_config.volume_min_a.unwrap_or(default_cutoffs.min_a),
                tree_config.volume_min_b.unwrap_or(default_cutoffs.min_b),
            ))
            .partition(Self::merge_partition(partition_config))
            .solvent(Self::merge_solvent(solvent_config));

        if let Some(order) = tree_config.max_order {
            builder = builder.max_order(order);
        }
        if let Some(strategy) = build_strategy {
            builder = builder.build_strategy(strategy);
        }
        if let Some(reduction) = reduction {
            builder = builder.reduction(reduction);
        }
        if let Some(cutoff) = tree_config.neighbor_cutoff {
            builder = builder.neighbor_cutoff(cutoff);
        }
        if let Some(offset) = model_config.sa_radius_offset {
            builder = builder.sa_radius_offset(offset);
        }
        if let Some(cutoff) = model_config.descreening_cutoff {
            builder = builder.descreening_cutoff(cutoff);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_partition(partial: PartialPartitionConfig) -> PartitionSettings {
        let defaults = PartitionSettings::default();
        PartitionSettings {
            lane_groups: partial.lane_groups.unwrap_or(defaults.lane_groups),
            min_atoms_per_section: partial
                .min_atoms_per_section
                .unwrap_or(defaults.min_atoms_per_section),
            max_atoms_per_section: partial
                .max_atoms_per_section
                .unwrap_or(defaults.max_atoms_per_section),
            pad_modulo: partial.pad_modulo.unwrap_or(defaults.pad_modulo),
        }
    }

    fn merge_solvent(partial: PartialSolventConfig) -> SolventConfig {
        let defaults = SolventConfig::default();
        SolventConfig {
            probe_radius: partial.probe_radius.unwrap_or(defaults.probe_radius),
            dielectric_in: partial.dielectric_in.unwrap_or(defaults.dielectric_in),
            dielectric_out: partial.dielectric_out.unwrap_or(defaults.dielectric_out),
            dispersion_offset: partial
                .dispersion_offset
                .unwrap_or(defaults.dispersion_offset),
            probe_volume_coefficient: partial
                .probe_volume_coefficient
                .unwrap_or(defaults.probe_volume_coefficient),
            probe_cutoffs: VolumeCutoffs::new(
                partial
                    .probe_volume_min_a
                    .unwrap_or(defaults.probe_cutoffs.min_a),
                partial
                    .probe_volume_min_b
                    .unwrap_or(defaults.probe_cutoffs.min_b),
            ),
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value) = kv_pair.split_once('=').ok_or_else(|| {
                CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                ))
            })?;
            let (key, value) = (key.trim(), value.trim());

            match key {
                "model.name" => self.model_mut().name = Some(value.to_string()),
                "model.sa-radius-offset" => {
                    self.model_mut().sa_radius_offset = Some(parse_value(key, value)?)
                }
                "model.descreening-cutoff" => {
                    self.model_mut().descreening_cutoff = Some(parse_value(key, value)?)
                }
                "tree.volume-min-a" => self.tree_mut().volume_min_a = Some(parse_value(key, value)?),
                "tree.volume-min-b" => self.tree_mut().volume_min_b = Some(parse_value(key, value)?),
                "tree.max-order" => self.tree_mut().max_order = Some(parse_value(key, value)?),
                "tree.neighbor-cutoff" => {
                    self.tree_mut().neighbor_cutoff = Some(parse_value(key, value)?)
                }
                "tree.build-strategy" => self.tree_mut().build_strategy = Some(value.to_string()),
                "tree.reduction" => self.tree_mut().reduction = Some(value.to_string()),
                "partition.lane-groups" => {
                    self.partition_mut().lane_groups = Some(parse_value(key, value)?)
                }
                "partition.min-atoms-per-section" => {
                    self.partition_mut().min_atoms_per_section = Some(parse_value(key, value)?)
                }
                "partition.max-atoms-per-section" => {
                    self.partition_mut().max_atoms_per_section = Some(parse_value(key, value)?)
                }
                "partition.pad-modulo" => {
                    self.partition_mut().pad_modulo = Some(parse_value(key, value)?)
                }
                "solvent.probe-radius" => {
                    self.solvent_mut().probe_radius = Some(parse_value(key, value)?)
                }
                "solvent.dielectric-in" => {
                    self.solvent_mut().dielectric_in = Some(parse_value(key, value)?)
                }
                "solvent.dielectric-out" => {
                    self.solvent_mut().dielectric_out = Some(parse_value(key, value)?)
                }
                "solvent.dispersion-offset" => {
                    self.solvent_mut().dispersion_offset = Some(parse_value(key, value)?)
                }
                "solvent.probe-volume-coefficient" => {
                    self.solvent_mut().probe_volume_coefficient = Some(parse_value(key, value)?)
                }
                "solvent.probe-volume-min-a" => {
                    self.solvent_mut().probe_volume_min_a = Some(parse_value(key, value)?)
                }
                "solvent.probe-volume-min-b" => {
                    self.solvent_mut().probe_volume_min_b = Some(parse_value(key, value)?)
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    fn model_mut(&mut self) -> &mut PartialModelConfig {
        self.model.get_or_insert_with(Default::default)
    }

    fn tree_mut(&mut self) -> &mut PartialTreeConfig {
        self.tree.get_or_insert_with(Default::default)
    }

    fn partition_mut(&mut self) -> &mut PartialPartitionConfig {
        self.partition.get_or_insert_with(Default::default)
    }

    fn solvent_mut(&mut self) -> &mut PartialSolventConfig {
        self.solvent.get_or_insert_with(Default::default)
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| CliError::Config(format!("Invalid value for {}: '{}' ({})", key, value, e)))
}

fn parse_optional<T>(key: &str, value: Option<&str>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    value.map(|v| parse_value(key, v)).transpose()
}
