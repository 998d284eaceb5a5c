use super::born::{chain_descreening, compute_born_radii};
use super::config::{EngineConfig, Model};
use super::dispersion::dispersion_energy;
use super::error::EngineError;
use super::gb::{born_radius_weights, dielectric_factor, gb_energy};
use super::probes::probe_correction;
use super::term::EnergyTerms;
use crate::core::descreening::{Descreening, SphereDescreening};
use crate::core::gaussian::{atom_gaussians, sphere_volume};
use crate::core::models::system::{ParticleSystem, SystemError};
use crate::core::neighbors::NeighborList;
use crate::tree::{BuildStats, OverlapTree, TreeError, TreeInput};
use nalgebra::Vector3;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Everything one evaluation produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub model: Model,
    pub terms: EnergyTerms,
    /// `∂E/∂x_i` of the total energy.
    pub gradients: Vec<Vector3<f64>>,
    /// Self volumes at the van der Waals radii, including solvent-probe corrections.
    pub self_volumes: Vec<f64>,
    pub free_volumes: Vec<f64>,
    /// Born radii, for the models that compute them.
    pub born_radii: Option<Vec<f64>>,
    pub stats: EvaluationStats,
}

impl Evaluation {
    pub fn energy(&self) -> f64 {
        self.terms.total()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationStats {
    pub tree: BuildStats,
    pub neighbor_pairs: usize,
    pub probe_candidates: usize,
    pub probes: usize,
    pub probe_tree: Option<BuildStats>,
}

/// Radii and hydrogen flags fixed by the first evaluation.
#[derive(Debug, Clone)]
struct BoundSystem {
    radii: Vec<f64>,
    is_hydrogen: Vec<bool>,
}

/// Output of the volume stage shared by every model.
struct VolumeStage {
    surface_area: f64,
    gradients: Vec<Vector3<f64>>,
    self_volumes: Vec<f64>,
    free_volumes: Vec<f64>,
    stats: BuildStats,
}

/// Repeated evaluation of one model over a fixed set of particles.
///
/// The overlap-tree partition is sized on the first evaluation and reused afterwards; call
/// [`Evaluator::reestimate_capacity`] after large conformational changes. Radii and hydrogen
/// flags are bound by the first evaluation and may not change later.
pub struct Evaluator {
    config: EngineConfig,
    descreening: Option<Arc<dyn Descreening>>,
    tree: Option<OverlapTree>,
    bound: Option<BoundSystem>,
}

impl Evaluator {
    /// Creates an evaluator after validating `config`.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            descreening: None,
            tree: None,
            bound: None,
        })
    }

    /// Replaces the default hard-sphere descreening integral.
    pub fn with_descreening(mut self, descreening: Arc<dyn Descreening>) -> Self {
        self.descreening = Some(descreening);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The overlap tree of the last evaluation, if any.
    pub fn tree(&self) -> Option<&OverlapTree> {
        self.tree.as_ref()
    }

    /// Discards the current partition; the next evaluation runs a fresh estimation pass.
    pub fn reestimate_capacity(&mut self) {
        self.tree = None;
    }

    /// Builds the model's primary overlap tree without evaluating any energy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::System`] if the system is inconsistent with earlier
    /// evaluations and [`EngineError::Tree`] if the build fails.
    pub fn build_tree(&mut self, system: &ParticleSystem) -> Result<BuildStats, EngineError> {
        self.bind(system)?;
        let is_hydrogen = system.is_hydrogen();
        let neighbors =
            NeighborList::build(system.positions(), &is_hydrogen, self.config.neighbor_cutoff);
        let (radii, gammas) = self.primary_spheres(system);
        let input = TreeInput::from_spheres(
            system.positions(),
            &radii,
            &sphere_volumes(&radii),
            &gammas,
            &is_hydrogen,
            &neighbors,
        );
        let tree = ensure_tree(&mut self.tree, &input, &self.config)?;
        Ok(tree.build(&input)?)
    }

    /// Evaluates the configured model for the current positions of `system`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::System`] if the particle count, a radius, or a hydrogen flag
    /// changed since the first evaluation, and [`EngineError::Tree`] if a tree section
    /// overflows its capacity.
    #[instrument(skip_all, name = "evaluate", fields(model = %self.config.model, atoms = system.len()))]
    pub fn evaluate(&mut self, system: &ParticleSystem) -> Result<Evaluation, EngineError> {
        self.bind(system)?;
        let positions = system.positions();
        let is_hydrogen = system.is_hydrogen();
        let neighbors = NeighborList::build(positions, &is_hydrogen, self.config.neighbor_cutoff);
        debug!(pairs = neighbors.pair_count(), "Neighbor list built.");

        let stage = match self.config.model {
            Model::GVolSA | Model::Agbnp1 => {
                self.surface_area_stage(system, &is_hydrogen, &neighbors)?
            }
            Model::Agbnp2 => self.volume_stage(system, &is_hydrogen, &neighbors)?,
        };

        let mut stats = EvaluationStats {
            tree: stage.stats,
            neighbor_pairs: neighbors.pair_count(),
            ..EvaluationStats::default()
        };
        let mut terms = EnergyTerms {
            surface_area: stage.surface_area,
            ..EnergyTerms::default()
        };
        let mut gradients = stage.gradients;
        let mut self_volumes = stage.self_volumes;

        let born_radii = if self.config.model.has_solvation() {
            let radii = system.radii();
            let offsets = if self.config.model == Model::Agbnp2 {
                let correction = probe_correction(
                    positions,
                    &radii,
                    &is_hydrogen,
                    &self_volumes,
                    &self.config,
                )?;
                stats.probe_candidates = correction.candidates;
                stats.probes = correction.retained;
                stats.probe_tree = correction.tree;
                for (v, dv) in self_volumes.iter_mut().zip(&correction.self_volume_additions) {
                    *v += dv;
                }
                correction.radius_offsets(&radii)
            } else {
                vec![0.0; system.len()]
            };
            let born = self.solvation_stage(
                system,
                &is_hydrogen,
                &radii,
                &offsets,
                &self_volumes,
                &mut terms,
                &mut gradients,
            )?;
            Some(born)
        } else {
            None
        };

        debug!(
            surface_area = terms.surface_area,
            gb = terms.gb(),
            dispersion = terms.dispersion,
            total = terms.total(),
            "Evaluation complete."
        );

        Ok(Evaluation {
            model: self.config.model,
            terms,
            gradients,
            self_volumes,
            free_volumes: stage.free_volumes,
            born_radii,
            stats,
        })
    }

    /// Radii and weights of the tree that is built from scratch each evaluation.
    fn primary_spheres(&self, system: &ParticleSystem) -> (Vec<f64>, Vec<f64>) {
        match self.config.model {
            Model::GVolSA | Model::Agbnp1 => {
                let offset = self.config.sa_radius_offset;
                let weights = system.gammas().iter().map(|g| g / offset).collect();
                (system.offset_radii(offset), weights)
            }
            Model::Agbnp2 => (system.radii(), vec![1.0; system.len()]),
        }
    }

    /// Surface area as the difference of the weighted volumes at the large and the van der
    /// Waals radii. The tree is built with the large radii and rescanned with the small ones,
    /// leaving it set up with van der Waals volumes.
    fn surface_area_stage(
        &mut self,
        system: &ParticleSystem,
        is_hydrogen: &[bool],
        neighbors: &NeighborList,
    ) -> Result<VolumeStage, EngineError> {
        let positions = system.positions();
        let (large_radii, outer_weights) = self.primary_spheres(system);
        let inner_weights: Vec<f64> = outer_weights.iter().map(|w| -w).collect();
        let input = TreeInput::from_spheres(
            positions,
            &large_radii,
            &sphere_volumes(&large_radii),
            &outer_weights,
            is_hydrogen,
            neighbors,
        );

        let tree = ensure_tree(&mut self.tree, &input, &self.config)?;
        let stats = tree.build(&input)?;
        let outer = tree.compute_self_volumes()?;

        let radii = system.radii();
        let small = atom_gaussians(positions, &radii, &sphere_volumes(&radii));
        let inner = tree.rescan_volumes(&small, &inner_weights)?;

        let mut gradients = outer.gradients;
        accumulate(&mut gradients, &inner.gradients);
        Ok(VolumeStage {
            surface_area: outer.energy + inner.energy,
            gradients,
            self_volumes: inner.self_volumes,
            free_volumes: inner.free_volumes,
            stats,
        })
    }

    /// Van der Waals self volumes only; the volume energy is not part of the model.
    fn volume_stage(
        &mut self,
        system: &ParticleSystem,
        is_hydrogen: &[bool],
        neighbors: &NeighborList,
    ) -> Result<VolumeStage, EngineError> {
        let (radii, weights) = self.primary_spheres(system);
        let input = TreeInput::from_spheres(
            system.positions(),
            &radii,
            &sphere_volumes(&radii),
            &weights,
            is_hydrogen,
            neighbors,
        );
        let tree = ensure_tree(&mut self.tree, &input, &self.config)?;
        let stats = tree.build(&input)?;
        let volumes = tree.compute_self_volumes()?;
        Ok(VolumeStage {
            surface_area: 0.0,
            gradients: vec![Vector3::zeros(); system.len()],
            self_volumes: volumes.self_volumes,
            free_volumes: volumes.free_volumes,
            stats,
        })
    }

    /// Born radii, GB and dispersion energies, and their gradients.
    ///
    /// The part of the gradient that flows through the self volumes is obtained with two
    /// gamma rescans of the van der Waals tree, weighted by the descreening derivatives.
    #[allow(clippy::too_many_arguments)]
    fn solvation_stage(
        &mut self,
        system: &ParticleSystem,
        is_hydrogen: &[bool],
        radii: &[f64],
        radius_offsets: &[f64],
        self_volumes: &[f64],
        terms: &mut EnergyTerms,
        gradients: &mut [Vector3<f64>],
    ) -> Result<Vec<f64>, EngineError> {
        let positions = system.positions();
        let params = system.params();
        let charges: Vec<f64> = params.iter().map(|p| p.charge).collect();
        let alphas: Vec<f64> = params.iter().map(|p| p.alpha).collect();
        let solvent = self.config.solvent;
        let cutoff = self.config.descreening_cutoff;
        let descreening = Arc::clone(self.descreening.get_or_insert_with(|| {
            Arc::new(SphereDescreening::new(radii.to_vec(), cutoff)) as Arc<dyn Descreening>
        }));

        let born = compute_born_radii(
            positions,
            radii,
            radius_offsets,
            is_hydrogen,
            self_volumes,
            descreening.as_ref(),
        );

        let factor = dielectric_factor(solvent.dielectric_in, solvent.dielectric_out);
        let gb = gb_energy(positions, &charges, &born.radii, factor);
        let gb_weights = born_radius_weights(&charges, &born, &gb.born_derivative_sums, factor);
        let dispersion = dispersion_energy(&alphas, &born, solvent.dispersion_offset);

        terms.gb_self = gb.self_energy;
        terms.gb_pair = gb.pair_energy;
        terms.dispersion = dispersion.energy;

        accumulate(gradients, &gb.gradients);
        for weights in [&gb_weights, &dispersion.born_radius_weights] {
            let chain =
                chain_descreening(positions, is_hydrogen, &born, weights, descreening.as_ref());
            accumulate(gradients, &chain.gradients);

            let volume_weights = chain.volume_weights(radii);
            let tree = self.tree.as_mut().ok_or(TreeError::EmptyTree)?;
            let rescanned = tree.rescan_gammas(&volume_weights)?;
            accumulate(gradients, &rescanned.gradients);
        }

        Ok(born.radii)
    }

    /// Records the radii and hydrogen flags of the first system and checks later ones
    /// against them.
    fn bind(&mut self, system: &ParticleSystem) -> Result<(), SystemError> {
        let radii = system.radii();
        let is_hydrogen = system.is_hydrogen();
        let Some(bound) = &self.bound else {
            self.bound = Some(BoundSystem { radii, is_hydrogen });
            return Ok(());
        };

        if bound.radii.len() != radii.len() {
            return Err(SystemError::ParticleCountChanged {
                expected: bound.radii.len(),
                found: radii.len(),
            });
        }
        if let Some(atom) = (0..radii.len()).find(|&i| bound.is_hydrogen[i] != is_hydrogen[i]) {
            return Err(SystemError::HydrogenFlagChanged { atom });
        }
        if let Some(atom) = (0..radii.len()).find(|&i| (bound.radii[i] - radii[i]).abs() > 1e-6) {
            return Err(SystemError::RadiusChanged {
                atom,
                old: bound.radii[atom],
                new: radii[atom],
            });
        }
        Ok(())
    }
}

/// Returns the cached tree, estimating its capacity from `input` first if there is none.
fn ensure_tree<'a>(
    slot: &'a mut Option<OverlapTree>,
    input: &TreeInput<'_>,
    config: &EngineConfig,
) -> Result<&'a mut OverlapTree, TreeError> {
    let tree = match slot.take() {
        Some(tree) => tree,
        None => {
            let tree = OverlapTree::with_estimated_capacity(input, config.tree, &config.partition)?;
            info!(
                sections = tree.partition().num_sections(),
                capacity = tree.partition().total_capacity(),
                "Overlap tree capacity estimated."
            );
            tree
        }
    };
    Ok(slot.insert(tree))
}

fn sphere_volumes(radii: &[f64]) -> Vec<f64> {
    radii.iter().map(|&r| sphere_volume(r)).collect()
}

fn accumulate(target: &mut [Vector3<f64>], source: &[Vector3<f64>]) {
    for (t, s) in target.iter_mut().zip(source) {
        *t += s;
    }
}
