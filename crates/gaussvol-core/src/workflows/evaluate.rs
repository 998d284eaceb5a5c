use crate::core::io::atoms::AtomResult;
use crate::core::models::system::ParticleSystem;
use crate::engine::config::EngineConfig;
use crate::engine::error::EngineError;
use crate::engine::evaluator::{Evaluation, Evaluator};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub evaluation: Evaluation,
    pub atoms: Vec<AtomResult>,
}

#[instrument(skip_all, name = "evaluation_workflow")]
pub fn run(system: &ParticleSystem, config: &EngineConfig) -> Result<EvaluationResult, EngineError> {
    info!(
        model = %config.model,
        atoms = system.len(),
        "Starting evaluation workflow."
    );

    let mut evaluator = Evaluator::new(config.clone())?;
    let evaluation = evaluator.evaluate(system)?;

    info!(
        energy = evaluation.energy(),
        surface_area = evaluation.terms.surface_area,
        gb = evaluation.terms.gb(),
        dispersion = evaluation.terms.dispersion,
        nodes = evaluation.stats.tree.nodes,
        "Evaluation workflow finished."
    );

    let atoms = atom_results(&evaluation);
    Ok(EvaluationResult { evaluation, atoms })
}

/// Flattens an evaluation into one result row per atom. Atoms without a Born radius report 0.
pub fn atom_results(evaluation: &Evaluation) -> Vec<AtomResult> {
    evaluation
        .self_volumes
        .iter()
        .zip(&evaluation.free_volumes)
        .zip(&evaluation.gradients)
        .enumerate()
        .map(|(atom, ((&self_volume, &free_volume), gradient))| AtomResult {
            atom,
            self_volume,
            free_volume,
            born_radius: evaluation
                .born_radii
                .as_ref()
                .map_or(0.0, |radii| radii[atom]),
            gx: gradient.x,
            gy: gradient.y,
            gz: gradient.z,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::AtomParams;
    use crate::engine::config::Model;
    use nalgebra::Point3;

    fn system() -> ParticleSystem {
        let params = vec![
            AtomParams {
                radius: 1.7,
                gamma: 0.01,
                alpha: -0.1,
                charge: 0.3,
                is_hydrogen: false,
            },
            AtomParams {
                radius: 1.5,
                gamma: 0.02,
                alpha: -0.2,
                charge: -0.3,
                is_hydrogen: false,
            },
        ];
        let positions = vec![Point3::origin(), Point3::new(2.5, 0.0, 0.0)];
        ParticleSystem::new(params, positions).unwrap()
    }

    #[test]
    fn run_produces_one_row_per_atom() {
        let config = EngineConfig::builder().model(Model::GVolSA).build().unwrap();
        let result = run(&system(), &config).unwrap();
        assert_eq!(result.atoms.len(), 2);
        for (i, row) in result.atoms.iter().enumerate() {
            assert_eq!(row.atom, i);
            assert_eq!(row.self_volume, result.evaluation.self_volumes[i]);
            assert_eq!(row.gx, result.evaluation.gradients[i].x);
            assert_eq!(row.born_radius, 0.0);
        }
    }

    #[test]
    fn run_reports_born_radii_for_solvation_models() {
        let config = EngineConfig::builder().model(Model::Agbnp1).build().unwrap();
        let result = run(&system(), &config).unwrap();
        assert!(result.atoms.iter().all(|row| row.born_radius > 0.0));
    }

    #[test]
    fn run_rejects_invalid_config() {
        let mut config = EngineConfig::builder().model(Model::GVolSA).build().unwrap();
        config.neighbor_cutoff = -1.0;
        assert!(matches!(
            run(&system(), &config),
            Err(EngineError::Config { .. })
        ));
    }
}
