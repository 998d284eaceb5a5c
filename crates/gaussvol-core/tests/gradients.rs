mod common;

use common::Cluster;
use gaussvol::core::models::atom::AtomParams;
use gaussvol::core::models::system::ParticleSystem;
use gaussvol::engine::config::{EngineConfig, Model};
use gaussvol::engine::error::EngineError;
use gaussvol::engine::evaluator::Evaluator;
use gaussvol::tree::{OverlapTree, Partition, PartitionSettings, TreeError, TreeSettings};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const NEIGHBOR_CUTOFF: f64 = 8.0;
const STEP: f64 = 1e-5;

fn tree_for(cluster: &Cluster) -> OverlapTree {
    OverlapTree::new(
        Partition::with_sections(&cluster.is_hydrogen, 2, 4096),
        TreeSettings::default(),
    )
}

fn built_energy(cluster: &Cluster, gammas: &[f64]) -> f64 {
    let neighbors = cluster.neighbors(NEIGHBOR_CUTOFF);
    let mut input = cluster.input(&neighbors);
    input.gammas = gammas.to_vec();
    let mut tree = tree_for(cluster);
    tree.build(&input).unwrap();
    tree.compute_self_volumes().unwrap().energy
}

fn assert_close(analytic: &[Vector3<f64>], cluster: &Cluster, gammas: &[f64]) {
    for atom in 0..cluster.len() {
        for axis in 0..3 {
            let plus = built_energy(&cluster.moved(atom, axis, STEP), gammas);
            let minus = built_energy(&cluster.moved(atom, axis, -STEP), gammas);
            let numerical = (plus - minus) / (2.0 * STEP);
            assert!(
                (analytic[atom][axis] - numerical).abs() < 1e-5 * (1.0 + numerical.abs()),
                "atom {atom} axis {axis}: {} vs {numerical}",
                analytic[atom][axis]
            );
        }
    }
}

#[test]
fn build_gradient_matches_finite_difference() {
    let cluster = Cluster::lattice(2, 2.1, 41);
    let neighbors = cluster.neighbors(NEIGHBOR_CUTOFF);
    let mut tree = tree_for(&cluster);
    tree.build(&cluster.input(&neighbors)).unwrap();
    let result = tree.compute_self_volumes().unwrap();
    assert_close(&result.gradients, &cluster, &cluster.gammas);
}

#[test]
fn gamma_rescan_gradient_matches_finite_difference_of_the_reweighted_energy() {
    let cluster = Cluster::lattice(2, 2.1, 43);
    let neighbors = cluster.neighbors(NEIGHBOR_CUTOFF);
    let mut tree = tree_for(&cluster);
    tree.build(&cluster.input(&neighbors)).unwrap();

    let mut rng = StdRng::seed_from_u64(44);
    let weights: Vec<f64> = (0..cluster.len()).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let result = tree.rescan_gammas(&weights).unwrap();
    assert_close(&result.gradients, &cluster, &weights);
}

fn random_molecule(seed: u64) -> ParticleSystem {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut params = Vec::new();
    let mut positions = Vec::new();
    for i in 0..6 {
        let center = Point3::new(1.6 * i as f64, 0.0, 0.0)
            + Vector3::new(
                rng.gen_range(-0.2..0.2),
                rng.gen_range(-0.4..0.4),
                rng.gen_range(-0.4..0.4),
            );
        params.push(
            AtomParams::heavy(rng.gen_range(1.5..1.9))
                .with_gamma(rng.gen_range(0.005..0.03))
                .with_alpha(rng.gen_range(-1.5..-0.5))
                .with_charge(rng.gen_range(-0.5..0.5)),
        );
        positions.push(center);
        if i % 2 == 0 {
            params.push(
                AtomParams::hydrogen(1.1)
                    .with_alpha(-0.1)
                    .with_charge(rng.gen_range(0.0..0.4)),
            );
            positions.push(center + Vector3::new(0.0, 1.0, 0.3));
        }
    }
    ParticleSystem::new(params, positions).unwrap()
}

fn model_energy(model: Model, system: &ParticleSystem, positions: &[Point3<f64>]) -> f64 {
    let mut moved = system.clone();
    moved.set_positions(positions.to_vec()).unwrap();
    let config = EngineConfig::builder().model(model).build().unwrap();
    Evaluator::new(config).unwrap().evaluate(&moved).unwrap().energy()
}

#[test]
fn model_gradients_match_finite_difference_with_hydrogens() {
    let system = random_molecule(7);
    for model in [Model::GVolSA, Model::Agbnp1] {
        let config = EngineConfig::builder().model(model).build().unwrap();
        let evaluation = Evaluator::new(config).unwrap().evaluate(&system).unwrap();
        let mut positions = system.positions().to_vec();
        for atom in 0..system.len() {
            for axis in 0..3 {
                let original = positions[atom][axis];
                positions[atom][axis] = original + STEP;
                let plus = model_energy(model, &system, &positions);
                positions[atom][axis] = original - STEP;
                let minus = model_energy(model, &system, &positions);
                positions[atom][axis] = original;
                let numerical = (plus - minus) / (2.0 * STEP);
                let analytic = evaluation.gradients[atom][axis];
                assert!(
                    (analytic - numerical).abs() < 1e-4 * (1.0 + numerical.abs()),
                    "{model} atom {atom} axis {axis}: {analytic} vs {numerical}"
                );
            }
        }
    }
}

#[test]
fn compressing_a_system_overflows_until_capacity_is_reestimated() {
    let params = vec![AtomParams::heavy(1.6).with_gamma(0.02); 6];
    let spread: Vec<Point3<f64>> = (0..6).map(|i| Point3::new(10.0 * i as f64, 0.0, 0.0)).collect();
    let mut system = ParticleSystem::new(params, spread).unwrap();
    let config = EngineConfig::builder()
        .model(Model::GVolSA)
        .partition(PartitionSettings {
            pad_modulo: 1,
            ..PartitionSettings::default()
        })
        .build()
        .unwrap();
    let mut evaluator = Evaluator::new(config).unwrap();
    evaluator.evaluate(&system).unwrap();

    let compressed: Vec<Point3<f64>> = (0..6)
        .map(|i| Point3::new(0.5 * (i % 3) as f64, 0.5 * (i / 3) as f64, 0.0))
        .collect();
    system.set_positions(compressed).unwrap();
    let err = evaluator.evaluate(&system).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Tree {
            source: TreeError::CapacityOverflow { .. }
        }
    ));

    evaluator.reestimate_capacity();
    let evaluation = evaluator.evaluate(&system).unwrap();
    assert!(evaluation.stats.tree.nodes > 6);
}
