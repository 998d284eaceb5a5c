#![allow(dead_code)]

use gaussvol::core::gaussian::sphere_volume;
use gaussvol::core::neighbors::NeighborList;
use gaussvol::tree::TreeInput;
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const TOLERANCE: f64 = 1e-9;

pub fn f64_approx_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < TOLERANCE * (1.0 + a.abs().max(b.abs()))
}

/// A set of heavy spheres with fixed radii and weights.
pub struct Cluster {
    pub positions: Vec<Point3<f64>>,
    pub radii: Vec<f64>,
    pub gammas: Vec<f64>,
    pub is_hydrogen: Vec<bool>,
}

impl Cluster {
    /// Jittered cubic lattice with spacing `spacing`, so that neighbors overlap but no atom
    /// sits on top of another.
    pub fn lattice(per_side: usize, spacing: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut positions = Vec::new();
        for i in 0..per_side {
            for j in 0..per_side {
                for k in 0..per_side {
                    let jitter = Vector3::new(
                        rng.gen_range(-0.25..0.25),
                        rng.gen_range(-0.25..0.25),
                        rng.gen_range(-0.25..0.25),
                    );
                    positions.push(
                        Point3::new(i as f64, j as f64, k as f64) * spacing + jitter,
                    );
                }
            }
        }
        let n = positions.len();
        let radii = (0..n).map(|_| rng.gen_range(1.4..1.9)).collect();
        let gammas = (0..n).map(|_| rng.gen_range(0.005..0.05)).collect();
        Self {
            positions,
            radii,
            gammas,
            is_hydrogen: vec![false; n],
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.radii.iter().map(|&r| sphere_volume(r)).collect()
    }

    pub fn neighbors(&self, cutoff: f64) -> NeighborList {
        NeighborList::build(&self.positions, &self.is_hydrogen, cutoff)
    }

    pub fn input<'a>(&'a self, neighbors: &'a NeighborList) -> TreeInput<'a> {
        TreeInput::from_spheres(
            &self.positions,
            &self.radii,
            &self.volumes(),
            &self.gammas,
            &self.is_hydrogen,
            neighbors,
        )
    }

    pub fn moved(&self, atom: usize, axis: usize, step: f64) -> Self {
        let mut positions = self.positions.clone();
        positions[atom][axis] += step;
        Self {
            positions,
            radii: self.radii.clone(),
            gammas: self.gammas.clone(),
            is_hydrogen: self.is_hydrogen.clone(),
        }
    }
}
