use super::born::{BornRadii, PIFAC};

/// Solute–solvent dispersion energy `Σ_i α_i/(B_i + h)³`.
#[derive(Debug, Clone, PartialEq)]
pub struct DispersionEnergy {
    pub energy: f64,
    /// Per-atom descreening weights `c_i = -(1/4π)·3α_i·B_i²·t'_i/(B_i + h)⁴`.
    pub born_radius_weights: Vec<f64>,
}

pub fn dispersion_energy(alphas: &[f64], born: &BornRadii, offset: f64) -> DispersionEnergy {
    let mut energy = 0.0;
    let born_radius_weights = alphas
        .iter()
        .zip(&born.radii)
        .zip(&born.switch_derivative)
        .map(|((&alpha, &b), &fp)| {
            let shifted = b + offset;
            energy += alpha / shifted.powi(3);
            -PIFAC * 3.0 * alpha * b * b * fp / shifted.powi(4)
        })
        .collect();
    DispersionEnergy {
        energy,
        born_radius_weights,
    }
}
