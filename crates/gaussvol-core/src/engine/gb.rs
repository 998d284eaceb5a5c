use super::born::{BornRadii, PIFAC};
use nalgebra::{Point3, Vector3};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Coulomb's constant in kcal·Å/(mol·e²).
pub const COULOMB_CONSTANT: f64 = 332.0637;

/// `-½·k·(1/ε_in - 1/ε_out)`, the prefactor of the generalized-Born energy.
pub fn dielectric_factor(dielectric_in: f64, dielectric_out: f64) -> f64 {
    -0.5 * COULOMB_CONSTANT * (1.0 / dielectric_in - 1.0 / dielectric_out)
}

/// Generalized-Born energy with its explicit position gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct GbEnergy {
    pub self_energy: f64,
    pub pair_energy: f64,
    /// Gradient at fixed Born radii.
    pub gradients: Vec<Vector3<f64>>,
    /// `Y_i = Σ_j q_i·q_j·(B_iB_j + d²/4)·e^{-d²/4B_iB_j}·f⁻³`, which enters the Born-radius
    /// derivative of the pair energy.
    pub born_derivative_sums: Vec<f64>,
}

/// Evaluates the Still-type generalized-Born energy.
///
/// `E = Σ_i f·q_i²/B_i + Σ_{i<j} 2·f·q_i·q_j / sqrt(d² + B_iB_j·exp(-d²/4B_iB_j))`.
/// Every atom gathers its own pair terms, so each pair is visited twice; the pair energy is
/// summed from the `j > i` half.
pub fn gb_energy(
    positions: &[Point3<f64>],
    charges: &[f64],
    born_radii: &[f64],
    factor: f64,
) -> GbEnergy {
    let n = positions.len();

    #[cfg(not(feature = "parallel"))]
    let iterator = 0..n;

    #[cfg(feature = "parallel")]
    let iterator = (0..n).into_par_iter();

    let per_atom: Vec<(f64, f64, Vector3<f64>, f64)> = iterator
        .map(|i| {
            let qi = charges[i];
            let bi = born_radii[i];
            let self_energy = factor * qi * qi / bi;
            let mut pair_energy = 0.0;
            let mut gradient = Vector3::zeros();
            let mut y = 0.0;
            for j in 0..n {
                if j == i {
                    continue;
                }
                let dist = positions[j] - positions[i];
                let d2 = dist.norm_squared();
                let qqf = qi * charges[j];
                let qq = factor * qqf;
                let bb = bi * born_radii[j];
                let etij = (-0.25 * d2 / bb).exp();
                let fgb = 1.0 / (d2 + bb * etij).sqrt();
                let fgb3 = fgb * fgb * fgb;
                if j > i {
                    pair_energy += 2.0 * qq * fgb;
                }
                let mw = -2.0 * qq * (1.0 - 0.25 * etij) * fgb3;
                gradient -= dist * mw;
                y += qqf * (bb + 0.25 * d2) * etij * fgb3;
            }
            (self_energy, pair_energy, gradient, y)
        })
        .collect();

    let mut result = GbEnergy {
        self_energy: 0.0,
        pair_energy: 0.0,
        gradients: Vec::with_capacity(n),
        born_derivative_sums: Vec::with_capacity(n),
    };
    for (self_energy, pair_energy, gradient, y) in per_atom {
        result.self_energy += self_energy;
        result.pair_energy += pair_energy;
        result.gradients.push(gradient);
        result.born_derivative_sums.push(y);
    }
    result
}

/// Per-atom descreening weights `c_i = -(1/4π)·f·(q_i² + Y_i·B_i)·t'_i` of the GB energy.
pub fn born_radius_weights(
    charges: &[f64],
    born: &BornRadii,
    born_derivative_sums: &[f64],
    factor: f64,
) -> Vec<f64> {
    charges
        .iter()
        .zip(&born.radii)
        .zip(born_derivative_sums)
        .zip(&born.switch_derivative)
        .map(|(((&q, &b), &y), &fp)| -PIFAC * factor * (q * q + y * b) * fp)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE * (1.0 + a.abs().max(b.abs()))
    }

    fn system() -> (Vec<Point3<f64>>, Vec<f64>, Vec<f64>) {
        (
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(2.9, 0.3, -0.4),
                Point3::new(0.8, 3.4, 1.1),
            ],
            vec![0.4, -0.6, 0.25],
            vec![1.9, 2.3, 1.7],
        )
    }

    fn total(positions: &[Point3<f64>], charges: &[f64], radii: &[f64], factor: f64) -> f64 {
        let gb = gb_energy(positions, charges, radii, factor);
        gb.self_energy + gb.pair_energy
    }

    #[test]
    fn dielectric_factor_is_negative_for_polar_solvent() {
        let f = dielectric_factor(1.0, 80.0);
        assert!(f64_approx_equal(f, -0.5 * 332.0637 * (1.0 - 1.0 / 80.0)));
        assert_eq!(dielectric_factor(4.0, 4.0), 0.0);
    }

    #[test]
    fn single_ion_matches_born_formula() {
        let f = dielectric_factor(1.0, 80.0);
        let gb = gb_energy(&[Point3::origin()], &[1.0], &[2.0], f);
        assert!(f64_approx_equal(gb.self_energy, f / 2.0));
        assert_eq!(gb.pair_energy, 0.0);
        assert_eq!(gb.gradients[0], Vector3::zeros());
    }

    #[test]
    fn distant_pair_approaches_screened_coulomb() {
        let f = dielectric_factor(1.0, 80.0);
        let d = 200.0;
        let gb = gb_energy(
            &[Point3::origin(), Point3::new(d, 0.0, 0.0)],
            &[1.0, -1.0],
            &[1.5, 1.5],
            f,
        );
        assert!((gb.pair_energy - (-2.0 * f / d)).abs() < 1e-8);
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let (positions, charges, radii) = system();
        let f = dielectric_factor(1.0, 80.0);
        let gb = gb_energy(&positions, &charges, &radii, f);
        let h = 1e-6;
        for atom in 0..positions.len() {
            for axis in 0..3 {
                let mut plus = positions.clone();
                plus[atom][axis] += h;
                let mut minus = positions.clone();
                minus[atom][axis] -= h;
                let numerical = (total(&plus, &charges, &radii, f)
                    - total(&minus, &charges, &radii, f))
                    / (2.0 * h);
                assert!(
                    (gb.gradients[atom][axis] - numerical).abs() < 1e-5,
                    "atom {atom} axis {axis}: {} vs {numerical}",
                    gb.gradients[atom][axis]
                );
            }
        }
    }

    #[test]
    fn born_derivative_sums_match_finite_difference_of_pair_energy() {
        let (positions, charges, radii) = system();
        let f = dielectric_factor(1.0, 80.0);
        let gb = gb_energy(&positions, &charges, &radii, f);
        let h = 1e-6;
        for i in 0..radii.len() {
            let mut plus = radii.clone();
            plus[i] += h;
            let mut minus = radii.clone();
            minus[i] -= h;
            let numerical = (gb_energy(&positions, &charges, &plus, f).pair_energy
                - gb_energy(&positions, &charges, &minus, f).pair_energy)
                / (2.0 * h);
            // dE_pair/dB_i = -f·Y_i/B_i
            let analytic = -f * gb.born_derivative_sums[i] / radii[i];
            assert!(
                (analytic - numerical).abs() < 1e-5,
                "atom {i}: {analytic} vs {numerical}"
            );
        }
    }
}
