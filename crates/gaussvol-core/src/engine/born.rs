use crate::core::descreening::Descreening;
use crate::core::gaussian::sphere_volume;
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// `1/(4π)`.
pub const PIFAC: f64 = 1.0 / (4.0 * PI);

/// Bounds the inverse Born radius from below.
///
/// Returns `t = sqrt(a² + β²)` and `dt/dβ = β/t`. Descreening can overshoot and drive `β`
/// negative, in which case `t = a` with a zero derivative, so no Born radius ever exceeds
/// `1/a`.
///
/// # Arguments
///
/// * `beta` - Raw inverse Born radius.
/// * `min_inverse` - The floor `a`, the inverse of the largest allowed Born radius.
#[inline]
pub fn switch_inverse_radius(beta: f64, min_inverse: f64) -> (f64, f64) {
    if beta < 0.0 {
        return (min_inverse, 0.0);
    }
    let t = (min_inverse * min_inverse + beta * beta).sqrt();
    (t, beta / t)
}

/// Born radii and the quantities their derivatives are built from.
#[derive(Debug, Clone, PartialEq)]
pub struct BornRadii {
    pub radii: Vec<f64>,
    /// Raw inverse radii `β_i` before switching.
    pub inverse: Vec<f64>,
    /// `dt/dβ` of the inverse-radius switch.
    pub switch_derivative: Vec<f64>,
    /// `self_volume / (4/3·π·r³)` of every atom, zero for hydrogens.
    pub scaling_factors: Vec<f64>,
}

impl BornRadii {
    pub fn len(&self) -> usize {
        self.radii.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }
}

/// Computes Born radii by pairwise descreening weighted with self volumes.
///
/// `β_i = 1/(r_i + Δr_i) - Σ_j sf_j·Q(d_ij, i, j)/(4π)` over heavy `j ≠ i` closer than the
/// descreening range.
///
/// # Arguments
///
/// * `radii` - Van der Waals radii.
/// * `radius_offsets` - Per-atom `Δr_i` added to the bare radius; zeros when there is none.
/// * `self_volumes` - Self volumes at the van der Waals radii.
pub fn compute_born_radii(
    positions: &[Point3<f64>],
    radii: &[f64],
    radius_offsets: &[f64],
    is_hydrogen: &[bool],
    self_volumes: &[f64],
    descreening: &dyn Descreening,
) -> BornRadii {
    let n = positions.len();
    let max_distance = descreening.max_distance();
    let min_inverse = 1.0 / max_distance;

    let scaling_factors: Vec<f64> = (0..n)
        .map(|j| {
            if is_hydrogen[j] {
                0.0
            } else {
                self_volumes[j] / sphere_volume(radii[j])
            }
        })
        .collect();

    #[cfg(not(feature = "parallel"))]
    let iterator = 0..n;

    #[cfg(feature = "parallel")]
    let iterator = (0..n).into_par_iter();

    let inverse: Vec<f64> = iterator
        .map(|i| {
            let mut beta = 1.0 / (radii[i] + radius_offsets[i]);
            for j in 0..n {
                if j == i || is_hydrogen[j] {
                    continue;
                }
                let d = (positions[j] - positions[i]).norm();
                if d < max_distance {
                    beta -= PIFAC * scaling_factors[j] * descreening.eval(d, i, j).0;
                }
            }
            beta
        })
        .collect();

    let (radii, switch_derivative) = inverse
        .iter()
        .map(|&beta| {
            let (t, fp) = switch_inverse_radius(beta, min_inverse);
            (1.0 / t, fp)
        })
        .unzip();

    BornRadii {
        radii,
        inverse,
        switch_derivative,
        scaling_factors,
    }
}

/// Result of propagating Born-radius derivatives through the descreening sums.
#[derive(Debug, Clone, PartialEq)]
pub struct DescreeningChain {
    /// `W_j = Σ_i c_i·Q_ij`: derivative of the energy with respect to the scaling factor of
    /// screener `j`.
    pub scaling_weights: Vec<f64>,
    /// Position gradient at fixed self volumes.
    pub gradients: Vec<Vector3<f64>>,
}

impl DescreeningChain {
    /// Converts the scaling-factor weights into per-atom volume weights `W_j/(4/3·π·r_j³)`,
    /// ready to be used as the weights of a gamma rescan.
    pub fn volume_weights(&self, radii: &[f64]) -> Vec<f64> {
        self.scaling_weights
            .iter()
            .zip(radii)
            .map(|(w, &r)| w / sphere_volume(r))
            .collect()
    }
}

/// Chains per-atom energy derivatives `c_i = -(1/4π)·dE/dβ_i` through the descreening sums.
///
/// Every pair `(i, j)` with screener `j` heavy contributes
/// `w = (x_j - x_i)·c_i·sf_j·Q'(d)/d` to the gradient of `j` and `-w` to that of `i`.
/// Atoms are processed independently so the result is deterministic in parallel builds.
pub fn chain_descreening(
    positions: &[Point3<f64>],
    is_hydrogen: &[bool],
    born: &BornRadii,
    weights: &[f64],
    descreening: &dyn Descreening,
) -> DescreeningChain {
    let n = positions.len();
    let max_distance = descreening.max_distance();
    let sf = &born.scaling_factors;

    #[cfg(not(feature = "parallel"))]
    let iterator = 0..n;

    #[cfg(feature = "parallel")]
    let iterator = (0..n).into_par_iter();

    let (scaling_weights, gradients) = iterator
        .map(|k| {
            let mut w_k = 0.0;
            let mut gradient = Vector3::zeros();
            for other in 0..n {
                if other == k {
                    continue;
                }
                let dist = positions[other] - positions[k];
                let d = dist.norm();
                if d <= 0.0 || d >= max_distance {
                    continue;
                }
                // k screened by a heavy `other`.
                if !is_hydrogen[other] {
                    let (_, dq) = descreening.eval(d, k, other);
                    gradient -= dist * (weights[k] * sf[other] * dq / d);
                }
                // k screening `other`.
                if !is_hydrogen[k] {
                    let (q, dq) = descreening.eval(d, other, k);
                    w_k += weights[other] * q;
                    gradient -= dist * (weights[other] * sf[k] * dq / d);
                }
            }
            (w_k, gradient)
        })
        .unzip();

    DescreeningChain {
        scaling_weights,
        gradients,
    }
}
