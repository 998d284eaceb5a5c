use std::f64::consts::PI;

/// Pairwise descreening integral used by the Born-radius calculation.
///
/// `eval` returns `Q(d)`, the integral of `|r|⁻⁴` over the part of the screener atom that lies
/// outside the screened atom, together with `dQ/dd`. Implementations must be cheap to call
/// from many threads at once.
pub trait Descreening: Send + Sync {
    /// Pairs farther apart than this distance do not descreen each other.
    fn max_distance(&self) -> f64;

    /// Returns `(Q, dQ/dd)` for the screened atom `screened` and the screener `screener`
    /// separated by `distance`.
    fn eval(&self, distance: f64, screened: usize, screener: usize) -> (f64, f64);
}

/// Analytic descreening of hard spheres.
///
/// The screened atom is a sphere of its own radius; the screener is a sphere of its radius.
/// The closed form is the classic pairwise descreening integral, including the branch in
/// which the screened center sits inside the screener.
#[derive(Debug, Clone)]
pub struct SphereDescreening {
    radii: Vec<f64>,
    max_distance: f64,
}

impl SphereDescreening {
    pub fn new(radii: Vec<f64>, max_distance: f64) -> Self {
        Self {
            radii,
            max_distance,
        }
    }

    pub fn radii(&self) -> &[f64] {
        &self.radii
    }
}

impl Descreening for SphereDescreening {
    fn max_distance(&self) -> f64 {
        self.max_distance
    }

    fn eval(&self, distance: f64, screened: usize, screener: usize) -> (f64, f64) {
        sphere_integral(distance, self.radii[screened], self.radii[screener])
    }
}

/// `4π·I(d)` where `I` is the descreening integral of a sphere of radius `big_r` at distance
/// `d` seen from a sphere of radius `rho`.
pub fn sphere_integral(d: f64, rho: f64, big_r: f64) -> (f64, f64) {
    const FOUR_PI: f64 = 4.0 * PI;

    if d < 1e-8 {
        // Concentric spheres: only the shell between rho and big_r descreens.
        return if big_r > rho {
            (FOUR_PI * (1.0 / rho - 1.0 / big_r), 0.0)
        } else {
            (0.0, 0.0)
        };
    }

    let upper = d + big_r;
    if upper <= rho {
        return (0.0, 0.0);
    }

    let (lower, dl) = if d - big_r > rho {
        let l = 1.0 / (d - big_r);
        (d - big_r, -l * l)
    } else if big_r - d > rho {
        let l = 1.0 / (big_r - d);
        (big_r - d, l * l)
    } else {
        (rho, 0.0)
    };

    let l = 1.0 / lower;
    let u = 1.0 / upper;
    let du = -u * u;
    let l2 = l * l;
    let u2 = u * u;
    let r2 = big_r * big_r;
    let log_ratio = (u / l).ln();
    let inv_d = 1.0 / d;

    let mut term = l - u + 0.25 * d * (u2 - l2) + 0.5 * inv_d * log_ratio
        + 0.25 * r2 * inv_d * (l2 - u2);
    let mut dterm = dl - du + 0.25 * (u2 - l2) + 0.5 * d * (u * du - l * dl)
        - 0.5 * inv_d * inv_d * log_ratio
        + 0.5 * inv_d * (du / u - dl / l)
        - 0.25 * r2 * inv_d * inv_d * (l2 - u2)
        + 0.5 * r2 * inv_d * (l * dl - u * du);

    if rho < big_r - d {
        term += 2.0 * (1.0 / rho - l);
        dterm -= 2.0 * dl;
    }

    (0.5 * FOUR_PI * term, 0.5 * FOUR_PI * dterm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finite_difference(d: f64, rho: f64, big_r: f64) -> f64 {
        let h = 1e-6;
        (sphere_integral(d + h, rho, big_r).0 - sphere_integral(d - h, rho, big_r).0) / (2.0 * h)
    }

    #[test]
    fn far_screener_behaves_like_a_point_volume() {
        let (rho, big_r) = (1.5, 1.7);
        let d = 60.0;
        let (q, _) = sphere_integral(d, rho, big_r);
        let point = 4.0 / 3.0 * PI * big_r.powi(3) / d.powi(4);
        assert!((q / point - 1.0).abs() < 1e-2, "{q} vs {point}");
    }

    #[test]
    fn screener_buried_in_screened_atom_does_not_descreen() {
        assert_eq!(sphere_integral(0.2, 2.0, 1.0), (0.0, 0.0));
    }

    #[test]
    fn concentric_larger_screener_descreens_the_shell() {
        let (q, dq) = sphere_integral(0.0, 1.0, 2.0);
        assert!((q - 4.0 * PI * 0.5).abs() < 1e-12);
        assert_eq!(dq, 0.0);
    }

    #[test]
    fn integral_decreases_with_distance() {
        let mut previous = f64::INFINITY;
        for k in 1..40 {
            let d = 3.5 + 0.25 * k as f64;
            let (q, dq) = sphere_integral(d, 1.6, 1.8);
            assert!(q < previous);
            assert!(dq < 0.0);
            previous = q;
        }
    }

    #[test]
    fn derivative_matches_finite_difference_in_every_branch() {
        // Disjoint spheres, intersecting spheres, and screened center inside the screener.
        for &(d, rho, big_r) in &[(4.0, 1.5, 1.7), (2.0, 1.5, 1.7), (0.5, 0.8, 2.0)] {
            let (_, dq) = sphere_integral(d, rho, big_r);
            let numerical = finite_difference(d, rho, big_r);
            assert!(
                (dq - numerical).abs() < 1e-5 * (1.0 + numerical.abs()),
                "d = {d}: {dq} vs {numerical}"
            );
        }
    }

    #[test]
    fn sphere_descreening_uses_per_atom_radii() {
        let descreening = SphereDescreening::new(vec![1.5, 2.0], 10.0);
        assert_eq!(descreening.max_distance(), 10.0);
        assert_eq!(descreening.eval(3.0, 0, 1), sphere_integral(3.0, 1.5, 2.0));
        assert_ne!(descreening.eval(3.0, 0, 1), descreening.eval(3.0, 1, 0));
    }
}
