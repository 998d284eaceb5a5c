use super::switching::VolumeCutoffs;
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Exponent factor mapping a hard sphere of radius `r` to a Gaussian density `exp(-a·x²)`
/// with `a = KFC / r²`, chosen so that the Gaussian reproduces sphere overlap volumes.
pub const KFC: f64 = 2.2269859253;

/// Volume of a sphere of the given radius.
#[inline]
pub fn sphere_volume(radius: f64) -> f64 {
    4.0 / 3.0 * PI * radius.powi(3)
}

/// A volume-normalized 3-D Gaussian `v·(a/π)^{3/2}·exp(-a·|x-c|²)`.
///
/// Gaussians describe both atoms (level-1 tree nodes) and the intersections of several
/// atoms (higher-level nodes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaussian {
    /// Integrated volume in Å³.
    pub volume: f64,
    /// Center in Å.
    pub center: Point3<f64>,
    /// Exponent in Å⁻².
    pub exponent: f64,
}

impl Gaussian {
    pub fn new(volume: f64, center: Point3<f64>, exponent: f64) -> Self {
        Self {
            volume,
            center,
            exponent,
        }
    }

    /// Gaussian for a sphere of the given radius carrying an explicit volume.
    ///
    /// The volume is normally [`sphere_volume`] of the same radius, but models that want
    /// an atom to take part in the geometry without contributing volume pass zero.
    pub fn from_sphere(center: Point3<f64>, radius: f64, volume: f64) -> Self {
        Self {
            volume,
            center,
            exponent: KFC / (radius * radius),
        }
    }

    /// Computes the overlap of this Gaussian (the parent, `g1`) with `other` (`g2`).
    ///
    /// The product of two Gaussians is a Gaussian with exponent `a1 + a2` centered at the
    /// exponent-weighted mean of the two centers. Its raw volume is switched with `cutoffs`
    /// so that overlaps enter smoothly as they cross the lower volume threshold.
    pub fn overlap(&self, other: &Gaussian, cutoffs: &VolumeCutoffs) -> Overlap {
        let separation = other.center - self.center;
        let d2 = separation.norm_squared();
        let a12 = self.exponent + other.exponent;
        let deff = self.exponent * other.exponent / a12;
        let kappa = (-deff * d2).exp();
        let raw = self.volume * other.volume * (deff / PI).powf(1.5) * kappa;

        // dV/dr divided by r, so that multiplying by the separation vector gives the gradient.
        let dvdr = -2.0 * deff * raw;
        let dvv1 = if self.volume > 0.0 {
            raw / self.volume
        } else {
            0.0
        };

        let center = Point3::from(
            (self.center.coords * self.exponent + other.center.coords * other.exponent) / a12,
        );

        let (s, sp) = cutoffs.switch(raw);
        Overlap {
            gaussian: Gaussian::new(raw, center, a12),
            switched_volume: s * raw,
            sfp: sp * raw + s,
            dvdr,
            dvv1,
            dv1: separation * -dvdr,
        }
    }
}

/// Builds one atom Gaussian per sphere.
pub fn atom_gaussians(positions: &[Point3<f64>], radii: &[f64], volumes: &[f64]) -> Vec<Gaussian> {
    positions
        .iter()
        .zip(radii)
        .zip(volumes)
        .map(|((&center, &radius), &volume)| Gaussian::from_sphere(center, radius, volume))
        .collect()
}

/// The result of intersecting two Gaussians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlap {
    /// The product Gaussian; its `volume` is the raw (unswitched) overlap volume.
    pub gaussian: Gaussian,
    /// `s(V)·V`, the overlap volume after switching.
    pub switched_volume: f64,
    /// `d(s(V)·V)/dV`.
    pub sfp: f64,
    /// `(1/r)·dV/dr` with `r` the separation of the two centers.
    pub dvdr: f64,
    /// `dV/dV1`, derivative of the overlap volume with respect to the parent's volume.
    pub dvv1: f64,
    /// Gradient of the raw volume with respect to the parent's center.
    pub dv1: Vector3<f64>,
}

impl Overlap {
    #[inline]
    pub fn volume(&self) -> f64 {
        self.gaussian.volume
    }
}
