use serde::{Deserialize, Serialize};

/// Static per-atom parameters consumed by the volume and solvation models.
///
/// These are read once at setup. Only the energy weights (`gamma`, `alpha`, `charge`) may
/// change between evaluations; the radius and the hydrogen classification define the tree
/// partition and are fixed for the lifetime of a [`ParticleSystem`](super::system::ParticleSystem).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtomParams {
    /// Van der Waals radius in Angstroms.
    pub radius: f64,
    /// Surface-energy density in kcal/(mol·Å²).
    pub gamma: f64,
    /// Dispersion coefficient in kcal/mol·Å³.
    pub alpha: f64,
    /// Partial charge in elementary charge units.
    pub charge: f64,
    /// Hydrogens are excluded from the overlap tree.
    pub is_hydrogen: bool,
}

impl AtomParams {
    /// Creates a heavy atom with the given radius and all energy weights set to zero.
    pub fn heavy(radius: f64) -> Self {
        Self {
            radius,
            gamma: 0.0,
            alpha: 0.0,
            charge: 0.0,
            is_hydrogen: false,
        }
    }

    /// Creates a hydrogen with the given radius and all energy weights set to zero.
    pub fn hydrogen(radius: f64) -> Self {
        Self {
            is_hydrogen: true,
            ..Self::heavy(radius)
        }
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_charge(mut self, charge: f64) -> Self {
        self.charge = charge;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heavy_atom_has_zero_weights() {
        let atom = AtomParams::heavy(1.7);
        assert_eq!(atom.radius, 1.7);
        assert_eq!(atom.gamma, 0.0);
        assert_eq!(atom.alpha, 0.0);
        assert_eq!(atom.charge, 0.0);
        assert!(!atom.is_hydrogen);
    }

    #[test]
    fn hydrogen_constructor_sets_flag() {
        let atom = AtomParams::hydrogen(1.1).with_charge(0.3);
        assert!(atom.is_hydrogen);
        assert_eq!(atom.charge, 0.3);
    }

    #[test]
    fn builder_style_setters_chain() {
        let atom = AtomParams::heavy(1.5)
            .with_gamma(0.1)
            .with_alpha(-0.05)
            .with_charge(-0.4);
        assert_eq!(atom.gamma, 0.1);
        assert_eq!(atom.alpha, -0.05);
        assert_eq!(atom.charge, -0.4);
    }
}
