use super::atom::AtomParams;
use nalgebra::Point3;
use thiserror::Error;

/// Radius offset applied to obtain the "large" radii of the surface-area model, in Angstroms.
pub const SA_RADIUS_OFFSET: f64 = 0.5;

#[derive(Debug, Error, PartialEq)]
pub enum SystemError {
    #[error("Expected {expected} positions, found {found}")]
    PositionCountMismatch { expected: usize, found: usize },
    #[error("Particle count cannot change between evaluations (expected {expected}, found {found})")]
    ParticleCountChanged { expected: usize, found: usize },
    #[error("Hydrogen classification of atom {atom} cannot change between evaluations")]
    HydrogenFlagChanged { atom: usize },
    #[error("Radius of atom {atom} cannot change between evaluations ({old} -> {new})")]
    RadiusChanged { atom: usize, old: f64, new: f64 },
    #[error("Atom {atom} has a non-positive radius: {radius}")]
    InvalidRadius { atom: usize, radius: f64 },
}

/// The set of atoms an evaluation works on: static parameters plus current positions.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSystem {
    params: Vec<AtomParams>,
    positions: Vec<Point3<f64>>,
}

impl ParticleSystem {
    /// Creates a new system.
    ///
    /// Hydrogens never carry a surface weight, so their `gamma` is forced to zero.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::PositionCountMismatch`] if the two slices differ in length and
    /// [`SystemError::InvalidRadius`] for a non-positive radius.
    pub fn new(params: Vec<AtomParams>, positions: Vec<Point3<f64>>) -> Result<Self, SystemError> {
        if params.len() != positions.len() {
            return Err(SystemError::PositionCountMismatch {
                expected: params.len(),
                found: positions.len(),
            });
        }
        validate_radii(&params)?;
        Ok(Self {
            params: sanitize(params),
            positions,
        })
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[AtomParams] {
        &self.params
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn heavy_count(&self) -> usize {
        self.params.iter().filter(|p| !p.is_hydrogen).count()
    }

    pub fn is_hydrogen(&self) -> Vec<bool> {
        self.params.iter().map(|p| p.is_hydrogen).collect()
    }

    pub fn radii(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.radius).collect()
    }

    /// Radii grown by `offset`, used for the solvent-accessible surface construction.
    pub fn offset_radii(&self, offset: f64) -> Vec<f64> {
        self.params.iter().map(|p| p.radius + offset).collect()
    }

    pub fn gammas(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.gamma).collect()
    }

    /// Replaces all positions for the next evaluation.
    pub fn set_positions(&mut self, positions: Vec<Point3<f64>>) -> Result<(), SystemError> {
        if positions.len() != self.params.len() {
            return Err(SystemError::PositionCountMismatch {
                expected: self.params.len(),
                found: positions.len(),
            });
        }
        self.positions = positions;
        Ok(())
    }

    /// Replaces the per-atom energy weights.
    ///
    /// The particle count, every radius and every hydrogen flag must be unchanged; those
    /// define the overlap-tree partition and cannot be updated in place.
    pub fn update_parameters(&mut self, params: Vec<AtomParams>) -> Result<(), SystemError> {
        if params.len() != self.params.len() {
            return Err(SystemError::ParticleCountChanged {
                expected: self.params.len(),
                found: params.len(),
            });
        }
        for (atom, (old, new)) in self.params.iter().zip(&params).enumerate() {
            if old.is_hydrogen != new.is_hydrogen {
                return Err(SystemError::HydrogenFlagChanged { atom });
            }
            if old.radius != new.radius {
                return Err(SystemError::RadiusChanged {
                    atom,
                    old: old.radius,
                    new: new.radius,
                });
            }
        }
        self.params = sanitize(params);
        Ok(())
    }
}

fn validate_radii(params: &[AtomParams]) -> Result<(), SystemError> {
    match params
        .iter()
        .enumerate()
        .find(|(_, p)| !(p.radius > 0.0))
    {
        Some((atom, p)) => Err(SystemError::InvalidRadius {
            atom,
            radius: p.radius,
        }),
        None => Ok(()),
    }
}

fn sanitize(mut params: Vec<AtomParams>) -> Vec<AtomParams> {
    for p in params.iter_mut().filter(|p| p.is_hydrogen) {
        p.gamma = 0.0;
    }
    params
}
