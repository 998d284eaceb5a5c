use std::ops::{Add, AddAssign};

/// Energy breakdown of one evaluation, in kcal/mol.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnergyTerms {
    pub surface_area: f64,
    pub gb_self: f64,
    pub gb_pair: f64,
    pub dispersion: f64,
}

impl EnergyTerms {
    pub fn new(surface_area: f64, gb_self: f64, gb_pair: f64, dispersion: f64) -> Self {
        Self {
            surface_area,
            gb_self,
            gb_pair,
            dispersion,
        }
    }

    #[inline]
    pub fn gb(&self) -> f64 {
        self.gb_self + self.gb_pair
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.surface_area + self.gb() + self.dispersion
    }
}

impl Add for EnergyTerms {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            surface_area: self.surface_area + rhs.surface_area,
            gb_self: self.gb_self + rhs.gb_self,
            gb_pair: self.gb_pair + rhs.gb_pair,
            dispersion: self.dispersion + rhs.dispersion,
        }
    }
}

impl AddAssign for EnergyTerms {
    fn add_assign(&mut self, rhs: Self) {
        self.surface_area += rhs.surface_area;
        self.gb_self += rhs.gb_self;
        self.gb_pair += rhs.gb_pair;
        self.dispersion += rhs.dispersion;
    }
}
