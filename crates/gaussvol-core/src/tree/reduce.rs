use super::section::Section;
use nalgebra::Vector3;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// How per-atom results from independent sections are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReductionStrategy {
    /// Every section writes to private buffers that are summed in section order afterwards.
    /// The result does not depend on thread scheduling.
    #[default]
    PerSection,
    /// All sections add directly into shared buffers with atomic floating-point adds.
    Atomic,
}

impl fmt::Display for ReductionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PerSection => "per-section",
            Self::Atomic => "atomic",
        })
    }
}

impl FromStr for ReductionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "per-section" | "buffered" => Ok(Self::PerSection),
            "atomic" => Ok(Self::Atomic),
            other => Err(format!("unknown reduction strategy '{other}'")),
        }
    }
}

/// A sink for per-atom contributions produced while reducing a section.
pub trait Accumulator {
    fn add(&mut self, atom: usize, free_volume: f64, self_volume: f64, gradient: Vector3<f64>);
}

/// Plain per-atom buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomBuffers {
    pub free_volumes: Vec<f64>,
    pub self_volumes: Vec<f64>,
    pub gradients: Vec<Vector3<f64>>,
}

impl AtomBuffers {
    pub fn zeros(num_atoms: usize) -> Self {
        Self {
            free_volumes: vec![0.0; num_atoms],
            self_volumes: vec![0.0; num_atoms],
            gradients: vec![Vector3::zeros(); num_atoms],
        }
    }

    /// Adds every entry of `other` into `self`.
    pub fn merge(&mut self, other: &AtomBuffers) {
        for (a, b) in self.free_volumes.iter_mut().zip(&other.free_volumes) {
            *a += b;
        }
        for (a, b) in self.self_volumes.iter_mut().zip(&other.self_volumes) {
            *a += b;
        }
        for (a, b) in self.gradients.iter_mut().zip(&other.gradients) {
            *a += b;
        }
    }
}

impl Accumulator for AtomBuffers {
    #[inline]
    fn add(&mut self, atom: usize, free_volume: f64, self_volume: f64, gradient: Vector3<f64>) {
        self.free_volumes[atom] += free_volume;
        self.self_volumes[atom] += self_volume;
        self.gradients[atom] += gradient;
    }
}

/// An `f64` supporting atomic addition, stored as its bit pattern in an `AtomicU64`.
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Adds `value` and returns the previous value.
    pub fn fetch_add(&self, value: f64) -> f64 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(previous) => return f64::from_bits(previous),
                Err(actual) => current = actual,
            }
        }
    }

    pub fn into_inner(self) -> f64 {
        f64::from_bits(self.0.into_inner())
    }
}

/// Per-atom buffers shared by concurrent writers.
#[derive(Debug)]
pub struct AtomicAtomBuffers {
    free_volumes: Vec<AtomicF64>,
    self_volumes: Vec<AtomicF64>,
    gradients: Vec<[AtomicF64; 3]>,
}

impl AtomicAtomBuffers {
    pub fn zeros(num_atoms: usize) -> Self {
        Self {
            free_volumes: (0..num_atoms).map(|_| AtomicF64::default()).collect(),
            self_volumes: (0..num_atoms).map(|_| AtomicF64::default()).collect(),
            gradients: (0..num_atoms)
                .map(|_| std::array::from_fn(|_| AtomicF64::default()))
                .collect(),
        }
    }

    pub fn into_buffers(self) -> AtomBuffers {
        AtomBuffers {
            free_volumes: self.free_volumes.into_iter().map(AtomicF64::into_inner).collect(),
            self_volumes: self.self_volumes.into_iter().map(AtomicF64::into_inner).collect(),
            gradients: self
                .gradients
                .into_iter()
                .map(|[x, y, z]| Vector3::new(x.into_inner(), y.into_inner(), z.into_inner()))
                .collect(),
        }
    }
}

impl Accumulator for &AtomicAtomBuffers {
    #[inline]
    fn add(&mut self, atom: usize, free_volume: f64, self_volume: f64, gradient: Vector3<f64>) {
        self.free_volumes[atom].fetch_add(free_volume);
        self.self_volumes[atom].fetch_add(self_volume);
        for (slot, value) in self.gradients[atom].iter().zip(gradient.iter()) {
            slot.fetch_add(*value);
        }
    }
}

/// Tree-wide totals of one reduction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub volume: f64,
    pub energy: f64,
}

#[derive(Debug, Clone, Copy)]
struct Partial {
    free: f64,
    self_volume: f64,
    energy: f64,
    fenergy: f64,
    penergy: Vector3<f64>,
}

impl Partial {
    const ZERO: Partial = Partial {
        free: 0.0,
        self_volume: 0.0,
        energy: 0.0,
        fenergy: 0.0,
        penergy: Vector3::new(0.0, 0.0, 0.0),
    };
}

/// Reduces one section children-first.
///
/// Children always occupy larger slots than their parent, so a reverse sweep over the slots
/// visits every subtree before its root. Each node adds its own inclusion–exclusion terms to
/// whatever its children left in its accumulator, hands the result to its last atom, and
/// forwards the chain-ruled energy derivatives to its parent.
pub fn reduce_section<A: Accumulator>(section: &mut Section, accumulator: &mut A) -> Totals {
    let n = section.nodes.len();
    let mut partials = vec![Partial::ZERO; n];
    let mut totals = Totals::default();

    for slot in (0..n).rev() {
        let node = section.nodes[slot];
        let sign = node.sign();
        let share = sign / node.level as f64;
        let acc = partials[slot];

        let free = sign * node.switched_volume + acc.free;
        let self_volume = share * node.switched_volume + acc.self_volume;
        let energy = share * node.gamma * node.switched_volume + acc.energy;
        let fenergy = share * node.sfp * node.gamma + acc.fenergy;
        let penergy = acc.penergy;

        let (atom_ratio, parent_ratio) = match node.parent {
            Some(parent) => {
                let ratio = section.nodes[parent].gaussian.exponent / node.gaussian.exponent;
                (1.0 - ratio, ratio)
            }
            None => (1.0, 0.0),
        };

        accumulator.add(
            node.atom,
            free,
            self_volume,
            -node.dv1 * fenergy + penergy * atom_ratio,
        );

        let stored = &mut section.nodes[slot];
        stored.self_volume = self_volume;
        stored.energy = energy;
        stored.dvdc = penergy;

        match node.parent {
            Some(parent) => {
                let up = &mut partials[parent];
                up.free += free;
                up.self_volume += self_volume;
                up.energy += energy;
                up.penergy += node.dv1 * fenergy + penergy * parent_ratio;
                up.fenergy += node.dvv1 * fenergy;
            }
            None => {
                totals.volume += free;
                totals.energy += energy;
            }
        }
    }
    totals
}

/// Reduces all sections into per-atom buffers with the requested strategy.
pub fn reduce_sections(
    sections: &mut [Section],
    num_atoms: usize,
    strategy: ReductionStrategy,
) -> (Totals, AtomBuffers) {
    match strategy {
        ReductionStrategy::PerSection => {
            #[cfg(not(feature = "parallel"))]
            let iterator = sections.iter_mut();

            #[cfg(feature = "parallel")]
            let iterator = sections.par_iter_mut();

            let partial: Vec<(Totals, AtomBuffers)> = iterator
                .map(|section| {
                    let mut buffers = AtomBuffers::zeros(num_atoms);
                    let totals = reduce_section(section, &mut buffers);
                    (totals, buffers)
                })
                .collect();

            let mut totals = Totals::default();
            let mut buffers = AtomBuffers::zeros(num_atoms);
            for (section_totals, section_buffers) in &partial {
                totals.volume += section_totals.volume;
                totals.energy += section_totals.energy;
                buffers.merge(section_buffers);
            }
            (totals, buffers)
        }
        ReductionStrategy::Atomic => {
            let shared = AtomicAtomBuffers::zeros(num_atoms);

            #[cfg(not(feature = "parallel"))]
            let iterator = sections.iter_mut();

            #[cfg(feature = "parallel")]
            let iterator = sections.par_iter_mut();

            let per_section: Vec<Totals> = iterator
                .map(|section| {
                    let mut sink = &shared;
                    reduce_section(section, &mut sink)
                })
                .collect();

            let totals = per_section.iter().fold(Totals::default(), |acc, t| Totals {
                volume: acc.volume + t.volume,
                energy: acc.energy + t.energy,
            });
            (totals, shared.into_buffers())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_f64_accumulates_from_many_threads() {
        let value = AtomicF64::new(1.0);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        value.fetch_add(0.5);
                    }
                });
            }
        });
        assert_eq!(value.load(), 2001.0);
    }

    #[test]
    fn atomic_f64_fetch_add_returns_previous_value() {
        let value = AtomicF64::new(2.5);
        assert_eq!(value.fetch_add(1.0), 2.5);
        assert_eq!(value.into_inner(), 3.5);
    }

    #[test]
    fn atom_buffers_merge_adds_elementwise() {
        let mut a = AtomBuffers::zeros(2);
        a.add(0, 1.0, 2.0, Vector3::new(1.0, 0.0, 0.0));
        let mut b = AtomBuffers::zeros(2);
        b.add(0, 0.5, 0.5, Vector3::new(0.0, 1.0, 0.0));
        b.add(1, 3.0, 4.0, Vector3::new(0.0, 0.0, 1.0));
        a.merge(&b);
        assert_eq!(a.free_volumes, vec![1.5, 3.0]);
        assert_eq!(a.self_volumes, vec![2.5, 4.0]);
        assert_eq!(a.gradients[0], Vector3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn shared_atomic_buffers_act_as_an_accumulator() {
        let shared = AtomicAtomBuffers::zeros(2);
        let mut sink = &shared;
        sink.add(1, 1.0, 0.5, Vector3::new(1.0, 2.0, 3.0));
        sink.add(1, 1.0, 0.5, Vector3::new(1.0, 2.0, 3.0));
        let buffers = shared.into_buffers();
        assert_eq!(buffers.free_volumes, vec![0.0, 2.0]);
        assert_eq!(buffers.self_volumes, vec![0.0, 1.0]);
        assert_eq!(buffers.gradients[1], Vector3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn reduction_strategy_parses_names() {
        assert_eq!("per-section".parse(), Ok(ReductionStrategy::PerSection));
        assert_eq!("ATOMIC".parse(), Ok(ReductionStrategy::Atomic));
        assert!("locks".parse::<ReductionStrategy>().is_err());
    }
}
