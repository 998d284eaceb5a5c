//! # Overlap Tree
//!
//! Hierarchical decomposition of the union of a set of atomic Gaussians into per-atom
//! self volumes.
//!
//! The tree stores, for every set of mutually overlapping heavy atoms, one node holding the
//! Gaussian of their intersection. A node's children are the intersections of that node with
//! one further atom of larger index, so every atom set appears exactly once, rooted at its
//! lowest atom. Summing `(-1)^(n+1)·V` over nodes of order `n` is the inclusion–exclusion
//! expansion of the union volume.
//!
//! ## Lifecycle
//!
//! 1. [`OverlapTree::estimate_overlap_counts`] runs a sequential dry run to measure how many
//!    nodes each atom roots.
//! 2. [`partition::Partition::new`] turns those counts into independent sections with a
//!    padded capacity.
//! 3. [`OverlapTree::build`] grows the tree, section by section, with the configured
//!    [`BuildStrategy`]. Running out of section capacity is reported as
//!    [`TreeError::CapacityOverflow`].
//! 4. [`OverlapTree::compute_self_volumes`] reduces the tree into volumes, a volume energy
//!    and its gradient.
//! 5. [`OverlapTree::rescan_volumes`] and [`OverlapTree::rescan_gammas`] re-evaluate the same
//!    topology under new radii or weights.

pub mod builder;
pub mod error;
pub mod node;
pub mod partition;
pub mod reduce;
mod rescan;
pub mod section;

pub use builder::BuildStrategy;
pub use error::TreeError;
pub use partition::{Partition, PartitionSettings};
pub use reduce::ReductionStrategy;
pub use section::SectionOccupancy;

use crate::core::gaussian::{Gaussian, atom_gaussians};
use crate::core::neighbors::NeighborList;
use crate::core::switching::VolumeCutoffs;
use builder::BuildContext;
use nalgebra::{Point3, Vector3};
use section::Section;
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Default maximum order of an overlap.
pub const MAX_ORDER: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeSettings {
    pub cutoffs: VolumeCutoffs,
    pub max_order: usize,
    pub build_strategy: BuildStrategy,
    pub reduction: ReductionStrategy,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            cutoffs: VolumeCutoffs::default(),
            max_order: MAX_ORDER,
            build_strategy: BuildStrategy::default(),
            reduction: ReductionStrategy::default(),
        }
    }
}

/// Per-atom inputs of a build.
#[derive(Debug, Clone)]
pub struct TreeInput<'a> {
    pub gaussians: Vec<Gaussian>,
    pub gammas: Vec<f64>,
    pub is_hydrogen: &'a [bool],
    pub neighbors: &'a NeighborList,
}

impl<'a> TreeInput<'a> {
    pub fn new(
        gaussians: Vec<Gaussian>,
        gammas: Vec<f64>,
        is_hydrogen: &'a [bool],
        neighbors: &'a NeighborList,
    ) -> Self {
        Self {
            gaussians,
            gammas,
            is_hydrogen,
            neighbors,
        }
    }

    /// Inputs for spheres at `positions` with the given radii, volumes and weights.
    pub fn from_spheres(
        positions: &[Point3<f64>],
        radii: &[f64],
        volumes: &[f64],
        gammas: &[f64],
        is_hydrogen: &'a [bool],
        neighbors: &'a NeighborList,
    ) -> Self {
        Self::new(
            atom_gaussians(positions, radii, volumes),
            gammas.to_vec(),
            is_hydrogen,
            neighbors,
        )
    }
}

/// Summary of the last build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub sections: usize,
    pub nodes: usize,
    pub max_level: usize,
    /// Overlaps beyond the maximum order that were left out of the tree.
    pub truncated: usize,
}

/// Result of a reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct SelfVolumes {
    /// Union volume of all atoms.
    pub volume: f64,
    /// `Σ_i γ_i · self_volume_i`.
    pub energy: f64,
    /// Per-atom share of the union volume; these sum to `volume`.
    pub self_volumes: Vec<f64>,
    /// Per-atom volume minus every overlap containing the atom, with full inclusion–exclusion.
    pub free_volumes: Vec<f64>,
    /// `∂energy/∂x_i`.
    pub gradients: Vec<Vector3<f64>>,
}

#[derive(Debug, Clone)]
pub struct OverlapTree {
    settings: TreeSettings,
    partition: Partition,
    sections: Vec<Section>,
    built: bool,
}

impl OverlapTree {
    pub fn new(partition: Partition, settings: TreeSettings) -> Self {
        let sections = partition
            .sections()
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, layout)| Section::new(index, layout))
            .collect();
        Self {
            settings,
            partition,
            sections,
            built: false,
        }
    }

    /// Measures the number of nodes rooted at each atom with a sequential build into a single
    /// unbounded section. Hydrogens get zero.
    pub fn estimate_overlap_counts(
        input: &TreeInput<'_>,
        settings: &TreeSettings,
    ) -> Result<Vec<usize>, TreeError> {
        let mut probe = OverlapTree::new(
            Partition::single(input.is_hydrogen, None),
            TreeSettings {
                build_strategy: BuildStrategy::Sequential,
                ..*settings
            },
        );
        probe.build(input)?;
        Ok(probe.overlap_counts())
    }

    /// Estimates overlap counts, partitions the atoms accordingly, and returns an unbuilt tree.
    pub fn with_estimated_capacity(
        input: &TreeInput<'_>,
        settings: TreeSettings,
        partition_settings: &PartitionSettings,
    ) -> Result<Self, TreeError> {
        let counts = Self::estimate_overlap_counts(input, &settings)?;
        let partition = Partition::new(&counts, input.is_hydrogen, partition_settings);
        Ok(Self::new(partition, settings))
    }

    pub fn settings(&self) -> &TreeSettings {
        &self.settings
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// (Re)builds the tree topology and node volumes from scratch.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::AtomCountMismatch`] or [`TreeError::HydrogenMismatch`] if the input
    /// does not match the partition, and [`TreeError::CapacityOverflow`] if a section runs out
    /// of slots. After an error the tree is left unbuilt.
    pub fn build(&mut self, input: &TreeInput<'_>) -> Result<BuildStats, TreeError> {
        self.built = false;
        self.check_input(input)?;

        let ctx = BuildContext {
            gaussians: &input.gaussians,
            gammas: &input.gammas,
            neighbors: input.neighbors,
            cutoffs: self.settings.cutoffs,
            max_order: self.settings.max_order,
        };
        builder::build_sections(&mut self.sections, &ctx, self.settings.build_strategy)?;
        self.built = true;

        let stats = self.stats();
        debug!(
            strategy = %self.settings.build_strategy,
            sections = stats.sections,
            nodes = stats.nodes,
            max_level = stats.max_level,
            "Overlap tree built."
        );
        if stats.truncated > 0 {
            warn!(
                truncated = stats.truncated,
                max_order = self.settings.max_order,
                "Overlaps beyond the maximum tree order were dropped."
            );
        }
        Ok(stats)
    }

    /// Reduces the current tree into per-atom volumes, the volume energy and its gradient.
    pub fn compute_self_volumes(&mut self) -> Result<SelfVolumes, TreeError> {
        if !self.built {
            return Err(TreeError::EmptyTree);
        }
        let (totals, buffers) = reduce::reduce_sections(
            &mut self.sections,
            self.partition.num_atoms(),
            self.settings.reduction,
        );
        Ok(SelfVolumes {
            volume: totals.volume,
            energy: totals.energy,
            self_volumes: buffers.self_volumes,
            free_volumes: buffers.free_volumes,
            gradients: buffers.gradients,
        })
    }

    /// Re-evaluates the existing topology with new atom Gaussians and weights, then reduces.
    pub fn rescan_volumes(
        &mut self,
        gaussians: &[Gaussian],
        gammas: &[f64],
    ) -> Result<SelfVolumes, TreeError> {
        if !self.built {
            return Err(TreeError::EmptyTree);
        }
        self.check_len(gaussians.len())?;
        self.check_len(gammas.len())?;
        let cutoffs = self.settings.cutoffs;
        self.for_each_section(|section| rescan::rescan_volumes(section, gaussians, gammas, &cutoffs));
        self.compute_self_volumes()
    }

    /// Re-evaluates the existing topology with new weights only, then reduces.
    pub fn rescan_gammas(&mut self, gammas: &[f64]) -> Result<SelfVolumes, TreeError> {
        if !self.built {
            return Err(TreeError::EmptyTree);
        }
        self.check_len(gammas.len())?;
        self.for_each_section(|section| rescan::rescan_gammas(section, gammas));
        self.compute_self_volumes()
    }

    /// Number of nodes rooted at each atom, including the root itself; zero for hydrogens.
    pub fn overlap_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.partition.num_atoms()];
        for section in &self.sections {
            for (atom, size) in section.subtree_sizes() {
                counts[atom] = size;
            }
        }
        counts
    }

    pub fn section_occupancy(&self) -> Vec<SectionOccupancy> {
        self.sections.iter().map(Section::occupancy).collect()
    }

    pub fn stats(&self) -> BuildStats {
        BuildStats {
            sections: self.sections.len(),
            nodes: self.sections.iter().map(|s| s.nodes().len()).sum(),
            max_level: self
                .sections
                .iter()
                .flat_map(|s| s.nodes().iter().map(|n| n.level))
                .max()
                .unwrap_or(0),
            truncated: self.sections.iter().map(Section::truncated).sum(),
        }
    }

    fn for_each_section<F>(&mut self, op: F)
    where
        F: Fn(&mut Section) + Sync + Send,
    {
        #[cfg(not(feature = "parallel"))]
        let iterator = self.sections.iter_mut();

        #[cfg(feature = "parallel")]
        let iterator = self.sections.par_iter_mut();

        iterator.for_each(op);
    }

    fn check_len(&self, found: usize) -> Result<(), TreeError> {
        let expected = self.partition.num_atoms();
        if found != expected {
            return Err(TreeError::AtomCountMismatch { expected, found });
        }
        Ok(())
    }

    fn check_input(&self, input: &TreeInput<'_>) -> Result<(), TreeError> {
        self.check_len(input.gaussians.len())?;
        self.check_len(input.gammas.len())?;
        self.check_len(input.is_hydrogen.len())?;
        self.check_len(input.neighbors.len())?;
        match self
            .partition
            .is_hydrogen()
            .iter()
            .zip(input.is_hydrogen)
            .position(|(a, b)| a != b)
        {
            Some(atom) => Err(TreeError::HydrogenMismatch { atom }),
            None => Ok(()),
        }
    }
}
