use crate::core::models::system::ParticleSystem;
use crate::engine::config::EngineConfig;
use crate::engine::error::EngineError;
use crate::engine::evaluator::Evaluator;
use crate::tree::{BuildStats, SectionOccupancy, TreeError};
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Shape of the primary overlap tree of one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeReport {
    pub stats: BuildStats,
    pub occupancy: Vec<SectionOccupancy>,
    /// Nodes rooted at each atom, zero for hydrogens.
    pub overlap_counts: Vec<usize>,
}

impl TreeReport {
    /// Number of heavy atoms rooting each distinct subtree size, by ascending size.
    pub fn overlap_histogram(&self) -> Vec<(usize, usize)> {
        let mut histogram = BTreeMap::new();
        for &count in self.overlap_counts.iter().filter(|&&c| c > 0) {
            *histogram.entry(count).or_insert(0) += 1;
        }
        histogram.into_iter().collect()
    }
}

#[instrument(skip_all, name = "tree_inspection")]
pub fn inspect_tree(
    system: &ParticleSystem,
    config: &EngineConfig,
) -> Result<TreeReport, EngineError> {
    let mut evaluator = Evaluator::new(config.clone())?;
    let stats = evaluator.build_tree(system)?;
    let tree = evaluator.tree().ok_or(TreeError::EmptyTree)?;

    let report = TreeReport {
        stats,
        occupancy: tree.section_occupancy(),
        overlap_counts: tree.overlap_counts(),
    };
    info!(
        sections = stats.sections,
        nodes = stats.nodes,
        max_level = stats.max_level,
        capacity = tree.partition().total_capacity(),
        "Overlap tree inspected."
    );
    Ok(report)
}
