use super::error::TreeError;
use super::node::TreeNode;
use super::section::Section;
use crate::core::gaussian::{Gaussian, Overlap};
use crate::core::neighbors::NeighborList;
use crate::core::switching::VolumeCutoffs;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// How the nodes of each section are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildStrategy {
    /// Depth-first recursion, one section after the other on the calling thread.
    Sequential,
    /// Breadth-first growth, one level per pass, with separate count and store passes.
    #[default]
    LevelSynchronous,
    /// Breadth-first growth in which every node gathers its children in a scratch buffer and
    /// reserves their slots in one step.
    SinglePass,
}

impl fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sequential => "sequential",
            Self::LevelSynchronous => "level-synchronous",
            Self::SinglePass => "single-pass",
        };
        f.write_str(name)
    }
}

impl FromStr for BuildStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "sequential" => Ok(Self::Sequential),
            "level-synchronous" | "level-sync" => Ok(Self::LevelSynchronous),
            "single-pass" => Ok(Self::SinglePass),
            other => Err(format!("unknown build strategy '{other}'")),
        }
    }
}

/// Read-only inputs shared by every section during a build.
pub(crate) struct BuildContext<'a> {
    pub gaussians: &'a [Gaussian],
    pub gammas: &'a [f64],
    pub neighbors: &'a NeighborList,
    pub cutoffs: VolumeCutoffs,
    pub max_order: usize,
}

impl BuildContext<'_> {
    fn candidates(&self, section: &Section, slot: usize) -> Vec<usize> {
        let node = &section.nodes[slot];
        if node.is_root() {
            self.neighbors.partners(node.atom).to_vec()
        } else {
            section.sibling_atoms(slot).collect()
        }
    }

    #[inline]
    fn overlap(&self, parent: &TreeNode, atom: usize) -> Overlap {
        parent.gaussian.overlap(&self.gaussians[atom], &self.cutoffs)
    }

    #[inline]
    fn child(&self, parent_slot: usize, parent: &TreeNode, atom: usize, overlap: &Overlap) -> TreeNode {
        TreeNode::child(parent_slot, parent, atom, overlap, self.gammas[atom])
    }
}

/// Slot offset inside a children range of `count` slots: fully weighted children fill from
/// the front, children inside the switching region from the back.
#[inline]
fn claim_slot(volume: f64, cutoffs: &VolumeCutoffs, top: &AtomicUsize, bottom: &AtomicUsize, count: usize) -> usize {
    if cutoffs.is_above_switch(volume) {
        top.fetch_add(1, Ordering::Relaxed)
    } else {
        count - 1 - bottom.fetch_add(1, Ordering::Relaxed)
    }
}

pub(crate) fn build_sections(
    sections: &mut [Section],
    ctx: &BuildContext<'_>,
    strategy: BuildStrategy,
) -> Result<(), TreeError> {
    match strategy {
        BuildStrategy::Sequential => sections
            .iter_mut()
            .try_for_each(|section| build_sequential(section, ctx)),
        BuildStrategy::LevelSynchronous => {
            for_each_section(sections, |section| build_level_synchronous(section, ctx))
        }
        BuildStrategy::SinglePass => {
            for_each_section(sections, |section| build_single_pass(section, ctx))
        }
    }
}

fn for_each_section<F>(sections: &mut [Section], op: F) -> Result<(), TreeError>
where
    F: Fn(&mut Section) -> Result<(), TreeError> + Sync + Send,
{
    #[cfg(not(feature = "parallel"))]
    let iterator = sections.iter_mut();

    #[cfg(feature = "parallel")]
    let iterator = sections.par_iter_mut();

    iterator.try_for_each(op)
}

pub(crate) fn build_sequential(section: &mut Section, ctx: &BuildContext<'_>) -> Result<(), TreeError> {
    section.init_roots(ctx.gaussians, ctx.gammas)?;
    for slot in 0..section.nodes.len() {
        grow(section, slot, ctx)?;
    }
    Ok(())
}

/// Expands one node and then, depth first, each of its children. The recursion depth is
/// bounded by the maximum tree order.
fn grow(section: &mut Section, slot: usize, ctx: &BuildContext<'_>) -> Result<(), TreeError> {
    let parent = section.nodes[slot];
    let overlaps: Vec<(usize, Overlap)> = ctx
        .candidates(section, slot)
        .into_iter()
        .map(|atom| (atom, ctx.overlap(&parent, atom)))
        .filter(|(_, overlap)| ctx.cutoffs.is_retained(overlap.volume()))
        .collect();
    section.nodes[slot].processed = true;

    if overlaps.is_empty() {
        return Ok(());
    }
    if parent.level >= ctx.max_order {
        section.truncated += overlaps.len();
        return Ok(());
    }

    let start = section.nodes.len();
    let count = overlaps.len();
    section.ensure_capacity(start + count)?;

    let (top, bottom) = (AtomicUsize::new(0), AtomicUsize::new(0));
    let mut children: Vec<Option<TreeNode>> = vec![None; count];
    for (atom, overlap) in &overlaps {
        let local = claim_slot(overlap.volume(), &ctx.cutoffs, &top, &bottom, count);
        let mut child = ctx.child(slot, &parent, *atom, overlap);
        child.ok_to_process = true;
        children[local] = Some(child);
    }
    section.nodes.extend(children.into_iter().flatten());
    section.nodes[slot].children_start = start;
    section.nodes[slot].children_count = count;

    for child in start..start + count {
        grow(section, child, ctx)?;
    }
    Ok(())
}

/// Slots of the nodes that are eligible and not yet processed, starting at `from`.
fn eligible_slots(section: &Section, from: usize) -> Vec<usize> {
    (from..section.nodes.len())
        .filter(|&slot| {
            let node = &section.nodes[slot];
            node.ok_to_process && !node.processed
        })
        .collect()
}

/// Marks the expanded parents as processed and records their children ranges, then makes the
/// new children eligible for the next level.
fn commit_level(section: &mut Section, eligible: &[usize], ranges: &[(usize, usize)], first_new: usize) {
    for (&slot, &(start, count)) in eligible.iter().zip(ranges) {
        let node = &mut section.nodes[slot];
        node.children_start = start;
        node.children_count = count;
        node.processed = true;
    }
    for node in &mut section.nodes[first_new..] {
        node.ok_to_process = true;
    }
}

pub(crate) fn build_level_synchronous(
    section: &mut Section,
    ctx: &BuildContext<'_>,
) -> Result<(), TreeError> {
    section.init_roots(ctx.gaussians, ctx.gammas)?;
    let mut level_start = 0;

    loop {
        let eligible = eligible_slots(section, level_start);
        if eligible.is_empty() {
            break;
        }
        let level = section.nodes[eligible[0]].level;

        let work: Vec<(usize, usize)> = eligible
            .iter()
            .enumerate()
            .flat_map(|(k, &slot)| ctx.candidates(section, slot).into_iter().map(move |atom| (k, atom)))
            .collect();

        // Count pass.
        let counters: Vec<AtomicUsize> = eligible.iter().map(|_| AtomicUsize::new(0)).collect();
        {
            let nodes = &section.nodes;

            #[cfg(not(feature = "parallel"))]
            let iterator = work.iter();

            #[cfg(feature = "parallel")]
            let iterator = work.par_iter();

            iterator.for_each(|&(k, atom)| {
                if ctx.cutoffs.is_retained(ctx.overlap(&nodes[eligible[k]], atom).volume()) {
                    counters[k].fetch_add(1, Ordering::Relaxed);
                }
            });
        }
        let counts: Vec<usize> = counters.into_iter().map(AtomicUsize::into_inner).collect();
        let found: usize = counts.iter().sum();

        if level >= ctx.max_order {
            section.truncated += found;
            let empty = vec![(0, 0); eligible.len()];
            let end = section.nodes.len();
            commit_level(section, &eligible, &empty, end);
            break;
        }

        // Allocate.
        let base = section.nodes.len();
        let mut ranges = Vec::with_capacity(eligible.len());
        let mut next = base;
        for &count in &counts {
            ranges.push((next, count));
            next += count;
        }
        section.ensure_capacity(next)?;

        // Store pass.
        let top: Vec<AtomicUsize> = eligible.iter().map(|_| AtomicUsize::new(0)).collect();
        let bottom: Vec<AtomicUsize> = eligible.iter().map(|_| AtomicUsize::new(0)).collect();
        let placed: Vec<(usize, TreeNode)> = {
            let nodes = &section.nodes;

            #[cfg(not(feature = "parallel"))]
            let iterator = work.iter();

            #[cfg(feature = "parallel")]
            let iterator = work.par_iter();

            iterator
                .filter_map(|&(k, atom)| {
                    let slot = eligible[k];
                    let parent = &nodes[slot];
                    let overlap = ctx.overlap(parent, atom);
                    if !ctx.cutoffs.is_retained(overlap.volume()) {
                        return None;
                    }
                    let (start, count) = ranges[k];
                    let local = claim_slot(overlap.volume(), &ctx.cutoffs, &top[k], &bottom[k], count);
                    Some((start + local, ctx.child(slot, parent, atom, &overlap)))
                })
                .collect()
        };

        let mut fresh: Vec<Option<TreeNode>> = vec![None; next - base];
        for (slot, node) in placed {
            fresh[slot - base] = Some(node);
        }
        section.nodes.extend(fresh.into_iter().flatten());
        commit_level(section, &eligible, &ranges, base);

        trace!(
            section = section.index,
            level,
            expanded = eligible.len(),
            children = found,
            "Expanded tree level."
        );
        level_start = base;
    }
    Ok(())
}

struct Expansion {
    slot: usize,
    start: usize,
    children: Vec<TreeNode>,
    found: usize,
}

pub(crate) fn build_single_pass(section: &mut Section, ctx: &BuildContext<'_>) -> Result<(), TreeError> {
    section.init_roots(ctx.gaussians, ctx.gammas)?;
    let mut level_start = 0;

    loop {
        let eligible = eligible_slots(section, level_start);
        if eligible.is_empty() {
            break;
        }
        let level = section.nodes[eligible[0]].level;
        let truncating = level >= ctx.max_order;
        let base = section.nodes.len();
        let free_slot = AtomicUsize::new(base);

        let expansions: Vec<Expansion> = {
            let section_ref = &*section;
            let expand = |scratch: &mut Vec<(usize, Overlap)>, slot: usize| -> Expansion {
                scratch.clear();
                let parent = &section_ref.nodes[slot];
                for atom in ctx.candidates(section_ref, slot) {
                    let overlap = ctx.overlap(parent, atom);
                    if ctx.cutoffs.is_retained(overlap.volume()) {
                        scratch.push((atom, overlap));
                    }
                }
                let found = scratch.len();
                if truncating || found == 0 {
                    return Expansion {
                        slot,
                        start: 0,
                        children: Vec::new(),
                        found,
                    };
                }

                let start = free_slot.fetch_add(found, Ordering::Relaxed);
                let (top, bottom) = (AtomicUsize::new(0), AtomicUsize::new(0));
                let mut children: Vec<Option<TreeNode>> = vec![None; found];
                for (atom, overlap) in scratch.iter() {
                    let local = claim_slot(overlap.volume(), &ctx.cutoffs, &top, &bottom, found);
                    children[local] = Some(ctx.child(slot, parent, *atom, overlap));
                }
                Expansion {
                    slot,
                    start,
                    children: children.into_iter().flatten().collect(),
                    found,
                }
            };

            #[cfg(not(feature = "parallel"))]
            let expansions = {
                let mut scratch = Vec::new();
                eligible
                    .iter()
                    .map(|&slot| expand(&mut scratch, slot))
                    .collect()
            };

            #[cfg(feature = "parallel")]
            let expansions = eligible
                .par_iter()
                .map_init(Vec::new, |scratch, &slot| expand(scratch, slot))
                .collect();

            expansions
        };

        let found: usize = expansions.iter().map(|e| e.found).sum();
        if truncating {
            section.truncated += found;
            let empty = vec![(0, 0); eligible.len()];
            let end = section.nodes.len();
            commit_level(section, &eligible, &empty, end);
            break;
        }

        section.ensure_capacity(free_slot.into_inner())?;

        let mut expansions = expansions;
        expansions.sort_unstable_by_key(|e| e.start);
        let mut ranges = Vec::with_capacity(eligible.len());
        for expansion in &expansions {
            ranges.push((expansion.slot, expansion.start, expansion.children.len()));
        }
        for expansion in expansions {
            section.nodes.extend(expansion.children);
        }

        let (slots, spans): (Vec<usize>, Vec<(usize, usize)>) = ranges
            .into_iter()
            .map(|(slot, start, count)| (slot, (start, count)))
            .unzip();
        commit_level(section, &slots, &spans, base);

        trace!(
            section = section.index,
            level,
            expanded = eligible.len(),
            children = found,
            "Expanded tree level in a single pass."
        );
        level_start = base;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gaussian::sphere_volume;
    use crate::tree::partition::Partition;
    use nalgebra::Point3;

    fn cluster() -> (Vec<Gaussian>, Vec<f64>) {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.5, 0.0, 0.0),
            Point3::new(0.7, 1.3, 0.0),
            Point3::new(0.7, 0.5, 1.2),
            Point3::new(2.3, 1.2, 0.8),
        ];
        let gaussians = points
            .iter()
            .map(|&p| Gaussian::from_sphere(p, 1.6, sphere_volume(1.6)))
            .collect();
        (gaussians, vec![0.1, 0.2, 0.3, 0.4, 0.5])
    }

    fn build(strategy: BuildStrategy, max_order: usize) -> Vec<Section> {
        let (gaussians, gammas) = cluster();
        let flags = vec![false; gaussians.len()];
        let neighbors = NeighborList::all_pairs(&flags);
        let partition = Partition::single(&flags, None);
        let mut sections: Vec<Section> = partition
            .sections()
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, layout)| Section::new(i, layout))
            .collect();
        let ctx = BuildContext {
            gaussians: &gaussians,
            gammas: &gammas,
            neighbors: &neighbors,
            cutoffs: VolumeCutoffs::default(),
            max_order,
        };
        build_sections(&mut sections, &ctx, strategy).unwrap();
        sections
    }

    /// Atom sets of all nodes, sorted, so trees can be compared independent of slot order.
    fn atom_sets(section: &Section) -> Vec<Vec<usize>> {
        let mut sets: Vec<Vec<usize>> = (0..section.nodes.len())
            .map(|slot| {
                let mut atoms = Vec::new();
                let mut current = Some(slot);
                while let Some(s) = current {
                    atoms.push(section.nodes[s].atom);
                    current = section.nodes[s].parent;
                }
                atoms.sort_unstable();
                atoms
            })
            .collect();
        sets.sort();
        sets
    }

    #[test]
    fn build_strategy_parses_from_kebab_and_snake_case() {
        assert_eq!("sequential".parse(), Ok(BuildStrategy::Sequential));
        assert_eq!("level_synchronous".parse(), Ok(BuildStrategy::LevelSynchronous));
        assert_eq!("Single-Pass".parse(), Ok(BuildStrategy::SinglePass));
        assert!("random".parse::<BuildStrategy>().is_err());
        assert_eq!(BuildStrategy::SinglePass.to_string(), "single-pass");
    }

    #[test]
    fn all_strategies_produce_the_same_atom_sets() {
        let reference = atom_sets(&build(BuildStrategy::Sequential, 12)[0]);
        assert!(reference.iter().any(|set| set.len() >= 3));
        for strategy in [BuildStrategy::LevelSynchronous, BuildStrategy::SinglePass] {
            assert_eq!(atom_sets(&build(strategy, 12)[0]), reference, "{strategy}");
        }
    }

    #[test]
    fn every_atom_set_appears_once() {
        let sets = atom_sets(&build(BuildStrategy::LevelSynchronous, 12)[0]);
        let mut deduped = sets.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), sets.len());
    }

    #[test]
    fn children_sit_after_their_parent_with_higher_level() {
        for strategy in [
            BuildStrategy::Sequential,
            BuildStrategy::LevelSynchronous,
            BuildStrategy::SinglePass,
        ] {
            let sections = build(strategy, 12);
            let nodes = sections[0].nodes();
            for (slot, node) in nodes.iter().enumerate() {
                for child in node.children() {
                    assert!(child > slot);
                    assert_eq!(nodes[child].parent, Some(slot));
                    assert_eq!(nodes[child].level, node.level + 1);
                    assert!(nodes[child].atom > node.atom);
                }
                assert!(node.processed || node.level >= 12);
            }
        }
    }

    #[test]
    fn fully_weighted_children_precede_switched_ones() {
        let sections = build(BuildStrategy::LevelSynchronous, 12);
        let cutoffs = VolumeCutoffs::default();
        let nodes = sections[0].nodes();
        for node in nodes {
            let above: Vec<bool> = node
                .children()
                .map(|c| cutoffs.is_above_switch(nodes[c].gaussian.volume))
                .collect();
            let first_switched = above.iter().position(|&a| !a).unwrap_or(above.len());
            assert!(above[first_switched..].iter().all(|&a| !a));
        }
    }

    #[test]
    fn max_order_truncates_and_counts_dropped_overlaps() {
        let full = build(BuildStrategy::Sequential, 12);
        let capped = build(BuildStrategy::Sequential, 2);
        assert!(capped[0].nodes().iter().all(|n| n.level <= 2));
        assert!(capped[0].truncated() > 0);
        assert_eq!(full[0].truncated(), 0);

        let capped_sync = build(BuildStrategy::LevelSynchronous, 2);
        assert_eq!(capped_sync[0].truncated(), capped[0].truncated());
        let capped_single = build(BuildStrategy::SinglePass, 2);
        assert_eq!(capped_single[0].truncated(), capped[0].truncated());
    }

    #[test]
    fn gamma_of_a_node_is_the_sum_over_its_atoms() {
        let (_, gammas) = cluster();
        let sections = build(BuildStrategy::SinglePass, 12);
        let section = &sections[0];
        for (slot, node) in section.nodes().iter().enumerate() {
            let mut expected = 0.0;
            let mut current = Some(slot);
            while let Some(s) = current {
                expected += gammas[section.nodes()[s].atom];
                current = section.nodes()[s].parent;
            }
            assert!((node.gamma - expected).abs() < 1e-12);
        }
    }
}
