use super::section::Section;
use crate::core::gaussian::Gaussian;
use crate::core::switching::VolumeCutoffs;

/// Recomputes every node's Gaussian, switched volume and weight from new atom Gaussians.
///
/// Parents precede their children in slot order, so a single forward sweep sees every parent
/// already updated. The topology is left untouched: overlaps that shrink below the lower
/// cutoff stay in the tree with a zero switched volume.
pub(crate) fn rescan_volumes(
    section: &mut Section,
    gaussians: &[Gaussian],
    gammas: &[f64],
    cutoffs: &VolumeCutoffs,
) {
    for slot in 0..section.nodes.len() {
        let atom = section.nodes[slot].atom;
        match section.nodes[slot].parent {
            None => {
                let node = &mut section.nodes[slot];
                node.set_atom_gaussian(gaussians[atom]);
                node.gamma = gammas[atom];
            }
            Some(parent) => {
                let parent = section.nodes[parent];
                let overlap = parent.gaussian.overlap(&gaussians[atom], cutoffs);
                let node = &mut section.nodes[slot];
                node.set_overlap(&overlap);
                node.gamma = parent.gamma + gammas[atom];
            }
        }
    }
}

/// Recomputes only the node weights, reusing the volumes from the last build or rescan.
pub(crate) fn rescan_gammas(section: &mut Section, gammas: &[f64]) {
    for slot in 0..section.nodes.len() {
        let atom = section.nodes[slot].atom;
        let inherited = match section.nodes[slot].parent {
            Some(parent) => section.nodes[parent].gamma,
            None => 0.0,
        };
        section.nodes[slot].gamma = inherited + gammas[atom];
    }
}
