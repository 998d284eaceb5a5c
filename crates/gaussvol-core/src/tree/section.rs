use super::error::TreeError;
use super::node::TreeNode;
use super::partition::SectionLayout;
use crate::core::gaussian::Gaussian;

/// Slot usage of a section after a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionOccupancy {
    pub section: usize,
    pub roots: usize,
    pub nodes: usize,
    pub capacity: usize,
}

/// A tree section: the roots of a disjoint subset of heavy atoms and all their descendants.
///
/// Sections never reference each other's slots, so they can be built, rescanned and reduced
/// independently.
#[derive(Debug, Clone)]
pub struct Section {
    pub(crate) index: usize,
    pub(crate) layout: SectionLayout,
    pub(crate) nodes: Vec<TreeNode>,
    pub(crate) truncated: usize,
}

impl Section {
    pub fn new(index: usize, layout: SectionLayout) -> Self {
        Self {
            index,
            layout,
            nodes: Vec::new(),
            truncated: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn layout(&self) -> &SectionLayout {
        &self.layout
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn capacity(&self) -> usize {
        self.layout.capacity
    }

    pub fn truncated(&self) -> usize {
        self.truncated
    }

    /// Clears the section and writes one level-1 root per owned heavy atom.
    pub(crate) fn init_roots(&mut self, gaussians: &[Gaussian], gammas: &[f64]) -> Result<(), TreeError> {
        self.nodes.clear();
        self.truncated = 0;
        self.ensure_capacity(self.layout.roots.len())?;
        self.nodes.extend(
            self.layout
                .roots
                .iter()
                .map(|&atom| TreeNode::root(atom, gaussians[atom], gammas[atom])),
        );
        Ok(())
    }

    pub(crate) fn ensure_capacity(&self, required: usize) -> Result<(), TreeError> {
        if required > self.layout.capacity {
            return Err(TreeError::CapacityOverflow {
                section: self.index,
                required,
                capacity: self.layout.capacity,
            });
        }
        Ok(())
    }

    pub fn occupancy(&self) -> SectionOccupancy {
        SectionOccupancy {
            section: self.index,
            roots: self.layout.roots.len(),
            nodes: self.nodes.len(),
            capacity: self.layout.capacity,
        }
    }

    /// Number of nodes rooted at each owned atom, including the root itself.
    pub fn subtree_sizes(&self) -> Vec<(usize, usize)> {
        let mut root_of = vec![0usize; self.nodes.len()];
        let mut sizes = vec![0usize; self.layout.roots.len()];
        for (slot, node) in self.nodes.iter().enumerate() {
            let root = match node.parent {
                Some(parent) => root_of[parent],
                None => slot,
            };
            root_of[slot] = root;
            if let Some(size) = sizes.get_mut(root) {
                *size += 1;
            }
        }
        self.layout.roots.iter().copied().zip(sizes).collect()
    }

    /// Local slots of the atoms that `slot` may still be intersected with.
    ///
    /// Roots pair with their neighbor-list partners; deeper nodes pair with the atoms of their
    /// siblings that have a larger index, so each atom set is enumerated once.
    pub(crate) fn sibling_atoms(&self, slot: usize) -> impl Iterator<Item = usize> + '_ {
        let node = &self.nodes[slot];
        let range = match node.parent {
            Some(parent) => self.nodes[parent].children(),
            None => 0..0,
        };
        let atom = node.atom;
        self.nodes[range]
            .iter()
            .map(|sibling| sibling.atom)
            .filter(move |&other| other > atom)
    }
}
