use crate::core::gaussian::{Gaussian, Overlap};
use nalgebra::Vector3;

/// One slot of the overlap tree.
///
/// A level-1 node is an atom; a level-`n` node is the intersection of the `n` atoms found on
/// the path from its root down to itself, `atom` being the last one added. Slot indices
/// (`parent`, `children_start`) are local to the owning section, and a child always sits at
/// a larger slot than its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeNode {
    pub level: usize,
    /// Last-inserted atom.
    pub atom: usize,
    pub parent: Option<usize>,
    pub children_start: usize,
    pub children_count: usize,
    /// Product Gaussian; `gaussian.volume` is the raw overlap volume.
    pub gaussian: Gaussian,
    pub switched_volume: f64,
    /// Derivative of the switched volume with respect to the raw volume.
    pub sfp: f64,
    /// `(1/r)·dV/dr` for the parent-atom separation.
    pub dvdr: f64,
    /// Derivative of the raw volume with respect to the parent's volume.
    pub dvv1: f64,
    /// Gradient of the raw volume with respect to the parent's center.
    pub dv1: Vector3<f64>,
    /// Sum of the atom weights along the path from the root.
    pub gamma: f64,
    /// Subtree self-volume accumulated by the last reduction.
    pub self_volume: f64,
    /// Subtree volume energy accumulated by the last reduction.
    pub energy: f64,
    /// Subtree energy gradient with respect to this node's center, from the last reduction.
    pub dvdc: Vector3<f64>,
    pub processed: bool,
    pub ok_to_process: bool,
}

impl TreeNode {
    /// A level-1 node holding the atom's own Gaussian.
    pub fn root(atom: usize, gaussian: Gaussian, gamma: f64) -> Self {
        Self {
            level: 1,
            atom,
            parent: None,
            children_start: 0,
            children_count: 0,
            gaussian,
            switched_volume: gaussian.volume,
            sfp: 1.0,
            dvdr: 0.0,
            dvv1: 1.0,
            dv1: Vector3::zeros(),
            gamma,
            self_volume: 0.0,
            energy: 0.0,
            dvdc: Vector3::zeros(),
            processed: false,
            ok_to_process: true,
        }
    }

    /// A child of `parent` (at local slot `parent_slot`) adding `atom` with the given overlap.
    pub fn child(
        parent_slot: usize,
        parent: &TreeNode,
        atom: usize,
        overlap: &Overlap,
        atom_gamma: f64,
    ) -> Self {
        Self {
            level: parent.level + 1,
            atom,
            parent: Some(parent_slot),
            children_start: 0,
            children_count: 0,
            gaussian: overlap.gaussian,
            switched_volume: overlap.switched_volume,
            sfp: overlap.sfp,
            dvdr: overlap.dvdr,
            dvv1: overlap.dvv1,
            dv1: overlap.dv1,
            gamma: parent.gamma + atom_gamma,
            self_volume: 0.0,
            energy: 0.0,
            dvdc: Vector3::zeros(),
            processed: false,
            ok_to_process: false,
        }
    }

    /// Overwrites the geometric fields with a freshly computed overlap.
    pub fn set_overlap(&mut self, overlap: &Overlap) {
        self.gaussian = overlap.gaussian;
        self.switched_volume = overlap.switched_volume;
        self.sfp = overlap.sfp;
        self.dvdr = overlap.dvdr;
        self.dvv1 = overlap.dvv1;
        self.dv1 = overlap.dv1;
    }

    /// Overwrites a root with a new atom Gaussian.
    pub fn set_atom_gaussian(&mut self, gaussian: Gaussian) {
        self.gaussian = gaussian;
        self.switched_volume = gaussian.volume;
        self.sfp = 1.0;
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children_count == 0
    }

    #[inline]
    pub fn children(&self) -> std::ops::Range<usize> {
        self.children_start..self.children_start + self.children_count
    }

    /// Inclusion–exclusion sign of this node's order.
    #[inline]
    pub fn sign(&self) -> f64 {
        if self.level % 2 == 0 { -1.0 } else { 1.0 }
    }
}
