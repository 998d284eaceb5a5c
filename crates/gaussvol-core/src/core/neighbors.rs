use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point3;

/// Candidate overlap partners for every atom.
///
/// Only heavy atoms take part in the overlap tree, so each atom stores the sorted list of
/// heavy partners with a larger index. Hydrogens have no partners and are never listed as
/// anybody's partner. Keeping only `j > i` is what prevents the same pair from being
/// enumerated twice while the tree is expanded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborList {
    partners: Vec<Vec<usize>>,
}

impl NeighborList {
    /// Builds the list from positions with a kd-tree range query.
    ///
    /// # Arguments
    ///
    /// * `positions` - Atom centers.
    /// * `is_hydrogen` - Hydrogen flags, same length as `positions`.
    /// * `cutoff` - Pairs farther apart than this distance are not listed.
    pub fn build(positions: &[Point3<f64>], is_hydrogen: &[bool], cutoff: f64) -> Self {
        let n = positions.len();
        let mut partners = vec![Vec::new(); n];

        let heavy: Vec<usize> = (0..n).filter(|&i| !is_hydrogen[i]).collect();
        if heavy.len() < 2 {
            return Self { partners };
        }

        let heavy_positions: Vec<[f64; 3]> = heavy
            .iter()
            .map(|&i| [positions[i].x, positions[i].y, positions[i].z])
            .collect();
        let kdtree: KdTree<f64, 3> = (&heavy_positions).into();
        let cutoff_sq = cutoff * cutoff;

        for (k, &i) in heavy.iter().enumerate() {
            let found = kdtree.within_unsorted::<SquaredEuclidean>(&heavy_positions[k], cutoff_sq);
            let list = &mut partners[i];
            list.extend(
                found
                    .into_iter()
                    .map(|neighbour| heavy[neighbour.item as usize])
                    .filter(|&j| j > i),
            );
            list.sort_unstable();
        }

        Self { partners }
    }

    /// Every heavy pair is a candidate. Used for small systems and as a reference.
    pub fn all_pairs(is_hydrogen: &[bool]) -> Self {
        let n = is_hydrogen.len();
        let partners = (0..n)
            .map(|i| {
                if is_hydrogen[i] {
                    Vec::new()
                } else {
                    ((i + 1)..n).filter(|&j| !is_hydrogen[j]).collect()
                }
            })
            .collect();
        Self { partners }
    }

    /// Builds the list from an externally supplied set of candidate pairs.
    ///
    /// Pairs are normalized to `(min, max)`, self pairs and pairs involving a hydrogen are
    /// dropped, and duplicates are removed. Indices out of range are ignored.
    pub fn from_pairs<I>(is_hydrogen: &[bool], pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let n = is_hydrogen.len();
        let mut partners = vec![Vec::new(); n];
        for (a, b) in pairs {
            let (i, j) = if a < b { (a, b) } else { (b, a) };
            if i == j || j >= n || is_hydrogen[i] || is_hydrogen[j] {
                continue;
            }
            partners[i].push(j);
        }
        for list in &mut partners {
            list.sort_unstable();
            list.dedup();
        }
        Self { partners }
    }

    /// Heavy partners of atom `i` with index greater than `i`, in increasing order.
    #[inline]
    pub fn partners(&self, i: usize) -> &[usize] {
        self.partners.get(i).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    pub fn pair_count(&self) -> usize {
        self.partners.iter().map(Vec::len).sum()
    }

    pub fn contains(&self, i: usize, j: usize) -> bool {
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        self.partners(i).binary_search(&j).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize, spacing: f64) -> Vec<Point3<f64>> {
        (0..n)
            .map(|i| Point3::new(i as f64 * spacing, 0.0, 0.0))
            .collect()
    }

    #[test]
    fn build_lists_only_forward_partners_within_cutoff() {
        let positions = line(4, 1.0);
        let list = NeighborList::build(&positions, &[false; 4], 1.5);
        assert_eq!(list.partners(0), &[1]);
        assert_eq!(list.partners(1), &[2]);
        assert_eq!(list.partners(2), &[3]);
        assert!(list.partners(3).is_empty());
        assert_eq!(list.pair_count(), 3);
    }

    #[test]
    fn build_excludes_hydrogens_on_both_sides() {
        let positions = line(3, 1.0);
        let list = NeighborList::build(&positions, &[false, true, false], 5.0);
        assert_eq!(list.partners(0), &[2]);
        assert!(list.partners(1).is_empty());
        assert!(!list.contains(0, 1));
    }

    #[test]
    fn build_agrees_with_all_pairs_for_large_cutoff() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.5),
            Point3::new(-1.0, 0.3, 2.0),
            Point3::new(0.7, -1.1, -0.4),
            Point3::new(2.5, 0.0, 1.0),
        ];
        let flags = [false, false, true, false, false];
        let built = NeighborList::build(&positions, &flags, 100.0);
        assert_eq!(built, NeighborList::all_pairs(&flags));
    }

    #[test]
    fn from_pairs_normalizes_and_deduplicates() {
        let flags = [false, false, false, true];
        let list = NeighborList::from_pairs(&flags, vec![(2, 0), (0, 2), (1, 1), (1, 3), (0, 1), (5, 0)]);
        assert_eq!(list.partners(0), &[1, 2]);
        assert!(list.partners(1).is_empty());
        assert!(list.contains(2, 0));
        assert_eq!(list.pair_count(), 2);
    }

    #[test]
    fn single_heavy_atom_has_no_partners() {
        let list = NeighborList::build(&line(2, 1.0), &[false, true], 10.0);
        assert_eq!(list.pair_count(), 0);
        assert_eq!(list.len(), 2);
    }
}
