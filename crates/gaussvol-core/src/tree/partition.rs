use std::ops::Range;
use tracing::debug;

/// Controls how heavy atoms are split into tree sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSettings {
    /// Number of parallel lane groups the sections are spread over.
    pub lane_groups: usize,
    /// Below this many heavy atoms per lane group, sections are merged.
    pub min_atoms_per_section: usize,
    /// Above this many heavy atoms per lane group, more sections than lane groups are used.
    pub max_atoms_per_section: usize,
    /// Section capacities are rounded up to a multiple of this width.
    pub pad_modulo: usize,
}

impl Default for PartitionSettings {
    fn default() -> Self {
        Self {
            lane_groups: 8,
            min_atoms_per_section: 8,
            max_atoms_per_section: 256,
            pad_modulo: 64,
        }
    }
}

/// Layout of one section: the atoms whose roots it owns and the slot range it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLayout {
    /// Contiguous atom range; hydrogens inside it are carried along but own no root.
    pub atoms: Range<usize>,
    /// Heavy atoms owning a root in this section, in increasing index order.
    pub roots: Vec<usize>,
    /// First global slot of the section.
    pub offset: usize,
    pub capacity: usize,
}

/// Assignment of atoms to independent tree sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    sections: Vec<SectionLayout>,
    atom_slot: Vec<Option<usize>>,
    atom_section: Vec<Option<usize>>,
    is_hydrogen: Vec<bool>,
}

impl Partition {
    /// Partitions the atoms using per-atom overlap counts from an estimation pass.
    ///
    /// Every section receives a near-equal share of the heavy atoms and the same capacity:
    /// twice the largest per-section overlap count, padded to `pad_modulo`.
    ///
    /// # Arguments
    ///
    /// * `counts` - Estimated number of tree nodes rooted at each atom (zero for hydrogens).
    /// * `is_hydrogen` - Hydrogen flags; hydrogens own no root.
    /// * `settings` - Section sizing policy.
    pub fn new(counts: &[usize], is_hydrogen: &[bool], settings: &PartitionSettings) -> Self {
        let heavy_total = is_hydrogen.iter().filter(|&&h| !h).count();
        let num_sections = section_count(heavy_total, settings);

        let ranges = split_atoms(is_hydrogen, heavy_total, num_sections);
        let max_sum = ranges
            .iter()
            .map(|(_, roots)| roots.iter().map(|&i| counts.get(i).copied().unwrap_or(1)).sum::<usize>())
            .max()
            .unwrap_or(0);
        let capacity = pad(2 * max_sum, settings.pad_modulo);

        debug!(
            sections = num_sections,
            heavy_atoms = heavy_total,
            capacity,
            "Partitioned overlap tree."
        );

        Self::from_ranges(ranges, is_hydrogen, |_| capacity)
    }

    /// A single section holding every heavy atom.
    ///
    /// With `capacity == None` the section is unbounded, which is what the estimation pass
    /// uses to measure overlap counts.
    pub fn single(is_hydrogen: &[bool], capacity: Option<usize>) -> Self {
        let heavy_total = is_hydrogen.iter().filter(|&&h| !h).count();
        let ranges = split_atoms(is_hydrogen, heavy_total, usize::from(heavy_total > 0));
        Self::from_ranges(ranges, is_hydrogen, |_| capacity.unwrap_or(usize::MAX))
    }

    /// Splits the heavy atoms into exactly `num_sections` sections of the given capacity.
    pub fn with_sections(is_hydrogen: &[bool], num_sections: usize, capacity: usize) -> Self {
        let heavy_total = is_hydrogen.iter().filter(|&&h| !h).count();
        let ranges = split_atoms(is_hydrogen, heavy_total, num_sections.min(heavy_total));
        Self::from_ranges(ranges, is_hydrogen, |_| capacity)
    }

    fn from_ranges(
        ranges: Vec<(Range<usize>, Vec<usize>)>,
        is_hydrogen: &[bool],
        capacity: impl Fn(usize) -> usize,
    ) -> Self {
        let n = is_hydrogen.len();
        let mut atom_slot = vec![None; n];
        let mut atom_section = vec![None; n];
        let mut sections = Vec::with_capacity(ranges.len());
        let mut offset = 0usize;

        for (index, (atoms, roots)) in ranges.into_iter().enumerate() {
            let capacity = capacity(index);
            for (local, &atom) in roots.iter().enumerate() {
                atom_slot[atom] = Some(offset + local);
                atom_section[atom] = Some(index);
            }
            sections.push(SectionLayout {
                atoms,
                roots,
                offset,
                capacity,
            });
            offset = offset.saturating_add(capacity);
        }

        Self {
            sections,
            atom_slot,
            atom_section,
            is_hydrogen: is_hydrogen.to_vec(),
        }
    }

    pub fn sections(&self) -> &[SectionLayout] {
        &self.sections
    }

    pub fn num_sections(&self) -> usize {
        self.sections.len()
    }

    pub fn num_atoms(&self) -> usize {
        self.atom_slot.len()
    }

    pub fn is_hydrogen(&self) -> &[bool] {
        &self.is_hydrogen
    }

    /// Global slot of the root of `atom`, `None` for hydrogens.
    pub fn atom_slot(&self, atom: usize) -> Option<usize> {
        self.atom_slot.get(atom).copied().flatten()
    }

    pub fn atom_section(&self, atom: usize) -> Option<usize> {
        self.atom_section.get(atom).copied().flatten()
    }

    /// Total number of slots over all sections.
    pub fn total_capacity(&self) -> usize {
        self.sections
            .iter()
            .fold(0usize, |acc, s| acc.saturating_add(s.capacity))
    }
}

/// Number of sections for the given heavy-atom count.
pub fn section_count(heavy_total: usize, settings: &PartitionSettings) -> usize {
    if heavy_total == 0 {
        return 0;
    }
    let lane_groups = settings.lane_groups.max(1);
    let min_atoms = settings.min_atoms_per_section.max(1);
    let max_atoms = settings.max_atoms_per_section.max(min_atoms);
    let per_group = heavy_total / lane_groups;

    let count = if per_group < min_atoms {
        (heavy_total / min_atoms).max(1)
    } else if per_group > max_atoms {
        let mut n = lane_groups;
        while heavy_total / n >= max_atoms {
            n += lane_groups;
        }
        n
    } else {
        lane_groups
    };
    count.min(heavy_total)
}

/// Rounds `value` up to a multiple of `modulo` (no-op for a zero modulo).
pub fn pad(value: usize, modulo: usize) -> usize {
    if modulo == 0 {
        return value;
    }
    value.div_ceil(modulo) * modulo
}

/// Walks the atoms in order, closing a section once it has collected its share of heavy atoms.
/// Hydrogens after the last heavy atom are left outside every section.
fn split_atoms(
    is_hydrogen: &[bool],
    heavy_total: usize,
    num_sections: usize,
) -> Vec<(Range<usize>, Vec<usize>)> {
    if num_sections == 0 {
        return Vec::new();
    }
    let per = heavy_total / num_sections;
    let extra = heavy_total % num_sections;

    let mut ranges = Vec::with_capacity(num_sections);
    let mut cursor = 0usize;
    for s in 0..num_sections {
        let target = per + usize::from(s < extra);
        let start = cursor;
        let mut roots = Vec::with_capacity(target);
        while roots.len() < target && cursor < is_hydrogen.len() {
            if !is_hydrogen[cursor] {
                roots.push(cursor);
            }
            cursor += 1;
        }
        ranges.push((start..cursor, roots));
    }
    ranges
}
