use super::born::PIFAC;
use super::config::EngineConfig;
use crate::core::gaussian::{Gaussian, sphere_volume};
use crate::core::neighbors::NeighborList;
use crate::core::switching::VolumeCutoffs;
use crate::tree::{BuildStats, OverlapTree, TreeError, TreeInput};
use nalgebra::Point3;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A solvent-probe pseudo-particle placed in the crevice between two heavy atoms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeParticle {
    pub position: Point3<f64>,
    pub volume: f64,
    pub parents: (usize, usize),
}

/// Places one probe for every heavy pair whose surfaces are less than a probe diameter apart
/// but do not touch.
///
/// The probe sits halfway between the two surfaces. Its volume is a Gaussian in the pair
/// distance, peaking half a probe radius beyond contact with height
/// `c·(r₁r₂/r_w²)·(4/3·π·r_w³)`.
pub fn place_probes(
    positions: &[Point3<f64>],
    radii: &[f64],
    is_hydrogen: &[bool],
    probe_radius: f64,
    volume_coefficient: f64,
) -> Vec<ProbeParticle> {
    let max_radius = radii
        .iter()
        .zip(is_hydrogen)
        .filter(|(_, h)| !**h)
        .map(|(r, _)| *r)
        .fold(0.0, f64::max);
    let reach = 2.0 * (max_radius + probe_radius);
    let neighbors = NeighborList::build(positions, is_hydrogen, reach);
    let probe_volume = sphere_volume(probe_radius);

    let mut probes = Vec::new();
    for i in 0..positions.len() {
        let r1 = radii[i];
        for &j in neighbors.partners(i) {
            let r2 = radii[j];
            let dist = positions[j] - positions[i];
            let d = dist.norm();
            let contact = r1 + r2;
            if d <= contact || d >= contact + 2.0 * probe_radius {
                continue;
            }
            let q = (r1 * r2).sqrt() / probe_radius;
            let peak = contact + 0.5 * probe_radius;
            let sigma = 0.5 * q.sqrt() * probe_radius;
            let volume = volume_coefficient
                * q
                * q
                * probe_volume
                * (-0.5 * (d - peak).powi(2) / (sigma * sigma)).exp();
            let from_first = 0.5 * (d - contact) + r1;
            probes.push(ProbeParticle {
                position: positions[i] + dist * (from_first / d),
                volume,
                parents: (i, j),
            });
        }
    }
    probes
}

/// Subtracts from every probe its overlap with the atoms, each atom weighted by its self
/// volume, and keeps the probes whose remaining volume survives the switching cutoffs.
///
/// The retained probes carry their switched free volume.
pub fn prune_probes(
    probes: &[ProbeParticle],
    positions: &[Point3<f64>],
    radii: &[f64],
    is_hydrogen: &[bool],
    self_volumes: &[f64],
    probe_radius: f64,
    cutoffs: &VolumeCutoffs,
) -> Vec<ProbeParticle> {
    let atoms: Vec<Gaussian> = (0..positions.len())
        .filter(|&i| !is_hydrogen[i])
        .map(|i| Gaussian::from_sphere(positions[i], radii[i], self_volumes[i]))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let iterator = probes.iter();

    #[cfg(feature = "parallel")]
    let iterator = probes.par_iter();

    iterator
        .filter_map(|probe| {
            let g = Gaussian::from_sphere(probe.position, probe_radius, probe.volume);
            let free = atoms
                .iter()
                .fold(probe.volume, |free, atom| free - g.overlap(atom, cutoffs).volume());
            if !cutoffs.is_retained(free) {
                return None;
            }
            let (s, _) = cutoffs.switch(free);
            Some(ProbeParticle {
                volume: free * s,
                ..*probe
            })
        })
        .collect()
}

/// Self-volume corrections from solvent-probe particles.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeCorrection {
    /// Volume added to each atom's self volume.
    pub self_volume_additions: Vec<f64>,
    pub candidates: usize,
    pub retained: usize,
    /// Statistics of the probe tree, if any probe survived.
    pub tree: Option<BuildStats>,
}

impl ProbeCorrection {
    /// Born-radius offsets `Δr_i = (1/4π)·ΔV_i/r_i²`, the first-order growth of a sphere of
    /// radius `r_i` whose volume increases by `ΔV_i`.
    pub fn radius_offsets(&self, radii: &[f64]) -> Vec<f64> {
        self.self_volume_additions
            .iter()
            .zip(radii)
            .map(|(dv, r)| PIFAC * dv / (r * r))
            .collect()
    }
}

/// Builds the probe particles of a configuration, decomposes their union with a second
/// overlap tree, and hands half of every probe's self volume to each of its two parents.
///
/// # Arguments
///
/// * `self_volumes` - Atomic self volumes at the van der Waals radii.
/// * `config` - Supplies the probe parameters and the tree settings reused for the probes.
///
/// # Errors
///
/// Propagates [`TreeError`] from the probe tree.
pub fn probe_correction(
    positions: &[Point3<f64>],
    radii: &[f64],
    is_hydrogen: &[bool],
    self_volumes: &[f64],
    config: &EngineConfig,
) -> Result<ProbeCorrection, TreeError> {
    let solvent = &config.solvent;
    let candidates = place_probes(
        positions,
        radii,
        is_hydrogen,
        solvent.probe_radius,
        solvent.probe_volume_coefficient,
    );
    let probes = prune_probes(
        &candidates,
        positions,
        radii,
        is_hydrogen,
        self_volumes,
        solvent.probe_radius,
        &solvent.probe_cutoffs,
    );
    debug!(
        candidates = candidates.len(),
        retained = probes.len(),
        "Solvent probe particles placed."
    );

    let mut additions = vec![0.0; positions.len()];
    if probes.is_empty() {
        return Ok(ProbeCorrection {
            self_volume_additions: additions,
            candidates: candidates.len(),
            retained: 0,
            tree: None,
        });
    }

    let probe_positions: Vec<Point3<f64>> = probes.iter().map(|p| p.position).collect();
    let probe_radii = vec![solvent.probe_radius; probes.len()];
    let probe_volumes: Vec<f64> = probes.iter().map(|p| p.volume).collect();
    let gammas = vec![1.0; probes.len()];
    let flags = vec![false; probes.len()];
    let neighbors = NeighborList::build(&probe_positions, &flags, config.neighbor_cutoff);
    let input = TreeInput::from_spheres(
        &probe_positions,
        &probe_radii,
        &probe_volumes,
        &gammas,
        &flags,
        &neighbors,
    );

    let mut tree = OverlapTree::with_estimated_capacity(&input, config.tree, &config.partition)?;
    let stats = tree.build(&input)?;
    let volumes = tree.compute_self_volumes()?;

    for (probe, self_volume) in probes.iter().zip(&volumes.self_volumes) {
        let (i, j) = probe.parents;
        additions[i] += 0.5 * self_volume;
        additions[j] += 0.5 * self_volume;
    }

    Ok(ProbeCorrection {
        self_volume_additions: additions,
        candidates: candidates.len(),
        retained: probes.len(),
        tree: Some(stats),
    })
}
