//! # Core Module
//!
//! Stateless foundations of the library: the Gaussian volume model and everything an
//! evaluation needs to read about the particles it runs on.
//!
//! ## Architecture
//!
//! - **Gaussian Model** ([`gaussian`], [`switching`]) - Sphere-to-Gaussian mapping, the
//!   closed-form two-Gaussian overlap and the quintic switching function that fades small
//!   overlaps in and out continuously
//! - **Particle Representation** ([`models`]) - Per-atom parameters and the particle system
//! - **Candidate Pairs** ([`neighbors`]) - Cutoff-filtered heavy-atom partner lists
//! - **Descreening** ([`descreening`]) - The pairwise descreening integral used by the
//!   Born-radius calculation
//! - **File I/O** ([`io`]) - CSV atom input and per-atom result output

pub mod descreening;
pub mod gaussian;
pub mod io;
pub mod models;
pub mod neighbors;
pub mod switching;
