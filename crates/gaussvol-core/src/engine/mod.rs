//! # Engine Module
//!
//! Stateful evaluation of the implicit-solvent energy models on top of the overlap tree.
//!
//! ## Overview
//!
//! An [`evaluator::Evaluator`] owns one overlap tree whose capacity is estimated on the first
//! evaluation and kept afterwards. Every evaluation rebuilds the tree topology for the new
//! positions, reduces it into self volumes, and then rescans the same topology as many times
//! as the model needs:
//!
//! - **GVolSA**: a build with the enlarged radii and a full rescan with the van der Waals
//!   radii give the surface-area energy as a difference of two weighted volumes.
//! - **AGBNP1**: the van der Waals self volumes left by that rescan scale the pairwise
//!   descreening that defines the Born radii ([`born`]), which feed the generalized-Born
//!   ([`gb`]) and dispersion ([`dispersion`]) energies. Two gamma rescans weighted by the
//!   descreening derivatives supply the part of their gradients that flows through the
//!   self volumes.
//! - **AGBNP2**: as AGBNP1 on a tree built directly with van der Waals radii, with
//!   solvent-probe particles ([`probes`]) decomposed in a second tree to correct the self
//!   volumes at the molecular boundary.
//!
//! ## Submodules
//!
//! - **Configuration** ([`config`]) - Model selection, tree and partition settings, solvent
//!   parameters, and their validation
//! - **Error Handling** ([`error`]) - Engine-level error type wrapping the lower layers
//! - **Energy Terms** ([`term`]) - Energy breakdown of one evaluation

pub mod born;
pub mod config;
pub mod dispersion;
pub mod error;
pub mod evaluator;
pub mod gb;
pub mod probes;
pub mod term;
