//! # GaussVol Core Library
//!
//! Analytic Gaussian overlap volumes and the implicit-solvent energies built on them: a
//! surface-area-like volume energy (GVolSA) and the AGBNP generalized-Born models with their
//! exact gradients.
//!
//! ## Architectural Philosophy
//!
//! The library is layered so that each level only depends on the ones below it.
//!
//! - **[`core`]: The Foundation.** Stateless pieces: the sphere-to-Gaussian mapping and the
//!   two-Gaussian overlap, the switching function, the particle system, neighbor lists, the
//!   descreening integral and CSV I/O.
//!
//! - **[`tree`]: The Overlap Tree.** The partitioned inclusion–exclusion tree that turns a
//!   set of Gaussians into self volumes, a weighted volume energy and its gradient, plus the
//!   rescans that reuse a topology under new radii or weights.
//!
//! - **[`engine`]: The Logic Core.** The stateful [`engine::evaluator::Evaluator`] that keeps
//!   a tree across time steps and composes the volume, Born-radius, generalized-Born and
//!   dispersion stages of each model.
//!
//! - **[`workflows`]: The Public API.** One-call entry points for evaluating a configuration
//!   or inspecting its tree.

pub mod core;
pub mod engine;
pub mod tree;
pub mod workflows;
