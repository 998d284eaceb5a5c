//! # Core Models Module
//!
//! Data structures describing the particles an evaluation runs on.
//!
//! - [`atom`] - Static per-atom parameters (radius, energy weights, hydrogen flag)
//! - [`system`] - A [`system::ParticleSystem`] holding parameters and current positions,
//!   with the consistency checks that guard parameter updates between evaluations

pub mod atom;
pub mod system;
