//! # Workflows Module
//!
//! One-shot entry points that take a particle system and a configuration and return a finished
//! result, without the caller managing an [`Evaluator`](crate::engine::evaluator::Evaluator).
//!
//! ## Architecture
//!
//! - **Evaluation Workflow** ([`evaluate`]) - A single energy and gradient evaluation with the
//!   per-atom result rows ready to be written out
//! - **Tree Inspection** ([`inspect`]) - Builds the overlap tree of a configuration and reports
//!   how it fills its sections

pub mod evaluate;
pub mod inspect;
