//! Reading particle systems from CSV atom files and writing per-atom results.

pub mod atoms;
