use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error(
        "Overlap tree section {section} needs {required} slots but only {capacity} were allocated; re-estimate the tree capacity"
    )]
    CapacityOverflow {
        section: usize,
        required: usize,
        capacity: usize,
    },
    #[error("Tree was partitioned for {expected} atoms but received {found}")]
    AtomCountMismatch { expected: usize, found: usize },
    #[error("Hydrogen classification of atom {atom} differs from the tree partition")]
    HydrogenMismatch { atom: usize },
    #[error("Overlap tree has not been built")]
    EmptyTree,
}
