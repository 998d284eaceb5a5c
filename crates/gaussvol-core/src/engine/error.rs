use thiserror::Error;

use super::config::ConfigError;
use crate::core::io::atoms::AtomFileError;
use crate::core::models::system::SystemError;
use crate::tree::TreeError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Overlap tree failure: {source}")]
    Tree {
        #[from]
        source: TreeError,
    },

    #[error("Inconsistent particle system: {source}")]
    System {
        #[from]
        source: SystemError,
    },

    #[error("Failed to load atoms: {source}")]
    AtomFile {
        #[from]
        source: AtomFileError,
    },
}
