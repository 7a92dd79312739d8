// dgb_node_rust/src/error.rs

use thiserror::Error;

/// Chain index errors.
///
/// `IndexCorruption` is the only fatal variant: it means the block-index
/// graph broke a structural invariant and the consensus layer must stop.
#[derive(Error, Debug)]
pub enum ChainError {
    /// Header references a parent that is not in the index.
    #[error("Unknown parent {parent} for header {hash}")]
    UnknownParent { hash: String, parent: String },

    /// Block is not in the index.
    #[error("Unknown block {0}")]
    UnknownBlock(String),

    /// Header has no parent but is not this network's genesis block.
    #[error("Header {0} has no parent and is not the genesis block")]
    UnexpectedGenesis(String),

    /// Compact target decodes to a negative, overflowing or zero value.
    #[error("Invalid target 0x{bits:08x} for block {hash} at height {height}")]
    InvalidTarget { hash: String, height: u32, bits: u32 },

    /// Header bytes could not be decoded.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// Network id has no parameter preset.
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    /// Structural invariant of the block index violated.
    #[error("Block index corrupted: {0}")]
    IndexCorruption(String),

    /// A thread panicked while holding the chain state lock.
    #[error("Chain state lock poisoned")]
    LockPoisoned,

    /// Settings could not be loaded.
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Report could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChainError {
    /// True for errors that signal a corrupted index rather than bad input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChainError::IndexCorruption(_))
    }
}

/// Result type for chain index operations.
pub type ChainResult<T> = Result<T, ChainError>;
