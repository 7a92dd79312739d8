// dgb_node_rust/src/blockchain/algo.rs

// Mining algorithms and their version-bit encoding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of algorithm slots, including reserved ones.
pub const NUM_ALGOS_IMPL: usize = 8;

/// Number of algorithms that take part in the blended work average.
pub const NUM_ALGOS: u32 = 5;

/// Mask over the header version carrying the algorithm id.
pub const BLOCK_VERSION_ALGO: i32 = 15 << 8;
pub const BLOCK_VERSION_SCRYPT: i32 = 0;
pub const BLOCK_VERSION_SHA256D: i32 = 2 << 8;
pub const BLOCK_VERSION_GROESTL: i32 = 4 << 8;
pub const BLOCK_VERSION_SKEIN: i32 = 6 << 8;
pub const BLOCK_VERSION_QUBIT: i32 = 8 << 8;
pub const BLOCK_VERSION_ODO: i32 = 14 << 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algo {
    Sha256d,
    Scrypt,
    Groestl,
    Skein,
    Qubit,
    Odo,
}

impl Algo {
    /// Every implemented algorithm, in slot order.
    pub const ALL: [Algo; 6] = [
        Algo::Sha256d,
        Algo::Scrypt,
        Algo::Groestl,
        Algo::Skein,
        Algo::Qubit,
        Algo::Odo,
    ];

    /// Slot in `BlockIndex::last_algo_blocks`. Slots 5 and 6 are reserved.
    pub fn slot(self) -> usize {
        match self {
            Algo::Sha256d => 0,
            Algo::Scrypt => 1,
            Algo::Groestl => 2,
            Algo::Skein => 3,
            Algo::Qubit => 4,
            Algo::Odo => 7,
        }
    }

    pub fn from_version(version: i32) -> Option<Algo> {
        match version & BLOCK_VERSION_ALGO {
            BLOCK_VERSION_SCRYPT => Some(Algo::Scrypt),
            BLOCK_VERSION_SHA256D => Some(Algo::Sha256d),
            BLOCK_VERSION_GROESTL => Some(Algo::Groestl),
            BLOCK_VERSION_SKEIN => Some(Algo::Skein),
            BLOCK_VERSION_QUBIT => Some(Algo::Qubit),
            BLOCK_VERSION_ODO => Some(Algo::Odo),
            _ => None,
        }
    }

    /// Version bits to OR into a header version for this algorithm.
    pub fn version_bits(self) -> i32 {
        match self {
            Algo::Sha256d => BLOCK_VERSION_SHA256D,
            Algo::Scrypt => BLOCK_VERSION_SCRYPT,
            Algo::Groestl => BLOCK_VERSION_GROESTL,
            Algo::Skein => BLOCK_VERSION_SKEIN,
            Algo::Qubit => BLOCK_VERSION_QUBIT,
            Algo::Odo => BLOCK_VERSION_ODO,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Algo::Sha256d => "sha256d",
            Algo::Scrypt => "scrypt",
            Algo::Groestl => "groestl",
            Algo::Skein => "skein",
            Algo::Qubit => "qubit",
            Algo::Odo => "odo",
        }
    }
}

impl fmt::Display for Algo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
