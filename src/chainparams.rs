// dgb_node_rust/src/chainparams.rs

use serde::Serialize;

use crate::blockchain::algo::Algo;
use crate::blockchain::header::BlockHeaderData;
use crate::error::{ChainError, ChainResult};

pub const MAIN_NETWORK_ID: &str = "main";
pub const TEST_NETWORK_ID: &str = "test";
pub const REGTEST_NETWORK_ID: &str = "regtest";
pub const SIGNET_NETWORK_ID: &str = "signet";

/// Below this height every mainnet block is classified as scrypt,
/// whatever its version bits say.
pub const MAINNET_SCRYPT_OVERRIDE_HEIGHT: u32 = 145_000;

// Shared by every network's genesis block (same coinbase transaction).
const GENESIS_MERKLE_ROOT: [u8; 32] = [
    0xad, 0x0f, 0x7d, 0x75, 0x18, 0xfc, 0x1e, 0x90, 0xed, 0x28, 0xbd, 0x0e, 0x44, 0x4c, 0xcd, 0x8e,
    0x24, 0xd9, 0x46, 0x88, 0x35, 0x57, 0x05, 0xed, 0x21, 0x42, 0x00, 0x6b, 0x49, 0xd9, 0xdd, 0x72,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenesisParams {
    pub timestamp: u32,
    pub nonce: u32,
    pub bits: u32,
    pub version: i32,
}

/// Consensus parameters read by the block index. Threaded explicitly into
/// every function that needs them; there is no global instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainParams {
    pub network_id_string: &'static str,
    /// Height below which mainnet blocks are forced to scrypt.
    pub scrypt_override_height: u32,
    /// Multi-algo hard fork: static per-algorithm work weights start here.
    pub multi_algo_diff_change_target: u32,
    /// Blended geometric-mean work accounting starts here.
    pub work_computation_change_target: u32,
    /// Odo replaces Groestl in the active algorithm set from this height.
    pub odo_height: u32,
    /// Target block spacing in seconds.
    pub pow_target_spacing: i64,
    /// Easiest allowed target, compact form.
    pub pow_limit_bits: u32,
    pub genesis: GenesisParams,
}

pub const MAINNET_PARAMS: ChainParams = ChainParams {
    network_id_string: MAIN_NETWORK_ID,
    scrypt_override_height: MAINNET_SCRYPT_OVERRIDE_HEIGHT,
    multi_algo_diff_change_target: 145_000,
    work_computation_change_target: 1_430_000,
    odo_height: 9_112_320,
    pow_target_spacing: 60 / 4,
    pow_limit_bits: 0x1e0fffff,
    genesis: GenesisParams { timestamp: 1389388394, nonce: 2447652, bits: 0x1e0ffff0, version: 1 },
};

pub const TESTNET_PARAMS: ChainParams = ChainParams {
    network_id_string: TEST_NETWORK_ID,
    scrypt_override_height: MAINNET_SCRYPT_OVERRIDE_HEIGHT,
    multi_algo_diff_change_target: 100,
    work_computation_change_target: 1_430,
    odo_height: 600,
    pow_target_spacing: 60 / 4,
    pow_limit_bits: 0x1e0fffff,
    genesis: GenesisParams { timestamp: 1516939474, nonce: 2411473, bits: 0x1e0ffff0, version: 1 },
};

pub const REGTEST_PARAMS: ChainParams = ChainParams {
    network_id_string: REGTEST_NETWORK_ID,
    scrypt_override_height: MAINNET_SCRYPT_OVERRIDE_HEIGHT,
    multi_algo_diff_change_target: 290,
    work_computation_change_target: 1_430,
    odo_height: 600,
    pow_target_spacing: 60 / 4,
    pow_limit_bits: 0x207fffff,
    genesis: GenesisParams { timestamp: 1519460922, nonce: 4, bits: 0x207fffff, version: 1 },
};

// Signet leaves both regime heights unset, so every rule applies from genesis.
pub const SIGNET_PARAMS: ChainParams = ChainParams {
    network_id_string: SIGNET_NETWORK_ID,
    scrypt_override_height: MAINNET_SCRYPT_OVERRIDE_HEIGHT,
    multi_algo_diff_change_target: 0,
    work_computation_change_target: 0,
    odo_height: 1,
    pow_target_spacing: 10 * 60,
    pow_limit_bits: 0x1e0377ae,
    genesis: GenesisParams { timestamp: 1598918400, nonce: 52613770, bits: 0x1e0377ae, version: 1 },
};

impl ChainParams {
    pub fn for_network(network: &str) -> ChainResult<ChainParams> {
        match network {
            MAIN_NETWORK_ID | "mainnet" => Ok(MAINNET_PARAMS),
            TEST_NETWORK_ID | "testnet" => Ok(TESTNET_PARAMS),
            REGTEST_NETWORK_ID => Ok(REGTEST_PARAMS),
            SIGNET_NETWORK_ID => Ok(SIGNET_PARAMS),
            other => Err(ChainError::UnknownNetwork(other.to_string())),
        }
    }

    pub fn is_mainnet(&self) -> bool {
        self.network_id_string == MAIN_NETWORK_ID
    }

    pub fn genesis_header(&self) -> BlockHeaderData {
        BlockHeaderData {
            version: self.genesis.version,
            prev_block_hash: [0u8; 32],
            merkle_root: GENESIS_MERKLE_ROOT,
            timestamp: self.genesis.timestamp,
            bits: self.genesis.bits,
            nonce: self.genesis.nonce,
        }
    }

    pub fn genesis_hash(&self) -> [u8; 32] {
        self.genesis_header().get_hash()
    }

    /// Whether `algo` may mine the block following a parent at
    /// `prev_height` (`None` when the block is genesis).
    pub fn is_algo_active(&self, prev_height: Option<u32>, algo: Algo) -> bool {
        let height = prev_height.map_or(0, |h| h + 1);
        if height < self.multi_algo_diff_change_target {
            algo == Algo::Scrypt
        } else if height < self.odo_height {
            matches!(algo, Algo::Sha256d | Algo::Scrypt | Algo::Groestl | Algo::Skein | Algo::Qubit)
        } else {
            matches!(algo, Algo::Sha256d | Algo::Scrypt | Algo::Skein | Algo::Qubit | Algo::Odo)
        }
    }

    /// Algorithms active after `prev_height`, in slot order.
    pub fn active_algos(&self, prev_height: Option<u32>) -> Vec<Algo> {
        Algo::ALL.iter().copied().filter(|a| self.is_algo_active(prev_height, *a)).collect()
    }
}
