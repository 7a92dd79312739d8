// dgb_node_rust/src/blockchain/pow.rs

// Work per block is computed under two regimes. Legacy: `2^256 / (target + 1)`
// of the block's own target, scaled by a fixed per-algorithm weight once
// multi-algo mining is active. Blended: the geometric mean of the next
// required targets of every active algorithm, inverted to work and shifted
// left by 7. Per-block arithmetic wraps at 256 bits; chain work does not.

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};

use crate::blockchain::algo::{Algo, NUM_ALGOS};
use crate::blockchain::block_index::{BlockId, BlockIndex, BlockTree};
use crate::blockchain::header::{hash_to_hex, BlockHeaderData};
use crate::chainparams::ChainParams;
use crate::error::{ChainError, ChainResult};

/// Left shift applied to blended work so it lines up with legacy work.
pub const BLENDED_WORK_SHIFT: usize = 7;

/// External per-algorithm difficulty retargeting.
pub trait DifficultyOracle: Send + Sync {
    /// Compact target the block after `prev` must meet when mined with
    /// `algo`.
    fn next_work_required(
        &self,
        tree: &BlockTree,
        prev: Option<BlockId>,
        header: &BlockHeaderData,
        params: &ChainParams,
        algo: Algo,
    ) -> u32;
}

/// Keeps each algorithm at the target of its last block, or at the pow
/// limit before an algorithm has mined anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetargetOracle;

impl DifficultyOracle for NoRetargetOracle {
    fn next_work_required(
        &self,
        tree: &BlockTree,
        prev: Option<BlockId>,
        _header: &BlockHeaderData,
        params: &ChainParams,
        algo: Algo,
    ) -> u32 {
        prev.and_then(|p| tree.last_block_for_algo(p, algo, params))
            .map_or(params.pow_limit_bits, |last| tree[last].bits)
    }
}

/// Decoded compact target with the flags `SetCompact` reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactTarget {
    pub target: BigUint,
    pub negative: bool,
    pub overflow: bool,
}

pub fn decode_compact(bits: u32) -> CompactTarget {
    let size = bits >> 24;
    let mut word = bits & 0x007f_ffff;
    let target = if size <= 3 {
        word >>= 8 * (3 - size);
        BigUint::from(word)
    } else {
        BigUint::from(word) << (8 * (size - 3)) as usize
    };
    let negative = word != 0 && (bits & 0x0080_0000) != 0;
    let overflow = word != 0 && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));
    CompactTarget { target, negative, overflow }
}

/// Target for `bits`, or `None` when it is negative, overflowing or zero.
pub fn target_from_compact(bits: u32) -> Option<BigUint> {
    let decoded = decode_compact(bits);
    if decoded.negative || decoded.overflow || decoded.target.is_zero() {
        None
    } else {
        Some(decoded.target)
    }
}

fn u256_max() -> BigUint {
    (BigUint::one() << 256usize) - BigUint::one()
}

fn truncate_256(value: BigUint) -> BigUint {
    value & u256_max()
}

/// `2^256 / (target + 1)` without leaving 256 bits: `(~t / (t + 1)) + 1`.
fn work_from_target(target: &BigUint) -> BigUint {
    let complement = u256_max() - truncate_256(target.clone());
    complement / (target + BigUint::one()) + BigUint::one()
}

/// Work of the block's own compact target. Zero marks an invalid target.
pub fn block_proof_base(bits: u32) -> BigUint {
    match target_from_compact(bits) {
        Some(target) => work_from_target(&target),
        None => BigUint::zero(),
    }
}

/// Fixed relative-hashrate weights of the legacy regime.
pub fn algo_work_factor(height: u32, algo: Option<Algo>, params: &ChainParams) -> u32 {
    if height < params.multi_algo_diff_change_target {
        return 1;
    }
    match algo {
        Some(Algo::Sha256d) => 1,
        Some(Algo::Scrypt) => 1024 * 4,
        Some(Algo::Groestl) => 64 * 8,
        Some(Algo::Skein) => 4 * 6,
        Some(Algo::Qubit) => 128 * 8,
        _ => 1,
    }
}

fn legacy_proof(index: &BlockIndex, params: &ChainParams) -> BigUint {
    let base = block_proof_base(index.bits);
    let factor = algo_work_factor(index.height, index.header_algo(), params);
    truncate_256(base * factor)
}

fn prev_height(tree: &BlockTree, index: &BlockIndex) -> Option<u32> {
    index.parent.map(|p| tree[p].height)
}

/// Work contributed by `index`. `index` may be prepared but not yet linked.
///
/// The blended regime takes the exact floor fifth root of each target.
/// Nodes that use an approximate root can land one unit away on some
/// targets, which changes the resulting work and so chain selection.
pub fn block_proof(
    tree: &BlockTree,
    index: &BlockIndex,
    params: &ChainParams,
    oracle: &dyn DifficultyOracle,
) -> BigUint {
    if index.height < params.work_computation_change_target {
        return legacy_proof(index, params);
    }

    let header = index.header();
    let prev = prev_height(tree, index);
    let mut avg_target = BigUint::one();
    for algo in Algo::ALL {
        if !params.is_algo_active(prev, algo) {
            continue;
        }
        let bits = oracle.next_work_required(tree, index.parent, &header, params, algo);
        let target = match target_from_compact(bits) {
            Some(t) => t,
            None => return BigUint::zero(),
        };
        // Roots first so every intermediate product stays within 256 bits.
        avg_target = truncate_256(avg_target * target.nth_root(NUM_ALGOS));
    }
    truncate_256(work_from_target(&avg_target) << BLENDED_WORK_SHIFT)
}

/// Work contributed by `index` on behalf of a single algorithm.
pub fn block_proof_for_algo(
    tree: &BlockTree,
    index: &BlockIndex,
    algo: Algo,
    params: &ChainParams,
    oracle: &dyn DifficultyOracle,
) -> BigUint {
    if index.height < params.work_computation_change_target {
        return legacy_proof(index, params);
    }
    if !params.is_algo_active(prev_height(tree, index), algo) {
        return BigUint::zero();
    }
    let bits = oracle.next_work_required(tree, index.parent, &index.header(), params, algo);
    match target_from_compact(bits) {
        Some(target) => work_from_target(&target),
        None => BigUint::zero(),
    }
}

/// Seconds the tip's work rate would need to cover the chain-work gap
/// between `to` and `from`. Positive when `to` has more work.
pub fn equivalent_time(
    tree: &BlockTree,
    to: BlockId,
    from: BlockId,
    tip: BlockId,
    params: &ChainParams,
    oracle: &dyn DifficultyOracle,
) -> ChainResult<i64> {
    let (to_work, from_work) = (&tree[to].chain_work, &tree[from].chain_work);
    let (delta, sign) = if to_work > from_work {
        (to_work - from_work, 1i64)
    } else {
        (from_work - to_work, -1i64)
    };

    let tip_index = &tree[tip];
    let tip_proof = block_proof(tree, tip_index, params, oracle);
    if tip_proof.is_zero() {
        return Err(ChainError::InvalidTarget {
            hash: hash_to_hex(&tip_index.hash),
            height: tip_index.height,
            bits: tip_index.bits,
        });
    }

    let spacing = BigUint::from(params.pow_target_spacing.max(0) as u64);
    let r = delta * spacing / tip_proof;
    if r.bits() > 63 {
        return Ok(sign * i64::MAX);
    }
    Ok(sign * r.to_i64().unwrap_or(i64::MAX))
}
