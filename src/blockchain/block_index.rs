// dgb_node_rust/src/blockchain/block_index.rs

use num_bigint::BigUint;
use serde::Serialize;
use std::collections::HashMap;
use std::ops::Index;

use crate::blockchain::algo::{Algo, NUM_ALGOS_IMPL};
use crate::blockchain::header::{hash_to_hex, BlockHeaderData};
use crate::chainparams::ChainParams;
use crate::error::{ChainError, ChainResult};

const MEDIAN_TIME_SPAN: usize = 11;

/// Handle to a node owned by a [`BlockTree`]. Only meaningful for the tree
/// that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BlockId(u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// In-memory metadata for one block header.
#[derive(Debug, Clone)]
pub struct BlockIndex {
    pub hash: [u8; 32],
    pub prev_hash: Option<[u8; 32]>,
    pub height: u32,
    pub parent: Option<BlockId>,
    /// Ancestor at `get_skip_height(height)`, set once when linked.
    pub skip: Option<BlockId>,
    /// Total work of the chain up to and including this block.
    pub chain_work: BigUint,

    pub version: i32,
    pub merkle_root: [u8; 32],
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,

    /// Highest `time` on this block's ancestry, itself included.
    pub time_max: u32,
    /// Arrival order; earlier wins a chain-work tie.
    pub sequence_id: u64,
    /// Only the slot of this block's own header algorithm is ever filled,
    /// and it points back at this block. Parent slots are not inherited.
    pub last_algo_blocks: [Option<BlockId>; NUM_ALGOS_IMPL],
}

impl BlockIndex {
    pub fn new(header: &BlockHeaderData) -> Self {
        BlockIndex {
            hash: header.get_hash(),
            prev_hash: if header.has_parent() { Some(header.prev_block_hash) } else { None },
            height: 0,
            parent: None,
            skip: None,
            chain_work: BigUint::default(),
            version: header.version,
            merkle_root: header.merkle_root,
            time: header.timestamp,
            bits: header.bits,
            nonce: header.nonce,
            time_max: header.timestamp,
            sequence_id: 0,
            last_algo_blocks: [None; NUM_ALGOS_IMPL],
        }
    }

    pub fn header(&self) -> BlockHeaderData {
        BlockHeaderData {
            version: self.version,
            prev_block_hash: self.prev_hash.unwrap_or([0u8; 32]),
            merkle_root: self.merkle_root,
            timestamp: self.time,
            bits: self.bits,
            nonce: self.nonce,
        }
    }

    pub fn block_time(&self) -> i64 {
        self.time as i64
    }

    pub fn block_time_max(&self) -> i64 {
        self.time_max as i64
    }

    pub fn is_genesis(&self) -> bool {
        self.parent.is_none() && self.height == 0
    }

    /// Algorithm from the header version bits alone.
    pub fn header_algo(&self) -> Option<Algo> {
        Algo::from_version(self.version)
    }

    /// Algorithm this block was mined with. Early mainnet blocks are
    /// scrypt regardless of their version bits.
    pub fn algo(&self, params: &ChainParams) -> Option<Algo> {
        let algo = self.resolve_algo(params);
        if algo.is_none() {
            log::warn!(
                "Block at height={} has unrecognized version=0x{:08x}",
                self.height,
                self.version
            );
        }
        algo
    }

    fn resolve_algo(&self, params: &ChainParams) -> Option<Algo> {
        if params.is_mainnet() && self.height < params.scrypt_override_height {
            return Some(Algo::Scrypt);
        }
        self.header_algo()
    }

    pub fn last_block_of(&self, algo: Algo) -> Option<BlockId> {
        self.last_algo_blocks[algo.slot()]
    }
}

/// Turns the lowest set bit of `n` into zero.
fn invert_lowest_one(n: u32) -> u32 {
    n & n.wrapping_sub(1)
}

/// Height the skip pointer of a block at `height` targets.
pub fn get_skip_height(height: u32) -> u32 {
    if height < 2 {
        return 0;
    }
    if height & 1 == 1 {
        invert_lowest_one(invert_lowest_one(height - 1)) + 1
    } else {
        invert_lowest_one(height)
    }
}

/// Registry owning every known block index, keyed by hash. Nodes are
/// never removed; links between them are `BlockId` handles.
#[derive(Debug, Default)]
pub struct BlockTree {
    nodes: Vec<BlockIndex>,
    by_hash: HashMap<[u8; 32], BlockId>,
    next_sequence: u64,
}

impl Index<BlockId> for BlockTree {
    type Output = BlockIndex;

    fn index(&self, id: BlockId) -> &BlockIndex {
        &self.nodes[id.index()]
    }
}

impl BlockTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: BlockId) -> Option<&BlockIndex> {
        self.nodes.get(id.index())
    }

    pub fn lookup(&self, hash: &[u8; 32]) -> Option<BlockId> {
        self.by_hash.get(hash).copied()
    }

    /// Builds an unlinked index for `header` on top of `parent`. Work is
    /// left at zero; the caller fills `chain_work` before [`BlockTree::link`].
    pub fn prepare(&self, header: &BlockHeaderData, parent: Option<BlockId>) -> BlockIndex {
        let mut index = BlockIndex::new(header);
        if let Some(parent_id) = parent {
            let prev = &self[parent_id];
            index.parent = Some(parent_id);
            index.height = prev.height + 1;
            index.time_max = prev.time_max.max(index.time);
        }
        index
    }

    /// Registers a prepared index: records its own algorithm slot, wires
    /// the skip pointer and makes it reachable by hash.
    pub fn link(&mut self, mut index: BlockIndex) -> ChainResult<BlockId> {
        if let Some(existing) = self.lookup(&index.hash) {
            return Ok(existing);
        }

        match index.parent {
            Some(parent_id) => {
                let prev = self.get(parent_id).ok_or_else(|| {
                    ChainError::IndexCorruption(format!("parent handle {:?} is not in the index", parent_id))
                })?;
                if index.prev_hash != Some(prev.hash) || index.height != prev.height + 1 {
                    return Err(ChainError::IndexCorruption(format!(
                        "block {} at height {} linked to {} at height {}",
                        hash_to_hex(&index.hash),
                        index.height,
                        hash_to_hex(&prev.hash),
                        prev.height
                    )));
                }
            }
            None => {
                if index.height != 0 {
                    return Err(ChainError::IndexCorruption(format!(
                        "parentless block {} at height {}",
                        hash_to_hex(&index.hash),
                        index.height
                    )));
                }
            }
        }

        let id = BlockId(self.nodes.len() as u32);

        index.last_algo_blocks = [None; NUM_ALGOS_IMPL];
        match index.header_algo() {
            Some(algo) => index.last_algo_blocks[algo.slot()] = Some(id),
            None => log::warn!(
                "Block {} has unknown algorithm in version=0x{:08x}",
                hash_to_hex(&index.hash),
                index.version
            ),
        }

        index.skip = self.build_skip(&index)?;
        index.sequence_id = self.next_sequence;
        self.next_sequence += 1;

        log::debug!("Linked block index: height={}, hash={}", index.height, hash_to_hex(&index.hash));
        self.by_hash.insert(index.hash, id);
        self.nodes.push(index);
        Ok(id)
    }

    fn build_skip(&self, index: &BlockIndex) -> ChainResult<Option<BlockId>> {
        match index.parent {
            Some(parent_id) => self.ancestor(parent_id, get_skip_height(index.height)),
            None => Ok(None),
        }
    }

    /// Ancestor of `id` at `height`, in O(log(distance)) hops. `None` when
    /// `height` is above the block.
    pub fn ancestor(&self, id: BlockId, height: u32) -> ChainResult<Option<BlockId>> {
        if height > self[id].height {
            return Ok(None);
        }

        let mut walk = id;
        let mut height_walk = self[id].height;
        while height_walk > height {
            let node = &self[walk];
            let height_skip = get_skip_height(height_walk);
            let height_skip_prev = get_skip_height(height_walk - 1) as i64;
            let target = height as i64;
            let skip_h = height_skip as i64;

            // Only follow skip if parent's skip isn't better than skip's parent.
            let take_skip = node.skip.is_some()
                && (skip_h == target
                    || (skip_h > target && !(height_skip_prev < skip_h - 2 && height_skip_prev >= target)));

            match (take_skip, node.skip, node.parent) {
                (true, Some(skip), _) => {
                    walk = skip;
                    height_walk = height_skip;
                }
                (_, _, Some(parent)) => {
                    walk = parent;
                    height_walk -= 1;
                }
                _ => {
                    log::error!(
                        "Missing parent link at height {} while seeking height {}",
                        height_walk,
                        height
                    );
                    return Err(ChainError::IndexCorruption(format!(
                        "block {} at height {} has no parent",
                        hash_to_hex(&node.hash),
                        height_walk
                    )));
                }
            }
        }
        Ok(Some(walk))
    }

    /// Deepest block shared by the ancestries of `a` and `b`.
    pub fn last_common_ancestor(&self, a: BlockId, b: BlockId) -> ChainResult<BlockId> {
        let (height_a, height_b) = (self[a].height, self[b].height);
        let mut pa = Some(a);
        let mut pb = Some(b);
        if height_a > height_b {
            pa = self.ancestor(a, height_b)?;
        } else if height_b > height_a {
            pb = self.ancestor(b, height_a)?;
        }

        while let (Some(x), Some(y)) = (pa, pb) {
            if x == y {
                return Ok(x);
            }
            pa = self[x].parent;
            pb = self[y].parent;
        }

        log::error!("Blocks {:?} and {:?} share no common ancestor", a, b);
        Err(ChainError::IndexCorruption(format!(
            "{} and {} do not converge",
            hash_to_hex(&self[a].hash),
            hash_to_hex(&self[b].hash)
        )))
    }

    /// Walks `id` and its parents back to genesis.
    pub fn ancestors(&self, id: BlockId) -> Ancestors<'_> {
        Ancestors { tree: self, next: Some(id) }
    }

    /// Median timestamp of the block and up to ten of its predecessors.
    pub fn median_time_past(&self, id: BlockId) -> i64 {
        let mut times: Vec<i64> = self
            .ancestors(id)
            .take(MEDIAN_TIME_SPAN)
            .map(|a| self[a].block_time())
            .collect();
        times.sort_unstable();
        times[times.len() / 2]
    }

    /// Most recent block at or below `id` mined with `algo`.
    pub fn last_block_for_algo(&self, id: BlockId, algo: Algo, params: &ChainParams) -> Option<BlockId> {
        self.ancestors(id).find(|a| self[*a].resolve_algo(params) == Some(algo))
    }
}

pub struct Ancestors<'a> {
    tree: &'a BlockTree,
    next: Option<BlockId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = BlockId;

    fn next(&mut self) -> Option<BlockId> {
        let current = self.next?;
        self.next = self.tree[current].parent;
        Some(current)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::blockchain::algo::BLOCK_VERSION_SHA256D;
    use crate::chainparams::{MAINNET_PARAMS, REGTEST_PARAMS};
    use rand::Rng;

    pub(crate) fn child_header(tree: &BlockTree, parent: Option<BlockId>, version: i32, nonce: u32) -> BlockHeaderData {
        let (prev_block_hash, timestamp) = match parent {
            Some(p) => (tree[p].hash, tree[p].time + 15),
            None => ([0u8; 32], 1_500_000_000),
        };
        BlockHeaderData {
            version,
            prev_block_hash,
            merkle_root: [0u8; 32],
            timestamp,
            bits: 0x207fffff,
            nonce,
        }
    }

    pub(crate) fn push(tree: &mut BlockTree, parent: Option<BlockId>, nonce: u32) -> BlockId {
        let header = child_header(tree, parent, 2, nonce);
        let index = tree.prepare(&header, parent);
        tree.link(index).unwrap()
    }

    /// Straight chain of `len` blocks; returns ids indexed by height.
    pub(crate) fn build_chain(tree: &mut BlockTree, len: usize) -> Vec<BlockId> {
        let mut ids = Vec::with_capacity(len);
        let mut parent = None;
        for i in 0..len {
            let id = push(tree, parent, i as u32);
            ids.push(id);
            parent = Some(id);
        }
        ids
    }

    /// Straight chain whose block times are exactly `times`.
    pub(crate) fn build_timed_chain(tree: &mut BlockTree, times: &[u32]) -> Vec<BlockId> {
        let mut ids: Vec<BlockId> = Vec::with_capacity(times.len());
        for (i, time) in times.iter().enumerate() {
            let parent = ids.last().copied();
            let mut header = child_header(tree, parent, 2, i as u32);
            header.timestamp = *time;
            ids.push(tree.link(tree.prepare(&header, parent)).unwrap());
        }
        ids
    }

    pub(crate) fn set_chain_work(tree: &mut BlockTree, id: BlockId, work: BigUint) {
        tree.nodes[id.index()].chain_work = work;
    }

    fn brute_force_ancestor(tree: &BlockTree, id: BlockId, height: u32) -> BlockId {
        let mut walk = id;
        while tree[walk].height > height {
            walk = tree[walk].parent.unwrap();
        }
        walk
    }

    #[test]
    fn test_skip_height_bounds() {
        assert_eq!(get_skip_height(0), 0);
        assert_eq!(get_skip_height(1), 0);
        for h in 2..100_000u32 {
            assert!(get_skip_height(h) < h, "skip height of {} not below it", h);
        }
    }

    #[test]
    fn test_skip_height_values() {
        assert_eq!(get_skip_height(2), 0);
        assert_eq!(get_skip_height(3), 1);
        assert_eq!(get_skip_height(4), 0);
        assert_eq!(get_skip_height(6), 4);
        assert_eq!(get_skip_height(7), 1);
        assert_eq!(get_skip_height(12), 8);
        assert_eq!(get_skip_height(13), 1);
        assert_eq!(get_skip_height(101), 65);
        assert_eq!(get_skip_height(1001), 961);
    }

    #[test]
    fn test_skip_pointers_point_at_skip_height() {
        let mut tree = BlockTree::new();
        let ids = build_chain(&mut tree, 3000);
        assert!(tree[ids[0]].skip.is_none());
        for id in &ids[1..] {
            let node = &tree[*id];
            let skip = node.skip.unwrap();
            assert_eq!(tree[skip].height, get_skip_height(node.height));
            assert!(tree[skip].height < node.height);
            assert_eq!(skip, ids[tree[skip].height as usize]);
        }
    }

    #[test]
    fn test_ancestor_of_own_height_is_self() {
        let mut tree = BlockTree::new();
        let ids = build_chain(&mut tree, 200);
        for (h, id) in ids.iter().enumerate() {
            assert_eq!(tree.ancestor(*id, h as u32).unwrap(), Some(*id));
        }
        assert_eq!(tree.ancestor(ids[10], 11).unwrap(), None);
    }

    #[test]
    fn test_ancestor_matches_brute_force_on_random_tree() {
        let mut rng = rand::thread_rng();
        let mut tree = BlockTree::new();
        let genesis = push(&mut tree, None, 0);
        let mut all = vec![genesis];
        for i in 1..10_000u32 {
            // Mostly extend recent blocks so the tree grows tall with forks.
            let lo = all.len().saturating_sub(50);
            let parent = all[rng.gen_range(lo..all.len())];
            all.push(push(&mut tree, Some(parent), i));
        }

        for _ in 0..2_000 {
            let id = all[rng.gen_range(0..all.len())];
            let height = rng.gen_range(0..=tree[id].height);
            assert_eq!(tree.ancestor(id, height).unwrap(), Some(brute_force_ancestor(&tree, id, height)));
        }
    }

    #[test]
    fn test_last_common_ancestor_of_three_branches() {
        let mut tree = BlockTree::new();
        let trunk = build_chain(&mut tree, 6);
        let fork_point = trunk[5];

        let mut tips = Vec::new();
        for branch in 0..3u32 {
            let mut parent = fork_point;
            for h in 6..=10u32 {
                parent = push(&mut tree, Some(parent), 1_000 * (branch + 1) + h);
            }
            assert_eq!(tree[parent].height, 10);
            tips.push(parent);
        }

        assert_eq!(tree.last_common_ancestor(tips[0], tips[1]).unwrap(), fork_point);
        assert_eq!(tree.last_common_ancestor(tips[1], tips[2]).unwrap(), fork_point);
        assert_eq!(tree.last_common_ancestor(tips[2], tips[0]).unwrap(), fork_point);
        assert_eq!(tree.last_common_ancestor(tips[0], trunk[3]).unwrap(), trunk[3]);
    }

    #[test]
    fn test_last_common_ancestor_fails_across_disjoint_roots() {
        let mut tree = BlockTree::new();
        let a = build_chain(&mut tree, 4);
        let other_root = push(&mut tree, None, 99_999);
        let b = push(&mut tree, Some(other_root), 100_000);

        let err = tree.last_common_ancestor(a[3], b).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_only_own_algo_slot_is_recorded() {
        let mut tree = BlockTree::new();
        let genesis = push(&mut tree, None, 0);
        let header = child_header(&tree, Some(genesis), 0x2000_0000 | BLOCK_VERSION_SHA256D, 1);
        let child = tree.link(tree.prepare(&header, Some(genesis))).unwrap();

        let node = &tree[child];
        assert_eq!(node.last_block_of(Algo::Sha256d), Some(child));
        // The parent's scrypt slot is not inherited.
        assert_eq!(tree[genesis].last_block_of(Algo::Scrypt), Some(genesis));
        assert_eq!(node.last_block_of(Algo::Scrypt), None);
        assert_eq!(node.last_algo_blocks.iter().filter(|s| s.is_some()).count(), 1);
    }

    #[test]
    fn test_unknown_algo_leaves_slots_empty() {
        let mut tree = BlockTree::new();
        let genesis = push(&mut tree, None, 0);
        let header = child_header(&tree, Some(genesis), 10 << 8, 1);
        let child = tree.link(tree.prepare(&header, Some(genesis))).unwrap();

        assert!(tree[child].last_algo_blocks.iter().all(|s| s.is_none()));
        assert_eq!(tree[child].algo(&REGTEST_PARAMS), None);
    }

    #[test]
    fn test_mainnet_scrypt_override_boundary() {
        let header = BlockHeaderData {
            version: 0x2000_0000 | BLOCK_VERSION_SHA256D,
            prev_block_hash: [1u8; 32],
            merkle_root: [0u8; 32],
            timestamp: 0,
            bits: 0x1e0ffff0,
            nonce: 0,
        };
        let mut index = BlockIndex::new(&header);

        index.height = 144_999;
        assert_eq!(index.algo(&MAINNET_PARAMS), Some(Algo::Scrypt));
        index.height = 145_000;
        assert_eq!(index.algo(&MAINNET_PARAMS), Some(Algo::Sha256d));

        // Override is mainnet only.
        index.height = 10;
        assert_eq!(index.algo(&REGTEST_PARAMS), Some(Algo::Sha256d));
    }

    #[test]
    fn test_link_rejects_wrong_height() {
        let mut tree = BlockTree::new();
        let genesis = push(&mut tree, None, 0);
        let header = child_header(&tree, Some(genesis), 2, 1);
        let mut index = tree.prepare(&header, Some(genesis));
        index.height = 5;
        assert!(matches!(tree.link(index), Err(ChainError::IndexCorruption(_))));
    }

    #[test]
    fn test_link_is_idempotent_per_hash() {
        let mut tree = BlockTree::new();
        let genesis = push(&mut tree, None, 0);
        let header = child_header(&tree, Some(genesis), 2, 1);
        let first = tree.link(tree.prepare(&header, Some(genesis))).unwrap();
        let second = tree.link(tree.prepare(&header, Some(genesis))).unwrap();
        assert_eq!(first, second);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_time_max_and_median_time_past() {
        let mut tree = BlockTree::new();
        let ids = build_chain(&mut tree, 20);
        // Timestamps step by 15 seconds from the genesis time.
        let tip = ids[19];
        assert_eq!(tree[tip].time_max, tree[tip].time);
        assert_eq!(tree.median_time_past(tip), tree[ids[14]].block_time());
        assert_eq!(tree.median_time_past(ids[0]), tree[ids[0]].block_time());
    }

    #[test]
    fn test_time_max_carries_over_backward_timestamps() {
        let mut tree = BlockTree::new();
        let ids = build_timed_chain(&mut tree, &[100, 200, 150, 160, 300]);
        let time_max: Vec<u32> = ids.iter().map(|id| tree[*id].time_max).collect();
        assert_eq!(time_max, vec![100, 200, 200, 200, 300]);
        assert_eq!(tree[ids[2]].time, 150);
        assert_eq!(tree.median_time_past(ids[4]), 160);
    }

    #[test]
    fn test_last_block_for_algo_walks_parents() {
        let mut tree = BlockTree::new();
        let genesis = push(&mut tree, None, 0);
        let sha = tree
            .link(tree.prepare(&child_header(&tree, Some(genesis), BLOCK_VERSION_SHA256D, 1), Some(genesis)))
            .unwrap();
        let scrypt = push(&mut tree, Some(sha), 2);

        assert_eq!(tree.last_block_for_algo(scrypt, Algo::Sha256d, &REGTEST_PARAMS), Some(sha));
        assert_eq!(tree.last_block_for_algo(scrypt, Algo::Scrypt, &REGTEST_PARAMS), Some(scrypt));
        assert_eq!(tree.last_block_for_algo(scrypt, Algo::Odo, &REGTEST_PARAMS), None);
    }
}
