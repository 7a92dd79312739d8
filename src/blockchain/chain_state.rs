// dgb_node_rust/src/blockchain/chain_state.rs

use num_bigint::BigUint;
use num_traits::Zero;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::blockchain::block_index::{BlockId, BlockIndex, BlockTree};
use crate::blockchain::chain::{ActiveChain, BlockLocator};
use crate::blockchain::header::{hash_to_hex, BlockHeaderData};
use crate::blockchain::pow::{self, DifficultyOracle};
use crate::chainparams::ChainParams;
use crate::error::{ChainError, ChainResult};

struct ChainInner {
    tree: BlockTree,
    active: ActiveChain,
}

impl ChainInner {
    fn tip(&self) -> ChainResult<BlockId> {
        active_tip(&self.active)
    }
}

/// Block index and active chain behind one lock. Writers link headers and
/// move the tip; readers answer ancestry and locator queries.
pub struct ChainState {
    inner: RwLock<ChainInner>,
    params: ChainParams,
    oracle: Arc<dyn DifficultyOracle>,
    pub genesis_hash: [u8; 32],
}

impl std::fmt::Debug for ChainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (blocks, height) = match self.inner.read() {
            Ok(inner) => (inner.tree.len(), inner.active.height()),
            Err(_) => (0, None),
        };
        f.debug_struct("ChainState")
            .field("network", &self.params.network_id_string)
            .field("block_count", &blocks)
            .field("tip_height", &height)
            .field("genesis_hash", &hash_to_hex(&self.genesis_hash))
            .field("oracle", &"Arc<dyn DifficultyOracle>")
            .finish()
    }
}

impl ChainState {
    /// Starts a chain holding only the network's genesis block.
    pub fn new(params: ChainParams, oracle: Arc<dyn DifficultyOracle>) -> ChainResult<Self> {
        let mut tree = BlockTree::new();
        let genesis_header = params.genesis_header();
        let mut genesis = tree.prepare(&genesis_header, None);
        genesis.chain_work = pow::block_proof(&tree, &genesis, &params, oracle.as_ref());
        let genesis_hash = genesis.hash;
        let genesis_id = tree.link(genesis)?;

        let mut active = ActiveChain::new();
        active.set_tip(&tree, Some(genesis_id));
        log::info!(
            "Initialized {} chain with genesis {}",
            params.network_id_string,
            hash_to_hex(&genesis_hash)
        );

        Ok(ChainState {
            inner: RwLock::new(ChainInner { tree, active }),
            params,
            oracle,
            genesis_hash,
        })
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    fn read(&self) -> ChainResult<RwLockReadGuard<'_, ChainInner>> {
        self.inner.read().map_err(|_| ChainError::LockPoisoned)
    }

    fn write(&self) -> ChainResult<RwLockWriteGuard<'_, ChainInner>> {
        self.inner.write().map_err(|_| ChainError::LockPoisoned)
    }

    /// Links `header` under its parent and moves the tip to it when it
    /// carries strictly more work. Known headers return their existing id.
    pub fn accept_header(&self, header: BlockHeaderData) -> ChainResult<BlockId> {
        let hash = header.get_hash();
        let mut guard = self.write()?;
        let ChainInner { tree, active } = &mut *guard;

        if let Some(existing) = tree.lookup(&hash) {
            return Ok(existing);
        }

        let parent = if header.has_parent() {
            match tree.lookup(&header.prev_block_hash) {
                Some(parent) => parent,
                None => {
                    log::warn!(
                        "Rejecting header {} with unknown parent {}",
                        hash_to_hex(&hash),
                        hash_to_hex(&header.prev_block_hash)
                    );
                    return Err(ChainError::UnknownParent {
                        hash: hash_to_hex(&hash),
                        parent: hash_to_hex(&header.prev_block_hash),
                    });
                }
            }
        } else {
            log::warn!("Rejecting parentless header {}", hash_to_hex(&hash));
            return Err(ChainError::UnexpectedGenesis(hash_to_hex(&hash)));
        };

        let mut index = tree.prepare(&header, Some(parent));
        let proof = pow::block_proof(tree, &index, &self.params, self.oracle.as_ref());
        if proof.is_zero() {
            log::warn!(
                "Rejecting header {} at height {}: bits 0x{:08x} yield no work",
                hash_to_hex(&hash),
                index.height,
                index.bits
            );
            return Err(ChainError::InvalidTarget { hash: hash_to_hex(&hash), height: index.height, bits: index.bits });
        }
        index.chain_work = &tree[parent].chain_work + proof;
        let id = tree.link(index)?;

        let tip = active_tip(active)?;
        if tree[id].chain_work > tree[tip].chain_work {
            active.set_tip(tree, Some(id));
            log::info!("New chain tip: height={}, hash={}", tree[id].height, hash_to_hex(&hash));
        }
        Ok(id)
    }

    /// Makes the known block `hash` the active tip, whatever its work.
    pub fn set_best_tip(&self, hash: &[u8; 32]) -> ChainResult<()> {
        let mut guard = self.write()?;
        let ChainInner { tree, active } = &mut *guard;
        let id = tree.lookup(hash).ok_or_else(|| ChainError::UnknownBlock(hash_to_hex(hash)))?;
        active.set_tip(tree, Some(id));
        log::info!("Chain tip set: height={}, hash={}", tree[id].height, hash_to_hex(hash));
        Ok(())
    }

    pub fn get_tip(&self) -> ChainResult<BlockIndex> {
        let inner = self.read()?;
        Ok(inner.tree[inner.tip()?].clone())
    }

    pub fn height(&self) -> ChainResult<u32> {
        let inner = self.read()?;
        Ok(inner.tree[inner.tip()?].height)
    }

    pub fn block_count(&self) -> ChainResult<usize> {
        Ok(self.read()?.tree.len())
    }

    pub fn get_block_index(&self, hash: &[u8; 32]) -> ChainResult<Option<BlockIndex>> {
        let inner = self.read()?;
        Ok(inner.tree.lookup(hash).map(|id| inner.tree[id].clone()))
    }

    /// Block at `height` on the active chain.
    pub fn get_active_at(&self, height: u32) -> ChainResult<Option<BlockIndex>> {
        let inner = self.read()?;
        Ok(inner.active.get(height).map(|id| inner.tree[id].clone()))
    }

    pub fn is_on_active_chain(&self, hash: &[u8; 32]) -> ChainResult<bool> {
        let inner = self.read()?;
        Ok(inner.tree.lookup(hash).is_some_and(|id| inner.active.contains(&inner.tree, id)))
    }

    pub fn get_block_locator(&self) -> ChainResult<BlockLocator> {
        let inner = self.read()?;
        inner.active.get_locator(&inner.tree, None)
    }

    /// Locator starting at a known block, which need not be on the active chain.
    pub fn get_block_locator_from(&self, hash: &[u8; 32]) -> ChainResult<Option<BlockLocator>> {
        let inner = self.read()?;
        match inner.tree.lookup(hash) {
            Some(id) => inner.active.get_locator(&inner.tree, Some(id)).map(Some),
            None => Ok(None),
        }
    }

    /// Hash of the last active-chain block in the ancestry of `hash`.
    pub fn find_fork(&self, hash: &[u8; 32]) -> ChainResult<Option<[u8; 32]>> {
        let inner = self.read()?;
        let Some(id) = inner.tree.lookup(hash) else {
            return Ok(None);
        };
        Ok(inner.active.find_fork(&inner.tree, id)?.map(|fork| inner.tree[fork].hash))
    }

    pub fn last_common_ancestor(&self, a: &[u8; 32], b: &[u8; 32]) -> ChainResult<Option<[u8; 32]>> {
        let inner = self.read()?;
        match (inner.tree.lookup(a), inner.tree.lookup(b)) {
            (Some(a), Some(b)) => Ok(Some(inner.tree[inner.tree.last_common_ancestor(a, b)?].hash)),
            _ => Ok(None),
        }
    }

    /// Ancestor of `hash` at `height`.
    pub fn get_ancestor(&self, hash: &[u8; 32], height: u32) -> ChainResult<Option<BlockIndex>> {
        let inner = self.read()?;
        let Some(id) = inner.tree.lookup(hash) else {
            return Ok(None);
        };
        Ok(inner.tree.ancestor(id, height)?.map(|a| inner.tree[a].clone()))
    }

    pub fn median_time_past(&self, hash: &[u8; 32]) -> ChainResult<Option<i64>> {
        let inner = self.read()?;
        Ok(inner.tree.lookup(hash).map(|id| inner.tree.median_time_past(id)))
    }

    pub fn find_earliest_at_least(&self, min_time: i64, min_height: u32) -> ChainResult<Option<BlockIndex>> {
        let inner = self.read()?;
        Ok(inner
            .active
            .find_earliest_at_least(&inner.tree, min_time, min_height)
            .map(|id| inner.tree[id].clone()))
    }

    /// Seconds of mining at the tip's rate separating the work of `to`
    /// and `from`. `None` if either block is unknown.
    pub fn equivalent_time(&self, to: &[u8; 32], from: &[u8; 32]) -> ChainResult<Option<i64>> {
        let inner = self.read()?;
        let (Some(to), Some(from)) = (inner.tree.lookup(to), inner.tree.lookup(from)) else {
            return Ok(None);
        };
        let tip = inner.tip()?;
        pow::equivalent_time(&inner.tree, to, from, tip, &self.params, self.oracle.as_ref()).map(Some)
    }

    /// Work the block `hash` adds on behalf of every active algorithm.
    pub fn block_proof(&self, hash: &[u8; 32]) -> ChainResult<Option<BigUint>> {
        let inner = self.read()?;
        Ok(inner
            .tree
            .lookup(hash)
            .map(|id| pow::block_proof(&inner.tree, &inner.tree[id], &self.params, self.oracle.as_ref())))
    }
}

fn active_tip(active: &ActiveChain) -> ChainResult<BlockId> {
    active
        .tip()
        .ok_or_else(|| ChainError::IndexCorruption("active chain is empty".to_string()))
}
