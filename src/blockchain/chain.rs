// dgb_node_rust/src/blockchain/chain.rs

use serde::Serialize;

use crate::blockchain::block_index::{BlockId, BlockTree};
use crate::error::ChainResult;

/// Hashes that describe a position in the chain to a peer: dense near the
/// tip, exponentially sparser towards genesis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockLocator {
    pub have: Vec<[u8; 32]>,
}

impl BlockLocator {
    pub fn len(&self) -> usize {
        self.have.len()
    }

    pub fn is_empty(&self) -> bool {
        self.have.is_empty()
    }
}

/// The currently selected best chain, indexed by height.
#[derive(Debug, Clone, Default)]
pub struct ActiveChain {
    chain: Vec<BlockId>,
}

impl ActiveChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `tip` the end of the chain, rewriting slots back to the fork
    /// point. `None` clears the chain.
    pub fn set_tip(&mut self, tree: &BlockTree, tip: Option<BlockId>) {
        let Some(tip) = tip else {
            self.chain.clear();
            return;
        };

        self.chain.resize(tree[tip].height as usize + 1, tip);
        let mut walk = Some(tip);
        while let Some(id) = walk {
            let slot = tree[id].height as usize;
            if self.chain[slot] == id && id != tip {
                break;
            }
            self.chain[slot] = id;
            walk = tree[id].parent;
        }
    }

    pub fn genesis(&self) -> Option<BlockId> {
        self.chain.first().copied()
    }

    pub fn tip(&self) -> Option<BlockId> {
        self.chain.last().copied()
    }

    /// Height of the tip, `None` for an empty chain.
    pub fn height(&self) -> Option<u32> {
        self.chain.len().checked_sub(1).map(|h| h as u32)
    }

    pub fn get(&self, height: u32) -> Option<BlockId> {
        self.chain.get(height as usize).copied()
    }

    pub fn contains(&self, tree: &BlockTree, id: BlockId) -> bool {
        self.get(tree[id].height) == Some(id)
    }

    /// Successor of `id` on this chain.
    pub fn next(&self, tree: &BlockTree, id: BlockId) -> Option<BlockId> {
        if self.contains(tree, id) {
            self.get(tree[id].height + 1)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// First block with `time_max >= min_time` and `height >= min_height`.
    pub fn find_earliest_at_least(&self, tree: &BlockTree, min_time: i64, min_height: u32) -> Option<BlockId> {
        let pos = self.chain.partition_point(|id| {
            let node = &tree[*id];
            node.block_time_max() < min_time || node.height < min_height
        });
        self.chain.get(pos).copied()
    }

    /// Last block shared by this chain and the ancestry of `id`.
    pub fn find_fork(&self, tree: &BlockTree, id: BlockId) -> ChainResult<Option<BlockId>> {
        let Some(height) = self.height() else {
            return Ok(None);
        };

        let mut walk = if tree[id].height > height { tree.ancestor(id, height)? } else { Some(id) };
        while let Some(current) = walk {
            if self.contains(tree, current) {
                break;
            }
            walk = tree[current].parent;
        }
        Ok(walk)
    }

    /// Locator starting at `from`, or at the tip when `from` is `None`.
    pub fn get_locator(&self, tree: &BlockTree, from: Option<BlockId>) -> ChainResult<BlockLocator> {
        let mut have = Vec::with_capacity(32);
        let mut step: u32 = 1;
        let mut walk = from.or_else(|| self.tip());

        while let Some(id) = walk {
            let node = &tree[id];
            have.push(node.hash);
            if node.height == 0 {
                break;
            }
            let height = node.height.saturating_sub(step);
            walk = if self.contains(tree, id) { self.get(height) } else { tree.ancestor(id, height)? };
            if have.len() > 10 {
                step = step.saturating_mul(2);
            }
        }
        Ok(BlockLocator { have })
    }
}
