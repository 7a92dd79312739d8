pub mod algo;
pub mod block_index;
pub mod chain;
pub mod chain_state;
pub mod header;
pub mod pow;

pub use block_index::{BlockId, BlockIndex, BlockTree};
pub use chain::{ActiveChain, BlockLocator};
pub use chain_state::ChainState;
