pub mod blockchain;
pub mod chainparams;
pub mod error;
pub mod replay;
pub mod settings;
