use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use dgb_node_rust::blockchain::chain_state::ChainState;
use dgb_node_rust::blockchain::pow::NoRetargetOracle;
use dgb_node_rust::error::ChainResult;
use dgb_node_rust::replay::{replay_headers, tip_summary_json};
use dgb_node_rust::settings::Settings;

fn run() -> ChainResult<()> {
    let settings = Settings::load()?;
    let params = settings.chain_params()?;
    log::info!("DigiByte header index starting on network '{}'", params.network_id_string);

    let chain_state = ChainState::new(params, Arc::new(NoRetargetOracle))?;

    if let Some(path) = settings.headers_file.as_deref() {
        log::info!("Replaying headers from {}", path);
        let reader = BufReader::new(File::open(path)?);
        replay_headers(&chain_state, reader)?;
    } else {
        log::info!("No headers file configured; reporting genesis only");
    }

    println!("{}", tip_summary_json(&chain_state)?);
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        log::error!("{}", e);
        if e.is_fatal() {
            log::error!("Block index is corrupted; refusing to continue");
        }
        std::process::exit(1);
    }
}
