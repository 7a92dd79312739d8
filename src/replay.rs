// dgb_node_rust/src/replay.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::BufRead;

use crate::blockchain::chain_state::ChainState;
use crate::blockchain::header::{hash_to_hex, BlockHeaderData};
use crate::error::ChainResult;

/// Outcome of feeding a header dump through [`ChainState::accept_header`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub accepted: usize,
    pub rejected: usize,
}

/// Snapshot of the active tip, printed by the binary.
#[derive(Debug, Clone, Serialize)]
pub struct TipSummary {
    pub network: String,
    pub height: u32,
    pub hash: String,
    pub chain_work: String,
    pub tip_time: Option<DateTime<Utc>>,
    pub median_time_past: Option<DateTime<Utc>>,
    pub block_count: usize,
    pub locator: Vec<String>,
}

/// Accepts one hex header per line. Blank lines and `#` comments are
/// skipped; rejected headers are logged and counted, and only fatal
/// errors abort the replay.
pub fn replay_headers<R: BufRead>(state: &ChainState, reader: R) -> ChainResult<ReplayReport> {
    let mut report = ReplayReport::default();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let result = BlockHeaderData::from_hex(line).and_then(|header| state.accept_header(header));
        match result {
            Ok(_) => report.accepted += 1,
            Err(e) if e.is_fatal() => {
                log::error!("Header replay stopped at line {}: {}", line_no + 1, e);
                return Err(e);
            }
            Err(e) => {
                log::warn!("Skipping header on line {}: {}", line_no + 1, e);
                report.rejected += 1;
            }
        }
    }
    log::info!("Replayed headers: accepted={}, rejected={}", report.accepted, report.rejected);
    Ok(report)
}

pub fn tip_summary(state: &ChainState) -> ChainResult<TipSummary> {
    let tip = state.get_tip()?;
    let locator = state.get_block_locator()?;
    let mtp = state.median_time_past(&tip.hash)?;
    Ok(TipSummary {
        network: state.params().network_id_string.to_string(),
        height: tip.height,
        hash: hash_to_hex(&tip.hash),
        chain_work: format!("{:x}", tip.chain_work),
        tip_time: DateTime::from_timestamp(tip.block_time(), 0),
        median_time_past: mtp.and_then(|t| DateTime::from_timestamp(t, 0)),
        block_count: state.block_count()?,
        locator: locator.have.iter().map(hash_to_hex).collect(),
    })
}

/// Pretty-printed JSON of [`tip_summary`].
pub fn tip_summary_json(state: &ChainState) -> ChainResult<String> {
    Ok(serde_json::to_string_pretty(&tip_summary(state)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::pow::NoRetargetOracle;
    use crate::chainparams::REGTEST_PARAMS;
    use crate::error::ChainError;
    use std::io::Cursor;
    use std::sync::Arc;

    fn dump(state: &ChainState, len: u32) -> String {
        let mut prev = state.get_tip().unwrap();
        let mut lines = vec!["# regtest headers".to_string(), String::new()];
        for nonce in 0..len {
            let header = BlockHeaderData {
                version: 0x2000_0000,
                prev_block_hash: prev.hash,
                merkle_root: [0u8; 32],
                timestamp: prev.time + 15,
                bits: REGTEST_PARAMS.pow_limit_bits,
                nonce,
            };
            lines.push(header.to_hex());
            // Build the next header on top of this one without accepting it yet.
            let mut next = prev.clone();
            next.hash = header.get_hash();
            next.time = header.timestamp;
            prev = next;
        }
        lines.join("\n")
    }

    #[test]
    fn test_replay_counts_and_summary() {
        let state = ChainState::new(REGTEST_PARAMS, Arc::new(NoRetargetOracle)).unwrap();
        let mut text = dump(&state, 12);
        text.push_str("\nnot-hex\n");
        text.push_str(&"00".repeat(80));

        let report = replay_headers(&state, Cursor::new(text)).unwrap();
        assert_eq!(report, ReplayReport { accepted: 12, rejected: 2 });

        let summary = tip_summary(&state).unwrap();
        assert_eq!(summary.height, 12);
        assert_eq!(summary.block_count, 13);
        assert_eq!(summary.chain_work, "1a");
        assert_eq!(summary.locator.last(), Some(&hash_to_hex(&state.genesis_hash)));
        assert!(summary.tip_time.is_some());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["network"], "regtest");
    }

    #[test]
    fn test_tip_summary_json_round_trips_through_serde() {
        let state = ChainState::new(REGTEST_PARAMS, Arc::new(NoRetargetOracle)).unwrap();
        let text = tip_summary_json(&state).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["height"], 0);
        assert_eq!(json["hash"], hash_to_hex(&state.genesis_hash));
        assert_eq!(json["chain_work"], "2");
    }

    #[test]
    fn test_json_errors_convert_and_are_not_fatal() {
        let err: ChainError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, ChainError::Json(_)));
        assert!(!err.is_fatal());
    }
}
