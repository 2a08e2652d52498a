use crate::{constants::NONCE_BATCH, pow::meets_difficulty, Block, Hash};
use rayon::prelude::*;
use std::time::Instant;
use tracing::info;

/// Mines a block by searching nonces in parallel until its hash has at least
/// `block.difficulty()` leading zero hex digits.
///
/// The lowest qualifying nonce wins, so the result is the same as
/// `pow::mine_sequential`.
pub fn mine_parallel(block: &Block) -> (u64, Hash) {
    let started = Instant::now();
    let difficulty = block.difficulty();

    let nonce =
        lowest_matching_nonce(|nonce| meets_difficulty(&block.hash_with_nonce(nonce), difficulty));
    let hash = block.hash_with_nonce(nonce);

    info!(
        "Mined block {} in parallel with nonce {} in {:?} (hash {})",
        block.index(),
        nonce,
        started.elapsed(),
        hex::encode(hash)
    );
    (nonce, hash)
}

/// Scans the nonce space in consecutive batches of `NONCE_BATCH`. Each batch is
/// split across the rayon pool; the first batch with a match returns its lowest match.
pub(crate) fn lowest_matching_nonce<F>(matches: F) -> u64
where
    F: Fn(u64) -> bool + Sync,
{
    let mut start = 0u64;
    loop {
        let end = start.saturating_add(NONCE_BATCH);
        if let Some(nonce) = (start..end).into_par_iter().find_first(|n| matches(*n)) {
            return nonce;
        }
        start = end;
    }
}
