use thiserror::Error;

/// Errors returned by chain operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("invalid block index {index} to tamper (tamperable range is 1..{len})")]
    InvalidIndex { index: usize, len: usize },
    #[error("difficulty {difficulty} exceeds the maximum of {max}")]
    DifficultyTooHigh { difficulty: u32, max: u32 },
}

/// The first integrity violation found while validating a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("block {index}: stored hash does not match its contents")]
    HashMismatch { index: u64 },
    #[error("block {index}: previous_hash does not match the hash of its predecessor")]
    BrokenLink { index: u64 },
    #[error("block {index}: hash does not have {difficulty} leading zero hex digits")]
    InsufficientWork { index: u64, difficulty: u32 },
}
