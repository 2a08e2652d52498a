pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const DEFAULT_DIFFICULTY: u32 = 4;
/// Upper bound accepted by `ChainConfig::validate`; ~16^8 attempts already takes minutes.
pub const MAX_DIFFICULTY: u32 = 8;
pub const GENESIS_PAYLOAD: &str = "Genesis Block";
pub const GENESIS_PREVIOUS_HASH: [u8; HASH_SIZE] = [0u8; HASH_SIZE];
pub const DUMP_DELIMITER_WIDTH: usize = 50;
pub const NONCE_BATCH: u64 = 1 << 16;
