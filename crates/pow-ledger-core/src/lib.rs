pub mod constants;
pub mod error;
pub mod mine;

use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::HASH_HEX_SIZE;

pub use chain::{Chain, ChainConfig};
pub use error::{ChainError, Violation};

pub type Hash = [u8; 32];

/// Opaque data carried by a block. Serialized untagged, so a `Text` payload is a
/// JSON string and a `Transactions` payload is a JSON array of strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Transactions(Vec<String>),
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Vec<String>> for Payload {
    fn from(txs: Vec<String>) -> Self {
        Payload::Transactions(txs)
    }
}

impl From<Vec<&str>> for Payload {
    fn from(txs: Vec<&str>) -> Self {
        Payload::Transactions(txs.into_iter().map(str::to_string).collect())
    }
}

/// How a block searches for its nonce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MiningStrategy {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    index: u64,
    timestamp: u64,
    payload: Payload,
    previous_hash: Hash,
    nonce: u64,
    difficulty: u32,
    hash: Hash,
}

impl Block {
    /// Mine a block at the current time, searching nonces sequentially from 0.
    pub fn new(
        index: u64,
        payload: impl Into<Payload>,
        previous_hash: Hash,
        difficulty: u32,
    ) -> Self {
        Self::mined_at(
            index,
            now_millis(),
            payload,
            previous_hash,
            difficulty,
            MiningStrategy::Sequential,
        )
    }

    /// Mine a block with an explicit timestamp and search strategy.
    ///
    /// # Panics
    ///
    /// Panics if `difficulty` exceeds the number of hex digits in a hash, since no
    /// nonce could ever satisfy it.
    pub fn mined_at(
        index: u64,
        timestamp: u64,
        payload: impl Into<Payload>,
        previous_hash: Hash,
        difficulty: u32,
        strategy: MiningStrategy,
    ) -> Self {
        assert!(
            difficulty as usize <= HASH_HEX_SIZE,
            "difficulty {difficulty} exceeds {HASH_HEX_SIZE} hex digits"
        );
        let mut block = Self {
            index,
            timestamp,
            payload: payload.into(),
            previous_hash,
            nonce: 0,
            difficulty,
            hash: [0u8; 32],
        };
        let (nonce, hash) = match strategy {
            MiningStrategy::Sequential => pow::mine_sequential(&block),
            MiningStrategy::Parallel => mine::mine_parallel(&block),
        };
        block.nonce = nonce;
        block.hash = hash;
        block
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    /// Unix time in milliseconds. Not guaranteed to increase along the chain.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn previous_hash(&self) -> &Hash {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// The stored hash, as set by mining (or by a tamper).
    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Canonical encoding of the hashed fields with `nonce` substituted.
    ///
    /// `serde_json::Map` is key-ordered unless the `preserve_order` feature is
    /// enabled, so the object always serializes with its keys sorted.
    pub fn canonical_bytes(&self, nonce: u64) -> Vec<u8> {
        let value = json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "payload": self.payload,
            "previous_hash": hex::encode(self.previous_hash),
            "nonce": nonce,
        });
        value.to_string().into_bytes()
    }

    pub fn hash_with_nonce(&self, nonce: u64) -> Hash {
        sha256(&self.canonical_bytes(nonce))
    }

    pub fn recompute_hash(&self) -> Hash {
        self.hash_with_nonce(self.nonce)
    }

    pub fn meets_difficulty(&self) -> bool {
        pow::meets_difficulty(&self.hash, self.difficulty)
    }
}

pub fn sha256(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub mod pow {
    use super::{Block, Hash};
    use std::time::Instant;
    use tracing::info;

    /// Mine by trying nonces 0, 1, 2, ... until the hex hash starts with
    /// `block.difficulty()` zero characters. Returns the winning nonce and hash.
    pub fn mine_sequential(block: &Block) -> (u64, Hash) {
        let started = Instant::now();
        let mut nonce = 0u64;
        loop {
            let hash = block.hash_with_nonce(nonce);
            if meets_difficulty(&hash, block.difficulty()) {
                info!(
                    "Mined block {} with nonce {} after {} attempts in {:?} (hash {})",
                    block.index(),
                    nonce,
                    nonce.saturating_add(1),
                    started.elapsed(),
                    hex::encode(hash)
                );
                return (nonce, hash);
            }
            nonce = nonce.wrapping_add(1);
        }
    }

    /// Number of leading `'0'` characters in the lowercase hex rendering of `hash`.
    pub fn count_leading_zero_nibbles(hash: &Hash) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 2;
            } else {
                if *b < 0x10 {
                    total += 1;
                }
                break;
            }
        }
        total
    }

    pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
        count_leading_zero_nibbles(hash) >= difficulty
    }
}

pub mod chain {
    use super::*;
    use crate::constants::{
        DEFAULT_DIFFICULTY, DUMP_DELIMITER_WIDTH, GENESIS_PAYLOAD, GENESIS_PREVIOUS_HASH,
        MAX_DIFFICULTY,
    };
    use std::fmt;
    use tracing::{debug, info, warn};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ChainConfig {
        /// Required leading zero hex digits for every block this chain mines.
        pub difficulty: u32,
        pub strategy: MiningStrategy,
    }

    impl Default for ChainConfig {
        fn default() -> Self {
            Self {
                difficulty: DEFAULT_DIFFICULTY,
                strategy: MiningStrategy::Sequential,
            }
        }
    }

    impl ChainConfig {
        pub fn validate(&self) -> Result<(), ChainError> {
            if self.difficulty > MAX_DIFFICULTY {
                return Err(ChainError::DifficultyTooHigh {
                    difficulty: self.difficulty,
                    max: MAX_DIFFICULTY,
                });
            }
            Ok(())
        }
    }

    /// Single-writer, in-memory chain of mined blocks. Never empty: the genesis
    /// block is mined on construction.
    #[derive(Clone, Debug)]
    pub struct Chain {
        config: ChainConfig,
        blocks: Vec<Block>,
    }

    impl Chain {
        /// Create a chain with sequential mining and no cap on `difficulty` beyond
        /// the hash width.
        ///
        /// # Panics
        ///
        /// Panics if `difficulty` is above 64, which no hash can satisfy.
        pub fn new(difficulty: u32) -> Self {
            Self::build(ChainConfig {
                difficulty,
                strategy: MiningStrategy::Sequential,
            })
        }

        pub fn with_config(config: ChainConfig) -> Result<Self, ChainError> {
            config.validate()?;
            Ok(Self::build(config))
        }

        fn build(config: ChainConfig) -> Self {
            let genesis = Block::mined_at(
                0,
                now_millis(),
                GENESIS_PAYLOAD,
                GENESIS_PREVIOUS_HASH,
                config.difficulty,
                config.strategy,
            );
            Self {
                config,
                blocks: vec![genesis],
            }
        }

        pub fn config(&self) -> &ChainConfig {
            &self.config
        }

        pub fn difficulty(&self) -> u32 {
            self.config.difficulty
        }

        pub fn len(&self) -> usize {
            self.blocks.len()
        }

        /// Always false; kept alongside `len`.
        pub fn is_empty(&self) -> bool {
            self.blocks.is_empty()
        }

        pub fn blocks(&self) -> &[Block] {
            &self.blocks
        }

        pub fn get(&self, index: usize) -> Option<&Block> {
            self.blocks.get(index)
        }

        pub fn tip(&self) -> &Block {
            &self.blocks[self.blocks.len() - 1]
        }

        /// Mine a block for `payload` on top of the current tip and push it.
        pub fn append(&mut self, payload: impl Into<Payload>) -> &Block {
            let previous_hash = *self.tip().hash();
            let block = Block::mined_at(
                self.blocks.len() as u64,
                now_millis(),
                payload,
                previous_hash,
                self.config.difficulty,
                self.config.strategy,
            );
            self.blocks.push(block);
            info!(
                "Appended block {} (chain length {})",
                self.blocks.len() - 1,
                self.blocks.len()
            );
            self.tip()
        }

        pub fn verify(&self) -> bool {
            self.validate().is_ok()
        }

        /// Recompute every stored hash and check every link, genesis included.
        /// Per block the hash check runs before the link check.
        pub fn validate(&self) -> Result<(), Violation> {
            self.check_hashes_and_links()
                .inspect_err(|v| debug!("Chain validation failed: {}", v))
        }

        /// `validate` plus the proof-of-work condition on every stored hash.
        /// Catches a tampered tip, which `validate` cannot see.
        pub fn validate_work(&self) -> Result<(), Violation> {
            self.validate()?;
            for block in &self.blocks {
                if !block.meets_difficulty() {
                    let violation = Violation::InsufficientWork {
                        index: block.index,
                        difficulty: block.difficulty,
                    };
                    debug!("Chain validation failed: {}", violation);
                    return Err(violation);
                }
            }
            Ok(())
        }

        fn check_hashes_and_links(&self) -> Result<(), Violation> {
            let genesis = &self.blocks[0];
            if genesis.hash != genesis.recompute_hash() {
                return Err(Violation::HashMismatch {
                    index: genesis.index,
                });
            }
            for pair in self.blocks.windows(2) {
                let (previous, current) = (&pair[0], &pair[1]);
                if current.hash != current.recompute_hash() {
                    return Err(Violation::HashMismatch {
                        index: current.index,
                    });
                }
                if current.previous_hash != previous.hash {
                    return Err(Violation::BrokenLink {
                        index: current.index,
                    });
                }
            }
            Ok(())
        }

        /// Replace a block's payload and recompute its stored hash without
        /// re-mining or touching the successor's link. Genesis is not tamperable.
        pub fn tamper(
            &mut self,
            index: usize,
            payload: impl Into<Payload>,
        ) -> Result<(), ChainError> {
            let len = self.blocks.len();
            if index == 0 || index >= len {
                warn!("Invalid block index {} to tamper (chain length {})", index, len);
                return Err(ChainError::InvalidIndex { index, len });
            }
            let block = &mut self.blocks[index];
            block.payload = payload.into();
            block.hash = block.recompute_hash();
            warn!("Tampered with block {} (new hash {})", index, block.hash_hex());
            Ok(())
        }
    }

    #[derive(Serialize)]
    struct BlockRecord<'a> {
        index: u64,
        timestamp: u64,
        payload: &'a Payload,
        previous_hash: String,
        hash: String,
    }

    impl fmt::Display for Chain {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let delimiter = "-".repeat(DUMP_DELIMITER_WIDTH);
            for block in &self.blocks {
                let record = BlockRecord {
                    index: block.index,
                    timestamp: block.timestamp,
                    payload: &block.payload,
                    previous_hash: hex::encode(block.previous_hash),
                    hash: block.hash_hex(),
                };
                let json = serde_json::to_string_pretty(&record).map_err(|_| fmt::Error)?;
                writeln!(f, "{json}")?;
                writeln!(f, "{delimiter}")?;
            }
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn genesis_tamper_is_caught_by_self_hash_check() {
            let mut chain = Chain::new(1);
            chain.append("A pays B 10");
            chain.blocks[0].payload = Payload::from("Forged Genesis");
            assert_eq!(chain.validate(), Err(Violation::HashMismatch { index: 0 }));
        }

        #[test]
        fn unrehashed_mutation_is_a_hash_mismatch() {
            let mut chain = Chain::new(1);
            chain.append("A pays B 10");
            chain.append("B pays C 5");
            chain.blocks[1].payload = Payload::from("A pays E 100");
            assert_eq!(chain.validate(), Err(Violation::HashMismatch { index: 1 }));
            assert!(!chain.verify());
        }

        #[test]
        fn relinked_block_is_a_broken_link() {
            let mut chain = Chain::new(1);
            chain.append("A pays B 10");
            chain.append("B pays C 5");
            let block = &mut chain.blocks[2];
            block.previous_hash = [7u8; 32];
            block.hash = block.recompute_hash();
            assert_eq!(chain.validate(), Err(Violation::BrokenLink { index: 2 }));
        }

        #[test]
        fn config_default_example() {
            let config = ChainConfig::default();
            assert_eq!(config.difficulty, DEFAULT_DIFFICULTY);
            assert_eq!(config.strategy, MiningStrategy::Sequential);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn config_rejects_difficulty_above_max() {
            let config = ChainConfig {
                difficulty: MAX_DIFFICULTY + 1,
                ..ChainConfig::default()
            };
            assert_eq!(
                config.validate(),
                Err(ChainError::DifficultyTooHigh {
                    difficulty: MAX_DIFFICULTY + 1,
                    max: MAX_DIFFICULTY,
                })
            );
            assert!(Chain::with_config(config).is_err());
        }
    }
}
