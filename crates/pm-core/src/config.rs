//! Compile-time widths for the scheduling pipeline.
//!
//! Every pool, table, and bit-vector width in this crate is a compile-time
//! constant; there is no dynamic resizing (see the crate-level Non-goals).
//! [`Config`] exists purely so the constants can be reported and asserted
//! against at runtime (e.g. by `pm-cli`); it does not parameterise any
//! array or bit-vector layout.

/// Number of rename-table shards.
pub const NUM_SHARDS: usize = 8;
/// Slots per shard. `NUM_SHARDS * SHARD_SLOTS == NUM_NAMES`.
pub const SHARD_SLOTS: usize = 128;
/// `log2(SHARD_SLOTS)`; width of the base slot-key field of a wide address.
pub const LOG_SHARD: u32 = SHARD_SLOTS.ilog2();
/// Total renamed-object name space.
pub const NUM_NAMES: usize = NUM_SHARDS * SHARD_SLOTS;
/// Number of 64-bit words backing a `NUM_NAMES`-wide bit-vector.
pub const NUM_NAME_WORDS: usize = NUM_NAMES.div_ceil(64);

/// Reads (and, symmetrically, writes) declared per transaction.
pub const OBJS_PER_TR: usize = 8;

/// Transactions per scheduling batch.
pub const POOL: usize = 8;
/// `log2(POOL)`; number of tournament merge rounds.
pub const ROUNDS: u32 = POOL.ilog2();
/// Pairwise merges performed per cycle by the scheduler's comparator bank.
pub const NUM_COMPARATORS: usize = 2;

/// Fixed pool of execution engines.
pub const NUM_PUPPETS: usize = 8;
/// Cycles a puppet stays busy after `start`.
pub const TX_DURATION: u64 = 2000;

/// Bound on linear probing attempts per rename.
pub const NUM_HASHES: usize = 8;
/// Maximum reference count a rename-table slot can carry.
pub const MAX_REFS: u32 = NUM_NAMES as u32;

/// Dispatcher admission bound: in-flight renamed transactions the buffer and
/// pending-flags mask can hold at once (`POOL - 1` candidate slots).
pub const MAX_PENDING_TRANSACTIONS: usize = POOL - 1;

/// Runtime-visible snapshot of the constants above, used by `pm-cli` to
/// report the active build configuration and to validate CSV input against
/// `OBJS_PER_TR` without hard-coding the number twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub num_shards: usize,
    pub shard_slots: usize,
    pub num_names: usize,
    pub objs_per_tr: usize,
    pub pool: usize,
    pub rounds: u32,
    pub num_comparators: usize,
    pub num_puppets: usize,
    pub tx_duration: u64,
    pub num_hashes: usize,
    pub max_refs: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_shards: NUM_SHARDS,
            shard_slots: SHARD_SLOTS,
            num_names: NUM_NAMES,
            objs_per_tr: OBJS_PER_TR,
            pool: POOL,
            rounds: ROUNDS,
            num_comparators: NUM_COMPARATORS,
            num_puppets: NUM_PUPPETS,
            tx_duration: TX_DURATION,
            num_hashes: NUM_HASHES,
            max_refs: MAX_REFS,
        }
    }
}
