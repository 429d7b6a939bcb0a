//! One partition of the rename table: bounded linear probing over a fixed
//! array of reference-counted slots.

use thiserror::Error;

use crate::config::{MAX_REFS, NUM_HASHES, SHARD_SLOTS};
use crate::ident::{ObjectAddress, ObjectName};

/// One cell of the rename table. `counter == 0` means the slot is free.
#[derive(Debug, Clone, Copy, Default)]
struct RenameTableEntry {
    counter: u32,
    object_address: ObjectAddress,
}

/// Errors a [`Shard`] can report for a `Rename` request.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ShardError {
    /// Linear probing exhausted `NUM_HASHES` attempts without finding a free
    /// or matching slot.
    #[error("probing exhausted for address {address:#x}")]
    ProbingExhausted { address: ObjectAddress },
    /// The matching slot's reference counter is already at `MAX_REFS`.
    #[error("reference counter saturated for address {address:#x}")]
    CounterSaturated { address: ObjectAddress },
}

/// One partition of the rename table, selected by address prefix.
///
/// At most one request is in flight at a time; ordering inside a shard is
/// arrival order in, arrival order out (see the crate-level concurrency
/// model). The shard trusts its caller to have already picked it by
/// `shard_index`; it only knows its own index for name construction.
#[derive(Debug, Clone)]
pub struct Shard {
    index: u8,
    slots: Vec<RenameTableEntry>,
}

impl Shard {
    /// Constructs an empty shard with all slots free.
    #[must_use]
    pub fn new(index: u8) -> Self {
        Self {
            index,
            slots: vec![RenameTableEntry::default(); SHARD_SLOTS],
        }
    }

    /// Clears all slots to `counter = 0`. Issued once at startup; blocks all
    /// other requests to this shard until complete (trivially true here
    /// since this model has no concurrent requests within a shard).
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = RenameTableEntry::default();
        }
    }

    /// Attempts to bind `address` to a name in this shard, starting the
    /// probe sequence at `base_slot_key`.
    ///
    /// Implements the hashing policy of the rename-table design: for each of
    /// up to `NUM_HASHES` probed slots, free slots are claimed outright,
    /// slots already bound to the same address are reference-bumped (or
    /// rejected if saturated), and any other occupied slot advances the
    /// probe. Exhausting `NUM_HASHES` probes without a hit is a failure.
    pub fn rename(
        &mut self,
        address: ObjectAddress,
        base_slot_key: u16,
    ) -> Result<ObjectName, ShardError> {
        for i in 0..NUM_HASHES {
            let slot_key = (base_slot_key as usize + i) % SHARD_SLOTS;
            let slot = &mut self.slots[slot_key];

            if slot.counter == 0 {
                *slot = RenameTableEntry {
                    counter: 1,
                    object_address: address,
                };
                tracing::debug!(shard = self.index, slot_key, address, "rename: allocated");
                return Ok(self.name(slot_key));
            }

            if slot.object_address == address {
                if slot.counter >= MAX_REFS {
                    tracing::warn!(shard = self.index, slot_key, address, "rename: saturated");
                    return Err(ShardError::CounterSaturated { address });
                }
                slot.counter += 1;
                tracing::debug!(
                    shard = self.index,
                    slot_key,
                    address,
                    counter = slot.counter,
                    "rename: bumped"
                );
                return Ok(self.name(slot_key));
            }
            // Collision on a different address; advance the probe.
        }
        tracing::warn!(shard = self.index, address, "rename: probing exhausted");
        Err(ShardError::ProbingExhausted { address })
    }

    /// Releases one reference to `name`. Matching deletes to successful
    /// renames is the caller's responsibility; calling this on a free slot
    /// is undefined in the reference design and only debug-asserted here.
    pub fn delete(&mut self, name: ObjectName) {
        debug_assert_eq!(name.shard_index, self.index, "delete routed to wrong shard");
        let slot_key = name.slot_key as usize;
        let slot = &mut self.slots[slot_key];
        debug_assert!(slot.counter > 0, "delete on a free slot (counter == 0)");
        slot.counter = slot.counter.saturating_sub(1);
        tracing::debug!(
            shard = self.index,
            slot_key,
            counter = slot.counter,
            "delete"
        );
    }

    /// Current reference count of `name`'s slot; used by invariant tests.
    #[must_use]
    pub fn ref_count(&self, name: ObjectName) -> u32 {
        self.slots[name.slot_key as usize].counter
    }

    fn name(&self, slot_key: usize) -> ObjectName {
        ObjectName {
            shard_index: self.index,
            slot_key: slot_key as u16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_then_delete_restores_pre_state() {
        let mut shard = Shard::new(0);
        let name = shard.rename(42, 3).expect("first rename succeeds");
        assert_eq!(shard.ref_count(name), 1);
        shard.delete(name);
        assert_eq!(shard.ref_count(name), 0);
    }

    #[test]
    fn repeated_rename_of_same_address_bumps_refcount() {
        let mut shard = Shard::new(0);
        let a = shard.rename(7, 0).expect("first rename");
        let b = shard.rename(7, 0).expect("second rename");
        assert_eq!(a, b);
        assert_eq!(shard.ref_count(a), 2);
    }

    #[test]
    fn colliding_addresses_advance_the_probe() {
        let mut shard = Shard::new(0);
        let a = shard.rename(1, 5).expect("first address at base key 5");
        let b = shard.rename(2, 5).expect("second address collides at base key 5");
        assert_ne!(a.slot_key, b.slot_key);
    }

    #[test]
    fn ninth_colliding_address_fails_when_hashes_equal_slots() {
        // With NUM_HASHES == 8, filling all 8 probe targets with distinct
        // addresses leaves no room for a 9th.
        let mut shard = Shard::new(0);
        for addr in 0..NUM_HASHES as u64 {
            shard.rename(addr, 0).expect("within NUM_HASHES probes");
        }
        let result = shard.rename(NUM_HASHES as u64, 0);
        assert!(matches!(result, Err(ShardError::ProbingExhausted { .. })));
    }

    #[test]
    fn freeing_a_slot_permits_the_next_colliding_rename() {
        let mut shard = Shard::new(0);
        let mut names = Vec::new();
        for addr in 0..NUM_HASHES as u64 {
            names.push(shard.rename(addr, 0).expect("within NUM_HASHES probes"));
        }
        assert!(shard.rename(NUM_HASHES as u64, 0).is_err());
        shard.delete(names[0]);
        assert!(shard.rename(NUM_HASHES as u64, 0).is_ok());
    }

    #[test]
    fn saturated_counter_rejects_further_bumps() {
        let mut shard = Shard::new(0);
        let name = shard.rename(99, 0).expect("first rename");
        for _ in 1..MAX_REFS {
            shard.rename(99, 0).expect("bump under MAX_REFS");
        }
        let result = shard.rename(99, 0);
        assert!(matches!(result, Err(ShardError::CounterSaturated { .. })));
        assert_eq!(shard.ref_count(name), MAX_REFS);
    }
}
