//! Fans rename/delete requests across the shards by address prefix and
//! rejoins per-object results into per-transaction responses.

use std::collections::VecDeque;

use thiserror::Error;

use crate::bitset::NameSet;
use crate::config::{MAX_PENDING_TRANSACTIONS, NUM_SHARDS, OBJS_PER_TR};
use crate::ident::{route, ObjectAddress, ObjectName, Tid};
use crate::shard::{Shard, ShardError};

/// One address slot as supplied by the submitter: `{valid, write, address}`.
/// The core distinguishes reads from writes by `write`, not by position, so
/// callers may pack the 16 fields in any order (see the submitter contract).
#[derive(Debug, Clone, Copy)]
pub struct Object {
    pub valid: bool,
    pub write: bool,
    pub address: ObjectAddress,
}

/// A transaction as it arrives from the submitter: up to `OBJS_PER_TR` reads
/// and `OBJS_PER_TR` writes, addresses not yet renamed.
#[derive(Debug, Clone)]
pub struct InputTransaction {
    pub tid: Tid,
    pub objects: Vec<Object>,
}

impl InputTransaction {
    /// Builds an `InputTransaction` from explicit read/write address lists,
    /// for callers that already know which list an address belongs to.
    #[must_use]
    pub fn new(tid: Tid, reads: &[ObjectAddress], writes: &[ObjectAddress]) -> Self {
        let mut objects = Vec::with_capacity(reads.len() + writes.len());
        objects.extend(reads.iter().map(|&address| Object {
            valid: true,
            write: false,
            address,
        }));
        objects.extend(writes.iter().map(|&address| Object {
            valid: true,
            write: true,
            address,
        }));
        Self { tid, objects }
    }
}

/// A transaction whose object addresses have all been bound to names.
#[derive(Debug, Clone, Default)]
pub struct RenamedTransaction {
    pub tid: Tid,
    pub read_set: NameSet,
    pub write_set: NameSet,
}

impl RenamedTransaction {
    /// Every name this transaction currently holds, read and write
    /// together — what the dispatcher owes one `Delete` per, per §4's
    /// ownership rules.
    #[must_use]
    pub fn all_names(&self) -> NameSet {
        self.read_set.union(&self.write_set)
    }
}

/// `{readSet, writeSet}` alone, as fed into a scheduling round.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerTransaction {
    pub read_set: NameSet,
    pub write_set: NameSet,
}

impl From<&RenamedTransaction> for SchedulerTransaction {
    fn from(rt: &RenamedTransaction) -> Self {
        Self {
            read_set: rt.read_set,
            write_set: rt.write_set,
        }
    }
}

/// Successful rename result delivered to the dispatcher via `get`.
#[derive(Debug, Clone)]
pub struct RenamerResponse {
    pub renamed_tr: RenamedTransaction,
    pub scheduler_tr: SchedulerTransaction,
}

/// Errors the renamer can report for a `put(Rename(..))` call.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RenamerError {
    /// The renamer's admission queue is full; the caller must retry.
    #[error("renamer is busy: admission queue full")]
    Busy,
    /// The transaction declared more than `OBJS_PER_TR` valid reads or
    /// writes, violating the fixed-size `InputTransaction` data model.
    #[error("tid {tid} declares more than {OBJS_PER_TR} reads or writes")]
    TooManyObjects { tid: Tid },
}

/// A rename that failed partway through a transaction. Partial successes for
/// that `tid` have already been drained back to the owning shards before
/// this is surfaced, per the ownership rule in §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenameFailure {
    pub tid: Tid,
    pub failed_object: ObjectAddress,
}

/// Fans requests across the `NUM_SHARDS` shards and rejoins per-object
/// results into whole-transaction responses.
///
/// This model resolves a transaction's renames synchronously within one
/// `put` call rather than interleaving per-object round trips across
/// cycles: the crate's concurrency model explicitly allows collapsing
/// cross-component pipelining since "no thread-level concurrency is
/// required... for correctness" (see the crate-level concurrency notes).
/// Because each transaction's objects are fully serviced before the next
/// transaction's are considered, per-shard round-robin fairness across
/// concurrently in-flight transactions holds trivially: no transaction's
/// requests can be starved behind another's.
#[derive(Debug)]
pub struct Renamer {
    shards: Vec<Shard>,
    ready: VecDeque<RenamerResponse>,
    failures: VecDeque<RenameFailure>,
}

impl Default for Renamer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renamer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS as u8).map(Shard::new).collect(),
            ready: VecDeque::new(),
            failures: VecDeque::new(),
        }
    }

    /// Resets every shard's rename table. Issued once at startup.
    pub fn reset(&mut self) {
        for shard in &mut self.shards {
            shard.reset();
        }
    }

    /// Admits a new transaction for renaming.
    ///
    /// # Errors
    /// Returns [`RenamerError::Busy`] if the internal ready/failure queues
    /// are already at the admission bound (the renamer's back-pressure).
    pub fn put_rename(&mut self, tr: InputTransaction) -> Result<(), RenamerError> {
        if self.ready.len() + self.failures.len() >= MAX_PENDING_TRANSACTIONS {
            return Err(RenamerError::Busy);
        }

        let reads = tr.objects.iter().filter(|o| o.valid && !o.write).count();
        let writes = tr.objects.iter().filter(|o| o.valid && o.write).count();
        if reads > OBJS_PER_TR || writes > OBJS_PER_TR {
            return Err(RenamerError::TooManyObjects { tid: tr.tid });
        }

        let mut bound: Vec<(bool, ObjectName)> = Vec::with_capacity(2 * OBJS_PER_TR);
        for obj in tr.objects.iter().filter(|o| o.valid) {
            let (shard_index, base_slot_key) = route(obj.address);
            match self.shards[shard_index as usize].rename(obj.address, base_slot_key) {
                Ok(name) => bound.push((obj.write, name)),
                Err(ShardError::ProbingExhausted { .. } | ShardError::CounterSaturated { .. }) => {
                    // Drain every name that did succeed for this tid before
                    // surfacing the failure, per the ownership rule in §4.2.
                    for (_, name) in &bound {
                        self.shards[name.shard_index as usize].delete(*name);
                    }
                    tracing::warn!(tid = tr.tid.0, address = obj.address, "renamer: tx failed");
                    self.failures.push_back(RenameFailure {
                        tid: tr.tid,
                        failed_object: obj.address,
                    });
                    return Ok(());
                }
            }
        }

        let mut read_set = NameSet::empty();
        let mut write_set = NameSet::empty();
        for (is_write, name) in bound {
            if is_write {
                write_set.insert(name);
            } else {
                read_set.insert(name);
            }
        }
        let renamed_tr = RenamedTransaction {
            tid: tr.tid,
            read_set,
            write_set,
        };
        let scheduler_tr = SchedulerTransaction::from(&renamed_tr);
        tracing::debug!(tid = tr.tid.0, "renamer: tx renamed");
        self.ready.push_back(RenamerResponse {
            renamed_tr,
            scheduler_tr,
        });
        Ok(())
    }

    /// Issues one `Delete` per name in `read_set ∪ write_set` back to the
    /// owning shards.
    pub fn put_delete(&mut self, tr: &RenamedTransaction) {
        for name in tr.all_names().iter() {
            self.shards[name.shard_index as usize].delete(name);
        }
    }

    /// Pops the next ready rename response, if any.
    pub fn get(&mut self) -> Option<RenamerResponse> {
        self.ready.pop_front()
    }

    /// `true` if another renamed transaction is already waiting to be
    /// consumed via `get`. Used by the dispatcher to decide whether it is
    /// safe to flush a partial buffer rather than waiting for a full pool.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Pops the next surfaced rename failure, if any.
    pub fn get_failure(&mut self) -> Option<RenameFailure> {
        self.failures.pop_front()
    }
}
