//! The tournament scheduler: merges a scheduling pool pairwise over
//! `ROUNDS = log2(POOL)` rounds into a maximal conflict-free subset.

use crate::bitset::{NameSet, PoolMask};
use crate::config::{NUM_COMPARATORS, POOL, ROUNDS};
use crate::renamer::SchedulerTransaction;

/// A working set during the tournament: the union of read/write names of
/// every candidate merged into it so far, plus which pool positions that
/// union represents.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionSet {
    pub read_set: NameSet,
    pub write_set: NameSet,
    pub indices: PoolMask,
}

impl TransactionSet {
    #[must_use]
    pub fn from_candidate(tr: SchedulerTransaction, position: usize) -> Self {
        Self {
            read_set: tr.read_set,
            write_set: tr.write_set,
            indices: PoolMask::bit(position),
        }
    }

    /// `true` iff `self` and `other` share a read/write, write/read, or
    /// write/write name.
    #[must_use]
    pub fn conflicts_with(&self, other: &Self) -> bool {
        !self.read_set.is_disjoint(&other.write_set)
            || !self.write_set.is_disjoint(&other.read_set)
            || !self.write_set.is_disjoint(&other.write_set)
    }
}

/// Merges two sets: first wins on conflict (`B` is dropped from this merge),
/// otherwise the union of both.
#[must_use]
pub fn merge(a: TransactionSet, b: TransactionSet) -> TransactionSet {
    if a.conflicts_with(&b) {
        return a;
    }
    TransactionSet {
        read_set: a.read_set.union(&b.read_set),
        write_set: a.write_set.union(&b.write_set),
        indices: a.indices.union(b.indices),
    }
}

/// One scheduling round's input: position 0 is the synthetic running set,
/// positions `1..POOL-1` are candidates.
#[derive(Debug, Clone)]
pub struct SchedulingRequest {
    pub sets: [TransactionSet; POOL],
}

/// The tournament's result: the `TransactionSet` at position 0 after all
/// rounds. `indices` bits `1..POOL-1` name which candidates were selected.
#[derive(Debug, Clone, Copy)]
pub struct SchedulingResponse {
    pub winner: TransactionSet,
}

/// Computes how many pipeline cycles a round over `active_sets` positions
/// takes given a bank of `NUM_COMPARATORS` merge units.
#[must_use]
fn round_cycles(active_sets: usize) -> u64 {
    (active_sets.div_ceil(2)).div_ceil(NUM_COMPARATORS) as u64
}

/// Total latency of one full tournament over `POOL` sets, the sum of every
/// round's pipeline cycles plus no additional overhead.
#[must_use]
pub fn tournament_latency_cycles() -> u64 {
    let mut active = POOL;
    let mut total = 0u64;
    for _ in 0..ROUNDS {
        total += round_cycles(active);
        active = active.div_ceil(2);
    }
    total
}

/// Runs the full `ROUNDS`-round tournament to completion and returns the
/// winning set. Pure function: the scheduler's busy/idle state machine
/// (below) is what actually enforces the pipelined latency budget.
#[must_use]
pub fn run_tournament(request: &SchedulingRequest) -> SchedulingResponse {
    let mut working = request.sets;
    let mut active = POOL;
    for _ in 0..ROUNDS {
        let half = active.div_ceil(2);
        for k in 0..half {
            let left = working[2 * k];
            working[k] = if 2 * k + 1 < active {
                merge(left, working[2 * k + 1])
            } else {
                left
            };
        }
        active = half;
    }
    SchedulingResponse { winner: working[0] }
}

/// Busy/idle state machine around [`run_tournament`]: the scheduler accepts
/// one request at a time and is busy from acceptance until the computed
/// latency has elapsed, rejecting a new request while busy (§4.3).
#[derive(Debug, Default)]
pub struct Scheduler {
    busy: Option<BusyState>,
}

#[derive(Debug)]
struct BusyState {
    remaining_cycles: u64,
    response: SchedulingResponse,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self { busy: None }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.is_some()
    }

    /// Submits a scheduling round. Returns `false` (request rejected) if the
    /// scheduler is still busy with a previous round.
    pub fn put(&mut self, request: &SchedulingRequest) -> bool {
        if self.busy.is_some() {
            return false;
        }
        let response = run_tournament(request);
        self.busy = Some(BusyState {
            remaining_cycles: tournament_latency_cycles(),
            response,
        });
        true
    }

    /// Advances one cycle of internal pipeline latency.
    pub fn tick(&mut self) {
        if let Some(state) = &mut self.busy {
            state.remaining_cycles = state.remaining_cycles.saturating_sub(1);
        }
    }

    /// Pops the response once its pipeline latency has fully elapsed.
    pub fn get(&mut self) -> Option<SchedulingResponse> {
        if matches!(&self.busy, Some(state) if state.remaining_cycles == 0) {
            self.busy.take().map(|state| state.response)
        } else {
            None
        }
    }
}
