//! The top-level state machine: fills a buffer of renamed transactions,
//! triggers scheduling rounds, dispatches winners to idle puppets, and
//! issues delete requests as transactions start running.

use std::collections::VecDeque;

use crate::arbiter::RoundRobin;
use crate::bitset::PoolMask;
use crate::config::{MAX_PENDING_TRANSACTIONS, NUM_PUPPETS, POOL};
use crate::ident::Tid;
use crate::puppet::Puppet;
use crate::renamer::{InputTransaction, Renamer, RenamerError, RenamedTransaction};
use crate::scheduler::{Scheduler, SchedulingRequest, TransactionSet};

/// A timestamped notification on the dispatcher's event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub tid: Tid,
    pub status: EventStatus,
    pub cycle: u64,
}

/// The three observable outcomes for a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    /// Selected by the scheduler and handed to a puppet.
    Started,
    /// The puppet assigned to this transaction has completed.
    Finished,
    /// The renamer could not bind every address (hash exhaustion or
    /// reference-counter saturation); see the crate-level Open Question
    /// resolution on surfacing rename failures.
    Failed,
}

/// Puppetmaster: the pipeline's top-level coordinator.
pub struct Dispatcher {
    renamer: Renamer,
    scheduler: Scheduler,
    puppets: [Puppet; NUM_PUPPETS],
    buffer: Vec<RenamedTransaction>,
    pending_flags: PoolMask,
    sent_to_puppet: [Option<RenamedTransaction>; NUM_PUPPETS],
    cycle: u64,
    events: VecDeque<Event>,
    rr_events: RoundRobin,
    rr_deletes: RoundRobin,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            renamer: Renamer::new(),
            scheduler: Scheduler::new(),
            puppets: [Puppet::new(); NUM_PUPPETS],
            buffer: Vec::with_capacity(MAX_PENDING_TRANSACTIONS),
            pending_flags: PoolMask::empty(),
            sent_to_puppet: [const { None }; NUM_PUPPETS],
            cycle: 0,
            events: VecDeque::new(),
            rr_events: RoundRobin::new(NUM_PUPPETS),
            rr_deletes: RoundRobin::new(NUM_PUPPETS),
        }
    }

    /// Submits a new transaction for renaming ahead of scheduling.
    ///
    /// # Errors
    /// Returns [`RenamerError::Busy`] if the renamer's admission queue is
    /// full; the caller should retry on a later cycle.
    pub fn enqueue_transaction(&mut self, tr: InputTransaction) -> Result<(), RenamerError> {
        self.renamer.put_rename(tr)
    }

    /// Pops the next event from the stream, if any.
    pub fn next_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// `true` once no puppet is busy, the buffer is empty, and nothing is
    /// queued inside the renamer or scheduler — the pipeline is fully
    /// drained. Useful for test harnesses driving the tick loop to
    /// completion.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty()
            && self.pending_flags.is_empty()
            && !self.scheduler.is_busy()
            && self.puppets.iter().all(Puppet::is_done)
    }

    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Advances the whole pipeline by exactly one logical cycle, applying
    /// every enabled rule of §4.5 in priority order. All rules read the
    /// puppet busy state as of the *start* of this cycle (`busy_before`);
    /// none observes another rule's cycle-local write, matching the
    /// hardware design's atomicity contract.
    pub fn tick(&mut self) {
        let busy_before: [bool; NUM_PUPPETS] = {
            let mut b = [false; NUM_PUPPETS];
            for (i, p) in self.puppets.iter().enumerate() {
                b[i] = p.is_busy();
            }
            b
        };

        // Rule: surfaced rename failures are drained every cycle; they do
        // not occupy a buffer slot.
        while let Some(failure) = self.renamer.get_failure() {
            tracing::warn!(cycle = self.cycle, tid = failure.tid.0, "tx failed to rename");
            self.events.push_back(Event {
                tid: failure.tid,
                status: EventStatus::Failed,
                cycle: self.cycle,
            });
        }

        // Intake is evaluated against the buffer as it stood at the start of
        // this cycle, but not applied until after Dispatch: both rules touch
        // the buffer's tail, and Dispatch's compaction must swap in the
        // pre-cycle tail, not a transaction this same cycle's Intake just
        // appended.
        let buffer_len_before = self.buffer.len();
        let renamer_has_more = self.renamer.has_pending();
        let intake_item = if buffer_len_before < MAX_PENDING_TRANSACTIONS {
            self.renamer.get().map(|resp| resp.renamed_tr)
        } else {
            None
        };

        // 2. Schedule launch. Gated on the scheduler being idle, not just on
        // `pendingFlags` being empty: intake can refill the buffer to
        // capacity again while a previous round is still in flight. A
        // partial buffer also launches once nothing more is waiting behind
        // it in the renamer, so a batch's tail shorter than a full pool
        // isn't stranded forever; unused candidate slots default to empty
        // sets, which the tournament never selects.
        if buffer_len_before > 0
            && (buffer_len_before == MAX_PENDING_TRANSACTIONS || !renamer_has_more)
            && self.pending_flags.is_empty()
            && !self.scheduler.is_busy()
        {
            let mut sets = [TransactionSet::default(); POOL];
            sets[0] = running_set(&self.sent_to_puppet, &busy_before);
            for (i, tr) in self.buffer.iter().enumerate() {
                sets[i + 1] = TransactionSet::from_candidate((tr).into(), i + 1);
            }
            let submitted = self.scheduler.put(&SchedulingRequest { sets });
            debug_assert!(submitted, "scheduler must be idle when the buffer is full and no flags pending");
        }

        // 3. Schedule receive.
        if let Some(response) = self.scheduler.get() {
            self.pending_flags = response.winner.indices.shift_right_one();
            tracing::debug!(cycle = self.cycle, flags = self.pending_flags.0, "scheduling round complete");
        }

        // 4. Dispatch. The reference hardware has one dispatch unit per
        // puppet, so every puppet idle as of `busy_before` may claim a
        // winner in this same cycle, not just one overall.
        for puppet_idx in (0..NUM_PUPPETS).filter(|&p| !busy_before[p]) {
            if self.pending_flags.is_empty() {
                break;
            }
            let Some(b) = self.pending_flags.lowest() else {
                break;
            };
            let winner = self.buffer[b as usize].clone();
            self.pending_flags = self.pending_flags.clear_bit(b);
            let last = self.buffer.len() - 1;
            if (b as usize) != last {
                self.buffer[b as usize] = self.buffer[last].clone();
                if self.pending_flags.has_bit(last as u32) {
                    self.pending_flags = self
                        .pending_flags
                        .clear_bit(last as u32)
                        .set_bit(b);
                }
            }
            self.buffer.truncate(last);

            tracing::info!(cycle = self.cycle, tid = winner.tid.0, puppet = puppet_idx, "dispatch");
            self.puppets[puppet_idx].start(winner.tid);
            self.sent_to_puppet[puppet_idx] = Some(winner);
        }

        if let Some(item) = intake_item {
            self.buffer.push(item);
        }

        // Advance puppet execution for this cycle (may clear busy flags).
        for p in &mut self.puppets {
            p.tick();
        }
        let busy_after: [bool; NUM_PUPPETS] = {
            let mut b = [false; NUM_PUPPETS];
            for (i, p) in self.puppets.iter().enumerate() {
                b[i] = p.is_busy();
            }
            b
        };

        // 5. Event emission, round-robin serialized across puppets.
        let edged: Vec<bool> = (0..NUM_PUPPETS)
            .map(|p| busy_before[p] != busy_after[p])
            .collect();
        let starts: Vec<bool> = (0..NUM_PUPPETS)
            .map(|p| !busy_before[p] && busy_after[p])
            .collect();
        for p in self.rr_events.drain_order(&edged) {
            if starts[p] {
                let tr = self.sent_to_puppet[p]
                    .clone()
                    .expect("puppet started must have a sent_to_puppet entry");
                self.events.push_back(Event {
                    tid: tr.tid,
                    status: EventStatus::Started,
                    cycle: self.cycle,
                });
            } else {
                let tr = self.sent_to_puppet[p]
                    .clone()
                    .expect("puppet finished must have a sent_to_puppet entry");
                self.events.push_back(Event {
                    tid: tr.tid,
                    status: EventStatus::Finished,
                    cycle: self.cycle,
                });
            }
        }
        // Names are released at start, not at finish (see module docs):
        // delete requests are issued here, round-robin serialized
        // independently of the event stream.
        for p in self.rr_deletes.drain_order(&starts) {
            let tr = self.sent_to_puppet[p]
                .clone()
                .expect("start edge must have a sent_to_puppet entry");
            self.renamer.put_delete(&tr);
        }

        self.scheduler.tick();

        // 6. Advance the cycle counter.
        self.cycle += 1;
    }
}

/// Builds the running-set `TransactionSet` from every puppet busy as of the
/// start of this cycle.
fn running_set(
    sent_to_puppet: &[Option<RenamedTransaction>; NUM_PUPPETS],
    busy_before: &[bool; NUM_PUPPETS],
) -> TransactionSet {
    let mut set = TransactionSet {
        indices: PoolMask::bit(0),
        ..TransactionSet::default()
    };
    for (p, tr) in sent_to_puppet.iter().enumerate() {
        if busy_before[p] {
            if let Some(tr) = tr {
                set.read_set.union_with(&tr.read_set);
                set.write_set.union_with(&tr.write_set);
            }
        }
    }
    set
}
