//! Delayed-callback queue.
//!
//! A `BinaryHeap` with reversed ordering acts as a min-heap keyed by
//! `(due_ms, seq)`. Sequence numbers only grow, so callbacks due on the same
//! millisecond fire in the order they were scheduled.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::circuit::ComponentKey;
use crate::components::{Edge, PinIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// `Device::on_timer(token)` on the owner.
    Timer { token: u64 },
    /// `Device::on_interrupt(pin, edge)` on the owner, after latency.
    DeliverInterrupt { pin: PinIndex, edge: Edge },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCallback {
    pub due_ms: u64,
    pub seq: u64,
    pub owner: ComponentKey,
    pub action: CallbackAction,
}

impl Ord for ScheduledCallback {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the heap pops the earliest (due, seq) first.
        other
            .due_ms
            .cmp(&self.due_ms)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledCallback {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: BinaryHeap<ScheduledCallback>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_ms: u64, owner: ComponentKey, action: CallbackAction) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(ScheduledCallback {
            due_ms,
            seq,
            owner,
            action,
        });
        seq
    }

    /// Pop the earliest callback if it is due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<ScheduledCallback> {
        if self.queue.peek()?.due_ms <= now_ms {
            self.queue.pop()
        } else {
            None
        }
    }

    /// Like [`Scheduler::pop_due`], but leaves callbacks scheduled at or
    /// after `seq_limit` for a later drain.
    pub fn pop_due_before(&mut self, now_ms: u64, seq_limit: u64) -> Option<ScheduledCallback> {
        let next = self.queue.peek()?;
        if next.due_ms <= now_ms && next.seq < seq_limit {
            self.queue.pop()
        } else {
            None
        }
    }

    /// Sequence number the next scheduled callback will get.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Drop every pending callback owned by `owner`. Returns how many were dropped.
    pub fn cancel_owner(&mut self, owner: ComponentKey) -> usize {
        let before = self.queue.len();
        self.queue.retain(|cb| cb.owner != owner);
        before - self.queue.len()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending_for(&self, owner: ComponentKey) -> usize {
        self.queue.iter().filter(|cb| cb.owner == owner).count()
    }
}
