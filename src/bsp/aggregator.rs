//! Inbox/outbox message accumulators
//!
//! Senders add rank shares into the outbox during superstep s. The outbox is
//! then settled into the inbox, which superstep s + 1 reads. Settling takes
//! `&mut self`, so no settle can start while a concurrent sender still holds
//! a shared borrow: the barrier is enforced by the borrow checker.

use super::atomic::{AtomicAccumulate, AtomicF64};

/// Sequential accumulator (single writer)
///
/// Also used by distributed workers, whose outbox is a full-length partial
/// buffer that is all-reduced in place before settling.
#[derive(Debug, Clone)]
pub struct MessageAggregator {
    inbox: Vec<f64>,
    outbox: Vec<f64>,
}

impl MessageAggregator {
    /// Zeroed inbox and outbox for `n` vertices
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            inbox: vec![0.0; n],
            outbox: vec![0.0; n],
        }
    }

    /// Zero the outbox before any sends of a new superstep
    pub fn begin_superstep(&mut self) {
        self.outbox.fill(0.0);
    }

    /// Mass settled by the previous superstep, per destination
    #[must_use]
    pub fn inbox(&self) -> &[f64] {
        &self.inbox
    }

    /// Add `share` to `destination`'s outbox cell
    pub fn send(&mut self, destination: usize, share: f64) {
        self.outbox[destination] += share;
    }

    /// Raw outbox, for in-place collective reduction
    pub fn outbox_mut(&mut self) -> &mut [f64] {
        &mut self.outbox
    }

    /// Outbox becomes next superstep's inbox
    pub fn settle(&mut self) {
        std::mem::swap(&mut self.inbox, &mut self.outbox);
    }
}

/// Accumulator for many concurrent senders
///
/// Each outbox cell is an [`AtomicAccumulate`] cell; the inbox is a plain
/// slice because it is only read during a superstep.
#[derive(Debug)]
pub struct ConcurrentAggregator<C: AtomicAccumulate = AtomicF64> {
    inbox: Vec<f64>,
    outbox: Box<[C]>,
}

impl<C: AtomicAccumulate> ConcurrentAggregator<C> {
    /// Zeroed inbox and outbox for `n` vertices
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            inbox: vec![0.0; n],
            outbox: (0..n).map(|_| C::default()).collect(),
        }
    }

    /// Zero the outbox before any sends of a new superstep
    pub fn begin_superstep(&mut self) {
        for cell in self.outbox.iter_mut() {
            cell.reset(0.0);
        }
    }

    /// Mass settled by the previous superstep, per destination
    #[must_use]
    pub fn inbox(&self) -> &[f64] {
        &self.inbox
    }

    /// Add `share` to `destination`'s outbox cell; safe from many threads
    pub fn send(&self, destination: usize, share: f64) {
        self.outbox[destination].accumulate(share);
    }

    /// Copy the settled outbox into the inbox
    pub fn settle(&mut self) {
        for (slot, cell) in self.inbox.iter_mut().zip(self.outbox.iter()) {
            *slot = cell.load();
        }
    }
}
