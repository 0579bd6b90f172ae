//! "Atomic accumulate real" cells
//!
//! Stable Rust has no atomic `f64` add, so accumulation is expressed as a
//! capability with two realizations:
//!
//! - [`AtomicF64`]: compare-and-swap retry loop over the value's bit pattern
//! - [`LockedF64`]: a per-cell lock
//!
//! Both give the same result as sequential accumulation up to
//! summation-order rounding.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// A real-valued cell that many threads may add into at once
pub trait AtomicAccumulate: Default + Send + Sync {
    /// Add `value` to the cell without losing concurrent updates
    fn accumulate(&self, value: f64);

    /// Current value of the cell
    fn load(&self) -> f64;

    /// Overwrite the cell (exclusive access, so no race)
    fn reset(&mut self, value: f64);
}

/// `f64` stored as bits in an [`AtomicU64`]
///
/// # Example
///
/// ```
/// use bsp_pagerank::bsp::{AtomicAccumulate, AtomicF64};
///
/// let cell = AtomicF64::new(1.5);
/// cell.accumulate(0.25);
/// assert_eq!(cell.load(), 1.75);
/// ```
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    /// Create a cell holding `value`
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    /// Add `value` and return the previous contents
    pub fn fetch_add(&self, value: f64) -> f64 {
        // Relaxed: the superstep join publishes the settled values
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let updated = (f64::from_bits(current) + value).to_bits();
            match self
                .0
                .compare_exchange_weak(current, updated, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(previous) => return f64::from_bits(previous),
                Err(observed) => current = observed,
            }
        }
    }
}

impl AtomicAccumulate for AtomicF64 {
    fn accumulate(&self, value: f64) {
        self.fetch_add(value);
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn reset(&mut self, value: f64) {
        *self.0.get_mut() = value.to_bits();
    }
}

/// `f64` behind a mutex
#[derive(Debug, Default)]
pub struct LockedF64(Mutex<f64>);

impl AtomicAccumulate for LockedF64 {
    fn accumulate(&self, value: f64) {
        // A poisoned cell still holds a valid f64
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) += value;
    }

    fn load(&self) -> f64 {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset(&mut self, value: f64) {
        *self.0.get_mut().unwrap_or_else(PoisonError::into_inner) = value;
    }
}
