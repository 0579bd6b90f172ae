//! Double-buffered rank storage

/// Current and next rank estimates
///
/// During a superstep the current buffer is a read-only snapshot and the next
/// buffer is written; [`swap`](Self::swap) flips them at the round boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct RankVector {
    current: Vec<f64>,
    next: Vec<f64>,
}

impl RankVector {
    /// `len` entries all set to `value`
    #[must_use]
    pub fn filled(len: usize, value: f64) -> Self {
        Self {
            current: vec![value; len],
            next: vec![0.0; len],
        }
    }

    /// Uniform `1/n` initial ranks
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn uniform(n: usize) -> Self {
        if n == 0 {
            return Self::filled(0, 0.0);
        }
        Self::filled(n, 1.0 / n as f64)
    }

    /// Number of entries held
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Whether no entries are held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Ranks as of the last completed superstep
    #[must_use]
    pub fn current(&self) -> &[f64] {
        &self.current
    }

    /// Borrow the snapshot and the buffer being written at the same time
    pub fn split(&mut self) -> (&[f64], &mut [f64]) {
        (&self.current, &mut self.next)
    }

    /// Next buffer becomes current
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }

    /// Take the current ranks
    #[must_use]
    pub fn into_current(self) -> Vec<f64> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform() {
        let ranks = RankVector::uniform(4);
        assert_eq!(ranks.current(), &[0.25; 4]);
        assert!(RankVector::uniform(0).is_empty());
    }

    #[test]
    fn test_split_then_swap() {
        let mut ranks = RankVector::uniform(2);
        {
            let (current, next) = ranks.split();
            next[0] = current[0] * 2.0;
            next[1] = 0.0;
        }
        // Snapshot untouched until the swap
        assert_eq!(ranks.current(), &[0.5, 0.5]);

        ranks.swap();
        assert_eq!(ranks.current(), &[1.0, 0.0]);
        assert_eq!(ranks.into_current(), vec![1.0, 0.0]);
    }
}
