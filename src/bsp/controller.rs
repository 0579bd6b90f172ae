//! Superstep loop and termination
//!
//! Every backend implements one round of the protocol; the controller owns
//! the loop around it:
//!
//! ```text
//! ┌──────────────────────── superstep s ─────────────────────────┐
//! │ zero outbox + dangling                                       │
//! │ next[v] = (1-d)/n + d·inbox[v]                               │
//! │ send current[v]/deg(v) to each dst  |  dangling += current[v] │
//! │ ── barrier ──                                                │
//! │ next[v] += d·dangling/n                                      │
//! │ swap current↔next, inbox↔outbox                              │
//! └──────────────────────────────────────────────────────────────┘
//!        │
//!        ▼  TerminationOracle: s+1 < max && messages_sent ?
//! ```

use super::EngineConfig;
use anyhow::Result;
use log::debug;

/// What one superstep observed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// At least one non-dangling vertex forwarded mass (OR over all workers)
    pub messages_sent: bool,

    /// Total dangling mass consumed this round
    pub dangling_mass: f64,
}

/// One BSP round over a backend's state
pub trait Superstep {
    /// Run a full superstep, returning only once its barrier is crossed
    ///
    /// # Errors
    ///
    /// Returns error if the backend's synchronization layer fails
    fn superstep(&mut self) -> Result<StepReport>;
}

/// Decides whether another superstep runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationOracle {
    max_supersteps: usize,
}

impl TerminationOracle {
    /// Oracle with a step budget
    #[must_use]
    pub const fn new(max_supersteps: usize) -> Self {
        Self { max_supersteps }
    }

    /// Whether superstep number `completed` may run, given the last report
    ///
    /// Halts on budget exhaustion or quiescence (no messages last round).
    #[must_use]
    pub fn should_continue(&self, completed: usize, last: Option<&StepReport>) -> bool {
        completed < self.max_supersteps && last.map_or(true, |report| report.messages_sent)
    }
}

/// Drives supersteps until the oracle says stop
#[derive(Debug, Clone)]
pub struct SuperstepController {
    oracle: TerminationOracle,
    completed: usize,
    last: Option<StepReport>,
}

impl SuperstepController {
    /// Controller for the given run configuration
    #[must_use]
    pub const fn new(config: &EngineConfig) -> Self {
        Self {
            oracle: TerminationOracle::new(config.max_supersteps),
            completed: 0,
            last: None,
        }
    }

    /// Whether the next superstep should run
    #[must_use]
    pub fn should_run(&self) -> bool {
        self.oracle.should_continue(self.completed, self.last.as_ref())
    }

    /// Record a finished superstep
    pub fn record(&mut self, report: StepReport) {
        debug!(
            "superstep {} done: dangling_mass={:.6e} messages_sent={}",
            self.completed, report.dangling_mass, report.messages_sent
        );
        self.completed += 1;
        self.last = Some(report);
    }

    /// Run `backend` to termination
    ///
    /// # Errors
    ///
    /// Propagates the first superstep failure; nothing is retried
    pub fn run<S: Superstep + ?Sized>(&mut self, backend: &mut S) -> Result<()> {
        while self.should_run() {
            let report = backend.superstep()?;
            self.record(report);
        }
        Ok(())
    }

    /// Supersteps executed so far
    #[must_use]
    pub const fn completed(&self) -> usize {
        self.completed
    }

    /// Whether the run stopped because a round sent no messages
    #[must_use]
    pub fn quiesced(&self) -> bool {
        self.last.is_some_and(|report| !report.messages_sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sends messages for a fixed number of rounds, then goes quiet
    struct Scripted {
        active_rounds: usize,
        calls: usize,
    }

    impl Superstep for Scripted {
        fn superstep(&mut self) -> Result<StepReport> {
            self.calls += 1;
            Ok(StepReport {
                messages_sent: self.calls <= self.active_rounds,
                dangling_mass: 0.0,
            })
        }
    }

    #[test]
    fn test_budget_exhaustion() {
        let mut controller = SuperstepController::new(&EngineConfig::new(3));
        let mut backend = Scripted {
            active_rounds: usize::MAX,
            calls: 0,
        };

        controller.run(&mut backend).unwrap();

        assert_eq!(backend.calls, 3);
        assert_eq!(controller.completed(), 3);
        assert!(!controller.quiesced());
    }

    #[test]
    fn test_quiescence_halts_early() {
        // Quiet on round 3 → exactly 3 rounds run, whatever the budget
        for budget in [3, 4, 100] {
            let mut controller = SuperstepController::new(&EngineConfig::new(budget));
            let mut backend = Scripted {
                active_rounds: 2,
                calls: 0,
            };

            controller.run(&mut backend).unwrap();

            assert_eq!(backend.calls, 3, "budget {budget}");
            assert!(controller.quiesced());
        }
    }

    #[test]
    fn test_zero_budget_runs_nothing() {
        let mut controller = SuperstepController::new(&EngineConfig::new(0));
        let mut backend = Scripted {
            active_rounds: 1,
            calls: 0,
        };

        controller.run(&mut backend).unwrap();
        assert_eq!(backend.calls, 0);
        assert!(!controller.quiesced());
    }

    #[test]
    fn test_oracle() {
        let oracle = TerminationOracle::new(2);
        let quiet = StepReport {
            messages_sent: false,
            dangling_mass: 1.0,
        };
        let busy = StepReport {
            messages_sent: true,
            dangling_mass: 0.0,
        };

        assert!(oracle.should_continue(0, None));
        assert!(oracle.should_continue(1, Some(&busy)));
        assert!(!oracle.should_continue(1, Some(&quiet)));
        assert!(!oracle.should_continue(2, Some(&busy)));
    }
}
