//! Batch lifecycle state and the reconfiguration countdown.
//!
//! ```text
//! Constructed --reconfigure--> Configured --reset--> Ready
//!                                   ^                  |
//!                                   +---reconfigure----+
//! any --close--> Closed          any --failed rebuild--> Faulted
//! ```

use simbatch_core::{Result, SimError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Built, never configured.
    Constructed,
    /// Scene rebuilt; no reset has completed on it yet.
    Configured,
    /// At least one reset completed; stepping allowed.
    Ready,
    Closed,
    /// A rebuild failed part way; the batch must be recreated.
    Faulted,
}

/// Tracks [`LifecycleState`] and when the next mandatory rebuild is due.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: LifecycleState,
    frequency: u32,
    countdown: u32,
    reconfigurations: u64,
}

impl Lifecycle {
    /// `frequency` resets per rebuild; 0 rebuilds only on request.
    pub fn new(frequency: u32) -> Self {
        Self {
            state: LifecycleState::Constructed,
            frequency,
            countdown: 0,
            reconfigurations: 0,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Resets left before the next scheduled rebuild.
    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    /// Number of completed rebuilds.
    pub fn reconfigurations(&self) -> u64 {
        self.reconfigurations
    }

    /// Whether the current reset must rebuild the scene.
    pub fn needs_reconfigure(&self, requested: bool) -> bool {
        requested
            || self.state == LifecycleState::Constructed
            || (self.frequency != 0 && self.countdown == 0)
    }

    /// Fail unless a reset may start.
    pub fn check_can_reset(&self) -> Result<()> {
        match self.state {
            LifecycleState::Closed => Err(SimError::state("reset called on a closed batch")),
            LifecycleState::Faulted => Err(SimError::state(
                "reset called after a failed reconfigure; recreate the batch",
            )),
            _ => Ok(()),
        }
    }

    /// Fail unless a reset has completed on the current scene.
    pub fn check_ready(&self, call: &str) -> Result<()> {
        match self.state {
            LifecycleState::Ready => Ok(()),
            LifecycleState::Closed => Err(SimError::state(format!("{} called on a closed batch", call))),
            LifecycleState::Faulted => Err(SimError::state(format!(
                "{} called after a failed reconfigure",
                call
            ))),
            LifecycleState::Constructed | LifecycleState::Configured => Err(SimError::state(format!(
                "{} called before reset completed",
                call
            ))),
        }
    }

    /// Fail unless a scene exists (configured or ready).
    pub fn check_configured(&self, call: &str) -> Result<()> {
        match self.state {
            LifecycleState::Configured | LifecycleState::Ready => Ok(()),
            _ => self.check_ready(call),
        }
    }

    pub fn mark_reconfigured(&mut self) {
        self.countdown = self.frequency;
        self.reconfigurations += 1;
        self.state = LifecycleState::Configured;
    }

    /// Record a completed reset.
    pub fn finish_reset(&mut self) {
        if self.frequency != 0 {
            self.countdown = self.countdown.saturating_sub(1);
        }
        self.state = LifecycleState::Ready;
    }

    pub fn mark_faulted(&mut self) {
        self.state = LifecycleState::Faulted;
    }

    /// Returns false if the batch was already closed.
    pub fn close(&mut self) -> bool {
        let was_open = self.state != LifecycleState::Closed;
        self.state = LifecycleState::Closed;
        was_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_resets(lc: &mut Lifecycle, n: usize) -> Vec<bool> {
        (0..n)
            .map(|_| {
                let rebuild = lc.needs_reconfigure(false);
                if rebuild {
                    lc.mark_reconfigured();
                }
                lc.finish_reset();
                rebuild
            })
            .collect()
    }

    #[test]
    fn test_frequency_two_rebuilds_first_and_third() {
        let mut lc = Lifecycle::new(2);
        assert_eq!(run_resets(&mut lc, 5), vec![true, false, true, false, true]);
    }

    #[test]
    fn test_frequency_zero_rebuilds_only_first() {
        let mut lc = Lifecycle::new(0);
        assert_eq!(run_resets(&mut lc, 4), vec![true, false, false, false]);
        assert!(lc.needs_reconfigure(true));
    }

    #[test]
    fn test_frequency_one_rebuilds_every_reset() {
        let mut lc = Lifecycle::new(1);
        assert_eq!(run_resets(&mut lc, 3), vec![true, true, true]);
    }

    #[test]
    fn test_step_requires_completed_reset() {
        let mut lc = Lifecycle::new(0);
        assert!(lc.check_ready("step").is_err());
        lc.mark_reconfigured();
        assert!(lc.check_ready("step").is_err());
        assert!(lc.check_configured("get_state").is_ok());
        lc.finish_reset();
        assert!(lc.check_ready("step").is_ok());
    }

    #[test]
    fn test_closed_and_faulted_reject_everything() {
        let mut lc = Lifecycle::new(0);
        lc.mark_faulted();
        assert!(lc.check_can_reset().is_err());
        assert!(lc.close());
        assert!(!lc.close());
        assert!(lc.check_ready("step").is_err());
    }
}
