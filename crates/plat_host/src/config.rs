//! Runtime configuration of the test harness.

use crate::poll::PollPolicy;
use std::time::Duration;

/// Settings shared by every test run.
///
/// Built from command-line flags. When the target is an RTL simulation
/// (ASE) everything runs orders of magnitude slower, so polling backs off
/// and bandwidth runs last longer.
#[derive(Debug, Clone, Copy)]
pub struct HarnessConfig {
    /// Polling used while waiting for engines.
    pub poll: PollPolicy,
    /// How long engines run during a bandwidth measurement.
    pub run_time: Duration,
    /// Target is an RTL simulation.
    pub simulation: bool,
}

impl HarnessConfig {
    pub fn new(simulation: bool) -> Self {
        if simulation {
            Self {
                poll: PollPolicy::simulation(),
                run_time: Duration::from_secs(10),
                simulation,
            }
        } else {
            Self {
                poll: PollPolicy::hardware(),
                run_time: Duration::from_secs(1),
                simulation,
            }
        }
    }

    /// Overrides the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll.interval = interval;
        self
    }

    /// Overrides the number of polls before an engine is declared hung.
    pub fn with_max_polls(mut self, max_trips: u32) -> Self {
        self.poll.max_trips = max_trips.max(1);
        self
    }

    pub fn with_run_time(mut self, run_time: Duration) -> Self {
        self.run_time = run_time;
        self
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_polls_slower() {
        let hw = HarnessConfig::new(false);
        let sim = HarnessConfig::new(true);
        assert!(sim.poll.interval > hw.poll.interval);
        assert!(sim.run_time > hw.run_time);
        assert_eq!(hw.poll.max_trips, sim.poll.max_trips);
    }

    #[test]
    fn overrides() {
        let cfg = HarnessConfig::default()
            .with_poll_interval(Duration::ZERO)
            .with_max_polls(0)
            .with_run_time(Duration::from_millis(5));
        assert_eq!(cfg.poll.interval, Duration::ZERO);
        assert_eq!(cfg.poll.max_trips, 1);
        assert_eq!(cfg.run_time, Duration::from_millis(5));
    }
}
