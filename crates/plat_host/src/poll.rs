//! Bounded polling of engine state.
//!
//! Engines are started and stopped through CSR writes and then observed
//! through the enabled and active masks. Every wait is bounded so that a
//! hung engine becomes a [`HarnessError::Hang`] instead of a stuck test.

use crate::csr::{CsrBackend, CsrManager};
use crate::error::{HarnessError, Result};
use std::thread;
use std::time::Duration;
use tracing::trace;

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between failed polls.
    pub interval: Duration,
    /// Failed polls tolerated before giving up.
    pub max_trips: u32,
}

impl PollPolicy {
    /// Timing for real hardware.
    pub const fn hardware() -> Self {
        Self {
            interval: Duration::from_millis(1),
            max_trips: 10,
        }
    }

    /// Timing for an RTL simulation.
    pub const fn simulation() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_trips: 10,
        }
    }
}

/// Calls `cond` until it returns `true`, sleeping between attempts.
///
/// Returns the number of failed polls before success, or
/// [`HarnessError::Hang`] once `max_trips` polls have failed. Errors from
/// `cond` are returned immediately.
pub fn poll_until<F>(policy: &PollPolicy, mut cond: F) -> Result<u32>
where
    F: FnMut() -> Result<bool>,
{
    let mut trips = 0;
    loop {
        if cond()? {
            return Ok(trips);
        }

        trips += 1;
        if trips >= policy.max_trips {
            return Err(HarnessError::Hang { trips });
        }
        thread::sleep(policy.interval);
    }
}

/// Waits for the engines in `engine_mask` to finish a started run.
///
/// Checking the enabled mask resolves the race between the request to start
/// an engine and its active flag going high: a run is done once some engine
/// is enabled and none of the selected engines is active.
pub fn wait_engines_done<B: CsrBackend>(
    csr: &mut CsrManager<B>,
    engine_mask: u64,
    policy: &PollPolicy,
) -> Result<u32> {
    poll_until(policy, || {
        let enabled = csr.engines_enabled()?;
        let active = csr.engines_active()?;
        trace!(enabled, active, "polling for completion");
        Ok(enabled != 0 && active & engine_mask == 0)
    })
}

/// Waits until at least one engine reports enabled.
pub fn wait_engines_started<B: CsrBackend>(csr: &mut CsrManager<B>, policy: &PollPolicy) -> Result<u32> {
    poll_until(policy, || Ok(csr.engines_enabled()? != 0))
}

/// Waits until no engine has requests in flight.
pub fn wait_engines_idle<B: CsrBackend>(csr: &mut CsrManager<B>, policy: &PollPolicy) -> Result<u32> {
    poll_until(policy, || Ok(csr.engines_active()? == 0))
}
