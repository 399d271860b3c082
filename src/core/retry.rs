//! Bounded readiness polling with an injectable clock.

use std::time::Duration;

use tracing::trace;

use crate::core::constants;
use crate::error::Result;

/// Source of waiting. Tests substitute a clock that only records.
pub trait Clock {
    fn sleep(&self, duration: Duration);
}

/// Wall-clock sleeping via `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Fixed-delay polling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait once before the first probe.
    pub settle: Duration,
    /// Upper bound on probes.
    pub attempts: u32,
    /// Wait between probes.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Policy for newly created management groups.
    pub fn management_group() -> Self {
        Self {
            settle: constants::MANAGEMENT_GROUP_SETTLE,
            attempts: constants::MANAGEMENT_GROUP_ATTEMPTS,
            delay: constants::MANAGEMENT_GROUP_DELAY,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::management_group()
    }
}

/// Outcome of [`poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready { attempts: u32 },
    NotReady { attempts: u32 },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }
}

/// Probe `ready` until it returns `true` or the policy runs out.
///
/// Exhausting the attempts is not an error; the caller decides what a
/// not-ready resource means. Errors from the probe itself propagate.
pub fn poll<F>(policy: &RetryPolicy, clock: &dyn Clock, mut ready: F) -> Result<Readiness>
where
    F: FnMut() -> Result<bool>,
{
    clock.sleep(policy.settle);

    for attempt in 1..=policy.attempts {
        trace!(attempt, max = policy.attempts, "readiness probe");
        if ready()? {
            return Ok(Readiness::Ready { attempts: attempt });
        }
        if attempt < policy.attempts {
            clock.sleep(policy.delay);
        }
    }

    Ok(Readiness::NotReady {
        attempts: policy.attempts,
    })
}
