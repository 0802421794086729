//! Blocking condition polling with a deadline.
//!
//! Every readiness check in berth (deployment markers, server status) is a
//! [`ConditionPoller::wait_for`] call with a different sampler.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Shortest sleep between samples. A zero interval is raised to this.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Timeout and sampling interval for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollSettings {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub fn from_secs(timeout_secs: u64, interval_secs: u64) -> Self {
        Self::new(
            Duration::from_secs(timeout_secs),
            Duration::from_secs(interval_secs),
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of a wait. Timing out is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult<T> {
    Satisfied { value: T, elapsed: Duration },
    TimedOut {
        elapsed: Duration,
        /// Last sampled value, if any sample succeeded.
        last: Option<T>,
    },
}

impl<T> PollResult<T> {
    pub fn elapsed(&self) -> Duration {
        match self {
            PollResult::Satisfied { elapsed, .. } | PollResult::TimedOut { elapsed, .. } => {
                *elapsed
            }
        }
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollResult::Satisfied { .. })
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            PollResult::Satisfied { value, .. } => Some(value),
            PollResult::TimedOut { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConditionPoller {
    settings: PollSettings,
}

impl ConditionPoller {
    pub fn new(settings: PollSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Sample until `is_satisfied` accepts a value or the timeout elapses.
    ///
    /// The first sample is taken immediately. A sample that returns `Err`
    /// counts as "not yet satisfied" for that cycle and is only logged, so a
    /// sampler that always fails ends in [`PollResult::TimedOut`]. The final
    /// sleep is clamped to the remaining time, and one last sample is taken
    /// at the deadline.
    pub fn wait_for<T, S, C>(&self, mut sample: S, mut is_satisfied: C) -> PollResult<T>
    where
        S: FnMut() -> anyhow::Result<T>,
        C: FnMut(&T) -> bool,
    {
        let PollSettings { timeout, interval } = self.settings;
        let start = Instant::now();
        let mut last = None;
        let mut cycle = 0u32;

        loop {
            cycle += 1;
            match sample() {
                Ok(value) => {
                    if is_satisfied(&value) {
                        let elapsed = start.elapsed();
                        tracing::debug!(cycle, ?elapsed, "condition satisfied");
                        return PollResult::Satisfied { value, elapsed };
                    }
                    last = Some(value);
                }
                Err(err) => {
                    tracing::debug!(cycle, error = %err, "sample failed, retrying next cycle");
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                tracing::warn!(cycle, ?elapsed, ?timeout, "condition not met before timeout");
                return PollResult::TimedOut { elapsed, last };
            }

            let remaining = timeout - elapsed;
            std::thread::sleep(interval.max(MIN_INTERVAL).min(remaining));
        }
    }
}

/// Shorthand for a one-off [`ConditionPoller`].
pub fn wait_for<T, S, C>(settings: PollSettings, sample: S, is_satisfied: C) -> PollResult<T>
where
    S: FnMut() -> anyhow::Result<T>,
    C: FnMut(&T) -> bool,
{
    ConditionPoller::new(settings).wait_for(sample, is_satisfied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfied_value_is_returned() {
        let settings = PollSettings::new(Duration::from_millis(200), Duration::from_millis(10));
        let mut n = 0;
        let result = wait_for(
            settings,
            || {
                n += 1;
                Ok(n)
            },
            |v| *v == 3,
        );
        assert_eq!(result.into_value(), Some(3));
    }

    #[test]
    fn timed_out_keeps_last_sample() {
        let settings = PollSettings::new(Duration::from_millis(30), Duration::from_millis(10));
        let result = wait_for(settings, || Ok("STOPPED"), |s| *s == "STARTED");
        match result {
            PollResult::TimedOut { last, .. } => assert_eq!(last, Some("STOPPED")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn zero_interval_still_terminates() {
        let settings = PollSettings::new(Duration::from_millis(20), Duration::ZERO);
        let result = wait_for(settings, || Ok(false), |v| *v);
        assert!(!result.is_satisfied());
    }

    #[test]
    fn zero_interval_does_not_busy_loop() {
        let settings = PollSettings::new(Duration::from_millis(200), Duration::ZERO);
        let mut samples = 0u32;
        let result = wait_for(
            settings,
            || {
                samples += 1;
                Ok(())
            },
            |_| false,
        );
        assert!(!result.is_satisfied());
        // 200ms at the 10ms floor is about 21 samples
        assert!(samples <= 40, "sampled {samples} times");
    }
}
