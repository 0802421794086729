//! Tri-state outcome shared by every polled operation.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

/// Result of a deploy, undeploy, start or stop.
///
/// `TimedOutUnknown` is never folded into `Failed`: the operation may still
/// complete after the caller stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Confirmed,
    Failed,
    TimedOutUnknown,
}

impl Outcome {
    pub fn is_confirmed(self) -> bool {
        self == Outcome::Confirmed
    }

    /// Process exit code for CLI commands. Both non-confirmed outcomes are
    /// non-zero.
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Confirmed => 0,
            Outcome::Failed => 1,
            Outcome::TimedOutUnknown => 2,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Confirmed => "CONFIRMED",
            Outcome::Failed => "FAILED",
            Outcome::TimedOutUnknown => "TIMED_OUT",
        };
        f.write_str(label)
    }
}

pub(crate) fn serialize_millis<S: Serializer>(elapsed: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}
