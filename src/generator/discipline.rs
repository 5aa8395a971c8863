use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConflictingDisciplineSnafu};

/// How a task relates to the send it performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discipline {
    /// Running a task returns only once its send finished and was recorded.
    /// Paired with `n` workers this keeps `n` requests in flight.
    Concurrency,
    /// Running a task dispatches the send and returns at once.
    /// Paired with a ticker producing `n` tasks per tick this issues `n`
    /// requests per tick regardless of response times.
    Throughput,
}

impl Discipline {
    /// Resolves two mutually exclusive switches.
    pub fn from_flags(concurrency: bool, throughput: bool) -> Result<Self, ConfigError> {
        match (concurrency, throughput) {
            (true, false) => Ok(Discipline::Concurrency),
            (false, true) => Ok(Discipline::Throughput),
            _ => ConflictingDisciplineSnafu {
                concurrency,
                throughput,
            }
            .fail(),
        }
    }

    pub const fn waits_for_completion(&self) -> bool {
        matches!(self, Discipline::Concurrency)
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discipline::Concurrency => f.write_str("concurrency"),
            Discipline::Throughput => f.write_str("throughput"),
        }
    }
}
