use serde::{Deserialize, Serialize};
use std::fmt;

/// Correlation id pairing a request with its response.
///
/// `u64::MAX` is the "no job" sentinel carried by every header until a job
/// is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    pub const NONE: JobId = JobId(u64::MAX);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::NONE
    }
}

impl From<u64> for JobId {
    fn from(raw: u64) -> Self {
        JobId(raw)
    }
}

impl From<JobId> for u64 {
    fn from(job: JobId) -> u64 {
        job.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("(none)")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_none() {
        assert!(JobId::default().is_none());
        assert_eq!(JobId::default().to_string(), "(none)");
        assert_eq!(JobId(42).to_string(), "42");
    }
}
