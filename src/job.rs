//! Job description handed to a single runner.
//!
//! A [`JobSpec`] is built once (by the CLI or an embedding controller) and is
//! never mutated after [`crate::engine::run_job`] starts. Numeric limits use
//! zero to mean "not configured", matching the controller's wire format.
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::JobError;

/// Hash-type filter passed to the engine when the controller supplies none.
pub const DEFAULT_HASH_TYPE: &str = "ALL,!user,salt";
/// Iteration count passed to the engine when the controller supplies none.
pub const DEFAULT_ITERATIONS: u32 = 10;

/// How the engine generates candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttackMode {
    /// Hash identification only; no candidate source.
    Identify,
    /// Pattern-based generation. Recognized but not supported yet.
    Mask,
    /// Candidates read from a wordlist file.
    Wordlist,
}

impl AttackMode {
    /// Numeric code used by the controller protocol.
    pub fn code(self) -> i64 {
        match self {
            AttackMode::Identify => 0,
            AttackMode::Mask => 1,
            AttackMode::Wordlist => 2,
        }
    }

    /// Whether the mode needs an attack target (wordlist or mask).
    pub fn needs_target(self) -> bool {
        !matches!(self, AttackMode::Identify)
    }
}

impl TryFrom<i64> for AttackMode {
    type Error = JobError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(AttackMode::Identify),
            1 => Ok(AttackMode::Mask),
            2 => Ok(AttackMode::Wordlist),
            other => Err(JobError::UnknownAttackMode(other)),
        }
    }
}

impl fmt::Display for AttackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttackMode::Identify => "identify",
            AttackMode::Mask => "mask",
            AttackMode::Wordlist => "wordlist",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub mode: AttackMode,
    /// Wordlist path (or mask) for modes that need one. Empty when absent.
    pub attack: String,
    pub hashlist: PathBuf,
    /// Offset into the candidate space, forwarded to the engine as `-w`.
    pub skip: u64,
    /// Candidate count used for progress estimation only.
    pub length: u64,
    pub timeout: Option<Duration>,
    pub hash_type: String,
    pub iterations: u32,
}

impl JobSpec {
    /// A job with the default hash-type filter and iteration count and no
    /// limits.
    pub fn new(mode: AttackMode, attack: impl Into<String>, hashlist: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            attack: attack.into(),
            hashlist: hashlist.into(),
            skip: 0,
            length: 0,
            timeout: None,
            hash_type: DEFAULT_HASH_TYPE.to_string(),
            iterations: DEFAULT_ITERATIONS,
        }
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = length;
        self
    }

    /// A zero duration disables the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() { None } else { Some(timeout) };
        self
    }

    pub fn with_hash_type(mut self, hash_type: impl Into<String>) -> Self {
        self.hash_type = hash_type.into();
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// The wordlist path, only for wordlist jobs.
    pub fn wordlist(&self) -> Option<&str> {
        match self.mode {
            AttackMode::Wordlist => Some(self.attack.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attack_mode_codes_round_trip_and_reject_unknown() {
        for mode in [AttackMode::Identify, AttackMode::Mask, AttackMode::Wordlist] {
            assert_eq!(AttackMode::try_from(mode.code()).unwrap(), mode);
        }
        assert!(matches!(
            AttackMode::try_from(7),
            Err(JobError::UnknownAttackMode(7))
        ));
        assert!(AttackMode::try_from(-1).is_err());
    }

    #[test]
    fn new_spec_uses_worker_defaults() {
        let spec = JobSpec::new(AttackMode::Identify, "", "list.txt");
        assert_eq!(spec.hash_type, "ALL,!user,salt");
        assert_eq!(spec.iterations, 10);
        assert_eq!(spec.timeout, None);
        assert_eq!(spec.wordlist(), None);
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let spec = JobSpec::new(AttackMode::Wordlist, "words.txt", "list.txt")
            .with_timeout(Duration::ZERO);
        assert_eq!(spec.timeout, None);
        assert_eq!(spec.wordlist(), Some("words.txt"));
    }
}
