//! Failure kinds for a single job run.
//!
//! Every variant is fatal and is raised before the engine produces any result;
//! a timeout is not an error and is reported through
//! [`crate::supervisor::RunStatus::TimedOut`] instead.
use std::io;
use std::path::PathBuf;

use crate::job::AttackMode;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("invalid attack type: {0}")]
    UnknownAttackMode(i64),

    #[error("attack type {0} requires an attack input")]
    MissingAttackTarget(AttackMode),

    #[error("no hashlist provided")]
    MissingHashlist,

    #[error("hashlist file does not exist: {}", .0.display())]
    HashlistNotFound(PathBuf),

    #[error("wordlist file does not exist: {}", .0.display())]
    WordlistNotFound(PathBuf),

    #[error("attack type {0} is not supported yet")]
    Unsupported(AttackMode),

    #[error("MDXfind executable not found (searched: {})", display_paths(.0))]
    EngineNotFound(Vec<PathBuf>),

    #[error("failed to open hashlist {}: {source}", path.display())]
    OpenHashlist { path: PathBuf, source: io::Error },

    #[error("failed to read hashlist {}: {source}", path.display())]
    ReadHashlist { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", path.display())]
    WriteDerived { path: PathBuf, source: io::Error },

    #[error("failed to start MDXfind ({}): {source}", program.display())]
    ProcessStart { program: PathBuf, source: io::Error },
}

impl JobError {
    /// Process exit code the CLI uses for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            JobError::UnknownAttackMode(_)
            | JobError::MissingAttackTarget(_)
            | JobError::MissingHashlist => 2,
            JobError::HashlistNotFound(_) | JobError::WordlistNotFound(_) => 3,
            JobError::Unsupported(_) => 4,
            JobError::EngineNotFound(_) => 5,
            JobError::OpenHashlist { .. }
            | JobError::ReadHashlist { .. }
            | JobError::WriteDerived { .. } => 6,
            JobError::ProcessStart { .. } => 7,
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, JobError>;
