//! Job orchestration: validates a [`JobSpec`], finds the MDXfind executable,
//! prepares the hash and salt files, and supervises the engine run.
//!
//! Typical usage:
//!
//! ```no_run
//! use mdxrun::engine::{Runner, run_job};
//! use mdxrun::job::{AttackMode, JobSpec};
//! use mdxrun::sink::WriterSink;
//! # fn main() -> Result<(), mdxrun::error::JobError> {
//! let spec = JobSpec::new(AttackMode::Wordlist, "/lists/words.txt", "/jobs/1/hashlist.txt");
//! let runner = Runner::discover()?;
//! let report = run_job(&spec, &runner, &mut WriterSink::stdio())?;
//! println!("{} cracked", report.run.cracked);
//! # Ok(())
//! # }
//! ```
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use log::{debug, info};

use crate::args::build_args;
use crate::error::{JobError, Result};
use crate::hashlist::{PreparedHashlist, preprocess};
use crate::io::DEFAULT_MMAP_THRESHOLD_BYTES;
use crate::job::{AttackMode, JobSpec};
use crate::sink::{ChannelSink, Sink, SinkEvent};
use crate::supervisor::{RunOutcome, SupervisorOptions, run_engine};

#[cfg(windows)]
const ENGINE_FILE_NAME: &str = "mdxfind.exe";
#[cfg(not(windows))]
const ENGINE_FILE_NAME: &str = "mdxfind";

/// Directory the engine ships in, next to (or one level above) our binary.
const ENGINE_DIR: &str = "mdx_bin";

/// Everything needed to run jobs on this worker besides the job itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runner {
    pub engine: PathBuf,
    pub options: SupervisorOptions,
    pub mmap_threshold_bytes: u64,
}

impl Runner {
    pub fn new(engine: impl Into<PathBuf>) -> Self {
        Self {
            engine: engine.into(),
            options: SupervisorOptions::default(),
            mmap_threshold_bytes: DEFAULT_MMAP_THRESHOLD_BYTES,
        }
    }

    /// Use the engine found by [`locate_engine`].
    pub fn discover() -> Result<Self> {
        Ok(Self::new(locate_engine()?))
    }

    /// Use an explicit engine path, which must exist.
    pub fn with_engine_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(JobError::EngineNotFound(vec![path]));
        }
        Ok(Self::new(path))
    }

    pub fn with_options(mut self, options: SupervisorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_mmap_threshold(mut self, bytes: u64) -> Self {
        self.mmap_threshold_bytes = bytes;
        self
    }
}

/// Places the engine is searched for, in order.
pub fn engine_candidates() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        out.push(dir.join("..").join(ENGINE_DIR).join(ENGINE_FILE_NAME));
        out.push(dir.join(ENGINE_DIR).join(ENGINE_FILE_NAME));
    }
    out.push(Path::new(".").join(ENGINE_DIR).join(ENGINE_FILE_NAME));
    out
}

/// First existing candidate, lexically cleaned.
pub fn locate_engine() -> Result<PathBuf> {
    locate_engine_in(&engine_candidates())
}

pub fn locate_engine_in(candidates: &[PathBuf]) -> Result<PathBuf> {
    candidates
        .iter()
        .find(|p| p.exists())
        .map(|p| clean_path(p))
        .ok_or_else(|| JobError::EngineNotFound(candidates.to_vec()))
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(comp),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Check the job before any file is written or process started. Checks run
/// in a fixed order and the first failure wins.
pub fn validate(spec: &JobSpec) -> Result<()> {
    if spec.mode.needs_target() && spec.attack.is_empty() {
        return Err(JobError::MissingAttackTarget(spec.mode));
    }
    if spec.hashlist.as_os_str().is_empty() {
        return Err(JobError::MissingHashlist);
    }
    if spec.mode == AttackMode::Mask {
        return Err(JobError::Unsupported(AttackMode::Mask));
    }
    if !spec.hashlist.exists() {
        return Err(JobError::HashlistNotFound(spec.hashlist.clone()));
    }
    if let Some(wordlist) = spec.wordlist() {
        let path = PathBuf::from(wordlist);
        if !path.exists() {
            return Err(JobError::WordlistNotFound(path));
        }
    }
    Ok(())
}

/// What a finished job produced besides its protocol lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub prepared: PreparedHashlist,
    pub run: RunOutcome,
}

/// Run one job to completion (or timeout), streaming protocol lines to
/// `sink`. Fatal errors are also reported on the sink's diagnostic channel.
pub fn run_job<S: Sink>(spec: &JobSpec, runner: &Runner, sink: &mut S) -> Result<JobReport> {
    let res = run_job_inner(spec, runner, sink);
    if let Err(e) = &res {
        sink.diagnostic(&e.to_string());
    }
    res
}

fn run_job_inner<S: Sink>(spec: &JobSpec, runner: &Runner, sink: &mut S) -> Result<JobReport> {
    validate(spec)?;
    if !runner.engine.exists() {
        return Err(JobError::EngineNotFound(vec![runner.engine.clone()]));
    }

    let prepared = preprocess(&spec.hashlist, runner.mmap_threshold_bytes)?;
    let args = build_args(spec, &prepared);
    info!(
        "running {} job with {} ({} args)",
        spec.mode,
        runner.engine.display(),
        args.len()
    );
    debug!("engine args: {:?}", args);

    let run = run_engine(&runner.engine, &args, spec, &runner.options, sink)?;
    info!(
        "job finished: {:?}, {} lines, {} cracked in {:.1}s",
        run.status,
        run.lines_processed,
        run.cracked,
        run.elapsed.as_secs_f64()
    );
    Ok(JobReport { prepared, run })
}

/// Run a job on its own thread. Protocol lines and diagnostics arrive on the
/// returned channel; the handle yields the outcome.
pub fn spawn_job(
    spec: JobSpec,
    runner: Runner,
) -> std::io::Result<(Receiver<SinkEvent>, JoinHandle<Result<JobReport>>)> {
    let (tx, rx) = mpsc::channel();
    let handle = thread::Builder::new()
        .name("mdxrun-job".to_string())
        .spawn(move || {
            let mut sink = ChannelSink::new(tx);
            run_job(&spec, &runner, &mut sink)
        })?;
    Ok((rx, handle))
}
