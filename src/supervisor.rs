//! Engine process supervision.
//!
//! A run moves through `NotStarted -> Running -> {Completed | TimedOut}`; a
//! launch failure is reported as [`JobError::ProcessStart`] before anything is
//! read. While running, one loop owns the child handle, the output buffer, and
//! the [`RunState`]:
//!
//! - a complete buffered line is parsed and counted;
//! - otherwise the loop blocks on the output channel for at most
//!   [`SupervisorOptions::poll_interval`];
//! - every cycle checks the report window and the timeout.
//!
//! On timeout the engine gets one terminate request, a bounded grace period,
//! and a kill if it is still alive. One final status is emitted and nothing
//! more is read. On normal exit every remaining byte is drained and parsed
//! before the single `STATUS 10000 0`.
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::{JobError, Result};
use crate::io::LineBuffer;
use crate::job::JobSpec;
use crate::output::parse_engine_line;
use crate::progress::{self, RunState, Status};
use crate::sink::{ProtocolLine, Sink};

/// Timing knobs for one supervised run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorOptions {
    /// Longest wait for new output before re-checking the process.
    pub poll_interval: Duration,
    /// Minimum time between periodic `STATUS` lines.
    pub report_interval: Duration,
    /// How long a terminated engine may take to exit before it is killed.
    pub grace_period: Duration,
    /// Bound on collecting trailing output after the engine has exited.
    pub drain_timeout: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            report_interval: Duration::from_secs(5),
            grace_period: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    TimedOut,
}

/// How a timed-out engine was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The engine had already exited; no signal was sent.
    AlreadyExited,
    Graceful,
    Killed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub lines_processed: u64,
    pub cracked: u64,
    pub elapsed: Duration,
    /// Set only for timed-out runs.
    pub termination: Option<Termination>,
}

/// Lifecycle control over a running engine.
pub trait ChildControl {
    /// Non-blocking liveness check. A failed check counts as exited.
    fn has_exited(&mut self) -> bool;

    /// Ask the engine to stop (SIGTERM on unix).
    fn terminate(&mut self) -> io::Result<()>;

    /// Force the engine to stop and reap it.
    fn kill(&mut self) -> io::Result<()>;
}

/// A spawned MDXfind process.
#[derive(Debug)]
pub struct EngineChild {
    child: Child,
    status: Option<ExitStatus>,
}

impl EngineChild {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.status
    }
}

impl ChildControl for EngineChild {
    fn has_exited(&mut self) -> bool {
        if self.status.is_some() {
            return true;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!("engine exited with {}", status);
                self.status = Some(status);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("failed to poll engine process: {}", e);
                true
            }
        }
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        // A reaped pid may already belong to another process.
        if self.status.is_some() {
            return Ok(());
        }
        let pid = Pid::from_raw(self.child.id() as i32);
        kill(pid, Signal::SIGTERM).map_err(io::Error::from)
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        if self.status.is_some() {
            return Ok(());
        }
        self.child.kill()
    }

    fn kill(&mut self) -> io::Result<()> {
        if self.status.is_none() {
            self.child.kill()?;
            self.status = Some(self.child.wait()?);
        }
        Ok(())
    }
}

impl Drop for EngineChild {
    fn drop(&mut self) {
        if !self.has_exited() {
            let _ = self.kill();
        }
    }
}

/// Launch `program` with stdout and stderr merged into one pipe.
///
/// Returns the child and a channel of raw output chunks. The channel
/// disconnects once every writer of the pipe has closed it.
pub fn spawn_engine(program: &Path, args: &[OsString]) -> Result<(EngineChild, Receiver<Vec<u8>>)> {
    let start_err = |source: io::Error| JobError::ProcessStart {
        program: program.to_path_buf(),
        source,
    };

    let (reader, writer) = io::pipe().map_err(start_err)?;
    let writer_err = writer.try_clone().map_err(start_err)?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(writer)
        .stderr(writer_err);
    let child = cmd.spawn().map_err(start_err)?;
    // The command still holds our copies of the write end; drop them so the
    // reader sees EOF when the engine exits.
    drop(cmd);

    let mut child = EngineChild {
        child,
        status: None,
    };
    info!("started MDXfind pid {}", child.id());

    let (tx, rx) = mpsc::channel();
    let pump = thread::Builder::new()
        .name("mdxfind-output".to_string())
        .spawn(move || pump_output(reader, tx));
    if let Err(source) = pump {
        let _ = child.kill();
        return Err(start_err(source));
    }
    Ok((child, rx))
}

fn pump_output<R: Read>(mut reader: R, tx: Sender<Vec<u8>>) {
    let mut buf = vec![0u8; 8 * 1024];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("engine output read failed: {}", e);
                break;
            }
        }
    }
}

/// Parse one engine line, emitting a result if it is one.
fn handle_line<S: Sink>(line: &str, sink: &mut S) -> bool {
    match parse_engine_line(line) {
        Some(record) => {
            sink.emit(ProtocolLine::Cracked(record));
            true
        }
        None => false,
    }
}

/// Drive a running engine until it exits or the job's timeout fires.
pub fn supervise<C, S>(
    child: &mut C,
    output: &Receiver<Vec<u8>>,
    spec: &JobSpec,
    opts: &SupervisorOptions,
    sink: &mut S,
) -> RunOutcome
where
    C: ChildControl,
    S: Sink,
{
    let mut state = RunState::new(Instant::now());
    let mut buffer = LineBuffer::new();
    let mut cracked: u64 = 0;
    let mut stream_open = true;
    let mut exited = false;

    loop {
        if let Some(line) = buffer.next_line() {
            if handle_line(&line, sink) {
                cracked += 1;
            }
            state.lines_processed += 1;
        } else if exited {
            break;
        } else {
            if stream_open {
                match output.recv_timeout(opts.poll_interval) {
                    Ok(chunk) => {
                        buffer.extend(&chunk);
                        stream_open = take_queued(output, &mut buffer);
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => stream_open = false,
                }
            } else {
                thread::sleep(opts.poll_interval);
            }
            exited = child.has_exited();
        }

        let now = Instant::now();
        if state.since_report(now) >= opts.report_interval {
            let status = progress::report(&mut state, spec.length, now);
            sink.emit(ProtocolLine::Status(status));
        }

        if spec.timeout.is_some_and(|limit| state.elapsed(now) >= limit) {
            info!(
                "timeout after {:?}; stopping engine ({} lines, {} cracked)",
                state.elapsed(now),
                state.lines_processed,
                cracked
            );
            let termination = stop_engine(child, opts);
            let now = Instant::now();
            let status = progress::report(&mut state, spec.length, now);
            sink.emit(ProtocolLine::Status(status));
            return RunOutcome {
                status: RunStatus::TimedOut,
                lines_processed: state.lines_processed,
                cracked,
                elapsed: state.elapsed(now),
                termination: Some(termination),
            };
        }
    }

    if stream_open {
        collect_remaining(output, &mut buffer, opts.drain_timeout);
    }
    let tail = buffer.drain();
    debug!("draining {} trailing output lines", tail.len());
    for line in &tail {
        let line = line.trim();
        if !line.is_empty() && handle_line(line, sink) {
            cracked += 1;
        }
    }
    sink.emit(ProtocolLine::Status(Status::COMPLETE));

    RunOutcome {
        status: RunStatus::Completed,
        lines_processed: state.lines_processed,
        cracked,
        elapsed: state.elapsed(Instant::now()),
        termination: None,
    }
}

/// Move already-queued chunks into `buffer` without waiting. Returns false
/// once the pipe has closed.
fn take_queued(output: &Receiver<Vec<u8>>, buffer: &mut LineBuffer) -> bool {
    loop {
        match output.try_recv() {
            Ok(chunk) => buffer.extend(&chunk),
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Disconnected) => return false,
        }
    }
}

/// Pull queued output until the pipe closes or `limit` passes. A grandchild
/// holding the pipe open must not stall the run.
fn collect_remaining(output: &Receiver<Vec<u8>>, buffer: &mut LineBuffer, limit: Duration) {
    let deadline = Instant::now() + limit;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match output.recv_timeout(left) {
            Ok(chunk) => buffer.extend(&chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                warn!("engine output still open {:?} after exit; ignoring the rest", limit);
                break;
            }
        }
    }
}

/// Terminate, wait up to the grace period, then kill. An engine that has
/// already exited is left alone.
fn stop_engine<C: ChildControl>(child: &mut C, opts: &SupervisorOptions) -> Termination {
    if child.has_exited() {
        debug!("engine already exited; nothing to stop");
        return Termination::AlreadyExited;
    }
    if let Err(e) = child.terminate() {
        warn!("failed to terminate engine: {}", e);
    }
    let deadline = Instant::now() + opts.grace_period;
    loop {
        if child.has_exited() {
            return Termination::Graceful;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }
        thread::sleep(left.min(opts.poll_interval));
    }
    warn!("engine still running {:?} after terminate; killing", opts.grace_period);
    if let Err(e) = child.kill() {
        warn!("failed to kill engine: {}", e);
    }
    Termination::Killed
}

/// Spawn the engine and supervise it to completion or timeout.
pub fn run_engine<S: Sink>(
    program: &Path,
    args: &[OsString],
    spec: &JobSpec,
    opts: &SupervisorOptions,
    sink: &mut S,
) -> Result<RunOutcome> {
    let (mut child, output) = spawn_engine(program, args)?;
    let outcome = supervise(&mut child, &output, spec, opts, sink);
    if let Some(status) = child.exit_status() {
        info!("MDXfind finished: {}", status);
    }
    Ok(outcome)
}
