//! Destinations for protocol output.
//!
//! The runner never writes to process-wide streams itself. Protocol lines
//! (results and `STATUS`) go to [`Sink::emit`]; human-facing diagnostics go to
//! [`Sink::diagnostic`]. The CLI wires these to stdout and stderr.
use std::fmt;
use std::io::Write;
use std::sync::mpsc::Sender;

use colored::Colorize;
use log::warn;

use crate::output::CrackedRecord;
use crate::progress::Status;

/// A line of the controller protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolLine {
    Cracked(CrackedRecord),
    Status(Status),
}

impl fmt::Display for ProtocolLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolLine::Cracked(rec) => fmt::Display::fmt(rec, f),
            ProtocolLine::Status(status) => fmt::Display::fmt(status, f),
        }
    }
}

pub trait Sink {
    fn emit(&mut self, line: ProtocolLine);

    fn diagnostic(&mut self, message: &str);
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn emit(&mut self, line: ProtocolLine) {
        (**self).emit(line);
    }

    fn diagnostic(&mut self, message: &str) {
        (**self).diagnostic(message);
    }
}

/// Writes protocol lines to one writer and diagnostics to another, flushing
/// after every protocol line so the controller sees results promptly.
pub struct WriterSink<O: Write, E: Write> {
    out: O,
    err: E,
    out_failed: bool,
    err_failed: bool,
}

impl<O: Write, E: Write> WriterSink<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            out_failed: false,
            err_failed: false,
        }
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl WriterSink<std::io::Stdout, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write, E: Write> Sink for WriterSink<O, E> {
    fn emit(&mut self, line: ProtocolLine) {
        let res = writeln!(self.out, "{}", line).and_then(|_| self.out.flush());
        if let Err(e) = res {
            // Report once; a closed controller pipe would otherwise flood the log.
            if !self.out_failed {
                warn!("failed to write protocol line: {}", e);
                self.out_failed = true;
            }
        }
    }

    fn diagnostic(&mut self, message: &str) {
        let res = writeln!(self.err, "{} {}", "error:".red().bold(), message)
            .and_then(|_| self.err.flush());
        if let Err(e) = res {
            if !self.err_failed {
                warn!("failed to write diagnostic {:?}: {}", message, e);
                self.err_failed = true;
            }
        }
    }
}

/// Collects everything in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub lines: Vec<ProtocolLine>,
    pub diagnostics: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self) -> Vec<Status> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                ProtocolLine::Status(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn cracked(&self) -> Vec<CrackedRecord> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                ProtocolLine::Cracked(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Sink for MemorySink {
    fn emit(&mut self, line: ProtocolLine) {
        self.lines.push(line);
    }

    fn diagnostic(&mut self, message: &str) {
        self.diagnostics.push(message.to_string());
    }
}

/// Event forwarded by [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Line(ProtocolLine),
    Diagnostic(String),
}

/// Forwards to a channel; used when the job runs on its own thread. Sends
/// after the receiver hangs up are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<SinkEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<SinkEvent>) -> Self {
        Self { tx }
    }
}

impl Sink for ChannelSink {
    fn emit(&mut self, line: ProtocolLine) {
        let _ = self.tx.send(SinkEvent::Line(line));
    }

    fn diagnostic(&mut self, message: &str) {
        let _ = self.tx.send(SinkEvent::Diagnostic(message.to_string()));
    }
}
