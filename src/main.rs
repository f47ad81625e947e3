//! CLI entrypoint for `mdxrun`.
//!
//! Runs a single MDXfind job for a controller: validates the job, splits the
//! hashlist into hash and salt files, supervises the engine, and writes
//! protocol lines (`hash:plaintext:hashtype` and `STATUS <progress> <speed>`)
//! to stdout. Logs and diagnostics go to stderr.
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use log::{LevelFilter, info, warn};
use mdxrun::{
    engine::{Runner, run_job},
    error::JobError,
    io::DEFAULT_MMAP_THRESHOLD_BYTES,
    job::{AttackMode, DEFAULT_HASH_TYPE, DEFAULT_ITERATIONS, JobSpec},
    sink::{Sink, WriterSink},
    supervisor::SupervisorOptions,
};

#[derive(Parser, Debug)]
#[command(
    name = "mdxrun",
    version,
    about = "Run one MDXfind job and stream results to a controller"
)]
struct Args {
    /// Attack type: 0 = hash identification, 1 = mask, 2 = wordlist
    #[arg(short = 't', long = "type", default_value_t = 0, allow_negative_numbers = true)]
    attack_type: i64,

    /// Attack input (wordlist path for type 2)
    #[arg(short = 'a', long = "attack", default_value = "")]
    attack: String,

    /// Path to the hashlist (hash, hash:salt, or hash:salt:plaintext lines)
    #[arg(short = 'l', long = "hashlist")]
    hashlist: Option<PathBuf>,

    /// Offset into the candidate space
    #[arg(short = 's', long = "skip", default_value_t = 0)]
    skip: u64,

    /// Candidate count, used to estimate progress
    #[arg(short = 'n', long = "length", default_value_t = 0)]
    length: u64,

    /// Stop the engine after this many seconds (0 = no limit)
    #[arg(long = "timeout", default_value_t = 0)]
    timeout: u64,

    /// MDXfind hash-type filter (-h)
    #[arg(long = "hash-type", default_value = DEFAULT_HASH_TYPE)]
    hash_type: String,

    /// MDXfind iteration count (-i and -q)
    #[arg(long = "iterations", default_value_t = DEFAULT_ITERATIONS)]
    iterations: u32,

    /// Path to the MDXfind executable (default: search mdx_bin/)
    #[arg(long = "engine")]
    engine: Option<PathBuf>,

    /// Seconds between STATUS lines
    #[arg(long = "report-interval", default_value_t = 5)]
    report_interval: u64,

    /// Seconds a terminated engine gets before it is killed
    #[arg(long = "grace-period", default_value_t = 5)]
    grace_period: u64,

    /// Override mmap threshold in bytes for reading the hashlist. If zero, disable mmap.
    #[arg(long = "mmap-threshold", default_value_t = DEFAULT_MMAP_THRESHOLD_BYTES)]
    mmap_threshold: u64,

    /// Log counts of each hashlist line shape after preprocessing
    #[arg(long = "log-parse-stats")]
    log_parse_stats: bool,

    /// Control color of diagnostics (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

/// Sanity checks on the CLI values themselves; job semantics are checked by
/// the library.
fn verify_args(args: &Args) -> Result<()> {
    if args.report_interval == 0 {
        bail!("--report-interval must be at least one second");
    }
    if args.attack_type == AttackMode::Identify.code() && !args.attack.is_empty() {
        warn!("attack input {:?} is ignored for hash identification", args.attack);
    }
    if args.length == 0 && args.skip > 0 {
        warn!("--skip without --length: progress will stay at 0");
    }
    Ok(())
}

fn job_from_args(args: &Args) -> std::result::Result<JobSpec, JobError> {
    let mode = AttackMode::try_from(args.attack_type)?;
    let hashlist = args.hashlist.clone().unwrap_or_default();
    Ok(JobSpec::new(mode, args.attack.clone(), hashlist)
        .with_skip(args.skip)
        .with_length(args.length)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_hash_type(args.hash_type.clone())
        .with_iterations(args.iterations))
}

fn runner_from_args(args: &Args) -> std::result::Result<Runner, JobError> {
    let runner = match &args.engine {
        Some(path) => Runner::with_engine_path(path)?,
        None => Runner::discover()?,
    };
    let threshold = if args.mmap_threshold == 0 {
        u64::MAX
    } else {
        args.mmap_threshold
    };
    Ok(runner
        .with_mmap_threshold(threshold)
        .with_options(SupervisorOptions {
            report_interval: Duration::from_secs(args.report_interval),
            grace_period: Duration::from_secs(args.grace_period),
            ..SupervisorOptions::default()
        }))
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);
    match args.color {
        ColorChoice::Always => {
            colored::control::set_override(true);
        }
        ColorChoice::Never => {
            colored::control::set_override(false);
        }
        ColorChoice::Auto => {}
    }

    let mut sink = WriterSink::stdio();
    if let Err(e) = verify_args(&args) {
        sink.diagnostic(&e.to_string());
        std::process::exit(2);
    }

    // Job checks come before engine discovery so a bad job is reported as such
    // even on a worker without MDXfind installed.
    let setup = job_from_args(&args).and_then(|spec| {
        mdxrun::engine::validate(&spec)?;
        Ok((spec, runner_from_args(&args)?))
    });
    let (spec, runner) = match setup {
        Ok(v) => v,
        Err(e) => {
            sink.diagnostic(&e.to_string());
            std::process::exit(e.exit_code());
        }
    };

    // Failures were already written to the diagnostic channel by run_job.
    let report = match run_job(&spec, &runner, &mut sink) {
        Ok(report) => report,
        Err(e) => std::process::exit(e.exit_code()),
    };
    info!(
        "{:?}: {} lines processed, {} cracked",
        report.run.status, report.run.lines_processed, report.run.cracked
    );

    if args.log_parse_stats {
        let stats = report.prepared.stats;
        info!(
            "parse stats: records={}, blank={}, hash_only={}, hash_salt={}, hash_plaintext={}, hash_salt_plaintext={}",
            stats.records(),
            stats.blank,
            stats.hash_only,
            stats.hash_salt,
            stats.hash_plaintext,
            stats.hash_salt_plaintext
        );
    }
}
