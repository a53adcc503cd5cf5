use std::fs;
use std::env;
use std::path;
use std::io::BufReader;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;
use thiserror::Error;
use indicatif::ProgressBar;
use fetchguard::fetchlog::{TraceError, TraceReader};
use fetchguard::{read_engine_profile, Engine, EngineProfile, ProfileError, PROFILE_ENV_VAR};

use crate::replay::Replayer;

mod replay;

#[derive(Parser, Debug)]
#[command(version, long_about = None)]
struct Args {
    /// Recorded syscall trace to replay.
    #[arg(short, long)]
    trace: path::PathBuf,

    /// Engine profile. Falls back to $FETCHGUARD_PROFILE, then built-in defaults.
    #[arg(short, long)]
    profile: Option<path::PathBuf>,

    /// Also write the engine log to the profile's log file.
    #[arg(short, long)]
    log: bool,
}

#[derive(Debug, Error)]
enum ReplayError {
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("could not open trace {path}: {source}")]
    TraceOpen { path: path::PathBuf, source: std::io::Error },

    #[error(transparent)]
    Trace(#[from] TraceError),
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(0) => ExitCode::SUCCESS,
        // Tampering found; distinct from failing to replay at all.
        Ok(_) => ExitCode::from(2),
        Err(e) => {
            eprintln!("fetch-replay: {}", e);
            ExitCode::FAILURE
        },
    }
}

/// Replays the trace and returns how many fetches had to be restored.
fn run(args: Args) -> Result<u64, ReplayError> {
    let profile = load_profile(args.profile)?;

    let logging = if args.log {
        fetchguard::logging::init(&profile.log_file)
    } else {
        fetchguard::logging::init_console(LevelFilter::Warn)
    };
    if let Err(e) = logging {
        eprintln!("fetch-replay: logging disabled: {}", e);
    }

    let trace_file = fs::File::open(&args.trace)
        .map_err(|source| ReplayError::TraceOpen { path: args.trace.clone(), source })?;
    let trace_size = trace_file.metadata()
        .map(|m| m.len())
        .unwrap_or(0);

    let bar = ProgressBar::new(trace_size);
    let reader = TraceReader::new(bar.wrap_read(BufReader::new(trace_file)));
    let mut replayer = Replayer::new(Engine::from_profile(&profile));

    for event in reader {
        if let Some(finding) = replayer.apply(event?) {
            bar.println(finding.to_string());
        }
    }
    bar.finish_and_clear();

    println!("{}", replayer.summary());

    Ok(replayer.summary().restored)
}

fn load_profile(path: Option<path::PathBuf>) -> Result<EngineProfile, ReplayError> {
    let path = path.or_else(|| env::var_os(PROFILE_ENV_VAR).map(path::PathBuf::from));

    match path {
        Some(path) => Ok(read_engine_profile(path)?),
        None => Ok(EngineProfile::default()),
    }
}
