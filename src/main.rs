use anyhow::Result;
use clap::Parser;
use functrace::cli::Cli;
use functrace::lifecycle;
use functrace::ptrace::{PtraceEngine, Target};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber: TRACE with --debug, warnings otherwise
fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::TRACE
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    // Either attach to PID or trace command (mutually exclusive)
    let target = Target::from_args(args.pid, args.command.clone())?;
    let config = args.tracer_config();

    let exit_code = lifecycle::run(PtraceEngine::new(target), &config)?;
    std::process::exit(exit_code);
}
