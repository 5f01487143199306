//! CLI argument parsing for functrace

use crate::lifecycle::{TracerConfig, DEFAULT_LOG, DEFAULT_OUTPUT};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "functrace")]
#[command(version)]
#[command(
    about = "Record the first call of every function in a program and its children",
    long_about = None
)]
pub struct Cli {
    /// Trace output file (one line per first call)
    #[arg(short = 'o', long = "output", value_name = "PATH", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Diagnostic log file (sections and registered functions)
    #[arg(short = 'l', long = "log", value_name = "PATH", default_value = DEFAULT_LOG)]
    pub log: PathBuf,

    /// Attach to running process by PID (mutually exclusive with command)
    #[arg(short = 'p', long = "pid", value_name = "PID")]
    pub pid: Option<i32>,

    /// Do not instrument forked or exec'd children
    #[arg(long = "no-follow")]
    pub no_follow: bool,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,

    /// Command to trace (everything after --)
    #[arg(last = true)]
    pub command: Option<Vec<String>>,
}

impl Cli {
    /// Tracer settings derived from the arguments
    pub fn tracer_config(&self) -> TracerConfig {
        TracerConfig {
            output: self.output.clone(),
            log: self.log.clone(),
            follow_children: !self.no_follow,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "functrace-coverage")]
#[command(version)]
#[command(about = "Function coverage report from functrace logs", long_about = None)]
pub struct CoverageCli {
    /// Trace output and diagnostic log files to analyze
    #[arg(required = true, value_name = "LOG")]
    pub log_files: Vec<PathBuf>,

    /// Directory to save per-image HTML coverage reports
    #[arg(long = "html-output", value_name = "DIR")]
    pub html_output: Option<PathBuf>,

    /// Directory to save per-image xUnit XML coverage reports
    #[arg(long = "xunit-output", value_name = "DIR")]
    pub xunit_output: Option<PathBuf>,

    /// File to save a JSON coverage summary to
    #[arg(long = "json-output", value_name = "FILE")]
    pub json_output: Option<PathBuf>,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}
