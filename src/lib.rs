//! functrace - first-call function tracer
//!
//! Instruments every relevant function of every image loaded into a
//! program (and, by default, into every child it forks or execs), and
//! writes one trace line the first time each function is called in each
//! process instance:
//!
//! ```text
//! [PID:4242] [Image:/tmp/toy] [Called:add]
//! ```
//!
//! The core ([`filter`], [`ledger`], [`walker`], [`call_logger`],
//! [`lifecycle`]) only talks to an instrumentation engine through the
//! traits in [`engine`]; [`ptrace`] is the engine shipped with the
//! `functrace` binary. [`coverage`] and the report writers turn the trace
//! and diagnostic logs into per-image function coverage.

pub mod call_logger;
pub mod cli;
pub mod coverage;
pub mod engine;
pub mod error;
pub mod filter;
pub mod html_output;
pub mod json_output;
pub mod ledger;
pub mod lifecycle;
pub mod output;
pub mod ptrace;
pub mod walker;
pub mod xunit_output;
