//! Entry-point analysis routine
//!
//! Runs on every hit of an instrumented entry. Already-seen functions cost
//! one ledger lookup; the first hit per (image, function) writes a record.

use crate::engine::{Client, EntryHook, HookArgs};
use crate::ledger::{DedupKey, DedupLedger};
use crate::output::{LineSink, TraceRecord};
use std::sync::Arc;

/// Logs the first call of every instrumented function in one process
#[derive(Debug)]
pub struct CallLogger {
    ledger: Arc<DedupLedger>,
    trace: Arc<LineSink>,
}

impl CallLogger {
    pub fn new(ledger: Arc<DedupLedger>, trace: Arc<LineSink>) -> Self {
        Self { ledger, trace }
    }

    pub fn ledger(&self) -> &DedupLedger {
        &self.ledger
    }
}

impl EntryHook for CallLogger {
    fn on_entry(&self, client: &dyn Client, args: &HookArgs) {
        let key = DedupKey::new(Arc::clone(&args.image), Arc::clone(&args.function));
        if !self.ledger.try_claim(key) {
            return;
        }

        // Guard dropped at end of statement
        let pid = client.lock().pid();

        self.trace.write_line(TraceRecord {
            pid,
            image: Arc::clone(&args.image),
            function: Arc::clone(&args.function),
        });
    }
}
