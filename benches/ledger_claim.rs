//! Entry hook fast path benchmark
//!
//! Every call to an already-logged function costs one ledger lookup under
//! the lock and nothing else. This measures that path, the first-hit path,
//! and the same lookup under thread contention.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench ledger_claim
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use functrace::call_logger::CallLogger;
use functrace::engine::{Client, ClientGuard, EntryHook, HookArgs};
use functrace::ledger::{DedupKey, DedupLedger};
use functrace::output::LineSink;
use nix::unistd::Pid;
use std::sync::{Arc, Mutex, MutexGuard};

struct BenchClient(Mutex<()>);

struct BenchGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl ClientGuard for BenchGuard<'_> {
    fn pid(&self) -> Pid {
        Pid::from_raw(1)
    }
}

impl Client for BenchClient {
    fn lock(&self) -> Box<dyn ClientGuard + '_> {
        Box::new(BenchGuard {
            _guard: self.0.lock().unwrap(),
        })
    }
}

fn bench_seen_key(c: &mut Criterion) {
    let ledger = DedupLedger::new();
    ledger.try_claim(DedupKey::new("/usr/lib/libc.so.6", "printf"));

    c.bench_function("ledger_claim_seen", |b| {
        b.iter(|| {
            ledger.try_claim(black_box(DedupKey::new(
                "/usr/lib/libc.so.6",
                "printf",
            )))
        });
    });
}

fn bench_first_hits(c: &mut Criterion) {
    let names: Vec<String> = (0..1024).map(|i| format!("func_{}", i)).collect();

    c.bench_function("ledger_claim_first_1024", |b| {
        b.iter(|| {
            let ledger = DedupLedger::new();
            for name in &names {
                black_box(ledger.try_claim(DedupKey::new("/tmp/toy", name.as_str())));
            }
        });
    });
}

fn bench_hook_fast_path(c: &mut Criterion) {
    let logger = CallLogger::new(
        Arc::new(DedupLedger::new()),
        Arc::new(LineSink::from_writer(std::io::sink())),
    );
    let client = BenchClient(Mutex::new(()));
    let args = HookArgs {
        image: Arc::from("/tmp/toy"),
        function: Arc::from("add"),
    };
    logger.on_entry(&client, &args);

    c.bench_function("call_logger_repeat_hit", |b| {
        b.iter(|| logger.on_entry(&client, black_box(&args)));
    });
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_claim_contended");

    for threads in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &n| {
            let ledger = DedupLedger::new();
            ledger.try_claim(DedupKey::new("/tmp/toy", "add"));
            b.iter(|| {
                std::thread::scope(|scope| {
                    for _ in 0..n {
                        scope.spawn(|| {
                            for _ in 0..256 {
                                black_box(ledger.try_claim(DedupKey::new("/tmp/toy", "add")));
                            }
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_seen_key,
    bench_first_hits,
    bench_hook_fast_path,
    bench_contention
);
criterion_main!(benches);
