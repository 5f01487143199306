#![no_main]

use functrace::filter::is_relevant;
use functrace::ledger::DedupKey;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let name = String::from_utf8_lossy(data);

    // Total and deterministic over every name
    let relevant = is_relevant(&name);
    assert_eq!(relevant, is_relevant(&name));

    let key = DedupKey::new("fuzz", &*name);
    assert_eq!(key.function(), name);
});
