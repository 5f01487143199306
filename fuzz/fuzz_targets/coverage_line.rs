#![no_main]

use functrace::coverage::CoverageData;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary log contents must never panic the analyzer
    let mut coverage = CoverageData::new();
    if coverage.record_reader(data).is_ok() {
        for (_, image) in coverage.images() {
            let _ = image.percentage();
            let _ = image.uncalled();
        }
    }
});
