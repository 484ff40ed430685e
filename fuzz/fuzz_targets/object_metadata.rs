#![no_main]

use harmoniq_spatial::fuzz_process_metadata;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    fuzz_process_metadata(data);
});
