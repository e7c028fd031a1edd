//! Fuzz target: advertising record decoder
//!
//! Feeds arbitrary bytes to the AD-structure parser.  It must never panic,
//! and every record it yields must lie inside the input.
//!
//! cargo fuzz run fuzz_adv_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use microtrynkit::advertising::{decode_fields, decode_name, decode_services};

fuzz_target!(|data: &[u8]| {
    let mut covered = 0usize;
    for (_, value) in decode_fields(data) {
        covered += value.len() + 2;
    }
    assert!(covered <= data.len(), "records overrun the payload");

    let _ = decode_name(data);
    let _ = decode_services(data);
});
