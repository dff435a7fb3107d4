#![no_main]

use bmff_box::{DecodeOptions, classify};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some(m) = classify(data, &DecodeOptions::default().with_max_depth(8)) {
        let _ = m.to_string();
    }
});
