#![no_main]

use bmff_box::{DecodeOptions, decode, decode_with_options, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(tree) = decode(data) {
        let _ = encode(&tree);
    }

    let options = DecodeOptions::default().with_extended_containers();
    if let Ok(tree) = decode_with_options(data, &options) {
        let _ = encode(&tree);
    }
});
