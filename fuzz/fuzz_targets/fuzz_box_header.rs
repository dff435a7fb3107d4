#![no_main]

use bmff_box::{BoxHeader, Decode, Encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((header, _)) = BoxHeader::decode(data) {
        let _ = header.encode_to_vec();
    }
});
