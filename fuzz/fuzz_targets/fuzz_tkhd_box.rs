#![no_main]

use bmff_box::{Decode, Encode, boxes::TkhdBox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((tkhd, _)) = TkhdBox::decode(data) {
        let _ = tkhd.encode_to_vec();
    }
});
