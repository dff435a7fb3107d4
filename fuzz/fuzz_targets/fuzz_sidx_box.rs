#![no_main]

use bmff_box::{Decode, Encode, boxes::SidxBox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((sidx, _)) = SidxBox::decode(data) {
        let _ = sidx.encode_to_vec();
    }
});
