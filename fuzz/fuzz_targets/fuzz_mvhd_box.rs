#![no_main]

use bmff_box::{Decode, Encode, boxes::MvhdBox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((mvhd, _)) = MvhdBox::decode(data) {
        let _ = mvhd.encode_to_vec();
    }
});
