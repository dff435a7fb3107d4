#![no_main]

use bmff_box::{Decode, Encode, boxes::MfhdBox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((mfhd, _)) = MfhdBox::decode(data) {
        let _ = mfhd.encode_to_vec();
    }
});
