#![no_main]

use bmff_box::{Decode, Encode, boxes::TfhdBox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((tfhd, _)) = TfhdBox::decode(data) {
        let _ = tfhd.encode_to_vec();
    }
});
