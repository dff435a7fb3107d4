#![no_main]

use bmff_box::{Decode, Encode, boxes::MdhdBox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((mdhd, _)) = MdhdBox::decode(data) {
        let _ = mdhd.encode_to_vec();
    }
});
