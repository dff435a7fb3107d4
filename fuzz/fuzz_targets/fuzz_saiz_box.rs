#![no_main]

use bmff_box::{Decode, Encode, boxes::SaizBox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((saiz, _)) = SaizBox::decode(data) {
        let _ = saiz.encode_to_vec();
    }
});
