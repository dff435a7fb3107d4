#![no_main]

use bmff_box::{Decode, Encode, boxes::SaioBox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((saio, _)) = SaioBox::decode(data) {
        let _ = saio.encode_to_vec();
    }
});
