#![no_main]

use bmff_box::{Decode, Encode, boxes::ElstBox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((elst, _)) = ElstBox::decode(data) {
        let _ = elst.encode_to_vec();
    }
});
