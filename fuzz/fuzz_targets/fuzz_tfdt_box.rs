#![no_main]

use bmff_box::{Decode, Encode, boxes::TfdtBox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((tfdt, _)) = TfdtBox::decode(data) {
        let _ = tfdt.encode_to_vec();
    }
});
