#![no_main]

use bmff_box::{Decode, Encode, boxes::StypBox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((styp, _)) = StypBox::decode(data) {
        let _ = styp.encode_to_vec();
    }
});
