#![no_main]

use bmff_box::{Decode, Encode, boxes::FtypBox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((ftyp, _)) = FtypBox::decode(data) {
        let _ = ftyp.encode_to_vec();
    }
});
