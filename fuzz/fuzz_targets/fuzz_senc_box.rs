#![no_main]

use bmff_box::{Decode, Encode, boxes::SencBox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((senc, _)) = SencBox::decode(data) {
        let _ = senc.encode_to_vec();
    }

    // 先頭 1 バイトを外部から与える IV サイズとして使う
    if let Some((&iv_size, rest)) = data.split_first()
        && let Ok((senc, _)) = SencBox::decode_with_iv_size(rest, iv_size)
    {
        let _ = senc.encode_to_vec();
    }
});
