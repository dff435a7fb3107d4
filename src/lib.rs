//! ISO-BMFF (MP4) のボックスのエンコードおよびデコードを行うためのライブラリ
//!
//! - ボックスの入れ子構造は [`BoxTree`] / [`BoxNode`] として扱い、[`encode()`] と [`decode()`] で相互に変換する
//! - 個々のボックスのペイロードは [`boxes`] モジュールの構造体（レコード）として扱う
//! - 壊れた入力については [`classify()`] で最初に見つかった問題の種類と位置を取得できる
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

mod basic_types;
pub mod boxes;
mod boxes_cenc;
mod boxes_fmp4;
mod boxes_moov_tree;
mod codec;
mod malformed;
mod tree;

pub use basic_types::{
    BaseBox, BoxHeader, BoxSize, BoxType, FixedPointNumber, FullBox, FullBoxFlags, FullBoxHeader,
    Mp4FileTime, Uint,
};
pub use codec::{Decode, Encode, Error, ErrorKind, Result};
pub use malformed::{Malformation, classify};
pub use tree::{BoxNode, BoxPayload, BoxTree, DecodeOptions, decode, decode_with_options, encode};
