//! 壊れた入力の分類
use core::fmt;

use crate::{BoxType, Error, ErrorKind, tree::DecodeOptions};

/// 入力中に見つかった問題
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Malformation {
    /// 問題の種類
    pub kind: ErrorKind,

    /// 問題のあったボックスの入力バイト列中の先頭位置
    pub offset: Option<u64>,

    /// 問題のあったボックスの種別（判明している場合）
    pub box_type: Option<BoxType>,
}

impl From<&Error> for Malformation {
    fn from(e: &Error) -> Self {
        Self {
            kind: e.kind,
            offset: e.offset,
            box_type: e.box_type,
        }
    }
}

impl fmt::Display for Malformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(ty) = self.box_type {
            write!(f, " in `{ty}`")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " at offset {offset}")?;
        }
        Ok(())
    }
}

/// 入力をボックスツリーとしてデコードし、最初に見つかった問題を返す
///
/// 問題がなければ `None` を返す
pub fn classify(buf: &[u8], options: &DecodeOptions) -> Option<Malformation> {
    let e = crate::tree::decode_with_options(buf, options).err()?;
    let malformation = Malformation::from(&e);
    tracing::debug!(%malformation, "malformed input");
    Some(malformation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let m = Malformation {
            kind: ErrorKind::TruncatedBox,
            offset: Some(28),
            box_type: Some(BoxType::Normal(*b"trak")),
        };
        assert_eq!(m.to_string(), "TruncatedBox in `trak` at offset 28");
    }

    #[test]
    fn well_formed_input() {
        let bytes = b"\x00\x00\x00\x08free";
        assert_eq!(classify(bytes, &DecodeOptions::default()), None);
    }

    #[test]
    fn first_problem_wins() {
        let bytes = b"\x00\x00\x00\x08free\x00\x00\x00\x00moov\x01\x02\x03\x04";
        let m = classify(bytes, &DecodeOptions::default()).unwrap();
        assert_eq!(m.kind, ErrorKind::UnsupportedUnboundedBox);
        assert_eq!(m.offset, Some(8));
        assert_eq!(m.box_type, Some(BoxType::Normal(*b"moov")));
    }
}
