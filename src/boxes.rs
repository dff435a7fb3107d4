//! ボックス（レコード）の定義
//!
//! 各ボックスは [`Encode`] / [`Decode`] を実装しており、ボックスヘッダーを含むバイト列と相互に変換できる。
//! ボックスツリーのノードとの変換には [`BoxNode::from_record()`](crate::BoxNode::from_record) と
//! [`BoxNode::to_record()`](crate::BoxNode::to_record) を使う。
use alloc::{format, vec::Vec};

use crate::{BaseBox, BoxHeader, BoxType, Decode, Encode, Error, FullBoxFlags, Result};

pub use crate::boxes_cenc::{
    AuxInfoType, SaioBox, SaioOffsets, SaizBox, SencBox, SencOverride, SencSample, SencSubsample,
};
pub use crate::boxes_fmp4::{
    CompositionOffset, DecodeTime, MfhdBox, SidxBox, SidxReference, TfdtBox, TfhdBox, TrunBox,
    TrunSample,
};
pub use crate::boxes_moov_tree::{ElstBox, ElstEntries, ElstEntry, MdhdBox, MvhdBox, TkhdBox};

/// `f` の実行中に発生したエラーにボックス種別を付与する
pub(crate) fn with_box_type<F, T>(box_type: BoxType, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f().map_err(|e| e.with_box_type(box_type))
}

/// フラグのビットと、それに対応する省略可能フィールドの有無が一致しているかをチェックする
///
/// ビットが立っているのに値がない場合は [`ErrorKind::MissingRequiredField`](crate::ErrorKind::MissingRequiredField)、
/// ビットが立っていないのに値がある場合は [`ErrorKind::InvalidInput`](crate::ErrorKind::InvalidInput) となる
pub(crate) fn check_flagged_field<T>(
    flags: FullBoxFlags,
    mask: u32,
    value: &Option<T>,
    name: &str,
) -> Result<()> {
    match (flags.contains(mask), value.is_some()) {
        (true, false) => Err(Error::missing_required_field(name)),
        (false, true) => Err(Error::invalid_input(format!(
            "`{name}` is given, but flag 0x{mask:06x} is not set"
        ))),
        _ => Ok(()),
    }
}

/// フラグのビットが立っている場合にだけフィールドをデコードする
pub(crate) fn decode_flagged_field<T: Decode>(
    flags: FullBoxFlags,
    mask: u32,
    buf: &[u8],
    offset: &mut usize,
) -> Result<Option<T>> {
    if flags.contains(mask) {
        T::decode_at(buf, offset).map(Some)
    } else {
        Ok(None)
    }
}

/// フィールドに値があればエンコードする
pub(crate) fn encode_optional_field<T: Encode>(
    value: &Option<T>,
    buf: &mut [u8],
    offset: &mut usize,
) -> Result<()> {
    if let Some(v) = value {
        *offset += v.encode(&mut buf[*offset..])?;
    }
    Ok(())
}

/// 要素数フィールドに書き込む値を求める
pub(crate) fn count_u32(len: usize, name: &str) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| Error::invalid_input(format!("Too many {name}: {len} entries")))
}

/// [`FtypBox`] や [`StypBox`] で使われるブランド
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Brand([u8; 4]);

impl Brand {
    /// [ISO/IEC 14496-12] `isom` ブランド
    pub const ISOM: Self = Self::new(*b"isom");

    /// [ISO/IEC 14496-12] `iso2` ブランド
    pub const ISO2: Self = Self::new(*b"iso2");

    /// [ISO/IEC 14496-12] `iso5` ブランド
    pub const ISO5: Self = Self::new(*b"iso5");

    /// [ISO/IEC 14496-12] `iso6` ブランド
    pub const ISO6: Self = Self::new(*b"iso6");

    /// [ISO/IEC 23009-1] `dash` ブランド
    pub const DASH: Self = Self::new(*b"dash");

    /// [ISO/IEC 23009-1] `msdh` ブランド
    pub const MSDH: Self = Self::new(*b"msdh");

    /// バイト列を指定してブランドを作成する
    pub const fn new(brand: [u8; 4]) -> Self {
        Self(brand)
    }

    /// ブランドのバイト列を返す
    pub const fn get(self) -> [u8; 4] {
        self.0
    }
}

impl core::fmt::Debug for Brand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Ok(s) = core::str::from_utf8(&self.0) {
            f.debug_tuple("Brand").field(&s).finish()
        } else {
            f.debug_tuple("Brand").field(&self.0).finish()
        }
    }
}

impl Encode for Brand {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        self.0.encode(buf)
    }
}

impl Decode for Brand {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let (brand, size) = <[u8; 4]>::decode(buf)?;
        Ok((Self(brand), size))
    }
}

fn encode_brands(
    box_type: BoxType,
    major_brand: Brand,
    minor_version: u32,
    compatible_brands: &[Brand],
    buf: &mut [u8],
) -> Result<usize> {
    let header = BoxHeader::new_variable_size(box_type);
    let mut offset = header.encode(buf)?;
    offset += major_brand.encode(&mut buf[offset..])?;
    offset += minor_version.encode(&mut buf[offset..])?;
    for brand in compatible_brands {
        offset += brand.encode(&mut buf[offset..])?;
    }
    header.finalize_box_size(&mut buf[..offset])?;
    Ok(offset)
}

fn decode_brands(payload: &[u8]) -> Result<(Brand, u32, Vec<Brand>)> {
    let mut offset = 0;
    let major_brand = Brand::decode_at(payload, &mut offset)?;
    let minor_version = u32::decode_at(payload, &mut offset)?;

    let rest = payload.len() - offset;
    if rest % 4 != 0 {
        return Err(Error::invalid_data(format!(
            "Compatible brand list is not a multiple of 4 bytes: {rest}"
        )));
    }
    let mut compatible_brands = Vec::with_capacity(rest / 4);
    while offset < payload.len() {
        compatible_brands.push(Brand::decode_at(payload, &mut offset)?);
    }
    Ok((major_brand, minor_version, compatible_brands))
}

/// [ISO/IEC 14496-12] FileTypeBox class
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct FtypBox {
    pub major_brand: Brand,
    pub minor_version: u32,
    pub compatible_brands: Vec<Brand>,
}

impl FtypBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::Normal(*b"ftyp");
}

impl Encode for FtypBox {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        encode_brands(
            Self::TYPE,
            self.major_brand,
            self.minor_version,
            &self.compatible_brands,
            buf,
        )
    }
}

impl Decode for FtypBox {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        with_box_type(Self::TYPE, || {
            let (header, payload) = BoxHeader::decode_header_and_payload(buf)?;
            header.box_type.expect(Self::TYPE)?;

            let (major_brand, minor_version, compatible_brands) = decode_brands(payload)?;
            Ok((
                Self {
                    major_brand,
                    minor_version,
                    compatible_brands,
                },
                header.external_size() + payload.len(),
            ))
        })
    }
}

impl BaseBox for FtypBox {
    fn box_type(&self) -> BoxType {
        Self::TYPE
    }
}

/// [ISO/IEC 14496-12] SegmentTypeBox class
///
/// レイアウトは [`FtypBox`] と同じで、メディアセグメントの先頭に置かれる。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct StypBox {
    pub major_brand: Brand,
    pub minor_version: u32,
    pub compatible_brands: Vec<Brand>,
}

impl StypBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::Normal(*b"styp");
}

impl Encode for StypBox {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        encode_brands(
            Self::TYPE,
            self.major_brand,
            self.minor_version,
            &self.compatible_brands,
            buf,
        )
    }
}

impl Decode for StypBox {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        with_box_type(Self::TYPE, || {
            let (header, payload) = BoxHeader::decode_header_and_payload(buf)?;
            header.box_type.expect(Self::TYPE)?;

            let (major_brand, minor_version, compatible_brands) = decode_brands(payload)?;
            Ok((
                Self {
                    major_brand,
                    minor_version,
                    compatible_brands,
                },
                header.external_size() + payload.len(),
            ))
        })
    }
}

impl BaseBox for StypBox {
    fn box_type(&self) -> BoxType {
        Self::TYPE
    }
}
