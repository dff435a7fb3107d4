use core::ops::{BitAnd, Shl, Shr, Sub};

use alloc::format;

use crate::{Decode, Encode, Error, ErrorKind, Result};

/// 全てのボックスが実装するトレイト
///
/// 本来なら `Box` という名前が適切だが、それだと標準ライブラリの [`std::boxed::Box`] と名前が
/// 衝突してしまうので、それを避けるために `BaseBox` としている
pub trait BaseBox {
    /// ボックスの種別
    fn box_type(&self) -> BoxType;
}

/// フルボックスを表すトレイト
pub trait FullBox: BaseBox {
    /// フルボックスのバージョンを返す
    fn full_box_version(&self) -> u8;

    /// フルボックスのフラグを返す
    fn full_box_flags(&self) -> FullBoxFlags;
}

/// [`BaseBox`] に共通のヘッダー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoxHeader {
    /// ボックスの種別
    pub box_type: BoxType,

    /// ボックスのサイズ
    pub box_size: BoxSize,
}

impl BoxHeader {
    /// ヘッダーの最大バイト数
    pub const MAX_SIZE: usize = (4 + 8) + (4 + 16);

    /// 宣言サイズの上限のデフォルト値
    ///
    /// これを超える 64-bit サイズは [`ErrorKind::OversizedDeclaration`] として扱われる
    pub const DEFAULT_MAX_BOX_SIZE: u64 = i64::MAX as u64;

    /// サイズ未確定のヘッダーを作成する
    ///
    /// ペイロードを書き終えた後に [`BoxHeader::finalize_box_size()`] でサイズを埋める
    pub fn new_variable_size(box_type: BoxType) -> Self {
        Self {
            box_type,
            box_size: BoxSize::VARIABLE_SIZE,
        }
    }

    /// ボックス種別とペイロードサイズから、サイズの確定したヘッダーを作成する
    ///
    /// 32-bit に収まらない場合には large size 形式が選ばれる
    pub fn with_payload_size(box_type: BoxType, payload_size: u64) -> Result<Self> {
        let box_size = BoxSize::with_payload_size(box_type, payload_size).ok_or_else(|| {
            Error::invalid_input(format!("Too large box payload: {payload_size} bytes"))
                .with_box_type(box_type)
        })?;
        Ok(Self { box_type, box_size })
    }

    /// [`BoxHeader::new_variable_size()`] でエンコードしたボックスのサイズフィールドを書き換える
    ///
    /// `box_bytes` はヘッダーを含むボックス全体のバイト列
    pub fn finalize_box_size(self, box_bytes: &mut [u8]) -> Result<()> {
        if self.box_size != BoxSize::VARIABLE_SIZE {
            return Err(Error::invalid_input(
                "box_size must be VARIABLE_SIZE before finalization",
            ));
        }

        // ヘッダーのサイズに変更があると box_bytes 全体のレイアウトが変わってしまうのでエラーにする
        let size = u32::try_from(box_bytes.len()).map_err(|_| {
            Error::invalid_input(
                "box payload too large: header size would require U64, making layout inconsistent",
            )
            .with_box_type(self.box_type)
        })?;
        size.encode(box_bytes)?;
        Ok(())
    }

    /// ヘッダーをエンコードした際のバイト数を返す
    pub fn external_size(self) -> usize {
        self.box_type.external_size() + self.box_size.external_size()
    }

    /// ボックスのペイロード部分のバイト数を返す
    pub fn payload_size(self) -> u64 {
        self.box_size.get().saturating_sub(self.external_size() as u64)
    }

    /// 宣言サイズの上限を指定してヘッダーをデコードする
    ///
    /// `buf` はこのボックスが収まるべき範囲（親ボックスのペイロードの残り、またはファイル全体の残り）で、
    /// 宣言サイズがその範囲を超える場合は [`ErrorKind::TruncatedBox`] となる
    pub fn decode_with_limit(buf: &[u8], max_box_size: u64) -> Result<(Self, usize)> {
        if buf.len() < 4 {
            return Err(Error::truncated_box(format!(
                "Box size field requires 4 bytes, but only {} bytes remain",
                buf.len()
            )));
        }
        if buf.len() < 8 {
            return Err(Error::truncated_box(format!(
                "Box header requires 8 bytes, but only {} bytes remain",
                buf.len()
            )));
        }

        let mut offset = 0;
        let size = u32::decode_at(buf, &mut offset)?;
        let fourcc = <[u8; 4]>::decode_at(buf, &mut offset)?;
        let normal_type = BoxType::Normal(fourcc);
        if !normal_type.is_printable() {
            return Err(Error::with_reason(
                ErrorKind::InvalidBoxType,
                format!("Box type contains non-printable bytes: {fourcc:02x?}"),
            ));
        }

        if size == 0 {
            return Err(Error::with_reason(
                ErrorKind::UnsupportedUnboundedBox,
                "Box with size 0 (extends to end of stream) is not supported",
            )
            .with_box_type(normal_type));
        }

        let box_size = if size == 1 {
            if buf.len() < offset + 8 {
                return Err(Error::truncated_box(
                    "Large size box requires 8 more bytes for the 64-bit size field",
                )
                .with_box_type(normal_type));
            }
            BoxSize::U64(u64::decode_at(buf, &mut offset)?)
        } else {
            BoxSize::U32(size)
        };
        if box_size.get() > max_box_size {
            return Err(Error::with_reason(
                ErrorKind::OversizedDeclaration,
                format!(
                    "Declared box size {} exceeds the limit {max_box_size}",
                    box_size.get()
                ),
            )
            .with_box_type(normal_type));
        }

        let box_type = if fourcc == *b"uuid" {
            if buf.len() < offset + 16 {
                return Err(Error::truncated_box(
                    "uuid box requires 16 more bytes for the extended type",
                )
                .with_box_type(normal_type));
            }
            BoxType::Uuid(<[u8; 16]>::decode_at(buf, &mut offset)?)
        } else {
            normal_type
        };

        if box_size.get() < offset as u64 {
            return Err(Error::truncated_box(format!(
                "Too small box size: actual={}, expected={offset} or more",
                box_size.get()
            ))
            .with_box_type(box_type));
        }
        if box_size.get() > buf.len() as u64 {
            return Err(Error::truncated_box(format!(
                "Declared box size {} exceeds the {} bytes available",
                box_size.get(),
                buf.len()
            ))
            .with_box_type(box_type));
        }

        Ok((Self { box_type, box_size }, offset))
    }

    /// ボックスのヘッダーをデコードし、ペイロード部分のスライスと合わせて返す
    pub fn decode_header_and_payload(buf: &[u8]) -> Result<(Self, &[u8])> {
        let (header, header_size) = Self::decode(buf)?;
        let end = header.box_size.get() as usize;
        Ok((header, &buf[header_size..end]))
    }
}

impl Encode for BoxHeader {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        if !self.box_type.is_printable() {
            return Err(Error::with_reason(
                ErrorKind::InvalidBoxType,
                format!("Box type contains non-printable bytes: {:02x?}", self.box_type.as_bytes()),
            ));
        }
        if self.box_type == BoxType::Normal(*b"uuid") {
            return Err(Error::with_reason(
                ErrorKind::InvalidBoxType,
                "uuid box requires an extended type: use BoxType::Uuid",
            ));
        }

        let mut offset = 0;

        let large_size = match self.box_size {
            BoxSize::U32(size) => {
                offset += size.encode(&mut buf[offset..])?;
                None
            }
            BoxSize::U64(size) => {
                offset += 1u32.encode(&mut buf[offset..])?;
                Some(size)
            }
        };

        match self.box_type {
            BoxType::Normal(ty) => {
                offset += ty.encode(&mut buf[offset..])?;
            }
            BoxType::Uuid(_) => {
                offset += b"uuid".encode(&mut buf[offset..])?;
            }
        }

        if let Some(large_size) = large_size {
            offset += large_size.encode(&mut buf[offset..])?;
        }

        if let BoxType::Uuid(ty) = self.box_type {
            offset += ty.encode(&mut buf[offset..])?;
        }

        Ok(offset)
    }
}

impl Decode for BoxHeader {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        Self::decode_with_limit(buf, Self::DEFAULT_MAX_BOX_SIZE)
    }
}

/// [`FullBox`] に共通のヘッダー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FullBoxHeader {
    /// バージョン
    pub version: u8,

    /// フラグ
    pub flags: FullBoxFlags,
}

impl FullBoxHeader {
    /// フルボックスへの参照を受け取って、対応するヘッダーを作成する
    pub fn from_box<B: FullBox>(b: &B) -> Self {
        Self {
            version: b.full_box_version(),
            flags: b.full_box_flags(),
        }
    }
}

impl Encode for FullBoxHeader {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let mut offset = 0;
        offset += self.version.encode(&mut buf[offset..])?;
        offset += self.flags.encode(&mut buf[offset..])?;
        Ok(offset)
    }
}

impl Decode for FullBoxHeader {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut offset = 0;
        let version = u8::decode_at(buf, &mut offset)?;
        let flags = FullBoxFlags::decode_at(buf, &mut offset)?;
        Ok((Self { version, flags }, offset))
    }
}

/// [`FullBox`] のヘッダー部分に含まれる 24-bit のビットフラグ
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FullBoxFlags(u32);

impl FullBoxFlags {
    const MASK: u32 = 0xFF_FFFF;

    /// 空のビットフラグを作成する
    pub const fn empty() -> Self {
        Self(0)
    }

    /// [`u32`] を受け取って、対応するビットフラグを作成する
    ///
    /// 上位 8 ビットは無視される
    pub const fn new(flags: u32) -> Self {
        Self(flags & Self::MASK)
    }

    /// `(ビット位置、フラグがセットされているかどうか)` のイテレーターを受け取って、対応するビットフラグを作成する
    pub fn from_flags<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = (usize, bool)>,
    {
        let flags = iter
            .into_iter()
            .filter(|x| x.1 && x.0 < 24)
            .map(|x| 1u32 << x.0)
            .fold(0, |acc, x| acc | x);
        Self(flags)
    }

    /// このビットフラグに対応する [`u32`] 値を返す
    pub const fn get(self) -> u32 {
        self.0
    }

    /// 指定されたビット位置のフラグがセットされているかどうかを判定する
    pub const fn is_set(self, i: usize) -> bool {
        i < 24 && (self.0 & (1 << i)) != 0
    }

    /// `mask` のビットが全てセットされているかどうかを判定する
    pub const fn contains(self, mask: u32) -> bool {
        self.0 & mask == mask
    }

    /// `mask` のビットをセットしたビットフラグを返す
    pub const fn with(self, mask: u32) -> Self {
        Self::new(self.0 | mask)
    }

    /// `mask` のビットをクリアしたビットフラグを返す
    pub const fn without(self, mask: u32) -> Self {
        Self(self.0 & !mask)
    }
}

impl Encode for FullBoxFlags {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        self.0.to_be_bytes()[1..].encode(buf)
    }
}

impl Decode for FullBoxFlags {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        Error::check_input_size(3, buf)?;
        Ok((Self(u32::from_be_bytes([0, buf[0], buf[1], buf[2]])), 3))
    }
}

/// [`BaseBox`] のサイズ
///
/// ボックスのサイズは、ヘッダー部分とペイロード部分のサイズを足した値となる。
/// 32-bit に収まらない場合はサイズフィールドに 1 を入れ、タイプの後ろに 64-bit のサイズを置く（large size）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum BoxSize {
    U32(u32),
    U64(u64),
}

impl BoxSize {
    /// エンコード途中でサイズが未確定であることを表すための特別な値
    pub const VARIABLE_SIZE: Self = Self::U32(0);

    /// ボックス種別とペイロードサイズを受け取って、対応する [`BoxSize`] インスタンスを作成する
    ///
    /// 合計サイズが [`u64`] に収まらない場合は [`None`] が返される
    pub fn with_payload_size(box_type: BoxType, payload_size: u64) -> Option<Self> {
        let size = (4 + box_type.external_size() as u64).checked_add(payload_size)?;
        if let Ok(size) = u32::try_from(size) {
            Some(Self::U32(size))
        } else {
            size.checked_add(8).map(Self::U64)
        }
    }

    /// ボックスのサイズの値を取得する
    pub const fn get(self) -> u64 {
        match self {
            BoxSize::U32(v) => v as u64,
            BoxSize::U64(v) => v,
        }
    }

    /// [`BoxHeader`] 内のサイズフィールドをエンコードする際に必要となるバイト数を返す
    pub const fn external_size(self) -> usize {
        match self {
            BoxSize::U32(_) => 4,
            BoxSize::U64(_) => 4 + 8,
        }
    }
}

/// [`BaseBox`] の種別
///
/// `Normal` の四文字は印字可能な ASCII (0x20..=0x7E) である必要がある
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoxType {
    /// 四文字で表現される通常のボックス種別
    Normal([u8; 4]),

    /// UUID 形式のボックス種別（拡張タイプの 16 バイト）
    Uuid([u8; 16]),
}

impl BoxType {
    /// 種別を表すバイト列を返す
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            BoxType::Normal(ty) => &ty[..],
            BoxType::Uuid(ty) => &ty[..],
        }
    }

    /// [`BoxHeader`] 内のボックス種別フィールドをエンコードする際に必要となるバイト数を返す
    pub const fn external_size(self) -> usize {
        if matches!(self, Self::Normal(_)) {
            4
        } else {
            4 + 16
        }
    }

    /// 四文字コードが全て印字可能な ASCII かどうか
    ///
    /// `Uuid` の場合は常に `true` となる
    pub fn is_printable(&self) -> bool {
        match self {
            BoxType::Normal(ty) => ty.iter().all(|b| (0x20..=0x7E).contains(b)),
            BoxType::Uuid(_) => true,
        }
    }

    /// 自分が `expected` と同じ種別であるかをチェックする
    pub fn expect(self, expected: Self) -> Result<()> {
        if self == expected {
            Ok(())
        } else {
            Err(Error::invalid_data(format!(
                "Expected box type `{expected}`, but got `{self}`"
            )))
        }
    }
}

impl core::fmt::Debug for BoxType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BoxType::Normal(ty) => {
                if let Ok(ty) = core::str::from_utf8(ty) {
                    f.debug_tuple("BoxType").field(&ty).finish()
                } else {
                    f.debug_tuple("BoxType").field(ty).finish()
                }
            }
            BoxType::Uuid(ty) => f.debug_tuple("BoxType").field(ty).finish(),
        }
    }
}

impl core::fmt::Display for BoxType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let BoxType::Normal(ty) = self
            && let Ok(ty) = core::str::from_utf8(&ty[..])
        {
            return write!(f, "{ty}");
        }
        write!(f, "{:?}", self.as_bytes())
    }
}

/// MP4 ファイル内で使われる時刻形式（1904/1/1 からの経過秒数）
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mp4FileTime(u64);

impl Mp4FileTime {
    /// 1904/1/1 からの経過秒数を引数にとって [`Mp4FileTime`] インスタンスを作成する
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// 1904/1/1 からの経過秒数を返す
    pub const fn as_secs(self) -> u64 {
        self.0
    }
}

/// 固定小数点数
///
/// 16.16 形式は `FixedPointNumber<i16, u16>`、8.8 形式は `FixedPointNumber<i8, u8>` で表現する
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixedPointNumber<I, F = I> {
    /// 整数部
    pub integer: I,

    /// 小数部
    pub fraction: F,
}

impl<I, F> FixedPointNumber<I, F> {
    /// 整数部と小数部を受け取って固定小数点数を返す
    pub const fn new(integer: I, fraction: F) -> Self {
        Self { integer, fraction }
    }
}

impl FixedPointNumber<i16, u16> {
    /// 32-bit の生の値（下位 16 ビットが小数部）から固定小数点数を作成する
    pub const fn from_bits(bits: u32) -> Self {
        Self::new((bits >> 16) as u16 as i16, bits as u16)
    }

    /// 32-bit の生の値（下位 16 ビットが小数部）を返す
    pub const fn to_bits(self) -> u32 {
        ((self.integer as u16 as u32) << 16) | self.fraction as u32
    }
}

impl<I: Encode, F: Encode> Encode for FixedPointNumber<I, F> {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let mut offset = 0;
        offset += self.integer.encode(&mut buf[offset..])?;
        offset += self.fraction.encode(&mut buf[offset..])?;
        Ok(offset)
    }
}

impl<I: Decode, F: Decode> Decode for FixedPointNumber<I, F> {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut offset = 0;
        let integer = I::decode_at(buf, &mut offset)?;
        let fraction = F::decode_at(buf, &mut offset)?;
        Ok((Self { integer, fraction }, offset))
    }
}

/// 任意のビット数の非負の整数を表現するための型
///
/// - `T`: 数値の内部的な型。 最低限 `BITS` 分の数値を表現可能な型である必要がある。
/// - `BITS`: 数値のビット数
/// - `OFFSET`: 一つの `T` に複数の [`Uint`] 値がパックされる場合の、この数値のオフセット位置（ビット数）
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uint<T, const BITS: u32, const OFFSET: u32 = 0>(T);

impl<T, const BITS: u32, const OFFSET: u32> Uint<T, BITS, OFFSET>
where
    T: Shr<u32, Output = T>
        + Shl<u32, Output = T>
        + BitAnd<Output = T>
        + Sub<Output = T>
        + From<u8>,
{
    /// 指定された数値を受け取ってインスタンスを作成する
    pub const fn new(v: T) -> Self {
        Self(v)
    }

    /// このインスタンスが表現する整数値を返す
    pub fn get(self) -> T {
        self.0
    }

    /// `T` が保持するビット列の `OFFSET` 位置から `BITS` 分のビット列に対応する整数値を返す
    pub fn from_bits(v: T) -> Self {
        Self((v >> OFFSET) & ((T::from(1) << BITS) - T::from(1)))
    }

    /// このインスタンスに対応する `T` 内のビット列を返す
    ///
    /// なお `OFFSET` が `0` の場合には、このメソッドは [`Uint::get()`] と等価である
    pub fn to_bits(self) -> T {
        self.0 << OFFSET
    }
}
