//! Fragmented MP4 (fMP4) 関連のボックス定義
//!
//! このモジュールは内部的なもので、構造体などの外部への提供は boxes モジュールを通して行う
use alloc::{format, vec::Vec};

use crate::{
    BaseBox, BoxHeader, BoxType, Decode, Encode, Error, ErrorKind, FullBox, FullBoxFlags,
    FullBoxHeader, Result,
    boxes::{check_flagged_field, decode_flagged_field, encode_optional_field, with_box_type},
};

/// [ISO/IEC 14496-12] MovieFragmentHeaderBox class (親: moof)
///
/// フラグメントのシーケンス番号を格納する。
/// シーケンス番号は 1 から始まり、フラグメントごとに 1 ずつ増加する。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct MfhdBox {
    pub sequence_number: u32,
}

impl MfhdBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::Normal(*b"mfhd");
}

impl Encode for MfhdBox {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let header = BoxHeader::new_variable_size(Self::TYPE);
        let mut offset = header.encode(buf)?;
        offset += FullBoxHeader::from_box(self).encode(&mut buf[offset..])?;
        offset += self.sequence_number.encode(&mut buf[offset..])?;
        header.finalize_box_size(&mut buf[..offset])?;
        Ok(offset)
    }
}

impl Decode for MfhdBox {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        with_box_type(Self::TYPE, || {
            let (header, payload) = BoxHeader::decode_header_and_payload(buf)?;
            header.box_type.expect(Self::TYPE)?;

            let mut offset = 0;
            let _full_header = FullBoxHeader::decode_at(payload, &mut offset)?;

            let sequence_number = u32::decode_at(payload, &mut offset)?;

            Ok((
                Self { sequence_number },
                header.external_size() + payload.len(),
            ))
        })
    }
}

impl BaseBox for MfhdBox {
    fn box_type(&self) -> BoxType {
        Self::TYPE
    }
}

impl FullBox for MfhdBox {
    fn full_box_version(&self) -> u8 {
        0
    }

    fn full_box_flags(&self) -> FullBoxFlags {
        FullBoxFlags::new(0)
    }
}

/// [ISO/IEC 14496-12] TrackFragmentHeaderBox class (親: traf)
///
/// トラックフラグメントのヘッダー情報を格納する。
/// 省略可能なフィールドの有無は `flags` の各ビットで決まり、エンコード時には両者が一致している必要がある。
/// [`TfhdBox::new()`] と `with_*` メソッドで組み立てればフラグは自動で設定される。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct TfhdBox {
    pub flags: FullBoxFlags,
    pub track_id: u32,
    pub base_data_offset: Option<u64>,
    pub sample_description_index: Option<u32>,
    pub default_sample_duration: Option<u32>,
    pub default_sample_size: Option<u32>,
    pub default_sample_flags: Option<u32>,
}

impl TfhdBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::Normal(*b"tfhd");

    /// base_data_offset が存在することを示すフラグ
    pub const FLAG_BASE_DATA_OFFSET_PRESENT: u32 = 0x000001;

    /// sample_description_index が存在することを示すフラグ
    pub const FLAG_SAMPLE_DESCRIPTION_INDEX_PRESENT: u32 = 0x000002;

    /// default_sample_duration が存在することを示すフラグ
    pub const FLAG_DEFAULT_SAMPLE_DURATION_PRESENT: u32 = 0x000008;

    /// default_sample_size が存在することを示すフラグ
    pub const FLAG_DEFAULT_SAMPLE_SIZE_PRESENT: u32 = 0x000010;

    /// default_sample_flags が存在することを示すフラグ
    pub const FLAG_DEFAULT_SAMPLE_FLAGS_PRESENT: u32 = 0x000020;

    /// 継続時間が空であることを示すフラグ
    pub const FLAG_DURATION_IS_EMPTY: u32 = 0x010000;

    /// デフォルトの base_data_offset が moof の先頭であることを示すフラグ
    pub const FLAG_DEFAULT_BASE_IS_MOOF: u32 = 0x020000;

    /// 省略可能なフィールドを持たない [`TfhdBox`] を作成する
    pub const fn new(track_id: u32) -> Self {
        Self {
            flags: FullBoxFlags::empty(),
            track_id,
            base_data_offset: None,
            sample_description_index: None,
            default_sample_duration: None,
            default_sample_size: None,
            default_sample_flags: None,
        }
    }

    #[allow(missing_docs)]
    pub const fn with_base_data_offset(mut self, v: u64) -> Self {
        self.base_data_offset = Some(v);
        self.flags = self.flags.with(Self::FLAG_BASE_DATA_OFFSET_PRESENT);
        self
    }

    #[allow(missing_docs)]
    pub const fn with_sample_description_index(mut self, v: u32) -> Self {
        self.sample_description_index = Some(v);
        self.flags = self.flags.with(Self::FLAG_SAMPLE_DESCRIPTION_INDEX_PRESENT);
        self
    }

    #[allow(missing_docs)]
    pub const fn with_default_sample_duration(mut self, v: u32) -> Self {
        self.default_sample_duration = Some(v);
        self.flags = self.flags.with(Self::FLAG_DEFAULT_SAMPLE_DURATION_PRESENT);
        self
    }

    #[allow(missing_docs)]
    pub const fn with_default_sample_size(mut self, v: u32) -> Self {
        self.default_sample_size = Some(v);
        self.flags = self.flags.with(Self::FLAG_DEFAULT_SAMPLE_SIZE_PRESENT);
        self
    }

    #[allow(missing_docs)]
    pub const fn with_default_sample_flags(mut self, v: u32) -> Self {
        self.default_sample_flags = Some(v);
        self.flags = self.flags.with(Self::FLAG_DEFAULT_SAMPLE_FLAGS_PRESENT);
        self
    }

    /// `duration-is-empty` フラグを設定する
    pub const fn with_duration_is_empty(mut self) -> Self {
        self.flags = self.flags.with(Self::FLAG_DURATION_IS_EMPTY);
        self
    }

    /// `default-base-is-moof` フラグを設定する
    pub const fn with_default_base_is_moof(mut self) -> Self {
        self.flags = self.flags.with(Self::FLAG_DEFAULT_BASE_IS_MOOF);
        self
    }

    /// 継続時間が空かどうか
    pub const fn duration_is_empty(&self) -> bool {
        self.flags.contains(Self::FLAG_DURATION_IS_EMPTY)
    }

    /// デフォルトの base_data_offset が moof の先頭かどうか
    pub const fn default_base_is_moof(&self) -> bool {
        self.flags.contains(Self::FLAG_DEFAULT_BASE_IS_MOOF)
    }

    fn validate(&self) -> Result<()> {
        check_flagged_field(
            self.flags,
            Self::FLAG_BASE_DATA_OFFSET_PRESENT,
            &self.base_data_offset,
            "base_data_offset",
        )?;
        check_flagged_field(
            self.flags,
            Self::FLAG_SAMPLE_DESCRIPTION_INDEX_PRESENT,
            &self.sample_description_index,
            "sample_description_index",
        )?;
        check_flagged_field(
            self.flags,
            Self::FLAG_DEFAULT_SAMPLE_DURATION_PRESENT,
            &self.default_sample_duration,
            "default_sample_duration",
        )?;
        check_flagged_field(
            self.flags,
            Self::FLAG_DEFAULT_SAMPLE_SIZE_PRESENT,
            &self.default_sample_size,
            "default_sample_size",
        )?;
        check_flagged_field(
            self.flags,
            Self::FLAG_DEFAULT_SAMPLE_FLAGS_PRESENT,
            &self.default_sample_flags,
            "default_sample_flags",
        )
    }
}

impl Encode for TfhdBox {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        with_box_type(Self::TYPE, || {
            self.validate()?;

            let header = BoxHeader::new_variable_size(Self::TYPE);
            let mut offset = header.encode(buf)?;
            offset += FullBoxHeader::from_box(self).encode(&mut buf[offset..])?;
            offset += self.track_id.encode(&mut buf[offset..])?;

            // フラグのビット順に並べる
            encode_optional_field(&self.base_data_offset, buf, &mut offset)?;
            encode_optional_field(&self.sample_description_index, buf, &mut offset)?;
            encode_optional_field(&self.default_sample_duration, buf, &mut offset)?;
            encode_optional_field(&self.default_sample_size, buf, &mut offset)?;
            encode_optional_field(&self.default_sample_flags, buf, &mut offset)?;

            header.finalize_box_size(&mut buf[..offset])?;
            Ok(offset)
        })
    }
}

impl Decode for TfhdBox {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        with_box_type(Self::TYPE, || {
            let (header, payload) = BoxHeader::decode_header_and_payload(buf)?;
            header.box_type.expect(Self::TYPE)?;

            let mut offset = 0;
            let full_header = FullBoxHeader::decode_at(payload, &mut offset)?;
            let flags = full_header.flags;

            let track_id = u32::decode_at(payload, &mut offset)?;
            let base_data_offset = decode_flagged_field(
                flags,
                Self::FLAG_BASE_DATA_OFFSET_PRESENT,
                payload,
                &mut offset,
            )?;
            let sample_description_index = decode_flagged_field(
                flags,
                Self::FLAG_SAMPLE_DESCRIPTION_INDEX_PRESENT,
                payload,
                &mut offset,
            )?;
            let default_sample_duration = decode_flagged_field(
                flags,
                Self::FLAG_DEFAULT_SAMPLE_DURATION_PRESENT,
                payload,
                &mut offset,
            )?;
            let default_sample_size = decode_flagged_field(
                flags,
                Self::FLAG_DEFAULT_SAMPLE_SIZE_PRESENT,
                payload,
                &mut offset,
            )?;
            let default_sample_flags = decode_flagged_field(
                flags,
                Self::FLAG_DEFAULT_SAMPLE_FLAGS_PRESENT,
                payload,
                &mut offset,
            )?;

            Ok((
                Self {
                    flags,
                    track_id,
                    base_data_offset,
                    sample_description_index,
                    default_sample_duration,
                    default_sample_size,
                    default_sample_flags,
                },
                header.external_size() + payload.len(),
            ))
        })
    }
}

impl BaseBox for TfhdBox {
    fn box_type(&self) -> BoxType {
        Self::TYPE
    }
}

impl FullBox for TfhdBox {
    fn full_box_version(&self) -> u8 {
        0
    }

    fn full_box_flags(&self) -> FullBoxFlags {
        self.flags
    }
}

/// [`TfdtBox`] のベースデコード時間
///
/// バージョン 0 は 32-bit、バージョン 1 は 64-bit でエンコードされる
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum DecodeTime {
    V0(u32),
    V1(u64),
}

impl DecodeTime {
    /// 値を返す
    pub const fn get(self) -> u64 {
        match self {
            Self::V0(v) => v as u64,
            Self::V1(v) => v,
        }
    }
}

/// [ISO/IEC 14496-12] TrackFragmentBaseMediaDecodeTimeBox class (親: traf)
///
/// トラックフラグメントのベースデコード時間を格納する。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct TfdtBox {
    pub base_media_decode_time: DecodeTime,
}

impl TfdtBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::Normal(*b"tfdt");

    /// 値が 32-bit に収まる場合はバージョン 0、そうでなければバージョン 1 の [`TfdtBox`] を作成する
    pub fn new(base_media_decode_time: u64) -> Self {
        let base_media_decode_time = match u32::try_from(base_media_decode_time) {
            Ok(v) => DecodeTime::V0(v),
            Err(_) => DecodeTime::V1(base_media_decode_time),
        };
        Self {
            base_media_decode_time,
        }
    }

    /// バージョンを明示して [`TfdtBox`] を作成する
    pub fn with_version(version: u8, base_media_decode_time: u64) -> Result<Self> {
        let base_media_decode_time = match version {
            0 => u32::try_from(base_media_decode_time)
                .map(DecodeTime::V0)
                .map_err(|_| {
                    Error::invalid_input(format!(
                        "base_media_decode_time does not fit in version 0: {base_media_decode_time}"
                    ))
                    .with_box_type(Self::TYPE)
                })?,
            1 => DecodeTime::V1(base_media_decode_time),
            v => return Err(Error::unsupported_version(v).with_box_type(Self::TYPE)),
        };
        Ok(Self {
            base_media_decode_time,
        })
    }
}

impl Encode for TfdtBox {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let header = BoxHeader::new_variable_size(Self::TYPE);
        let mut offset = header.encode(buf)?;
        offset += FullBoxHeader::from_box(self).encode(&mut buf[offset..])?;
        match self.base_media_decode_time {
            DecodeTime::V0(v) => offset += v.encode(&mut buf[offset..])?,
            DecodeTime::V1(v) => offset += v.encode(&mut buf[offset..])?,
        }
        header.finalize_box_size(&mut buf[..offset])?;
        Ok(offset)
    }
}

impl Decode for TfdtBox {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        with_box_type(Self::TYPE, || {
            let (header, payload) = BoxHeader::decode_header_and_payload(buf)?;
            header.box_type.expect(Self::TYPE)?;

            let mut offset = 0;
            let full_header = FullBoxHeader::decode_at(payload, &mut offset)?;

            let base_media_decode_time = match full_header.version {
                0 => DecodeTime::V0(u32::decode_at(payload, &mut offset)?),
                1 => DecodeTime::V1(u64::decode_at(payload, &mut offset)?),
                v => return Err(Error::unsupported_version(v)),
            };

            Ok((
                Self {
                    base_media_decode_time,
                },
                header.external_size() + payload.len(),
            ))
        })
    }
}

impl BaseBox for TfdtBox {
    fn box_type(&self) -> BoxType {
        Self::TYPE
    }
}

impl FullBox for TfdtBox {
    fn full_box_version(&self) -> u8 {
        match self.base_media_decode_time {
            DecodeTime::V0(_) => 0,
            DecodeTime::V1(_) => 1,
        }
    }

    fn full_box_flags(&self) -> FullBoxFlags {
        FullBoxFlags::new(0)
    }
}

/// [`TrunSample`] のコンポジション時間オフセット
///
/// ビット幅はどちらも 32 で、バージョン 0 では符号なし、バージョン 1 では符号ありとして扱われる
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum CompositionOffset {
    Unsigned(u32),
    Signed(i32),
}

impl CompositionOffset {
    /// 値を返す
    pub const fn get(self) -> i64 {
        match self {
            Self::Unsigned(v) => v as i64,
            Self::Signed(v) => v as i64,
        }
    }

    const fn version(self) -> u8 {
        match self {
            Self::Unsigned(_) => 0,
            Self::Signed(_) => 1,
        }
    }
}

/// [ISO/IEC 14496-12] TrackRunBox class (親: traf)
///
/// サンプルのリストを格納する。フラグによって存在するフィールドが異なる。
///
/// サンプル単位のフィールドのフラグ（0x100, 0x200, 0x400, 0x800）が一つも立っていない場合、
/// サンプルごとのバイト列は存在しないため `samples` は空になり、サンプル数は `sample_count` のみで表現される。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct TrunBox {
    pub version: u8,
    pub flags: FullBoxFlags,
    pub sample_count: u32,
    pub data_offset: Option<i32>,
    pub first_sample_flags: Option<u32>,
    pub samples: Vec<TrunSample>,
}

impl TrunBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::Normal(*b"trun");

    /// data_offset が存在することを示すフラグ
    pub const FLAG_DATA_OFFSET_PRESENT: u32 = 0x000001;

    /// first_sample_flags が存在することを示すフラグ
    pub const FLAG_FIRST_SAMPLE_FLAGS_PRESENT: u32 = 0x000004;

    /// sample_duration が存在することを示すフラグ
    pub const FLAG_SAMPLE_DURATION_PRESENT: u32 = 0x000100;

    /// sample_size が存在することを示すフラグ
    pub const FLAG_SAMPLE_SIZE_PRESENT: u32 = 0x000200;

    /// sample_flags が存在することを示すフラグ
    pub const FLAG_SAMPLE_FLAGS_PRESENT: u32 = 0x000400;

    /// sample_composition_time_offset が存在することを示すフラグ
    pub const FLAG_SAMPLE_COMPOSITION_TIME_OFFSETS_PRESENT: u32 = 0x000800;

    const PER_SAMPLE_FLAGS: u32 = Self::FLAG_SAMPLE_DURATION_PRESENT
        | Self::FLAG_SAMPLE_SIZE_PRESENT
        | Self::FLAG_SAMPLE_FLAGS_PRESENT
        | Self::FLAG_SAMPLE_COMPOSITION_TIME_OFFSETS_PRESENT;

    /// サンプル列から [`TrunBox`] を作成する
    ///
    /// フラグは先頭サンプルが持つフィールドから、バージョンはコンポジション時間オフセットの種類から決まる。
    /// 全サンプルが同じフィールドを持っている必要がある（そうでない場合はエンコード時にエラーとなる）。
    pub fn from_samples(samples: Vec<TrunSample>) -> Self {
        let flags = Self::compute_sample_flags(&samples);
        let version = samples
            .iter()
            .find_map(|s| s.composition_time_offset)
            .map_or(0, CompositionOffset::version);
        let sample_count = u32::try_from(samples.len()).unwrap_or(u32::MAX);
        let samples = if flags & Self::PER_SAMPLE_FLAGS == 0 {
            Vec::new()
        } else {
            samples
        };
        Self {
            version,
            flags: FullBoxFlags::new(flags),
            sample_count,
            data_offset: None,
            first_sample_flags: None,
            samples,
        }
    }

    /// `data_offset` を設定する
    pub fn with_data_offset(mut self, data_offset: i32) -> Self {
        self.data_offset = Some(data_offset);
        self.flags = self.flags.with(Self::FLAG_DATA_OFFSET_PRESENT);
        self
    }

    /// `first_sample_flags` を設定する
    pub fn with_first_sample_flags(mut self, first_sample_flags: u32) -> Self {
        self.first_sample_flags = Some(first_sample_flags);
        self.flags = self.flags.with(Self::FLAG_FIRST_SAMPLE_FLAGS_PRESENT);
        self
    }

    fn compute_sample_flags(samples: &[TrunSample]) -> u32 {
        let mut flags = 0u32;
        if let Some(sample) = samples.first() {
            if sample.duration.is_some() {
                flags |= Self::FLAG_SAMPLE_DURATION_PRESENT;
            }
            if sample.size.is_some() {
                flags |= Self::FLAG_SAMPLE_SIZE_PRESENT;
            }
            if sample.flags.is_some() {
                flags |= Self::FLAG_SAMPLE_FLAGS_PRESENT;
            }
            if sample.composition_time_offset.is_some() {
                flags |= Self::FLAG_SAMPLE_COMPOSITION_TIME_OFFSETS_PRESENT;
            }
        }
        flags
    }

    /// サンプル一つ当たりのバイト数
    fn sample_size(flags: FullBoxFlags) -> usize {
        [
            Self::FLAG_SAMPLE_DURATION_PRESENT,
            Self::FLAG_SAMPLE_SIZE_PRESENT,
            Self::FLAG_SAMPLE_FLAGS_PRESENT,
            Self::FLAG_SAMPLE_COMPOSITION_TIME_OFFSETS_PRESENT,
        ]
        .into_iter()
        .filter(|mask| flags.contains(*mask))
        .count()
            * 4
    }

    fn validate(&self) -> Result<()> {
        if self.version > 1 {
            return Err(Error::unsupported_version(self.version));
        }

        let has_per_sample_fields = self.flags.get() & Self::PER_SAMPLE_FLAGS != 0;
        if (has_per_sample_fields || !self.samples.is_empty())
            && self.samples.len() != self.sample_count as usize
        {
            return Err(Error::field_count_mismatch(format!(
                "sample_count is {}, but {} samples are given",
                self.sample_count,
                self.samples.len()
            )));
        }

        check_flagged_field(
            self.flags,
            Self::FLAG_DATA_OFFSET_PRESENT,
            &self.data_offset,
            "data_offset",
        )?;
        check_flagged_field(
            self.flags,
            Self::FLAG_FIRST_SAMPLE_FLAGS_PRESENT,
            &self.first_sample_flags,
            "first_sample_flags",
        )?;

        for sample in &self.samples {
            check_flagged_field(
                self.flags,
                Self::FLAG_SAMPLE_DURATION_PRESENT,
                &sample.duration,
                "sample_duration",
            )?;
            check_flagged_field(
                self.flags,
                Self::FLAG_SAMPLE_SIZE_PRESENT,
                &sample.size,
                "sample_size",
            )?;
            check_flagged_field(
                self.flags,
                Self::FLAG_SAMPLE_FLAGS_PRESENT,
                &sample.flags,
                "sample_flags",
            )?;
            check_flagged_field(
                self.flags,
                Self::FLAG_SAMPLE_COMPOSITION_TIME_OFFSETS_PRESENT,
                &sample.composition_time_offset,
                "sample_composition_time_offset",
            )?;
            if let Some(cto) = sample.composition_time_offset
                && cto.version() != self.version
            {
                return Err(Error::invalid_input(format!(
                    "Composition time offset {cto:?} cannot be encoded in version {}",
                    self.version
                )));
            }
        }
        Ok(())
    }
}

impl Encode for TrunBox {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        with_box_type(Self::TYPE, || {
            self.validate()?;

            let header = BoxHeader::new_variable_size(Self::TYPE);
            let mut offset = header.encode(buf)?;
            offset += FullBoxHeader::from_box(self).encode(&mut buf[offset..])?;
            offset += self.sample_count.encode(&mut buf[offset..])?;
            encode_optional_field(&self.data_offset, buf, &mut offset)?;
            encode_optional_field(&self.first_sample_flags, buf, &mut offset)?;

            for sample in &self.samples {
                encode_optional_field(&sample.duration, buf, &mut offset)?;
                encode_optional_field(&sample.size, buf, &mut offset)?;
                encode_optional_field(&sample.flags, buf, &mut offset)?;
                match sample.composition_time_offset {
                    Some(CompositionOffset::Unsigned(v)) => {
                        offset += v.encode(&mut buf[offset..])?;
                    }
                    Some(CompositionOffset::Signed(v)) => {
                        offset += v.encode(&mut buf[offset..])?;
                    }
                    None => {}
                }
            }

            header.finalize_box_size(&mut buf[..offset])?;
            Ok(offset)
        })
    }
}

impl Decode for TrunBox {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        with_box_type(Self::TYPE, || {
            let (header, payload) = BoxHeader::decode_header_and_payload(buf)?;
            header.box_type.expect(Self::TYPE)?;

            let mut offset = 0;
            let full_header = FullBoxHeader::decode_at(payload, &mut offset)?;
            let flags = full_header.flags;
            let version = full_header.version;
            if version > 1 {
                return Err(Error::unsupported_version(version));
            }

            let sample_count = u32::decode_at(payload, &mut offset)?;
            let data_offset =
                decode_flagged_field(flags, Self::FLAG_DATA_OFFSET_PRESENT, payload, &mut offset)?;
            let first_sample_flags = decode_flagged_field(
                flags,
                Self::FLAG_FIRST_SAMPLE_FLAGS_PRESENT,
                payload,
                &mut offset,
            )?;

            let sample_size = Self::sample_size(flags);
            let mut samples = Vec::new();
            if sample_size > 0 {
                // 巨大な sample_count に対して無駄にループしないよう、先に必要なバイト数を確認する
                let required = sample_count as u64 * sample_size as u64;
                let remaining = (payload.len() - offset) as u64;
                if required > remaining {
                    return Err(Error::with_reason(
                        ErrorKind::TruncatedInput,
                        format!(
                            "{sample_count} samples require {required} bytes, but only {remaining} bytes remain"
                        ),
                    ));
                }

                samples.reserve(sample_count as usize);
                for _ in 0..sample_count {
                    let duration = decode_flagged_field(
                        flags,
                        Self::FLAG_SAMPLE_DURATION_PRESENT,
                        payload,
                        &mut offset,
                    )?;
                    let size = decode_flagged_field(
                        flags,
                        Self::FLAG_SAMPLE_SIZE_PRESENT,
                        payload,
                        &mut offset,
                    )?;
                    let sample_flags = decode_flagged_field(
                        flags,
                        Self::FLAG_SAMPLE_FLAGS_PRESENT,
                        payload,
                        &mut offset,
                    )?;
                    let composition_time_offset =
                        if flags.contains(Self::FLAG_SAMPLE_COMPOSITION_TIME_OFFSETS_PRESENT) {
                            if version == 1 {
                                Some(CompositionOffset::Signed(i32::decode_at(
                                    payload,
                                    &mut offset,
                                )?))
                            } else {
                                Some(CompositionOffset::Unsigned(u32::decode_at(
                                    payload,
                                    &mut offset,
                                )?))
                            }
                        } else {
                            None
                        };

                    samples.push(TrunSample {
                        duration,
                        size,
                        flags: sample_flags,
                        composition_time_offset,
                    });
                }
            }

            Ok((
                Self {
                    version,
                    flags,
                    sample_count,
                    data_offset,
                    first_sample_flags,
                    samples,
                },
                header.external_size() + payload.len(),
            ))
        })
    }
}

impl BaseBox for TrunBox {
    fn box_type(&self) -> BoxType {
        Self::TYPE
    }
}

impl FullBox for TrunBox {
    fn full_box_version(&self) -> u8 {
        self.version
    }

    fn full_box_flags(&self) -> FullBoxFlags {
        self.flags
    }
}

/// [`TrunBox`] のサンプル情報
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct TrunSample {
    pub duration: Option<u32>,
    pub size: Option<u32>,
    pub flags: Option<u32>,
    pub composition_time_offset: Option<CompositionOffset>,
}

/// [ISO/IEC 14496-12] SegmentIndexBox class
///
/// セグメントインデックスボックス。DASH などで使用される。
/// メディアセグメントへの参照情報を格納する。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct SidxBox {
    pub reference_id: u32,
    pub timescale: u32,
    pub earliest_presentation_time: u64,
    pub first_offset: u64,
    pub references: Vec<SidxReference>,
}

impl SidxBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::Normal(*b"sidx");
}

impl Encode for SidxBox {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let reference_count = u16::try_from(self.references.len()).map_err(|_| {
            Error::invalid_input(format!(
                "Too many sidx references: {}",
                self.references.len()
            ))
            .with_box_type(Self::TYPE)
        })?;

        let header = BoxHeader::new_variable_size(Self::TYPE);
        let mut offset = header.encode(buf)?;
        offset += FullBoxHeader::from_box(self).encode(&mut buf[offset..])?;

        offset += self.reference_id.encode(&mut buf[offset..])?;
        offset += self.timescale.encode(&mut buf[offset..])?;

        if self.full_box_version() == 1 {
            offset += self.earliest_presentation_time.encode(&mut buf[offset..])?;
            offset += self.first_offset.encode(&mut buf[offset..])?;
        } else {
            offset += (self.earliest_presentation_time as u32).encode(&mut buf[offset..])?;
            offset += (self.first_offset as u32).encode(&mut buf[offset..])?;
        }

        // reserved (16 bits)
        offset += 0u16.encode(&mut buf[offset..])?;
        offset += reference_count.encode(&mut buf[offset..])?;

        for reference in &self.references {
            // reference_type (1 bit) | referenced_size (31 bits)
            let first_word = ((reference.reference_type as u32) << 31)
                | (reference.referenced_size & 0x7FFFFFFF);
            offset += first_word.encode(&mut buf[offset..])?;

            offset += reference.subsegment_duration.encode(&mut buf[offset..])?;

            // starts_with_sap (1 bit) | sap_type (3 bits) | sap_delta_time (28 bits)
            let third_word = ((reference.starts_with_sap as u32) << 31)
                | ((reference.sap_type as u32 & 0x7) << 28)
                | (reference.sap_delta_time & 0x0FFFFFFF);
            offset += third_word.encode(&mut buf[offset..])?;
        }

        header.finalize_box_size(&mut buf[..offset])?;
        Ok(offset)
    }
}

impl Decode for SidxBox {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        with_box_type(Self::TYPE, || {
            let (header, payload) = BoxHeader::decode_header_and_payload(buf)?;
            header.box_type.expect(Self::TYPE)?;

            let mut offset = 0;
            let full_header = FullBoxHeader::decode_at(payload, &mut offset)?;

            let reference_id = u32::decode_at(payload, &mut offset)?;
            let timescale = u32::decode_at(payload, &mut offset)?;

            let (earliest_presentation_time, first_offset) = match full_header.version {
                0 => {
                    let ept = u32::decode_at(payload, &mut offset)? as u64;
                    let fo = u32::decode_at(payload, &mut offset)? as u64;
                    (ept, fo)
                }
                1 => {
                    let ept = u64::decode_at(payload, &mut offset)?;
                    let fo = u64::decode_at(payload, &mut offset)?;
                    (ept, fo)
                }
                v => return Err(Error::unsupported_version(v)),
            };

            // reserved (16 bits)
            let _reserved = u16::decode_at(payload, &mut offset)?;

            let reference_count = u16::decode_at(payload, &mut offset)?;

            let mut references = Vec::new();
            for _ in 0..reference_count {
                let first_word = u32::decode_at(payload, &mut offset)?;
                let reference_type = (first_word >> 31) != 0;
                let referenced_size = first_word & 0x7FFFFFFF;

                let subsegment_duration = u32::decode_at(payload, &mut offset)?;

                let third_word = u32::decode_at(payload, &mut offset)?;
                let starts_with_sap = (third_word >> 31) != 0;
                let sap_type = ((third_word >> 28) & 0x7) as u8;
                let sap_delta_time = third_word & 0x0FFFFFFF;

                references.push(SidxReference {
                    reference_type,
                    referenced_size,
                    subsegment_duration,
                    starts_with_sap,
                    sap_type,
                    sap_delta_time,
                });
            }

            Ok((
                Self {
                    reference_id,
                    timescale,
                    earliest_presentation_time,
                    first_offset,
                    references,
                },
                header.external_size() + payload.len(),
            ))
        })
    }
}

impl BaseBox for SidxBox {
    fn box_type(&self) -> BoxType {
        Self::TYPE
    }
}

impl FullBox for SidxBox {
    fn full_box_version(&self) -> u8 {
        if self.earliest_presentation_time > u32::MAX as u64 || self.first_offset > u32::MAX as u64
        {
            1
        } else {
            0
        }
    }

    fn full_box_flags(&self) -> FullBoxFlags {
        FullBoxFlags::new(0)
    }
}

/// [`SidxBox`] の参照情報
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct SidxReference {
    /// true の場合は sidx への参照、false の場合はメディアセグメントへの参照
    pub reference_type: bool,
    /// 参照先のサイズ（バイト）
    pub referenced_size: u32,
    /// サブセグメントの継続時間
    pub subsegment_duration: u32,
    /// SAP で始まるかどうか
    pub starts_with_sap: bool,
    /// SAP の種類 (0-7)
    pub sap_type: u8,
    /// SAP までのデルタ時間
    pub sap_delta_time: u32,
}
