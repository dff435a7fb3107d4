//! moov ボックス以下に配置されるヘッダー系ボックスと編集リストの定義
//!
//! このモジュールは内部的なもので、構造体などの外部への提供は boxes モジュールを通して行う
use alloc::{format, vec::Vec};

use crate::{
    BaseBox, BoxHeader, BoxType, Decode, Encode, Error, FixedPointNumber, FullBox, FullBoxFlags,
    FullBoxHeader, Mp4FileTime, Result,
    boxes::{count_u32, with_box_type},
};

/// mvhd / tkhd / mdhd の先頭に並ぶ時刻と尺のフィールド
///
/// `id` は mvhd / mdhd では timescale、tkhd では track_id にあたる。
/// tkhd では `id` と `duration` の間に 4 バイトの予約領域がある。
#[derive(Debug, Clone, Copy)]
struct HeaderTimes {
    creation_time: Mp4FileTime,
    modification_time: Mp4FileTime,
    id: u32,
    duration: u64,
    reserved_after_id: bool,
}

impl HeaderTimes {
    fn version(self) -> u8 {
        let wide = [
            self.creation_time.as_secs(),
            self.modification_time.as_secs(),
            self.duration,
        ]
        .into_iter()
        .any(|v| v > u32::MAX as u64);
        u8::from(wide)
    }

    fn encode(self, buf: &mut [u8]) -> Result<usize> {
        let wide = self.version() == 1;
        let mut offset = 0;
        for time in [self.creation_time, self.modification_time] {
            offset += if wide {
                time.as_secs().encode(&mut buf[offset..])?
            } else {
                (time.as_secs() as u32).encode(&mut buf[offset..])?
            };
        }
        offset += self.id.encode(&mut buf[offset..])?;
        if self.reserved_after_id {
            offset += [0u8; 4].encode(&mut buf[offset..])?;
        }
        offset += if wide {
            self.duration.encode(&mut buf[offset..])?
        } else {
            (self.duration as u32).encode(&mut buf[offset..])?
        };
        Ok(offset)
    }

    fn decode_at(
        payload: &[u8],
        offset: &mut usize,
        version: u8,
        reserved_after_id: bool,
    ) -> Result<Self> {
        let read_wide = |offset: &mut usize| match version {
            0 => u32::decode_at(payload, offset).map(u64::from),
            1 => u64::decode_at(payload, offset),
            v => Err(Error::unsupported_version(v)),
        };
        let creation_time = Mp4FileTime::from_secs(read_wide(offset)?);
        let modification_time = Mp4FileTime::from_secs(read_wide(offset)?);
        let id = u32::decode_at(payload, offset)?;
        if reserved_after_id {
            let _ = <[u8; 4]>::decode_at(payload, offset)?;
        }
        let duration = read_wide(offset)?;
        Ok(Self {
            creation_time,
            modification_time,
            id,
            duration,
            reserved_after_id,
        })
    }
}

/// [ISO/IEC 14496-12] MovieHeaderBox class (親: moov)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct MvhdBox {
    pub creation_time: Mp4FileTime,
    pub modification_time: Mp4FileTime,
    pub timescale: u32,
    pub duration: u64,
    pub rate: FixedPointNumber<i16, u16>,
    pub volume: FixedPointNumber<i8, u8>,
    pub matrix: [i32; 9],
    pub next_track_id: u32,
}

impl MvhdBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::Normal(*b"mvhd");

    /// [`MvhdBox::rate`] のデフォルト値（通常の再生速度）
    pub const DEFAULT_RATE: FixedPointNumber<i16, u16> = FixedPointNumber::new(1, 0);

    /// [`MvhdBox::volume`] のデフォルト値（最大音量）
    pub const DEFAULT_VOLUME: FixedPointNumber<i8, u8> = FixedPointNumber::new(1, 0);

    /// [`MvhdBox::matrix`] のデフォルト値
    pub const DEFAULT_MATRIX: [i32; 9] = [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000];

    fn times(&self) -> HeaderTimes {
        HeaderTimes {
            creation_time: self.creation_time,
            modification_time: self.modification_time,
            id: self.timescale,
            duration: self.duration,
            reserved_after_id: false,
        }
    }
}

impl Encode for MvhdBox {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let header = BoxHeader::new_variable_size(Self::TYPE);
        let mut offset = header.encode(buf)?;
        offset += FullBoxHeader::from_box(self).encode(&mut buf[offset..])?;
        offset += self.times().encode(&mut buf[offset..])?;
        offset += self.rate.encode(&mut buf[offset..])?;
        offset += self.volume.encode(&mut buf[offset..])?;
        offset += [0u8; 2 + 4 * 2].encode(&mut buf[offset..])?;
        offset += self.matrix.encode(&mut buf[offset..])?;
        offset += [0u8; 4 * 6].encode(&mut buf[offset..])?;
        offset += self.next_track_id.encode(&mut buf[offset..])?;
        header.finalize_box_size(&mut buf[..offset])?;
        Ok(offset)
    }
}

impl Decode for MvhdBox {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        with_box_type(Self::TYPE, || {
            let (header, payload) = BoxHeader::decode_header_and_payload(buf)?;
            header.box_type.expect(Self::TYPE)?;

            let mut offset = 0;
            let full_header = FullBoxHeader::decode_at(payload, &mut offset)?;
            let times = HeaderTimes::decode_at(payload, &mut offset, full_header.version, false)?;

            let rate = FixedPointNumber::decode_at(payload, &mut offset)?;
            let volume = FixedPointNumber::decode_at(payload, &mut offset)?;
            let _ = <[u8; 2 + 4 * 2]>::decode_at(payload, &mut offset)?;
            let matrix = <[i32; 9]>::decode_at(payload, &mut offset)?;
            let _ = <[u8; 4 * 6]>::decode_at(payload, &mut offset)?;
            let next_track_id = u32::decode_at(payload, &mut offset)?;

            let this = Self {
                creation_time: times.creation_time,
                modification_time: times.modification_time,
                timescale: times.id,
                duration: times.duration,
                rate,
                volume,
                matrix,
                next_track_id,
            };
            Ok((this, header.external_size() + payload.len()))
        })
    }
}

impl BaseBox for MvhdBox {
    fn box_type(&self) -> BoxType {
        Self::TYPE
    }
}

impl FullBox for MvhdBox {
    fn full_box_version(&self) -> u8 {
        self.times().version()
    }

    fn full_box_flags(&self) -> FullBoxFlags {
        FullBoxFlags::new(0)
    }
}

/// [ISO/IEC 14496-12] TrackHeaderBox class (親: trak)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct TkhdBox {
    pub flag_track_enabled: bool,
    pub flag_track_in_movie: bool,
    pub flag_track_in_preview: bool,
    pub flag_track_size_is_aspect_ratio: bool,

    pub creation_time: Mp4FileTime,
    pub modification_time: Mp4FileTime,
    pub track_id: u32,
    pub duration: u64,
    pub layer: i16,
    pub alternate_group: i16,
    pub volume: FixedPointNumber<i8, u8>,
    pub matrix: [i32; 9],
    pub width: FixedPointNumber<i16, u16>,
    pub height: FixedPointNumber<i16, u16>,
}

impl TkhdBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::Normal(*b"tkhd");

    /// [`TkhdBox::layer`] のデフォルト値
    pub const DEFAULT_LAYER: i16 = 0;

    /// [`TkhdBox::alternate_group`] のデフォルト値
    pub const DEFAULT_ALTERNATE_GROUP: i16 = 0;

    /// 音声用の [`TkhdBox::volume`] のデフォルト値（最大音量）
    pub const DEFAULT_AUDIO_VOLUME: FixedPointNumber<i8, u8> = FixedPointNumber::new(1, 0);

    /// 映像用の [`TkhdBox::volume`] のデフォルト値（無音）
    pub const DEFAULT_VIDEO_VOLUME: FixedPointNumber<i8, u8> = FixedPointNumber::new(0, 0);

    /// [`TkhdBox::matrix`] のデフォルト値
    pub const DEFAULT_MATRIX: [i32; 9] = [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000];

    fn times(&self) -> HeaderTimes {
        HeaderTimes {
            creation_time: self.creation_time,
            modification_time: self.modification_time,
            id: self.track_id,
            duration: self.duration,
            reserved_after_id: true,
        }
    }
}

impl Encode for TkhdBox {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let header = BoxHeader::new_variable_size(Self::TYPE);
        let mut offset = header.encode(buf)?;
        offset += FullBoxHeader::from_box(self).encode(&mut buf[offset..])?;
        offset += self.times().encode(&mut buf[offset..])?;
        offset += [0u8; 4 * 2].encode(&mut buf[offset..])?;
        offset += self.layer.encode(&mut buf[offset..])?;
        offset += self.alternate_group.encode(&mut buf[offset..])?;
        offset += self.volume.encode(&mut buf[offset..])?;
        offset += [0u8; 2].encode(&mut buf[offset..])?;
        offset += self.matrix.encode(&mut buf[offset..])?;
        offset += self.width.encode(&mut buf[offset..])?;
        offset += self.height.encode(&mut buf[offset..])?;
        header.finalize_box_size(&mut buf[..offset])?;
        Ok(offset)
    }
}

impl Decode for TkhdBox {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        with_box_type(Self::TYPE, || {
            let (header, payload) = BoxHeader::decode_header_and_payload(buf)?;
            header.box_type.expect(Self::TYPE)?;

            let mut offset = 0;
            let full_header = FullBoxHeader::decode_at(payload, &mut offset)?;
            let flags = full_header.flags;
            let times = HeaderTimes::decode_at(payload, &mut offset, full_header.version, true)?;

            let _ = <[u8; 4 * 2]>::decode_at(payload, &mut offset)?;
            let layer = i16::decode_at(payload, &mut offset)?;
            let alternate_group = i16::decode_at(payload, &mut offset)?;
            let volume = FixedPointNumber::decode_at(payload, &mut offset)?;
            let _ = <[u8; 2]>::decode_at(payload, &mut offset)?;
            let matrix = <[i32; 9]>::decode_at(payload, &mut offset)?;
            let width = FixedPointNumber::decode_at(payload, &mut offset)?;
            let height = FixedPointNumber::decode_at(payload, &mut offset)?;

            let this = Self {
                flag_track_enabled: flags.is_set(0),
                flag_track_in_movie: flags.is_set(1),
                flag_track_in_preview: flags.is_set(2),
                flag_track_size_is_aspect_ratio: flags.is_set(3),
                creation_time: times.creation_time,
                modification_time: times.modification_time,
                track_id: times.id,
                duration: times.duration,
                layer,
                alternate_group,
                volume,
                matrix,
                width,
                height,
            };
            Ok((this, header.external_size() + payload.len()))
        })
    }
}

impl BaseBox for TkhdBox {
    fn box_type(&self) -> BoxType {
        Self::TYPE
    }
}

impl FullBox for TkhdBox {
    fn full_box_version(&self) -> u8 {
        self.times().version()
    }

    fn full_box_flags(&self) -> FullBoxFlags {
        FullBoxFlags::from_flags([
            (0, self.flag_track_enabled),
            (1, self.flag_track_in_movie),
            (2, self.flag_track_in_preview),
            (3, self.flag_track_size_is_aspect_ratio),
        ])
    }
}

/// [ISO/IEC 14496-12] MediaHeaderBox class (親: mdia)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct MdhdBox {
    pub creation_time: Mp4FileTime,
    pub modification_time: Mp4FileTime,
    pub timescale: u32,
    pub duration: u64,

    /// ISO-639-2/T language code
    pub language: [u8; 3],
}

impl MdhdBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::Normal(*b"mdhd");

    /// 未定義を表す言語コード
    pub const LANGUAGE_UNDEFINED: [u8; 3] = *b"und";

    fn times(&self) -> HeaderTimes {
        HeaderTimes {
            creation_time: self.creation_time,
            modification_time: self.modification_time,
            id: self.timescale,
            duration: self.duration,
            reserved_after_id: false,
        }
    }
}

impl Encode for MdhdBox {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        // 各文字は 0x60 を引いた 5 ビットに詰める
        let mut language: u16 = 0;
        for l in &self.language {
            let Some(code) = l.checked_sub(0x60).filter(|c| *c < 0x20) else {
                return Err(Error::invalid_input(format!(
                    "Invalid language code: {:?}",
                    self.language
                ))
                .with_box_type(Self::TYPE));
            };
            language = (language << 5) | code as u16;
        }

        let header = BoxHeader::new_variable_size(Self::TYPE);
        let mut offset = header.encode(buf)?;
        offset += FullBoxHeader::from_box(self).encode(&mut buf[offset..])?;
        offset += self.times().encode(&mut buf[offset..])?;
        offset += language.encode(&mut buf[offset..])?;
        offset += [0u8; 2].encode(&mut buf[offset..])?;
        header.finalize_box_size(&mut buf[..offset])?;
        Ok(offset)
    }
}

impl Decode for MdhdBox {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        with_box_type(Self::TYPE, || {
            let (header, payload) = BoxHeader::decode_header_and_payload(buf)?;
            header.box_type.expect(Self::TYPE)?;

            let mut offset = 0;
            let full_header = FullBoxHeader::decode_at(payload, &mut offset)?;
            let times = HeaderTimes::decode_at(payload, &mut offset, full_header.version, false)?;

            let packed = u16::decode_at(payload, &mut offset)?;
            let language = [10, 5, 0].map(|shift| ((packed >> shift) & 0b11111) as u8 + 0x60);
            let _ = <[u8; 2]>::decode_at(payload, &mut offset)?;

            let this = Self {
                creation_time: times.creation_time,
                modification_time: times.modification_time,
                timescale: times.id,
                duration: times.duration,
                language,
            };
            Ok((this, header.external_size() + payload.len()))
        })
    }
}

impl BaseBox for MdhdBox {
    fn box_type(&self) -> BoxType {
        Self::TYPE
    }
}

impl FullBox for MdhdBox {
    fn full_box_version(&self) -> u8 {
        self.times().version()
    }

    fn full_box_flags(&self) -> FullBoxFlags {
        FullBoxFlags::new(0)
    }
}

/// [`ElstBox`] に含まれるエントリー
///
/// `D` と `T` はバージョン 0 では `u32` / `i32`、バージョン 1 では `u64` / `i64` となる
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct ElstEntry<D = u64, T = i64> {
    pub segment_duration: D,
    pub media_time: T,
    pub media_rate: FixedPointNumber<i16, u16>,
}

impl ElstEntry<u32, i32> {
    /// 空の編集（メディアを参照しない区間）かどうか
    pub const fn is_empty_edit(&self) -> bool {
        self.media_time == -1
    }
}

impl ElstEntry<u64, i64> {
    /// エントリーを作成する（再生レートは 1.0）
    pub const fn new(segment_duration: u64, media_time: i64) -> Self {
        Self {
            segment_duration,
            media_time,
            media_rate: ElstBox::DEFAULT_MEDIA_RATE,
        }
    }

    /// 空の編集（メディアを参照しない区間）を作成する
    pub const fn empty_edit(segment_duration: u64) -> Self {
        Self::new(segment_duration, ElstBox::EMPTY_EDIT_MEDIA_TIME)
    }

    /// 空の編集（メディアを参照しない区間）かどうか
    pub const fn is_empty_edit(&self) -> bool {
        self.media_time == ElstBox::EMPTY_EDIT_MEDIA_TIME
    }

    fn narrow(&self) -> Option<ElstEntry<u32, i32>> {
        Some(ElstEntry {
            segment_duration: u32::try_from(self.segment_duration).ok()?,
            media_time: i32::try_from(self.media_time).ok()?,
            media_rate: self.media_rate,
        })
    }
}

impl From<ElstEntry<u32, i32>> for ElstEntry<u64, i64> {
    fn from(entry: ElstEntry<u32, i32>) -> Self {
        Self {
            segment_duration: entry.segment_duration as u64,
            media_time: entry.media_time as i64,
            media_rate: entry.media_rate,
        }
    }
}

/// [`ElstBox`] のエントリー列（バージョンごとのフィールド幅を型で表現する）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ElstEntries {
    V0(Vec<ElstEntry<u32, i32>>),
    V1(Vec<ElstEntry<u64, i64>>),
}

impl ElstEntries {
    /// エントリー数を返す
    pub fn len(&self) -> usize {
        match self {
            Self::V0(entries) => entries.len(),
            Self::V1(entries) => entries.len(),
        }
    }

    /// エントリーが空かどうか
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [ISO/IEC 14496-12] EditListBox class (親: edts)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct ElstBox {
    pub entries: ElstEntries,
}

impl ElstBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::Normal(*b"elst");

    /// 空の編集を表す `media_time` の値
    pub const EMPTY_EDIT_MEDIA_TIME: i64 = -1;

    /// 再生レートのデフォルト値 (1.0)
    pub const DEFAULT_MEDIA_RATE: FixedPointNumber<i16, u16> = FixedPointNumber::new(1, 0);

    /// エントリー列から [`ElstBox`] を作成する
    ///
    /// 全ての値が 32-bit に収まる場合はバージョン 0、そうでなければバージョン 1 が選ばれる
    pub fn from_entries(entries: Vec<ElstEntry<u64, i64>>) -> Result<Self> {
        check_media_times(entries.iter().map(|e| e.media_time))?;
        let narrowed: Option<Vec<_>> = entries.iter().map(ElstEntry::narrow).collect();
        let entries = match narrowed {
            Some(entries) => ElstEntries::V0(entries),
            None => ElstEntries::V1(entries),
        };
        Ok(Self { entries })
    }

    /// バージョンを明示して [`ElstBox`] を作成する
    ///
    /// バージョン 0 で 32-bit に収まらない値がある場合は [`ErrorKind::InvalidInput`](crate::ErrorKind::InvalidInput)、
    /// 0 と 1 以外のバージョンは [`ErrorKind::UnsupportedVersion`](crate::ErrorKind::UnsupportedVersion) となる
    pub fn with_version(version: u8, entries: Vec<ElstEntry<u64, i64>>) -> Result<Self> {
        check_media_times(entries.iter().map(|e| e.media_time))?;
        let entries = match version {
            0 => ElstEntries::V0(
                entries
                    .iter()
                    .map(|e| {
                        e.narrow().ok_or_else(|| {
                            Error::invalid_input(format!(
                                "Edit list entry does not fit in version 0: {e:?}"
                            ))
                        })
                    })
                    .collect::<Result<_>>()?,
            ),
            1 => ElstEntries::V1(entries),
            v => return Err(Error::unsupported_version(v)),
        };
        Ok(Self { entries })
    }

    /// 全エントリーを 64-bit 幅に揃えて返す
    pub fn wide_entries(&self) -> Vec<ElstEntry<u64, i64>> {
        match &self.entries {
            ElstEntries::V0(entries) => entries.iter().copied().map(ElstEntry::from).collect(),
            ElstEntries::V1(entries) => entries.clone(),
        }
    }
}

fn check_media_times<I: IntoIterator<Item = i64>>(media_times: I) -> Result<()> {
    for media_time in media_times {
        if media_time < ElstBox::EMPTY_EDIT_MEDIA_TIME {
            return Err(Error::invalid_input(format!(
                "Invalid media_time: {media_time} (only -1 is allowed as a negative value)"
            ))
            .with_box_type(ElstBox::TYPE));
        }
    }
    Ok(())
}

impl Encode for ElstBox {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        match &self.entries {
            ElstEntries::V0(entries) => {
                check_media_times(entries.iter().map(|e| e.media_time as i64))?
            }
            ElstEntries::V1(entries) => check_media_times(entries.iter().map(|e| e.media_time))?,
        }

        let header = BoxHeader::new_variable_size(Self::TYPE);
        let mut offset = header.encode(buf)?;
        offset += FullBoxHeader::from_box(self).encode(&mut buf[offset..])?;
        offset += count_u32(self.entries.len(), "edit list entries")?.encode(&mut buf[offset..])?;
        match &self.entries {
            ElstEntries::V0(entries) => {
                for entry in entries {
                    offset += entry.segment_duration.encode(&mut buf[offset..])?;
                    offset += entry.media_time.encode(&mut buf[offset..])?;
                    offset += entry.media_rate.encode(&mut buf[offset..])?;
                }
            }
            ElstEntries::V1(entries) => {
                for entry in entries {
                    offset += entry.segment_duration.encode(&mut buf[offset..])?;
                    offset += entry.media_time.encode(&mut buf[offset..])?;
                    offset += entry.media_rate.encode(&mut buf[offset..])?;
                }
            }
        }
        header.finalize_box_size(&mut buf[..offset])?;
        Ok(offset)
    }
}

impl Decode for ElstBox {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        with_box_type(Self::TYPE, || {
            let (header, payload) = BoxHeader::decode_header_and_payload(buf)?;
            header.box_type.expect(Self::TYPE)?;

            let mut offset = 0;
            let full_header = FullBoxHeader::decode_at(payload, &mut offset)?;
            let count = u32::decode_at(payload, &mut offset)?;

            let entries = match full_header.version {
                0 => {
                    let mut entries = Vec::new();
                    for _ in 0..count {
                        entries.push(ElstEntry {
                            segment_duration: u32::decode_at(payload, &mut offset)?,
                            media_time: i32::decode_at(payload, &mut offset)?,
                            media_rate: FixedPointNumber::decode_at(payload, &mut offset)?,
                        });
                    }
                    ElstEntries::V0(entries)
                }
                1 => {
                    let mut entries = Vec::new();
                    for _ in 0..count {
                        entries.push(ElstEntry {
                            segment_duration: u64::decode_at(payload, &mut offset)?,
                            media_time: i64::decode_at(payload, &mut offset)?,
                            media_rate: FixedPointNumber::decode_at(payload, &mut offset)?,
                        });
                    }
                    ElstEntries::V1(entries)
                }
                v => return Err(Error::unsupported_version(v)),
            };

            Ok((Self { entries }, header.external_size() + payload.len()))
        })
    }
}

impl BaseBox for ElstBox {
    fn box_type(&self) -> BoxType {
        Self::TYPE
    }
}

impl FullBox for ElstBox {
    fn full_box_version(&self) -> u8 {
        match self.entries {
            ElstEntries::V0(_) => 0,
            ElstEntries::V1(_) => 1,
        }
    }

    fn full_box_flags(&self) -> FullBoxFlags {
        FullBoxFlags::new(0)
    }
}
