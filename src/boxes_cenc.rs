//! Common Encryption (CENC) 関連のボックス定義
//!
//! このモジュールは内部的なもので、構造体などの外部への提供は boxes モジュールを通して行う
use alloc::{format, vec::Vec};

use crate::{
    BaseBox, BoxHeader, BoxType, Decode, Encode, Error, ErrorKind, FullBox, FullBoxFlags,
    FullBoxHeader, Result, Uint,
    boxes::{Brand, check_flagged_field, count_u32, decode_flagged_field, with_box_type},
};

/// [`SencBox`] のフラグで上書きされる TrackEncryptionBox のパラメータ
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct SencOverride {
    pub algorithm_id: Uint<u32, 24>,
    pub iv_size: u8,
    pub kid: [u8; 16],
}

impl Encode for SencOverride {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let mut offset = self.algorithm_id.encode(buf)?;
        offset += self.iv_size.encode(&mut buf[offset..])?;
        offset += self.kid.encode(&mut buf[offset..])?;
        Ok(offset)
    }
}

impl Decode for SencOverride {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut offset = 0;
        let algorithm_id = Uint::decode_at(buf, &mut offset)?;
        let iv_size = u8::decode_at(buf, &mut offset)?;
        let kid = <[u8; 16]>::decode_at(buf, &mut offset)?;
        Ok((
            Self {
                algorithm_id,
                iv_size,
                kid,
            },
            offset,
        ))
    }
}

/// [`SencSample`] のサブサンプル
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct SencSubsample {
    pub bytes_of_clear_data: u16,
    pub bytes_of_protected_data: u32,
}

impl Encode for SencSubsample {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let mut offset = self.bytes_of_clear_data.encode(buf)?;
        offset += self.bytes_of_protected_data.encode(&mut buf[offset..])?;
        Ok(offset)
    }
}

impl Decode for SencSubsample {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut offset = 0;
        let bytes_of_clear_data = u16::decode_at(buf, &mut offset)?;
        let bytes_of_protected_data = u32::decode_at(buf, &mut offset)?;
        Ok((
            Self {
                bytes_of_clear_data,
                bytes_of_protected_data,
            },
            offset,
        ))
    }
}

/// [`SencBox`] のサンプルごとの暗号化情報
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct SencSample {
    pub iv: Vec<u8>,
    pub subsamples: Option<Vec<SencSubsample>>,
}

/// [ISO/IEC 23001-7] SampleEncryptionBox class (親: traf)
///
/// サンプルごとの IV とサブサンプル暗号化情報を格納する。
///
/// IV のバイト数はボックス内には通常含まれず、トラック側（tenc）で決まる。
/// そのため、上書きパラメータを持たない場合は [`SencBox::decode_with_iv_size()`] で明示的に指定してデコードする必要がある。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct SencBox {
    pub flags: FullBoxFlags,
    pub override_params: Option<SencOverride>,
    pub samples: Vec<SencSample>,
}

impl SencBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::Normal(*b"senc");

    /// TrackEncryptionBox のパラメータを上書きすることを示すフラグ
    pub const FLAG_OVERRIDE_TRACK_ENCRYPTION_BOX_PARAMETERS: u32 = 0x000001;

    /// 各サンプルがサブサンプル情報を持つことを示すフラグ
    pub const FLAG_USE_SUBSAMPLE_ENCRYPTION: u32 = 0x000002;

    /// サンプル列から [`SencBox`] を作成する
    ///
    /// サブサンプルのフラグは先頭サンプルから決まる
    pub fn new(samples: Vec<SencSample>) -> Self {
        let use_subsamples = samples.first().is_some_and(|s| s.subsamples.is_some());
        let flags = if use_subsamples {
            FullBoxFlags::new(Self::FLAG_USE_SUBSAMPLE_ENCRYPTION)
        } else {
            FullBoxFlags::empty()
        };
        Self {
            flags,
            override_params: None,
            samples,
        }
    }

    /// 上書きパラメータを設定する
    pub fn with_override(mut self, params: SencOverride) -> Self {
        self.override_params = Some(params);
        self.flags = self
            .flags
            .with(Self::FLAG_OVERRIDE_TRACK_ENCRYPTION_BOX_PARAMETERS);
        self
    }

    /// IV のバイト数を指定してデコードする
    ///
    /// ボックスが上書きパラメータを持つ場合は、そちらの `iv_size` が優先される
    pub fn decode_with_iv_size(buf: &[u8], iv_size: u8) -> Result<(Self, usize)> {
        with_box_type(Self::TYPE, || {
            let (header, payload) = BoxHeader::decode_header_and_payload(buf)?;
            header.box_type.expect(Self::TYPE)?;

            let mut offset = 0;
            let full_header = FullBoxHeader::decode_at(payload, &mut offset)?;
            let flags = full_header.flags;

            let override_params: Option<SencOverride> = decode_flagged_field(
                flags,
                Self::FLAG_OVERRIDE_TRACK_ENCRYPTION_BOX_PARAMETERS,
                payload,
                &mut offset,
            )?;
            let iv_size = override_params.as_ref().map_or(iv_size, |p| p.iv_size) as usize;
            let use_subsamples = flags.contains(Self::FLAG_USE_SUBSAMPLE_ENCRYPTION);

            let sample_count = u32::decode_at(payload, &mut offset)?;

            // サンプルあたりの最小バイト数から、宣言されたサンプル数が収まるかを先に確認する
            let remaining = (payload.len() - offset) as u64;
            let min_sample_size = (iv_size + if use_subsamples { 2 } else { 0 }) as u64;
            if min_sample_size == 0 {
                if sample_count as u64 > remaining {
                    return Err(Error::invalid_data(format!(
                        "{sample_count} zero-length samples declared in a {remaining} bytes payload"
                    )));
                }
            } else if sample_count as u64 * min_sample_size > remaining {
                return Err(Error::with_reason(
                    ErrorKind::TruncatedInput,
                    format!(
                        "{sample_count} samples require at least {} bytes, but only {remaining} bytes remain",
                        sample_count as u64 * min_sample_size
                    ),
                ));
            }

            let mut samples = Vec::with_capacity(sample_count as usize);
            for _ in 0..sample_count {
                Error::check_input_size(iv_size, payload.get(offset..).unwrap_or_default())?;
                let iv = payload[offset..offset + iv_size].to_vec();
                offset += iv_size;

                let subsamples = if use_subsamples {
                    let subsample_count = u16::decode_at(payload, &mut offset)?;
                    let mut subsamples = Vec::with_capacity(subsample_count as usize);
                    for _ in 0..subsample_count {
                        subsamples.push(SencSubsample::decode_at(payload, &mut offset)?);
                    }
                    Some(subsamples)
                } else {
                    None
                };

                samples.push(SencSample { iv, subsamples });
            }

            Ok((
                Self {
                    flags,
                    override_params,
                    samples,
                },
                header.external_size() + payload.len(),
            ))
        })
    }

    fn validate(&self) -> Result<()> {
        check_flagged_field(
            self.flags,
            Self::FLAG_OVERRIDE_TRACK_ENCRYPTION_BOX_PARAMETERS,
            &self.override_params,
            "override_params",
        )?;

        let expected_iv_size = match (&self.override_params, self.samples.first()) {
            (Some(p), _) => Some(p.iv_size as usize),
            (None, Some(s)) => Some(s.iv.len()),
            (None, None) => None,
        };

        // IV もサブサンプル数も持たないサンプルはバイト列に現れず、デコード時に個数を確認できない
        if expected_iv_size == Some(0)
            && !self.flags.contains(Self::FLAG_USE_SUBSAMPLE_ENCRYPTION)
            && !self.samples.is_empty()
        {
            return Err(Error::invalid_input(format!(
                "{} samples have neither IV nor subsample information",
                self.samples.len()
            )));
        }

        for sample in &self.samples {
            check_flagged_field(
                self.flags,
                Self::FLAG_USE_SUBSAMPLE_ENCRYPTION,
                &sample.subsamples,
                "subsamples",
            )?;
            if Some(sample.iv.len()) != expected_iv_size {
                return Err(Error::invalid_input(format!(
                    "Inconsistent IV size: expected {expected_iv_size:?}, got {}",
                    sample.iv.len()
                )));
            }
            if let Some(subsamples) = &sample.subsamples
                && u16::try_from(subsamples.len()).is_err()
            {
                return Err(Error::invalid_input(format!(
                    "Too many subsamples: {}",
                    subsamples.len()
                )));
            }
        }
        Ok(())
    }
}

impl Encode for SencBox {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        with_box_type(Self::TYPE, || {
            self.validate()?;
            let sample_count = count_u32(self.samples.len(), "samples")?;

            let header = BoxHeader::new_variable_size(Self::TYPE);
            let mut offset = header.encode(buf)?;
            offset += FullBoxHeader::from_box(self).encode(&mut buf[offset..])?;
            if let Some(params) = &self.override_params {
                offset += params.encode(&mut buf[offset..])?;
            }
            offset += sample_count.encode(&mut buf[offset..])?;

            for sample in &self.samples {
                offset += sample.iv.encode(&mut buf[offset..])?;
                if let Some(subsamples) = &sample.subsamples {
                    offset += (subsamples.len() as u16).encode(&mut buf[offset..])?;
                    for subsample in subsamples {
                        offset += subsample.encode(&mut buf[offset..])?;
                    }
                }
            }

            header.finalize_box_size(&mut buf[..offset])?;
            Ok(offset)
        })
    }
}

impl Decode for SencBox {
    /// 上書きパラメータを持つボックスのみデコードできる
    ///
    /// それ以外の場合は [`ErrorKind::InvalidInput`] となるため [`SencBox::decode_with_iv_size()`] を使うこと
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        with_box_type(Self::TYPE, || {
            let (header, payload) = BoxHeader::decode_header_and_payload(buf)?;
            header.box_type.expect(Self::TYPE)?;

            let (full_header, _) = FullBoxHeader::decode(payload)?;
            if !full_header
                .flags
                .contains(Self::FLAG_OVERRIDE_TRACK_ENCRYPTION_BOX_PARAMETERS)
            {
                return Err(Error::invalid_input(
                    "IV size is unknown: use SencBox::decode_with_iv_size()",
                ));
            }
            Self::decode_with_iv_size(buf, 0)
        })
    }
}

impl BaseBox for SencBox {
    fn box_type(&self) -> BoxType {
        Self::TYPE
    }
}

impl FullBox for SencBox {
    fn full_box_version(&self) -> u8 {
        0
    }

    fn full_box_flags(&self) -> FullBoxFlags {
        self.flags
    }
}

/// [`SaioBox`] と [`SaizBox`] が持つ補助情報の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct AuxInfoType {
    pub aux_info_type: Brand,
    pub aux_info_type_parameter: u32,
}

impl Encode for AuxInfoType {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let mut offset = self.aux_info_type.encode(buf)?;
        offset += self.aux_info_type_parameter.encode(&mut buf[offset..])?;
        Ok(offset)
    }
}

impl Decode for AuxInfoType {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut offset = 0;
        let aux_info_type = Brand::decode_at(buf, &mut offset)?;
        let aux_info_type_parameter = u32::decode_at(buf, &mut offset)?;
        Ok((
            Self {
                aux_info_type,
                aux_info_type_parameter,
            },
            offset,
        ))
    }
}

/// [`SaioBox`] のオフセット表
///
/// バージョン 0 は 32-bit、バージョン 1 は 64-bit でエンコードされる
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum SaioOffsets {
    V0(Vec<u32>),
    V1(Vec<u64>),
}

impl SaioOffsets {
    /// エントリー数を返す
    pub fn len(&self) -> usize {
        match self {
            Self::V0(v) => v.len(),
            Self::V1(v) => v.len(),
        }
    }

    /// エントリーが空かどうか
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 各オフセットを [`u64`] として返す
    pub fn to_u64_vec(&self) -> Vec<u64> {
        match self {
            Self::V0(v) => v.iter().map(|&x| x as u64).collect(),
            Self::V1(v) => v.clone(),
        }
    }
}

/// [ISO/IEC 14496-12] SampleAuxiliaryInformationOffsetsBox class (親: traf)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct SaioBox {
    pub flags: FullBoxFlags,
    pub aux_info: Option<AuxInfoType>,
    pub offsets: SaioOffsets,
}

impl SaioBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::Normal(*b"saio");

    /// aux_info_type と aux_info_type_parameter が存在することを示すフラグ
    pub const FLAG_AUX_INFO_TYPE_PRESENT: u32 = 0x000001;

    /// 全てのオフセットが 32-bit に収まる場合はバージョン 0、そうでなければバージョン 1 の [`SaioBox`] を作成する
    pub fn new(offsets: Vec<u64>) -> Self {
        let offsets = if offsets.iter().all(|&x| x <= u32::MAX as u64) {
            SaioOffsets::V0(offsets.into_iter().map(|x| x as u32).collect())
        } else {
            SaioOffsets::V1(offsets)
        };
        Self {
            flags: FullBoxFlags::empty(),
            aux_info: None,
            offsets,
        }
    }

    /// 補助情報の種別を設定する
    pub fn with_aux_info(mut self, aux_info: AuxInfoType) -> Self {
        self.aux_info = Some(aux_info);
        self.flags = self.flags.with(Self::FLAG_AUX_INFO_TYPE_PRESENT);
        self
    }
}

impl Encode for SaioBox {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        with_box_type(Self::TYPE, || {
            check_flagged_field(
                self.flags,
                Self::FLAG_AUX_INFO_TYPE_PRESENT,
                &self.aux_info,
                "aux_info_type",
            )?;
            let entry_count = count_u32(self.offsets.len(), "offsets")?;

            let header = BoxHeader::new_variable_size(Self::TYPE);
            let mut offset = header.encode(buf)?;
            offset += FullBoxHeader::from_box(self).encode(&mut buf[offset..])?;
            if let Some(aux_info) = &self.aux_info {
                offset += aux_info.encode(&mut buf[offset..])?;
            }
            offset += entry_count.encode(&mut buf[offset..])?;
            match &self.offsets {
                SaioOffsets::V0(offsets) => {
                    for v in offsets {
                        offset += v.encode(&mut buf[offset..])?;
                    }
                }
                SaioOffsets::V1(offsets) => {
                    for v in offsets {
                        offset += v.encode(&mut buf[offset..])?;
                    }
                }
            }

            header.finalize_box_size(&mut buf[..offset])?;
            Ok(offset)
        })
    }
}

impl Decode for SaioBox {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        with_box_type(Self::TYPE, || {
            let (header, payload) = BoxHeader::decode_header_and_payload(buf)?;
            header.box_type.expect(Self::TYPE)?;

            let mut offset = 0;
            let full_header = FullBoxHeader::decode_at(payload, &mut offset)?;
            let flags = full_header.flags;
            let entry_size = match full_header.version {
                0 => 4,
                1 => 8,
                v => return Err(Error::unsupported_version(v)),
            };

            let aux_info =
                decode_flagged_field(flags, Self::FLAG_AUX_INFO_TYPE_PRESENT, payload, &mut offset)?;
            let entry_count = u32::decode_at(payload, &mut offset)?;
            Error::check_input_size(
                (entry_count as usize).saturating_mul(entry_size),
                payload.get(offset..).unwrap_or_default(),
            )?;

            let offsets = if full_header.version == 0 {
                let mut offsets = Vec::with_capacity(entry_count as usize);
                for _ in 0..entry_count {
                    offsets.push(u32::decode_at(payload, &mut offset)?);
                }
                SaioOffsets::V0(offsets)
            } else {
                let mut offsets = Vec::with_capacity(entry_count as usize);
                for _ in 0..entry_count {
                    offsets.push(u64::decode_at(payload, &mut offset)?);
                }
                SaioOffsets::V1(offsets)
            };

            Ok((
                Self {
                    flags,
                    aux_info,
                    offsets,
                },
                header.external_size() + payload.len(),
            ))
        })
    }
}

impl BaseBox for SaioBox {
    fn box_type(&self) -> BoxType {
        Self::TYPE
    }
}

impl FullBox for SaioBox {
    fn full_box_version(&self) -> u8 {
        match self.offsets {
            SaioOffsets::V0(_) => 0,
            SaioOffsets::V1(_) => 1,
        }
    }

    fn full_box_flags(&self) -> FullBoxFlags {
        self.flags
    }
}

/// [ISO/IEC 14496-12] SampleAuxiliaryInformationSizesBox class (親: traf)
///
/// `default_sample_info_size` が 0 の場合のみ、サンプルごとのサイズ表 `sample_info_sizes` が存在する。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct SaizBox {
    pub flags: FullBoxFlags,
    pub aux_info: Option<AuxInfoType>,
    pub default_sample_info_size: u8,
    pub sample_count: u32,
    pub sample_info_sizes: Vec<u8>,
}

impl SaizBox {
    /// ボックス種別
    pub const TYPE: BoxType = BoxType::Normal(*b"saiz");

    /// aux_info_type と aux_info_type_parameter が存在することを示すフラグ
    pub const FLAG_AUX_INFO_TYPE_PRESENT: u32 = 0x000001;

    /// 全サンプルが同じサイズの [`SaizBox`] を作成する
    pub fn with_default_size(default_sample_info_size: u8, sample_count: u32) -> Self {
        Self {
            flags: FullBoxFlags::empty(),
            aux_info: None,
            default_sample_info_size,
            sample_count,
            sample_info_sizes: Vec::new(),
        }
    }

    /// サンプルごとのサイズ表を持つ [`SaizBox`] を作成する
    pub fn with_sizes(sample_info_sizes: Vec<u8>) -> Self {
        Self {
            flags: FullBoxFlags::empty(),
            aux_info: None,
            default_sample_info_size: 0,
            sample_count: u32::try_from(sample_info_sizes.len()).unwrap_or(u32::MAX),
            sample_info_sizes,
        }
    }

    /// 補助情報の種別を設定する
    pub fn with_aux_info(mut self, aux_info: AuxInfoType) -> Self {
        self.aux_info = Some(aux_info);
        self.flags = self.flags.with(Self::FLAG_AUX_INFO_TYPE_PRESENT);
        self
    }

    /// `index` 番目のサンプルの補助情報のサイズを返す
    pub fn sample_info_size(&self, index: usize) -> Option<u8> {
        if index >= self.sample_count as usize {
            None
        } else if self.default_sample_info_size != 0 {
            Some(self.default_sample_info_size)
        } else {
            self.sample_info_sizes.get(index).copied()
        }
    }
}

impl Encode for SaizBox {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        with_box_type(Self::TYPE, || {
            check_flagged_field(
                self.flags,
                Self::FLAG_AUX_INFO_TYPE_PRESENT,
                &self.aux_info,
                "aux_info_type",
            )?;
            let expected = if self.default_sample_info_size == 0 {
                self.sample_count as usize
            } else {
                0
            };
            if self.sample_info_sizes.len() != expected {
                return Err(Error::field_count_mismatch(format!(
                    "default_sample_info_size={} and sample_count={} require {expected} sizes, but {} are given",
                    self.default_sample_info_size,
                    self.sample_count,
                    self.sample_info_sizes.len()
                )));
            }

            let header = BoxHeader::new_variable_size(Self::TYPE);
            let mut offset = header.encode(buf)?;
            offset += FullBoxHeader::from_box(self).encode(&mut buf[offset..])?;
            if let Some(aux_info) = &self.aux_info {
                offset += aux_info.encode(&mut buf[offset..])?;
            }
            offset += self.default_sample_info_size.encode(&mut buf[offset..])?;
            offset += self.sample_count.encode(&mut buf[offset..])?;
            offset += self.sample_info_sizes.encode(&mut buf[offset..])?;

            header.finalize_box_size(&mut buf[..offset])?;
            Ok(offset)
        })
    }
}

impl Decode for SaizBox {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        with_box_type(Self::TYPE, || {
            let (header, payload) = BoxHeader::decode_header_and_payload(buf)?;
            header.box_type.expect(Self::TYPE)?;

            let mut offset = 0;
            let full_header = FullBoxHeader::decode_at(payload, &mut offset)?;
            let flags = full_header.flags;

            let aux_info =
                decode_flagged_field(flags, Self::FLAG_AUX_INFO_TYPE_PRESENT, payload, &mut offset)?;
            let default_sample_info_size = u8::decode_at(payload, &mut offset)?;
            let sample_count = u32::decode_at(payload, &mut offset)?;

            let sample_info_sizes = if default_sample_info_size == 0 {
                let n = sample_count as usize;
                let rest = payload.get(offset..).unwrap_or_default();
                Error::check_input_size(n, rest)?;
                offset += n;
                rest[..n].to_vec()
            } else {
                Vec::new()
            };

            Ok((
                Self {
                    flags,
                    aux_info,
                    default_sample_info_size,
                    sample_count,
                    sample_info_sizes,
                },
                header.external_size() + payload.len(),
            ))
        })
    }
}

impl BaseBox for SaizBox {
    fn box_type(&self) -> BoxType {
        Self::TYPE
    }
}

impl FullBox for SaizBox {
    fn full_box_version(&self) -> u8 {
        0
    }

    fn full_box_flags(&self) -> FullBoxFlags {
        self.flags
    }
}
