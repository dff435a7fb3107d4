use bmff_box::{
    BoxNode, BoxTree, BoxType, DecodeOptions, Encode, ErrorKind, FixedPointNumber, Result,
    boxes::{
        Brand, CompositionOffset, DecodeTime, ElstBox, ElstEntries, ElstEntry, FtypBox, MdhdBox,
        MfhdBox, MvhdBox, SaioBox, SaioOffsets, SaizBox, SencBox, SidxBox, StypBox, TfdtBox,
        TfhdBox, TkhdBox, TrunBox, TrunSample,
    },
    classify, decode, encode,
};

// ===== バイト列の組み立て =====

fn box_bytes(ty: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut bytes = ((8 + payload.len()) as u32).to_be_bytes().to_vec();
    bytes.extend_from_slice(ty);
    bytes.extend_from_slice(payload);
    bytes
}

fn full_box(ty: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![version];
    body.extend_from_slice(&flags.to_be_bytes()[1..]);
    body.extend_from_slice(payload);
    box_bytes(ty, &body)
}

fn brand_payload(major: &[u8; 4], minor: u32, compatibles: &[&[u8; 4]]) -> Vec<u8> {
    let mut payload = major.to_vec();
    payload.extend_from_slice(&minor.to_be_bytes());
    for brand in compatibles {
        payload.extend_from_slice(*brand);
    }
    payload
}

fn be32(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn concat(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}

const MATRIX: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

fn movie_header(timescale: u32, duration: u32, next_track_id: u32) -> Vec<u8> {
    let mut payload = be32(&[0, 0, timescale, duration, 0x0001_0000]);
    payload.extend_from_slice(&[0x01, 0x00]);
    payload.extend_from_slice(&[0; 10]);
    payload.extend_from_slice(&be32(&MATRIX));
    payload.extend_from_slice(&[0; 24]);
    payload.extend_from_slice(&next_track_id.to_be_bytes());
    full_box(b"mvhd", 0, 0, &payload)
}

fn track_header(track_id: u32, duration: u32) -> Vec<u8> {
    let mut payload = be32(&[0, 0, track_id, 0, duration, 0, 0]);
    payload.extend_from_slice(&[0; 8]);
    payload.extend_from_slice(&be32(&MATRIX));
    payload.extend_from_slice(&be32(&[0, 0]));
    full_box(b"tkhd", 0, 7, &payload)
}

fn media_header(timescale: u32, duration: u32) -> Vec<u8> {
    // "eng" = (5 << 10) | (14 << 5) | 7
    let mut payload = be32(&[0, 0, timescale, duration]);
    payload.extend_from_slice(&0x15C7u16.to_be_bytes());
    payload.extend_from_slice(&[0, 0]);
    full_box(b"mdhd", 0, 0, &payload)
}

fn edit_list(entries: &[(u32, i32, i16, u16)]) -> Vec<u8> {
    let mut payload = (entries.len() as u32).to_be_bytes().to_vec();
    for (duration, media_time, rate_integer, rate_fraction) in entries {
        payload.extend_from_slice(&duration.to_be_bytes());
        payload.extend_from_slice(&media_time.to_be_bytes());
        payload.extend_from_slice(&rate_integer.to_be_bytes());
        payload.extend_from_slice(&rate_fraction.to_be_bytes());
    }
    full_box(b"elst", 0, 0, &payload)
}

fn edit_list_fixture(entries: &[(u32, i32, i16, u16)], track_id: u32) -> Vec<u8> {
    let ftyp = box_bytes(b"ftyp", &brand_payload(b"isom", 0, &[b"isom", b"iso2"]));
    let edts = box_bytes(b"edts", &edit_list(entries));
    let mdia = box_bytes(b"mdia", &media_header(48_000, 96_000));
    let trak = box_bytes(
        b"trak",
        &concat(&[&track_header(track_id, 900), &edts, &mdia]),
    );
    let moov = box_bytes(b"moov", &concat(&[&movie_header(600, 900, track_id + 1), &trak]));
    concat(&[&ftyp, &moov])
}

fn segment_styp() -> Vec<u8> {
    box_bytes(b"styp", &brand_payload(b"iso6", 1, &[b"msdh", b"dash"]))
}

fn fragment(sequence_number: u32, traf_children: &[&[u8]], mdat: &[u8]) -> Vec<u8> {
    let mfhd = full_box(b"mfhd", 0, 0, &sequence_number.to_be_bytes());
    let traf = box_bytes(b"traf", &traf_children.concat());
    let moof = box_bytes(b"moof", &concat(&[&mfhd, &traf]));
    concat(&[&moof, &box_bytes(b"mdat", mdat)])
}

fn ty(code: &[u8; 4]) -> BoxType {
    BoxType::Normal(*code)
}

fn traf_child<'a>(tree: &'a BoxTree, code: &[u8; 4], index: usize) -> &'a BoxNode {
    let traf = tree
        .find(&[ty(b"moof"), ty(b"traf")])
        .expect("traf should exist");
    traf.children()
        .iter()
        .filter(|c| c.box_type == ty(code))
        .nth(index)
        .expect("traf child should exist")
}

// ===== シナリオ =====

#[test]
fn fragmented_init() -> Result<()> {
    let ftyp = box_bytes(b"ftyp", &brand_payload(b"iso5", 0x200, &[b"iso5", b"dash"]));
    let mvhd = box_bytes(b"mvhd", &[0; 100]);
    let bytes = concat(&[&ftyp, &box_bytes(b"moov", &mvhd)]);

    let tree = decode(&bytes)?;
    assert_eq!(encode(&tree)?, bytes);

    let ftyp: FtypBox = tree.boxes[0].to_record()?;
    assert_eq!(ftyp.major_brand, Brand::ISO5);
    assert_eq!(ftyp.minor_version, 0x200);
    assert_eq!(ftyp.compatible_brands, [Brand::ISO5, Brand::DASH]);

    let mvhd: MvhdBox = tree
        .find(&[ty(b"moov"), ty(b"mvhd")])
        .expect("mvhd should exist")
        .to_record()?;
    assert_eq!(mvhd.timescale, 0);
    assert_eq!(mvhd.next_track_id, 0);
    Ok(())
}

#[test]
fn dash_segment() -> Result<()> {
    let sidx = full_box(b"sidx", 0, 0, &[0; 28]);
    let tfhd = full_box(b"tfhd", 0, 0, &be32(&[1]));
    let tfdt = full_box(b"tfdt", 1, 0, &[0; 12]);
    let trun = full_box(b"trun", 0, 0x000301, &concat(&[&be32(&[1]), &[0; 12]]));
    let bytes = concat(&[
        &segment_styp(),
        &sidx,
        &fragment(1, &[&tfhd, &tfdt, &trun], &[0xAA; 512]),
    ]);

    let tree = decode(&bytes)?;
    let types: Vec<_> = tree.boxes.iter().map(|b| b.box_type).collect();
    assert_eq!(types, [ty(b"styp"), ty(b"sidx"), ty(b"moof"), ty(b"mdat")]);
    assert_eq!(encode(&tree)?, bytes);

    let styp: StypBox = tree.boxes[0].to_record()?;
    assert_eq!(styp.major_brand, Brand::ISO6);
    assert_eq!(styp.compatible_brands, [Brand::MSDH, Brand::DASH]);

    let sidx: SidxBox = tree.boxes[1].to_record()?;
    assert!(sidx.references.is_empty());

    let mfhd: MfhdBox = tree
        .find(&[ty(b"moof"), ty(b"mfhd")])
        .expect("mfhd should exist")
        .to_record()?;
    assert_eq!(mfhd.sequence_number, 1);

    let tfhd: TfhdBox = traf_child(&tree, b"tfhd", 0).to_record()?;
    assert_eq!(tfhd, TfhdBox::new(1));

    let tfdt: TfdtBox = traf_child(&tree, b"tfdt", 0).to_record()?;
    assert_eq!(tfdt.base_media_decode_time, DecodeTime::V1(0));

    let trun: TrunBox = traf_child(&tree, b"trun", 0).to_record()?;
    assert_eq!(trun.sample_count, 1);
    assert_eq!(trun.data_offset, Some(0));
    assert_eq!(
        trun.samples,
        [TrunSample {
            duration: Some(0),
            size: Some(0),
            ..TrunSample::default()
        }]
    );

    assert_eq!(tree.boxes[3].data(), Some(&[0xAA; 512][..]));
    Ok(())
}

#[test]
fn fragmented_multi_trun() -> Result<()> {
    let tfhd = full_box(b"tfhd", 0, 0x23A, &be32(&[1, 1, 100, 400, 0x0010_0000]));
    let tfdt = full_box(b"tfdt", 1, 0, &1_000u64.to_be_bytes());
    let trun_primary = full_box(
        b"trun",
        0,
        0x000B01,
        &be32(&[2, 128, 90, 300, 5, 90, 320, 15]),
    );
    let trun_tail = full_box(b"trun", 0, 0x000200, &be32(&[1, 380]));
    let bytes = concat(&[
        &segment_styp(),
        &fragment(2, &[&tfhd, &tfdt, &trun_primary, &trun_tail], &[0x11; 1200]),
    ]);

    let tree = decode(&bytes)?;

    let tfhd_record: TfhdBox = traf_child(&tree, b"tfhd", 0).to_record()?;
    assert_eq!(tfhd_record.flags.get(), 0x23A);
    assert_eq!(tfhd_record.track_id, 1);
    assert_eq!(tfhd_record.base_data_offset, None);
    assert_eq!(tfhd_record.sample_description_index, Some(1));
    assert_eq!(tfhd_record.default_sample_duration, Some(100));
    assert_eq!(tfhd_record.default_sample_size, Some(400));
    assert_eq!(tfhd_record.default_sample_flags, Some(0x0010_0000));
    assert_eq!(tfhd_record.encode_to_vec()?, tfhd);

    let tfdt_record: TfdtBox = traf_child(&tree, b"tfdt", 0).to_record()?;
    assert_eq!(tfdt_record, TfdtBox::with_version(1, 1_000)?);
    assert_eq!(tfdt_record.encode_to_vec()?, tfdt);

    let primary: TrunBox = traf_child(&tree, b"trun", 0).to_record()?;
    let expected = TrunBox::from_samples(vec![
        TrunSample {
            duration: Some(90),
            size: Some(300),
            flags: None,
            composition_time_offset: Some(CompositionOffset::Unsigned(5)),
        },
        TrunSample {
            duration: Some(90),
            size: Some(320),
            flags: None,
            composition_time_offset: Some(CompositionOffset::Unsigned(15)),
        },
    ])
    .with_data_offset(128);
    assert_eq!(primary, expected);
    assert_eq!(expected.encode_to_vec()?, trun_primary);

    let tail: TrunBox = traf_child(&tree, b"trun", 1).to_record()?;
    assert_eq!(tail.data_offset, None);
    assert_eq!(tail.samples.len(), 1);
    assert_eq!(tail.samples[0].size, Some(380));
    assert_eq!(tail.samples[0].duration, None);

    assert_eq!(encode(&tree)?, bytes);
    Ok(())
}

#[test]
fn fragmented_negative_offset() -> Result<()> {
    let mut tfhd_payload = be32(&[2]);
    tfhd_payload.extend_from_slice(&32u64.to_be_bytes());
    tfhd_payload.extend_from_slice(&be32(&[200, 450]));
    let tfhd = full_box(b"tfhd", 0, 0x19, &tfhd_payload);
    let tfdt = full_box(b"tfdt", 1, 0, &2_000u64.to_be_bytes());
    let trun = full_box(
        b"trun",
        1,
        0x000B01,
        &be32(&[1, (-64i32) as u32, 200, 450, (-20i32) as u32]),
    );
    let bytes = concat(&[&segment_styp(), &fragment(3, &[&tfhd, &tfdt, &trun], &[0x22; 512])]);

    let tree = decode(&bytes)?;

    let tfhd_record: TfhdBox = traf_child(&tree, b"tfhd", 0).to_record()?;
    let expected = TfhdBox::new(2)
        .with_base_data_offset(32)
        .with_default_sample_duration(200)
        .with_default_sample_size(450);
    assert_eq!(tfhd_record, expected);

    let trun_record: TrunBox = traf_child(&tree, b"trun", 0).to_record()?;
    assert_eq!(trun_record.version, 1);
    assert_eq!(trun_record.data_offset, Some(-64));
    assert_eq!(
        trun_record.samples[0].composition_time_offset,
        Some(CompositionOffset::Signed(-20))
    );
    assert_eq!(trun_record.encode_to_vec()?, trun);
    Ok(())
}

#[test]
fn fragmented_no_tfdt() -> Result<()> {
    let tfhd = full_box(b"tfhd", 0, 0x212, &be32(&[3, 1, 256]));
    let trun = full_box(b"trun", 0, 0x000301, &be32(&[2, 96, 120, 200, 120, 220]));
    let bytes = concat(&[&segment_styp(), &fragment(4, &[&tfhd, &trun], &[0x33; 512])]);

    let tree = decode(&bytes)?;
    let traf = tree
        .find(&[ty(b"moof"), ty(b"traf")])
        .expect("traf should exist");
    assert!(traf.child(ty(b"tfdt")).is_none());

    let tfhd_record: TfhdBox = traf_child(&tree, b"tfhd", 0).to_record()?;
    assert_eq!(tfhd_record.track_id, 3);
    assert_eq!(tfhd_record.sample_description_index, Some(1));
    assert_eq!(tfhd_record.default_sample_size, Some(256));
    assert_eq!(tfhd_record.default_sample_duration, None);

    let trun_record: TrunBox = traf_child(&tree, b"trun", 0).to_record()?;
    let sizes: Vec<_> = trun_record.samples.iter().map(|s| s.size).collect();
    assert_eq!(sizes, [Some(200), Some(220)]);
    assert_eq!(trun_record.data_offset, Some(96));
    Ok(())
}

#[test]
fn edit_list_fixtures() -> Result<()> {
    let cases: [(&[(u32, i32, i16, u16)], u32); 4] = [
        (&[], 1),
        (&[(120, -1, 1, 0), (780, 240, 1, 0)], 2),
        (&[(400, 0, 1, 0), (400, 400, 1, 0), (400, 800, 1, 0)], 3),
        (&[(300, 0, -1, 0), (300, 300, 2, 0), (0, 600, 1, 1)], 4),
    ];

    for (entries, track_id) in cases {
        let bytes = edit_list_fixture(entries, track_id);
        let tree = decode(&bytes)?;
        assert_eq!(encode(&tree)?, bytes);

        let trak = [ty(b"moov"), ty(b"trak")];
        let elst_node = tree
            .find(&[trak[0], trak[1], ty(b"edts"), ty(b"elst")])
            .expect("elst should exist");
        let elst: ElstBox = elst_node.to_record()?;
        let ElstEntries::V0(decoded) = &elst.entries else {
            panic!("version 0 expected");
        };
        assert_eq!(decoded.len(), entries.len());
        for (entry, &(duration, media_time, rate_integer, rate_fraction)) in
            decoded.iter().zip(entries)
        {
            assert_eq!(entry.segment_duration, duration);
            assert_eq!(entry.media_time, media_time);
            assert_eq!(entry.media_rate, FixedPointNumber::new(rate_integer, rate_fraction));
        }

        let wide: Vec<ElstEntry> = elst.wide_entries();
        let rebuilt = ElstBox::from_entries(wide)?;
        assert_eq!(BoxNode::from_record(&rebuilt)?, *elst_node);

        let tkhd: TkhdBox = tree
            .find(&[trak[0], trak[1], ty(b"tkhd")])
            .expect("tkhd should exist")
            .to_record()?;
        assert_eq!(tkhd.track_id, track_id);
        assert!(tkhd.flag_track_enabled && tkhd.flag_track_in_movie && tkhd.flag_track_in_preview);

        let mdhd: MdhdBox = tree
            .find(&[trak[0], trak[1], ty(b"mdia"), ty(b"mdhd")])
            .expect("mdhd should exist")
            .to_record()?;
        assert_eq!(mdhd.language, *b"eng");
        assert_eq!(mdhd.timescale, 48_000);

        let mvhd: MvhdBox = tree
            .find(&[trak[0], ty(b"mvhd")])
            .expect("mvhd should exist")
            .to_record()?;
        assert_eq!(mvhd.next_track_id, track_id + 1);
        assert_eq!(mvhd.rate, MvhdBox::DEFAULT_RATE);
        assert_eq!(mvhd.volume, MvhdBox::DEFAULT_VOLUME);
        assert_eq!(mvhd.matrix, MvhdBox::DEFAULT_MATRIX);
    }

    let single_offset = decode(&edit_list_fixture(&[(120, -1, 1, 0), (780, 240, 1, 0)], 2))?;
    let elst: ElstBox = single_offset
        .find(&[ty(b"moov"), ty(b"trak"), ty(b"edts"), ty(b"elst")])
        .expect("elst should exist")
        .to_record()?;
    assert!(elst.wide_entries()[0].is_empty_edit());
    Ok(())
}

#[test]
fn edit_list_records_reproduce_builder_bytes() -> Result<()> {
    let elst = ElstBox::from_entries(vec![ElstEntry::empty_edit(120), ElstEntry::new(780, 240)])?;
    assert_eq!(
        elst.encode_to_vec()?,
        edit_list(&[(120, -1, 1, 0), (780, 240, 1, 0)])
    );

    let mdhd = MdhdBox {
        creation_time: Default::default(),
        modification_time: Default::default(),
        timescale: 48_000,
        duration: 96_000,
        language: *b"eng",
    };
    assert_eq!(mdhd.encode_to_vec()?, media_header(48_000, 96_000));

    let mvhd = MvhdBox {
        creation_time: Default::default(),
        modification_time: Default::default(),
        timescale: 600,
        duration: 900,
        rate: MvhdBox::DEFAULT_RATE,
        volume: MvhdBox::DEFAULT_VOLUME,
        matrix: MvhdBox::DEFAULT_MATRIX,
        next_track_id: 3,
    };
    assert_eq!(mvhd.encode_to_vec()?, movie_header(600, 900, 3));
    Ok(())
}

#[test]
fn sample_encryption_fragment() -> Result<()> {
    let ftyp = box_bytes(b"ftyp", &brand_payload(b"iso6", 0, &[b"iso6", b"dash"]));
    let trak = box_bytes(
        b"trak",
        &concat(&[
            &track_header(1, 600),
            &box_bytes(b"mdia", &media_header(48_000, 48_000)),
        ]),
    );
    let moov = box_bytes(b"moov", &concat(&[&movie_header(600, 600, 2), &trak]));

    let mut tfhd_payload = be32(&[1]);
    tfhd_payload.extend_from_slice(&0x200u64.to_be_bytes());
    tfhd_payload.extend_from_slice(&be32(&[1, 120, 256]));
    let tfhd = full_box(b"tfhd", 0, 0x1B, &tfhd_payload);
    let tfdt = full_box(b"tfdt", 1, 0, &1_000u64.to_be_bytes());
    let trun = full_box(b"trun", 0, 0x301, &be32(&[2, 128, 120, 256, 120, 256]));

    let mut senc_payload = vec![0x01, 0x02, 0x03, 8];
    senc_payload.extend(0x20..0x30u8);
    senc_payload.extend_from_slice(&be32(&[2]));
    senc_payload.extend(0x01..0x09u8);
    senc_payload.extend_from_slice(&[0, 1, 0, 0x10, 0, 0, 0, 0x20]);
    senc_payload.extend(0x11..0x19u8);
    senc_payload.extend_from_slice(&[0, 2, 0, 4, 0, 0, 0, 8, 0, 6, 0, 0, 0, 0x0C]);
    let senc = full_box(b"senc", 0, 0x3, &senc_payload);

    let mut saio_payload = b"cenc".to_vec();
    saio_payload.extend_from_slice(&be32(&[1, 2]));
    saio_payload.extend_from_slice(&0x200u64.to_be_bytes());
    saio_payload.extend_from_slice(&0x380u64.to_be_bytes());
    let saio = full_box(b"saio", 1, 1, &saio_payload);

    let mut saiz_payload = b"cenc".to_vec();
    saiz_payload.extend_from_slice(&be32(&[1]));
    saiz_payload.push(0);
    saiz_payload.extend_from_slice(&be32(&[2]));
    saiz_payload.extend_from_slice(&[0x10, 0x18]);
    let saiz = full_box(b"saiz", 0, 1, &saiz_payload);

    let bytes = concat(&[
        &ftyp,
        &moov,
        &fragment(1, &[&tfhd, &tfdt, &trun, &senc, &saio, &saiz], &[0x55; 256]),
    ]);

    let tree = decode(&bytes)?;
    assert_eq!(encode(&tree)?, bytes);

    let tfhd_record: TfhdBox = traf_child(&tree, b"tfhd", 0).to_record()?;
    assert_eq!(tfhd_record.base_data_offset, Some(0x200));

    let senc_record: SencBox = traf_child(&tree, b"senc", 0).to_record()?;
    let params = senc_record.override_params.as_ref().expect("override params");
    assert_eq!(params.algorithm_id.get(), 0x010203);
    assert_eq!(params.iv_size, 8);
    assert_eq!(params.kid[0], 0x20);
    assert_eq!(params.kid[15], 0x2F);
    assert_eq!(senc_record.samples.len(), 2);
    assert_eq!(senc_record.samples[0].iv, (1..=8).collect::<Vec<u8>>());
    let subsamples = senc_record.samples[1]
        .subsamples
        .as_ref()
        .expect("subsamples");
    assert_eq!(subsamples.len(), 2);
    assert_eq!(subsamples[1].bytes_of_clear_data, 6);
    assert_eq!(subsamples[1].bytes_of_protected_data, 12);
    assert_eq!(senc_record.encode_to_vec()?, senc);

    let saio_record: SaioBox = traf_child(&tree, b"saio", 0).to_record()?;
    assert_eq!(saio_record.offsets, SaioOffsets::V1(vec![0x200, 0x380]));
    let aux_info = saio_record.aux_info.expect("aux info");
    assert_eq!(aux_info.aux_info_type, Brand::new(*b"cenc"));
    assert_eq!(aux_info.aux_info_type_parameter, 1);
    assert_eq!(saio_record.encode_to_vec()?, saio);

    let saiz_record: SaizBox = traf_child(&tree, b"saiz", 0).to_record()?;
    assert_eq!(saiz_record.default_sample_info_size, 0);
    assert_eq!(saiz_record.sample_count, 2);
    assert_eq!(saiz_record.sample_info_sizes, [0x10, 0x18]);
    assert_eq!(saiz_record.encode_to_vec()?, saiz);
    Ok(())
}

#[test]
fn large_mdat() -> Result<()> {
    let ftyp = box_bytes(b"ftyp", &brand_payload(b"isom", 0, &[b"isom", b"iso2"]));
    let moov = box_bytes(b"moov", &box_bytes(b"mvhd", &[0; 100]));
    let mut mdat = 1u32.to_be_bytes().to_vec();
    mdat.extend_from_slice(b"mdat");
    mdat.extend_from_slice(&(16u64 + 8192).to_be_bytes());
    mdat.extend_from_slice(&[0x55; 8192]);
    let bytes = concat(&[&ftyp, &moov, &mdat]);

    let tree = decode(&bytes)?;
    assert_eq!(tree.boxes[2].data().map(<[u8]>::len), Some(8192));

    // 32-bit に収まるサイズは通常の形式で再エンコードされる
    let reencoded = encode(&tree)?;
    assert_eq!(reencoded.len(), bytes.len() - 8);
    assert_eq!(decode(&reencoded)?, tree);
    Ok(())
}

#[test]
fn malformed_truncated() {
    let ftyp = box_bytes(b"ftyp", &brand_payload(b"isom", 0, &[b"isom"]));
    let mut bytes = ftyp.clone();
    bytes.extend_from_slice(&80u32.to_be_bytes());
    bytes.extend_from_slice(b"moov");
    bytes.extend_from_slice(&[0; 8]);

    let m = classify(&bytes, &DecodeOptions::default()).expect("should be malformed");
    assert_eq!(m.kind, ErrorKind::TruncatedBox);
    assert_eq!(m.offset, Some(20));

    // ヘッダーだけの moov も同様
    let mut bytes = ftyp;
    bytes.extend_from_slice(&32u32.to_be_bytes());
    bytes.extend_from_slice(b"moov");
    let m = classify(&bytes, &DecodeOptions::default()).expect("should be malformed");
    assert_eq!(m.kind, ErrorKind::TruncatedBox);
    assert_eq!(m.offset, Some(20));
}
