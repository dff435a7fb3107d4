use bmff_box::{
    BoxNode, BoxTree, BoxType, DecodeOptions, Encode, ErrorKind, Result, classify, decode,
    decode_with_options, encode,
};

const FTYP_ISOM: &[u8] = b"\x00\x00\x00\x14ftypisom\x00\x00\x00\x00isom";

fn kind_of(bytes: &[u8]) -> ErrorKind {
    decode(bytes).expect_err("decode should fail").kind
}

/// moov/trak を交互に `depth` 段重ねて、最内に 4 バイトの free を置く
fn deep_chain(depth: usize) -> BoxNode {
    let mut node = BoxNode::leaf(BoxType::Normal(*b"free"), vec![0; 4]);
    for i in (0..depth).rev() {
        let ty = if i % 2 == 0 { *b"moov" } else { *b"trak" };
        node = BoxNode::container(BoxType::Normal(ty), vec![node]);
    }
    node
}

#[test]
fn empty_and_short_buffers() {
    assert_eq!(kind_of(&[]), ErrorKind::TruncatedBox);
    assert_eq!(kind_of(&[0, 0, 0]), ErrorKind::TruncatedBox);
}

#[test]
fn empty_buffer_is_reported_by_classifier() {
    let m = classify(&[], &DecodeOptions::default()).expect("should be malformed");
    assert_eq!(m.kind, ErrorKind::TruncatedBox);
    assert_eq!(m.offset, Some(0));
}

#[test]
fn non_ascii_type() {
    assert_eq!(kind_of(&[0, 0, 0, 8, 1, 2, 3, 4]), ErrorKind::InvalidBoxType);
}

#[test]
fn zero_size_top_level_box() {
    assert_eq!(
        kind_of(&[0x00, 0x00, 0x00, 0x00, 0x6D, 0x6F, 0x6F, 0x76]),
        ErrorKind::UnsupportedUnboundedBox
    );
}

#[test]
fn oversized_large_size() {
    let mut bytes = FTYP_ISOM.to_vec();
    bytes.extend_from_slice(b"\x00\x00\x00\x01mdat");
    bytes.extend_from_slice(&u64::MAX.to_be_bytes());

    let err = decode(&bytes).expect_err("decode should fail");
    assert_eq!(err.kind, ErrorKind::OversizedDeclaration);
    assert_eq!(err.offset, Some(20));
    assert_eq!(err.box_type, Some(BoxType::Normal(*b"mdat")));

    // 上限を下げると、バッファに収まる程度のサイズでも拒否される
    let mut bytes = FTYP_ISOM.to_vec();
    bytes.extend_from_slice(b"\x00\x00\x00\x10free\x00\x00\x00\x00\x00\x00\x00\x00");
    let options = DecodeOptions::default().with_max_box_size(15);
    let m = classify(&bytes, &options).expect("should be malformed");
    assert_eq!(m.kind, ErrorKind::OversizedDeclaration);
    assert_eq!(m.offset, Some(20));
}

#[test]
fn uuid_box_too_small() {
    assert_eq!(kind_of(b"\x00\x00\x00\x08uuid"), ErrorKind::TruncatedBox);

    let mut bytes = b"\x00\x00\x00\x08uuid".to_vec();
    bytes.extend_from_slice(&[0xAB; 16]);
    assert_eq!(kind_of(&bytes), ErrorKind::TruncatedBox);
}

#[test]
fn uuid_box_round_trip() -> Result<()> {
    let tree = BoxTree::new(vec![BoxNode::leaf(BoxType::Uuid([0x5A; 16]), vec![1, 2, 3])]);
    let bytes = encode(&tree)?;
    assert_eq!(bytes.len(), 8 + 16 + 3);
    assert_eq!(&bytes[4..8], b"uuid");
    assert_eq!(decode(&bytes)?, tree);
    Ok(())
}

#[test]
fn deep_recursion_chain() -> Result<()> {
    let tree = BoxTree::new(vec![
        BoxNode::leaf(BoxType::Normal(*b"ftyp"), FTYP_ISOM[8..].to_vec()),
        deep_chain(70),
    ]);
    let bytes = tree.encode_to_vec()?;

    let err = decode(&bytes).expect_err("decode should fail");
    assert_eq!(err.kind, ErrorKind::MaxDepthExceeded);
    assert_eq!(err.offset, Some(20 + 64 * 8));
    assert_eq!(err.box_type, Some(BoxType::Normal(*b"moov")));

    let options = DecodeOptions::default().with_max_depth(70);
    assert_eq!(decode_with_options(&bytes, &options)?, tree);
    Ok(())
}

#[test]
fn zero_length_sibling_loop() -> Result<()> {
    let mut bytes = FTYP_ISOM.to_vec();
    bytes.extend_from_slice(b"\x00\x00\x00\x28moov");
    for _ in 0..4 {
        bytes.extend_from_slice(b"\x00\x00\x00\x08trak");
    }

    assert_eq!(classify(&bytes, &DecodeOptions::default()), None);

    let tree = decode(&bytes)?;
    let moov = &tree.boxes[1];
    assert_eq!(moov.children().len(), 4);
    assert!(moov.children().iter().all(|c| c.children().is_empty()));
    assert_eq!(encode(&tree)?, bytes);
    Ok(())
}

#[test]
fn truncated_parent_and_child() {
    // moov は宣言サイズ 80 だがペイロードは 8 バイトしかない
    let mut bytes = FTYP_ISOM.to_vec();
    bytes.extend_from_slice(b"\x00\x00\x00\x50moov\x00\x00\x00\x08free");
    let m = classify(&bytes, &DecodeOptions::default()).expect("should be malformed");
    assert_eq!(m.kind, ErrorKind::TruncatedBox);
    assert_eq!(m.offset, Some(20));
    assert_eq!(m.box_type, Some(BoxType::Normal(*b"moov")));

    // moov 自体は正しいが、子の trak が親の範囲を超えている
    let mut bytes = FTYP_ISOM.to_vec();
    bytes.extend_from_slice(b"\x00\x00\x00\x18moov\x00\x00\x00\x18trak");
    bytes.extend_from_slice(&[0; 8]);
    let m = classify(&bytes, &DecodeOptions::default()).expect("should be malformed");
    assert_eq!(m.kind, ErrorKind::TruncatedBox);
    assert_eq!(m.offset, Some(28));
    assert_eq!(m.box_type, Some(BoxType::Normal(*b"trak")));
}

#[test]
fn truncated_header_after_valid_box() {
    let mut bytes = FTYP_ISOM.to_vec();
    bytes.extend_from_slice(b"\x00\x00\x00");
    let err = decode(&bytes).expect_err("decode should fail");
    assert_eq!(err.kind, ErrorKind::TruncatedBox);
    assert_eq!(err.offset, Some(20));
    assert_eq!(err.box_type, None);
}

#[test]
fn uuid_without_extended_type_is_not_encoded() {
    // 拡張型を持たない uuid はデコード側で先頭 16 バイトを拡張型と解釈してしまう
    for payload_size in [3, 20] {
        let tree = BoxTree::new(vec![BoxNode::leaf(
            BoxType::Normal(*b"uuid"),
            vec![1; payload_size],
        )]);
        let err = encode(&tree).expect_err("encode should fail");
        assert_eq!(err.kind, ErrorKind::InvalidBoxType);
        assert_eq!(err.box_type, Some(BoxType::Normal(*b"uuid")));
    }

    let tree = BoxTree::new(vec![BoxNode::leaf(BoxType::Uuid([1; 16]), vec![1; 4])]);
    assert_eq!(decode(&encode(&tree).unwrap()).unwrap(), tree);
}
