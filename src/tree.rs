//! ボックスツリーのエンコード・デコード
//!
//! [`BoxTree`] はバイト列中のボックスの入れ子構造をそのまま表現する。
//! コンテナとして扱うボックス種別は [`DecodeOptions`] で指定し、それ以外のボックスはペイロードを
//! 解釈しない葉ノード（[`BoxPayload::Data`]）としてデコードされる。
//!
//! デコードは明示的なスタックを使った反復処理で行われ、入れ子の深さは [`DecodeOptions::max_depth`] で制限される。
use alloc::{format, vec, vec::Vec};

use crate::{BaseBox, BoxHeader, BoxType, Decode, Encode, Error, ErrorKind, Result};

/// ボックスツリーのデコード時の設定
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodeOptions {
    /// コンテナボックスの入れ子の最大深さ（トップレベルのボックスの深さは 1）
    pub max_depth: usize,

    /// 宣言サイズの上限
    pub max_box_size: u64,

    /// 子ボックスを持つものとしてデコードするボックス種別
    pub containers: Vec<BoxType>,
}

impl DecodeOptions {
    /// 入れ子の最大深さのデフォルト値
    pub const DEFAULT_MAX_DEPTH: usize = 64;

    /// デフォルトでコンテナとして扱われるボックス種別
    pub const DEFAULT_CONTAINERS: [BoxType; 6] = [
        BoxType::Normal(*b"moov"),
        BoxType::Normal(*b"trak"),
        BoxType::Normal(*b"mdia"),
        BoxType::Normal(*b"edts"),
        BoxType::Normal(*b"traf"),
        BoxType::Normal(*b"moof"),
    ];

    /// [`DecodeOptions::with_extended_containers()`] で追加されるボックス種別
    pub const EXTENDED_CONTAINERS: [BoxType; 10] = [
        BoxType::Normal(*b"minf"),
        BoxType::Normal(*b"dinf"),
        BoxType::Normal(*b"stbl"),
        BoxType::Normal(*b"mvex"),
        BoxType::Normal(*b"mfra"),
        BoxType::Normal(*b"udta"),
        BoxType::Normal(*b"tref"),
        BoxType::Normal(*b"sinf"),
        BoxType::Normal(*b"schi"),
        BoxType::Normal(*b"strk"),
    ];

    /// 入れ子の最大深さを設定する
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 宣言サイズの上限を設定する
    pub fn with_max_box_size(mut self, max_box_size: u64) -> Self {
        self.max_box_size = max_box_size;
        self
    }

    /// コンテナとして扱うボックス種別を追加する
    pub fn with_container(mut self, box_type: BoxType) -> Self {
        if !self.is_container(box_type) {
            self.containers.push(box_type);
        }
        self
    }

    /// デフォルト以外の純粋なコンテナボックス（minf, stbl, mvex など）もコンテナとして扱うようにする
    pub fn with_extended_containers(self) -> Self {
        Self::EXTENDED_CONTAINERS
            .into_iter()
            .fold(self, |options, ty| options.with_container(ty))
    }

    /// 指定の種別がコンテナとして扱われるかどうか
    pub fn is_container(&self, box_type: BoxType) -> bool {
        self.containers.contains(&box_type)
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            max_box_size: BoxHeader::DEFAULT_MAX_BOX_SIZE,
            containers: Self::DEFAULT_CONTAINERS.to_vec(),
        }
    }
}

/// [`BoxNode`] のペイロード
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoxPayload {
    /// 解釈されていないペイロードのバイト列
    Data(Vec<u8>),

    /// 子ボックスの列
    Children(Vec<BoxNode>),
}

/// ボックスツリーのノード
///
/// ボックスのサイズは保持せず、エンコード時にペイロードから計算する
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoxNode {
    /// ボックス種別
    pub box_type: BoxType,

    /// ペイロード
    pub payload: BoxPayload,
}

impl BoxNode {
    /// 葉ノードを作成する
    pub fn leaf(box_type: BoxType, data: Vec<u8>) -> Self {
        Self {
            box_type,
            payload: BoxPayload::Data(data),
        }
    }

    /// コンテナノードを作成する
    pub fn container(box_type: BoxType, children: Vec<BoxNode>) -> Self {
        Self {
            box_type,
            payload: BoxPayload::Children(children),
        }
    }

    /// レコード（ボックス構造体）をエンコードして葉ノードに変換する
    pub fn from_record<T: BaseBox + Encode>(record: &T) -> Result<Self> {
        let bytes = record.encode_to_vec()?;
        let (header, payload) = BoxHeader::decode_header_and_payload(&bytes)?;
        Ok(Self::leaf(header.box_type, payload.to_vec()))
    }

    /// ノードをエンコードし、レコード（ボックス構造体）としてデコードする
    pub fn to_record<T: Decode>(&self) -> Result<T> {
        let bytes = self.encode_to_vec()?;
        let (record, _) = T::decode(&bytes)?;
        Ok(record)
    }

    /// ペイロードのバイト数を返す
    pub fn payload_size(&self) -> Result<u64> {
        match &self.payload {
            BoxPayload::Data(data) => Ok(data.len() as u64),
            BoxPayload::Children(children) => {
                children.iter().try_fold(0u64, |acc, child| {
                    acc.checked_add(child.box_size()?).ok_or_else(|| {
                        Error::invalid_input("Total box size overflows u64")
                            .with_box_type(self.box_type)
                    })
                })
            }
        }
    }

    /// このノードをエンコードする際のヘッダーを返す
    pub fn header(&self) -> Result<BoxHeader> {
        BoxHeader::with_payload_size(self.box_type, self.payload_size()?)
    }

    /// ヘッダーを含むボックス全体のバイト数を返す
    pub fn box_size(&self) -> Result<u64> {
        Ok(self.header()?.box_size.get())
    }

    /// 子ノードの列を返す（葉ノードの場合は空）
    pub fn children(&self) -> &[BoxNode] {
        match &self.payload {
            BoxPayload::Data(_) => &[],
            BoxPayload::Children(children) => children,
        }
    }

    /// 葉ノードのペイロードを返す
    pub fn data(&self) -> Option<&[u8]> {
        match &self.payload {
            BoxPayload::Data(data) => Some(data),
            BoxPayload::Children(_) => None,
        }
    }

    /// 指定の種別を持つ最初の子ノードを返す
    pub fn child(&self, box_type: BoxType) -> Option<&BoxNode> {
        self.children().iter().find(|c| c.box_type == box_type)
    }
}

impl BaseBox for BoxNode {
    fn box_type(&self) -> BoxType {
        self.box_type
    }
}

impl Encode for BoxNode {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let header = self.header()?;
        let mut offset = header
            .encode(buf)
            .map_err(|e| e.with_box_type(self.box_type))?;
        match &self.payload {
            BoxPayload::Data(data) => {
                offset += data.encode(&mut buf[offset..])?;
            }
            BoxPayload::Children(children) => {
                for child in children {
                    offset += child.encode(&mut buf[offset..])?;
                }
            }
        }
        Ok(offset)
    }

    fn encode_to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0; alloc_size(self.box_size()?)?];
        let size = self.encode(&mut buf)?;
        buf.truncate(size);
        Ok(buf)
    }
}

/// ボックスツリー
///
/// トップレベルのボックスの列を保持する
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct BoxTree {
    /// トップレベルのボックス
    pub boxes: Vec<BoxNode>,
}

impl BoxTree {
    /// トップレベルのボックス列からツリーを作成する
    pub fn new(boxes: Vec<BoxNode>) -> Self {
        Self { boxes }
    }

    /// ボックス種別のパス（例: `[moov, trak, mdia]`）をたどってノードを探す
    pub fn find(&self, path: &[BoxType]) -> Option<&BoxNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.boxes.iter().find(|b| b.box_type == *first)?;
        for ty in rest {
            node = node.child(*ty)?;
        }
        Some(node)
    }

    /// エンコード後のバイト数を返す
    pub fn encoded_size(&self) -> Result<u64> {
        self.boxes.iter().try_fold(0u64, |acc, node| {
            acc.checked_add(node.box_size()?)
                .ok_or_else(|| Error::invalid_input("Total box size overflows u64"))
        })
    }
}

impl Encode for BoxTree {
    fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let mut offset = 0;
        for node in &self.boxes {
            offset += node.encode(&mut buf[offset..])?;
        }
        Ok(offset)
    }

    fn encode_to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0; alloc_size(self.encoded_size()?)?];
        let size = self.encode(&mut buf)?;
        buf.truncate(size);
        Ok(buf)
    }
}

impl Decode for BoxTree {
    fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let tree = decode(buf)?;
        Ok((tree, buf.len()))
    }
}

fn alloc_size(size: u64) -> Result<usize> {
    usize::try_from(size)
        .map_err(|_| Error::invalid_input(format!("Too large box tree: {size} bytes")))
}

/// ボックスツリーをバイト列にエンコードする
pub fn encode(tree: &BoxTree) -> Result<Vec<u8>> {
    tree.encode_to_vec()
}

/// デフォルトの設定でバイト列をボックスツリーにデコードする
pub fn decode(buf: &[u8]) -> Result<BoxTree> {
    decode_with_options(buf, &DecodeOptions::default())
}

/// 設定を指定してバイト列をボックスツリーにデコードする
///
/// 入力全体がボックスの列として解釈できない場合は、最初に見つかった問題をエラーとして返す。
/// エラーには問題のあったボックスの先頭位置（[`Error::offset`]）と、判明している場合はボックス種別が設定される。
pub fn decode_with_options(buf: &[u8], options: &DecodeOptions) -> Result<BoxTree> {
    decode_frames(buf, options).inspect_err(|e| {
        tracing::debug!(
            kind = ?e.kind,
            offset = ?e.offset,
            box_type = ?e.box_type,
            "failed to decode box tree"
        );
    })
}

/// デコード中のコンテナボックス
struct OpenContainer {
    box_type: BoxType,
    end: usize,
    children: Vec<BoxNode>,
}

fn push_node(stack: &mut [OpenContainer], top_level: &mut Vec<BoxNode>, node: BoxNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => top_level.push(node),
    }
}

fn decode_frames(buf: &[u8], options: &DecodeOptions) -> Result<BoxTree> {
    if buf.is_empty() {
        return Err(Error::truncated_box("Input contains no box").with_offset(0));
    }

    let mut stack: Vec<OpenContainer> = Vec::new();
    let mut top_level = Vec::new();
    let mut pos = 0;

    loop {
        // 終端に達したコンテナを閉じる（サイズ 8 の空コンテナが続く場合も含む）
        while let Some(container) = stack.pop_if(|c| c.end == pos) {
            let node = BoxNode::container(container.box_type, container.children);
            push_node(&mut stack, &mut top_level, node);
        }

        let limit = stack.last().map_or(buf.len(), |c| c.end);
        if pos == limit {
            break;
        }

        let (header, header_size) = BoxHeader::decode_with_limit(&buf[pos..limit], options.max_box_size)
            .map_err(|e| e.with_offset(pos as u64))?;
        let box_type = header.box_type;
        let end = pos + header.box_size.get() as usize;
        let depth = stack.len() + 1;

        tracing::trace!(
            box_type = %box_type,
            offset = pos,
            size = header.box_size.get(),
            depth,
            "decoded box frame"
        );

        if options.is_container(box_type) {
            if depth > options.max_depth {
                return Err(Error::with_reason(
                    ErrorKind::MaxDepthExceeded,
                    format!(
                        "Container nesting depth {depth} exceeds the limit {}",
                        options.max_depth
                    ),
                )
                .with_box_type(box_type)
                .with_offset(pos as u64));
            }
            stack.push(OpenContainer {
                box_type,
                end,
                children: Vec::new(),
            });
            pos += header_size;
        } else {
            let node = BoxNode::leaf(box_type, buf[pos + header_size..end].to_vec());
            push_node(&mut stack, &mut top_level, node);
            pos = end;
        }
    }

    Ok(BoxTree::new(top_level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::{MfhdBox, TfdtBox};

    const MOOV: BoxType = BoxType::Normal(*b"moov");
    const TRAK: BoxType = BoxType::Normal(*b"trak");
    const FREE: BoxType = BoxType::Normal(*b"free");

    fn nested(depth: usize) -> BoxNode {
        let mut node = BoxNode::leaf(FREE, vec![0; 4]);
        for i in (0..depth).rev() {
            let ty = if i % 2 == 0 { MOOV } else { TRAK };
            node = BoxNode::container(ty, vec![node]);
        }
        node
    }

    #[test]
    fn encode_computes_sizes() {
        let tree = BoxTree::new(vec![BoxNode::container(
            MOOV,
            vec![BoxNode::leaf(FREE, vec![1, 2, 3])],
        )]);
        let bytes = encode(&tree).unwrap();
        assert_eq!(bytes, b"\x00\x00\x00\x13moov\x00\x00\x00\x0bfree\x01\x02\x03");
        assert_eq!(tree.encoded_size().unwrap(), 19);
        assert_eq!(decode(&bytes).unwrap(), tree);
    }

    #[test]
    fn unknown_types_are_leaves() {
        let bytes = b"\x00\x00\x00\x10stbl\x00\x00\x00\x08stsd";
        let tree = decode(bytes).unwrap();
        assert_eq!(tree.boxes[0].data(), Some(&b"\x00\x00\x00\x08stsd"[..]));

        let options = DecodeOptions::default().with_extended_containers();
        let tree = decode_with_options(bytes, &options).unwrap();
        assert_eq!(tree.boxes[0].children().len(), 1);
        assert_eq!(tree.boxes[0].children()[0].data(), Some(&[][..]));
    }

    #[test]
    fn empty_input_is_truncated() {
        let err = decode(&[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TruncatedBox);
        assert_eq!(err.offset, Some(0));
    }

    #[test]
    fn empty_sibling_containers() {
        let tree = BoxTree::new(vec![BoxNode::container(
            MOOV,
            vec![BoxNode::container(TRAK, Vec::new()); 4],
        )]);
        let bytes = encode(&tree).unwrap();
        assert_eq!(bytes.len(), 40);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.boxes.len(), 1);
        assert_eq!(decoded.boxes[0].children().len(), 4);
        assert_eq!(decoded, tree);
    }

    #[test]
    fn depth_limit() {
        let tree = BoxTree::new(vec![nested(64)]);
        let bytes = encode(&tree).unwrap();
        assert_eq!(decode(&bytes).unwrap(), tree);

        let tree = BoxTree::new(vec![nested(65)]);
        let bytes = encode(&tree).unwrap();
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MaxDepthExceeded);
        assert_eq!(err.offset, Some(64 * 8));
        assert_eq!(err.box_type, Some(MOOV));

        let options = DecodeOptions::default().with_max_depth(65);
        assert!(decode_with_options(&bytes, &options).is_ok());
    }

    #[test]
    fn errors_carry_offset() {
        let mut bytes = encode(&BoxTree::new(vec![BoxNode::leaf(FREE, vec![0; 4])])).unwrap();
        bytes.extend_from_slice(b"\x00\x00\x00\x20moov\x00\x00\x00\x08trak");
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TruncatedBox);
        assert_eq!(err.offset, Some(12));
        assert_eq!(err.box_type, Some(MOOV));
    }

    #[test]
    fn records_and_nodes() {
        let mfhd = MfhdBox { sequence_number: 7 };
        let node = BoxNode::from_record(&mfhd).unwrap();
        assert_eq!(node.box_type, MfhdBox::TYPE);
        assert_eq!(node.data(), Some(&[0, 0, 0, 0, 0, 0, 0, 7][..]));
        assert_eq!(node.to_record::<MfhdBox>().unwrap(), mfhd);

        let err = node.to_record::<TfdtBox>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidData);
        assert_eq!(err.box_type, Some(TfdtBox::TYPE));
    }

    #[test]
    fn find_by_path() {
        let tree = BoxTree::new(vec![nested(3)]);
        let node = tree.find(&[MOOV, TRAK, MOOV, FREE]).unwrap();
        assert_eq!(node.data(), Some(&[0; 4][..]));
        assert!(tree.find(&[MOOV, MOOV]).is_none());
        assert!(tree.find(&[]).is_none());
    }
}
