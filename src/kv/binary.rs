//! Binary encoder and decoder for [`KeyValue`] trees.

use super::{KeyValue, KvType, Node, NodeId};
use crate::error::KeyValueError;

type Result<T> = std::result::Result<T, KeyValueError>;

const END: u8 = 0x08;

/// Deepest object nesting the decoder follows before giving up.
pub const MAX_DEPTH: usize = 256;

impl KeyValue {
    /// Encodes the tree, appending to `out`.
    ///
    /// An object root is followed by one extra end byte, so a root object
    /// always finishes with two consecutive end markers.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        let root = self.root_id();
        encode_node(self, root, out)?;
        if self.nodes[root.0].kind == KvType::Object {
            out.push(END);
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Decodes one tree from the front of `input`, advancing it.
    ///
    /// An empty input yields [`KeyValueError::Eof`]; input that ends part
    /// way through a node yields [`KeyValueError::UnexpectedEof`]. The
    /// trailing end byte written after an object root is consumed when
    /// present.
    pub fn decode(input: &mut &[u8]) -> Result<Self> {
        let data: &[u8] = input;
        let mut decoder = Decoder {
            input: data,
            pos: 0,
            depth: 0,
        };
        let mut nodes = Vec::new();
        decoder.read_node(&mut nodes, None)?;

        if nodes[0].kind == KvType::Object && decoder.peek() == Some(END) {
            decoder.pos += 1;
        }

        *input = &data[decoder.pos..];
        Ok(KeyValue { nodes })
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut input = data;
        Self::decode(&mut input)
    }
}

fn encode_node(tree: &KeyValue, id: NodeId, out: &mut Vec<u8>) -> Result<()> {
    let node = &tree.nodes[id.0];

    let type_byte = match node.kind {
        KvType::Invalid | KvType::End | KvType::WideString => {
            return Err(KeyValueError::Unencodable(node.kind.name()))
        }
        kind => kind.byte().ok_or(KeyValueError::Unencodable(kind.name()))?,
    };

    out.push(type_byte);
    write_cstring(out, &node.key, node)?;

    match node.kind {
        KvType::Object => {
            for &child in &node.children {
                encode_node(tree, child, out)?;
            }
            out.push(END);
        }
        KvType::String => write_cstring(out, &node.value, node)?,
        KvType::Int32 | KvType::Color | KvType::Pointer => {
            let n: i32 = parse_value(node)?;
            out.extend_from_slice(&n.to_le_bytes());
        }
        KvType::Int64 => {
            let n: i64 = parse_value(node)?;
            out.extend_from_slice(&n.to_le_bytes());
        }
        KvType::Uint64 => {
            let n: u64 = parse_value(node)?;
            out.extend_from_slice(&n.to_le_bytes());
        }
        KvType::Float32 => {
            let n: f32 = parse_value(node)?;
            out.extend_from_slice(&n.to_le_bytes());
        }
        KvType::Invalid | KvType::End | KvType::WideString => {}
    }

    Ok(())
}

fn parse_value<T: std::str::FromStr>(node: &Node) -> Result<T> {
    node.value
        .parse::<T>()
        .map_err(|_| KeyValueError::InvalidValue {
            kind: node.kind.name(),
            key: node.key.clone(),
            value: node.value.clone(),
        })
}

fn write_cstring(out: &mut Vec<u8>, s: &str, node: &Node) -> Result<()> {
    if s.as_bytes().contains(&0) {
        return Err(KeyValueError::InvalidValue {
            kind: node.kind.name(),
            key: node.key.clone(),
            value: s.to_string(),
        });
    }
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    Ok(())
}

struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Decoder<'a> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn short_read(&self) -> KeyValueError {
        if self.pos == 0 {
            KeyValueError::Eof
        } else {
            KeyValueError::UnexpectedEof
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.input.len() - self.pos < n {
            return Err(self.short_read());
        }
        let bytes = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn read_cstring(&mut self) -> Result<String> {
        let rest = &self.input[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(KeyValueError::UnexpectedEof)?;
        let s = std::str::from_utf8(&rest[..nul]).map_err(|_| KeyValueError::InvalidUtf8)?;
        self.pos += nul + 1;
        Ok(s.to_string())
    }

    fn read_node(&mut self, nodes: &mut Vec<Node>, parent: Option<NodeId>) -> Result<NodeId> {
        let [type_byte] = self.take_array::<1>()?;
        let kind = KvType::from_byte(type_byte);

        let id = NodeId(nodes.len());
        nodes.push(Node {
            kind,
            key: String::new(),
            value: String::new(),
            parent,
            children: Vec::new(),
        });

        match kind {
            KvType::End => return Ok(id),
            KvType::Invalid | KvType::WideString => {
                return Err(KeyValueError::UnknownType(type_byte))
            }
            _ => {}
        }

        nodes[id.0].key = self.read_cstring()?;

        let value = match kind {
            KvType::Object => {
                self.depth += 1;
                if self.depth > MAX_DEPTH {
                    return Err(KeyValueError::TooDeep(MAX_DEPTH));
                }
                loop {
                    let child = self.read_node(nodes, Some(id))?;
                    if nodes[child.0].kind == KvType::End {
                        // end markers never have children, so it is the last node pushed
                        nodes.pop();
                        break;
                    }
                    nodes[id.0].children.push(child);
                }
                self.depth -= 1;
                String::new()
            }
            KvType::String => self.read_cstring()?,
            KvType::Int32 | KvType::Color | KvType::Pointer => {
                i32::from_le_bytes(self.take_array()?).to_string()
            }
            KvType::Int64 => i64::from_le_bytes(self.take_array()?).to_string(),
            KvType::Uint64 => u64::from_le_bytes(self.take_array()?).to_string(),
            KvType::Float32 => f32::from_le_bytes(self.take_array()?).to_string(),
            KvType::End | KvType::Invalid | KvType::WideString => String::new(),
        };
        nodes[id.0].value = value;

        Ok(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const STRING: u8 = 0x01;
    const INT32: u8 = 0x02;
    const OBJECT: u8 = 0x00;

    #[test]
    fn test_empty_input_is_eof() {
        assert_eq!(KeyValue::from_bytes(&[]), Err(KeyValueError::Eof));
    }

    #[test]
    fn test_lone_type_byte_is_unexpected_eof() {
        assert_eq!(
            KeyValue::from_bytes(&[STRING]),
            Err(KeyValueError::UnexpectedEof)
        );
        assert_eq!(
            KeyValue::from_bytes(&[STRING, b'K']),
            Err(KeyValueError::UnexpectedEof)
        );
        assert_eq!(
            KeyValue::from_bytes(&[INT32, b'K', 0, 1, 0, 0]),
            Err(KeyValueError::UnexpectedEof)
        );
    }

    #[test]
    fn test_end_byte_decodes_empty_node() {
        let kv = KeyValue::from_bytes(&[END]).unwrap();
        assert_eq!(kv.root_node().kind(), KvType::End);
        assert_eq!(kv.root_node().key(), "");
        assert_eq!(kv.root_node().children().count(), 0);
    }

    #[test]
    fn test_string_node() {
        let kv = KeyValue::from_bytes(&[STRING, b'K', 0, b'S', 0]).unwrap();
        let root = kv.root_node();
        assert_eq!(root.kind(), KvType::String);
        assert_eq!(root.key(), "K");
        assert_eq!(root.value(), "S");
        assert_eq!(root.children().count(), 0);
    }

    #[test]
    fn test_int32_node() {
        let kv = KeyValue::from_bytes(&[INT32, b'K', 0, 1, 0, 0, 0]).unwrap();
        assert_eq!(kv.root_node().value(), "1");
    }

    #[test]
    fn test_object_closed_by_single_end() {
        let data = [OBJECT, b'K', 0, STRING, b's', 0, b'S', 0, END];
        let kv = KeyValue::from_bytes(&data).unwrap();
        assert_eq!(kv, KeyValue::root("K").with_string("s", "S"));
    }

    #[test]
    fn test_object_root_consumes_two_end_bytes() {
        let tree = KeyValue::root("K").with_string("s", "S");
        let bytes = tree.to_bytes().unwrap();

        // type + "K\0" + child(type + "s\0" + "S\0") + end + end
        assert_eq!(bytes.len(), 1 + 2 + (1 + 2 + 2) + 1 + 1);
        assert_eq!(&bytes[bytes.len() - 2..], &[END, END]);

        let mut input = &bytes[..];
        let decoded = KeyValue::decode(&mut input).unwrap();
        assert!(input.is_empty());
        assert_eq!(decoded, tree);
    }

    #[test]
    fn test_nested_objects_round_trip() {
        let mut tree = KeyValue::root("root");
        let root = tree.root_id();
        let a = tree.add_object(root, "a");
        let b = tree.add_object(a, "b");
        tree.add_int64(b, "i64", -5);
        tree.add_float32(a, "f", 1.5);
        tree.add_color(root, "c", 0x00FF00);
        tree.add_pointer(root, "p", 12);
        tree.add_object(root, "empty");

        let bytes = tree.to_bytes().unwrap();
        let mut input = &bytes[..];
        assert_eq!(KeyValue::decode(&mut input).unwrap(), tree);
        assert!(input.is_empty());
    }

    #[test]
    fn test_nesting_limit() {
        let mut data = Vec::new();
        for _ in 0..=MAX_DEPTH {
            data.extend_from_slice(&[OBJECT, b'o', 0]);
        }
        assert_eq!(
            KeyValue::from_bytes(&data),
            Err(KeyValueError::TooDeep(MAX_DEPTH))
        );
    }

    #[test]
    fn test_unencodable_types() {
        for kind in [KvType::Invalid, KvType::End, KvType::WideString] {
            let tree = KeyValue::new(kind, "k", "");
            assert_eq!(
                tree.to_bytes(),
                Err(KeyValueError::Unencodable(kind.name()))
            );

            let mut nested = KeyValue::root("r");
            let root = nested.root_id();
            nested.add(root, kind, "k", "");
            assert!(nested.to_bytes().is_err());
        }
    }

    #[test]
    fn test_bad_numeric_value() {
        let mut tree = KeyValue::root("r");
        let root = tree.root_id();
        tree.add(root, KvType::Int32, "n", "not a number");
        assert!(matches!(
            tree.to_bytes(),
            Err(KeyValueError::InvalidValue { kind: "Int32", .. })
        ));
    }

    #[test]
    fn test_unknown_type_byte() {
        assert_eq!(
            KeyValue::from_bytes(&[0x09, b'k', 0]),
            Err(KeyValueError::UnknownType(0x09))
        );
    }
}
