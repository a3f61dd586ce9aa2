//! # Binary KeyValue
//!
//! A recursive, typed key-value tree and its compact binary encoding.
//!
//! Every node has a type tag, a key and a string value. Numeric values are
//! kept in their decimal string form so a single accessor works for every
//! type. Object nodes own an ordered list of children.
//!
//! Nodes live in an arena owned by [`KeyValue`]; children and parents are
//! referenced by [`NodeId`], so the parent link never owns anything.
//!
//! ## Wire Format
//! ```text
//! node   := type(1) key NUL value
//! object := type(1)=0x00 key NUL node* end(1)=0x08
//! root   := object end(1)=0x08
//! ```
//!
//! ## Usage
//! ```rust
//! use steam_protocol::kv::{KeyValue, KvType};
//!
//! let mut tree = KeyValue::root("MessageObject");
//! let root = tree.root_id();
//! tree.add_string(root, "BB3", "abc");
//! tree.add_int32(root, "count", 3);
//!
//! let bytes = tree.to_bytes().unwrap();
//! let decoded = KeyValue::from_bytes(&bytes).unwrap();
//! assert_eq!(decoded, tree);
//! assert_eq!(decoded.root_node().child("count").unwrap().kind(), KvType::Int32);
//! ```

mod binary;
mod text;

use std::fmt;

/// Type tag of a KeyValue node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KvType {
    Invalid,
    Object,
    String,
    Int32,
    Float32,
    Pointer,
    WideString,
    Color,
    Uint64,
    End,
    Int64,
}

impl KvType {
    /// Maps a wire byte to a type; unknown bytes become `Invalid`.
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x00 => KvType::Object,
            0x01 => KvType::String,
            0x02 => KvType::Int32,
            0x03 => KvType::Float32,
            0x04 => KvType::Pointer,
            0x05 => KvType::WideString,
            0x06 => KvType::Color,
            0x07 => KvType::Uint64,
            0x08 => KvType::End,
            0x0a => KvType::Int64,
            _ => KvType::Invalid,
        }
    }

    /// Wire byte of this type. `Invalid` has no wire form and maps to `None`.
    pub fn byte(self) -> Option<u8> {
        Some(match self {
            KvType::Object => 0x00,
            KvType::String => 0x01,
            KvType::Int32 => 0x02,
            KvType::Float32 => 0x03,
            KvType::Pointer => 0x04,
            KvType::WideString => 0x05,
            KvType::Color => 0x06,
            KvType::Uint64 => 0x07,
            KvType::End => 0x08,
            KvType::Int64 => 0x0a,
            KvType::Invalid => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            KvType::Invalid => "Invalid",
            KvType::Object => "Object",
            KvType::String => "String",
            KvType::Int32 => "Int32",
            KvType::Float32 => "Float32",
            KvType::Pointer => "Pointer",
            KvType::WideString => "WideString",
            KvType::Color => "Color",
            KvType::Uint64 => "Uint64",
            KvType::End => "End",
            KvType::Int64 => "Int64",
        }
    }
}

impl fmt::Display for KvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle to a node inside a [`KeyValue`] tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    kind: KvType,
    key: String,
    value: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A KeyValue tree. The first node is always the root.
#[derive(Debug, Clone)]
pub struct KeyValue {
    nodes: Vec<Node>,
}

impl KeyValue {
    /// A tree holding a single root node.
    pub fn new(kind: KvType, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node {
                kind,
                key: key.into(),
                value: value.into(),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// An object root, the conventional top of an encoded tree.
    pub fn root(key: impl Into<String>) -> Self {
        Self::new(KvType::Object, key, "")
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    /// Read-only view of the root node.
    pub fn root_node(&self) -> NodeRef<'_> {
        NodeRef {
            tree: self,
            id: NodeId(0),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id.0 < self.nodes.len()).then_some(NodeRef { tree: self, id })
    }

    /// Appends a child under `parent` and returns its id.
    ///
    /// # Panics
    /// Panics if `parent` does not belong to this tree.
    pub fn add(
        &mut self,
        parent: NodeId,
        kind: KvType,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            key: key.into(),
            value: value.into(),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn add_object(&mut self, parent: NodeId, key: impl Into<String>) -> NodeId {
        self.add(parent, KvType::Object, key, "")
    }

    pub fn add_string(
        &mut self,
        parent: NodeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> NodeId {
        self.add(parent, KvType::String, key, value)
    }

    pub fn add_int32(&mut self, parent: NodeId, key: impl Into<String>, value: i32) -> NodeId {
        self.add(parent, KvType::Int32, key, value.to_string())
    }

    pub fn add_int64(&mut self, parent: NodeId, key: impl Into<String>, value: i64) -> NodeId {
        self.add(parent, KvType::Int64, key, value.to_string())
    }

    pub fn add_uint64(&mut self, parent: NodeId, key: impl Into<String>, value: u64) -> NodeId {
        self.add(parent, KvType::Uint64, key, value.to_string())
    }

    pub fn add_float32(&mut self, parent: NodeId, key: impl Into<String>, value: f32) -> NodeId {
        self.add(parent, KvType::Float32, key, value.to_string())
    }

    pub fn add_color(&mut self, parent: NodeId, key: impl Into<String>, value: i32) -> NodeId {
        self.add(parent, KvType::Color, key, value.to_string())
    }

    pub fn add_pointer(&mut self, parent: NodeId, key: impl Into<String>, value: i32) -> NodeId {
        self.add(parent, KvType::Pointer, key, value.to_string())
    }

    /// Builder form of [`KeyValue::add_string`] on the root.
    pub fn with_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let root = self.root_id();
        self.add_string(root, key, value);
        self
    }

    /// Replaces the value of an existing node.
    pub fn set_value(&mut self, id: NodeId, value: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.value = value.into();
        }
    }

    /// Total number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.root_node() == other.root_node()
    }
}

/// Borrowed view of one node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a KeyValue,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    fn node(&self) -> &'a Node {
        &self.tree.nodes[self.id.0]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> KvType {
        self.node().kind
    }

    pub fn key(&self) -> &'a str {
        &self.node().key
    }

    pub fn value(&self) -> &'a str {
        &self.node().value
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.node().parent.map(|id| NodeRef {
            tree: self.tree,
            id,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        self.node()
            .children
            .iter()
            .map(move |&id| NodeRef { tree, id })
    }

    /// First child with the given key.
    pub fn child(&self, key: &str) -> Option<NodeRef<'a>> {
        self.children().find(|c| c.key() == key)
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.value().parse().ok()
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.value().parse().ok()
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.value().parse().ok()
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.value().parse().ok()
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
            && self.key() == other.key()
            && self.value() == other.value()
            && self.node().children.len() == other.node().children.len()
            && self.children().zip(other.children()).all(|(a, b)| a == b)
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("kind", &self.kind())
            .field("key", &self.key())
            .field("value", &self.value())
            .field("children", &self.node().children.len())
            .finish()
    }
}
