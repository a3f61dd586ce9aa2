//! Indented text rendering of a [`KeyValue`] tree, for inspection only.

use super::{KeyValue, KvType, NodeRef};
use std::fmt::{self, Write};

const INDENT: &str = "  ";

impl KeyValue {
    /// Renders the tree as `key "value"` and `key { ... }` lines.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = write_node(&mut out, self.root_node(), 0);
        out
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, self.root_node(), 0)
    }
}

fn write_node<W: Write>(w: &mut W, node: NodeRef<'_>, depth: usize) -> fmt::Result {
    let pad = INDENT.repeat(depth);
    match node.kind() {
        KvType::Object => {
            writeln!(w, "{pad}{} {{", node.key())?;
            for child in node.children() {
                write_node(w, child, depth + 1)?;
            }
            writeln!(w, "{pad}}}")
        }
        _ => writeln!(w, "{pad}{} {:?}", node.key(), node.value()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_rendering() {
        let mut tree = KeyValue::root("MessageObject");
        let root = tree.root_id();
        tree.add_string(root, "BB3", "abc");
        let inner = tree.add_object(root, "inner");
        tree.add_int32(inner, "n", 7);

        let expected = "MessageObject {\n  BB3 \"abc\"\n  inner {\n    n \"7\"\n  }\n}\n";
        assert_eq!(tree.to_text(), expected);
        assert_eq!(tree.to_string(), expected);
    }
}
