use crate::entities::{escape_attr, escape_text};
use crate::node::{Content, ContentType, Node};
use crate::parser::is_void;

impl Node {
    /// Serializes the subtree back to markup.
    ///
    /// Attributes are written in name order. HTML void elements get no end
    /// tag; empty foreign elements are written self-closed.
    pub fn to_markup(&self, content_type: ContentType) -> String {
        let mut out = String::new();
        write_node(self, content_type, &mut out);
        out
    }
}

fn write_node(node: &Node, content_type: ContentType, out: &mut String) {
    out.push('<');
    out.push_str(&node.tag);
    for (name, value) in &node.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attr(value, out);
        out.push('"');
    }

    if content_type.is_foreign() {
        if node.children.is_empty() {
            out.push_str("/>");
            return;
        }
    } else if is_void(&node.tag) {
        out.push('>');
        return;
    }
    out.push('>');

    let raw = node.is_named("script") || node.is_named("style");
    for child in &node.children {
        match child {
            Content::Element(el) => write_node(el, content_type, out),
            Content::Text(text) if raw => out.push_str(text),
            Content::Text(text) => escape_text(text, out),
            Content::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
        }
    }

    out.push_str("</");
    out.push_str(&node.tag);
    out.push('>');
}
