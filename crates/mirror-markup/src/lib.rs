//! Markup handling for mirrored documents.
//!
//! Browsers hand us serialized fragments (`outerHTML`, SVG and VML
//! serializations) that are well-formed in practice but carry a few known
//! serializer quirks. This crate turns them into an owned [`Node`] tree,
//! strips active content from that tree and writes it back out.

mod entities;
mod error;
mod node;
mod parser;
mod sanitize;
mod serialize;

pub use error::MarkupError;
pub use node::{Content, ContentType, Node};
pub use parser::{parse, parse_with};
pub use sanitize::{sanitize, sanitize_attributes, sanitize_tree};
