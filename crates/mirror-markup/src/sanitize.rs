//! Removal of active and environment-specific content from mirrored markup.
//!
//! This is a denylist: anything not mentioned here passes through untouched
//! so unknown and foreign elements survive. The viewer never executes what
//! it receives, so the aim is to strip script, event handlers and live
//! navigation rather than to produce "safe HTML" in the general sense.

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::MarkupError;
use crate::node::{Content, ContentType, Node};
use crate::parser::parse_with;

/// Elements dropped together with their content.
const KILL_TAGS: &[&str] = &["script", "meta", "title"];

/// Elements replaced by their children.
const UNWRAP_TAGS: &[&str] = &["blink", "marquee"];

const FRAME_TAGS: &[&str] = &["iframe", "frame"];

const LINK_ATTRS: &[&str] = &["href", "xlink:href"];

/// Parses, sanitizes and re-serializes `markup`.
///
/// Markup with no root element, or whose root is itself removed, sanitizes
/// to the empty string.
pub fn sanitize(markup: &str, content_type: ContentType) -> Result<String, MarkupError> {
    let Some(root) = parse_with(markup, content_type)? else {
        return Ok(String::new());
    };
    Ok(sanitize_tree(root, content_type)
        .map(|root| root.to_markup(content_type))
        .unwrap_or_default())
}

/// Sanitizes an already parsed tree. Returns `None` when the root element is
/// one that gets removed outright.
pub fn sanitize_tree(mut root: Node, content_type: ContentType) -> Option<Node> {
    if is_killed(&root, content_type) {
        trace!(tag = %root.tag, "dropping root element");
        return None;
    }
    clean(&mut root, content_type);
    Some(root)
}

/// Applies the attribute policy to a bare attribute map, as carried by an
/// attribute-change record: event handlers go.
///
/// The record does not name its element, so links are left alone. Only `a`
/// elements have their `href` rewritten when a tree is sanitized, and a
/// stylesheet `link` must keep its target.
pub fn sanitize_attributes(attrs: &mut BTreeMap<String, String>) {
    attrs.retain(|name, _| !is_event_handler(name));
}

fn is_event_handler(name: &str) -> bool {
    name.get(..2)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("on"))
}

fn is_killed(node: &Node, content_type: ContentType) -> bool {
    if content_type.is_foreign() {
        node.is_named("script")
    } else {
        KILL_TAGS.iter().any(|tag| node.is_named(tag))
    }
}

fn is_unwrapped(node: &Node, content_type: ContentType) -> bool {
    !content_type.is_foreign() && UNWRAP_TAGS.iter().any(|tag| node.is_named(tag))
}

fn clean(node: &mut Node, content_type: ContentType) {
    clean_attrs(node, content_type);

    let children = std::mem::take(&mut node.children);
    for child in children {
        match child {
            Content::Comment(_) => {}
            Content::Text(text) => node.push_text(&text),
            Content::Element(el) if is_killed(&el, content_type) => {
                trace!(tag = %el.tag, "dropping element");
            }
            Content::Element(mut el) => {
                clean(&mut el, content_type);
                if is_unwrapped(&el, content_type) {
                    splice(node, el.children);
                } else {
                    node.push_element(el);
                }
            }
        }
    }

    if !content_type.is_foreign() && node.is_named("table") {
        force_tbody(node);
    }
}

fn clean_attrs(node: &mut Node, content_type: ContentType) {
    node.attrs.retain(|name, _| !is_event_handler(name));

    if FRAME_TAGS.iter().any(|tag| node.is_named(tag)) {
        node.attrs.remove("src");
    }

    if node.is_named("a") {
        let links = if content_type.is_foreign() {
            LINK_ATTRS
        } else {
            &LINK_ATTRS[..1]
        };
        for name in links {
            if let Some(href) = node.attrs.get_mut(*name) {
                *href = "#".to_string();
            }
        }
    }
}

fn splice(parent: &mut Node, children: Vec<Content>) {
    for child in children {
        match child {
            Content::Element(el) => parent.push_element(el),
            Content::Text(text) => parent.push_text(&text),
            Content::Comment(text) => parent.push_comment(text),
        }
    }
}

/// Wraps rows sitting directly in a table in an implicit `tbody`, the way
/// rendering engines do when they build the live tree. Consecutive rows
/// share one `tbody`; a `colgroup` is left in place without ending it.
fn force_tbody(table: &mut Node) {
    let needs_body = table
        .elements()
        .any(|el| !is_table_section(el) && !el.is_named("colgroup"));
    if !needs_body {
        return;
    }

    let children = std::mem::take(&mut table.children);
    let mut tbody: Option<usize> = None;
    let mut after_moved = false;

    for child in children {
        match child {
            Content::Element(el) if el.is_named("colgroup") => {
                table.push_element(el);
                after_moved = false;
            }
            Content::Element(el) if is_table_section(&el) => {
                table.push_element(el);
                tbody = None;
                after_moved = false;
            }
            Content::Element(el) => {
                let index = match tbody {
                    Some(index) => index,
                    None => {
                        table.push_element(Node::new("tbody"));
                        let index = table.children.len() - 1;
                        tbody = Some(index);
                        index
                    }
                };
                if let Some(body) = table.children[index].as_element_mut() {
                    body.push_element(el);
                }
                after_moved = true;
            }
            Content::Text(text) => match tbody {
                Some(index) if after_moved => {
                    if let Some(body) = table.children[index].as_element_mut() {
                        body.push_text(&text);
                    }
                }
                _ => table.push_text(&text),
            },
            Content::Comment(text) => table.push_comment(text),
        }
    }
}

fn is_table_section(node: &Node) -> bool {
    ["tbody", "thead", "tfoot"]
        .iter()
        .any(|tag| node.is_named(tag))
}
