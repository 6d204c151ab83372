//! Tolerant parser for serialized live-document markup.
//!
//! The input comes from a rendering engine's serializer (`outerHTML` and
//! friends), so structure is assumed to be mostly sound. The parser repairs
//! the quirks those serializers are known to produce and rejects anything it
//! cannot tokenize:
//!
//! - void elements never take content and their end tags are ignored
//! - elements listed in the autoclose table are closed when a sibling that
//!   implicitly ends them opens (`<li>a<li>b`)
//! - `script`/`style` content is raw text up to the matching end tag
//! - a stray `?` token or `"=""` token inside a start tag is dropped
//!
//! The tree is built from a stack of owned open elements; an element is
//! attached to its parent when it closes.

use std::collections::BTreeMap;

use tracing::trace;

use crate::entities;
use crate::error::MarkupError;
use crate::node::{ContentType, Node};

pub(crate) const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

const TABLE_SECTIONS: &[&str] = &["tbody", "thead", "tfoot", "colgroup"];

const CLOSES_PARAGRAPH: &[&str] = &[
    "address", "article", "aside", "blockquote", "dir", "div", "dl", "fieldset", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "menu", "nav", "ol", "p", "pre",
    "section", "table", "ul",
];

/// Tags that implicitly close an open element of the given tag when they
/// open directly inside it.
fn closed_by(open: &str) -> Option<&'static [&'static str]> {
    let closers: &'static [&'static str] = match open {
        "p" => CLOSES_PARAGRAPH,
        "tbody" | "thead" | "tfoot" | "colgroup" => TABLE_SECTIONS,
        "tr" => &["tr"],
        "td" | "th" => &["td", "th"],
        "dt" | "dd" => &["dt", "dd"],
        "li" => &["li"],
        "option" => &["option"],
        _ => return None,
    };
    Some(closers)
}

/// Foreign fragments keep name case, and HTML embedded in them (inside
/// `foreignObject`) still writes void elements without an end tag.
pub(crate) fn is_void(tag: &str) -> bool {
    VOID_TAGS.iter().any(|void| tag.eq_ignore_ascii_case(void))
}

fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_TAGS.iter().any(|raw| tag.eq_ignore_ascii_case(raw))
}

/// Parses ordinary HTML markup. `Ok(None)` means the input holds no element.
pub fn parse(markup: &str) -> Result<Option<Node>, MarkupError> {
    parse_with(markup, ContentType::Html)
}

pub fn parse_with(markup: &str, content_type: ContentType) -> Result<Option<Node>, MarkupError> {
    let mut tokenizer = Tokenizer::new(markup, content_type);
    let mut builder = TreeBuilder::new(content_type);

    while let Some(token) = tokenizer.next_token()? {
        match token {
            Token::StartTag {
                name,
                attrs,
                self_closing,
                offset,
            } => {
                let still_open = builder.start_tag(name, attrs, self_closing, offset)?;
                if still_open {
                    if let Some(open) = builder.top_tag().filter(|tag| is_raw_text(tag)) {
                        tokenizer.enter_raw_text(open.to_string());
                    }
                }
            }
            Token::EndTag { name, offset } => builder.end_tag(&name, offset)?,
            Token::Text(text) => builder.text(&text),
            Token::Comment(text) => builder.comment(text),
        }
    }

    builder.finish()
}

#[derive(Debug, PartialEq)]
enum Token {
    StartTag {
        name: String,
        attrs: BTreeMap<String, String>,
        self_closing: bool,
        offset: usize,
    },
    EndTag {
        name: String,
        offset: usize,
    },
    Text(String),
    Comment(String),
}

struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    content_type: ContentType,
    raw_text_tag: Option<String>,
}

fn is_tag_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b':' | b'_')
}

fn is_attr_name_byte(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'/' | b'>' | b'=' | b'"' | b'\'' | b'<')
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str, content_type: ContentType) -> Self {
        Self {
            src,
            pos: 0,
            content_type,
            raw_text_tag: None,
        }
    }

    fn enter_raw_text(&mut self, tag: String) {
        self.raw_text_tag = Some(tag);
    }

    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes().get(self.pos + ahead).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn next_token(&mut self) -> Result<Option<Token>, MarkupError> {
        if let Some(tag) = self.raw_text_tag.take() {
            let text = self.raw_text(&tag)?;
            if !text.is_empty() {
                return Ok(Some(Token::Text(text.to_string())));
            }
        }

        loop {
            let Some(first) = self.peek() else {
                return Ok(None);
            };
            if first != b'<' {
                return Ok(Some(self.text(self.pos)));
            }
            match self.peek_at(1) {
                Some(b) if b.is_ascii_alphabetic() => return self.start_tag().map(Some),
                Some(b'/') => return self.end_tag().map(Some),
                Some(b'!') => {
                    if let Some(token) = self.markup_declaration()? {
                        return Ok(Some(token));
                    }
                }
                Some(b'?') => self.skip_past_gt()?,
                // A lone '<' is literal text.
                _ => return Ok(Some(self.text(self.pos + 1))),
            }
        }
    }

    /// Text up to the next '<' at or after `scan_from`.
    fn text(&mut self, scan_from: usize) -> Token {
        let start = self.pos;
        let end = self.src[scan_from..]
            .find('<')
            .map_or(self.src.len(), |idx| scan_from + idx);
        self.pos = end;
        Token::Text(entities::decode(&self.src[start..end]).into_owned())
    }

    fn raw_text(&mut self, tag: &str) -> Result<&'a str, MarkupError> {
        let start = self.pos;
        let bytes = self.bytes();
        let mut search = start;
        while let Some(idx) = self.src[search..].find("</") {
            let candidate = search + idx;
            let name_start = candidate + 2;
            let name_end = name_start + tag.len();
            let matches_name = self
                .src
                .get(name_start..name_end)
                .is_some_and(|name| name.eq_ignore_ascii_case(tag));
            let terminated = bytes
                .get(name_end)
                .is_some_and(|b| b.is_ascii_whitespace() || matches!(b, b'>' | b'/'));
            if matches_name && terminated {
                self.pos = candidate;
                return Ok(&self.src[start..candidate]);
            }
            search = candidate + 2;
        }
        Err(MarkupError::UnterminatedRawText {
            tag: tag.to_string(),
            offset: start,
        })
    }

    fn markup_declaration(&mut self) -> Result<Option<Token>, MarkupError> {
        let offset = self.pos;
        let rest = &self.src[offset..];
        if let Some(body) = rest.strip_prefix("<!--") {
            let end = body
                .find("-->")
                .ok_or(MarkupError::UnterminatedComment { offset })?;
            self.pos = offset + 4 + end + 3;
            return Ok(Some(Token::Comment(body[..end].to_string())));
        }
        if let Some(body) = rest.strip_prefix("<![CDATA[") {
            let end = body
                .find("]]>")
                .ok_or(MarkupError::UnterminatedTag { offset })?;
            self.pos = offset + 9 + end + 3;
            return Ok(Some(Token::Text(body[..end].to_string())));
        }
        // Doctype and other declarations carry nothing worth mirroring.
        self.skip_past_gt()?;
        Ok(None)
    }

    fn skip_past_gt(&mut self) -> Result<(), MarkupError> {
        let offset = self.pos;
        let end = self.src[offset..]
            .find('>')
            .ok_or(MarkupError::UnterminatedTag { offset })?;
        self.pos = offset + end + 1;
        Ok(())
    }

    fn start_tag(&mut self) -> Result<Token, MarkupError> {
        let offset = self.pos;
        self.pos += 1;
        let raw_name = self.take_while(is_tag_name_byte);
        let name = self.content_type.fold_name(raw_name);
        let mut attrs = BTreeMap::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(MarkupError::UnterminatedTag { offset }),
                Some(b'>') => {
                    self.pos += 1;
                    return Ok(Token::StartTag {
                        name,
                        attrs,
                        self_closing: false,
                        offset,
                    });
                }
                Some(b'/') => match self.peek_at(1) {
                    Some(b'>') => {
                        self.pos += 2;
                        return Ok(Token::StartTag {
                            name,
                            attrs,
                            self_closing: true,
                            offset,
                        });
                    }
                    None => return Err(MarkupError::UnterminatedTag { offset }),
                    Some(_) => self.pos += 1,
                },
                // Serializer artifacts: IE writes `<a href="x"">` as
                // `<a href="x" ?>`, Chrome as `<a href="x" "="">`.
                Some(b'?') | Some(b'"') => {
                    self.pos += 1;
                    let _ = self.attr_value(offset)?;
                }
                Some(b) if is_attr_name_byte(b) => {
                    let attr_name = self.take_while(is_attr_name_byte);
                    let attr_name = self.content_type.fold_name(attr_name);
                    let value = self.attr_value(offset)?.unwrap_or_default();
                    attrs.insert(attr_name, value);
                }
                Some(_) => {
                    let junk_end = (self.pos + 20).min(self.src.len());
                    let junk = String::from_utf8_lossy(&self.bytes()[self.pos..junk_end]);
                    return Err(MarkupError::JunkInTag {
                        tag: name,
                        offset: self.pos,
                        junk: junk.into_owned(),
                    });
                }
            }
        }
    }

    /// Parses an optional `= value` after an attribute name.
    fn attr_value(&mut self, tag_offset: usize) -> Result<Option<String>, MarkupError> {
        let before = self.pos;
        self.skip_whitespace();
        if self.peek() != Some(b'=') {
            self.pos = before;
            return Ok(None);
        }
        self.pos += 1;
        self.skip_whitespace();
        let raw = match self.peek() {
            None => return Err(MarkupError::UnterminatedTag { offset: tag_offset }),
            Some(quote @ (b'"' | b'\'')) => {
                let start = self.pos + 1;
                let len = self.bytes()[start..]
                    .iter()
                    .position(|&b| b == quote)
                    .ok_or(MarkupError::UnterminatedTag { offset: tag_offset })?;
                self.pos = start + len + 1;
                &self.src[start..start + len]
            }
            Some(_) => self.take_while(|b| !b.is_ascii_whitespace() && b != b'>'),
        };
        Ok(Some(entities::decode(raw).into_owned()))
    }

    fn end_tag(&mut self) -> Result<Token, MarkupError> {
        let offset = self.pos;
        self.pos += 2;
        self.skip_whitespace();
        match self.peek() {
            None => return Err(MarkupError::UnterminatedTag { offset }),
            Some(b) if b.is_ascii_alphabetic() => {}
            Some(_) => return Err(MarkupError::MalformedCloseTag { offset }),
        }
        let raw_name = self.take_while(is_tag_name_byte);
        let name = self.content_type.fold_name(raw_name);
        self.skip_whitespace();
        match self.peek() {
            Some(b'>') => {
                self.pos += 1;
                Ok(Token::EndTag { name, offset })
            }
            None => Err(MarkupError::UnterminatedTag { offset }),
            Some(_) => Err(MarkupError::MalformedCloseTag { offset }),
        }
    }
}

struct TreeBuilder {
    content_type: ContentType,
    stack: Vec<Node>,
    root: Option<Node>,
}

impl TreeBuilder {
    fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            stack: Vec::new(),
            root: None,
        }
    }

    fn top_tag(&self) -> Option<&str> {
        self.stack.last().map(|node| node.tag.as_str())
    }

    /// Returns whether the new element is still open afterwards.
    fn start_tag(
        &mut self,
        name: String,
        attrs: BTreeMap<String, String>,
        self_closing: bool,
        offset: usize,
    ) -> Result<bool, MarkupError> {
        if self.stack.is_empty() && self.root.is_some() {
            return Err(MarkupError::UnexpectedRootSibling { tag: name, offset });
        }
        for _ in 0..self.autoclose_count(&name) {
            if let Some(closed) = self.stack.last() {
                trace!(closed = %closed.tag, opened = %name, "autoclosing element");
            }
            self.close_top();
        }

        let void = is_void(&name);
        self.stack.push(Node::with_attrs(name, attrs));
        if self_closing || void {
            self.close_top();
            return Ok(false);
        }
        Ok(true)
    }

    /// Number of open elements, counted from the top of the stack, that the
    /// new tag implicitly closes. The root is never autoclosed.
    fn autoclose_count(&self, tag: &str) -> usize {
        if self.content_type.is_foreign() {
            return 0;
        }
        let mut count = 0;
        for (depth, open) in self.stack.iter().enumerate().rev() {
            match closed_by(&open.tag) {
                Some(closers) if closers.contains(&tag) => {
                    if depth == 0 {
                        return 0;
                    }
                    count += 1;
                }
                _ => break,
            }
        }
        count
    }

    fn end_tag(&mut self, name: &str, offset: usize) -> Result<(), MarkupError> {
        if is_void(name) {
            return Ok(());
        }
        let Some(open) = self.stack.last() else {
            return Err(MarkupError::UnexpectedCloseTag {
                tag: name.to_string(),
                offset,
            });
        };
        if open.tag != name {
            let Some(implied) = self.implied_by_close(name) else {
                return Err(MarkupError::MismatchedCloseTag {
                    expected: open.tag.clone(),
                    found: name.to_string(),
                    offset,
                });
            };
            for _ in 0..implied {
                if let Some(closed) = self.stack.last() {
                    trace!(closed = %closed.tag, by = %name, "closing element with optional end tag");
                }
                self.close_top();
            }
        }
        self.close_top();
        Ok(())
    }

    /// Elements with optional end tags (the autoclose table's keys) that sit
    /// above the nearest open `tag` are closed by its end tag: `</ul>` ends a
    /// trailing `<li>`. Returns how many, or `None` if anything else is in
    /// the way.
    fn implied_by_close(&self, tag: &str) -> Option<usize> {
        if self.content_type.is_foreign() {
            return None;
        }
        let mut count = 0;
        for open in self.stack.iter().rev() {
            if open.tag == tag {
                return Some(count);
            }
            closed_by(&open.tag)?;
            count += 1;
        }
        None
    }

    fn close_top(&mut self) {
        let Some(node) = self.stack.pop() else {
            return;
        };
        match self.stack.last_mut() {
            Some(parent) => parent.push_element(node),
            None => self.root = Some(node),
        }
    }

    fn text(&mut self, text: &str) {
        // Text outside the root is serializer whitespace.
        if let Some(open) = self.stack.last_mut() {
            open.push_text(text);
        }
    }

    fn comment(&mut self, text: String) {
        if let Some(open) = self.stack.last_mut() {
            open.push_comment(text);
        }
    }

    fn finish(self) -> Result<Option<Node>, MarkupError> {
        if let Some(innermost) = self.stack.last() {
            return Err(MarkupError::UnclosedElements {
                count: self.stack.len(),
                innermost: innermost.tag.clone(),
            });
        }
        Ok(self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Content;

    fn tokens(src: &str) -> Vec<Token> {
        let mut tokenizer = Tokenizer::new(src, ContentType::Html);
        let mut out = Vec::new();
        while let Some(token) = tokenizer.next_token().unwrap() {
            out.push(token);
        }
        out
    }

    #[test]
    fn tokenizes_unquoted_and_valueless_attributes() {
        let toks = tokens("<INPUT type=text disabled value='a b'>");
        let Token::StartTag { name, attrs, .. } = &toks[0] else {
            panic!("expected start tag, got {toks:?}");
        };
        assert_eq!(name, "input");
        assert_eq!(attrs.get("type").map(String::as_str), Some("text"));
        assert_eq!(attrs.get("disabled").map(String::as_str), Some(""));
        assert_eq!(attrs.get("value").map(String::as_str), Some("a b"));
    }

    #[test]
    fn drops_serializer_artifacts() {
        let toks = tokens(r#"<a href="x" ?><b class="y" "="">"#);
        let names: Vec<Vec<&String>> = toks
            .iter()
            .filter_map(|t| match t {
                Token::StartTag { attrs, .. } => Some(attrs.keys().collect()),
                _ => None,
            })
            .collect();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], vec!["href"]);
        assert_eq!(names[1], vec!["class"]);
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        let root = parse("<p>1 < 2</p>").unwrap().unwrap();
        assert_eq!(root.children, vec![Content::Text("1 < 2".into())]);
    }

    #[test]
    fn autoclose_never_closes_root() {
        let root = parse("<li>a<li>b</li></li>").unwrap().unwrap();
        assert_eq!(root.tag, "li");
        assert_eq!(root.elements().count(), 1);
    }

    #[test]
    fn paragraph_closed_by_block() {
        let root = parse("<div><p>hello<div>world</div></div>").unwrap().unwrap();
        let tags: Vec<&str> = root.elements().map(|n| n.tag.as_str()).collect();
        assert_eq!(tags, vec!["p", "div"]);
    }

    #[test]
    fn doctype_is_skipped() {
        let root = parse("<!DOCTYPE html>\n<html><body></body></html>")
            .unwrap()
            .unwrap();
        assert_eq!(root.tag, "html");
    }

    #[test]
    fn unterminated_attribute_fails() {
        let err = parse(r#"<div class="open"#).unwrap_err();
        assert_eq!(err, MarkupError::UnterminatedTag { offset: 0 });
    }
}
