use thiserror::Error;

/// Input that could not be tokenized or assembled into a single tree.
///
/// Offsets are byte positions into the markup handed to the parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("unterminated tag starting at byte {offset}")]
    UnterminatedTag { offset: usize },

    #[error("unterminated comment starting at byte {offset}")]
    UnterminatedComment { offset: usize },

    #[error("missing </{tag}> for raw text starting at byte {offset}")]
    UnterminatedRawText { tag: String, offset: usize },

    #[error("junk characters in <{tag}> at byte {offset}: {junk:?}")]
    JunkInTag {
        tag: String,
        offset: usize,
        junk: String,
    },

    #[error("malformed close tag at byte {offset}")]
    MalformedCloseTag { offset: usize },

    #[error("unexpected close tag </{tag}> at byte {offset}: nothing is open")]
    UnexpectedCloseTag { tag: String, offset: usize },

    #[error("unexpected close tag </{found}> at byte {offset}, expected </{expected}>")]
    MismatchedCloseTag {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("unexpected <{tag}> at byte {offset} after the root element closed")]
    UnexpectedRootSibling { tag: String, offset: usize },

    #[error("{count} element(s) still open at end of input, innermost <{innermost}>")]
    UnclosedElements { count: usize, innermost: String },
}

impl MarkupError {
    /// Stable short name, used as the error kind reported to viewers.
    pub fn kind(&self) -> &'static str {
        match self {
            MarkupError::UnterminatedTag { .. } => "unterminated_tag",
            MarkupError::UnterminatedComment { .. } => "unterminated_comment",
            MarkupError::UnterminatedRawText { .. } => "unterminated_raw_text",
            MarkupError::JunkInTag { .. } => "junk_in_tag",
            MarkupError::MalformedCloseTag { .. } => "malformed_close_tag",
            MarkupError::UnexpectedCloseTag { .. } => "unexpected_close_tag",
            MarkupError::MismatchedCloseTag { .. } => "mismatched_close_tag",
            MarkupError::UnexpectedRootSibling { .. } => "unexpected_root_sibling",
            MarkupError::UnclosedElements { .. } => "unclosed_elements",
        }
    }
}
