use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const MAIN_MARKER: &str = "m";
const FRAME_MARKER: &str = "i";

/// One step of a [`FramePath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// The top-level window. Always the first segment, never repeated.
    Main,
    /// Descent from a frame element into the document it hosts.
    Frame,
    /// Child index within the current document.
    Child(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Main => f.write_str(MAIN_MARKER),
            Segment::Frame => f.write_str(FRAME_MARKER),
            Segment::Child(index) => write!(f, "{index}"),
        }
    }
}

impl Serialize for Segment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Segment::Main => serializer.serialize_str(MAIN_MARKER),
            Segment::Frame => serializer.serialize_str(FRAME_MARKER),
            Segment::Child(index) => serializer.serialize_u64(*index as u64),
        }
    }
}

impl<'de> Deserialize<'de> for Segment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SegmentVisitor;

        impl Visitor<'_> for SegmentVisitor {
            type Value = Segment;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"m\", \"i\" or a child index")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Segment, E> {
                usize::try_from(value)
                    .map(Segment::Child)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(value), &self))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Segment, E> {
                match u64::try_from(value) {
                    Ok(unsigned) => self.visit_u64(unsigned),
                    Err(_) => Err(E::invalid_value(de::Unexpected::Signed(value), &self)),
                }
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Segment, E> {
                match value {
                    MAIN_MARKER => Ok(Segment::Main),
                    FRAME_MARKER => Ok(Segment::Frame),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(SegmentVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidFramePath {
    #[error("frame path is empty")]
    Empty,
    #[error("frame path must start with \"m\", found {0}")]
    MissingMain(Segment),
    #[error("\"m\" may only appear first, found at segment {0}")]
    MisplacedMain(usize),
}

/// Address of one document context in the mirrored page: `["m"]` for the
/// top window, `["m", 1, 0, "i"]` for the document inside the frame element
/// at child path `[1, 0]`.
///
/// Paths order lexicographically by segment, which is what keeps per-frame
/// listings stable; delivery order is by [`FramePath::len`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<Segment>", into = "Vec<Segment>")]
pub struct FramePath(Vec<Segment>);

impl FramePath {
    pub fn main() -> Self {
        Self(vec![Segment::Main])
    }

    /// Validates a segment list read from outside the process.
    pub fn try_new(segments: Vec<Segment>) -> Result<Self, InvalidFramePath> {
        match segments.first() {
            None => return Err(InvalidFramePath::Empty),
            Some(Segment::Main) => {}
            Some(other) => return Err(InvalidFramePath::MissingMain(*other)),
        }
        if let Some(index) = segments
            .iter()
            .skip(1)
            .position(|segment| *segment == Segment::Main)
        {
            return Err(InvalidFramePath::MisplacedMain(index + 1));
        }
        Ok(Self(segments))
    }

    /// Builds a path in code.
    ///
    /// # Panics
    ///
    /// If the segments do not form a valid path.
    pub fn new(segments: Vec<Segment>) -> Self {
        match Self::try_new(segments) {
            Ok(path) => path,
            Err(err) => panic!("invalid frame path: {err}"),
        }
    }

    pub fn child(mut self, index: usize) -> Self {
        self.0.push(Segment::Child(index));
        self
    }

    pub fn frame(mut self) -> Self {
        self.0.push(Segment::Frame);
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_main(&self) -> bool {
        self.0.len() == 1
    }

    /// True when `self` lies strictly below `ancestor`.
    pub fn is_strict_descendant_of(&self, ancestor: &FramePath) -> bool {
        self.0.len() > ancestor.0.len() && self.0.starts_with(&ancestor.0)
    }
}

impl TryFrom<Vec<Segment>> for FramePath {
    type Error = InvalidFramePath;

    fn try_from(segments: Vec<Segment>) -> Result<Self, Self::Error> {
        Self::try_new(segments)
    }
}

impl From<FramePath> for Vec<Segment> {
    fn from(path: FramePath) -> Self {
        path.0
    }
}

impl fmt::Display for FramePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}
