//! Structural events carried from the push side to the pull side.

use std::fmt;

/// Longest text excerpt shown when an event is displayed.
const TEXT_EXCERPT_LEN: usize = 32;

/// Name/value pair attached to an element start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name (local part).
    pub name: String,
    /// Unescaped attribute value.
    pub value: String,
}

impl Attribute {
    /// Build an attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One structural event.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StartElement {
        name: String,
        attributes: Vec<Attribute>,
    },
    EndElement {
        name: String,
    },
    /// A run of significant text.
    Characters(String),
    /// Whitespace-only text between elements.
    IgnorableWhitespace(String),
    /// Terminal sentinel. Always the last event of a stream.
    EndOfInput,
}

/// Discriminant of an [`Event`], used for look-ahead without cloning payloads.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StartElement,
    EndElement,
    Characters,
    IgnorableWhitespace,
    EndOfInput,
}

impl Event {
    /// Element start without attributes.
    pub fn start(name: impl Into<String>) -> Self {
        Event::StartElement {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Element end.
    pub fn end(name: impl Into<String>) -> Self {
        Event::EndElement { name: name.into() }
    }

    /// Significant text.
    pub fn text(text: impl Into<String>) -> Self {
        Event::Characters(text.into())
    }

    /// Kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Event::StartElement { .. } => EventKind::StartElement,
            Event::EndElement { .. } => EventKind::EndElement,
            Event::Characters(_) => EventKind::Characters,
            Event::IgnorableWhitespace(_) => EventKind::IgnorableWhitespace,
            Event::EndOfInput => EventKind::EndOfInput,
        }
    }

    /// Element name for start and end events.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Event::StartElement { name, .. } | Event::EndElement { name } => Some(name),
            _ => None,
        }
    }

    /// Text payload for character and whitespace events.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match self {
            Event::Characters(text) | Event::IgnorableWhitespace(text) => Some(text),
            _ => None,
        }
    }

    /// Value of attribute `name` on a start event.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            Event::StartElement { attributes, .. } => attributes
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.value.as_str()),
            _ => None,
        }
    }

    /// True for the start of element `tag`.
    #[must_use]
    pub fn is_start(&self, tag: &str) -> bool {
        matches!(self, Event::StartElement { name, .. } if name == tag)
    }

    /// True for the end of element `tag`.
    #[must_use]
    pub fn is_end(&self, tag: &str) -> bool {
        matches!(self, Event::EndElement { name } if name == tag)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::StartElement { name, .. } => write!(f, "<{name}>"),
            Event::EndElement { name } => write!(f, "</{name}>"),
            Event::Characters(text) => {
                let excerpt: String = text.chars().take(TEXT_EXCERPT_LEN).collect();
                if excerpt.len() < text.len() {
                    write!(f, "text \"{excerpt}...\"")
                } else {
                    write!(f, "text \"{excerpt}\"")
                }
            }
            Event::IgnorableWhitespace(_) => f.write_str("whitespace"),
            Event::EndOfInput => f.write_str("end of input"),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventKind::StartElement => "start element",
            EventKind::EndElement => "end element",
            EventKind::Characters => "characters",
            EventKind::IgnorableWhitespace => "ignorable whitespace",
            EventKind::EndOfInput => "end of input",
        };
        f.write_str(label)
    }
}
