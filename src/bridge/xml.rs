//! Push source over an XML document.

use super::event::Attribute;
use super::source::{EventSink, PushSource};
use crate::error::HandoffResult;
use anyhow::Context;
use roxmltree::{Document, Node, NodeType};
use std::path::Path;

/// Parses an XML document and pushes it as structural events.
///
/// Text nodes that are whitespace only are reported as ignorable whitespace.
/// Comments and processing instructions are skipped.
#[derive(Debug, Clone)]
pub struct XmlSource {
    text: String,
}

impl XmlSource {
    /// Source over an in-memory document.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Source over the contents of `path`.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read XML document {}", path.display()))?;
        Ok(Self { text })
    }
}

impl PushSource for XmlSource {
    fn drive(self, sink: &mut dyn EventSink) -> anyhow::Result<()> {
        let doc = Document::parse(&self.text).context("failed to parse XML document")?;
        for node in doc.root().children() {
            emit(node, sink)?;
        }
        sink.end_of_input()?;
        Ok(())
    }
}

fn emit(node: Node<'_, '_>, sink: &mut dyn EventSink) -> HandoffResult<()> {
    match node.node_type() {
        NodeType::Element => {
            let name = node.tag_name().name();
            let attributes = node
                .attributes()
                .map(|attr| Attribute::new(attr.name(), attr.value()))
                .collect();
            sink.start_element(name, attributes)?;
            for child in node.children() {
                emit(child, sink)?;
            }
            sink.end_element(name)
        }
        NodeType::Text => {
            let text = node.text().unwrap_or_default();
            if text.trim().is_empty() {
                sink.ignorable_whitespace(text)
            } else {
                sink.characters(text)
            }
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Event;

    /// Sink that records into a vector.
    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
    }

    impl EventSink for Recorder {
        fn start_element(&mut self, name: &str, attributes: Vec<Attribute>) -> HandoffResult<()> {
            self.events.push(Event::StartElement {
                name: name.into(),
                attributes,
            });
            Ok(())
        }
        fn end_element(&mut self, name: &str) -> HandoffResult<()> {
            self.events.push(Event::end(name));
            Ok(())
        }
        fn characters(&mut self, text: &str) -> HandoffResult<()> {
            self.events.push(Event::text(text));
            Ok(())
        }
        fn ignorable_whitespace(&mut self, text: &str) -> HandoffResult<()> {
            self.events.push(Event::IgnorableWhitespace(text.into()));
            Ok(())
        }
        fn end_of_input(&mut self) -> HandoffResult<()> {
            self.events.push(Event::EndOfInput);
            Ok(())
        }
        fn flush(&mut self) -> HandoffResult<()> {
            Ok(())
        }
        fn is_cancelled(&self) -> bool {
            false
        }
    }

    #[test]
    fn document_order_with_whitespace() {
        let mut sink = Recorder::default();
        XmlSource::new("<a>\n  <b x=\"1\">hi</b>\n</a>")
            .drive(&mut sink)
            .unwrap();

        let kinds: Vec<String> = sink.events.iter().map(ToString::to_string).collect();
        assert_eq!(
            kinds,
            [
                "<a>",
                "whitespace",
                "<b>",
                "text \"hi\"",
                "</b>",
                "whitespace",
                "</a>",
                "end of input"
            ]
        );
        assert_eq!(sink.events[2].attribute("x"), Some("1"));
    }

    #[test]
    fn comments_are_skipped() {
        let mut sink = Recorder::default();
        XmlSource::new("<a><!-- note -->t</a>").drive(&mut sink).unwrap();
        assert_eq!(
            sink.events,
            vec![
                Event::start("a"),
                Event::text("t"),
                Event::end("a"),
                Event::EndOfInput
            ]
        );
    }

    #[test]
    fn malformed_document_fails() {
        let mut sink = Recorder::default();
        let err = XmlSource::new("<a><b></a>").drive(&mut sink).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse XML document"));
        assert!(sink.events.is_empty());
    }
}
