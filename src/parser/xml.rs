//! Small owned element tree over quick-xml events
//!
//! Manifests and OOXML parts are small enough to hold in memory, and
//! walking a tree keeps the "direct children only" rules easy to state.
//! Names are stored without namespace prefixes.

use super::ParseError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// Deepest element nesting accepted; the tree walkers recurse per level
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    fn from_start(start: &BytesStart<'_>, format: &'static str) -> Result<Self, ParseError> {
        let mut element = Self::new(String::from_utf8_lossy(start.local_name().as_ref()));
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ParseError::format(format, format!("bad attribute: {}", e)))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| ParseError::format(format, format!("bad attribute value: {}", e)))?
                .into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    /// Attribute by local name, ignoring ASCII case
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Direct child elements
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Direct child elements with the given local name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.name == name)
    }

    /// First direct child with the given local name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// First descendant (depth-first, document order) with the given local name
    pub fn find(&self, name: &str) -> Option<&Element> {
        for child in self.elements() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenated text of this element and everything below it
    pub fn text(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.collect_text(out),
            }
        }
    }

    /// Trimmed text of a direct child, if present and non-empty
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name)
            .map(|c| c.text().trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

fn attach(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

/// Parse a whole document and return its root element
pub fn parse(xml: &str, format: &'static str) -> Result<Element, ParseError> {
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
    let mut reader = Reader::from_str(xml);
    // Synthetic document node at the bottom of the stack
    let mut stack = vec![Element::new("#document")];

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                // The synthetic document node does not count as a level
                if stack.len() > MAX_DEPTH {
                    return Err(ParseError::format(
                        format,
                        format!("elements nested deeper than {} levels", MAX_DEPTH),
                    ));
                }
                stack.push(Element::from_start(&start, format)?);
            }
            Ok(Event::Empty(start)) => {
                let element = Element::from_start(&start, format)?;
                attach(&mut stack, Node::Element(element));
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(ParseError::format(format, "unexpected closing tag"));
                }
                if let Some(done) = stack.pop() {
                    attach(&mut stack, Node::Element(done));
                }
            }
            Ok(Event::Text(text)) => {
                let value = match text.unescape() {
                    Ok(value) => value.into_owned(),
                    Err(_) => String::from_utf8_lossy(&text).into_owned(),
                };
                if !value.is_empty() {
                    attach(&mut stack, Node::Text(value));
                }
            }
            Ok(Event::CData(data)) => {
                let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                attach(&mut stack, Node::Text(value));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ParseError::format(
                    format,
                    format!("XML error at position {}: {}", reader.buffer_position(), e),
                ));
            }
        }
    }

    if stack.len() != 1 {
        return Err(ParseError::format(format, "unclosed element at end of document"));
    }

    stack
        .pop()
        .and_then(|document| {
            document.children.into_iter().find_map(|node| match node {
                Node::Element(root) => Some(root),
                Node::Text(_) => None,
            })
        })
        .ok_or_else(|| ParseError::format(format, "document has no root element"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_with_prefixes_stripped() {
        let root = parse(
            r#"<?xml version="1.0"?><w:doc xmlns:w="urn:w"><w:p w:val="x">a &amp; b</w:p><w:br/></w:doc>"#,
            "test",
        )
        .unwrap();

        assert_eq!(root.name, "doc");
        let p = root.child("p").unwrap();
        assert_eq!(p.attr("val"), Some("x"));
        assert_eq!(p.text(), "a & b");
        assert!(root.child("br").is_some());
    }

    #[test]
    fn test_find_is_depth_first() {
        let root = parse("<a><b><c id='1'/></b><c id='2'/></a>", "test").unwrap();
        assert_eq!(root.find("c").unwrap().attr("id"), Some("1"));
        assert_eq!(root.children_named("c").count(), 1);
        assert_eq!(root.child("c").unwrap().attr("id"), Some("2"));
    }

    #[test]
    fn test_mismatched_tags_fail() {
        let err = parse("<a><b></a>", "test").unwrap_err();
        assert!(err.to_string().contains("Invalid test input"));
    }

    #[test]
    fn test_nesting_depth_limit() {
        let nested = |depth: usize| format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));

        assert!(parse(&nested(MAX_DEPTH), "test").is_ok());
        let err = parse(&nested(MAX_DEPTH + 1), "test").unwrap_err();
        assert!(err.to_string().contains("nested deeper than 256"));
        assert!(parse(&nested(100_000), "test").is_err());
    }

    #[test]
    fn test_unclosed_document_fails() {
        assert!(parse("<a><b></b>", "test").is_err());
        assert!(parse("", "test").is_err());
    }
}
