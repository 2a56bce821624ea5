//! Parsed representation of a single gateway fragment
//!
//! A fragment is one complete top-level element, for example
//!
//! ```xml
//! <PriceCluster>
//!   <DeviceMacId>0x00158d0000000004</DeviceMacId>
//!   <Price>0x000000c8</Price>
//! </PriceCluster>
//! ```
//!
//! Children keep their document order. Field names may repeat, which the
//! gateway does for list-shaped replies such as `MeterList` and
//! `ProfileData`.

use std::fmt;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// Value carried by a fragment child
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Leaf element text with surrounding whitespace removed
    Text(String),
    /// Element with its own children
    Element(Vec<Field>),
}

/// Named child of a fragment root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

impl Field {
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(text.into()),
        }
    }

    /// Leaf text, `None` for nested elements
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            FieldValue::Text(text) => Some(text),
            FieldValue::Element(_) => None,
        }
    }
}

/// One complete top-level element received from the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    root: String,
    fields: Vec<Field>,
}

impl Fragment {
    pub fn new(root: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            root: root.into(),
            fields,
        }
    }

    /// Parse the raw bytes of one complete fragment
    pub fn from_bytes(bytes: &[u8]) -> ParseResult<Self> {
        let text =
            std::str::from_utf8(bytes).map_err(|e| ParseError::Encoding(e.to_string()))?;
        Self::from_xml(text)
    }

    /// Parse the text of one complete fragment
    ///
    /// Exactly one root element is accepted. Declarations, comments and
    /// processing instructions are ignored; whitespace-only text between
    /// elements is dropped.
    pub fn from_xml(xml: &str) -> ParseResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut open: Vec<OpenElement> = Vec::new();
        let mut fragment: Option<Fragment> = None;

        loop {
            let event = reader.read_event().map_err(|e| ParseError::Xml {
                position: reader.buffer_position(),
                message: e.to_string(),
            })?;

            match event {
                Event::Start(start) => {
                    if fragment.is_some() {
                        return Err(trailing_content());
                    }
                    open.push(OpenElement::new(element_name(start.name().as_ref())));
                }
                Event::Empty(empty) => {
                    let name = element_name(empty.name().as_ref());
                    match open.last_mut() {
                        Some(parent) => parent.children.push(Field::text(name, "")),
                        None if fragment.is_none() => fragment = Some(Fragment::new(name, Vec::new())),
                        None => return Err(trailing_content()),
                    }
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| ParseError::Xml {
                        position: reader.buffer_position(),
                        message: e.to_string(),
                    })?;
                    match open.last_mut() {
                        Some(element) => element.text.push_str(&text),
                        None => {
                            return Err(ParseError::InvalidStructure(format!(
                                "text '{text}' outside the root element"
                            )))
                        }
                    }
                }
                Event::CData(data) => {
                    let bytes = data.into_inner();
                    let text = std::str::from_utf8(&bytes)
                        .map_err(|e| ParseError::Encoding(e.to_string()))?;
                    match open.last_mut() {
                        Some(element) => element.text.push_str(text),
                        None => {
                            return Err(ParseError::InvalidStructure(
                                "character data outside the root element".to_string(),
                            ))
                        }
                    }
                }
                Event::End(_) => {
                    let closed = open.pop().ok_or_else(|| {
                        ParseError::InvalidStructure("closing tag without an open element".to_string())
                    })?;
                    match open.last_mut() {
                        Some(parent) => parent.children.push(closed.into_field()),
                        None => fragment = Some(Fragment::new(closed.name, closed.children)),
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(unclosed) = open.last() {
            return Err(ParseError::InvalidStructure(format!(
                "element <{}> is never closed",
                unclosed.name
            )));
        }
        fragment.ok_or_else(|| ParseError::InvalidStructure("no root element".to_string()))
    }

    /// Name of the root element
    pub fn root(&self) -> &str {
        &self.root
    }

    /// All children in document order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Text of the first child called `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .filter(|field| field.name == name)
            .find_map(Field::as_text)
    }

    /// Text of every leaf child called `name`, in document order
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |field| field.name == name)
            .filter_map(Field::as_text)
    }

    /// Children of the first nested element called `name`
    pub fn element(&self, name: &str) -> Option<&[Field]> {
        self.fields.iter().find_map(|field| match &field.value {
            FieldValue::Element(children) if field.name == name => Some(children.as_slice()),
            _ => None,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field.name == name)
    }

    /// First non-empty leaf text anywhere in the fragment
    pub fn first_text(&self) -> Option<&str> {
        fn walk(fields: &[Field]) -> Option<&str> {
            fields.iter().find_map(|field| match &field.value {
                FieldValue::Text(text) if !text.is_empty() => Some(text.as_str()),
                FieldValue::Text(_) => None,
                FieldValue::Element(children) => walk(children),
            })
        }
        walk(&self.fields)
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> ({} fields)", self.root, self.fields.len())
    }
}

struct OpenElement {
    name: String,
    text: String,
    children: Vec<Field>,
}

impl OpenElement {
    fn new(name: String) -> Self {
        Self {
            name,
            text: String::new(),
            children: Vec::new(),
        }
    }

    fn into_field(self) -> Field {
        let value = if self.children.is_empty() {
            FieldValue::Text(self.text)
        } else {
            FieldValue::Element(self.children)
        };
        Field {
            name: self.name,
            value,
        }
    }
}

fn element_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn trailing_content() -> ParseError {
    ParseError::InvalidStructure("content after the root element".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICE_CLUSTER: &str = r#"<PriceCluster>
  <DeviceMacId>0xd8d5b9000000b3e8</DeviceMacId>
  <MeterMacId>0x00135003007c6f17</MeterMacId>
  <TimeStamp>0x29bd58a7</TimeStamp>
  <Price>0x000000c8</Price>
  <Currency>0x0348</Currency>
  <TrailingDigits>0x03</TrailingDigits>
  <Tier>0x01</Tier>
  <RateLabel>Set by User</RateLabel>
</PriceCluster>"#;

    #[test]
    fn test_parse_flat_fragment() {
        let fragment = Fragment::from_xml(PRICE_CLUSTER).unwrap();

        assert_eq!(fragment.root(), "PriceCluster");
        assert_eq!(fragment.fields().len(), 8);
        assert_eq!(fragment.get("Price"), Some("0x000000c8"));
        assert_eq!(fragment.get("RateLabel"), Some("Set by User"));
        assert_eq!(fragment.get("Missing"), None);
        assert_eq!(fragment.fields()[0].name, "DeviceMacId");
    }

    #[test]
    fn test_repeated_fields_keep_order() {
        let xml = "<MeterList><DeviceMacId>0x01</DeviceMacId>\
                   <MeterMacId>0x0a</MeterMacId><MeterMacId>0x0b</MeterMacId>\
                   <MeterMacId>0x0c</MeterMacId></MeterList>";
        let fragment = Fragment::from_xml(xml).unwrap();

        let meters: Vec<&str> = fragment.get_all("MeterMacId").collect();
        assert_eq!(meters, vec!["0x0a", "0x0b", "0x0c"]);
        assert_eq!(fragment.get("MeterMacId"), Some("0x0a"));
    }

    #[test]
    fn test_nested_elements() {
        let xml = "<Warning><Detail><Text>Unknown command</Text></Detail></Warning>";
        let fragment = Fragment::from_xml(xml).unwrap();

        let detail = fragment.element("Detail").unwrap();
        assert_eq!(detail[0].as_text(), Some("Unknown command"));
        assert_eq!(fragment.get("Detail"), None);
        assert_eq!(fragment.first_text(), Some("Unknown command"));
    }

    #[test]
    fn test_self_closing_root_and_children() {
        let fragment = Fragment::from_xml("<Ping/>").unwrap();
        assert_eq!(fragment.root(), "Ping");
        assert!(fragment.fields().is_empty());

        let fragment = Fragment::from_xml("<A><Empty/><B>1</B></A>").unwrap();
        assert_eq!(fragment.get("Empty"), Some(""));
        assert!(fragment.contains("B"));
    }

    #[test]
    fn test_entities_are_unescaped() {
        let fragment = Fragment::from_xml("<M><Text>a &amp; b</Text></M>").unwrap();
        assert_eq!(fragment.get("Text"), Some("a & b"));
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(matches!(
            Fragment::from_xml("<A><B>1</B>"),
            Err(ParseError::InvalidStructure(_))
        ));
        assert!(Fragment::from_xml("<A></B>").is_err());
        assert!(matches!(
            Fragment::from_xml("<A/><B/>"),
            Err(ParseError::InvalidStructure(_))
        ));
        assert!(matches!(
            Fragment::from_xml("   "),
            Err(ParseError::InvalidStructure(_))
        ));
        assert!(matches!(
            Fragment::from_bytes(&[b'<', b'A', b'>', 0xff, b'<', b'/', b'A', b'>']),
            Err(ParseError::Encoding(_))
        ));
    }

    #[test]
    fn test_display() {
        let fragment = Fragment::from_xml(PRICE_CLUSTER).unwrap();
        assert_eq!(fragment.to_string(), "<PriceCluster> (8 fields)");
    }
}
