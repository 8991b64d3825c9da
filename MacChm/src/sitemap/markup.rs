//! Lenient element tree for `.hhc`/`.hhk` markup
//!
//! Sitemaps are HTML written by help compilers: upper-case tags, unclosed
//! `<LI>` and `<PARAM>`, unquoted attributes and legacy charsets. The
//! builder here keeps just enough HTML structure to find the sitemap
//! lists and objects.

use std::borrow::Cow;
use std::sync::OnceLock;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::bytes::Regex;

use crate::error::Result;

/// Elements that never have content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "hr", "img", "input", "link", "meta", "param", "wbr",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Element {
    /// Lower-cased tag name; empty for the document node.
    pub name: String,
    /// Attributes with lower-cased names, in source order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    fn new(name: String, attributes: Vec<(String, String)>) -> Self {
        Self {
            name,
            attributes,
            children: Vec::new(),
        }
    }

    /// Attribute value by case-insensitive name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// `<object type="text/sitemap">`
    pub fn is_sitemap_object(&self) -> bool {
        self.is("object")
            && self
                .attribute("type")
                .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("text/sitemap"))
    }

    /// The `<body>` element, with the implied `<html>`/`<body>` of
    /// fragments treated as the document itself.
    pub fn body(&self) -> &Element {
        let html = self.children_named("html").next().unwrap_or(self);
        html.children_named("body").next().unwrap_or(html)
    }
}

fn xml_encoding_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i-u)^<\?xml\s[^>]*?encoding\s*=\s*["']([^"']+)["']"#)
            .expect("valid regex")
    })
}

fn meta_charset_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?i-u)<meta\s+http-equiv\s*=\s*"?Content-Type"?\s+content\s*=\s*"text/html;\s*charset=([^"]+)""#,
        )
        .expect("valid regex")
    })
}

/// Charset label declared by the markup, if any.
fn declared_charset(bytes: &[u8]) -> Option<String> {
    let captures = xml_encoding_pattern()
        .captures(bytes)
        .or_else(|| meta_charset_pattern().captures(bytes))?;
    let label = captures.get(1)?.as_bytes();
    Some(String::from_utf8_lossy(label).trim().to_string())
}

/// Decode sitemap bytes to text.
///
/// The charset comes from a leading XML declaration or a `Content-Type`
/// meta tag. Undeclared content is read as UTF-8 when valid and as
/// Windows-1252 otherwise.
pub(crate) fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.trim_ascii();
    let encoding = declared_charset(bytes)
        .and_then(|label| {
            let encoding = Encoding::for_label(label.as_bytes());
            if encoding.is_none() {
                tracing::warn!("Unknown sitemap charset '{}', guessing", label);
            }
            encoding
        })
        .unwrap_or_else(|| {
            if std::str::from_utf8(bytes).is_ok() {
                UTF_8
            } else {
                WINDOWS_1252
            }
        });
    tracing::debug!("Decoding sitemap as {}", encoding.name());
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!("Sitemap is not valid {}", encoding.name());
    }
    text.into_owned()
}

fn read_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).to_ascii_lowercase();
    let mut attributes = Vec::new();
    for attribute in start.html_attributes().with_checks(false) {
        let attribute = attribute?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).to_ascii_lowercase();
        // Legacy entities such as `&reg;` are not XML; keep the raw text
        let value = attribute.unescape_value().map_or_else(
            |_| String::from_utf8_lossy(&attribute.value).into_owned(),
            Cow::into_owned,
        );
        attributes.push((key, value));
    }
    Ok(Element::new(name, attributes))
}

/// Pops the top element into its parent.
fn close_top(stack: &mut Vec<Element>) {
    if stack.len() < 2 {
        return;
    }
    if let Some(element) = stack.pop() {
        append(stack, element);
    }
}

fn append(stack: &mut [Element], element: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    }
}

/// Parse decoded markup into an element tree rooted at a document node.
pub(crate) fn parse_document(text: &str) -> Result<Element> {
    let mut text = text.trim_start();
    // Declarations without `?>` would swallow the document
    if text
        .get(..5)
        .is_some_and(|head| head.eq_ignore_ascii_case("<?xml"))
    {
        text = text.find('>').map_or("", |end| &text[end + 1..]);
    }

    let mut reader = Reader::from_str(text);
    reader.trim_text(true);
    reader.check_end_names(false);

    let mut stack = vec![Element::default()];
    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let element = read_start(&start)?;
                if VOID_ELEMENTS.contains(&element.name.as_str()) {
                    append(&mut stack, element);
                    continue;
                }
                if element.is("li") {
                    // A new item ends the previous one in the same list
                    let open_item = stack
                        .iter()
                        .rposition(|open| open.is("ul") || open.is("ol") || open.is("li"))
                        .filter(|&index| stack[index].is("li"));
                    if let Some(index) = open_item {
                        while stack.len() > index {
                            close_top(&mut stack);
                        }
                    }
                }
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = read_start(&start)?;
                append(&mut stack, element);
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).to_ascii_lowercase();
                if let Some(index) = stack.iter().skip(1).rposition(|open| open.name == name) {
                    while stack.len() > index + 1 {
                        close_top(&mut stack);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    Ok(stack.pop().unwrap_or_default())
}
