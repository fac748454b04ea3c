//! Lenient XML tree for feed documents.
//!
//! Tokenizing is done by `quick-xml`; tree building is forgiving. End tags
//! that match nothing are dropped, an element left open is closed implicitly
//! when an ancestor closes (or when a sibling entry starts), and every
//! implicitly closed element is flagged as unterminated so callers can decide
//! what to keep.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written in the document, e.g. `media:thumbnail`.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub terminated: bool,
}

impl XmlElement {
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |e| e.is(name))
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is(name))
    }

    /// Concatenated text of this element and its descendants, trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out.trim().to_string()
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::Element(element) => element.collect_text(out),
            }
        }
    }

    /// Text of the first child called `name`, if non-empty.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.children_named(name)
            .map(|e| e.text())
            .find(|t| !t.is_empty())
    }

    /// Children re-serialized as markup; used for Atom `type="xhtml"` constructs.
    pub fn inner_xml(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            write_node(node, &mut out);
        }
        out.trim().to_string()
    }

    /// An element is well formed when it and all its descendants were closed explicitly.
    pub fn is_well_formed(&self) -> bool {
        self.terminated && self.elements().all(|e| e.is_well_formed())
    }
}

#[derive(Debug)]
pub struct ParsedXml {
    pub root: Option<XmlElement>,
    /// First tokenizer error met while reading, if any.
    pub error: Option<String>,
}

pub fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Build a tree from `input`. `entry_names` are local names of elements that
/// never nest (feed items); opening one closes any entry still open.
///
/// A tokenizer error inside an entry drops that entry (it is closed as
/// unterminated) and reading resumes at the next entry start. Elsewhere inside
/// the document reading resumes at the next tag. An error before the root
/// element stops parsing.
pub fn parse_lenient(input: &str, entry_names: &[&str]) -> ParsedXml {
    let is_entry = |name: &str| {
        entry_names
            .iter()
            .any(|entry| local_part(name).eq_ignore_ascii_case(entry))
    };

    let mut builder = TreeBuilder::default();
    let mut error = None;
    let mut offset = 0;

    'documents: while offset < input.len() {
        let mut reader = Reader::from_str(&input[offset..]);
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    let element = element_from(&start);
                    if is_entry(&element.name) {
                        if let Some(open) = builder.stack.iter().rposition(|e| is_entry(&e.name)) {
                            builder.close_down_to(open);
                        }
                    }
                    builder.stack.push(element);
                }
                Ok(Event::Empty(start)) => {
                    let mut element = element_from(&start);
                    element.terminated = true;
                    builder.attach(element);
                }
                Ok(Event::End(end)) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    if let Some(open) = builder.stack.iter().rposition(|e| e.name.eq_ignore_ascii_case(&name)) {
                        builder.close_down_to(open + 1);
                        if let Some(mut element) = builder.stack.pop() {
                            element.terminated = true;
                            builder.attach(element);
                        }
                    }
                }
                Ok(Event::Text(text)) => builder.push_text(decode_entities(&text)),
                Ok(Event::CData(cdata)) => builder.push_text(String::from_utf8_lossy(&cdata).into_owned()),
                Ok(Event::Eof) => break 'documents,
                Ok(_) => {}
                Err(e) => {
                    if error.is_none() {
                        error = Some(e.to_string());
                    }
                    if builder.stack.is_empty() {
                        break 'documents;
                    }

                    let position = usize::try_from(reader.buffer_position()).unwrap_or(input.len());
                    let search_from = offset + position + 1;
                    let resume = match builder.stack.iter().rposition(|e| is_entry(&e.name)) {
                        Some(open) => {
                            builder.close_down_to(open);
                            next_entry_start(input, search_from, &is_entry)
                        }
                        None => next_tag_start(input, search_from),
                    };
                    match resume {
                        Some(next) => {
                            offset = next;
                            continue 'documents;
                        }
                        None => break 'documents,
                    }
                }
            }
        }
    }

    builder.close_down_to(0);

    ParsedXml {
        root: builder.root,
        error,
    }
}

/// Byte offset of the next `<` at or after `from`.
fn next_tag_start(input: &str, from: usize) -> Option<usize> {
    let bytes = input.as_bytes();
    if from >= bytes.len() {
        return None;
    }
    bytes[from..].iter().position(|&b| b == b'<').map(|i| from + i)
}

/// Byte offset of the next start tag whose local name is an entry name.
fn next_entry_start<F>(input: &str, from: usize, is_entry: &F) -> Option<usize>
where
    F: Fn(&str) -> bool,
{
    let bytes = input.as_bytes();
    let mut cursor = from;
    while let Some(start) = next_tag_start(input, cursor) {
        let name_end = bytes[start + 1..]
            .iter()
            .position(|&b| b.is_ascii_whitespace() || b == b'>' || b == b'/')
            .map_or(bytes.len(), |i| start + 1 + i);
        let name = String::from_utf8_lossy(&bytes[start + 1..name_end]);
        if !name.is_empty() && is_entry(&name) {
            return Some(start);
        }
        cursor = start + 1;
    }
    None
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<XmlElement>,
    root: Option<XmlElement>,
}

impl TreeBuilder {
    fn attach(&mut self, element: XmlElement) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(XmlNode::Element(element)),
            None => {
                if self.root.is_none() {
                    self.root = Some(element);
                }
            }
        }
    }

    /// Pop every open element above `depth`, flagging each as unterminated.
    fn close_down_to(&mut self, depth: usize) {
        while self.stack.len() > depth {
            if let Some(mut element) = self.stack.pop() {
                element.terminated = false;
                self.attach(element);
            }
        }
    }

    fn push_text(&mut self, text: String) {
        if let Some(parent) = self.stack.last_mut() {
            match parent.children.last_mut() {
                Some(XmlNode::Text(existing)) => existing.push_str(&text),
                _ => parent.children.push(XmlNode::Text(text)),
            }
        }
    }
}

fn element_from(start: &BytesStart<'_>) -> XmlElement {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let attributes = start
        .attributes()
        .with_checks(false)
        .flatten()
        .map(|attr| {
            (
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                decode_entities(&attr.value),
            )
        })
        .collect();

    XmlElement {
        name,
        attributes,
        children: Vec::new(),
        terminated: false,
    }
}

/// Decode entities one by one: the XML predefined ones, numeric references and
/// every HTML5 named entity feeds use without declaring. Unknown entities are
/// kept verbatim without affecting their neighbours.
fn decode_entities(raw: &[u8]) -> String {
    let raw = String::from_utf8_lossy(raw);
    html_escape::decode_html_entities(&raw).into_owned()
}

fn write_node(node: &XmlNode, out: &mut String) {
    match node {
        XmlNode::Text(text) => out.push_str(&escape_markup(text)),
        XmlNode::Element(element) => {
            out.push('<');
            out.push_str(&element.name);
            for (key, value) in &element.attributes {
                out.push_str(&format!(" {}=\"{}\"", key, escape_markup(value).replace('"', "&quot;")));
            }
            if element.children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in &element.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(&element.name);
            out.push('>');
        }
    }
}

fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
