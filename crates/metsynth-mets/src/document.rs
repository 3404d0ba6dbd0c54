use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};

use crate::errors::DocumentError;

/// One element of a namespaced document.
///
/// Names are qualified (`prefix:local`); attributes keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.name)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a Element> + 'n
    where
        'a: 'n,
    {
        self.children.iter().filter(move |child| child.name == name)
    }
}

// Deep hierarchies are torn down level by level instead of through nested drop glue.
impl Drop for Element {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut child) = pending.pop() {
            pending.append(&mut child.children);
        }
    }
}

/// Serialize `root` with an XML declaration and two-space indentation.
pub fn write_document<W: Write>(root: &Element, out: W) -> Result<(), DocumentError> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write_element(&mut writer, root)?;
    writer.get_mut().write_all(b"\n")?;
    Ok(())
}

pub fn to_xml_string(root: &Element) -> Result<String, DocumentError> {
    let mut buffer = Vec::new();
    write_document(root, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

enum Step<'a> {
    Open(&'a Element),
    Close(&'a Element),
}

fn write_element<W: Write>(writer: &mut Writer<W>, root: &Element) -> Result<(), DocumentError> {
    let mut pending = vec![Step::Open(root)];

    while let Some(step) = pending.pop() {
        let element = match step {
            Step::Close(element) => {
                writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
                continue;
            }
            Step::Open(element) => element,
        };

        let mut start = BytesStart::new(element.name.as_str());
        for (key, value) in &element.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if element.text.is_none() && element.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            continue;
        }

        writer.write_event(Event::Start(start))?;
        if let Some(text) = &element.text {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        pending.push(Step::Close(element));
        pending.extend(element.children.iter().rev().map(Step::Open));
    }
    Ok(())
}

/// Parse a document back into an element tree.
///
/// Whitespace-only text between elements is dropped; other text is kept
/// verbatim. Comments and processing instructions are ignored.
pub fn parse_document(input: &str) -> Result<Element, DocumentError> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(element_from_start(&start)?),
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| DocumentError::Malformed("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                if !text.chars().all(char::is_whitespace) {
                    append_text(&mut stack, &text)?;
                }
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                append_text(&mut stack, &text)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(DocumentError::Malformed(format!(
            "element <{}> is never closed",
            open.name
        )));
    }
    root.ok_or_else(|| DocumentError::Malformed("document has no root element".to_string()))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, DocumentError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), DocumentError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(DocumentError::Malformed(
            "document has more than one root element".to_string(),
        ));
    }
    *root = Some(element);
    Ok(())
}

fn append_text(stack: &mut [Element], text: &str) -> Result<(), DocumentError> {
    let current = stack
        .last_mut()
        .ok_or_else(|| DocumentError::Malformed("text outside the root element".to_string()))?;
    current.text.get_or_insert_with(String::new).push_str(text);
    Ok(())
}

/// JSON projection used for schema validation.
///
/// Attributes become `@NAME` keys, text becomes `#text`, and children are
/// grouped into one array per qualified name. The root is wrapped in an
/// object keyed by its own name.
pub fn to_json(root: &Element) -> Value {
    let mut wrapper = Map::new();
    wrapper.insert(root.name.clone(), element_json(root));
    Value::Object(wrapper)
}

struct JsonFrame<'a> {
    element: &'a Element,
    next_child: usize,
    map: Map<String, Value>,
}

impl<'a> JsonFrame<'a> {
    fn open(element: &'a Element) -> Self {
        let mut map = Map::new();
        for (key, value) in &element.attributes {
            map.insert(format!("@{key}"), Value::String(value.clone()));
        }
        if let Some(text) = &element.text {
            map.insert("#text".to_string(), Value::String(text.clone()));
        }
        Self {
            element,
            next_child: 0,
            map,
        }
    }
}

fn element_json(root: &Element) -> Value {
    let mut stack = vec![JsonFrame::open(root)];

    while let Some(frame) = stack.last_mut() {
        let element = frame.element;
        if let Some(child) = element.children.get(frame.next_child) {
            frame.next_child += 1;
            stack.push(JsonFrame::open(child));
            continue;
        }

        let Some(done) = stack.pop() else {
            break;
        };
        let value = Value::Object(done.map);
        let Some(parent) = stack.last_mut() else {
            return value;
        };
        let slot = parent
            .map
            .entry(done.element.name.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = slot {
            items.push(value);
        }
    }
    Value::Null
}

/// Number of element levels below and including `root`.
pub fn nesting_depth(root: &Element) -> usize {
    let mut deepest = 0;
    let mut pending = vec![(root, 1)];
    while let Some((element, depth)) = pending.pop() {
        deepest = deepest.max(depth);
        pending.extend(element.children.iter().map(|child| (child, depth + 1)));
    }
    deepest
}
