//! A small owned XML element tree.
//!
//! `keepassxc-cli export` produces far more than the handful of elements the
//! filter looks at (timestamps, history, auto-type, custom icons, ...). All of
//! it has to survive the trip back into `keepassxc-cli import`, so the
//! document is kept as a generic tree and only interpreted through the views
//! in [`crate::database`].

use std::fmt::Display;
use std::io::Write;
use std::str;

use anyhow::Result;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use zeroize::Zeroize;

use crate::error::KptagError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

impl Node {
    /// Whitespace-only text, i.e. indentation between elements.
    pub fn is_blank(&self) -> bool {
        matches!(self, Node::Text(text) if text.trim().is_empty())
    }
}

impl Zeroize for Node {
    fn zeroize(&mut self) {
        match self {
            Node::Element(element) => element.zeroize(),
            Node::Text(text) | Node::CData(text) | Node::Comment(text) => text.zeroize(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new<S>(name: S) -> Self
    where
        S: Into<String>,
    {
        Element {
            name: name.into(),
            ..Default::default()
        }
    }

    /// All direct child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |element| element.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    /// Concatenated text of the direct text and CDATA children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) | Node::CData(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Removes the first child element called `name`, together with the
    /// indentation that followed it.
    pub fn take_child(&mut self, name: &str) -> Option<Element> {
        let idx = self
            .children
            .iter()
            .position(|node| matches!(node, Node::Element(element) if element.name == name))?;

        let taken = match self.children.remove(idx) {
            Node::Element(element) => element,
            _ => unreachable!("position() only matches elements"),
        };
        if self.children.get(idx).map_or(false, Node::is_blank) {
            self.children.remove(idx);
        }

        Some(taken)
    }

    /// Serializes the element (no XML declaration, no added indentation).
    pub fn write(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, self)?;

        Ok(writer.into_inner())
    }
}

/// Overwrites every name, attribute and text in the subtree, leaving an
/// empty element behind. Entry values are plaintext secrets.
impl Zeroize for Element {
    fn zeroize(&mut self) {
        self.name.zeroize();
        for (key, value) in self.attributes.iter_mut() {
            key.zeroize();
            value.zeroize();
        }
        self.attributes.clear();
        self.children.zeroize();
    }
}

fn malformed<E>(err: E) -> anyhow::Error
where
    E: Display,
{
    KptagError::MalformedDocument(err.to_string()).into()
}

/// Parses `xml` into its root element. Declarations, doctypes and
/// processing instructions are dropped; everything inside the root element
/// is kept.
pub fn parse(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(malformed(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        };

        match event {
            Event::Start(ref e) => stack.push(start_element(e)?),
            Event::Empty(ref e) => {
                let element = start_element(e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| malformed("closing tag without an opening tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(ref e) => {
                let text = e.unescape().map_err(malformed)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Text(text.into_owned())),
                    None if text.trim().is_empty() => {}
                    None => return Err(malformed("text outside of the root element")),
                }
            }
            Event::CData(ref e) => {
                if let Some(parent) = stack.last_mut() {
                    let text = str::from_utf8(e).map_err(malformed)?;
                    parent.children.push(Node::CData(text.to_owned()));
                }
            }
            Event::Comment(ref e) => {
                if let Some(parent) = stack.last_mut() {
                    let text = str::from_utf8(e).map_err(malformed)?;
                    parent.children.push(Node::Comment(text.to_owned()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(malformed(format!("unclosed element <{}>", open.name)));
    }

    root.ok_or_else(|| malformed("no root element"))
}

fn start_element(e: &BytesStart) -> Result<Element> {
    let name = str::from_utf8(e.name().as_ref())
        .map_err(malformed)?
        .to_owned();
    let mut element = Element::new(name);

    for attr in e.attributes() {
        let attr = attr.map_err(malformed)?;
        let key = str::from_utf8(attr.key.as_ref()).map_err(malformed)?.to_owned();
        let value = attr.unescape_value().map_err(malformed)?.into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(element));
    } else if root.is_some() {
        return Err(malformed(format!(
            "second root element <{}>",
            element.name
        )));
    } else {
        *root = Some(element);
    }

    Ok(())
}

fn write_element<W>(writer: &mut Writer<W>, element: &Element) -> Result<()>
where
    W: Write,
{
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Element(element) => write_element(writer, element)?,
            Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            Node::CData(text) => writer.write_event(Event::CData(BytesCData::new(text.as_str())))?,
            Node::Comment(text) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;

    Ok(())
}
