//! Typed, read-only views over a `keepassxc-cli export` document.
//!
//! ```text
//! KeePassFile
//! ├── Meta
//! │   └── RecycleBinUUID
//! └── Root
//!     └── Group (Name, UUID, Group*, Entry*)
//!         └── Entry (UUID, String* { Key, Value })
//! ```

use anyhow::Result;
use zeroize::Zeroize;

use crate::consts::{RESERVED_FIELDS, XML_DECLARATION};
use crate::error::KptagError;
use crate::xml::{self, Element};

pub const META: &str = "Meta";
pub const ROOT: &str = "Root";
pub const GROUP: &str = "Group";
pub const ENTRY: &str = "Entry";
pub const RECYCLE_BIN_UUID: &str = "RecycleBinUUID";

const NAME: &str = "Name";
const UUID: &str = "UUID";
const STRING: &str = "String";
const KEY: &str = "Key";
const VALUE: &str = "Value";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub(crate) root: Element,
}

impl Document {
    pub fn parse(xml: &str) -> Result<Self> {
        Self::from_element(xml::parse(xml)?)
    }

    /// Wraps an already parsed tree. The root element must hold a `Meta` and
    /// a `Root` section.
    pub fn from_element(root: Element) -> Result<Self> {
        for section in &[META, ROOT] {
            if root.child(section).is_none() {
                return Err(KptagError::MalformedDocument(format!(
                    "<{}> has no <{}> section",
                    root.name, section
                ))
                .into());
            }
        }

        Ok(Document { root })
    }

    pub fn element(&self) -> &Element {
        &self.root
    }

    pub(crate) fn into_element(self) -> Element {
        self.root
    }

    /// The `Root` section, which holds the top-level groups.
    pub fn root(&self) -> &Element {
        self.root
            .child(ROOT)
            .expect("Document always contains a Root section")
    }

    /// Top-level groups, normally just the database's root group.
    pub fn groups(&self) -> impl Iterator<Item = Group<'_>> {
        self.root().children_named(GROUP).map(Group)
    }

    pub fn recycle_bin_uuid(&self) -> Option<String> {
        self.root
            .child(META)
            .and_then(|meta| meta.child(RECYCLE_BIN_UUID))
            .map(Element::text)
            .filter(|uuid| !uuid.is_empty())
    }

    /// Removes `Meta/RecycleBinUUID` and returns the identifier it held.
    pub fn take_recycle_bin_uuid(&mut self) -> Option<String> {
        self.root
            .child_mut(META)
            .and_then(|meta| meta.take_child(RECYCLE_BIN_UUID))
            .map(|uuid| uuid.text())
            .filter(|uuid| !uuid.is_empty())
    }

    /// Every entry directly owned by a group, anywhere in the tree.
    pub fn entry_count(&self) -> usize {
        self.groups().map(|group| group.entry_count()).sum()
    }

    /// `<?xml version="1.0" ?>` followed by the serialized tree.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut body = self.root.write()?;
        let mut bytes = Vec::with_capacity(XML_DECLARATION.len() + body.len());
        bytes.extend_from_slice(XML_DECLARATION);
        bytes.extend_from_slice(&body);
        body.zeroize();

        Ok(bytes)
    }
}

impl Zeroize for Document {
    fn zeroize(&mut self) {
        self.root.zeroize();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Group<'a>(pub &'a Element);

impl<'a> Group<'a> {
    pub fn name(&self) -> String {
        self.0.child(NAME).map(Element::text).unwrap_or_default()
    }

    pub fn uuid(&self) -> String {
        uuid_of(self.0)
    }

    pub fn groups(&self) -> impl Iterator<Item = Group<'a>> {
        self.0.children_named(GROUP).map(Group)
    }

    pub fn entries(&self) -> impl Iterator<Item = Entry<'a>> {
        self.0.children_named(ENTRY).map(Entry)
    }

    pub fn entry_count(&self) -> usize {
        self.entries().count() + self.groups().map(|g| g.entry_count()).sum::<usize>()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Entry<'a>(pub &'a Element);

impl<'a> Entry<'a> {
    pub fn uuid(&self) -> String {
        uuid_of(self.0)
    }

    pub fn title(&self) -> Option<String> {
        self.fields()
            .find(|(key, _)| key == "Title")
            .map(|(_, value)| value)
    }

    /// `(Key, Value)` pairs of the entry's `String` fields, in document order.
    pub fn fields(&self) -> impl Iterator<Item = (String, String)> + 'a {
        self.0.children_named(STRING).map(|string| {
            let key = string.child(KEY).map(Element::text).unwrap_or_default();
            let value = string.child(VALUE).map(Element::text).unwrap_or_default();
            (key, value)
        })
    }

    /// Field names that can act as tags: every key except the reserved ones.
    pub fn tag_keys(&self) -> impl Iterator<Item = String> + 'a {
        self.fields()
            .map(|(key, _)| key)
            .filter(|key| !RESERVED_FIELDS.contains(&key.as_str()))
    }
}

pub(crate) fn uuid_of(element: &Element) -> String {
    element.child(UUID).map(Element::text).unwrap_or_default()
}
