//! Pruning a database export down to the entries carrying a tag.
//!
//! The tree is rebuilt rather than edited in place: every group's child list
//! is reassembled from the entries that match and the subgroups that still
//! hold something after being filtered themselves. A group that ends up
//! without a single entry in its subtree is dropped, and so is the recycle
//! bin, without ever looking at what it contains.

use std::collections::BTreeSet;
use std::iter::FromIterator;

use tracing::{debug, trace};
use zeroize::Zeroize;

use crate::database::{self, Document, Entry, ENTRY, GROUP, ROOT};
use crate::xml::{Element, Node};

/// The tags an entry is checked against. An entry is kept as soon as one of
/// its non-reserved field names is in the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn matches(&self, entry: Entry<'_>) -> bool {
        entry.tag_keys().any(|key| self.0.contains(&key))
    }
}

impl<S> FromIterator<S> for TagSet
where
    S: Into<String>,
{
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        TagSet(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filtered {
    pub document: Document,
    /// Entries seen outside the recycle bin.
    pub total_entries: usize,
    /// Entries that carried one of the tags.
    pub exported_entries: usize,
}

/// Keeps only the entries tagged with one of `tags`, along with the groups
/// leading to them. `Meta/RecycleBinUUID` is removed and the group it named
/// is dropped together with everything under it.
pub fn filter(mut document: Document, tags: &TagSet) -> Filtered {
    let recycle_bin = document.take_recycle_bin_uuid();
    debug!(recycle_bin = ?recycle_bin, "filtering export");

    let mut pruner = Pruner {
        tags,
        recycle_bin,
        total_entries: 0,
        exported_entries: 0,
    };

    let mut root = document.into_element();
    let children = std::mem::take(&mut root.children);
    root.children = children
        .into_iter()
        .map(|node| match node {
            Node::Element(section) if section.name == ROOT => {
                Node::Element(pruner.prune_section(section))
            }
            other => other,
        })
        .collect();

    // Meta and Root are never pruned
    let document = Document { root };

    debug!(
        total = pruner.total_entries,
        exported = pruner.exported_entries,
        "filtered export"
    );

    Filtered {
        document,
        total_entries: pruner.total_entries,
        exported_entries: pruner.exported_entries,
    }
}

struct Pruner<'t> {
    tags: &'t TagSet,
    recycle_bin: Option<String>,
    total_entries: usize,
    exported_entries: usize,
}

impl Pruner<'_> {
    /// The `Root` section is pruned like a group but always survives.
    fn prune_section(&mut self, mut section: Element) -> Element {
        let children = std::mem::take(&mut section.children);
        section.children = self.prune_children(children).0;
        section
    }

    fn prune_group(&mut self, mut group: Element) -> Option<Element> {
        let children = std::mem::take(&mut group.children);
        let (children, retained) = self.prune_children(children);

        group.children = children;
        if retained {
            Some(group)
        } else {
            trace!(uuid = %database::uuid_of(&group), "dropping empty group");
            discard(group);
            None
        }
    }

    /// Returns the surviving children and whether any entry was retained
    /// beneath them.
    fn prune_children(&mut self, children: Vec<Node>) -> (Vec<Node>, bool) {
        let mut kept = Vec::with_capacity(children.len());
        let mut retained = false;
        // indentation after a dropped element goes with it
        let mut dropped = false;

        for node in children {
            let keep = match node {
                Node::Element(child) if child.name == GROUP => {
                    if self.is_recycle_bin(&child) {
                        debug!(uuid = %database::uuid_of(&child), "skipping recycle bin");
                        discard(child);
                        None
                    } else {
                        self.prune_group(child).map(Node::Element)
                    }
                }
                Node::Element(child) if child.name == ENTRY => {
                    self.total_entries += 1;
                    if self.tags.matches(Entry(&child)) {
                        self.exported_entries += 1;
                        Some(Node::Element(child))
                    } else {
                        discard(child);
                        None
                    }
                }
                ref blank if dropped && blank.is_blank() => None,
                other => Some(other),
            };

            match keep {
                Some(node) => {
                    if is_group_or_entry(&node) {
                        retained = true;
                    }
                    dropped = false;
                    kept.push(node);
                }
                None => dropped = true,
            }
        }

        (kept, retained)
    }

    fn is_recycle_bin(&self, group: &Element) -> bool {
        match &self.recycle_bin {
            Some(uuid) => database::uuid_of(group) == *uuid,
            None => false,
        }
    }
}

fn is_group_or_entry(node: &Node) -> bool {
    matches!(node, Node::Element(element) if element.name == GROUP || element.name == ENTRY)
}

/// Pruned elements still hold plaintext fields.
fn discard(mut element: Element) {
    element.zeroize();
}
