//! Node payloads stored in the document arena.

use crate::NodeKey;
use core::mem::replace;
use smallvec::SmallVec;

/// What a node is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NodeKind {
    #[default]
    Document,
    /// An element with its ASCII-lowercased tag name.
    Element { tag: String },
    Text { text: String },
    /// `<?target data?>`, e.g. `<?xml-stylesheet href="a.css"?>`.
    ProcessingInstruction { target: String, data: String },
}

/// A node in the arena: its stable key, kind and ordered attributes.
#[derive(Debug, Clone, Default)]
pub struct NodeData {
    pub key: NodeKey,
    pub kind: NodeKind,
    pub attrs: SmallVec<(String, String), 4>,
}

impl NodeData {
    pub(crate) fn new(key: NodeKey, kind: NodeKind) -> Self {
        Self {
            key,
            kind,
            attrs: SmallVec::new(),
        }
    }

    /// Tag name for elements.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag } => Some(tag),
            _ => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(attr_name, _)| attr_name == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute in place, or append it. Returns the previous value.
    pub(crate) fn set_attr(&mut self, name: &str, value: &str) -> Option<String> {
        if let Some((_, existing)) = self.attrs.iter_mut().find(|(attr_name, _)| attr_name == name) {
            return Some(replace(existing, value.to_owned()));
        }
        self.attrs.push((name.to_owned(), value.to_owned()));
        None
    }

    pub(crate) fn remove_attr(&mut self, name: &str) -> Option<String> {
        let position = self.attrs.iter().position(|(attr_name, _)| attr_name == name)?;
        Some(self.attrs.remove(position).1)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|token| token == class))
    }
}
