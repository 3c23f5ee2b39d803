//! Mutation observers.
//! Spec: <https://dom.spec.whatwg.org/#mutation-observers>
//!
//! Records are queued on a per-observer unbounded channel when the tree
//! changes and handed to the callback in one batch at the next microtask
//! checkpoint ([`crate::Window::perform_microtask_checkpoint`]).

use crate::{Document, NodeKey, Window};
use core::cell::RefCell;
use core::fmt::{self, Debug, Formatter};
use log::debug;
use serde::Deserialize;
use std::rc::Rc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// A node that was added or removed, with its tag name when it is an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEntry {
    pub key: NodeKey,
    pub tag: Option<String>,
}

/// One change to the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        target: NodeKey,
        added: Vec<MutationEntry>,
        removed: Vec<MutationEntry>,
    },
    Attributes {
        target: NodeKey,
        name: String,
    },
    CharacterData {
        target: NodeKey,
    },
}

impl MutationRecord {
    pub const fn target(&self) -> NodeKey {
        match self {
            Self::ChildList { target, .. }
            | Self::Attributes { target, .. }
            | Self::CharacterData { target } => *target,
        }
    }
}

/// What an observer wants to hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: bool,
    pub character_data: bool,
    pub subtree: bool,
}

impl MutationObserverInit {
    pub(crate) const fn wants(&self, record: &MutationRecord) -> bool {
        match record {
            MutationRecord::ChildList { .. } => self.child_list,
            MutationRecord::Attributes { .. } => self.attributes,
            MutationRecord::CharacterData { .. } => self.character_data,
        }
    }
}

/// A partial [`MutationObserverInit`] as a caller would write it in JSON
/// (`{"childList": true, "subtree": false}`); absent keys keep the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MutationObserveOptions {
    pub child_list: Option<bool>,
    pub attributes: Option<bool>,
    pub character_data: Option<bool>,
    pub subtree: Option<bool>,
}

impl MutationObserveOptions {
    /// Watch for child-list and character-data changes over a whole subtree.
    pub const DEFAULTS: MutationObserverInit = MutationObserverInit {
        child_list: true,
        attributes: false,
        character_data: true,
        subtree: true,
    };

    /// Overlay the explicitly given fields onto [`Self::DEFAULTS`].
    pub fn merge_over_defaults(self) -> MutationObserverInit {
        self.merge_over(Self::DEFAULTS)
    }

    pub fn merge_over(self, base: MutationObserverInit) -> MutationObserverInit {
        MutationObserverInit {
            child_list: self.child_list.unwrap_or(base.child_list),
            attributes: self.attributes.unwrap_or(base.attributes),
            character_data: self.character_data.unwrap_or(base.character_data),
            subtree: self.subtree.unwrap_or(base.subtree),
        }
    }
}

/// A target registered by an observer, stored on the document.
#[derive(Debug)]
pub(crate) struct Registration {
    pub observer: u64,
    pub target: NodeKey,
    pub init: MutationObserverInit,
    pub sender: UnboundedSender<MutationRecord>,
}

type MutationCallback = Box<dyn FnMut(Vec<MutationRecord>, &MutationObserver)>;

pub(crate) struct ObserverInner {
    id: u64,
    document: Document,
    sender: UnboundedSender<MutationRecord>,
    receiver: RefCell<UnboundedReceiver<MutationRecord>>,
    callback: RefCell<MutationCallback>,
}

/// A shared handle to a mutation observer.
#[derive(Clone)]
pub struct MutationObserver {
    inner: Rc<ObserverInner>,
}

impl MutationObserver {
    /// Create an observer on `window`'s document. The callback runs at
    /// microtask checkpoints with every record queued since the last one.
    pub fn new(
        window: &Window,
        callback: impl FnMut(Vec<MutationRecord>, &Self) + 'static,
    ) -> Self {
        let (sender, receiver) = unbounded_channel();
        let observer = Self {
            inner: Rc::new(ObserverInner {
                id: window.next_id(),
                document: window.document(),
                sender,
                receiver: RefCell::new(receiver),
                callback: RefCell::new(Box::new(callback)),
            }),
        };
        window.register_observer(Rc::downgrade(&observer.inner));
        observer
    }

    pub(crate) fn from_inner(inner: Rc<ObserverInner>) -> Self {
        Self { inner }
    }

    /// Start (or update) observing `target`.
    pub fn observe(&self, target: NodeKey, init: MutationObserverInit) {
        self.inner.document.register_observer(Registration {
            observer: self.inner.id,
            target,
            init,
            sender: self.inner.sender.clone(),
        });
    }

    /// Stop observing everything and drop queued records.
    pub fn disconnect(&self) {
        self.inner.document.unregister_observer(self.inner.id);
        let dropped = self.take_records().len();
        if dropped > 0 {
            debug!("mutation observer {} dropped {dropped} queued records", self.inner.id);
        }
    }

    /// Drain the queued records without invoking the callback.
    pub fn take_records(&self) -> Vec<MutationRecord> {
        let mut records = Vec::new();
        let mut receiver = self.inner.receiver.borrow_mut();
        while let Ok(record) = receiver.try_recv() {
            records.push(record);
        }
        records
    }

    /// Deliver queued records, returning whether the callback ran.
    pub(crate) fn deliver(&self) -> bool {
        // A callback that re-enters delivery for itself would alias the closure.
        let Ok(mut callback) = self.inner.callback.try_borrow_mut() else {
            debug!("mutation observer {} is already delivering", self.inner.id);
            return false;
        };
        let records = self.take_records();
        if records.is_empty() {
            return false;
        }
        callback(records, self);
        true
    }
}

impl Debug for MutationObserver {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationObserver")
            .field("id", &self.inner.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_merge_over_defaults() {
        let options: MutationObserveOptions =
            serde_json::from_str(r#"{"subtree": false, "attributes": true}"#).unwrap();
        let init = options.merge_over_defaults();
        assert!(init.child_list);
        assert!(init.character_data);
        assert!(init.attributes);
        assert!(!init.subtree);
        assert_eq!(
            MutationObserveOptions::default().merge_over_defaults(),
            MutationObserveOptions::DEFAULTS
        );
    }
}
