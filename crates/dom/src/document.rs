//! The document tree.
//!
//! Nodes live in an `indextree` arena and are addressed from the outside by
//! stable [`NodeKey`]s. Every tree change is turned into a [`MutationRecord`]
//! and queued for the observers registered on an inclusive ancestor.

use crate::mutation::{MutationEntry, MutationRecord, Registration};
use crate::node::{NodeData, NodeKind};
use crate::style::{ArenaAdapter, ComputedStyle, compute_style};
use crate::stylesheet::CssStyleSheet;
use crate::{DomException, NodeKey};
use anyhow::{Context as _, Result, anyhow};
use core::cell::RefCell;
use core::fmt::{self, Debug, Formatter};
use css_selectors::{SelectorList, matches_selector_list, parse_selector_list};
use css_style_attr::DeclarationBlock;
use indextree::{Arena, Node, NodeId};
use log::{debug, trace};
use std::collections::HashMap;
use std::rc::Rc;
use url::Url;

/// State of a stylesheet resource as the "network" knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resource {
    Loaded(String),
    Pending,
}

/// Where a node's sheet came from; a change means the sheet is rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SheetSource {
    Inline(String),
    External {
        href: String,
        resource: Option<Resource>,
        cross_origin_blocked: bool,
    },
}

pub(crate) struct DocumentInner {
    pub(crate) arena: Arena<NodeData>,
    pub(crate) root: NodeId,
    ids: HashMap<NodeKey, NodeId>,
    next_key: u64,
    url: Url,
    resources: HashMap<String, Resource>,
    sheet_cache: HashMap<NodeKey, (SheetSource, CssStyleSheet)>,
    adopted: Vec<CssStyleSheet>,
    observers: Vec<Registration>,
}

impl DocumentInner {
    fn id_of(&self, key: NodeKey) -> Result<NodeId> {
        self.ids
            .get(&key)
            .copied()
            .ok_or_else(|| anyhow!(DomException::NotFound))
            .with_context(|| format!("unknown node {key:?}"))
    }

    fn data(&self, key: NodeKey) -> Option<&NodeData> {
        let id = self.ids.get(&key)?;
        self.arena.get(*id).map(Node::get)
    }

    fn data_mut(&mut self, key: NodeKey) -> Result<&mut NodeData> {
        let id = self.id_of(key)?;
        self.arena
            .get_mut(id)
            .map(Node::get_mut)
            .ok_or_else(|| anyhow!(DomException::NotFound))
    }

    fn new_node(&mut self, kind: NodeKind) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key = self.next_key.saturating_add(1);
        let id = self.arena.new_node(NodeData::new(key, kind));
        self.ids.insert(key, id);
        key
    }

    fn key_of(&self, id: NodeId) -> Option<NodeKey> {
        self.arena.get(id).map(|node| node.get().key)
    }

    fn entry(&self, id: NodeId) -> Option<MutationEntry> {
        let data = self.arena.get(id)?.get();
        Some(MutationEntry {
            key: data.key,
            tag: data.tag().map(str::to_owned),
        })
    }

    fn parent_id(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id)?.parent()
    }

    fn is_connected_id(&self, id: NodeId) -> bool {
        id.ancestors(&self.arena).any(|ancestor| ancestor == self.root)
    }

    fn element_child(&self, parent: NodeId, tag: &str) -> Option<NodeId> {
        parent
            .children(&self.arena)
            .find(|child| self.arena.get(*child).and_then(|node| node.get().tag()) == Some(tag))
    }

    /// Queue `record` for every registration watching its target.
    fn queue_record(&self, record: &MutationRecord) {
        let Some(target) = self.ids.get(&record.target()).copied() else {
            return;
        };
        for registration in &self.observers {
            if !registration.init.wants(record) {
                continue;
            }
            let watches = match self.ids.get(&registration.target) {
                Some(watched) if *watched == target => true,
                Some(watched) if registration.init.subtree => {
                    target.ancestors(&self.arena).any(|ancestor| ancestor == *watched)
                }
                _ => false,
            };
            if watches && registration.sender.send(record.clone()).is_err() {
                trace!("observer {} went away before delivery", registration.observer);
            }
        }
    }

    /// Detach `child` from its parent (if any), queuing a removal record.
    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.parent_id(child) else {
            return;
        };
        let removed = self.entry(child);
        child.detach(&mut self.arena);
        if let (Some(target), Some(entry)) = (self.key_of(parent), removed) {
            self.queue_record(&MutationRecord::ChildList {
                target,
                added: Vec::new(),
                removed: vec![entry],
            });
        }
    }

    /// Check that `child` may become a child of `parent`.
    fn ensure_insertable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_kind = &self.arena.get(parent).ok_or(DomException::NotFound)?.get().kind;
        let child_kind = &self.arena.get(child).ok_or(DomException::NotFound)?.get().kind;
        let parent_ok = matches!(parent_kind, NodeKind::Document | NodeKind::Element { .. });
        let child_ok = !matches!(child_kind, NodeKind::Document);
        let cycle = parent.ancestors(&self.arena).any(|ancestor| ancestor == child);
        if parent_ok && child_ok && !cycle {
            Ok(())
        } else {
            Err(anyhow!(DomException::HierarchyRequest))
        }
    }

    /// Insert `child` under `parent` before `reference` (append when `None`).
    fn insert(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> Result<()> {
        self.ensure_insertable(parent, child)?;
        if let Some(reference_id) = reference
            && self.parent_id(reference_id) != Some(parent)
        {
            return Err(anyhow!(DomException::NotFound))
                .context("reference node is not a child of the parent");
        }
        self.detach(child);
        match reference {
            Some(reference_id) => reference_id
                .checked_insert_before(child, &mut self.arena)
                .map_err(|err| anyhow!("{err}"))
                .context(DomException::HierarchyRequest)?,
            None => parent
                .checked_append(child, &mut self.arena)
                .map_err(|err| anyhow!("{err}"))
                .context(DomException::HierarchyRequest)?,
        }
        if let (Some(target), Some(entry)) = (self.key_of(parent), self.entry(child)) {
            self.queue_record(&MutationRecord::ChildList {
                target,
                added: vec![entry],
                removed: Vec::new(),
            });
        }
        Ok(())
    }

    fn text_content_of(&self, id: NodeId) -> String {
        id.descendants(&self.arena)
            .filter_map(|node| match &self.arena.get(node)?.get().kind {
                NodeKind::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn resolve_href(&self, href: &str) -> Option<Url> {
        self.url.join(href).ok()
    }

    fn external_source(&self, href: &str, cors_attr: bool) -> Option<SheetSource> {
        let resolved = self.resolve_href(href)?;
        let cross_origin_blocked = resolved.origin() != self.url.origin() && !cors_attr;
        Some(SheetSource::External {
            resource: self.resources.get(resolved.as_str()).cloned(),
            href: resolved.into(),
            cross_origin_blocked,
        })
    }

    /// The source a node's sheet would be built from, if the node has one.
    fn sheet_source(&self, id: NodeId) -> Option<SheetSource> {
        let data = self.arena.get(id)?.get();
        match &data.kind {
            NodeKind::Element { tag } if tag == "style" => {
                Some(SheetSource::Inline(self.text_content_of(id)))
            }
            NodeKind::Element { tag } if tag == "link" => {
                let is_stylesheet = data.attr("rel").is_some_and(|rel| {
                    rel.split_ascii_whitespace()
                        .any(|token| token.eq_ignore_ascii_case("stylesheet"))
                });
                if !is_stylesheet {
                    return None;
                }
                self.external_source(data.attr("href")?, data.attr("crossorigin").is_some())
            }
            NodeKind::ProcessingInstruction { target, data: pi_data }
                if target == "xml-stylesheet" =>
            {
                self.external_source(&pseudo_attribute(pi_data, "href")?, false)
            }
            _ => None,
        }
    }

    /// The sheet associated with a connected node, rebuilt when its source changed.
    fn sheet_for(&mut self, id: NodeId) -> Option<CssStyleSheet> {
        let key = self.key_of(id)?;
        let Some(source) = self.sheet_source(id).filter(|_| self.is_connected_id(id)) else {
            self.sheet_cache.remove(&key);
            return None;
        };
        if let Some((cached_source, sheet)) = self.sheet_cache.get(&key)
            && *cached_source == source
        {
            return Some(sheet.clone());
        }
        let sheet = match &source {
            SheetSource::Inline(css) => CssStyleSheet::parse(Some(key), None, css),
            SheetSource::External {
                href,
                resource,
                cross_origin_blocked,
            } => match resource {
                None => {
                    self.sheet_cache.remove(&key);
                    return None;
                }
                Some(_) if *cross_origin_blocked => CssStyleSheet::inaccessible(
                    Some(key),
                    Some(href.clone()),
                    DomException::Security,
                ),
                Some(Resource::Pending) => CssStyleSheet::inaccessible(
                    Some(key),
                    Some(href.clone()),
                    DomException::InvalidAccess,
                ),
                Some(Resource::Loaded(css)) => CssStyleSheet::parse(Some(key), Some(href.clone()), css),
            },
        };
        debug!("built stylesheet for node {key:?}");
        self.sheet_cache.insert(key, (source, sheet.clone()));
        Some(sheet)
    }
}

/// Read a pseudo-attribute such as `href="a.css"` from processing instruction data.
fn pseudo_attribute(data: &str, name: &str) -> Option<String> {
    let mut rest = data;
    while let Some(position) = rest.find(name) {
        let after = rest.get(position + name.len()..)?.trim_start();
        if let Some(value_part) = after.strip_prefix('=') {
            let value_part = value_part.trim_start();
            let quote = value_part.chars().next().filter(|quote| *quote == '"' || *quote == '\'')?;
            let body = value_part.get(1..)?;
            return body.find(quote).and_then(|end| body.get(..end)).map(str::to_owned);
        }
        rest = after;
    }
    None
}

/// A shared handle to a document. Clones refer to the same tree.
#[derive(Clone)]
pub struct Document {
    inner: Rc<RefCell<DocumentInner>>,
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.inner.borrow().url.as_str())
            .finish_non_exhaustive()
    }
}

impl Document {
    /// An empty HTML document (`<html><head></head><body></body></html>`) at `url`.
    pub fn new(url: Url) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeData::new(NodeKey::ROOT, NodeKind::Document));
        let mut inner = DocumentInner {
            arena,
            root,
            ids: HashMap::from([(NodeKey::ROOT, root)]),
            next_key: 1,
            url,
            resources: HashMap::new(),
            sheet_cache: HashMap::new(),
            adopted: Vec::new(),
            observers: Vec::new(),
        };
        let mut skeleton = |parent: NodeId, tag: &str| {
            let key = inner.new_node(NodeKind::Element { tag: tag.to_owned() });
            let child = inner.ids.get(&key).copied()?;
            parent.checked_append(child, &mut inner.arena).ok()?;
            Some(child)
        };
        if let Some(html) = skeleton(root, "html") {
            skeleton(html, "head");
            skeleton(html, "body");
        }
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    pub fn url(&self) -> Url {
        self.inner.borrow().url.clone()
    }

    pub(crate) fn register_observer(&self, registration: Registration) {
        let mut inner = self.inner.borrow_mut();
        inner.observers.retain(|existing| {
            existing.observer != registration.observer || existing.target != registration.target
        });
        inner.observers.push(registration);
    }

    pub(crate) fn unregister_observer(&self, observer: u64) {
        self.inner
            .borrow_mut()
            .observers
            .retain(|registration| registration.observer != observer);
    }

    // --- Tree ---------------------------------------------------------------

    pub fn document_element(&self) -> Option<NodeKey> {
        let inner = self.inner.borrow();
        let id = inner.root.children(&inner.arena).find(|child| {
            inner
                .arena
                .get(*child)
                .is_some_and(|node| node.get().tag().is_some())
        })?;
        inner.key_of(id)
    }

    pub fn head(&self) -> Option<NodeKey> {
        self.html_child("head")
    }

    pub fn body(&self) -> Option<NodeKey> {
        self.html_child("body")
    }

    fn html_child(&self, tag: &str) -> Option<NodeKey> {
        let html = self.document_element()?;
        let inner = self.inner.borrow();
        let html_id = inner.ids.get(&html).copied()?;
        inner.element_child(html_id, tag).and_then(|id| inner.key_of(id))
    }

    pub fn create_element(&self, tag: &str) -> NodeKey {
        self.inner.borrow_mut().new_node(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
        })
    }

    pub fn create_text_node(&self, text: &str) -> NodeKey {
        self.inner.borrow_mut().new_node(NodeKind::Text {
            text: text.to_owned(),
        })
    }

    pub fn create_processing_instruction(&self, target: &str, data: &str) -> NodeKey {
        self.inner
            .borrow_mut()
            .new_node(NodeKind::ProcessingInstruction {
                target: target.to_owned(),
                data: data.to_owned(),
            })
    }

    /// Append `child` to `parent`, moving it if it is already in the tree.
    ///
    /// # Errors
    /// Unknown nodes, or an insertion that would make an invalid tree.
    pub fn append_child(&self, parent: NodeKey, child: NodeKey) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let parent_id = inner.id_of(parent)?;
        let child_id = inner.id_of(child)?;
        inner
            .insert(parent_id, child_id, None)
            .with_context(|| format!("append {child:?} to {parent:?}"))
    }

    /// Insert `child` before `reference`, or append when `reference` is `None`.
    ///
    /// # Errors
    /// As [`Self::append_child`], or when `reference` is not a child of `parent`.
    pub fn insert_before(
        &self,
        parent: NodeKey,
        child: NodeKey,
        reference: Option<NodeKey>,
    ) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let parent_id = inner.id_of(parent)?;
        let child_id = inner.id_of(child)?;
        let reference_id = reference.map(|key| inner.id_of(key)).transpose()?;
        inner
            .insert(parent_id, child_id, reference_id)
            .with_context(|| format!("insert {child:?} into {parent:?}"))
    }

    /// # Errors
    /// When `child` is not a child of `parent`.
    pub fn remove_child(&self, parent: NodeKey, child: NodeKey) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let parent_id = inner.id_of(parent)?;
        let child_id = inner.id_of(child)?;
        if inner.parent_id(child_id) != Some(parent_id) {
            return Err(anyhow!(DomException::NotFound))
                .with_context(|| format!("{child:?} is not a child of {parent:?}"));
        }
        inner.detach(child_id);
        Ok(())
    }

    /// Detach `node` from its parent; a no-op for detached nodes.
    ///
    /// # Errors
    /// When `node` is unknown.
    pub fn remove(&self, node: NodeKey) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let id = inner.id_of(node)?;
        inner.detach(id);
        Ok(())
    }

    /// Replace an element's children with one text node, or set a text node's data.
    ///
    /// # Errors
    /// When `node` is unknown.
    pub fn set_text_content(&self, node: NodeKey, text: &str) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let id = inner.id_of(node)?;
        if let Some(NodeKind::Text { text: data }) = inner.arena.get_mut(id).map(|entry| &mut entry.get_mut().kind) {
            text.clone_into(data);
            inner.queue_record(&MutationRecord::CharacterData { target: node });
            return Ok(());
        }
        let children: Vec<NodeId> = id.children(&inner.arena).collect();
        let removed: Vec<MutationEntry> = children.iter().filter_map(|child| inner.entry(*child)).collect();
        for child in children {
            child.detach(&mut inner.arena);
        }
        let mut added = Vec::new();
        if !text.is_empty() {
            let text_key = inner.new_node(NodeKind::Text {
                text: text.to_owned(),
            });
            let text_id = inner.id_of(text_key)?;
            id.checked_append(text_id, &mut inner.arena)
                .map_err(|err| anyhow!("{err}"))
                .context(DomException::HierarchyRequest)?;
            added.extend(inner.entry(text_id));
        }
        inner.queue_record(&MutationRecord::ChildList {
            target: node,
            added,
            removed,
        });
        Ok(())
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, node: NodeKey) -> String {
        let inner = self.inner.borrow();
        inner
            .ids
            .get(&node)
            .map(|id| inner.text_content_of(*id))
            .unwrap_or_default()
    }

    pub fn get_attribute(&self, node: NodeKey, name: &str) -> Option<String> {
        self.inner
            .borrow()
            .data(node)
            .and_then(|data| data.attr(&name.to_ascii_lowercase()).map(str::to_owned))
    }

    pub fn has_attribute(&self, node: NodeKey, name: &str) -> bool {
        self.inner
            .borrow()
            .data(node)
            .is_some_and(|data| data.attr(&name.to_ascii_lowercase()).is_some())
    }

    /// # Errors
    /// When `node` is unknown or not an element.
    pub fn set_attribute(&self, node: NodeKey, name: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let name = name.to_ascii_lowercase();
        let data = inner.data_mut(node)?;
        if data.tag().is_none() {
            return Err(anyhow!(DomException::InvalidAccess))
                .with_context(|| format!("{node:?} is not an element"));
        }
        data.set_attr(&name, value);
        inner.queue_record(&MutationRecord::Attributes { target: node, name });
        Ok(())
    }

    /// # Errors
    /// When `node` is unknown.
    pub fn remove_attribute(&self, node: NodeKey, name: &str) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let name = name.to_ascii_lowercase();
        if inner.data_mut(node)?.remove_attr(&name).is_some() {
            inner.queue_record(&MutationRecord::Attributes { target: node, name });
        }
        Ok(())
    }

    pub fn tag_name(&self, node: NodeKey) -> Option<String> {
        self.inner
            .borrow()
            .data(node)
            .and_then(|data| data.tag().map(str::to_owned))
    }

    pub fn is_element(&self, node: NodeKey) -> bool {
        self.inner
            .borrow()
            .data(node)
            .is_some_and(|data| data.tag().is_some())
    }

    pub fn is_processing_instruction(&self, node: NodeKey) -> bool {
        self.inner
            .borrow()
            .data(node)
            .is_some_and(|data| matches!(data.kind, NodeKind::ProcessingInstruction { .. }))
    }

    pub fn parent(&self, node: NodeKey) -> Option<NodeKey> {
        let inner = self.inner.borrow();
        let id = inner.ids.get(&node).copied()?;
        inner.parent_id(id).and_then(|parent| inner.key_of(parent))
    }

    pub fn children(&self, node: NodeKey) -> Vec<NodeKey> {
        let inner = self.inner.borrow();
        inner.ids.get(&node).map_or_else(Vec::new, |id| {
            id.children(&inner.arena)
                .filter_map(|child| inner.key_of(child))
                .collect()
        })
    }

    pub fn is_connected(&self, node: NodeKey) -> bool {
        let inner = self.inner.borrow();
        inner
            .ids
            .get(&node)
            .is_some_and(|id| inner.is_connected_id(*id))
    }

    // --- Queries ------------------------------------------------------------

    /// Connected elements matching `selectors`, in tree order.
    ///
    /// # Errors
    /// [`DomException::Syntax`] when `selectors` does not parse.
    pub fn query_selector_all(&self, selectors: &str) -> Result<Vec<NodeKey>, DomException> {
        let list = parse_selector_list(selectors).map_err(|err| {
            debug!("{err}");
            DomException::Syntax
        })?;
        Ok(self.query_selector_all_list(&list))
    }

    pub fn query_selector_all_list(&self, list: &SelectorList) -> Vec<NodeKey> {
        let inner = self.inner.borrow();
        let adapter = ArenaAdapter::new(&inner.arena, inner.root);
        inner
            .root
            .descendants(&inner.arena)
            .filter(|id| adapter.is_element(*id) && matches_selector_list(&adapter, *id, list))
            .filter_map(|id| inner.key_of(id))
            .collect()
    }

    // --- Stylesheets --------------------------------------------------------

    /// `document.styleSheets`: sheets of connected `<style>`, `<link rel=stylesheet>`
    /// and `xml-stylesheet` nodes in tree order, then adopted sheets.
    pub fn style_sheets(&self) -> Vec<CssStyleSheet> {
        let mut inner = self.inner.borrow_mut();
        let nodes: Vec<NodeId> = inner.root.descendants(&inner.arena).collect();
        let mut sheets: Vec<CssStyleSheet> =
            nodes.into_iter().filter_map(|id| inner.sheet_for(id)).collect();
        sheets.extend(inner.adopted.iter().cloned());
        sheets
    }

    /// `style.sheet` / `link.sheet`.
    pub fn sheet_of(&self, node: NodeKey) -> Option<CssStyleSheet> {
        let mut inner = self.inner.borrow_mut();
        let id = inner.ids.get(&node).copied()?;
        inner.sheet_for(id)
    }

    /// Add a constructed sheet with no owner node.
    pub fn adopt_style_sheet(&self, css: &str) -> CssStyleSheet {
        let sheet = CssStyleSheet::parse(None, None, css);
        self.inner.borrow_mut().adopted.push(sheet.clone());
        sheet
    }

    /// Serve `css` for `href` (resolved against the document URL).
    ///
    /// # Errors
    /// When `href` can not be resolved.
    pub fn provide_stylesheet(&self, href: &str, css: &str) -> Result<()> {
        self.set_resource(href, Resource::Loaded(css.to_owned()))
    }

    /// Mark `href` as still loading; its sheet's rules are not accessible yet.
    ///
    /// # Errors
    /// When `href` can not be resolved.
    pub fn mark_stylesheet_pending(&self, href: &str) -> Result<()> {
        self.set_resource(href, Resource::Pending)
    }

    fn set_resource(&self, href: &str, resource: Resource) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let resolved = inner
            .resolve_href(href)
            .with_context(|| format!("can not resolve stylesheet href {href:?}"))?;
        inner.resources.insert(resolved.into(), resource);
        Ok(())
    }

    // --- Style --------------------------------------------------------------

    fn inline_style(&self, node: NodeKey) -> DeclarationBlock {
        self.get_attribute(node, "style")
            .map(|text| DeclarationBlock::parse(&text))
            .unwrap_or_default()
    }

    /// `element.style.setProperty(name, value, priority)`.
    ///
    /// # Errors
    /// When `node` is not an element.
    pub fn style_set_property(
        &self,
        node: NodeKey,
        name: &str,
        value: &str,
        important: bool,
    ) -> Result<()> {
        let mut style = self.inline_style(node);
        style.set_property(name, value, important);
        self.set_attribute(node, "style", &style.css_text())
            .context("update inline style")
    }

    /// `element.style.getPropertyValue(name)`.
    pub fn style_get_property_value(&self, node: NodeKey, name: &str) -> String {
        self.inline_style(node).get_property_value(name).to_owned()
    }

    /// `element.style.removeProperty(name)`, returning the old value.
    ///
    /// # Errors
    /// When `node` is not an element.
    pub fn style_remove_property(&self, node: NodeKey, name: &str) -> Result<String> {
        let mut style = self.inline_style(node);
        let previous = style.remove_property(name);
        self.set_attribute(node, "style", &style.css_text())
            .context("update inline style")?;
        Ok(previous)
    }

    /// `getComputedStyle(node)`; empty for unknown or non-element nodes.
    pub fn computed_style(&self, node: NodeKey) -> ComputedStyle {
        let sheets = self.style_sheets();
        let inner = self.inner.borrow();
        let Some(id) = inner.ids.get(&node).copied() else {
            return ComputedStyle::default();
        };
        let adapter = ArenaAdapter::new(&inner.arena, inner.root);
        compute_style(&adapter, &sheets, id)
    }
}
