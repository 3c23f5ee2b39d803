//! Computed style: selector matching over the arena, a small cascade and
//! custom property inheritance with `var()` substitution.
//! Spec: <https://www.w3.org/TR/css-cascade-4/>

use crate::node::NodeData;
use crate::stylesheet::{CssRule, CssStyleSheet};
use css_selectors::{
    ElementAdapter, SelectorList, Specificity, matches_complex, parse_selector_list,
};
use css_style_attr::DeclarationBlock;
use css_variables::{
    CustomProperties, compute_custom_properties, is_custom_property_name, substitute_vars,
};
use indextree::{Arena, Node, NodeId};
use std::collections::BTreeMap;

/// Selector matching over the document arena.
pub(crate) struct ArenaAdapter<'arena> {
    arena: &'arena Arena<NodeData>,
    root: NodeId,
}

impl<'arena> ArenaAdapter<'arena> {
    pub(crate) const fn new(arena: &'arena Arena<NodeData>, root: NodeId) -> Self {
        Self { arena, root }
    }

    fn data(&self, id: NodeId) -> Option<&'arena NodeData> {
        self.arena.get(id).map(Node::get)
    }

    pub(crate) fn is_element(&self, id: NodeId) -> bool {
        self.data(id).is_some_and(|data| data.tag().is_some())
    }
}

impl ElementAdapter for ArenaAdapter<'_> {
    type Handle = NodeId;

    fn parent(&self, element: NodeId) -> Option<NodeId> {
        self.arena
            .get(element)?
            .parent()
            .filter(|parent| self.is_element(*parent))
    }

    fn previous_sibling_element(&self, element: NodeId) -> Option<NodeId> {
        element
            .preceding_siblings(self.arena)
            .skip(1)
            .find(|sibling| self.is_element(*sibling))
    }

    fn next_sibling_element(&self, element: NodeId) -> Option<NodeId> {
        element
            .following_siblings(self.arena)
            .skip(1)
            .find(|sibling| self.is_element(*sibling))
    }

    fn is_root(&self, element: NodeId) -> bool {
        self.arena.get(element).and_then(Node::parent) == Some(self.root)
    }

    fn tag_name(&self, element: NodeId) -> &str {
        self.data(element).and_then(NodeData::tag).unwrap_or("")
    }

    fn element_id(&self, element: NodeId) -> Option<&str> {
        self.data(element)?.attr("id")
    }

    fn has_class(&self, element: NodeId, class: &str) -> bool {
        self.data(element).is_some_and(|data| data.has_class(class))
    }

    fn attr(&self, element: NodeId, name: &str) -> Option<&str> {
        self.data(element)?.attr(name)
    }
}

/// The result of `getComputedStyle`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComputedStyle {
    properties: BTreeMap<String, String>,
}

impl ComputedStyle {
    /// `getPropertyValue(name)`: the trimmed computed value, `""` when unset.
    pub fn property_value(&self, name: &str) -> String {
        let key = if is_custom_property_name(name.trim()) {
            name.trim().to_owned()
        } else {
            name.trim().to_ascii_lowercase()
        };
        self.properties
            .get(&key)
            .map(|value| value.trim().to_owned())
            .unwrap_or_default()
    }

    /// Every custom property visible on the element, sorted by name.
    pub fn custom_properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .filter(|(name, _)| is_custom_property_name(name))
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// One candidate declaration in the cascade. Field order is sort order.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct CascadeKey {
    important: bool,
    inline: bool,
    specificity: Specificity,
    order: usize,
}

/// Style rules of all readable sheets with their parsed selectors, in order.
fn collect_rules(sheets: &[CssStyleSheet]) -> Vec<(SelectorList, DeclarationBlock)> {
    sheets
        .iter()
        .filter_map(|sheet| sheet.css_rules().ok())
        .flatten()
        .filter_map(|rule| match rule {
            CssRule::Style(style_rule) => parse_selector_list(style_rule.selector_text())
                .ok()
                .map(|list| (list, style_rule.style().clone())),
            _ => None,
        })
        .collect()
}

/// Winning declared value per property for one element.
fn cascade(
    adapter: &ArenaAdapter<'_>,
    rules: &[(SelectorList, DeclarationBlock)],
    element: NodeId,
) -> BTreeMap<String, String> {
    let inline = adapter
        .data(element)
        .and_then(|data| data.attr("style"))
        .map(DeclarationBlock::parse)
        .unwrap_or_default();
    let mut candidates: Vec<(CascadeKey, &str, &str)> = Vec::new();
    let mut order = 0_usize;
    for (list, block) in rules {
        let Some(specificity) =
            list.matching_specificity(|selector| matches_complex(adapter, element, selector))
        else {
            continue;
        };
        for declaration in block.iter() {
            order += 1;
            candidates.push((
                CascadeKey {
                    important: declaration.important,
                    inline: false,
                    specificity,
                    order,
                },
                &declaration.name,
                &declaration.value,
            ));
        }
    }
    for declaration in inline.iter() {
        order += 1;
        candidates.push((
            CascadeKey {
                important: declaration.important,
                inline: true,
                specificity: Specificity::default(),
                order,
            },
            &declaration.name,
            &declaration.value,
        ));
    }
    candidates.sort_by(|left, right| left.0.cmp(&right.0));
    candidates
        .into_iter()
        .map(|(_, name, value)| (name.to_owned(), value.to_owned()))
        .collect()
}

/// Compute the style of `element`, inheriting custom properties from its ancestors.
pub(crate) fn compute_style(
    adapter: &ArenaAdapter<'_>,
    sheets: &[CssStyleSheet],
    element: NodeId,
) -> ComputedStyle {
    if !adapter.is_element(element) {
        return ComputedStyle::default();
    }
    let rules = collect_rules(sheets);
    let mut chain: Vec<NodeId> = element
        .ancestors(adapter.arena)
        .filter(|id| adapter.is_element(*id))
        .collect();
    chain.reverse();

    let mut inherited = CustomProperties::new();
    let mut own = BTreeMap::new();
    for id in chain {
        own = cascade(adapter, &rules, id);
        let mut environment = inherited.clone();
        environment.extend(
            own.iter()
                .filter(|(name, _)| is_custom_property_name(name))
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        inherited = compute_custom_properties(&environment);
    }

    let mut properties: BTreeMap<String, String> = own
        .into_iter()
        .filter(|(name, _)| !is_custom_property_name(name))
        .map(|(name, value)| {
            let computed = substitute_vars(&value, &inherited).unwrap_or_default();
            (name, computed.trim().to_owned())
        })
        .collect();
    properties.extend(inherited);
    ComputedStyle { properties }
}
