//! Selectors Level 3: parsing, element matching and specificity.
//! See <https://www.w3.org/TR/selectors-3/>
//!
//! This module implements the subset a document query layer needs:
//! - Type, universal, class, id and attribute (presence / equals) selectors
//! - The `:root`, `:first-child` and `:last-child` pseudo-classes
//! - The four combinators (` `, `>`, `+`, `~`)
//! - Specificity, used to order cascaded declarations
//!
//! Unlike a permissive style-sheet parser, [`parse_selector_list`] rejects
//! malformed input with a [`SelectorError`], the way `querySelectorAll`
//! throws a `SyntaxError`.

use core::fmt;

mod matcher;
mod parser;
mod specificity;

pub use matcher::{matches_complex, matches_compound, matches_selector_list};
pub use parser::{parse_complex_selector, parse_selector_list};
pub use specificity::{Specificity, specificity_of_complex, specificity_of_compound};

/// Read-only view of an element tree that selectors are matched against.
pub trait ElementAdapter {
    type Handle: Copy + Eq;

    /// Parent element if any. The document node itself is not an element.
    fn parent(&self, element: Self::Handle) -> Option<Self::Handle>;

    /// Previous sibling element, skipping non-element nodes.
    fn previous_sibling_element(&self, element: Self::Handle) -> Option<Self::Handle>;

    /// Next sibling element, skipping non-element nodes.
    fn next_sibling_element(&self, element: Self::Handle) -> Option<Self::Handle>;

    /// True if the element is the document element.
    fn is_root(&self, element: Self::Handle) -> bool;

    /// Lowercased local name.
    fn tag_name(&self, element: Self::Handle) -> &str;

    /// Value of the `id` attribute.
    fn element_id(&self, element: Self::Handle) -> Option<&str>;

    fn has_class(&self, element: Self::Handle, class: &str) -> bool;

    fn attr(&self, element: Self::Handle, name: &str) -> Option<&str>;
}

/// Supported pseudo-classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PseudoClass {
    Root,
    FirstChild,
    LastChild,
}

/// One simple selector inside a compound.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SimpleSelector {
    /// Type selector, lowercased.
    Type(String),
    /// Class selector (case-sensitive).
    Class(String),
    /// ID selector (case-sensitive).
    IdSelector(String),
    /// `[attr]` when `value` is `None`, `[attr=value]` otherwise.
    Attribute { name: String, value: Option<String> },
    /// Pseudo-class such as `:root`.
    Pseudo(PseudoClass),
    /// Universal selector '*'.
    Universal,
}

/// Simple selectors that must all match the same element, e.g. `div.note#x`.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct CompoundSelector {
    pub simples: Vec<SimpleSelector>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
    AdjacentSibling,
    GeneralSibling,
}

/// `first`, then each `(combinator, compound)` step to the right.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ComplexSelector {
    pub first: CompoundSelector,
    pub rest: Vec<(Combinator, CompoundSelector)>,
}

/// Comma-separated alternatives; matches when any member does.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SelectorList {
    pub selectors: Vec<ComplexSelector>,
}

/// A selector that could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectorError {
    /// The full selector text that failed.
    pub input: String,
    /// What went wrong.
    pub reason: String,
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid selector: {}", self.input, self.reason)
    }
}

impl std::error::Error for SelectorError {}
