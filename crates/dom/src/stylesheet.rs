//! CSSOM stylesheets: `CSSStyleSheet`, `CSSRule` and `CSSStyleRule`.
//! Spec: <https://drafts.csswg.org/cssom/#the-cssstylesheet-interface>

use crate::{DomException, NodeKey};
use core::cell::RefCell;
use core::fmt::{self, Display, Formatter};
use css_style_attr::DeclarationBlock;
use css_syntax::{Rule, parse_one_rule, parse_stylesheet};
use std::rc::Rc;

/// A style rule: a selector and its declaration block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CssStyleRule {
    selector_text: String,
    style: DeclarationBlock,
}

impl CssStyleRule {
    /// The selector with whitespace runs collapsed, as `selectorText` reports it.
    pub fn selector_text(&self) -> &str {
        &self.selector_text
    }

    pub const fn style(&self) -> &DeclarationBlock {
        &self.style
    }

    /// Serialized as `selector { a: b; c: d; }`.
    pub fn css_text(&self) -> String {
        self.to_string()
    }
}

impl Display for CssStyleRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.style.is_empty() {
            write!(f, "{} {{ }}", self.selector_text)
        } else {
            write!(f, "{} {{ {} }}", self.selector_text, self.style)
        }
    }
}

/// A rule in a sheet's rule list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CssRule {
    Style(CssStyleRule),
    /// `@import`; the imported sheet is never fetched.
    Import { href: String },
    /// `@media`; its contents are kept as raw text.
    Media { condition: String, css_text: String },
    /// Any other at-rule, kept as raw text.
    Other { css_text: String },
}

impl CssRule {
    fn from_parsed(rule: Rule) -> Self {
        match rule {
            Rule::Style(style_rule) => Self::Style(CssStyleRule {
                selector_text: collapse_whitespace(&style_rule.prelude),
                style: DeclarationBlock::from_declarations(style_rule.declarations),
            }),
            Rule::At(at_rule) => match at_rule.name.as_str() {
                "import" => Self::Import {
                    href: at_rule.prelude,
                },
                "media" => Self::Media {
                    condition: at_rule.prelude,
                    css_text: at_rule.block.unwrap_or_default(),
                },
                _ => Self::Other {
                    css_text: match at_rule.block {
                        Some(block) => format!("@{} {} {{ {block} }}", at_rule.name, at_rule.prelude),
                        None => format!("@{} {};", at_rule.name, at_rule.prelude),
                    },
                },
            },
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug)]
struct SheetData {
    owner: Option<NodeKey>,
    href: Option<String>,
    rules: Result<Vec<CssRule>, DomException>,
}

/// A shared handle to a stylesheet. Clones refer to the same sheet.
#[derive(Clone, Debug)]
pub struct CssStyleSheet {
    inner: Rc<RefCell<SheetData>>,
}

impl PartialEq for CssStyleSheet {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for CssStyleSheet {}

impl CssStyleSheet {
    /// Parse `css` into a new sheet.
    pub fn parse(owner: Option<NodeKey>, href: Option<String>, css: &str) -> Self {
        let rules = parse_stylesheet(css)
            .rules
            .into_iter()
            .map(CssRule::from_parsed)
            .collect();
        Self::with_rules(owner, href, Ok(rules))
    }

    /// A sheet whose rule list can not be read.
    pub(crate) fn inaccessible(
        owner: Option<NodeKey>,
        href: Option<String>,
        exception: DomException,
    ) -> Self {
        Self::with_rules(owner, href, Err(exception))
    }

    fn with_rules(
        owner: Option<NodeKey>,
        href: Option<String>,
        rules: Result<Vec<CssRule>, DomException>,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SheetData { owner, href, rules })),
        }
    }

    /// The node that owns the sheet; `None` for constructed/adopted sheets.
    pub fn owner_node(&self) -> Option<NodeKey> {
        self.inner.borrow().owner
    }

    pub fn href(&self) -> Option<String> {
        self.inner.borrow().href.clone()
    }

    /// Snapshot of the rule list.
    ///
    /// # Errors
    /// [`DomException::Security`] for cross-origin sheets and
    /// [`DomException::InvalidAccess`] for sheets that have not loaded.
    pub fn css_rules(&self) -> Result<Vec<CssRule>, DomException> {
        self.inner.borrow().rules.clone()
    }

    fn with_rules_mut<T>(
        &self,
        apply: impl FnOnce(&mut Vec<CssRule>) -> Result<T, DomException>,
    ) -> Result<T, DomException> {
        let mut data = self.inner.borrow_mut();
        match &mut data.rules {
            Ok(rules) => apply(rules),
            Err(exception) => Err(*exception),
        }
    }

    /// Insert one rule at `index`, returning the index.
    ///
    /// # Errors
    /// [`DomException::IndexSize`] when `index` is past the end, [`DomException::Syntax`]
    /// when `rule` is not exactly one rule, or the sheet's access error.
    pub fn insert_rule(&self, rule: &str, index: usize) -> Result<usize, DomException> {
        self.with_rules_mut(|rules| {
            if index > rules.len() {
                return Err(DomException::IndexSize);
            }
            let parsed = parse_one_rule(rule).ok_or(DomException::Syntax)?;
            rules.insert(index, CssRule::from_parsed(parsed));
            Ok(index)
        })
    }

    /// # Errors
    /// [`DomException::IndexSize`] when there is no rule at `index`.
    pub fn delete_rule(&self, index: usize) -> Result<(), DomException> {
        self.with_rules_mut(|rules| {
            if index >= rules.len() {
                return Err(DomException::IndexSize);
            }
            rules.remove(index);
            Ok(())
        })
    }

    /// `sheet.cssRules[index].style.setProperty(name, value, priority)`.
    ///
    /// # Errors
    /// [`DomException::IndexSize`] for a bad index and [`DomException::InvalidAccess`]
    /// when the rule at `index` is not a style rule.
    pub fn set_rule_property(
        &self,
        index: usize,
        name: &str,
        value: &str,
        important: bool,
    ) -> Result<(), DomException> {
        self.with_rules_mut(|rules| match rules.get_mut(index) {
            Some(CssRule::Style(style_rule)) => {
                style_rule.style.set_property(name, value, important);
                Ok(())
            }
            Some(_) => Err(DomException::InvalidAccess),
            None => Err(DomException::IndexSize),
        })
    }

    /// `sheet.cssRules[index].style.getPropertyValue(name)`.
    ///
    /// # Errors
    /// Same as [`Self::set_rule_property`].
    pub fn rule_property_value(&self, index: usize, name: &str) -> Result<String, DomException> {
        self.with_rules_mut(|rules| match rules.get(index) {
            Some(CssRule::Style(style_rule)) => {
                Ok(style_rule.style.get_property_value(name).to_owned())
            }
            Some(_) => Err(DomException::InvalidAccess),
            None => Err(DomException::IndexSize),
        })
    }
}
