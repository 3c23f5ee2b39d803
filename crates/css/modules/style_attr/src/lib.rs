//! CSS Style Attributes: ordered declaration blocks.
//! Spec: <https://www.w3.org/TR/css-style-attr/>
//!
//! A [`DeclarationBlock`] backs both `style="..."` attributes and the body of a
//! style rule, the way `CSSStyleDeclaration` does in the CSSOM.

#![forbid(unsafe_code)]

use core::fmt;
use css_syntax::{Declaration, parse_declaration_list};

/// An ordered list of declarations with at most one entry per property.
///
/// Spec: <https://drafts.csswg.org/cssom/#css-declaration-blocks>
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeclarationBlock {
    declarations: Vec<Declaration>,
}

impl DeclarationBlock {
    /// Create an empty block.
    pub const fn new() -> Self {
        Self {
            declarations: Vec::new(),
        }
    }

    /// Parse the value of a `style` attribute or a rule body.
    ///
    /// Duplicate properties keep the last occurrence, at the position of the
    /// first one. Declarations with an empty value are skipped.
    ///
    /// Spec: <https://www.w3.org/TR/css-style-attr/#interpreting>
    pub fn parse(text: &str) -> Self {
        Self::from_declarations(parse_declaration_list(text))
    }

    /// Build a block from already parsed declarations, deduplicating by name.
    pub fn from_declarations(declarations: impl IntoIterator<Item = Declaration>) -> Self {
        let mut block = Self::new();
        for declaration in declarations {
            if declaration.value.is_empty() {
                continue;
            }
            block.upsert(declaration);
        }
        block
    }

    fn upsert(&mut self, declaration: Declaration) {
        if let Some(existing) = self
            .declarations
            .iter_mut()
            .find(|existing| existing.name == declaration.name)
        {
            *existing = declaration;
        } else {
            self.declarations.push(declaration);
        }
    }

    /// Value for `name`, or `""` when absent (as `getPropertyValue` returns).
    pub fn get_property_value(&self, name: &str) -> &str {
        self.find(name).map_or("", |declaration| declaration.value.as_str())
    }

    /// `"important"` when the declaration carries `!important`, else `""`.
    pub fn get_property_priority(&self, name: &str) -> &'static str {
        if self.find(name).is_some_and(|declaration| declaration.important) {
            "important"
        } else {
            ""
        }
    }

    /// Set a property. An empty value removes it, like `setProperty(name, "")`.
    pub fn set_property(&mut self, name: &str, value: &str, important: bool) {
        let value = value.trim();
        if value.is_empty() {
            self.remove_property(name);
            return;
        }
        self.upsert(Declaration {
            name: canonical_name(name),
            value: value.to_owned(),
            important,
        });
    }

    /// Remove a property, returning its previous value (`""` if it was absent).
    pub fn remove_property(&mut self, name: &str) -> String {
        let canonical = canonical_name(name);
        let Some(position) = self
            .declarations
            .iter()
            .position(|declaration| declaration.name == canonical)
        else {
            return String::new();
        };
        self.declarations.remove(position).value
    }

    /// Declarations in block order.
    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Serialize as `a: b; c: d !important;`.
    ///
    /// Spec: <https://drafts.csswg.org/cssom/#serialize-a-css-declaration-block>
    pub fn css_text(&self) -> String {
        self.to_string()
    }

    fn find(&self, name: &str) -> Option<&Declaration> {
        let canonical = canonical_name(name);
        self.declarations
            .iter()
            .find(|declaration| declaration.name == canonical)
    }
}

impl fmt::Display for DeclarationBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, declaration) in self.declarations.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}: {}", declaration.name, declaration.value)?;
            if declaration.important {
                f.write_str(" !important")?;
            }
            f.write_str(";")?;
        }
        Ok(())
    }
}

/// Property names are ASCII case-insensitive except custom properties.
fn canonical_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.starts_with("--") {
        trimmed.to_owned()
    } else {
        trimmed.to_ascii_lowercase()
    }
}
