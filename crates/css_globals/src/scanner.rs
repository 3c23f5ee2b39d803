//! Extraction of custom property declarations from rule lists.

use crate::normalizer::PREFIX;
use dom::CssRule;

/// `(name, value)` pairs of every custom property declared by style rules
/// whose selector text equals `selector`, in source order. Duplicates are
/// kept; the caller's map makes the last one win.
pub fn extract(rules: &[CssRule], selector: &str) -> Vec<(String, String)> {
    rules
        .iter()
        .filter_map(|rule| match rule {
            CssRule::Style(style_rule) if style_rule.selector_text() == selector => {
                Some(style_rule.css_text())
            }
            _ => None,
        })
        .flat_map(|css_text| declarations(&css_text))
        .collect()
}

/// Split the block of a serialized rule (`sel { a: b; --c: d; }`) into
/// custom property pairs. Each declaration is split on its first colon.
fn declarations(css_text: &str) -> Vec<(String, String)> {
    let Some((_, block)) = css_text.split_once('{') else {
        return Vec::new();
    };
    let block = block.trim_end().strip_suffix('}').unwrap_or(block);
    block
        .split(';')
        .filter_map(|declaration| declaration.split_once(':'))
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| name.starts_with(PREFIX))
        .map(|(name, value)| (name.to_owned(), value.to_owned()))
        .collect()
}
