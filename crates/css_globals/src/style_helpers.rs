//! Small helpers for managed `<style>` elements.

use crate::Error;
use anyhow::Context as _;
use core::sync::atomic::{AtomicU64, Ordering};
use dom::{Document, NodeKey};

static NEXT_STYLE_ID: AtomicU64 = AtomicU64::new(1);

/// Append `<style media="..">` with an empty text node to `<head>`.
/// A missing `id` gets a generated `css-global-props-N` one.
///
/// # Errors
/// [`Error::Host`] when the document has no `<head>` or rejects the insertion.
pub fn create_head_style_tag(
    document: &Document,
    media: &str,
    id: Option<&str>,
) -> Result<NodeKey, Error> {
    let head = document
        .head()
        .context("document has no <head> to hold a style element")?;
    let style = document.create_element("style");
    let id = id.map_or_else(
        || {
            let next = NEXT_STYLE_ID.fetch_add(1, Ordering::Relaxed);
            format!("css-global-props-{next}")
        },
        str::to_owned,
    );
    document.set_attribute(style, "id", &id)?;
    document.set_attribute(style, "media", media)?;
    let text = document.create_text_node("");
    document.append_child(style, text)?;
    document.append_child(head, style)?;
    Ok(style)
}

/// Insert `selector { rules }` at `index` into the sheet of `style`.
/// Nothing happens when the node has no sheet.
///
/// # Errors
/// [`Error::Configuration`] when `rules` is empty, [`Error::Host`] when the
/// sheet rejects the rule.
pub fn add_css_rule(
    document: &Document,
    style: NodeKey,
    selector: &str,
    rules: &str,
    index: usize,
) -> Result<(), Error> {
    if rules.trim().is_empty() {
        return Err(Error::Configuration(
            "addCSSRule: missing required parameter \"rules\"".to_owned(),
        ));
    }
    let Some(sheet) = document.sheet_of(style) else {
        return Ok(());
    };
    sheet.insert_rule(&format!("{selector} {{ {rules} }}"), index)?;
    Ok(())
}
