//! A dedicated `<style>` element owning one rule under the target selector.
//!
//! Writes land in that rule with `!important`, so later author sheets do not
//! shadow them. The element carries the ignore attribute and is never scanned.

use crate::style_helpers::create_head_style_tag;
use crate::Error;
use anyhow::{Context as _, anyhow};
use dom::{CssStyleSheet, Document, NodeKey};
use log::debug;

const MANAGED_MEDIA: &str = "all";

#[derive(Debug)]
pub struct RootStyleController {
    document: Document,
    style: NodeKey,
}

impl RootStyleController {
    /// Create the managed element in `<head>` with an empty `selector { }` rule.
    ///
    /// # Errors
    /// [`Error::Host`] when the element or its rule can not be created.
    pub fn new(document: &Document, selector: &str, ignore_attr: &str) -> Result<Self, Error> {
        let style = create_head_style_tag(document, MANAGED_MEDIA, None)?;
        let controller = Self {
            document: document.clone(),
            style,
        };
        if let Err(err) = controller.prepare(selector, ignore_attr) {
            if let Err(cleanup) = controller.remove() {
                debug!("managed style element {style:?} left behind: {cleanup}");
            }
            return Err(err);
        }
        debug!("managed style element {style:?} created for {selector:?}");
        Ok(controller)
    }

    fn prepare(&self, selector: &str, ignore_attr: &str) -> Result<(), Error> {
        self.document.set_attribute(self.style, ignore_attr, "true")?;
        self.sheet()?
            .insert_rule(&format!("{selector} {{ }}"), 0)
            .map_err(|err| anyhow!(err))
            .with_context(|| format!("managed rule for {selector:?}"))?;
        Ok(())
    }

    pub const fn style_node(&self) -> NodeKey {
        self.style
    }

    fn sheet(&self) -> Result<CssStyleSheet, Error> {
        self.document
            .sheet_of(self.style)
            .ok_or_else(|| Error::Host(anyhow!("managed style element {:?} has no sheet", self.style)))
    }

    /// Computed value of `name` as seen from the managed element.
    pub fn get(&self, name: &str) -> String {
        self.document.computed_style(self.style).property_value(name)
    }

    /// # Errors
    /// [`Error::Host`] when the managed rule is gone.
    pub fn set(&self, name: &str, value: &str) -> Result<(), Error> {
        self.sheet()?.set_rule_property(0, name, value, true)?;
        Ok(())
    }

    /// Detach the managed element from the document.
    ///
    /// # Errors
    /// [`Error::Host`] when the document rejects the removal.
    pub fn remove(&self) -> Result<(), Error> {
        if self.document.is_connected(self.style) {
            self.document.remove(self.style)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::Window;

    const IGNORE: &str = "data-css-global-vars-ignore";

    #[test]
    fn writes_win_over_author_rules() {
        let window = Window::from_url("https://app.example/").unwrap();
        let doc = window.document();
        let controller = RootStyleController::new(&doc, ":root", IGNORE).unwrap();
        let author = doc.create_element("style");
        doc.set_text_content(author, ":root { --gap: 4px }").unwrap();
        doc.append_child(doc.head().unwrap(), author).unwrap();

        assert_eq!(controller.get("--gap"), "4px");
        controller.set("--gap", "8px").unwrap();
        assert_eq!(controller.get("--gap"), "8px");
        assert_eq!(
            doc.get_attribute(controller.style_node(), IGNORE).as_deref(),
            Some("true")
        );
    }

    #[test]
    fn remove_detaches_the_element() {
        let window = Window::from_url("https://app.example/").unwrap();
        let doc = window.document();
        let controller = RootStyleController::new(&doc, ":root", IGNORE).unwrap();
        controller.set("--a", "1").unwrap();
        controller.remove().unwrap();
        assert!(!doc.is_connected(controller.style_node()));
        controller.remove().unwrap();
        assert_eq!(doc.computed_style(doc.document_element().unwrap()).property_value("--a"), "");
    }

    #[test]
    fn failed_setup_leaves_no_element_behind() {
        let window = Window::from_url("https://app.example/").unwrap();
        let doc = window.document();
        let result = RootStyleController::new(&doc, "a { } b", IGNORE);
        assert!(matches!(result, Err(Error::Host(_))));
        assert!(doc.query_selector_all("style").unwrap().is_empty());
    }
}
