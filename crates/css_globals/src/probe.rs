//! Cross-origin access probing for stylesheets.

use crate::ScanError;
use dom::{CssRule, CssStyleSheet, Document, DomException};
use log::debug;

/// Outcome of trying to read a sheet's rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Accessible(Vec<CssRule>),
    /// First failure for this owner; the owner has now been marked ignored.
    CorsBlocked(DomException),
    /// The owner was already marked, or the sheet has no element owner.
    Other(DomException),
}

impl ProbeOutcome {
    pub const fn scan_error(&self) -> Option<ScanError> {
        match self {
            Self::Accessible(_) => None,
            Self::CorsBlocked(err) => Some(ScanError::CorsAccess(*err)),
            Self::Other(err) => Some(ScanError::Unexpected(*err)),
        }
    }
}

/// Read `sheet`'s rules. On failure mark the owner element with `ignore_attr`
/// so later scans skip it without paying for the failure again.
pub fn probe(document: &Document, sheet: &CssStyleSheet, ignore_attr: &str) -> ProbeOutcome {
    let err = match sheet.css_rules() {
        Ok(rules) => return ProbeOutcome::Accessible(rules),
        Err(err) => err,
    };
    let Some(owner) = sheet.owner_node().filter(|owner| document.is_element(*owner)) else {
        return ProbeOutcome::Other(err);
    };
    if document.has_attribute(owner, ignore_attr) {
        return ProbeOutcome::Other(err);
    }
    if let Err(mark_err) = document.set_attribute(owner, ignore_attr, "true") {
        debug!("could not mark {owner:?} as ignored: {mark_err:#}");
        return ProbeOutcome::Other(err);
    }
    ProbeOutcome::CorsBlocked(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::Window;

    const IGNORE: &str = "data-css-global-vars-ignore";

    #[test]
    fn marks_owner_once_then_reports_other() {
        let window = Window::from_url("https://app.example/").unwrap();
        let doc = window.document();
        doc.provide_stylesheet("https://cdn.example/a.css", ":root { --a: 1 }")
            .unwrap();
        let link = doc.create_element("link");
        doc.set_attribute(link, "rel", "stylesheet").unwrap();
        doc.set_attribute(link, "href", "https://cdn.example/a.css").unwrap();
        doc.append_child(doc.head().unwrap(), link).unwrap();
        let sheet = doc.sheet_of(link).unwrap();

        assert_eq!(probe(&doc, &sheet, IGNORE), ProbeOutcome::CorsBlocked(DomException::Security));
        assert_eq!(doc.get_attribute(link, IGNORE).as_deref(), Some("true"));
        assert_eq!(probe(&doc, &sheet, IGNORE), ProbeOutcome::Other(DomException::Security));
    }

    #[test]
    fn readable_sheets_are_accessible() {
        let window = Window::from_url("https://app.example/").unwrap();
        let doc = window.document();
        let sheet = doc.adopt_style_sheet(":root { --a: 1 }");
        assert!(matches!(probe(&doc, &sheet, IGNORE), ProbeOutcome::Accessible(rules) if rules.len() == 1));
    }
}
