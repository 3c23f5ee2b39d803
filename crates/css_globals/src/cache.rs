//! The variable cache and its refresh pass.

use crate::logger::Logger;
use crate::probe::{ProbeOutcome, probe};
use crate::registry::InstanceId;
use crate::scanner::extract;
use crate::ScanError;
use core::mem;
use css_selectors::SelectorList;
use dom::{CssStyleSheet, Document, NodeKey};
use log::{debug, trace};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::info_span;

/// What a refresh needs to know besides the document.
pub struct ScanSettings {
    pub selector: String,
    pub filter: Option<SelectorList>,
    pub id_attr: String,
    pub ignore_attr: String,
    pub silent: bool,
    pub logger: Rc<dyn Logger>,
}

/// Known custom properties of one binding, keyed by canonical name.
pub struct VariableCache {
    instance: InstanceId,
    settings: ScanSettings,
    entries: BTreeMap<String, String>,
    held: Vec<ScanError>,
}

/// Scan failures held back from the logger until the caller has released
/// whatever it was borrowing during the refresh.
#[must_use = "reports reach the logger only through `deliver`"]
pub struct ScanReports {
    logger: Rc<dyn Logger>,
    errors: Vec<ScanError>,
}

impl ScanReports {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Send every held report to the logger as a warning.
    pub fn deliver(self) {
        for err in self.errors {
            self.logger.warn(&err.to_string());
        }
    }
}

/// Per-sheet verdict of the scan loop.
enum SheetStep {
    Skip,
    Abort,
    Scanned(usize),
}

impl VariableCache {
    pub const fn new(instance: InstanceId, settings: ScanSettings) -> Self {
        Self {
            instance,
            settings,
            entries: BTreeMap::new(),
            held: Vec::new(),
        }
    }

    pub const fn instance(&self) -> InstanceId {
        self.instance
    }

    pub const fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn insert(&mut self, name: String, value: String) {
        self.entries.insert(name, value);
    }

    /// Scan every sheet not yet seen by this instance, then re-read the
    /// computed value of every known name from `computed_from`.
    ///
    /// Returns `false` when the filter aborted the pass; the computed pass is
    /// skipped in that case. Per-sheet failures are held for
    /// [`take_reports`](Self::take_reports), never returned.
    pub fn refresh(&mut self, document: &Document, computed_from: Option<NodeKey>) -> bool {
        let _span = info_span!("css_globals.refresh", instance = self.instance.0).entered();
        let allowed_owners = self
            .settings
            .filter
            .as_ref()
            .map(|filter| document.query_selector_all_list(filter));

        let mut extracted = 0_usize;
        for sheet in document.style_sheets() {
            match self.scan_sheet(document, &sheet, allowed_owners.as_deref()) {
                SheetStep::Skip => {}
                SheetStep::Abort => {
                    debug!(
                        "instance {}: sheet {:?} is outside the filter, refresh aborted",
                        self.instance,
                        sheet.owner_node()
                    );
                    return false;
                }
                SheetStep::Scanned(count) => extracted = extracted.saturating_add(count),
            }
        }
        trace!("instance {}: {extracted} declarations extracted", self.instance);

        if let Some(node) = computed_from {
            let computed = document.computed_style(node);
            for (name, value) in &mut self.entries {
                *value = computed.property_value(name);
            }
        }
        true
    }

    /// Scan failures held since the last call. Empty for silent caches.
    pub fn take_reports(&mut self) -> ScanReports {
        ScanReports {
            logger: Rc::clone(&self.settings.logger),
            errors: mem::take(&mut self.held),
        }
    }

    fn scan_sheet(
        &mut self,
        document: &Document,
        sheet: &CssStyleSheet,
        allowed_owners: Option<&[NodeKey]>,
    ) -> SheetStep {
        let Some(owner) = sheet.owner_node().filter(|owner| document.is_element(*owner)) else {
            return SheetStep::Skip;
        };
        if document.has_attribute(owner, &self.settings.ignore_attr) {
            return SheetStep::Skip;
        }
        if allowed_owners.is_some_and(|owners| !owners.contains(&owner)) {
            return SheetStep::Abort;
        }
        let rules = match probe(document, sheet, &self.settings.ignore_attr) {
            ProbeOutcome::Accessible(rules) => rules,
            failed => {
                if let Some(err) = failed.scan_error()
                    && !self.settings.silent
                {
                    self.held.push(err);
                }
                return SheetStep::Skip;
            }
        };
        if !self.mark_scanned(document, owner) {
            return SheetStep::Skip;
        }
        let pairs = extract(&rules, &self.settings.selector);
        let count = pairs.len();
        self.entries.extend(pairs);
        SheetStep::Scanned(count)
    }

    /// Add this instance to the owner's scan marker. Returns `false` when it
    /// was already there or the marker could not be written.
    fn mark_scanned(&self, document: &Document, owner: NodeKey) -> bool {
        let id = self.instance.to_string();
        let marker = document.get_attribute(owner, &self.settings.id_attr);
        if let Some(existing) = &marker
            && existing.split(',').any(|seen| seen.trim() == id)
        {
            return false;
        }
        let updated = match marker.filter(|existing| !existing.trim().is_empty()) {
            Some(existing) => format!("{existing},{id}"),
            None => id,
        };
        match document.set_attribute(owner, &self.settings.id_attr, &updated) {
            Ok(()) => true,
            Err(err) => {
                debug!("could not mark {owner:?} as scanned: {err:#}");
                false
            }
        }
    }
}
