//! The live binding: a normalizing map interface over the variable cache.

use crate::cache::{ScanReports, ScanSettings, VariableCache};
use crate::config::{Options, WritePath};
use crate::normalizer::{NameNormalizer, PropertyKey};
use crate::observer::ChangeObserver;
use crate::registry::{InstanceId, acquire_instance_id, release_instance_id};
use crate::root_style::RootStyleController;
use crate::Error;
use anyhow::anyhow;
use core::cell::RefCell;
use core::fmt::{self, Debug, Display, Formatter};
use css_selectors::parse_selector_list;
use dom::{Document, Event, NodeKey, Window};
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Event type dispatched on the window after an observer-driven refresh.
pub const STYLES_UPDATED: &str = "stylesUpdated";

/// What [`CssGlobalProperties::get_own_property_descriptor`] reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub value: String,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

enum Writer {
    InlineRoot,
    Managed(RootStyleController),
}

struct State {
    document: Document,
    selector: String,
    cache: VariableCache,
    writer: Writer,
}

impl State {
    /// First element matching the selector, else the document element.
    fn target_element(&self) -> Option<NodeKey> {
        self.document
            .query_selector_all(&self.selector)
            .ok()
            .and_then(|matches| matches.first().copied())
            .or_else(|| self.document.document_element())
    }

    /// Rescan, reading computed values from the target element whichever
    /// way writes go.
    fn refresh(&mut self) -> (bool, ScanReports) {
        let source = self.target_element();
        let completed = self.cache.refresh(&self.document, source);
        (completed, self.cache.take_reports())
    }

    fn write(&mut self, name: String, value: String) -> Result<(), Error> {
        match &self.writer {
            Writer::InlineRoot => {
                let target = self
                    .target_element()
                    .ok_or_else(|| Error::Host(anyhow!("no element to hold {name}")))?;
                self.document.style_set_property(target, &name, &value, false)?;
            }
            Writer::Managed(controller) => controller.set(&name, &value)?,
        }
        self.cache.insert(name, value);
        Ok(())
    }

    fn detail(&self) -> Value {
        let entries: Map<String, Value> = self
            .cache
            .entries()
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();
        Value::Object(entries)
    }
}

/// Custom properties of a document as a live, normalizing key-value map.
///
/// Reads come from the cache, writes go to the document first and then to
/// the cache. A mutation observer keeps the cache in step with `<style>` and
/// `<link>` elements coming and going, and announces each refresh with a
/// [`STYLES_UPDATED`] event on the window.
///
/// After [`stop`](Self::stop) every operation fails with [`Error::Revoked`].
pub struct CssGlobalProperties {
    instance: InstanceId,
    normalizer: NameNormalizer,
    state: Rc<RefCell<Option<State>>>,
    observer: RefCell<Option<ChangeObserver>>,
}

impl CssGlobalProperties {
    /// Bind to the window installed on this thread.
    ///
    /// # Errors
    /// [`Error::Environment`] when no window is installed, plus everything
    /// [`Self::with_window`] reports.
    pub fn new(options: Options) -> Result<Self, Error> {
        let window = dom::window().ok_or(Error::Environment)?;
        Self::with_window(&window, options)
    }

    /// Bind to `window`'s document and run the initial scan.
    ///
    /// # Errors
    /// [`Error::Configuration`] for an invalid `filter` selector and
    /// [`Error::Host`] when the managed style element can not be created.
    pub fn with_window(window: &Window, options: Options) -> Result<Self, Error> {
        let filter = options
            .filter
            .as_deref()
            .map(|filter| {
                parse_selector_list(filter).map_err(|err| {
                    debug!("{err}");
                    Error::Configuration(format!(
                        "Provided \"filter\" is an invalid selector (\"{filter}\")"
                    ))
                })
            })
            .transpose()?;

        let document = window.document();
        let writer = match options.write_path {
            WritePath::InlineRoot => Writer::InlineRoot,
            WritePath::ManagedSheet => Writer::Managed(RootStyleController::new(
                &document,
                &options.selector,
                &options.ignore_attr_tag,
            )?),
        };

        let instance = acquire_instance_id();
        let settings = ScanSettings {
            selector: options.selector.clone(),
            filter,
            id_attr: options.id_attr_tag.clone(),
            ignore_attr: options.ignore_attr_tag.clone(),
            silent: options.silent,
            logger: Rc::clone(&options.logger),
        };
        let mut state = State {
            document: document.clone(),
            selector: options.selector.clone(),
            cache: VariableCache::new(instance, settings),
            writer,
        };
        let (completed, reports) = state.refresh();
        reports.deliver();
        if !completed {
            debug!("instance {instance}: initial scan stopped at the filter");
        }
        let state = Rc::new(RefCell::new(Some(state)));

        let target = options
            .observe_target
            .or_else(|| document.document_element())
            .unwrap_or(NodeKey::ROOT);
        let observer = ChangeObserver::attach(
            window,
            target,
            options.mutation_observe_options.merge_over_defaults(),
            options.scheduling,
            update_callback(window, &state),
        );
        debug!(
            "instance {instance} bound to {:?} ({:?})",
            options.selector, options.write_path
        );
        Ok(Self {
            instance,
            normalizer: NameNormalizer::new(options.normalize.clone(), options.autoprefix),
            state,
            observer: RefCell::new(Some(observer)),
        })
    }

    /// Run `apply` on the live state. No user code may run inside `apply`.
    fn with_state<T>(&self, apply: impl FnOnce(&mut State) -> Result<T, Error>) -> Result<T, Error> {
        let mut guard = self.state.try_borrow_mut().map_err(|_busy| Error::Reentrant)?;
        let state = guard.as_mut().ok_or(Error::Revoked)?;
        apply(state)
    }

    /// Canonical name for `key`. The user transform runs outside any borrow
    /// of the state, so it may read the binding.
    fn normalized<'key>(&self, key: impl Into<PropertyKey<'key>>) -> Result<String, Error> {
        if self.is_stopped() {
            return Err(Error::Revoked);
        }
        self.normalizer.normalize(key)
    }

    /// Cached value of `key` after normalization.
    ///
    /// # Errors
    /// [`Error::Revoked`] once stopped, [`Error::InvalidName`] from the normalizer.
    pub fn get<'key>(&self, key: impl Into<PropertyKey<'key>>) -> Result<Option<String>, Error> {
        let name = self.normalized(key)?;
        self.with_state(|state| Ok(state.cache.get(&name).map(str::to_owned)))
    }

    /// Write `value` to the document under the normalized key, then cache it.
    ///
    /// # Errors
    /// [`Error::Revoked`], [`Error::InvalidName`], or [`Error::Host`] when the
    /// document rejects the write.
    pub fn set<'key>(
        &self,
        key: impl Into<PropertyKey<'key>>,
        value: impl Display,
    ) -> Result<bool, Error> {
        let name = self.normalized(key)?;
        let value = value.to_string();
        self.with_state(|state| {
            state.write(name, value)?;
            Ok(true)
        })
    }

    /// # Errors
    /// [`Error::Revoked`], [`Error::InvalidName`].
    pub fn has<'key>(&self, key: impl Into<PropertyKey<'key>>) -> Result<bool, Error> {
        let name = self.normalized(key)?;
        self.with_state(|state| Ok(state.cache.contains(&name)))
    }

    /// Deletion is never performed; the declaration stays in its stylesheet.
    ///
    /// # Errors
    /// [`Error::Revoked`].
    pub fn delete<'key>(&self, key: impl Into<PropertyKey<'key>>) -> Result<bool, Error> {
        let key: PropertyKey<'_> = key.into();
        self.with_state(|_| {
            debug!("refused to delete {:?}", key.text());
            Ok(false)
        })
    }

    /// Canonical names currently known, unnormalized.
    ///
    /// # Errors
    /// [`Error::Revoked`].
    pub fn own_keys(&self) -> Result<Vec<String>, Error> {
        self.with_state(|state| Ok(state.cache.entries().keys().cloned().collect()))
    }

    /// Descriptor for an exact cache key; the key is not normalized.
    ///
    /// # Errors
    /// [`Error::Revoked`].
    pub fn get_own_property_descriptor(
        &self,
        key: &str,
    ) -> Result<Option<PropertyDescriptor>, Error> {
        self.with_state(|state| {
            Ok(state.cache.get(key).map(|value| PropertyDescriptor {
                value: value.to_owned(),
                writable: true,
                enumerable: true,
                configurable: true,
            }))
        })
    }

    /// Writes like [`Self::set`] when `value` is given, yet always reports
    /// `false`: no new own slot is created through this path. The key is
    /// normalized either way.
    ///
    /// # Errors
    /// Same as [`Self::set`].
    pub fn define_property<'key>(
        &self,
        key: impl Into<PropertyKey<'key>>,
        value: Option<&str>,
    ) -> Result<bool, Error> {
        let name = self.normalized(key)?;
        self.with_state(|state| match value {
            Some(value) => state.write(name, value.to_owned()),
            None => Ok(()),
        })?;
        Ok(false)
    }

    /// Snapshot of every cached name and value.
    ///
    /// # Errors
    /// [`Error::Revoked`].
    pub fn entries(&self) -> Result<BTreeMap<String, String>, Error> {
        self.with_state(|state| Ok(state.cache.entries().clone()))
    }

    /// Rescan now. `false` when the filter aborted the pass.
    ///
    /// # Errors
    /// [`Error::Revoked`], or [`Error::Reentrant`] when called while the
    /// binding is updating.
    pub fn refresh(&self) -> Result<bool, Error> {
        let (completed, reports) = self.with_state(|state| Ok(state.refresh()))?;
        reports.deliver();
        Ok(completed)
    }

    pub const fn instance_id(&self) -> InstanceId {
        self.instance
    }

    /// Disconnect the observer, drop the cache and release the instance id.
    /// Later calls do nothing.
    pub fn stop(&self) {
        if let Some(observer) = self.observer.borrow_mut().take() {
            observer.disconnect();
        }
        let Ok(mut guard) = self.state.try_borrow_mut() else {
            warn!("instance {}: stop requested while the binding is in use", self.instance);
            return;
        };
        let Some(state) = guard.take() else {
            return;
        };
        drop(guard);
        if let Writer::Managed(controller) = &state.writer
            && let Err(err) = controller.remove()
        {
            warn!("instance {}: managed style element not removed: {err}", self.instance);
        }
        release_instance_id(self.instance);
        debug!("instance {} stopped", self.instance);
    }

    pub fn is_stopped(&self) -> bool {
        self.state.try_borrow().is_ok_and(|state| state.is_none())
    }
}

impl Drop for CssGlobalProperties {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Debug for CssGlobalProperties {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CssGlobalProperties")
            .field("instance", &self.instance)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Refresh, then report scan failures and announce the new entries. The state
/// borrow ends before any user code runs so loggers and listeners can read the
/// binding.
fn update_callback(window: &Window, state: &Rc<RefCell<Option<State>>>) -> impl Fn() + 'static {
    let window = window.clone();
    let state = Rc::downgrade(state);
    move || {
        let Some(state) = state.upgrade() else {
            return;
        };
        let (detail, reports) = {
            let Ok(mut guard) = state.try_borrow_mut() else {
                debug!("binding busy, observer update dropped");
                return;
            };
            let Some(inner) = guard.as_mut() else {
                return;
            };
            let (_, reports) = inner.refresh();
            (inner.detail(), reports)
        };
        reports.deliver();
        window.dispatch_event(&Event::new(STYLES_UPDATED, detail));
    }
}
