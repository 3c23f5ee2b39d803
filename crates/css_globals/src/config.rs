//! Construction options for a live binding.
//!
//! Options can be built in code with the builder methods, loaded from a loose
//! JSON object with [`Options::from_json`], or overlaid from the environment
//! with [`Options::from_env`]:
//! - `CSS_GLOBALS_SELECTOR`: target selector (default `:root`)
//! - `CSS_GLOBALS_SILENT`: `1`/`true` or `0`/`false` (default silent)

use crate::logger::{ConsoleLogger, Logger};
use crate::normalizer::NormalizeFn;
use crate::Error;
use core::fmt::{self, Debug, Formatter};
use core::time::Duration;
use dom::{MutationObserveOptions, NodeKey};
use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::rc::Rc;

pub const DEFAULT_SELECTOR: &str = ":root";
pub const DEFAULT_ID_ATTR_TAG: &str = "data-css-global-vars-id";
pub const DEFAULT_IGNORE_ATTR_TAG: &str = "data-css-global-vars-ignore";

/// Where writes through the binding land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePath {
    /// The inline `style` of the target element.
    #[default]
    InlineRoot,
    /// A dedicated `<style>` element holding one rule under the selector.
    ManagedSheet,
}

/// When an observed stylesheet change is turned into a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheduling {
    /// On the next animation frame.
    #[default]
    AnimationFrame,
    /// After the given quiet period; each new trigger restarts it.
    Debounce(Duration),
}

/// Options for [`crate::CssGlobalProperties`].
#[derive(Clone)]
pub struct Options {
    pub selector: String,
    pub autoprefix: bool,
    pub normalize: Option<NormalizeFn>,
    pub filter: Option<String>,
    pub id_attr_tag: String,
    pub ignore_attr_tag: String,
    pub silent: bool,
    pub logger: Rc<dyn Logger>,
    pub mutation_observe_options: MutationObserveOptions,
    pub write_path: WritePath,
    pub scheduling: Scheduling,
    /// Node to observe; the document element when `None`.
    pub observe_target: Option<NodeKey>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            selector: DEFAULT_SELECTOR.to_owned(),
            autoprefix: true,
            normalize: None,
            filter: None,
            id_attr_tag: DEFAULT_ID_ATTR_TAG.to_owned(),
            ignore_attr_tag: DEFAULT_IGNORE_ATTR_TAG.to_owned(),
            silent: true,
            logger: Rc::new(ConsoleLogger),
            mutation_observe_options: MutationObserveOptions::default(),
            write_path: WritePath::default(),
            scheduling: Scheduling::default(),
            observe_target: None,
        }
    }
}

impl Debug for Options {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("selector", &self.selector)
            .field("autoprefix", &self.autoprefix)
            .field("normalize", &self.normalize.is_some())
            .field("filter", &self.filter)
            .field("id_attr_tag", &self.id_attr_tag)
            .field("ignore_attr_tag", &self.ignore_attr_tag)
            .field("silent", &self.silent)
            .field("mutation_observe_options", &self.mutation_observe_options)
            .field("write_path", &self.write_path)
            .field("scheduling", &self.scheduling)
            .field("observe_target", &self.observe_target)
            .finish_non_exhaustive()
    }
}

/// The JSON shape accepted by [`Options::from_json`]. Unknown keys are ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonOptions {
    selector: Option<String>,
    id_attr_tag: Option<String>,
    ignore_attr_tag: Option<String>,
    silent: Option<bool>,
    mutation_observe_options: Option<MutationObserveOptions>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    #[must_use]
    pub fn autoprefix(mut self, autoprefix: bool) -> Self {
        self.autoprefix = autoprefix;
        self
    }

    #[must_use]
    pub fn normalize(mut self, transform: impl Fn(&str) -> String + 'static) -> Self {
        self.normalize = Some(Rc::new(transform));
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn id_attr_tag(mut self, tag: impl Into<String>) -> Self {
        self.id_attr_tag = tag.into();
        self
    }

    #[must_use]
    pub fn ignore_attr_tag(mut self, tag: impl Into<String>) -> Self {
        self.ignore_attr_tag = tag.into();
        self
    }

    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    #[must_use]
    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Rc::new(logger);
        self
    }

    #[must_use]
    pub fn mutation_observe_options(mut self, options: MutationObserveOptions) -> Self {
        self.mutation_observe_options = options;
        self
    }

    #[must_use]
    pub fn write_path(mut self, write_path: WritePath) -> Self {
        self.write_path = write_path;
        self
    }

    #[must_use]
    pub fn scheduling(mut self, scheduling: Scheduling) -> Self {
        self.scheduling = scheduling;
        self
    }

    #[must_use]
    pub fn observe_target(mut self, target: NodeKey) -> Self {
        self.observe_target = Some(target);
        self
    }

    /// Load options from a loose JSON object, validating it the way a
    /// script caller's options object is validated.
    ///
    /// # Errors
    /// [`Error::Configuration`] when `value` is not an object, has a
    /// `normalize` key (a JSON value is never callable), a non-boolean
    /// `autoprefix`, a non-string `filter`, or wrongly typed known keys.
    pub fn from_json(value: &Value) -> Result<Self, Error> {
        let Some(object) = value.as_object() else {
            return Err(Error::Configuration(
                "constructor expects a config Object as first argument".to_owned(),
            ));
        };
        if object.contains_key("normalize") {
            return Err(Error::Configuration(
                "Config property \"normalize\" must be a function".to_owned(),
            ));
        }
        let autoprefix = match object.get("autoprefix") {
            None => None,
            Some(Value::Bool(flag)) => Some(*flag),
            Some(_) => {
                return Err(Error::Configuration(
                    "Config property \"autoprefix\" must be a boolean".to_owned(),
                ));
            }
        };
        let filter = match object.get("filter") {
            None => None,
            Some(Value::String(selector)) => Some(selector.clone()),
            Some(_) => {
                return Err(Error::Configuration(
                    "Config property \"filter\" must be a string".to_owned(),
                ));
            }
        };
        let parsed = JsonOptions::deserialize(value)
            .map_err(|err| Error::Configuration(format!("invalid options: {err}")))?;

        let mut options = Self::default();
        if let Some(flag) = autoprefix {
            options.autoprefix = flag;
        }
        options.filter = filter;
        if let Some(selector) = parsed.selector {
            options.selector = selector;
        }
        if let Some(tag) = parsed.id_attr_tag {
            options.id_attr_tag = tag;
        }
        if let Some(tag) = parsed.ignore_attr_tag {
            options.ignore_attr_tag = tag;
        }
        if let Some(silent) = parsed.silent {
            options.silent = silent;
        }
        if let Some(observe) = parsed.mutation_observe_options {
            options.mutation_observe_options = observe;
        }
        Ok(options)
    }

    /// Defaults overlaid with `CSS_GLOBALS_SELECTOR` and `CSS_GLOBALS_SILENT`.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(selector) = env::var("CSS_GLOBALS_SELECTOR")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
        {
            options.selector = selector;
        }
        if let Some(silent) = env::var("CSS_GLOBALS_SILENT")
            .ok()
            .and_then(|value| parse_flag(&value))
        {
            options.silent = silent;
        }
        options
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let options = Options::new();
        assert_eq!(options.selector, ":root");
        assert!(options.autoprefix);
        assert!(options.silent);
        assert_eq!(options.id_attr_tag, "data-css-global-vars-id");
        assert_eq!(options.ignore_attr_tag, "data-css-global-vars-ignore");
        assert_eq!(options.write_path, WritePath::InlineRoot);
        assert_eq!(options.scheduling, Scheduling::AnimationFrame);
    }

    #[test]
    fn json_overlays_known_keys() {
        let options = Options::from_json(&json!({
            "selector": ".theme",
            "autoprefix": false,
            "filter": "style.vars",
            "silent": false,
            "mutationObserveOptions": { "subtree": false },
            "id": 4
        }))
        .unwrap();
        assert_eq!(options.selector, ".theme");
        assert!(!options.autoprefix);
        assert_eq!(options.filter.as_deref(), Some("style.vars"));
        assert!(!options.silent);
        assert_eq!(options.mutation_observe_options.subtree, Some(false));
    }

    #[test]
    fn json_rejects_bad_shapes() {
        for bad in [
            json!([]),
            json!("x"),
            json!({ "normalize": null }),
            json!({ "autoprefix": "yes" }),
            json!({ "filter": 3 }),
            json!({ "silent": "no" }),
        ] {
            assert!(
                matches!(Options::from_json(&bad), Err(Error::Configuration(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn flags_parse_loosely() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
