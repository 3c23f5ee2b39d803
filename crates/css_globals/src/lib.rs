//! Live, two-way access to the CSS custom properties of a document.
//!
//! [`CssGlobalProperties`] scans the document's stylesheets for `--name: value`
//! declarations under a target selector (`:root` by default) and exposes them
//! as a normalizing key-value map. Reads return the computed value as of the
//! last refresh; writes update the document immediately. Adding or removing
//! `<style>` and `<link>` elements triggers a rescan on the next animation
//! frame, followed by a [`STYLES_UPDATED`] event on the window.
//!
//! ```no_run
//! use css_globals::{CssGlobalProperties, Options};
//! use dom::Window;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let window = Window::from_url("https://app.example/")?;
//! window.install();
//! let vars = CssGlobalProperties::new(Options::new())?;
//! vars.set("accent", "#0af")?;
//! assert_eq!(vars.get("--accent")?.as_deref(), Some("#0af"));
//! # Ok(())
//! # }
//! ```

mod binding;
mod cache;
mod config;
mod error;
mod logger;
mod normalizer;
mod observer;
mod probe;
mod registry;
mod root_style;
mod scanner;
mod style_helpers;
mod tag_filter;

pub use binding::{CssGlobalProperties, PropertyDescriptor, STYLES_UPDATED};
pub use cache::{ScanReports, ScanSettings, VariableCache};
pub use config::{
    DEFAULT_ID_ATTR_TAG, DEFAULT_IGNORE_ATTR_TAG, DEFAULT_SELECTOR, Options, Scheduling, WritePath,
};
pub use error::{Error, ScanError};
pub use logger::{ConsoleLogger, LogLevel, Logger};
pub use normalizer::{NameNormalizer, NormalizeFn, PREFIX, PropertyKey};
pub use observer::ChangeObserver;
pub use probe::{ProbeOutcome, probe};
pub use registry::{InstanceId, InstanceRegistry, is_instance_live};
pub use root_style::RootStyleController;
pub use scanner::extract;
pub use style_helpers::{add_css_rule, create_head_style_tag};
pub use tag_filter::{STYLE_TAG_NAMES, batch_touches_styles, is_allowed_tag_name, is_style_or_link_node};
